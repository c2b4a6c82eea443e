//! # wabridge-channels
//!
//! WhatsApp session service and the automation sidecar client behind it.

pub mod sidecar;
pub mod whatsapp;
