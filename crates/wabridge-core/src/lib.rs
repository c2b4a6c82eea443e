//! # wabridge-core
//!
//! Core types, traits, configuration, and error handling for the WhatsApp bridge.

pub mod config;
pub mod error;
pub mod message;
pub mod normalize;
pub mod retry;
pub mod state;
pub mod traits;
