//! Destination normalization: phone numbers and chat ids into the chat-id form
//! the automation client expects.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Suffix of one-to-one chat identifiers.
pub const USER_SUFFIX: &str = "@c.us";

/// Suffix of group chat identifiers.
pub const GROUP_SUFFIX: &str = "@g.us";

/// E.164 allows at most 15 digits; anything under 7 is not a dialable number.
const MIN_DIGITS: usize = 7;
const MAX_DIGITS: usize = 15;

/// How loosely formatted phone numbers are accepted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// `+` followed by 7-15 digits, no leading zero.
    #[default]
    Strict,
    /// Strip every non-digit and fall back to a default country code.
    Lenient,
}

/// Normalization settings (`[whatsapp.normalization]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationPolicy {
    #[serde(default)]
    pub policy: PolicyKind,
    /// Country calling code used by the lenient policy for national numbers.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
}

fn default_country_code() -> String {
    "34".to_string()
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Strict,
            default_country_code: default_country_code(),
        }
    }
}

/// Why a destination was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDestination {
    #[error("destination is empty")]
    Empty,
    #[error("invalid phone number '{0}': expected E.164 format like +34600111222")]
    NotE164(String),
    #[error("invalid phone number '{0}': no digits found")]
    NoDigits(String),
    #[error("'{0}' is a group id, expected a user")]
    GroupNotAllowed(String),
}

/// Chat id already in internal form (`<id>@c.us` or `<id>@g.us`)?
pub fn is_chat_id(input: &str) -> bool {
    [USER_SUFFIX, GROUP_SUFFIX].iter().any(|suffix| {
        input
            .strip_suffix(suffix)
            .is_some_and(|local| !local.is_empty() && !local.contains('@'))
    })
}

/// Group chat id?
pub fn is_group_id(input: &str) -> bool {
    is_chat_id(input) && input.ends_with(GROUP_SUFFIX)
}

/// Strict E.164: `+`, first digit 1-9, 7-15 digits total, nothing else.
pub fn is_e164(input: &str) -> bool {
    let Some(digits) = input.strip_prefix('+') else {
        return false;
    };
    (MIN_DIGITS..=MAX_DIGITS).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !digits.starts_with('0')
}

impl NormalizationPolicy {
    /// Turn a destination into a chat id.
    ///
    /// Chat ids pass through unchanged; phone numbers are checked against the
    /// configured policy and get the user suffix appended.
    pub fn normalize(&self, input: &str) -> Result<String, InvalidDestination> {
        if input.trim().is_empty() {
            return Err(InvalidDestination::Empty);
        }
        if is_chat_id(input) {
            return Ok(input.to_string());
        }

        match self.policy {
            PolicyKind::Strict => {
                if !is_e164(input) {
                    return Err(InvalidDestination::NotE164(input.to_string()));
                }
                Ok(format!("{}{USER_SUFFIX}", &input[1..]))
            }
            PolicyKind::Lenient => self.normalize_lenient(input),
        }
    }

    /// Normalize a group participant: same as [`normalize`](Self::normalize)
    /// but group ids are refused.
    pub fn normalize_participant(&self, input: &str) -> Result<String, InvalidDestination> {
        let id = self.normalize(input)?;
        if id.ends_with(GROUP_SUFFIX) {
            return Err(InvalidDestination::GroupNotAllowed(input.to_string()));
        }
        Ok(id)
    }

    fn normalize_lenient(&self, input: &str) -> Result<String, InvalidDestination> {
        let trimmed = input.trim();
        let international = trimmed.starts_with('+') || trimmed.starts_with("00");

        let mut digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        if trimmed.starts_with("00") {
            digits.drain(..2);
        }
        if digits.is_empty() {
            return Err(InvalidDestination::NoDigits(input.to_string()));
        }

        if !international && !digits.starts_with(&self.default_country_code) {
            digits.insert_str(0, &self.default_country_code);
        }

        Ok(format!("{digits}{USER_SUFFIX}"))
    }
}
