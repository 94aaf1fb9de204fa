//! Seam to the external cipher service and the value domain it accepts.
//!
//! The service itself is opaque. What lives here is the part the gateway
//! must know to reject bad input before any call goes out: normalisation,
//! the tag marker, and the length/charset rules.

pub mod http;

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

pub use http::HttpCipherService;

/// Marker carried by every forward-transformed value.
pub const TAG_PREFIX: &str = "ENC:";

/// Shortest accepted normalised value, in digits.
pub const MIN_LEN: usize = 6;

/// Longest accepted normalised value, in digits.
pub const MAX_LEN: usize = 56;

static DOMAIN_VIOLATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(length|charset|character set|too short|too long)\b")
        .expect("domain violation pattern is a valid regex")
});

/// Failures reported by the external service.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The service refused the input.
    #[error("{0}")]
    Rejected(String),
    #[error("cipher service unavailable: {0}")]
    Unavailable(String),
    #[error("cipher service protocol error: {0}")]
    Protocol(String),
}

impl CipherError {
    /// Whether the failure names a length or charset rule of the value domain.
    pub fn is_domain_violation(&self) -> bool {
        let message = match self {
            CipherError::Rejected(m) => m,
            CipherError::Unavailable(_) | CipherError::Protocol(_) => return false,
        };
        DOMAIN_VIOLATION.is_match(message)
    }
}

/// The two operations of the external cipher service.
pub trait CipherService: Send + Sync {
    /// Transform a normalised value into a tagged value.
    fn transform_forward(&self, value: &str) -> Result<String, CipherError>;

    /// Transform a tagged value back into its normalised value.
    fn transform_backward(&self, tagged: &str) -> Result<String, CipherError>;
}

/// Strip separators (ASCII whitespace and `-`) from a raw value.
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != '-')
        .collect()
}

pub fn is_tagged(value: &str) -> bool {
    value.trim().starts_with(TAG_PREFIX)
}

/// Check a normalised value against the length and charset rules.
pub fn validate_plain(normalized: &str) -> Result<(), String> {
    if !normalized.chars().all(|c| c.is_ascii_digit()) {
        return Err("value charset must be ASCII digits 0-9".to_string());
    }
    check_length(normalized.len())
}

/// Check a tagged value and return it trimmed.
pub fn validate_tagged(value: &str) -> Result<&str, String> {
    let trimmed = value.trim();
    let payload = trimmed
        .strip_prefix(TAG_PREFIX)
        .ok_or_else(|| format!("tagged_value must start with '{}'", TAG_PREFIX))?;
    if payload.is_empty() {
        return Err("tagged_value has an empty payload".to_string());
    }
    if !payload.chars().all(|c| c.is_ascii_digit()) {
        return Err("tagged_value payload charset must be ASCII digits 0-9".to_string());
    }
    check_length(payload.len())?;
    Ok(trimmed)
}

fn check_length(len: usize) -> Result<(), String> {
    if !(MIN_LEN..=MAX_LEN).contains(&len) {
        return Err(format!(
            "value length must be between {} and {} digits (got {})",
            MIN_LEN, MAX_LEN, len
        ));
    }
    Ok(())
}
