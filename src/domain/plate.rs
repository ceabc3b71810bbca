//! License plate normalization
//!
//! Plates are the lookup key for walk-in customers, so every spelling of the
//! same plate ("b 1234 abc", "B1234ABC", " B 1234ABC ") must collapse to one
//! stored value.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::DomainError;

/// Longest normalized plate accepted (Indonesian plates are far shorter)
pub const MAX_PLATE_LEN: usize = 15;

/// A normalized license plate: uppercase ASCII letters and digits, no whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicensePlate(String);

impl LicensePlate {
    /// Normalize and validate raw plate text.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let normalized = Self::normalize(raw);

        if normalized.is_empty() {
            return Err(DomainError::validation("license plate is required"));
        }
        if normalized.len() > MAX_PLATE_LEN {
            return Err(DomainError::validation(format!(
                "license plate longer than {MAX_PLATE_LEN} characters"
            )));
        }
        if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::validation(format!(
                "license plate contains invalid characters: {raw}"
            )));
        }

        Ok(Self(normalized))
    }

    /// Uppercase and strip all whitespace. Does not validate.
    pub fn normalize(raw: &str) -> String {
        raw.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LicensePlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LicensePlate {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LicensePlate::parse(&value)
    }
}

impl From<LicensePlate> for String {
    fn from(plate: LicensePlate) -> Self {
        plate.0
    }
}
