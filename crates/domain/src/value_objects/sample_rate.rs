//! Sample rate value object

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::DomainError;

/// Output sample rate in Hz, restricted to the rates the writer supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SampleRate(u32);

impl SampleRate {
    /// Accepted sample rates, ascending
    pub const VALID: [u32; 6] = [8000, 16000, 22050, 24000, 44100, 48000];

    /// Native rate of the Kokoro model
    pub const DEFAULT: Self = Self(24000);

    /// Create a validated sample rate
    pub fn new(value: u32) -> Result<Self, DomainError> {
        if Self::VALID.contains(&value) {
            Ok(Self(value))
        } else {
            let options = Self::VALID
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            Err(DomainError::invalid(
                "sample rate",
                value,
                format!("one of {options}"),
            ))
        }
    }

    /// Get the rate in Hz
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SampleRate> for u32 {
    fn from(rate: SampleRate) -> Self {
        rate.0
    }
}

impl<'de> Deserialize<'de> for SampleRate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u32::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}
