//! Speed value object
//!
//! A playback speed multiplier for synthesized speech.
//!
//! # Examples
//!
//! ```
//! use domain::value_objects::Speed;
//!
//! let speed = Speed::new(1.5).expect("valid speed");
//! assert!((speed.value() - 1.5).abs() < f32::EPSILON);
//!
//! assert!(Speed::new(0.1).is_err());
//! assert!(Speed::new(4.5).is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::DomainError;

/// Playback speed multiplier within `[0.25, 4.0]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Speed(f32);

impl Speed {
    /// Slowest accepted multiplier
    pub const MIN: f32 = 0.25;
    /// Fastest accepted multiplier
    pub const MAX: f32 = 4.0;

    /// Create a validated speed
    ///
    /// The value is returned unchanged when accepted; NaN and infinities are
    /// rejected along with anything outside the range.
    pub fn new(value: f32) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::invalid(
                "speed",
                value,
                format!("a number between {} and {}", Self::MIN, Self::MAX),
            ))
        }
    }

    /// Get the multiplier
    #[must_use]
    pub const fn value(self) -> f32 {
        self.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self(1.0)
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

impl TryFrom<f32> for Speed {
    type Error = DomainError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Speed> for f32 {
    fn from(speed: Speed) -> Self {
        speed.0
    }
}

impl<'de> Deserialize<'de> for Speed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f32::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}
