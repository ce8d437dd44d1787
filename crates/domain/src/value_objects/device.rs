//! Compute device for inference

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;

/// Compute device requested for the engine
///
/// Absence of a device (`Option::None` at the call site) means auto-detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    /// CPU inference
    Cpu,
    /// Apple Metal Performance Shaders
    Mps,
    /// CUDA, optionally pinned to an ordinal
    Cuda(Option<u8>),
}

impl Device {
    /// Highest CUDA ordinal accepted
    pub const MAX_CUDA_ORDINAL: u8 = 3;

    /// Accepted device strings, sorted
    pub const VALID: [&'static str; 7] = [
        "cpu", "cuda", "cuda:0", "cuda:1", "cuda:2", "cuda:3", "mps",
    ];

    /// Parse a device string (trimmed, case-insensitive)
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let normalized = value.trim().to_lowercase();
        let device = match normalized.as_str() {
            "cpu" => Some(Self::Cpu),
            "mps" => Some(Self::Mps),
            "cuda" => Some(Self::Cuda(None)),
            "cuda:0" => Some(Self::Cuda(Some(0))),
            "cuda:1" => Some(Self::Cuda(Some(1))),
            "cuda:2" => Some(Self::Cuda(Some(2))),
            "cuda:3" => Some(Self::Cuda(Some(Self::MAX_CUDA_ORDINAL))),
            _ => None,
        };

        device.ok_or_else(|| {
            DomainError::invalid(
                "device",
                normalized,
                format!("one of {}", Self::VALID.join(", ")),
            )
        })
    }

    /// Parse an optional device string; `None` means auto-detect
    pub fn parse_optional(value: Option<&str>) -> Result<Option<Self>, DomainError> {
        value.map(Self::parse).transpose()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Mps => f.write_str("mps"),
            Self::Cuda(None) => f.write_str("cuda"),
            Self::Cuda(Some(ordinal)) => write!(f, "cuda:{ordinal}"),
        }
    }
}

impl FromStr for Device {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Device {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}
