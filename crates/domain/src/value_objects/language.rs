//! Language codes understood by the Kokoro front end

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;

/// Supported synthesis language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum LanguageCode {
    /// `a`
    #[default]
    AmericanEnglish,
    /// `b`
    BritishEnglish,
    /// `e`
    Spanish,
    /// `f`
    French,
}

impl LanguageCode {
    /// All languages in code order
    pub const ALL: [Self; 4] = [
        Self::AmericanEnglish,
        Self::BritishEnglish,
        Self::Spanish,
        Self::French,
    ];

    /// Parse a single-letter code (trimmed, case-insensitive)
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let normalized = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.code() == normalized)
            .ok_or_else(|| DomainError::invalid("language code", normalized, "one of a, b, e, f"))
    }

    /// Single-letter code passed to the engine
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::AmericanEnglish => "a",
            Self::BritishEnglish => "b",
            Self::Spanish => "e",
            Self::French => "f",
        }
    }

    /// Human-readable language name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AmericanEnglish => "American English",
            Self::BritishEnglish => "British English",
            Self::Spanish => "Spanish",
            Self::French => "French",
        }
    }

    /// Number of stock voices published for this language
    #[must_use]
    pub const fn stock_voice_count(self) -> usize {
        match self {
            Self::AmericanEnglish => 20,
            Self::BritishEnglish => 8,
            Self::Spanish => 3,
            Self::French => 1,
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LanguageCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LanguageCode> for String {
    fn from(lang: LanguageCode) -> Self {
        lang.code().to_string()
    }
}
