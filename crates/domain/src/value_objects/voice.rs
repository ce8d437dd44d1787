//! Voice identifiers
//!
//! Kokoro voices are named `<prefix>_<name>` where the two-letter prefix
//! encodes accent and gender (`af_heart`, `bm_lewis`). A literal path to a
//! voice tensor file is accepted as well.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use crate::errors::DomainError;

/// Extension of voice tensor files
pub const VOICE_FILE_EXTENSION: &str = "pt";

/// Stock voices published in the model repository, with their group
pub const STOCK_VOICES: [(&str, &str); 32] = [
    ("af_alloy", "American Female"),
    ("af_aoede", "American Female"),
    ("af_bella", "American Female"),
    ("af_heart", "American Female"),
    ("af_jessica", "American Female"),
    ("af_kore", "American Female"),
    ("af_nicole", "American Female"),
    ("af_nova", "American Female"),
    ("af_river", "American Female"),
    ("af_sarah", "American Female"),
    ("af_sky", "American Female"),
    ("am_adam", "American Male"),
    ("am_echo", "American Male"),
    ("am_eric", "American Male"),
    ("am_fenrir", "American Male"),
    ("am_liam", "American Male"),
    ("am_michael", "American Male"),
    ("am_onyx", "American Male"),
    ("am_puck", "American Male"),
    ("am_santa", "American Male"),
    ("bf_alice", "British Female"),
    ("bf_emma", "British Female"),
    ("bf_isabella", "British Female"),
    ("bf_lily", "British Female"),
    ("bm_daniel", "British Male"),
    ("bm_fable", "British Male"),
    ("bm_george", "British Male"),
    ("bm_lewis", "British Male"),
    ("ef_dora", "Spanish Female"),
    ("em_alex", "Spanish Male"),
    ("em_santa", "Spanish Male"),
    ("ff_siwis", "French Female"),
];

#[allow(clippy::expect_used)]
static VOICE_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}_[a-z0-9_]+$").expect("voice pattern is valid"));

/// Display name for a voice prefix such as `af`
///
/// Unknown prefixes are shown upper-cased.
#[must_use]
pub fn voice_group_name(prefix: &str) -> String {
    match prefix {
        "af" => "American Female".to_string(),
        "am" => "American Male".to_string(),
        "bf" => "British Female".to_string(),
        "bm" => "British Male".to_string(),
        "ef" => "Spanish Female".to_string(),
        "em" => "Spanish Male".to_string(),
        "ff" => "French Female".to_string(),
        other => other.to_uppercase(),
    }
}

/// A validated voice name, or a path to a voice tensor file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoiceName(String);

impl VoiceName {
    /// Validate a voice name (trimmed)
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let trimmed = value.trim();

        if Self::is_voice_file_name(trimmed) || VOICE_NAME_PATTERN.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(DomainError::invalid(
                "voice name",
                trimmed,
                "format xx_name (e.g. af_heart, bm_lewis) or a path to a .pt file",
            ))
        }
    }

    fn is_voice_file_name(value: &str) -> bool {
        Path::new(value)
            .extension()
            .is_some_and(|ext| ext == VOICE_FILE_EXTENSION)
    }

    /// Whether this is a literal path to a voice file rather than a name
    #[must_use]
    pub fn is_voice_file(&self) -> bool {
        Self::is_voice_file_name(&self.0)
    }

    /// Two-letter accent/gender prefix, for plain names
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        if self.is_voice_file() {
            None
        } else {
            self.0.get(..2)
        }
    }

    /// The name as given
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VoiceName {
    fn default() -> Self {
        Self("af_heart".to_string())
    }
}

impl fmt::Display for VoiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VoiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VoiceName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VoiceName> for String {
    fn from(voice: VoiceName) -> Self {
        voice.0
    }
}
