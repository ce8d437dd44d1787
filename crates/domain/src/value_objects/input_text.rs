//! Text to be synthesized

use std::fmt;

use crate::errors::DomainError;
use crate::path_safety::SafePath;

/// Non-empty, length-bounded text, trimmed of surrounding whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputText(String);

impl InputText {
    /// Maximum number of characters after trimming
    pub const MAX_LENGTH: usize = 100_000;

    /// Validate and trim text
    pub fn new(text: impl AsRef<str>) -> Result<Self, DomainError> {
        let trimmed = text.as_ref().trim();

        if trimmed.is_empty() {
            return Err(DomainError::invalid("text", "", "non-empty text"));
        }

        let length = trimmed.chars().count();
        if length > Self::MAX_LENGTH {
            return Err(DomainError::invalid(
                "text",
                format!("{length} characters"),
                format!("at most {} characters", Self::MAX_LENGTH),
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Read and validate text from a file that already passed input path checks
    pub fn from_file(path: &SafePath) -> Result<Self, DomainError> {
        let bytes = std::fs::read(path.as_path()).map_err(|_| DomainError::FileNotFound {
            purpose: "Text".to_string(),
            path: path.to_path_buf(),
        })?;
        let text = String::from_utf8(bytes).map_err(|e| DomainError::InvalidEncoding {
            purpose: "Text file".to_string(),
            reason: e.utf8_error().to_string(),
        })?;
        Self::new(text)
    }

    /// The validated text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    /// First `max_chars` characters, with an ellipsis when truncated
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.0.chars().take(max_chars).collect();
        if self.char_count() > max_chars {
            preview.push_str("...");
        }
        preview
    }

    /// Consume and return the text
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for InputText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InputText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_text() {
        assert_eq!(InputText::new("  Hello world \n").unwrap().as_str(), "Hello world");
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(InputText::new("").is_err());
        let err = InputText::new(" \n\t ").unwrap_err();
        assert_eq!(err.field(), Some("text"));
    }

    #[test]
    fn accepts_max_length() {
        let text = "a".repeat(InputText::MAX_LENGTH);
        assert!(InputText::new(text).is_ok());
    }

    #[test]
    fn rejects_over_max_length() {
        let text = "a".repeat(InputText::MAX_LENGTH + 1);
        let err = InputText::new(text).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid text '100001 characters': expected at most 100000 characters"
        );
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let text = "é".repeat(InputText::MAX_LENGTH);
        assert!(InputText::new(text).is_ok());
    }

    #[test]
    fn preview_truncates_with_ellipsis() {
        let text = InputText::new("abcdefghij").unwrap();
        assert_eq!(text.preview(4), "abcd...");
        assert_eq!(text.preview(50), "abcdefghij");
    }
}
