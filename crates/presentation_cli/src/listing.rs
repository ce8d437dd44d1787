//! Informational output: languages, voices and model status

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use ai_speech::ModelStore;
use domain::{LanguageCode, voice_group_name};

const RULE_WIDTH: usize = 60;

fn rule(c: char) -> String {
    std::iter::repeat_n(c, RULE_WIDTH).collect()
}

/// Table of supported language codes with their stock voice counts
pub fn languages_table() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nSupported Languages:");
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "Code | Language          | Voices");
    let _ = writeln!(out, "-----|-------------------|--------");
    for lang in LanguageCode::ALL {
        let _ = writeln!(
            out,
            "  {}  | {:<17} | {}",
            lang.code(),
            lang.name(),
            lang.stock_voice_count()
        );
    }
    let _ = writeln!(out, "{}", rule('='));
    out
}

/// Installed voices grouped by their two-letter prefix
pub fn voices_listing(voices_dir: &Path, voices: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nAvailable Voices:");
    let _ = writeln!(out, "{}", rule('='));

    if !voices_dir.is_dir() {
        let _ = writeln!(out, "Voices directory not found: {}", voices_dir.display());
        let _ = writeln!(out, "Run with --download-models to fetch them.");
    } else if voices.is_empty() {
        let _ = writeln!(out, "No voices found!");
    } else {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for voice in voices {
            let prefix = voice.get(..2).unwrap_or(voice);
            groups.entry(prefix).or_default().push(voice);
        }
        for (prefix, members) in groups {
            let _ = writeln!(out, "\n{}:", voice_group_name(prefix));
            for voice in members {
                let _ = writeln!(out, "  - {voice}");
            }
        }
    }

    let _ = writeln!(out, "\n{}", rule('='));
    out
}

/// Voice listing for the configured model store
pub fn list_voices(store: &ModelStore) -> String {
    voices_listing(&store.paths().voices_dir, &store.available_voices())
}

/// Model file status as pretty JSON
pub fn model_info(store: &ModelStore) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&store.info())
}
