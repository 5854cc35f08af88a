//! Persona — the fixed system-level instruction text.
//!
//! Loading follows a short precedence list (first hit wins):
//!
//! 1. **Inline text** — `persona.text` from the config file
//! 2. **Persona file** — `persona.path` (markdown or plain text)
//! 3. **Built-in fallback** — a neutral assistant prompt
//!
//! The text is opaque to the relay except for [`KNOWLEDGE_PLACEHOLDER`],
//! which marks where retrieved knowledge is interpolated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Marker inside the persona text that is replaced with knowledge snippets.
pub const KNOWLEDGE_PLACEHOLDER: &str = "{{knowledge}}";

/// Where the active persona text came from (for diagnostics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum PersonaSource {
    Inline,
    File(PathBuf),
    Fallback,
}

/// The assistant's instruction set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub text: String,
    pub source: PersonaSource,
}

impl Persona {
    /// Use the given text verbatim.
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: PersonaSource::Inline,
        }
    }

    /// The built-in persona used when nothing is configured.
    pub fn fallback() -> Self {
        Self {
            text: concat!(
                "You are a friendly and attentive online consultant. ",
                "Answer the visitor's questions clearly and politely, ",
                "stay on the topic of the business you represent, ",
                "and ask a clarifying question when the request is ambiguous.",
                "\n\n{{knowledge}}",
            )
            .into(),
            source: PersonaSource::Fallback,
        }
    }

    /// Resolve the persona from configuration.
    ///
    /// Never fails: an unreadable or empty file is logged and the fallback
    /// persona is used instead.
    pub fn load(inline: Option<&str>, path: Option<&Path>) -> Self {
        if let Some(text) = inline.filter(|t| !t.trim().is_empty()) {
            debug!(len = text.len(), "Using inline persona text");
            return Self::inline(text);
        }

        if let Some(path) = path {
            match std::fs::read_to_string(path) {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(file = %path.display(), len = text.len(), "Loaded persona file");
                    return Self {
                        text,
                        source: PersonaSource::File(path.to_path_buf()),
                    };
                }
                Ok(_) => warn!(file = %path.display(), "Persona file is empty, using fallback"),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Failed to read persona file, using fallback")
                }
            }
        }

        Self::fallback()
    }

    /// Whether the persona declares where knowledge goes.
    pub fn has_placeholder(&self) -> bool {
        self.text.contains(KNOWLEDGE_PLACEHOLDER)
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn inline_wins_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "from file").unwrap();
        let persona = Persona::load(Some("from config"), Some(file.path()));
        assert_eq!(persona.text, "from config");
        assert_eq!(persona.source, PersonaSource::Inline);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Ты — Эля, онлайн-консультант.").unwrap();
        let persona = Persona::load(None, Some(file.path()));
        assert!(persona.text.starts_with("Ты — Эля"));
        assert_eq!(persona.source, PersonaSource::File(file.path().to_path_buf()));
    }

    #[test]
    fn missing_file_falls_back() {
        let persona = Persona::load(None, Some(Path::new("/nonexistent/persona.md")));
        assert_eq!(persona.source, PersonaSource::Fallback);
        assert!(persona.has_placeholder());
    }

    #[test]
    fn blank_inline_is_ignored() {
        let persona = Persona::load(Some("   "), None);
        assert_eq!(persona.source, PersonaSource::Fallback);
    }
}
