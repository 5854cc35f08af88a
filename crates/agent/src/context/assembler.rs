//! Prompt assembly.
//!
//! # Layout
//!
//! | Position | Content |
//! |----------|---------|
//! | 1 | System: persona, knowledge interpolated at `{{knowledge}}` |
//! | 2..n | Session history, unchanged and in order |
//! | last | The new user message |
//!
//! Assembly is pure. Identical inputs always produce identical outputs.

use chatrelay_core::knowledge::Fragment;
use chatrelay_core::message::{Message, Turn};
use chatrelay_core::persona::{KNOWLEDGE_PLACEHOLDER, Persona};

/// Header line placed above rendered knowledge fragments.
pub const DEFAULT_KNOWLEDGE_HEADER: &str = "Relevant reference material:";

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    header: String,
}

impl PromptAssembler {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    /// Build the outbound message list for one request.
    pub fn assemble(
        &self,
        persona: &Persona,
        fragments: &[Fragment],
        history: &[Turn],
        new_message: &str,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_text(persona, fragments)));
        messages.extend(history.iter().map(Message::from));
        messages.push(Message::user(new_message));
        messages
    }

    /// The persona with knowledge filled in.
    ///
    /// Without a placeholder, a non-empty knowledge section is appended after
    /// the persona text instead.
    pub fn system_text(&self, persona: &Persona, fragments: &[Fragment]) -> String {
        let knowledge = self.render_knowledge(fragments);

        if persona.has_placeholder() {
            persona.text.replace(KNOWLEDGE_PLACEHOLDER, &knowledge)
        } else if knowledge.is_empty() {
            persona.text.clone()
        } else {
            format!("{}\n\n{}", persona.text.trim_end(), knowledge)
        }
    }

    /// Render fragments as a header plus one `- [source] text` line each.
    /// Empty input renders as an empty string.
    pub fn render_knowledge(&self, fragments: &[Fragment]) -> String {
        if fragments.is_empty() {
            return String::new();
        }

        let mut lines = Vec::with_capacity(fragments.len() + 1);
        lines.push(self.header.clone());
        for fragment in fragments {
            let line = match &fragment.source {
                Some(source) => format!("- [{}] {}", source, fragment.text),
                None => format!("- {}", fragment.text),
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_KNOWLEDGE_HEADER)
    }
}
