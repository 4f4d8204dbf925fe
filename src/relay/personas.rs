//! Sectioned prompt/persona configuration.
//!
//! The file is plain text delimited by bracketed headers:
//!
//! ```text
//! [system_prompt]
//! You are a helpful assistant.
//!
//! [persona:ada99]
//! Answer like a Victorian mathematician.
//!
//! [default_persona]
//! Keep replies short.
//! ```
//!
//! Each body is the literal text up to the next `[`, trimmed. Content before
//! the first header, headers without a closing `]`, and unknown headers are
//! all ignored.

use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Prompts and personas, loaded once at startup and immutable afterwards.
pub struct PersonaBook {
    system_prompt: String,
    personas: HashMap<String, String>,
    default_persona: String,
}

impl PersonaBook {
    pub fn empty() -> Self {
        Self {
            system_prompt: String::new(),
            personas: HashMap::new(),
            default_persona: String::new(),
        }
    }

    /// Parse the sectioned text format.
    pub fn parse(content: &str) -> Self {
        let mut book = Self::empty();

        // Everything before the first '[' is not part of a section.
        for section in content.split('[').skip(1) {
            let Some((header, body)) = section.split_once(']') else {
                // Header never closed; skip the fragment.
                continue;
            };
            let body = body.trim().to_string();
            if header == "system_prompt" {
                book.system_prompt = body;
            } else if let Some(user) = header.strip_prefix("persona:") {
                book.personas.insert(user.to_string(), body);
            } else if header == "default_persona" {
                book.default_persona = body;
            }
        }

        book
    }

    /// Load from a file. A missing or unreadable file degrades to empty
    /// prompts rather than failing startup.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                warn!("No persona config at {:?} ({e}), using empty prompts", path);
                Self::empty()
            }
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The persona configured for this user, or the default persona.
    pub fn persona_for(&self, user_id: &str) -> &str {
        self.personas
            .get(user_id)
            .map(String::as_str)
            .unwrap_or(&self.default_persona)
    }

    /// The full prompt submitted per message: persona, blank line, text.
    pub fn build_prompt(&self, user_id: &str, message_text: &str) -> String {
        format!("{}\n\n{}", self.persona_for(user_id), message_text)
    }
}
