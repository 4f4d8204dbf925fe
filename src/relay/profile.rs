//! Typed sender profile and identifier derivation.

/// Sender metadata as supplied by the chat transport.
#[derive(Debug, Clone, Default)]
pub struct SenderProfile {
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl SenderProfile {
    /// Derive the stable user identifier: the username when one is set,
    /// otherwise `"first last"` with a missing last name rendered as empty,
    /// trimmed of surrounding whitespace.
    pub fn user_id(&self) -> String {
        match self.username.as_deref() {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => format!("{} {}", self.first_name, self.last_name.as_deref().unwrap_or(""))
                .trim()
                .to_string(),
        }
    }
}
