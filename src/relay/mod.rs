//! Relay module - forwards private Telegram messages to Gemini.

pub mod avatars;
pub mod database;
pub mod engine;
pub mod gemini;
pub mod personas;
pub mod profile;
pub mod telegram;

#[cfg(test)]
mod tests;

pub use avatars::AvatarStore;
pub use database::Database;
pub use engine::{InboundMessage, RelayEngine};
pub use gemini::GeminiClient;
pub use personas::PersonaBook;
pub use profile::SenderProfile;
pub use telegram::TelegramClient;
