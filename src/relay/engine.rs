//! Per-message relay pipeline.
//!
//! One inbound private message flows through: block check, user upsert,
//! avatar resolution, inbound log, persona-prefixed prompt, model call,
//! reply send, outbound log. Failures are absorbed at the boundary of
//! [`RelayEngine::handle_message`]; nothing escapes into the dispatcher.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::relay::avatars::AvatarStore;
use crate::relay::database::{Database, Direction};
use crate::relay::personas::PersonaBook;
use crate::relay::profile::SenderProfile;

/// Fixed user-facing reply when anything in the pipeline fails.
pub const APOLOGY: &str = "Sorry, something went wrong while processing your request.";

/// How often the typing indicator is refreshed while the model call runs.
/// Telegram expires the indicator after roughly five seconds.
const TYPING_REFRESH: Duration = Duration::from_secs(4);

/// Outbound side of the chat transport, plus avatar download.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a plain-text message to a chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String>;

    /// Show a "typing" presence indicator in the chat.
    async fn show_typing(&self, chat_id: i64);

    /// Fetch the sender's current profile photo, `None` if they have none.
    async fn fetch_profile_photo(&self, user_id: i64) -> Result<Option<Vec<u8>>, String>;
}

/// The generative-language backend.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, String>;
}

/// An inbound private message, reduced to what the pipeline needs.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    /// Transport-level numeric sender id, used for avatar download.
    pub sender_id: i64,
    pub sender: SenderProfile,
    pub text: String,
}

/// The relay engine. All state is set at startup and read-only afterwards;
/// concurrent messages only share the database connection.
pub struct RelayEngine<T, M> {
    personas: PersonaBook,
    database: Arc<Database>,
    avatars: AvatarStore,
    transport: Arc<T>,
    model: Arc<M>,
}

impl<T, M> RelayEngine<T, M>
where
    T: ChatTransport + 'static,
    M: ModelClient,
{
    pub fn new(
        personas: PersonaBook,
        database: Arc<Database>,
        avatars: AvatarStore,
        transport: Arc<T>,
        model: Arc<M>,
    ) -> Self {
        Self { personas, database, avatars, transport, model }
    }

    /// Handle one inbound private message. Failures are logged, recorded in
    /// the message log where possible, and answered with a fixed apology.
    pub async fn handle_message(&self, msg: InboundMessage) {
        let user_id = msg.sender.user_id();
        let mut avatar_path = None;

        if let Err(e) = self.relay(&msg, &user_id, &mut avatar_path).await {
            let diagnostic = format!("An error occurred while relaying the message: {e}");
            warn!("{diagnostic}");

            // If the failure itself implicates the store, don't log through
            // the store again. Substring heuristic carried over from the
            // original behavior, not a contract.
            if !diagnostic.to_lowercase().contains("database") {
                self.database
                    .append_message(Direction::Out, &user_id, &diagnostic, avatar_path.as_deref());
            }

            if let Err(send_err) = self.transport.send_message(msg.chat_id, APOLOGY).await {
                warn!("Failed to send apology to {user_id}: {send_err}");
            }
        }
    }

    async fn relay(
        &self,
        msg: &InboundMessage,
        user_id: &str,
        avatar_path: &mut Option<String>,
    ) -> Result<(), String> {
        if self
            .database
            .is_blocked(user_id)
            .map_err(|e| format!("database error: {e}"))?
        {
            info!("Ignoring message from blocked user: {user_id}");
            return Ok(());
        }

        self.database
            .upsert_user(user_id)
            .map_err(|e| format!("database error: {e}"))?;

        *avatar_path = self.resolve_avatar(msg.sender_id, user_id).await?;

        let preview: String = msg.text.chars().take(100).collect();
        info!("📨 Received message from {user_id}: \"{preview}\"");
        self.database
            .append_message(Direction::In, user_id, &msg.text, avatar_path.as_deref());

        let prompt = self.personas.build_prompt(user_id, &msg.text);
        let reply = self.generate_with_typing(msg.chat_id, &prompt).await?;

        self.transport.send_message(msg.chat_id, &reply).await?;
        info!("Sent response to {user_id}");
        self.database
            .append_message(Direction::Out, user_id, &reply, avatar_path.as_deref());

        Ok(())
    }

    /// Fetch and cache the sender's avatar. The resolved path (or `None`) is
    /// shared by the inbound and outbound rows of this exchange.
    async fn resolve_avatar(&self, sender_id: i64, user_id: &str) -> Result<Option<String>, String> {
        match self.transport.fetch_profile_photo(sender_id).await? {
            Some(bytes) => {
                let rel = self
                    .avatars
                    .store(user_id, &bytes)
                    .map_err(|e| format!("failed to store avatar: {e}"))?;
                Ok(Some(rel))
            }
            None => Ok(None),
        }
    }

    /// Run the model call while keeping the typing indicator alive.
    async fn generate_with_typing(&self, chat_id: i64, prompt: &str) -> Result<String, String> {
        let transport = self.transport.clone();
        let typing = tokio::spawn(async move {
            loop {
                transport.show_typing(chat_id).await;
                tokio::time::sleep(TYPING_REFRESH).await;
            }
        });

        let result = self.model.generate(prompt).await;
        typing.abort();
        result
    }
}
