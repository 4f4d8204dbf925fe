//! Telegram transport client using teloxide.

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tracing::{info, warn};

use crate::relay::engine::ChatTransport;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    async fn show_typing(&self, chat_id: i64) {
        if let Err(e) = self.bot.send_chat_action(ChatId(chat_id), ChatAction::Typing).await {
            warn!("Failed to send typing action: {e}");
        }
    }

    async fn fetch_profile_photo(&self, user_id: i64) -> Result<Option<Vec<u8>>, String> {
        let user_id = UserId(user_id as u64);

        let photos = self
            .bot
            .get_user_profile_photos(user_id)
            .limit(1)
            .await
            .map_err(|e| format!("Failed to get profile photos: {e}"))?;

        if photos.photos.is_empty() {
            return Ok(None);
        }

        // Largest available size of the most recent photo.
        let photo_sizes = &photos.photos[0];
        let Some(photo) = photo_sizes.last() else {
            return Ok(None);
        };

        let file = self
            .bot
            .get_file(photo.file.id.clone())
            .await
            .map_err(|e| format!("Failed to get photo file: {e}"))?;

        let mut data = Vec::new();
        self.bot
            .download_file(&file.path, &mut data)
            .await
            .map_err(|e| format!("Failed to download photo: {e}"))?;

        info!("Downloaded profile photo ({} bytes)", data.len());
        Ok(Some(data))
    }
}
