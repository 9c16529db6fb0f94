//! Telegram implementation of [`MediaSink`].

use crate::bot::views::{AUDIO_TITLE, VIDEO_CAPTION};
use crate::media::{MediaSink, PipelineError, Presence};
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile};
use tracing::info;

/// Delivers media through the Bot API
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    /// Create a sink sending through `bot`
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Bot API chat action for a presence indicator
#[must_use]
pub const fn chat_action_for(presence: Presence) -> ChatAction {
    match presence {
        Presence::Typing => ChatAction::Typing,
        Presence::UploadVideo => ChatAction::UploadVideo,
        Presence::UploadAudio => ChatAction::UploadVoice,
    }
}

fn delivery_error(e: &teloxide::RequestError) -> PipelineError {
    PipelineError::Delivery(e.to_string())
}

#[async_trait]
impl MediaSink for TelegramSink {
    async fn chat_action(&self, chat_id: i64, presence: Presence) -> Result<(), PipelineError> {
        self.bot
            .send_chat_action(ChatId(chat_id), chat_action_for(presence))
            .await
            .map_err(|e| delivery_error(&e))?;
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, path: &Path) -> Result<(), PipelineError> {
        info!(chat_id, path = %path.display(), "Sending video");
        self.bot
            .send_video(ChatId(chat_id), InputFile::file(path))
            .caption(VIDEO_CAPTION)
            .supports_streaming(true)
            .await
            .map_err(|e| delivery_error(&e))?;
        Ok(())
    }

    async fn send_audio(&self, chat_id: i64, path: &Path) -> Result<(), PipelineError> {
        info!(chat_id, path = %path.display(), "Sending audio");
        self.bot
            .send_audio(ChatId(chat_id), InputFile::file(path))
            .title(AUDIO_TITLE)
            .await
            .map_err(|e| delivery_error(&e))?;
        Ok(())
    }
}
