use crate::bot::delivery::TelegramSink;
use crate::bot::views::{
    get_again_keyboard, get_format_keyboard, remove_keyboard, AGAIN_LABEL, CHOOSE_FORMAT_TEXT,
    DONE_TEXT, HINT_TEXT, INVALID_LINK_TEXT, NO_SESSION_TEXT, SEND_ANOTHER_TEXT, WELCOME_TEXT,
};
use crate::media::link::{extract_shortcode, looks_like_link};
use crate::media::{MediaFormat, Pipeline, SelectError, SessionStore};
use anyhow::Result;
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{ParseMode, ReplyParameters},
    utils::command::BotCommands,
};
use tracing::{error, info, warn};

// Helper function to get user name from Message
fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage instructions
    #[command(description = "How to use the bot.")]
    Help,
}

/// What a plain text message asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// A format button (or typed equivalent)
    Format(MediaFormat),
    /// The "Download Another" button
    Again,
    /// Something that looks like an Instagram link
    Link,
    /// Anything else
    Other,
}

impl Intent {
    /// Classifies message text. Format replies win over links.
    ///
    /// ```
    /// use reelgrab::bot::handlers::Intent;
    /// use reelgrab::media::MediaFormat;
    ///
    /// assert_eq!(Intent::classify("MP3 🎵"), Intent::Format(MediaFormat::Audio));
    /// assert_eq!(Intent::classify("https://instagram.com/reel/ABC"), Intent::Link);
    /// assert_eq!(Intent::classify("hi"), Intent::Other);
    /// ```
    #[must_use]
    pub fn classify(text: &str) -> Self {
        if let Some(format) = MediaFormat::from_label(text) {
            Self::Format(format)
        } else if text.trim() == AGAIN_LABEL {
            Self::Again
        } else if looks_like_link(text) {
            Self::Link
        } else {
            Self::Other
        }
    }
}

/// Start / help handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let user_name = get_user_name(&msg);
    info!("User {user_id} ({user_name}) requested the welcome message.");

    bot.send_message(msg.chat.id, WELCOME_TEXT)
        .parse_mode(ParseMode::Html)
        .reply_markup(remove_keyboard())
        .await?;
    Ok(())
}

/// Link handler: validates the link, stores the pending session and asks for
/// a format.
///
/// An invalid link is answered immediately and leaves any pending session
/// untouched.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_link(bot: Bot, msg: Message, sessions: SessionStore) -> Result<()> {
    let text = msg.text().unwrap_or_default();
    let chat_id = msg.chat.id.0;

    match extract_shortcode(text) {
        Ok(link) => {
            info!(chat_id, link = %link, "Received reel link");
            sessions.put(chat_id, link.url, link.shortcode).await;
            bot.send_message(msg.chat.id, CHOOSE_FORMAT_TEXT)
                .reply_markup(get_format_keyboard())
                .await?;
        }
        Err(e) => {
            warn!(chat_id, error = %e, "URL handling error");
            bot.send_message(msg.chat.id, INVALID_LINK_TEXT)
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
        }
    }
    Ok(())
}

/// Format handler: runs the download attempt for the pending session.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent. Attempt failures are
/// reported to the user, not returned.
pub async fn handle_format(
    bot: Bot,
    msg: Message,
    format: MediaFormat,
    sessions: SessionStore,
    pipeline: Arc<Pipeline>,
) -> Result<()> {
    let chat_id = msg.chat.id.0;
    let sink = TelegramSink::new(bot.clone());

    match pipeline.select(&sessions, chat_id, format, &sink).await {
        Ok(_) => {
            bot.send_message(msg.chat.id, DONE_TEXT)
                .reply_markup(get_again_keyboard())
                .await?;
        }
        Err(SelectError::NoSession) => {
            info!(chat_id, "Format chosen without a pending link");
            bot.send_message(msg.chat.id, NO_SESSION_TEXT)
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
        }
        Err(SelectError::Pipeline(e)) => {
            error!(chat_id, error = %e, "Download error");
            let text = html_escape::encode_text(&e.user_message()).into_owned();
            bot.send_message(msg.chat.id, text)
                .parse_mode(ParseMode::Html)
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
        }
    }
    Ok(())
}

/// "Download Another" handler
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_again(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, SEND_ANOTHER_TEXT)
        .reply_markup(remove_keyboard())
        .await?;
    Ok(())
}

/// Fallback for text that is neither a link nor a button
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn handle_other(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, HINT_TEXT).await?;
    Ok(())
}
