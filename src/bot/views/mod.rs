//! View layer for bot UI components
//!
//! Contains keyboards and message texts for the Telegram UI.

use crate::media::MediaFormat;
use teloxide::types::{KeyboardButton, KeyboardMarkup, KeyboardRemove};

/// Label of the button restarting the flow
pub const AGAIN_LABEL: &str = "📥 Download Another";

/// Welcome text for `/start` and `/help` (HTML)
pub const WELCOME_TEXT: &str = "🌟 <b>Instagram Reels Downloader Bot</b> 🌟\n\n\
    📤 <b>How to use:</b>\n\
    1. Send me an Instagram Reel link\n\
    2. Choose format (MP4 or MP3)\n\
    3. Get your file!\n\n\
    ⚠ <b>Notes:</b>\n\
    - Works with public reels only\n\
    - Files are deleted after sending\n\
    - Telegram limits uploads to 50 MB";

/// Prompt shown after a valid link
pub const CHOOSE_FORMAT_TEXT: &str = "Choose download format:";
/// Reply to a link that could not be parsed
pub const INVALID_LINK_TEXT: &str =
    "❌ Invalid Reel URL. Please send a valid public Instagram Reel link.";
/// Reply to a format choice without a pending link
pub const NO_SESSION_TEXT: &str = "⚠ Please send a Reel link first";
/// Sent after successful delivery
pub const DONE_TEXT: &str = "✅ Download complete!";
/// Reply to the restart button
pub const SEND_ANOTHER_TEXT: &str = "Send me another Instagram Reel link:";
/// Reply to text that is neither a link nor a button
pub const HINT_TEXT: &str = "📎 Send me an Instagram Reel link to get started.";

/// Caption of delivered videos
pub const VIDEO_CAPTION: &str = "Here's your Instagram Reel 📹";
/// Title of delivered audio tracks
pub const AUDIO_TITLE: &str = "Instagram Reel Audio";

/// One-time keyboard offering the two formats
///
/// # Examples
///
/// ```
/// use reelgrab::bot::views::get_format_keyboard;
/// let keyboard = get_format_keyboard();
/// assert_eq!(keyboard.keyboard[0].len(), 2);
/// ```
#[must_use]
pub fn get_format_keyboard() -> KeyboardMarkup {
    let keyboard = vec![vec![
        KeyboardButton::new(MediaFormat::Video.label()),
        KeyboardButton::new(MediaFormat::Audio.label()),
    ]];
    KeyboardMarkup::new(keyboard)
        .resize_keyboard()
        .one_time_keyboard()
}

/// Keyboard shown after a successful download
#[must_use]
pub fn get_again_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(AGAIN_LABEL)]]).resize_keyboard()
}

/// Removes any custom keyboard
#[must_use]
pub fn remove_keyboard() -> KeyboardRemove {
    KeyboardRemove::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_keyboard_labels_parse_back() {
        let keyboard = get_format_keyboard();
        let formats: Vec<_> = keyboard.keyboard[0]
            .iter()
            .map(|b| MediaFormat::from_label(&b.text))
            .collect();
        assert_eq!(
            formats,
            vec![Some(MediaFormat::Video), Some(MediaFormat::Audio)]
        );
    }

    #[test]
    fn test_again_keyboard_single_button() {
        let keyboard = get_again_keyboard();
        assert_eq!(keyboard.keyboard.len(), 1);
        assert_eq!(keyboard.keyboard[0][0].text, AGAIN_LABEL);
    }
}
