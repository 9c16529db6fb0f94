//! Errors of a download attempt and their user-facing messages.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline step, used to label timeouts and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Content retrieval via yt-dlp
    Fetch,
    /// Audio extraction via ffmpeg
    Transcode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("download"),
            Self::Transcode => f.write_str("conversion"),
        }
    }
}

/// Errors that can end a download attempt
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Instagram refused the content (private, removed, login wall, ...)
    #[error("Content unavailable: {0}")]
    ContentUnavailable(String),
    /// Retrieval process failed for another reason
    #[error("Fetch failed: {0}")]
    Fetch(String),
    /// The expected media file is missing after a successful step
    #[error("Downloaded file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    /// ffmpeg exited non-zero
    #[error("Audio conversion failed (exit code {code:?}): {stderr}")]
    Conversion {
        /// Exit code, `None` if killed by a signal
        code: Option<i32>,
        /// Captured diagnostic output
        stderr: String,
    },
    /// A step exceeded its time budget
    #[error("{stage} timed out after {secs}s")]
    Timeout {
        /// Step that timed out
        stage: Stage,
        /// Configured budget in seconds
        secs: u64,
    },
    /// File exceeds the upload limit
    #[error("File too large: {size} bytes (limit {limit})")]
    TooLarge {
        /// Actual size in bytes
        size: u64,
        /// Configured limit in bytes
        limit: u64,
    },
    /// Sending through the chat transport failed
    #[error("Delivery failed: {0}")]
    Delivery(String),
    /// Filesystem or process spawning error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Anything else
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Message shown to the user. Plain text, escape before sending as HTML.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ContentUnavailable(_) => {
                "❌ Instagram error. The reel might be private or unavailable.".to_string()
            }
            Self::FileNotFound(_) => {
                "❌ Download failed: the downloaded file was not found.".to_string()
            }
            Self::Conversion { .. } => "❌ Audio conversion failed".to_string(),
            Self::Timeout { stage, .. } => {
                format!("⌛ The {stage} step took too long. Please try again later.")
            }
            Self::TooLarge { .. } => "❌ The file is too large to send via Telegram.".to_string(),
            Self::Fetch(_) | Self::Delivery(_) | Self::Io(_) | Self::Other(_) => {
                let detail = self.to_string();
                let shown = truncate_str(&detail, MAX_DETAIL_CHARS);
                if shown.len() < detail.len() {
                    format!("❌ Error: {shown}… (truncated)")
                } else {
                    format!("❌ Error: {shown}")
                }
            }
        }
    }
}

/// Cap on error detail shown to users. HTML escaping may grow each char up
/// to 5 bytes and Telegram rejects messages over 4096 chars.
pub const MAX_DETAIL_CHARS: usize = 700;

/// Truncates `s` to at most `max_chars` characters on a char boundary.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    s.char_indices().nth(max_chars).map_or(s, |(pos, _)| &s[..pos])
}
