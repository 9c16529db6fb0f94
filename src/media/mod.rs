//! Reel download pipeline: link parsing, pending sessions, fetching,
//! transcoding and scratch-space management.

/// Attempt errors and user messages.
pub mod error;
/// yt-dlp retrieval.
pub mod fetcher;
/// Link parsing.
pub mod link;
/// Attempt orchestration.
pub mod pipeline;
/// Child process runner.
pub mod process;
/// Per-request scratch directories.
pub mod scratch;
/// Pending format choices.
pub mod session;
/// ffmpeg audio extraction.
pub mod transcoder;

pub use error::{PipelineError, Stage};
pub use pipeline::{MediaSink, Pipeline, Presence, SelectError};
pub use session::{PendingSession, SessionStore};

/// Button label for the video choice
pub const VIDEO_LABEL: &str = "MP4 🎥";
/// Button label for the audio choice
pub const AUDIO_LABEL: &str = "MP3 🎵";

/// Output format picked by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    /// Deliver the video as is
    Video,
    /// Extract and deliver the audio track
    Audio,
}

impl MediaFormat {
    /// Parses a format reply.
    ///
    /// Accepts the keyboard labels and, case-insensitively, `mp4`/`video`
    /// and `mp3`/`audio`.
    ///
    /// ```
    /// use reelgrab::media::MediaFormat;
    ///
    /// assert_eq!(MediaFormat::from_label("MP4 🎥"), Some(MediaFormat::Video));
    /// assert_eq!(MediaFormat::from_label("mp3"), Some(MediaFormat::Audio));
    /// assert_eq!(MediaFormat::from_label("hello"), None);
    /// ```
    #[must_use]
    pub fn from_label(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == VIDEO_LABEL {
            return Some(Self::Video);
        }
        if text == AUDIO_LABEL {
            return Some(Self::Audio);
        }
        match text.to_ascii_lowercase().as_str() {
            "mp4" | "video" => Some(Self::Video),
            "mp3" | "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Keyboard label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Video => VIDEO_LABEL,
            Self::Audio => AUDIO_LABEL,
        }
    }

    /// File extension of the delivered file
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Audio => "mp3",
        }
    }
}
