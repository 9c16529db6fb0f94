//! Download attempt orchestration.
//!
//! One attempt = take the pending session, fetch into a fresh scratch scope,
//! optionally transcode, deliver, and release the scope whatever happened.

use crate::config::Settings;
use crate::media::error::PipelineError;
use crate::media::fetcher::{MediaFetcher, YtdlpFetcher};
use crate::media::scratch::ScratchDir;
use crate::media::session::{PendingSession, SessionStore};
use crate::media::transcoder::{FfmpegTranscoder, Transcoder};
use crate::media::MediaFormat;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Presence indicator shown while the bot works
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Generic "typing..."
    Typing,
    /// "sending video..."
    UploadVideo,
    /// "sending audio..."
    UploadAudio,
}

/// Outbound side of the chat transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Shows a presence indicator in the conversation
    async fn chat_action(&self, chat_id: i64, presence: Presence) -> Result<(), PipelineError>;
    /// Sends a playable video
    async fn send_video(&self, chat_id: i64, path: &Path) -> Result<(), PipelineError>;
    /// Sends an audio track
    async fn send_audio(&self, chat_id: i64, path: &Path) -> Result<(), PipelineError>;
}

/// Errors of a format selection
#[derive(Debug, Error)]
pub enum SelectError {
    /// Format chosen without a pending link
    #[error("No pending session")]
    NoSession,
    /// The attempt itself failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Runs download attempts
#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn MediaFetcher>,
    transcoder: Arc<dyn Transcoder>,
    scratch_root: PathBuf,
    max_upload_bytes: u64,
}

impl Pipeline {
    /// Create a pipeline from its collaborators
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        transcoder: Arc<dyn Transcoder>,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            fetcher,
            transcoder,
            scratch_root,
            max_upload_bytes: crate::config::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Create the yt-dlp/ffmpeg pipeline described by `settings`
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(YtdlpFetcher::from_settings(settings)),
            Arc::new(FfmpegTranscoder::from_settings(settings)),
            settings.scratch_dir.clone(),
        )
        .with_max_upload_bytes(settings.max_upload_bytes)
    }

    /// Override the upload size limit
    #[must_use]
    pub const fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Handles a format reply for `chat_id`.
    ///
    /// Consumes the pending session before the attempt starts, so the session
    /// is gone afterwards whatever the outcome. Without a session nothing is
    /// fetched, converted or sent.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::NoSession`] when no link is pending and
    /// [`SelectError::Pipeline`] when the attempt fails.
    pub async fn select(
        &self,
        sessions: &SessionStore,
        chat_id: i64,
        format: MediaFormat,
        sink: &dyn MediaSink,
    ) -> Result<PendingSession, SelectError> {
        let session = sessions.take(chat_id).await.ok_or(SelectError::NoSession)?;

        info!(
            chat_id,
            shortcode = %session.shortcode,
            format = ?format,
            "Starting download attempt"
        );

        match self.run(chat_id, &session.shortcode, format, sink).await {
            Ok(()) => {
                info!(chat_id, shortcode = %session.shortcode, "Download attempt finished");
                Ok(session)
            }
            Err(e) => {
                error!(
                    chat_id,
                    shortcode = %session.shortcode,
                    url = %session.url,
                    error = %e,
                    "Download attempt failed"
                );
                Err(e.into())
            }
        }
    }

    /// Runs one attempt in a fresh scratch scope and releases the scope on
    /// every exit path.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`] raised by fetch, transcode or
    /// delivery.
    pub async fn run(
        &self,
        chat_id: i64,
        shortcode: &str,
        format: MediaFormat,
        sink: &dyn MediaSink,
    ) -> Result<(), PipelineError> {
        let scratch = ScratchDir::acquire(&self.scratch_root, shortcode).await?;
        let result = self
            .attempt(chat_id, shortcode, format, scratch.path(), sink)
            .await;
        scratch.cleanup().await;
        result
    }

    async fn attempt(
        &self,
        chat_id: i64,
        shortcode: &str,
        format: MediaFormat,
        dir: &Path,
        sink: &dyn MediaSink,
    ) -> Result<(), PipelineError> {
        show_presence(sink, chat_id, Presence::Typing).await;

        let video = self.fetcher.fetch(shortcode, dir).await?;

        match format {
            MediaFormat::Video => {
                self.check_size(&video).await?;
                show_presence(sink, chat_id, Presence::UploadVideo).await;
                sink.send_video(chat_id, &video).await?;
            }
            MediaFormat::Audio => {
                let audio = self.transcoder.extract_audio(&video, shortcode).await?;
                self.check_size(&audio).await?;
                show_presence(sink, chat_id, Presence::UploadAudio).await;
                sink.send_audio(chat_id, &audio).await?;

                // The source video stays until the scope is released
                if let Err(e) = tokio::fs::remove_file(&audio).await {
                    warn!(path = %audio.display(), error = %e, "Failed to delete audio after delivery");
                }
            }
        }
        Ok(())
    }

    async fn check_size(&self, path: &Path) -> Result<(), PipelineError> {
        let size = tokio::fs::metadata(path).await?.len();
        if size > self.max_upload_bytes {
            return Err(PipelineError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }
        Ok(())
    }
}

/// Presence is cosmetic; failures are logged and ignored
async fn show_presence(sink: &dyn MediaSink, chat_id: i64, presence: Presence) {
    if let Err(e) = sink.chat_action(chat_id, presence).await {
        warn!(chat_id, presence = ?presence, error = %e, "Failed to send chat action");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fetcher::MockMediaFetcher;
    use crate::media::transcoder::MockTranscoder;
    use mockall::predicate::eq;
    use std::time::Duration;
    use tempfile::TempDir;

    const CHAT: i64 = 42;

    async fn sessions_with(shortcode: &str) -> SessionStore {
        let sessions = SessionStore::new(Duration::from_secs(60), 100);
        sessions
            .put(
                CHAT,
                format!("https://instagram.com/reel/{shortcode}"),
                shortcode.to_string(),
            )
            .await;
        sessions
    }

    fn fetcher_writing_video() -> MockMediaFetcher {
        let mut fetcher = MockMediaFetcher::new();
        fetcher.expect_fetch().times(1).returning(|shortcode, dir| {
            let path = dir.join(format!("{shortcode}.mp4"));
            std::fs::write(&path, b"video bytes")?;
            Ok(path)
        });
        fetcher
    }

    fn quiet_sink() -> MockMediaSink {
        let mut sink = MockMediaSink::new();
        sink.expect_chat_action().returning(|_, _| Ok(()));
        sink
    }

    fn pipeline(root: &TempDir, fetcher: MockMediaFetcher, transcoder: MockTranscoder) -> Pipeline {
        Pipeline::new(
            Arc::new(fetcher),
            Arc::new(transcoder),
            root.path().to_path_buf(),
        )
    }

    fn assert_root_empty(root: &TempDir) {
        let left: Vec<_> = std::fs::read_dir(root.path())
            .map(|rd| rd.filter_map(Result::ok).map(|e| e.path()).collect())
            .unwrap_or_default();
        assert!(left.is_empty(), "scratch root not empty: {left:?}");
    }

    #[tokio::test]
    async fn test_video_attempt_delivers_and_cleans_up() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let sessions = sessions_with("ABC123").await;

        let mut sink = MockMediaSink::new();
        sink.expect_chat_action()
            .with(eq(CHAT), eq(Presence::Typing))
            .times(1)
            .returning(|_, _| Ok(()));
        sink.expect_chat_action()
            .with(eq(CHAT), eq(Presence::UploadVideo))
            .times(1)
            .returning(|_, _| Ok(()));
        sink.expect_send_video()
            .withf(|chat, path| {
                *chat == CHAT
                    && path.file_name().is_some_and(|n| n == "ABC123.mp4")
                    && path.exists()
            })
            .times(1)
            .returning(|_, _| Ok(()));
        sink.expect_send_audio().never();

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_extract_audio().never();

        let pipeline = pipeline(&root, fetcher_writing_video(), transcoder);
        let session = pipeline
            .select(&sessions, CHAT, MediaFormat::Video, &sink)
            .await?;

        assert_eq!(session.shortcode, "ABC123");
        assert!(sessions.get(CHAT).await.is_none());
        assert_root_empty(&root);
        Ok(())
    }

    #[tokio::test]
    async fn test_audio_attempt_transcodes_then_delivers() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let sessions = sessions_with("ABC123").await;

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_extract_audio()
            .times(1)
            .returning(|video, shortcode| {
                let audio = video.with_file_name(format!("{shortcode}.mp3"));
                std::fs::write(&audio, b"audio bytes")?;
                Ok(audio)
            });

        let mut sink = quiet_sink();
        sink.expect_send_video().never();
        sink.expect_send_audio()
            .withf(|_, path| path.extension().is_some_and(|e| e == "mp3") && path.exists())
            .times(1)
            .returning(|_, _| Ok(()));

        let pipeline = pipeline(&root, fetcher_writing_video(), transcoder);
        pipeline
            .select(&sessions, CHAT, MediaFormat::Audio, &sink)
            .await?;

        assert!(sessions.get(CHAT).await.is_none());
        assert_root_empty(&root);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_session_touches_nothing() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let sessions = SessionStore::new(Duration::from_secs(60), 100);

        let mut fetcher = MockMediaFetcher::new();
        fetcher.expect_fetch().never();
        let mut transcoder = MockTranscoder::new();
        transcoder.expect_extract_audio().never();
        let mut sink = MockMediaSink::new();
        sink.expect_chat_action().never();
        sink.expect_send_video().never();
        sink.expect_send_audio().never();

        let pipeline = pipeline(&root, fetcher, transcoder);
        let res = pipeline
            .select(&sessions, CHAT, MediaFormat::Audio, &sink)
            .await;

        assert!(matches!(res, Err(SelectError::NoSession)));
        assert_root_empty(&root);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_download_is_reported_without_delivery() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let sessions = sessions_with("ABC123").await;

        let mut fetcher = MockMediaFetcher::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|shortcode, dir| {
                Err(PipelineError::FileNotFound(dir.join(format!("{shortcode}.mp4"))))
            });
        let mut sink = quiet_sink();
        sink.expect_send_video().never();

        let pipeline = pipeline(&root, fetcher, MockTranscoder::new());
        let res = pipeline
            .select(&sessions, CHAT, MediaFormat::Video, &sink)
            .await;

        assert!(matches!(
            res,
            Err(SelectError::Pipeline(PipelineError::FileNotFound(_)))
        ));
        assert!(sessions.get(CHAT).await.is_none());
        assert_root_empty(&root);
        Ok(())
    }

    #[tokio::test]
    async fn test_conversion_failure_still_cleans_up() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let sessions = sessions_with("ABC123").await;

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_extract_audio()
            .times(1)
            .returning(|video, shortcode| {
                // Partial output left behind by a failing ffmpeg
                std::fs::write(video.with_file_name(format!("{shortcode}.mp3")), b"half")?;
                Err(PipelineError::Conversion {
                    code: Some(1),
                    stderr: "Output file does not contain any stream".into(),
                })
            });
        let mut sink = quiet_sink();
        sink.expect_send_audio().never();

        let pipeline = pipeline(&root, fetcher_writing_video(), transcoder);
        let res = pipeline
            .select(&sessions, CHAT, MediaFormat::Audio, &sink)
            .await;

        assert!(matches!(
            res,
            Err(SelectError::Pipeline(PipelineError::Conversion { .. }))
        ));
        assert_root_empty(&root);
        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_file_is_not_sent() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let sessions = sessions_with("ABC123").await;

        let mut sink = quiet_sink();
        sink.expect_send_video().never();

        let pipeline = pipeline(&root, fetcher_writing_video(), MockTranscoder::new())
            .with_max_upload_bytes(4);
        let res = pipeline
            .select(&sessions, CHAT, MediaFormat::Video, &sink)
            .await;

        assert!(matches!(
            res,
            Err(SelectError::Pipeline(PipelineError::TooLarge { limit: 4, .. }))
        ));
        assert_root_empty(&root);
        Ok(())
    }

    #[tokio::test]
    async fn test_delivery_failure_still_cleans_up() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let sessions = sessions_with("ABC123").await;

        let mut sink = quiet_sink();
        sink.expect_send_video()
            .times(1)
            .returning(|_, _| Err(PipelineError::Delivery("Bad Request: file is too big".into())));

        let pipeline = pipeline(&root, fetcher_writing_video(), MockTranscoder::new());
        let res = pipeline
            .select(&sessions, CHAT, MediaFormat::Video, &sink)
            .await;

        assert!(matches!(
            res,
            Err(SelectError::Pipeline(PipelineError::Delivery(_)))
        ));
        assert!(sessions.get(CHAT).await.is_none());
        assert_root_empty(&root);
        Ok(())
    }

    #[tokio::test]
    async fn test_presence_failure_does_not_abort() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let sessions = sessions_with("ABC123").await;

        let mut sink = MockMediaSink::new();
        sink.expect_chat_action()
            .returning(|_, _| Err(PipelineError::Delivery("chat action failed".into())));
        sink.expect_send_video().times(1).returning(|_, _| Ok(()));

        let pipeline = pipeline(&root, fetcher_writing_video(), MockTranscoder::new());
        pipeline
            .select(&sessions, CHAT, MediaFormat::Video, &sink)
            .await?;
        assert_root_empty(&root);
        Ok(())
    }
}
