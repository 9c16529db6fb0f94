//! Audio extraction through ffmpeg.

use crate::config::Settings;
use crate::media::error::{PipelineError, Stage};
use crate::media::process;
use crate::media::MediaFormat;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

/// Derives an audio-only file from a downloaded video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Writes `<shortcode>.mp3` next to `video` and returns its path.
    async fn extract_audio(&self, video: &Path, shortcode: &str) -> Result<PathBuf, PipelineError>;
}

/// [`Transcoder`] backed by the ffmpeg binary
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    /// Create a transcoder running `binary` with the given time budget
    #[must_use]
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Create a transcoder from application settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.ffmpeg_path.clone(), settings.transcode_timeout())
    }

    /// Output path for the audio track of `video`
    #[must_use]
    pub fn audio_path(video: &Path, shortcode: &str) -> PathBuf {
        let dir = video.parent().unwrap_or_else(|| Path::new("."));
        dir.join(format!("{shortcode}.{}", MediaFormat::Audio.extension()))
    }

    fn build_args(input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input.as_os_str().to_owned(),
            "-vn".into(),
            "-map".into(),
            "a".into(),
            // VBR, best quality
            "-q:a".into(),
            "0".into(),
            output.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_audio(&self, video: &Path, shortcode: &str) -> Result<PathBuf, PipelineError> {
        let audio = Self::audio_path(video, shortcode);
        info!(shortcode, input = %video.display(), output = %audio.display(), "Extracting audio");

        let output = process::run(
            &self.binary,
            Self::build_args(video, &audio),
            self.timeout,
            Stage::Transcode,
        )
        .await?;

        if !output.success() {
            error!(
                shortcode,
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "FFmpeg error"
            );
            return Err(PipelineError::Conversion {
                code: output.exit_code,
                stderr: output.stderr,
            });
        }

        if !tokio::fs::try_exists(&audio).await.unwrap_or(false) {
            return Err(PipelineError::FileNotFound(audio));
        }
        Ok(audio)
    }
}
