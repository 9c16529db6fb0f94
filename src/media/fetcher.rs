//! Content retrieval through yt-dlp.
//!
//! The fetcher downloads the video of a shortcode into the attempt's scratch
//! directory and returns the resulting path explicitly.

use crate::config::Settings;
use crate::media::error::{PipelineError, Stage};
use crate::media::process::{self, ProcessOutput};
use crate::media::MediaFormat;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// yt-dlp diagnostics meaning the content itself cannot be retrieved
const UNAVAILABLE_PATTERNS: &[&str] = &[
    "Private",
    "private",
    "login required",
    "Login required",
    "log in",
    "rate-limit reached or login required",
    "Requested content is not available",
    "is not available",
    "no longer available",
    "This content isn't available",
    "Unable to extract",
    "HTTP Error 401",
    "HTTP Error 403",
    "HTTP Error 404",
    "ERROR: Unsupported URL",
    "There is no video in this post",
    "No video formats found",
];

/// Check if yt-dlp output says the content is unavailable
fn is_unavailable_error(diagnostics: &str) -> bool {
    UNAVAILABLE_PATTERNS
        .iter()
        .any(|pattern| diagnostics.contains(pattern))
}

/// Canonical post URL for a shortcode
#[must_use]
pub fn post_url(shortcode: &str) -> String {
    format!("https://www.instagram.com/p/{shortcode}/")
}

/// Retrieves the media of a shortcode into a directory
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Downloads the video for `shortcode` into `dir` and returns its path.
    async fn fetch(&self, shortcode: &str, dir: &Path) -> Result<PathBuf, PipelineError>;
}

/// [`MediaFetcher`] backed by the yt-dlp binary
#[derive(Debug, Clone)]
pub struct YtdlpFetcher {
    binary: String,
    format: String,
    cookies_file: Option<PathBuf>,
    timeout: Duration,
}

impl YtdlpFetcher {
    /// Create a fetcher running `binary` with the given time budget
    #[must_use]
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            format: crate::config::DEFAULT_YTDLP_FORMAT.to_string(),
            cookies_file: None,
            timeout,
        }
    }

    /// Create a fetcher from application settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.ytdlp_path.clone(), settings.fetch_timeout())
            .with_format(settings.ytdlp_format.clone())
            .with_cookies(settings.cookies_file.clone())
    }

    /// Set the `-f` format selector
    #[must_use]
    pub fn with_format(mut self, format: String) -> Self {
        self.format = format;
        self
    }

    /// Use a cookies file for authenticated requests
    #[must_use]
    pub fn with_cookies(mut self, cookies_file: Option<PathBuf>) -> Self {
        self.cookies_file = cookies_file;
        self
    }

    fn build_args(&self, shortcode: &str, dir: &Path) -> Vec<OsString> {
        let template = dir.join(format!("{shortcode}.%(ext)s"));
        let mut args: Vec<OsString> = vec![
            "--no-playlist".into(),
            "--no-progress".into(),
            "--no-warnings".into(),
            "--restrict-filenames".into(),
            "-f".into(),
            self.format.clone().into(),
            "--merge-output-format".into(),
            MediaFormat::Video.extension().into(),
            "-o".into(),
            template.into_os_string(),
            "--print".into(),
            "after_move:filepath".into(),
        ];
        if let Some(ref cookies) = self.cookies_file {
            args.push("--cookies".into());
            args.push(cookies.clone().into_os_string());
        }
        args.push(post_url(shortcode).into());
        args
    }

    fn classify_failure(output: &ProcessOutput) -> PipelineError {
        let diagnostics = output.diagnostics().to_string();
        if is_unavailable_error(&diagnostics) {
            warn!(error = %diagnostics, "Instagram content unavailable");
            PipelineError::ContentUnavailable(diagnostics)
        } else {
            warn!(exit_code = ?output.exit_code, error = %diagnostics, "yt-dlp failed");
            PipelineError::Fetch(format!(
                "yt-dlp exited with {:?}: {diagnostics}",
                output.exit_code
            ))
        }
    }
}

/// Picks the video file from yt-dlp's printed paths, falling back to a scan
/// of `dir` for `<shortcode>*.mp4`.
///
/// # Errors
///
/// Returns [`PipelineError::FileNotFound`] when no candidate exists.
pub async fn locate_video(
    stdout: &str,
    shortcode: &str,
    dir: &Path,
) -> Result<PathBuf, PipelineError> {
    let extension = MediaFormat::Video.extension();

    let printed = stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .find(|p| p.extension().is_some_and(|e| e == extension));
    if let Some(path) = printed {
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(path);
        }
        debug!(path = %path.display(), "Printed path does not exist, scanning dir");
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains(shortcode) && name.ends_with(&format!(".{extension}")) {
            return Ok(entry.path());
        }
    }

    Err(PipelineError::FileNotFound(
        dir.join(format!("{shortcode}.{extension}")),
    ))
}

#[async_trait]
impl MediaFetcher for YtdlpFetcher {
    async fn fetch(&self, shortcode: &str, dir: &Path) -> Result<PathBuf, PipelineError> {
        info!(shortcode, dir = %dir.display(), "Fetching reel");
        let args = self.build_args(shortcode, dir);
        let output = process::run(&self.binary, args, self.timeout, Stage::Fetch).await?;

        if !output.success() {
            return Err(Self::classify_failure(&output));
        }

        let path = locate_video(&output.stdout, shortcode, dir).await?;
        info!(shortcode, path = %path.display(), "Reel downloaded");
        Ok(path)
    }
}
