//! Per-request scratch directories.
//!
//! Every download attempt stages its files in a fresh directory below the
//! scratch root. The directory is released on every exit path: explicitly
//! through [`ScratchDir::cleanup`], or by `Drop` if the attempt was
//! cancelled before reaching it.

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use anyhow::{Context, Result};
use lazy_regex::lazy_regex;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Names produced by [`ScratchDir::acquire`]: `<shortcode>-<simple uuid>`
static RE_SCOPE_NAME: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"^[A-Za-z0-9_-]{1,64}-[0-9a-f]{32}$");

/// Whether `name` looks like a scope created by this process
fn is_scope_name(name: &str) -> bool {
    RE_SCOPE_NAME.is_match(name)
}

/// Isolated staging directory owned by a single attempt
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    released: bool,
}

impl ScratchDir {
    /// Creates a fresh directory `<root>/<label>-<uuid>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn acquire(root: &Path, label: &str) -> Result<Self> {
        let name = format!("{label}-{}", Uuid::new_v4().as_simple());
        let path = root.join(name);
        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("Failed to create scratch dir {}", path.display()))?;
        debug!(path = %path.display(), "Scratch dir acquired");
        Ok(Self {
            path,
            released: false,
        })
    }

    /// Directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes every regular file in the scope, then the scope itself.
    ///
    /// Per-file failures are logged, never returned. Returns the number of
    /// files deleted.
    pub async fn cleanup(mut self) -> usize {
        self.released = true;
        let deleted = purge_files(&self.path).await;
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                error!(path = %self.path.display(), error = %e, "Failed to remove scratch dir");
            }
        }
        debug!(path = %self.path.display(), files_deleted = deleted, "Scratch dir released");
        deleted
    }
}

// Only reached when an attempt is cancelled or panics before `cleanup`.
// Blocking removal is accepted there.
impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(path = %self.path.display(), "Scratch dir dropped without cleanup, removing");
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                error!(path = %self.path.display(), error = %e, "Failed to remove scratch dir");
            }
        }
    }
}

/// Deletes every regular file directly inside `dir`, logging per-file errors.
///
/// Returns the number of files deleted.
pub async fn purge_files(dir: &Path) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                error!(path = %dir.display(), error = %e, "Failed to list scratch dir");
            }
            return 0;
        }
    };

    let mut deleted = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                error!(path = %dir.display(), error = %e, "Failed to read scratch dir entry");
                break;
            }
        };
        let path = entry.path();
        match entry.file_type().await {
            Ok(kind) if kind.is_file() => {}
            _ => continue,
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => deleted += 1,
            Err(e) => error!(path = %path.display(), error = %e, "Failed to delete file"),
        }
    }
    deleted
}

/// Creates the scratch root if absent and removes scopes left by earlier runs.
///
/// Only directories named like an attempt scope are removed; anything else
/// under the root is left alone. Nothing may be in flight when this is
/// called.
///
/// # Errors
///
/// Returns an error if the root cannot be created or listed.
pub async fn prepare_root(root: &Path) -> Result<()> {
    tokio::fs::create_dir_all(root)
        .await
        .with_context(|| format!("Failed to create scratch root {}", root.display()))?;

    let mut stale = 0usize;
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if !name.to_str().is_some_and(is_scope_name) {
            continue;
        }
        let path = entry.path();
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => stale += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale scratch dir"),
        }
    }

    if stale > 0 {
        info!(root = %root.display(), dirs_removed = stale, "Cleaned up stale scratch dirs");
    }
    Ok(())
}
