//! Pending format choices per conversation.
//!
//! A session is created when a user sends a valid link and consumed when the
//! user picks a format. Entries that are never consumed expire on their own.

use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

/// Link awaiting a format decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSession {
    /// Cleaned source link
    pub url: String,
    /// Content identifier parsed from `url`
    pub shortcode: String,
}

/// Concurrent conversation-id -> pending session map
///
/// Holds at most one entry per conversation. Safe to share between
/// dispatcher tasks; cloning is cheap and clones share the same entries.
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<i64, PendingSession>,
}

impl SessionStore {
    /// Creates a store whose entries expire after `ttl` without access.
    ///
    /// # Examples
    ///
    /// ```
    /// use reelgrab::media::session::SessionStore;
    /// use std::time::Duration;
    ///
    /// let sessions = SessionStore::new(Duration::from_secs(3600), 10_000);
    /// ```
    #[must_use]
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_idle(ttl)
            .build();
        Self { cache }
    }

    /// Stores the pending link for a conversation, replacing any previous one.
    pub async fn put(&self, conversation_id: i64, url: String, shortcode: String) {
        debug!(conversation_id, shortcode = %shortcode, "Storing pending session");
        self.cache
            .insert(conversation_id, PendingSession { url, shortcode })
            .await;
    }

    /// Returns the pending session, if any.
    pub async fn get(&self, conversation_id: i64) -> Option<PendingSession> {
        self.cache.get(&conversation_id).await
    }

    /// Deletes the pending session. Removing a missing entry is a no-op.
    pub async fn remove(&self, conversation_id: i64) {
        self.cache.invalidate(&conversation_id).await;
    }

    /// Atomically reads and removes the pending session.
    ///
    /// Two concurrent callers for the same conversation never both get
    /// `Some`.
    pub async fn take(&self, conversation_id: i64) -> Option<PendingSession> {
        self.cache.remove(&conversation_id).await
    }

    /// Number of pending sessions (approximate, for logging)
    #[must_use]
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Whether no sessions are pending (approximate)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
