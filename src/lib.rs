#![deny(missing_docs)]
//! Telegram bot downloading Instagram Reels as video or audio.

/// Telegram transport: handlers, views and delivery.
pub mod bot;
/// Configuration management.
pub mod config;
/// Liveness endpoint.
pub mod health;
/// Link parsing, sessions and the download pipeline.
pub mod media;
