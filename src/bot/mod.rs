/// Telegram delivery of finished media
pub mod delivery;
/// Command and message handlers
pub mod handlers;
/// Dispatcher setup and bot lifecycle
pub mod runner;
/// View layer for UI components (keyboards, messages)
pub mod views;

pub use delivery::TelegramSink;
pub use runner::run_bot;
