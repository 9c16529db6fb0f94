use crate::bot;
use crate::bot::handlers::{Command, Intent};
use crate::config::Settings;
use crate::media::{Pipeline, SessionStore};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};

/// Run the Telegram bot until Ctrl-C.
pub async fn run_bot(settings: Arc<Settings>) {
    let sessions = init_sessions(&settings);
    let pipeline = Arc::new(Pipeline::from_settings(&settings));
    info!(
        scratch_dir = %settings.scratch_dir.display(),
        ytdlp = %settings.ytdlp_path,
        ffmpeg = %settings.ffmpeg_path,
        "Download pipeline initialized."
    );

    let bot = Bot::new(settings.telegram_token.clone());
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![sessions, pipeline])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_sessions(settings: &Settings) -> SessionStore {
    let ttl = settings.session_ttl();
    info!(
        "Initializing SessionStore (ttl: {}s, max_size: {})",
        ttl.as_secs(),
        settings.session_max_capacity
    );
    SessionStore::new(ttl, settings.session_max_capacity)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter_map(|msg: Message| msg.text().map(Intent::classify))
                .endpoint(handle_text),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start | Command::Help => bot::handlers::start(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    intent: Intent,
    sessions: SessionStore,
    pipeline: Arc<Pipeline>,
) -> Result<(), teloxide::RequestError> {
    let res = match intent {
        Intent::Format(format) => {
            bot::handlers::handle_format(bot, msg, format, sessions, pipeline).await
        }
        Intent::Again => bot::handlers::handle_again(bot, msg).await,
        Intent::Link => bot::handlers::handle_link(bot, msg, sessions).await,
        Intent::Other => bot::handlers::handle_other(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Text handler error: {}", e);
    }
    respond(())
}
