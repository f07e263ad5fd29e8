use std::sync::Arc;

use anyhow::Context;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;

use xhunter::core::{config, init_logger, logging};
use xhunter::engine::StepEngine;
use xhunter::storage;
use xhunter::telegram::{self, handlers::HandlerDeps, TelegramTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logger(&config::LOG_FILE_PATH)?;

    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN is not set; add it to .env or the environment");
    }

    logging::log_startup_configuration();

    let bot = telegram::create_bot(&config::BOT_TOKEN)?;

    let me = bot.get_me().await.context("get_me failed; check BOT_TOKEN")?;
    let bot_username = if config::BOT_USERNAME.is_empty() {
        me.username().to_string()
    } else {
        config::BOT_USERNAME.clone()
    };
    log::info!("Authorized as @{}", bot_username);

    if let Err(e) = telegram::setup_bot_commands(&bot).await {
        log::warn!("Failed to publish bot commands: {}", e);
    }

    let pool =
        storage::create_pool(&config::DATABASE_PATH).context("failed to open the database")?;

    let engine = Arc::new(StepEngine::new(pool.clone()));
    let deps = HandlerDeps {
        pool,
        engine,
        transport: Arc::new(TelegramTransport::new(bot.clone())),
        bot_username: Arc::new(bot_username),
    };

    log::info!("❝𝕏-𝐇𝐮𝐧𝐭𝐞𝐫❞ Advanced Bot Online 🚀");

    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    Dispatcher::builder(bot, telegram::handlers::schema())
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .default_handler(|upd| async move {
            log::warn!("Unhandled update: {:?}", upd);
        })
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("Dispatcher error"),
        )
        .await;

    log::info!("Shutting down");
    Ok(())
}
