use std::time::Duration;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::core::error::AppResult;

pub type Bot = teloxide::Bot;

/// Slash commands registered with Telegram.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Start the bot; the argument carries the referral deep link payload
    #[command(description = "Start the bot")]
    Start(String),
    #[command(description = "Show help")]
    Help,
}

/// Builds the bot with an HTTP client that won't hang forever on a stalled
/// connection.
pub fn create_bot(token: &str) -> AppResult<Bot> {
    let client = reqwest::Client::builder()
        .timeout(config::network::timeout())
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| crate::core::error::AppError::Transport(format!("HTTP client: {}", e)))?;

    Ok(Bot::with_client(token, client))
}

/// Publishes the command list shown in the Telegram UI.
pub async fn setup_bot_commands(bot: &Bot) -> AppResult<()> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}
