//! Telegram transport layer: bot setup, keyboards, handlers.

pub mod bot;
pub mod gate;
pub mod handlers;
pub mod menu;
pub mod transport;

pub use bot::{create_bot, setup_bot_commands, Bot, Command};
pub use transport::TelegramTransport;

use teloxide::types::InlineKeyboardButton;

/// Shorthand for an inline callback button.
pub fn cb(label: &str, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label.to_string(), data.into())
}
