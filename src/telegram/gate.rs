//! Channel membership gate.
//!
//! Gated surfaces require the user to be a member of every required
//! channel. A failed lookup counts as not joined, so a private or deleted
//! channel fails closed.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode};

use crate::core::config;
use crate::engine::Transport;

use super::{cb, Bot};

pub const VERIFY_CALLBACK: &str = "verify_and_delete";

/// Checks membership in every required channel. Admins bypass the gate.
pub async fn passes_gate(transport: &dyn Transport, user_id: i64) -> bool {
    if config::admin::ADMIN_IDS.contains(&user_id) || *config::admin::ADMIN_USER_ID == user_id {
        return true;
    }

    for channel in config::REQUIRED_CHANNELS.iter() {
        match transport.membership_status(channel, UserId(user_id as u64)).await {
            Ok(status) if status.is_satisfied() => {}
            Ok(_) => return false,
            Err(e) => {
                log::warn!("Membership check for {} in {} failed: {}", user_id, channel, e);
                return false;
            }
        }
    }
    true
}

fn join_markup() -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for (i, channel) in config::REQUIRED_CHANNELS.iter().enumerate() {
        let link = format!("https://t.me/{}", channel.trim_start_matches('@'));
        if let Ok(url) = url::Url::parse(&link) {
            keyboard.push(vec![InlineKeyboardButton::url(
                format!("📢 Channel {}", i + 1),
                url,
            )]);
        }
    }
    keyboard.push(vec![cb("✅ Verify Membership", VERIFY_CALLBACK)]);
    InlineKeyboardMarkup::new(keyboard)
}

/// Sends the access-denied prompt with join buttons.
pub async fn send_join_prompt(bot: &Bot, chat_id: ChatId) -> Result<(), teloxide::RequestError> {
    let caption = "⛔️ *ACCESS DENIED*\n\nJoin all channels to continue.";

    match url::Url::parse(&config::WELCOME_IMAGE_URL) {
        Ok(image) => {
            bot.send_photo(chat_id, InputFile::url(image))
                .caption(caption)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(join_markup())
                .await?;
        }
        Err(_) => {
            bot.send_message(chat_id, caption)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(join_markup())
                .await?;
        }
    }
    Ok(())
}
