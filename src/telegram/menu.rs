//! Reply keyboard labels, keyboard builders, and reply rendering.

use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ParseMode,
    ReplyMarkup,
};

use crate::core::config;
use crate::engine::admin_ops::CONFIRM_SEND;
use crate::engine::{Keyboard, Reply};

use super::{cb, Bot};

// User menu labels
pub const REGISTER: &str = "➕ Register New Gmail";
pub const ACCOUNT: &str = "⚙️ Account";
pub const REFERRALS: &str = "🚸 My Referrals";
pub const HELP: &str = "🏥 Help";
pub const ADMIN_PANEL: &str = "🛠 Admin Panel";

// Admin menu labels
pub const STATS: &str = "📊 Statistics";
pub const BROADCAST: &str = "📢 Broadcast Message";
pub const MANAGE_POINTS: &str = "💰 Manage Points";
pub const DIRECTORY: &str = "👥 User Directory";
pub const SEARCH: &str = "🔍 Search User";
pub const LOGS: &str = "📋 Action Logs";
pub const ADD_POINTS: &str = "➕ Add Points";
pub const REMOVE_POINTS: &str = "➖ Remove Points";
pub const BACK_TO_USER: &str = "⬅️ Back to User Menu";
pub const BACK_TO_ADMIN: &str = "⬅️ Back to Admin Menu";
pub const CANCEL: &str = "❌ Cancel Operation";

fn rows(labels: &[&[&str]]) -> Vec<Vec<KeyboardButton>> {
    labels
        .iter()
        .map(|row| row.iter().map(|l| KeyboardButton::new(l.to_string())).collect())
        .collect()
}

/// Persistent main menu; admins get an extra row.
pub fn main_keyboard(admin: bool) -> KeyboardMarkup {
    let mut buttons = rows(&[&[REGISTER], &[ACCOUNT, REFERRALS], &[HELP]]);
    if admin {
        buttons.push(vec![KeyboardButton::new(ADMIN_PANEL)]);
    }
    KeyboardMarkup::new(buttons).resize_keyboard()
}

pub fn admin_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(rows(&[
        &[STATS, BROADCAST],
        &[MANAGE_POINTS, DIRECTORY],
        &[SEARCH, LOGS],
        &[BACK_TO_USER],
    ]))
    .resize_keyboard()
}

pub fn points_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(rows(&[&[ADD_POINTS, REMOVE_POINTS], &[BACK_TO_ADMIN]])).resize_keyboard()
}

pub fn cancel_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(rows(&[&[CANCEL]])).resize_keyboard()
}

pub fn broadcast_confirm_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(rows(&[&[CONFIRM_SEND], &[CANCEL]])).resize_keyboard()
}

fn earn_points_markup() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![cb("🚸 Invite Friends", "show_referral_link")],
        vec![cb("🔙 Back", "main_menu")],
    ])
}

fn profile_actions_markup(user_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        cb(ADD_POINTS, format!("quick_add:{}", user_id)),
        cb(REMOVE_POINTS, format!("quick_rem:{}", user_id)),
    ]])
}

/// Inline keyboard of the referral center.
pub fn referral_markup(link: &str) -> InlineKeyboardMarkup {
    let share = format!("https://t.me/share/url?url={}", urlencoding::encode(link));
    let mut keyboard = Vec::new();
    if let Ok(url) = url::Url::parse(&share) {
        keyboard.push(vec![InlineKeyboardButton::url("📤 Share Invite Link", url)]);
    }
    keyboard.push(vec![cb("📊 Refresh Stats", "refresh_ref")]);
    keyboard.push(vec![cb("🔙 Back", "main_menu")]);
    InlineKeyboardMarkup::new(keyboard)
}

fn markup_for(keyboard: &Keyboard) -> Option<ReplyMarkup> {
    match keyboard {
        Keyboard::None => None,
        Keyboard::Main { admin } => Some(ReplyMarkup::Keyboard(main_keyboard(*admin))),
        Keyboard::Admin => Some(ReplyMarkup::Keyboard(admin_keyboard())),
        Keyboard::Points => Some(ReplyMarkup::Keyboard(points_keyboard())),
        Keyboard::Cancel => Some(ReplyMarkup::Keyboard(cancel_keyboard())),
        Keyboard::BroadcastConfirm => Some(ReplyMarkup::Keyboard(broadcast_confirm_keyboard())),
        Keyboard::EarnPoints => Some(ReplyMarkup::InlineKeyboard(earn_points_markup())),
        Keyboard::ProfileActions { user_id } => {
            Some(ReplyMarkup::InlineKeyboard(profile_actions_markup(*user_id)))
        }
    }
}

async fn send_text(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    keyboard: &Keyboard,
) -> Result<Message, teloxide::RequestError> {
    let mut request = bot.send_message(chat_id, text).parse_mode(ParseMode::Markdown);
    if let Some(markup) = markup_for(keyboard) {
        request = request.reply_markup(markup);
    }
    request.await
}

/// Renders engine replies into actual Telegram messages.
///
/// Progress replies are animated by editing one message through its
/// stages with the configured delay; edit failures are logged and skipped
/// so a deleted message never aborts the flow.
pub async fn render_replies(
    bot: &Bot,
    chat_id: ChatId,
    replies: &[Reply],
) -> Result<(), teloxide::RequestError> {
    for reply in replies {
        match reply {
            Reply::Text { text, keyboard } => {
                send_text(bot, chat_id, text, keyboard).await?;
            }
            Reply::UserList { title, buttons } => {
                let keyboard: Vec<Vec<InlineKeyboardButton>> = buttons
                    .iter()
                    .map(|b| vec![cb(&b.label, format!("view_prof:{}", b.user_id))])
                    .collect();
                bot.send_message(chat_id, title)
                    .parse_mode(ParseMode::Markdown)
                    .reply_markup(InlineKeyboardMarkup::new(keyboard))
                    .await?;
            }
            Reply::Progress { stages, done, keyboard } => {
                let mut anchor: Option<Message> = None;
                for (i, stage) in stages.iter().enumerate() {
                    if i == 0 {
                        anchor = Some(send_text(bot, chat_id, stage, &Keyboard::None).await?);
                    } else if let Some(msg) = &anchor {
                        tokio::time::sleep(config::registration::stage_delay()).await;
                        if let Err(e) = bot
                            .edit_message_text(chat_id, msg.id, stage)
                            .parse_mode(ParseMode::Markdown)
                            .await
                        {
                            log::debug!("Progress edit skipped: {}", e);
                        }
                    }
                }
                if !stages.is_empty() {
                    tokio::time::sleep(config::registration::stage_delay()).await;
                }
                send_text(bot, chat_id, done, keyboard).await?;
            }
        }
    }
    Ok(())
}
