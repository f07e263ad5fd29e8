use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::storage::db;
use crate::telegram::{gate, menu, Bot};

use super::commands::send_welcome;
use super::messages::referral_center_text;
use super::types::{HandlerDeps, HandlerResult};

async fn delete_origin(bot: &Bot, q: &CallbackQuery) {
    if let Some(msg) = q.regular_message() {
        if let Err(e) = bot.delete_message(msg.chat.id, msg.id).await {
            log::debug!("Could not delete callback message: {}", e);
        }
    }
}

pub async fn handle_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> HandlerResult {
    let Some(data) = q.data.clone() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let user_id = q.from.id.0 as i64;
    let engine = deps.engine.as_ref();
    let chat_id = q
        .regular_message()
        .map(|m| m.chat.id)
        .unwrap_or(ChatId(user_id));

    match data.as_str() {
        gate::VERIFY_CALLBACK => {
            if !gate::passes_gate(deps.transport.as_ref(), user_id).await {
                bot.answer_callback_query(q.id.clone())
                    .text("❌ Join all channels!")
                    .show_alert(true)
                    .await?;
                return Ok(());
            }

            delete_origin(&bot, &q).await;
            bot.answer_callback_query(q.id.clone())
                .text("Success! Welcome ✅")
                .await?;

            let conn = engine.conn()?;
            let user = db::get_or_create_user(
                &conn,
                user_id,
                &q.from.first_name,
                q.from.username.as_deref(),
            )?;
            send_welcome(&bot, chat_id, &user, engine.is_admin(user_id)).await?;
        }
        "main_menu" => {
            bot.answer_callback_query(q.id.clone()).await?;
            delete_origin(&bot, &q).await;
            bot.send_message(chat_id, "🏠 Welcome back to the Main Menu")
                .reply_markup(menu::main_keyboard(engine.is_admin(user_id)))
                .await?;
        }
        "show_referral_link" => {
            bot.answer_callback_query(q.id.clone()).await?;
            delete_origin(&bot, &q).await;

            let link = deps.referral_link(user_id);
            bot.send_message(
                chat_id,
                format!(
                    "✨ **𝕏-𝐇𝐔𝐍𝐓𝐄𝐑 AFFILIATE CENTER** ✨\n\
                     ━━━━━━━━━━━━━━━━━━\n\
                     🔗 **Your Unique Link:**\n`{}`",
                    link
                ),
            )
            .parse_mode(ParseMode::Markdown)
            .reply_markup(menu::referral_markup(&link))
            .await?;
        }
        "refresh_ref" => {
            bot.answer_callback_query(q.id.clone())
                .text("Stats Updated! ✅")
                .await?;

            let conn = engine.conn()?;
            let user = db::get_or_create_user(
                &conn,
                user_id,
                &q.from.first_name,
                q.from.username.as_deref(),
            )?;
            let link = deps.referral_link(user_id);

            if let Some(msg) = q.regular_message() {
                // Editing an unchanged message fails; that is fine
                if let Err(e) = bot
                    .edit_message_text(msg.chat.id, msg.id, referral_center_text(&user, &link))
                    .parse_mode(ParseMode::Markdown)
                    .reply_markup(menu::referral_markup(&link))
                    .await
                {
                    log::debug!("Referral refresh edit skipped: {}", e);
                }
            }
        }
        "close_help" => {
            delete_origin(&bot, &q).await;
            bot.answer_callback_query(q.id.clone())
                .text("Message marked as read ✅")
                .await?;
        }
        other => {
            if let Some(target) = other.strip_prefix("view_prof:") {
                if !engine.is_admin(user_id) {
                    bot.answer_callback_query(q.id.clone()).text("❌ Access denied").await?;
                    return Ok(());
                }
                bot.answer_callback_query(q.id.clone()).await?;
                if let Ok(target_id) = target.parse::<i64>() {
                    let replies = engine.user_profile(user_id, target_id).await?;
                    menu::render_replies(&bot, chat_id, &replies).await?;
                }
            } else if let Some(target) = other.strip_prefix("quick_add:") {
                quick_adjust(&bot, &q, &deps, chat_id, target, true).await?;
            } else if let Some(target) = other.strip_prefix("quick_rem:") {
                quick_adjust(&bot, &q, &deps, chat_id, target, false).await?;
            } else {
                log::debug!("Unhandled callback data: {}", other);
                bot.answer_callback_query(q.id.clone()).await?;
            }
        }
    }

    Ok(())
}

async fn quick_adjust(
    bot: &Bot,
    q: &CallbackQuery,
    deps: &HandlerDeps,
    chat_id: ChatId,
    target: &str,
    add: bool,
) -> HandlerResult {
    let user_id = q.from.id.0 as i64;
    if !deps.engine.is_admin(user_id) {
        bot.answer_callback_query(q.id.clone()).text("❌ Access denied").await?;
        return Ok(());
    }
    bot.answer_callback_query(q.id.clone()).await?;

    if let Ok(target_id) = target.parse::<i64>() {
        let replies = deps.engine.begin_quick_adjust(user_id, target_id, add).await;
        menu::render_replies(bot, chat_id, &replies).await?;
    }
    Ok(())
}
