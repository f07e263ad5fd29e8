use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::core::config;
use crate::engine::{Keyboard, Reply};
use crate::storage::db::{self, User};
use crate::telegram::{cb, gate, menu, Bot};

use super::types::{message_ctx, HandlerDeps, HandlerResult};

pub(super) fn referral_center_text(user: &User, link: &str) -> String {
    let earned = user.referrals * config::economy::REFERRAL_REWARD;
    format!(
        "✨ **𝕏-𝐇𝐔𝐍𝐓𝐄𝐑 AFFILIATE CENTER** ✨\n\
         ━━━━━━━━━━━━━━━━━━\n\
         👤 **User:** {}\n\
         👥 **Total Referrals:** `{}`\n\
         💰 **Total Earned:** `{} Points`\n\
         ━━━━━━━━━━━━━━━━━━\n\
         🎁 **Reward:** `{} Point` per join!\n\n\
         🔗 **Your Unique Link:**\n`{}`",
        user.name,
        user.referrals,
        earned,
        config::economy::REFERRAL_REWARD,
        link
    )
}

const HELP_TEXT: &str = "🌟 **Account Registration System** 🌟\n\n\
    ✅ **Registration Access**\n\n\
    🧢 **Allowed Limit:**\n\n\
    🤖 The robot has no restrictions on creating accounts using new methods and multiple servers.\n\n\
    You can create unlimited Gmail accounts with full automation.\n\n\
    ⚠️ For safety and long-term stability, we recommend creating 5–10 accounts per hour to avoid bans and security flags.\n\n\
    🛍️ **My Referrals System**\n\
    ☔ **Referral Tracking:**\n\n\
    📊 Your referral count is updated every 24 hours.\n\n\
    🧠 The system uses AI detection to identify fake or inactive users, and they are automatically excluded from the count.\n\n\
    ✅ Only real, valid users are recorded and rewarded.";

pub(super) async fn send_help(bot: &Bot, chat_id: ChatId) -> Result<(), teloxide::RequestError> {
    bot.send_message(chat_id, HELP_TEXT)
        .parse_mode(ParseMode::Markdown)
        .reply_markup(teloxide::types::InlineKeyboardMarkup::new(vec![vec![cb(
            "🗑️ Close Help",
            "close_help",
        )]]))
        .await?;
    Ok(())
}

/// Non-command messages: menu labels first, then the active session step.
pub async fn handle_message(bot: Bot, msg: Message, deps: HandlerDeps) -> HandlerResult {
    let Some(ctx) = message_ctx(&msg) else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    let engine = deps.engine.as_ref();
    let admin = engine.is_admin(ctx.user_id);

    match ctx.text.as_str() {
        menu::REGISTER => {
            if !gate::passes_gate(deps.transport.as_ref(), ctx.user_id).await {
                gate::send_join_prompt(&bot, chat_id).await?;
                return Ok(());
            }
            let replies = engine.begin_registration(&ctx).await?;
            menu::render_replies(&bot, chat_id, &replies).await?;
        }
        menu::ACCOUNT => {
            let conn = engine.conn()?;
            let user =
                db::get_or_create_user(&conn, ctx.user_id, &ctx.name, ctx.username.as_deref())?;
            let card = format!(
                "⭐ *PREMIUM ACCOUNT STATUS*\n\
                 ━━━━━━━━━━━━━━━━━━\n\
                 🆔 *User ID:* `{}`\n\
                 💰 *Balance:* `{} Points`\n\
                 📊 *Registered:* `{} Gmails`\n\
                 🚸 *Invites:* `{} Users`\n\
                 ━━━━━━━━━━━━━━━━━━",
                user.telegram_id, user.points, user.registered, user.referrals
            );
            menu::render_replies(&bot, chat_id, &[Reply::text(card, Keyboard::Main { admin })])
                .await?;
        }
        menu::REFERRALS => {
            let conn = engine.conn()?;
            let user =
                db::get_or_create_user(&conn, ctx.user_id, &ctx.name, ctx.username.as_deref())?;
            let link = deps.referral_link(ctx.user_id);
            bot.send_message(chat_id, referral_center_text(&user, &link))
                .parse_mode(ParseMode::Markdown)
                .reply_markup(menu::referral_markup(&link))
                .await?;
        }
        menu::HELP => {
            send_help(&bot, chat_id).await?;
        }
        menu::ADMIN_PANEL => {
            let replies = engine.admin_panel(ctx.user_id).await;
            menu::render_replies(&bot, chat_id, &replies).await?;
        }
        menu::STATS => {
            let replies = engine.admin_stats(ctx.user_id).await?;
            menu::render_replies(&bot, chat_id, &replies).await?;
        }
        menu::BROADCAST => {
            let replies = engine.begin_broadcast(ctx.user_id).await;
            menu::render_replies(&bot, chat_id, &replies).await?;
        }
        menu::MANAGE_POINTS => {
            let replies = engine.admin_points_menu(ctx.user_id).await;
            menu::render_replies(&bot, chat_id, &replies).await?;
        }
        menu::ADD_POINTS => {
            let replies = engine.begin_add_points(ctx.user_id).await;
            menu::render_replies(&bot, chat_id, &replies).await?;
        }
        menu::REMOVE_POINTS => {
            let replies = engine.begin_remove_points(ctx.user_id).await;
            menu::render_replies(&bot, chat_id, &replies).await?;
        }
        menu::DIRECTORY => {
            let replies = engine.admin_directory(ctx.user_id).await?;
            menu::render_replies(&bot, chat_id, &replies).await?;
        }
        menu::SEARCH => {
            let replies = engine.begin_search(ctx.user_id).await;
            menu::render_replies(&bot, chat_id, &replies).await?;
        }
        menu::LOGS => {
            let replies = engine.admin_logs(ctx.user_id).await;
            menu::render_replies(&bot, chat_id, &replies).await?;
        }
        menu::BACK_TO_ADMIN => {
            engine.sessions.clear(ctx.user_id).await;
            let keyboard = if admin { Keyboard::Admin } else { Keyboard::Main { admin } };
            menu::render_replies(
                &bot,
                chat_id,
                &[Reply::text("↩️ Returning to Admin Menu...", keyboard)],
            )
            .await?;
        }
        menu::BACK_TO_USER => {
            engine.sessions.clear(ctx.user_id).await;
            menu::render_replies(
                &bot,
                chat_id,
                &[Reply::text("↩️ Returning to User Menu...", Keyboard::Main { admin })],
            )
            .await?;
        }
        menu::CANCEL => {
            let replies = engine.cancel(ctx.user_id).await;
            menu::render_replies(&bot, chat_id, &replies).await?;
        }
        _ => {
            // Free text goes to the active session, if any
            if let Some(replies) = engine.dispatch(deps.transport.as_ref(), &ctx).await? {
                menu::render_replies(&bot, chat_id, &replies).await?;
            }
        }
    }

    Ok(())
}
