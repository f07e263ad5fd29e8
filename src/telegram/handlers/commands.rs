use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};

use crate::core::config;
use crate::storage::db::User;
use crate::telegram::{gate, menu, Bot};

use super::types::{message_ctx, HandlerDeps, HandlerResult};
use super::messages;

pub(super) fn welcome_caption(user: &User) -> String {
    format!(
        "👋 *Welcome to ❝𝕏-𝐇𝐮𝐧𝐭𝐞𝐫❞*\n\n\
         👤 *User:* {}\n\
         💰 *Balance:* `{} Points`\n\n\
         Invite friends to earn points!",
        user.name, user.points
    )
}

/// Sends the photo welcome card with the main menu attached.
pub(super) async fn send_welcome(
    bot: &Bot,
    chat_id: ChatId,
    user: &User,
    admin: bool,
) -> Result<(), teloxide::RequestError> {
    let caption = welcome_caption(user);
    match url::Url::parse(&config::WELCOME_IMAGE_URL) {
        Ok(image) => {
            bot.send_photo(chat_id, InputFile::url(image))
                .caption(caption)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(menu::main_keyboard(admin))
                .await?;
        }
        Err(_) => {
            bot.send_message(chat_id, caption)
                .parse_mode(ParseMode::Markdown)
                .reply_markup(menu::main_keyboard(admin))
                .await?;
        }
    }
    Ok(())
}

/// /start, with an optional referral payload from the deep link.
pub async fn handle_start(
    bot: Bot,
    msg: Message,
    payload: String,
    deps: HandlerDeps,
) -> HandlerResult {
    let Some(ctx) = message_ctx(&msg) else {
        return Ok(());
    };

    if !gate::passes_gate(deps.transport.as_ref(), ctx.user_id).await {
        gate::send_join_prompt(&bot, msg.chat.id).await?;
        return Ok(());
    }

    let user = deps
        .engine
        .handle_start(deps.transport.as_ref(), &ctx, &payload)
        .await?;

    send_welcome(&bot, msg.chat.id, &user, deps.engine.is_admin(ctx.user_id)).await?;
    Ok(())
}

pub async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    messages::send_help(&bot, msg.chat.id).await?;
    Ok(())
}
