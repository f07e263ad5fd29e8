use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{MessageId, Recipient};

use crate::core::error::AppResult;
use crate::engine::{MembershipStatus, Transport};

use super::Bot;

/// Production [`Transport`] backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn copy_message(&self, to: ChatId, from: ChatId, message_id: MessageId) -> AppResult<()> {
        self.bot.copy_message(to, from, message_id).await?;
        Ok(())
    }

    async fn send_text(&self, to: ChatId, text: &str) -> AppResult<()> {
        self.bot
            .send_message(to, text)
            .parse_mode(teloxide::types::ParseMode::Markdown)
            .await?;
        Ok(())
    }

    async fn membership_status(&self, channel: &str, user: UserId) -> AppResult<MembershipStatus> {
        let member = self
            .bot
            .get_chat_member(Recipient::ChannelUsername(channel.to_string()), user)
            .await?;

        let status = if member.kind.is_banned() {
            MembershipStatus::Kicked
        } else if member.kind.is_left() {
            MembershipStatus::Left
        } else {
            MembershipStatus::Member
        };
        Ok(status)
    }
}
