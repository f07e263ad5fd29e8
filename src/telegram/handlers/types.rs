use std::sync::Arc;

use teloxide::types::{Message, User};

use crate::engine::{MessageCtx, StepEngine};
use crate::storage::db::DbPool;
use crate::telegram::TelegramTransport;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

/// Shared state cloned into every dptree branch.
#[derive(Clone)]
pub struct HandlerDeps {
    pub pool: DbPool,
    pub engine: Arc<StepEngine>,
    pub transport: Arc<TelegramTransport>,
    /// Username used to build referral deep links, without the leading '@'
    pub bot_username: Arc<String>,
}

impl HandlerDeps {
    pub fn referral_link(&self, user_id: i64) -> String {
        format!("https://t.me/{}?start={}", self.bot_username, user_id)
    }
}

/// Builds the engine-facing message context from a teloxide update.
///
/// Returns `None` for messages without an identifiable sender.
pub fn message_ctx(msg: &Message) -> Option<MessageCtx> {
    let from: &User = msg.from.as_ref()?;
    Some(MessageCtx {
        user_id: from.id.0 as i64,
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        text: msg.text().unwrap_or_default().to_string(),
        name: from.first_name.clone(),
        username: from.username.clone(),
    })
}
