use async_trait::async_trait;
use teloxide::types::{ChatId, MessageId, UserId};

use crate::core::error::AppResult;

/// Membership state of a user in a required channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    /// The user is a member, admin or owner of the channel
    Member,
    /// The user left the channel or never joined
    Left,
    /// The user was kicked or banned from the channel
    Kicked,
}

impl MembershipStatus {
    /// Whether this state satisfies the membership gate.
    pub fn is_satisfied(self) -> bool {
        matches!(self, MembershipStatus::Member)
    }
}

/// Messaging side effects the step engine needs from Telegram.
///
/// The engine itself returns replies as values; this trait covers the few
/// operations that cannot be deferred, like copying a staged broadcast to
/// each recipient. Tests supply a recording implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Copy a message verbatim from one chat to another.
    async fn copy_message(&self, to: ChatId, from: ChatId, message_id: MessageId) -> AppResult<()>;

    /// Send a plain text message.
    async fn send_text(&self, to: ChatId, text: &str) -> AppResult<()>;

    /// Check a user's membership in a channel (by "@name").
    async fn membership_status(&self, channel: &str, user: UserId) -> AppResult<MembershipStatus>;
}
