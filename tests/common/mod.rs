//! Shared fixtures for integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use teloxide::types::{ChatId, MessageId, UserId};

use xhunter::core::error::{AppError, AppResult};
use xhunter::engine::{MembershipStatus, MessageCtx, Reply, Transport};
use xhunter::storage::db::{self, DbPool};

pub const ADMIN_ID: i64 = 777;

/// Makes `ADMIN_ID` an administrator before the config statics are first
/// read. Safe to call from every test; only the first call does anything.
pub fn ensure_admin_env() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Config statics have not been touched yet at this point
        unsafe { std::env::set_var("ADMIN_IDS", ADMIN_ID.to_string()) };
    });
}

pub fn memory_pool() -> DbPool {
    db::create_memory_pool().unwrap()
}

pub fn seed_user(pool: &DbPool, id: i64, name: &str, points: i64) {
    let conn = db::get_connection(pool).unwrap();
    let username = format!("@{}", name.to_lowercase());
    db::get_or_create_user(&conn, id, name, Some(username.as_str())).unwrap();
    if points != 0 {
        db::adjust_points(&conn, id, points).unwrap();
    }
}

pub fn user_points(pool: &DbPool, id: i64) -> i64 {
    let conn = db::get_connection(pool).unwrap();
    db::get_user(&conn, id).unwrap().unwrap().points
}

pub fn msg(user_id: i64, text: &str) -> MessageCtx {
    msg_with_id(user_id, text, 1)
}

pub fn msg_with_id(user_id: i64, text: &str, message_id: i32) -> MessageCtx {
    MessageCtx {
        user_id,
        chat_id: user_id,
        message_id,
        text: text.to_string(),
        name: format!("User{}", user_id),
        username: Some(format!("user{}", user_id)),
    }
}

/// Flattens replies to their user-visible texts for assertions.
pub fn reply_texts(replies: &[Reply]) -> Vec<String> {
    replies
        .iter()
        .map(|r| match r {
            Reply::Text { text, .. } => text.clone(),
            Reply::Progress { done, .. } => done.clone(),
            Reply::UserList { title, .. } => title.clone(),
        })
        .collect()
}

/// Recording transport; individual recipients can be made to fail.
#[derive(Default)]
pub struct MockTransport {
    /// (to, text) pairs of every send_text call
    pub sent: Mutex<Vec<(i64, String)>>,
    /// (to, from, message_id) of every copy_message attempt, failed ones
    /// included
    pub copied: Mutex<Vec<(i64, i64, i32)>>,
    /// Chat ids whose deliveries fail
    pub failing: HashSet<i64>,
    /// Channel membership per (channel, user); missing entries use
    /// `default_membership`
    pub memberships: HashMap<(String, i64), MembershipStatus>,
    pub default_membership: Option<MembershipStatus>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            default_membership: Some(MembershipStatus::Member),
            ..Self::default()
        }
    }

    pub fn failing_for(chat_ids: &[i64]) -> Self {
        Self {
            failing: chat_ids.iter().copied().collect(),
            ..Self::new()
        }
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn copied_count(&self) -> usize {
        self.copied.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn copy_message(&self, to: ChatId, from: ChatId, message_id: MessageId) -> AppResult<()> {
        self.copied.lock().unwrap().push((to.0, from.0, message_id.0));
        if self.failing.contains(&to.0) {
            return Err(AppError::Transport(format!("forbidden: {}", to.0)));
        }
        Ok(())
    }

    async fn send_text(&self, to: ChatId, text: &str) -> AppResult<()> {
        if self.failing.contains(&to.0) {
            return Err(AppError::Transport(format!("forbidden: {}", to.0)));
        }
        self.sent.lock().unwrap().push((to.0, text.to_string()));
        Ok(())
    }

    async fn membership_status(&self, channel: &str, user: UserId) -> AppResult<MembershipStatus> {
        self.memberships
            .get(&(channel.to_string(), user.0 as i64))
            .copied()
            .or(self.default_membership)
            .ok_or_else(|| AppError::Transport(format!("no chat {}", channel)))
    }
}
