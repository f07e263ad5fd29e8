//! Conversational step engine.
//!
//! Multi-turn flows (registration, broadcast, points management, search)
//! are modelled as a closed [`Step`] enum keyed by user id. The engine
//! consumes incoming messages, mutates sessions and the database, and
//! returns [`Reply`] values that the Telegram layer renders. Side effects
//! that cannot be deferred go through the [`Transport`] trait, which tests
//! replace with a recording mock.

pub mod admin_ops;
pub mod registration;
pub mod transport;

pub use transport::{MembershipStatus, Transport};

use std::collections::HashMap;
use std::sync::Arc;

use teloxide::types::ChatId;
use tokio::sync::Mutex;

use crate::core::admin_log::AdminLog;
use crate::core::config;
use crate::core::error::AppResult;
use crate::core::rate_limiter::ActionRateLimiter;
use crate::storage::db::{self, DbPool, User};

/// Where a user currently is inside a multi-turn flow.
///
/// Flow scratch data (staged email, broadcast message id, adjustment
/// target) lives inside the variant that needs it, so a session can never
/// hold stale leftovers from another flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    AwaitingEmail,
    AwaitingPassword { email: String },
    AwaitingSearchQuery,
    AwaitingBroadcastContent,
    AwaitingBroadcastConfirm { message_id: i32 },
    AwaitingAddPointsTarget,
    AwaitingAddPointsAmount { target_id: i64 },
    AwaitingRemovePointsTarget,
    AwaitingRemovePointsAmount { target_id: i64 },
}

impl Step {
    /// Steps only an administrator may occupy.
    pub fn is_admin_only(&self) -> bool {
        !matches!(self, Step::AwaitingEmail | Step::AwaitingPassword { .. })
    }
}

/// In-memory per-user session map.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<i64, Step>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: i64) -> Option<Step> {
        self.inner.lock().await.get(&user_id).cloned()
    }

    pub async fn set(&self, user_id: i64, step: Step) {
        self.inner.lock().await.insert(user_id, step);
    }

    /// Removes the session, returning the step that was active.
    pub async fn clear(&self, user_id: i64) -> Option<Step> {
        self.inner.lock().await.remove(&user_id)
    }
}

/// Which reply keyboard should accompany a message.
///
/// Kept semantic so the engine stays free of teloxide markup types; the
/// Telegram layer maps these to actual keyboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    None,
    Main { admin: bool },
    Admin,
    Points,
    Cancel,
    BroadcastConfirm,
    /// Inline "Invite Friends" / "Back" shown with the insufficient
    /// balance message
    EarnPoints,
    /// Inline quick add/remove buttons under a profile card
    ProfileActions { user_id: i64 },
}

/// One inline button pointing at a user profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserButton {
    pub user_id: i64,
    pub label: String,
}

/// A message the engine wants sent back, as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text {
        text: String,
        keyboard: Keyboard,
    },
    /// Inline keyboard of per-user buttons (directory, search results)
    UserList {
        title: String,
        buttons: Vec<UserButton>,
    },
    /// Animated progress message: the stages are edited in place, then
    /// `done` is sent as a fresh message with the keyboard
    Progress {
        stages: Vec<String>,
        done: String,
        keyboard: Keyboard,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Reply::Text { text: text.into(), keyboard }
    }
}

/// Incoming message context, decoupled from teloxide update types.
#[derive(Debug, Clone)]
pub struct MessageCtx {
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: i32,
    pub text: String,
    pub name: String,
    pub username: Option<String>,
}

/// The step engine itself. Cheap to clone behind an `Arc` in handler deps.
pub struct StepEngine {
    pub sessions: SessionStore,
    pool: DbPool,
    broadcast_limiter: ActionRateLimiter,
    pub admin_log: AdminLog,
}

impl StepEngine {
    pub fn new(pool: DbPool) -> Self {
        Self {
            sessions: SessionStore::new(),
            pool,
            broadcast_limiter: ActionRateLimiter::new(
                config::broadcast::RATE_LIMIT_MAX,
                config::broadcast::rate_limit_window(),
            ),
            admin_log: AdminLog::default(),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        config::admin::ADMIN_IDS.contains(&user_id) || *config::admin::ADMIN_USER_ID == user_id
    }

    pub(crate) fn conn(&self) -> AppResult<db::DbConnection> {
        Ok(db::get_connection(&self.pool)?)
    }

    /// Handles /start: lazy user creation plus one-time referral
    /// attribution from the deep-link payload.
    ///
    /// The referrer alert is best effort; a blocked referrer never fails
    /// the command.
    pub async fn handle_start(
        &self,
        transport: &dyn Transport,
        ctx: &MessageCtx,
        payload: &str,
    ) -> AppResult<User> {
        let conn = self.conn()?;
        let user = db::get_or_create_user(&conn, ctx.user_id, &ctx.name, ctx.username.as_deref())?;

        if let Ok(referrer_id) = payload.trim().parse::<i64>() {
            if referrer_id != ctx.user_id
                && user.referred_by.is_none()
                && db::get_user(&conn, referrer_id)?.is_some()
                && db::set_referrer_once(&conn, ctx.user_id, referrer_id)?
            {
                db::credit_referral(&conn, referrer_id)?;
                log::info!("User {} referred by {}", ctx.user_id, referrer_id);

                let alert = format!(
                    "🔔 *Referral Alert!*\nYou earned +{} Point.",
                    config::economy::REFERRAL_REWARD
                );
                if let Err(e) = transport.send_text(ChatId(referrer_id), &alert).await {
                    log::warn!("Referral alert to {} failed: {}", referrer_id, e);
                }
            }
        }

        // Re-read so the caption shows post-referral values
        db::get_user(&conn, ctx.user_id)?.ok_or_else(|| {
            crate::core::error::AppError::NotFound(format!("user {}", ctx.user_id))
        })
    }

    /// Drops any active session and confirms the cancellation.
    pub async fn cancel(&self, user_id: i64) -> Vec<Reply> {
        let had_session = self.sessions.clear(user_id).await.is_some();
        if had_session {
            log::info!("User {} cancelled an active operation", user_id);
        }
        let keyboard = if self.is_admin(user_id) {
            Keyboard::Admin
        } else {
            Keyboard::Main { admin: false }
        };
        vec![Reply::text("🚫 Operation cancelled.", keyboard)]
    }

    /// Routes a free-text message through the active session, if any.
    ///
    /// Returns `Ok(None)` when the user has no session, so the caller can
    /// fall through to menu handling. Any error inside a step clears the
    /// session and surfaces as a generic failure reply instead of leaving
    /// the user stuck.
    pub async fn dispatch(
        &self,
        transport: &dyn Transport,
        ctx: &MessageCtx,
    ) -> AppResult<Option<Vec<Reply>>> {
        let Some(step) = self.sessions.get(ctx.user_id).await else {
            return Ok(None);
        };

        // Admins can lose the flag mid-flow; never run an admin step for
        // a non-admin, and never mutate their stale session either.
        if step.is_admin_only() && !self.is_admin(ctx.user_id) {
            log::warn!(
                "Non-admin {} attempted to continue admin step {:?}",
                ctx.user_id,
                step
            );
            return Ok(Some(vec![Reply::text(
                "❌ This area is restricted to administrators only.",
                Keyboard::Main { admin: false },
            )]));
        }

        match self.dispatch_step(transport, ctx, step).await {
            Ok(replies) => Ok(Some(replies)),
            Err(e) => {
                log::error!("Step handling failed for user {}: {}", ctx.user_id, e);
                self.sessions.clear(ctx.user_id).await;
                let keyboard = if self.is_admin(ctx.user_id) {
                    Keyboard::Admin
                } else {
                    Keyboard::Main { admin: false }
                };
                Ok(Some(vec![Reply::text(
                    "❌ Something went wrong. The operation was cancelled, please try again.",
                    keyboard,
                )]))
            }
        }
    }

    async fn dispatch_step(
        &self,
        transport: &dyn Transport,
        ctx: &MessageCtx,
        step: Step,
    ) -> AppResult<Vec<Reply>> {
        match step {
            Step::AwaitingEmail => self.on_email(ctx).await,
            Step::AwaitingPassword { email } => self.on_password(ctx, &email).await,
            Step::AwaitingSearchQuery => self.on_search_query(ctx).await,
            Step::AwaitingBroadcastContent => self.on_broadcast_content(transport, ctx).await,
            Step::AwaitingBroadcastConfirm { message_id } => {
                self.on_broadcast_confirm(transport, ctx, message_id).await
            }
            Step::AwaitingAddPointsTarget => self.on_points_target(ctx, true).await,
            Step::AwaitingAddPointsAmount { target_id } => {
                self.on_points_amount(ctx, target_id, true).await
            }
            Step::AwaitingRemovePointsTarget => self.on_points_target(ctx, false).await,
            Step::AwaitingRemovePointsAmount { target_id } => {
                self.on_points_amount(ctx, target_id, false).await
            }
        }
    }

    pub(crate) async fn acquire_broadcast_slot(&self, user_id: i64) -> bool {
        self.broadcast_limiter.try_acquire(user_id, "broadcast").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_only_steps() {
        assert!(!Step::AwaitingEmail.is_admin_only());
        assert!(!Step::AwaitingPassword { email: "a@gmail.com".into() }.is_admin_only());
        assert!(Step::AwaitingSearchQuery.is_admin_only());
        assert!(Step::AwaitingBroadcastContent.is_admin_only());
        assert!(Step::AwaitingAddPointsAmount { target_id: 1 }.is_admin_only());
    }

    #[tokio::test]
    async fn test_session_store_set_get_clear() {
        let store = SessionStore::new();
        assert!(store.get(1).await.is_none());

        store.set(1, Step::AwaitingEmail).await;
        assert_eq!(store.get(1).await, Some(Step::AwaitingEmail));

        // Independent per user
        assert!(store.get(2).await.is_none());

        assert_eq!(store.clear(1).await, Some(Step::AwaitingEmail));
        assert!(store.get(1).await.is_none());
    }
}
