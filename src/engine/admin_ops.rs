//! Admin console operations: statistics, search, directory, broadcast and
//! points management.

use std::time::Instant;

use chrono::Utc;
use once_cell::sync::Lazy;
use serde_json::json;
use teloxide::types::{ChatId, MessageId};

use crate::core::config;
use crate::core::error::AppResult;
use crate::storage::db::{self, GlobalStats, User};

use super::{Keyboard, MessageCtx, Reply, Step, StepEngine, Transport, UserButton};

/// Exact text of the broadcast confirmation button.
pub const CONFIRM_SEND: &str = "✅ CONFIRM & SEND";

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

const RESTRICTED: &str = "❌ This area is restricted to administrators only.";

impl StepEngine {
    // ---- console entry points -------------------------------------------

    pub async fn admin_panel(&self, user_id: i64) -> Vec<Reply> {
        if !self.is_admin(user_id) {
            return vec![Reply::text(RESTRICTED, Keyboard::Main { admin: false })];
        }
        self.admin_log.record("ACCESS_PANEL", json!({ "userId": user_id }));
        vec![Reply::text(
            "╔════════════════════════════════╗\n\
             ║ 🛠️  ADMIN CONTROL PANEL 🛠️   ║\n\
             ╚════════════════════════════════╝\n\n\
             Select a management tool:",
            Keyboard::Admin,
        )]
    }

    pub async fn admin_stats(&self, user_id: i64) -> AppResult<Vec<Reply>> {
        if !self.is_admin(user_id) {
            return Ok(vec![]);
        }
        let conn = self.conn()?;
        let stats = db::get_global_stats(&conn)?;
        self.admin_log.record("VIEW_STATS", json!({}));
        Ok(vec![Reply::text(format_stats(&stats), Keyboard::Admin)])
    }

    pub async fn admin_directory(&self, user_id: i64) -> AppResult<Vec<Reply>> {
        if !self.is_admin(user_id) {
            return Ok(vec![]);
        }
        let conn = self.conn()?;
        let users = db::get_all_users(&conn)?;
        if users.is_empty() {
            return Ok(vec![Reply::text("📭 Database is empty.", Keyboard::Admin)]);
        }

        let buttons = users
            .iter()
            .take(config::search::DIRECTORY_LIMIT)
            .map(|u| UserButton {
                user_id: u.telegram_id,
                label: format!("{} - 💰 {}", u.name, u.points),
            })
            .collect();

        self.admin_log.record("VIEW_DIRECTORY", json!({ "count": users.len() }));

        Ok(vec![Reply::UserList {
            title: format!("📂 **USER DIRECTORY** ({} total)\n━━━━━━━━━━━━━━━━", users.len()),
            buttons,
        }])
    }

    pub async fn admin_logs(&self, user_id: i64) -> Vec<Reply> {
        if !self.is_admin(user_id) {
            return vec![];
        }
        let logs = self.admin_log.recent(config::admin_log::VIEW_LIMIT);
        let formatted = if logs.is_empty() {
            "No recent actions".to_string()
        } else {
            logs.iter()
                .enumerate()
                .map(|(i, entry)| {
                    format!(
                        "{}. **{}** ({})",
                        i + 1,
                        entry.action,
                        entry.timestamp.format("%H:%M:%S")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        vec![Reply::text(
            format!(
                "╔══════════════════════════════════════════╗\n\
                 ║      📋 RECENT ADMIN ACTIONS LOG 📋      ║\n\
                 ╚══════════════════════════════════════════╝\n\n\
                 {}\n\n\
                 ✏️ *Total Actions Logged:* {}",
                formatted,
                self.admin_log.len()
            ),
            Keyboard::Admin,
        )]
    }

    pub async fn admin_points_menu(&self, user_id: i64) -> Vec<Reply> {
        if !self.is_admin(user_id) {
            return vec![];
        }
        vec![Reply::text("💰 **Points Management**", Keyboard::Points)]
    }

    pub async fn begin_search(&self, user_id: i64) -> Vec<Reply> {
        if !self.is_admin(user_id) {
            return vec![];
        }
        self.sessions.set(user_id, Step::AwaitingSearchQuery).await;
        vec![Reply::text("🔍 **Enter user ID, name, or username:**", Keyboard::Cancel)]
    }

    pub async fn begin_broadcast(&self, user_id: i64) -> Vec<Reply> {
        if !self.is_admin(user_id) {
            return vec![];
        }
        self.sessions.set(user_id, Step::AwaitingBroadcastContent).await;
        vec![Reply::text(
            "📢 **Advanced Broadcast System**\n\n➡️ Send your message now...",
            Keyboard::Cancel,
        )]
    }

    pub async fn begin_add_points(&self, user_id: i64) -> Vec<Reply> {
        if !self.is_admin(user_id) {
            return vec![];
        }
        self.sessions.set(user_id, Step::AwaitingAddPointsTarget).await;
        vec![Reply::text("➕ **Enter User ID to add points:**", Keyboard::Cancel)]
    }

    pub async fn begin_remove_points(&self, user_id: i64) -> Vec<Reply> {
        if !self.is_admin(user_id) {
            return vec![];
        }
        self.sessions.set(user_id, Step::AwaitingRemovePointsTarget).await;
        vec![Reply::text("➖ **Enter User ID to remove points:**", Keyboard::Cancel)]
    }

    /// Jumps straight to the amount step from a profile card button.
    pub async fn begin_quick_adjust(&self, user_id: i64, target_id: i64, add: bool) -> Vec<Reply> {
        if !self.is_admin(user_id) {
            return vec![];
        }
        let (step, prompt) = if add {
            (
                Step::AwaitingAddPointsAmount { target_id },
                format!("💰 **Enter points to add for ID {}:**", target_id),
            )
        } else {
            (
                Step::AwaitingRemovePointsAmount { target_id },
                format!("💰 **Enter points to remove for ID {}:**", target_id),
            )
        };
        self.sessions.set(user_id, step).await;
        vec![Reply::text(prompt, Keyboard::Cancel)]
    }

    pub async fn user_profile(&self, admin_id: i64, target_id: i64) -> AppResult<Vec<Reply>> {
        if !self.is_admin(admin_id) {
            return Ok(vec![]);
        }
        let conn = self.conn()?;
        let Some(user) = db::get_user(&conn, target_id)? else {
            return Ok(vec![Reply::text("❌ User not found.", Keyboard::Admin)]);
        };
        Ok(vec![Reply::Text {
            text: format_profile(&user),
            keyboard: Keyboard::ProfileActions { user_id: target_id },
        }])
    }

    // ---- step handlers ---------------------------------------------------

    pub(super) async fn on_search_query(&self, ctx: &MessageCtx) -> AppResult<Vec<Reply>> {
        let query = ctx.text.trim();
        if query.is_empty() {
            // Stay on this step
            return Ok(vec![Reply::text(
                "🔍 **Enter user ID, name, or username:**",
                Keyboard::Cancel,
            )]);
        }

        let conn = self.conn()?;
        let results = db::search_users(&conn, query, config::search::RESULT_LIMIT)?;
        if results.is_empty() {
            return Ok(vec![Reply::text("❌ No users found.", Keyboard::Cancel)]);
        }

        self.sessions.clear(ctx.user_id).await;

        let buttons = results
            .iter()
            .map(|u| UserButton {
                user_id: u.telegram_id,
                label: format!("{} - {}", u.name, u.handle()),
            })
            .collect::<Vec<_>>();

        Ok(vec![Reply::UserList {
            title: format!("🔍 **Found {} results:**\n━━━━━━━━━━━━━━━━", results.len()),
            buttons,
        }])
    }

    pub(super) async fn on_broadcast_content(
        &self,
        transport: &dyn Transport,
        ctx: &MessageCtx,
    ) -> AppResult<Vec<Reply>> {
        self.sessions
            .set(ctx.user_id, Step::AwaitingBroadcastConfirm { message_id: ctx.message_id })
            .await;

        // Echo the staged message back so the admin sees the exact
        // rendition recipients will get
        if let Err(e) = transport
            .copy_message(ChatId(ctx.chat_id), ChatId(ctx.chat_id), MessageId(ctx.message_id))
            .await
        {
            log::warn!("Broadcast preview echo failed: {}", e);
        }

        Ok(vec![
            Reply::text("👇 **PREVIEW:**", Keyboard::None),
            Reply::text("✅ Confirm & Send?", Keyboard::BroadcastConfirm),
        ])
    }

    pub(super) async fn on_broadcast_confirm(
        &self,
        transport: &dyn Transport,
        ctx: &MessageCtx,
        message_id: i32,
    ) -> AppResult<Vec<Reply>> {
        if ctx.text != CONFIRM_SEND {
            // Anything but the exact confirmation phrase is ignored; the
            // session stays armed until confirmed or cancelled
            return Ok(vec![]);
        }

        if !self.acquire_broadcast_slot(ctx.user_id).await {
            // Session stays armed so the admin can retry after cooldown
            return Ok(vec![Reply::text(
                "⏱️ **Rate Limit:** Too many broadcasts. Please wait before trying again.",
                Keyboard::BroadcastConfirm,
            )]);
        }

        let targets = {
            let conn = self.conn()?;
            db::list_user_ids(&conn)?
        };

        if targets.is_empty() {
            self.sessions.clear(ctx.user_id).await;
            return Ok(vec![Reply::text("❌ No users found for broadcast.", Keyboard::Admin)]);
        }

        let total = targets.len();
        let mut sent = 0usize;
        let mut failed = 0usize;

        // Sequential fan-out; one blocked recipient never aborts the rest
        for target in targets {
            match transport
                .copy_message(ChatId(target), ChatId(ctx.chat_id), MessageId(message_id))
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => {
                    failed += 1;
                    log::warn!("Broadcast to {} failed: {}", target, e);
                }
            }
        }

        self.sessions.clear(ctx.user_id).await;
        self.admin_log.record(
            "BROADCAST",
            json!({ "sent": sent, "failed": failed, "total": total }),
        );

        Ok(vec![
            Reply::text(
                format!("📡 **Broadcasting to {} users...**\n\n⏳ Processing...", total),
                Keyboard::None,
            ),
            Reply::text(
                format!(
                    "✅ **BROADCAST COMPLETE**\n\n\
                     ✔️ Sent: {}\n\
                     ❌ Failed: {}\n\
                     📊 Success Rate: {:.1}%",
                    sent,
                    failed,
                    sent as f64 / total as f64 * 100.0
                ),
                Keyboard::Admin,
            ),
        ])
    }

    pub(super) async fn on_points_target(&self, ctx: &MessageCtx, add: bool) -> AppResult<Vec<Reply>> {
        let Ok(target_id) = ctx.text.trim().parse::<i64>() else {
            return Ok(vec![Reply::text("❌ User not found.", Keyboard::Cancel)]);
        };

        let conn = self.conn()?;
        if db::get_user(&conn, target_id)?.is_none() {
            // Stay on this step
            return Ok(vec![Reply::text("❌ User not found.", Keyboard::Cancel)]);
        }

        let (step, prompt) = if add {
            (Step::AwaitingAddPointsAmount { target_id }, "💰 **Enter points amount:**")
        } else {
            (Step::AwaitingRemovePointsAmount { target_id }, "💰 **Enter points to remove:**")
        };
        self.sessions.set(ctx.user_id, step).await;
        Ok(vec![Reply::text(prompt, Keyboard::Cancel)])
    }

    pub(super) async fn on_points_amount(
        &self,
        ctx: &MessageCtx,
        target_id: i64,
        add: bool,
    ) -> AppResult<Vec<Reply>> {
        let amount = match ctx.text.trim().parse::<i64>() {
            Ok(n) if n >= 0 => n,
            _ => {
                return Ok(vec![Reply::text(
                    "❌ Enter a valid positive number.",
                    Keyboard::Cancel,
                )]);
            }
        };

        let delta = if add { amount } else { -amount };
        let conn = self.conn()?;
        let Some(updated) = db::adjust_points(&conn, target_id, delta)? else {
            self.sessions.clear(ctx.user_id).await;
            return Ok(vec![Reply::text("❌ User not found.", Keyboard::Admin)]);
        };

        self.sessions.clear(ctx.user_id).await;
        let reason = if add { "Admin manual addition" } else { "Admin manual removal" };
        self.admin_log.record(
            "POINTS_UPDATE",
            json!({
                "userId": target_id,
                "newPoints": updated.points,
                "change": delta,
                "reason": reason,
            }),
        );
        log::info!(
            "Admin {} adjusted points of {} by {} (now {})",
            ctx.user_id,
            target_id,
            delta,
            updated.points
        );

        let confirmation = if add {
            format!("✅ Added {} points to user {}", amount, target_id)
        } else {
            format!("✅ Removed {} points from user {}", amount, target_id)
        };
        Ok(vec![Reply::text(confirmation, Keyboard::Admin)])
    }
}

// ---- formatters ----------------------------------------------------------

fn format_stats(stats: &GlobalStats) -> String {
    let ranking = |users: &[User]| {
        if users.is_empty() {
            "—".to_string()
        } else {
            users
                .iter()
                .enumerate()
                .map(|(i, u)| format!("{}. {} ({}) • {} pts", i + 1, u.name, u.handle(), u.points))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };

    format!(
        "╔══════════════════════════════════════════╗\n\
         ║     📊 ADVANCED SERVER STATISTICS 📊     ║\n\
         ╚══════════════════════════════════════════╝\n\n\
         👥 **Total Users:** {}\n\
         🎯 **Total Points Distributed:** {}\n\
         📈 **Average Points/User:** {:.2}\n\
         📬 **Gmails Registered:** {}\n\
         🔥 **Active Today:** {}\n\
         ⏰ **Updated:** {}\n\n\
         ┌─ 🏆 TOP 5 USERS ─────────────────────────┐\n\
         {}\n\
         └──────────────────────────────────────────┘\n\n\
         ┌─ ⬇️  BOTTOM 5 USERS ──────────────────────┐\n\
         {}\n\
         └──────────────────────────────────────────┘\n\n\
         🔐 **Server Status:** ✅ OPERATIONAL\n\
         📡 **Uptime:** {:.1}h",
        stats.total_users,
        stats.total_points,
        stats.average_points,
        stats.total_registered,
        stats.active_today,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        ranking(&stats.top_users),
        ranking(&stats.bottom_users),
        STARTED_AT.elapsed().as_secs_f64() / 3600.0
    )
}

fn format_profile(user: &User) -> String {
    let joined = user.joined.get(..10).unwrap_or(&user.joined);
    let last_active = user.last_active.get(..10).unwrap_or(&user.last_active);
    let age_days = chrono::DateTime::parse_from_rfc3339(&user.joined)
        .map(|d| (Utc::now() - d.with_timezone(&Utc)).num_days())
        .unwrap_or(0);

    format!(
        "╔══════════════════════════════════════════╗\n\
         ║        👤 USER PROFILE DETAILS 👤        ║\n\
         ╚══════════════════════════════════════════╝\n\n\
         🆔 **User ID:** `{}`\n\
         📝 **Name:** {}\n\
         🔗 **Username:** {}\n\
         💰 **Points:** {}\n\
         📅 **Joined:** {}\n\
         🕐 **Last Active:** {}\n\
         ⏳ **Account Age:** {} days",
        user.telegram_id,
        user.name,
        user.handle(),
        user.points,
        joined,
        last_active,
        age_days
    )
}
