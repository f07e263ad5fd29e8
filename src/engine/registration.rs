//! Gmail registration flow: email, password, debit, progress narrative.

use lazy_regex::regex_is_match;

use crate::core::config;
use crate::core::error::AppResult;
use crate::storage::db;

use super::{Keyboard, MessageCtx, Reply, Step, StepEngine};

const MIN_PASSWORD_LEN: usize = 8;

fn is_valid_gmail(address: &str) -> bool {
    regex_is_match!(r"^[A-Za-z0-9._%-]+@gmail\.com$", address)
}

impl StepEngine {
    /// Entry point for the registration flow.
    ///
    /// The balance is checked here for early feedback, and checked again
    /// atomically at debit time, so a balance drained mid-flow can never
    /// go negative.
    pub async fn begin_registration(&self, ctx: &MessageCtx) -> AppResult<Vec<Reply>> {
        let conn = self.conn()?;
        let user = db::get_or_create_user(&conn, ctx.user_id, &ctx.name, ctx.username.as_deref())?;

        let cost = config::economy::REGISTRATION_COST;
        if user.points < cost {
            let needed = cost - user.points;
            return Ok(vec![Reply::text(
                format!(
                    "❌ *Insufficient Balance*\n\n\
                     ━━━━━━━━━━━━━━━━━━━━━━\n\
                     💰 *Current Balance:* `{} Points`\n\
                     📍 *Points Needed:* `{} Points`\n\
                     ━━━━━━━━━━━━━━━━━━━━━━\n\n\
                     ✨ **Ways to Earn Points:**\n\
                     🔗 Refer Friends → +{} Point per user\n\
                     🎁 Daily Bonus → +1 Point daily\n\
                     👑 Premium Tasks → +2-5 Points",
                    user.points,
                    needed,
                    config::economy::REFERRAL_REWARD
                ),
                Keyboard::EarnPoints,
            )]);
        }

        self.sessions.set(ctx.user_id, Step::AwaitingEmail).await;
        log::info!("User {} started registration", ctx.user_id);

        Ok(vec![Reply::text(
            format!(
                "🌟 *Gmail Registration Portal* 🌟\n\
                 ━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\
                 💎 *Cost:* {} Points\n\
                 📊 *Your Balance:* {} Points\n\
                 📈 *Registered:* {} Gmails\n\
                 ━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n\
                 📧 **Step 1️⃣ : Send Gmail Address**\n\n\
                 Please enter your Gmail address:\n\
                 _Example: yourname@gmail.com_\n\n\
                 ⚠️ Ensure the email is valid!",
                cost, user.points, user.registered
            ),
            Keyboard::Cancel,
        )])
    }

    pub(super) async fn on_email(&self, ctx: &MessageCtx) -> AppResult<Vec<Reply>> {
        let email = ctx.text.trim();

        if !is_valid_gmail(email) {
            // Stay on this step
            return Ok(vec![Reply::text(
                "❌ *Invalid Gmail Format*\n\n\
                 Please send a valid Gmail address:\n\
                 ✅ Valid: `yourname@gmail.com`\n\
                 ❌ Invalid: `yourname@yahoo.com`\n\n\
                 Try again:",
                Keyboard::Cancel,
            )]);
        }

        let conn = self.conn()?;
        let user = db::get_or_create_user(&conn, ctx.user_id, &ctx.name, ctx.username.as_deref())?;

        self.sessions
            .set(ctx.user_id, Step::AwaitingPassword { email: email.to_string() })
            .await;

        Ok(vec![Reply::Progress {
            stages: vec![format!(
                "⏳ *Validating Email Address...*\n\nProcessing: `{}`",
                email
            )],
            done: format!(
                "✅ *Email Validated!*\n\n\
                 📧 `{}`\n\n\
                 ━━━━━━━━━━━━━━━━━━\n\
                 💰 **Balance Check:**\n\
                 ├─ Current Balance: {} Points\n\
                 ├─ Cost: {} Points\n\
                 └─ Status: ✅ Approved\n\
                 ━━━━━━━━━━━━━━━━━━\n\n\
                 🔑 **Step 2️⃣: Send Password**\n\n\
                 Please enter the password for this account:",
                email,
                user.points,
                config::economy::REGISTRATION_COST
            ),
            keyboard: Keyboard::Cancel,
        }])
    }

    pub(super) async fn on_password(&self, ctx: &MessageCtx, email: &str) -> AppResult<Vec<Reply>> {
        if ctx.text.chars().count() < MIN_PASSWORD_LEN {
            return Ok(vec![Reply::text(
                "❌ *Password Too Weak*\n\n\
                 Requirements:\n\
                 ✓ Minimum 8 characters\n\
                 ✓ Mix of letters & numbers\n\n\
                 Try again:",
                Keyboard::Cancel,
            )]);
        }

        let conn = self.conn()?;
        let cost = config::economy::REGISTRATION_COST;

        // Conditional debit; the balance may have changed since entry
        if !db::try_debit_registration(&conn, ctx.user_id, cost)? {
            self.sessions.clear(ctx.user_id).await;
            let user = db::get_user(&conn, ctx.user_id)?;
            let points = user.map(|u| u.points).unwrap_or(0);
            log::warn!(
                "Registration aborted for {}: balance {} below cost {}",
                ctx.user_id,
                points,
                cost
            );
            return Ok(vec![Reply::text(
                format!(
                    "❌ *Insufficient Balance*\n\n\
                     Your balance changed and no longer covers the cost.\n\
                     💰 *Current Balance:* `{} Points`\n\
                     💎 *Cost:* `{} Points`\n\n\
                     The operation was cancelled and nothing was charged.\n\
                     🔗 Invite friends to earn points!",
                    points, cost
                ),
                Keyboard::EarnPoints,
            )]);
        }

        self.sessions.clear(ctx.user_id).await;

        let user = db::get_user(&conn, ctx.user_id)?.ok_or_else(|| {
            crate::core::error::AppError::NotFound(format!("user {}", ctx.user_id))
        })?;
        log::info!(
            "User {} registered {} (balance {} -> {})",
            ctx.user_id,
            email,
            user.points + cost,
            user.points
        );

        let stages = vec![
            format!(
                "⏳ *Processing Registration...*\n\n\
                 📧 Email: `{}`\n\
                 🔐 Password: Received\n\n\
                 ━━━━━━━━━━━━━━━━━━\n\
                 ⚙️ Setting up account...",
                email
            ),
            "⏳ *Processing...* 20%\n\n🔄 Validating credentials...".to_string(),
            "⏳ *Processing...* 40%\n\n🔄 Setting up account...".to_string(),
            "⏳ *Processing...* 60%\n\n🔄 Configuring settings...".to_string(),
            "⏳ *Processing...* 80%\n\n🔄 Finalizing setup...".to_string(),
        ];

        let done = format!(
            "✅ *Registration Complete!* ✅\n\
             ━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\
             📊 *Account Details:*\n\
             ├─ Email: `{}`\n\
             ├─ Status: Active ✅\n\
             └─ Created: Now\n\n\
             💰 *Payment Processed:*\n\
             ├─ Cost: -{} Points\n\
             ├─ Balance: {} Pts\n\
             └─ Accounts: {} total\n\n\
             ━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\
             🎉 Your account is ready to use!",
            email, cost, user.points, user.registered
        );

        Ok(vec![Reply::Progress {
            stages,
            done,
            keyboard: Keyboard::Main { admin: self.is_admin(ctx.user_id) },
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gmail_validation() {
        assert!(is_valid_gmail("yourname@gmail.com"));
        assert!(is_valid_gmail("a.b_c%d-e@gmail.com"));
        assert!(!is_valid_gmail("yourname@yahoo.com"));
        assert!(!is_valid_gmail("@gmail.com"));
        assert!(!is_valid_gmail("name@gmail.com extra"));
        assert!(!is_valid_gmail("name@GMAIL.com"));
    }
}
