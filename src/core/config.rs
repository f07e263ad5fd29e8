use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot
/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: database.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "database.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: bot.log
pub static LOG_FILE_PATH: Lazy<String> = Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "bot.log".to_string()));

/// Bot username used for referral deep links
/// Read from BOT_USERNAME environment variable
/// When empty, the value reported by get_me at startup is used instead
pub static BOT_USERNAME: Lazy<String> = Lazy::new(|| env::var("BOT_USERNAME").unwrap_or_else(|_| String::new()));

/// Channels a user must join before the gated commands unlock
/// Read from REQUIRED_CHANNELS environment variable (comma-separated @names)
pub static REQUIRED_CHANNELS: Lazy<Vec<String>> = Lazy::new(|| {
    env::var("REQUIRED_CHANNELS")
        .map(|raw| parse_channel_list(&raw))
        .unwrap_or_else(|_| {
            vec![
                "@Unlimited_GmailA".to_string(),
                "@Global_OnlineWork".to_string(),
                "@AbModded_File".to_string(),
                "@Canva_Pro_Teams_Links".to_string(),
            ]
        })
});

/// Photo shown with the welcome message and the join prompt
/// Read from WELCOME_IMAGE_URL environment variable
pub static WELCOME_IMAGE_URL: Lazy<String> = Lazy::new(|| {
    env::var("WELCOME_IMAGE_URL")
        .unwrap_or_else(|_| "https://hayre32.wordpress.com/wp-content/uploads/2026/01/image_2026-01-24_114307874.png".to_string())
});

fn parse_channel_list(raw: &str) -> Vec<String> {
    raw.split([',', ' ', '\n'])
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else if trimmed.starts_with('@') {
                Some(trimmed.to_string())
            } else {
                Some(format!("@{}", trimmed))
            }
        })
        .collect()
}

/// Admin configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    fn parse_admin_ids(raw: &str) -> Vec<i64> {
        raw.split([',', ' ', '\n', '\t'])
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }

    /// Admin user IDs (comma-separated)
    /// Read from ADMIN_IDS environment variable
    pub static ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        env::var("ADMIN_IDS")
            .ok()
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default()
    });

    /// Admin user ID for the admin console and gate bypass
    /// Read from ADMIN_USER_ID or fallback to first ADMIN_IDS entry
    /// Defaults to 0 if not set (no admin access)
    pub static ADMIN_USER_ID: Lazy<i64> = Lazy::new(|| {
        env::var("ADMIN_USER_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .or_else(|| ADMIN_IDS.first().copied())
            .unwrap_or(0)
    });
}

/// Points economy configuration
pub mod economy {
    /// Cost of one registration, in points
    pub const REGISTRATION_COST: i64 = 5;

    /// Points credited to the referrer for each new referral
    pub const REFERRAL_REWARD: i64 = 1;
}

/// Broadcast configuration
pub mod broadcast {
    use super::Duration;

    /// Maximum broadcast invocations per admin within the rolling window
    pub const RATE_LIMIT_MAX: usize = 3;

    /// Rolling window for the broadcast rate limit (in seconds)
    pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

    /// Rate limit window duration
    pub fn rate_limit_window() -> Duration {
        Duration::from_secs(RATE_LIMIT_WINDOW_SECS)
    }
}

/// User search and directory limits
pub mod search {
    /// Maximum results returned by an admin search
    pub const RESULT_LIMIT: usize = 20;

    /// Maximum users shown in the admin directory
    pub const DIRECTORY_LIMIT: usize = 50;
}

/// Admin action log configuration
pub mod admin_log {
    /// Ring capacity; oldest entries are evicted beyond this
    pub const CAPACITY: usize = 100;

    /// Entries shown by the log viewer
    pub const VIEW_LIMIT: usize = 15;
}

/// Registration progress narrative configuration
pub mod registration {
    use super::Duration;

    /// Delay between cosmetic progress stages (in milliseconds)
    /// The narrative has no semantic effect; the debit happens up front
    pub const STAGE_DELAY_MS: u64 = 2000;

    /// Stage delay duration
    pub fn stage_delay() -> Duration {
        Duration::from_millis(STAGE_DELAY_MS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for HTTP requests to the Bot API (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_list_adds_missing_at() {
        let channels = parse_channel_list("@First, Second,,@Third");
        assert_eq!(channels, vec!["@First", "@Second", "@Third"]);
    }

    #[test]
    fn test_registration_cost_is_positive() {
        assert!(economy::REGISTRATION_COST > 0);
    }
}
