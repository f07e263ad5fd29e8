use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, Result};

use crate::core::config;

/// A user record as persisted in the database.
#[derive(Debug, Clone)]
pub struct User {
    /// Telegram ID of the user
    pub telegram_id: i64,
    /// Display name, "User" when Telegram provides none
    pub name: String,
    /// Telegram username, if available
    pub username: Option<String>,
    /// Point balance; never negative, debits clamp at zero
    pub points: i64,
    /// Number of users this user referred
    pub referrals: i64,
    /// User that referred this one; set at most once
    pub referred_by: Option<i64>,
    /// Completed registrations
    pub registered: i64,
    /// RFC 3339 UTC timestamp of first contact
    pub joined: String,
    /// RFC 3339 UTC timestamp of the last interaction
    pub last_active: String,
}

impl User {
    /// Display handle with a fallback for users without a username.
    pub fn handle(&self) -> &str {
        self.username.as_deref().unwrap_or("No Username")
    }
}

/// Aggregate statistics over all users.
#[derive(Debug, Clone, Default)]
pub struct GlobalStats {
    pub total_users: i64,
    pub total_points: i64,
    pub average_points: f64,
    /// Top 5 users by points, descending
    pub top_users: Vec<User>,
    /// Bottom 5 users by points, ascending
    pub bottom_users: Vec<User>,
    /// Users whose last_active date (UTC) is today
    pub active_today: i64,
    /// Total completed registrations across all users
    pub total_registered: i64,
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const USER_COLUMNS: &str =
    "telegram_id, name, username, points, referrals, referred_by, registered, joined, last_active";

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and ensures the
/// schema exists.
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    build_pool(manager, 10)
}

/// Create an in-memory pool for tests.
///
/// Uses a single connection so every caller sees the same in-memory
/// database.
pub fn create_memory_pool() -> Result<DbPool, r2d2::Error> {
    build_pool(SqliteConnectionManager::memory(), 1)
}

fn build_pool(manager: SqliteConnectionManager, max_size: u32) -> Result<DbPool, r2d2::Error> {
    let pool = Pool::builder().max_size(max_size).build(manager)?;

    let conn = pool.get()?;
    if let Err(e) = migrate_schema(&conn) {
        log::error!("Failed to migrate schema: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Creates the users table and its indexes when missing.
fn migrate_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            telegram_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL DEFAULT 'User',
            username TEXT,
            points INTEGER NOT NULL DEFAULT 0,
            referrals INTEGER NOT NULL DEFAULT 0,
            referred_by INTEGER,
            registered INTEGER NOT NULL DEFAULT 0,
            joined TEXT NOT NULL,
            last_active TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_users_points ON users(points)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_last_active ON users(last_active)",
        [],
    )?;

    Ok(())
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User> {
    Ok(User {
        telegram_id: row.get(0)?,
        name: row.get(1)?,
        username: row.get(2)?,
        points: row.get(3)?,
        referrals: row.get(4)?,
        referred_by: row.get(5)?,
        registered: row.get(6)?,
        joined: row.get(7)?,
        last_active: row.get(8)?,
    })
}

/// Fetches a user by Telegram ID.
pub fn get_user(conn: &DbConnection, telegram_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE telegram_id = ?1", USER_COLUMNS),
        [telegram_id],
        row_to_user,
    )
    .optional()
}

/// Fetches a user, creating the record lazily on first contact.
///
/// Existing users get their `last_active` timestamp touched; name and
/// username are refreshed from the latest Telegram profile data.
pub fn get_or_create_user(
    conn: &DbConnection,
    telegram_id: i64,
    name: &str,
    username: Option<&str>,
) -> Result<User> {
    let now = Utc::now().to_rfc3339();
    let display_name = if name.is_empty() { "User" } else { name };

    let updated = conn.execute(
        "UPDATE users SET last_active = ?1, name = ?2, username = ?3 WHERE telegram_id = ?4",
        rusqlite::params![now, display_name, username, telegram_id],
    )?;

    if updated == 0 {
        conn.execute(
            "INSERT INTO users (telegram_id, name, username, points, referrals, referred_by, registered, joined, last_active)
             VALUES (?1, ?2, ?3, 0, 0, NULL, 0, ?4, ?4)",
            rusqlite::params![telegram_id, display_name, username, now],
        )?;
        log::info!("Created user {} ({})", telegram_id, display_name);
    }

    get_user(conn, telegram_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Applies a signed point delta, clamped so the balance never drops below
/// zero.
///
/// The clamp happens inside a single UPDATE, so concurrent mutations of the
/// same user serialize at the store. Returns the updated user, or `None`
/// when the user does not exist.
pub fn adjust_points(conn: &DbConnection, telegram_id: i64, delta: i64) -> Result<Option<User>> {
    let updated = conn.execute(
        "UPDATE users SET points = MAX(0, points + ?1) WHERE telegram_id = ?2",
        rusqlite::params![delta, telegram_id],
    )?;

    if updated == 0 {
        return Ok(None);
    }
    get_user(conn, telegram_id)
}

/// Conditionally debits the registration cost and bumps the registration
/// counter.
///
/// The balance is re-checked inside the UPDATE itself, so a balance that
/// changed mid-flow can never be driven negative. Returns `true` when the
/// debit was applied, `false` when the balance was insufficient.
pub fn try_debit_registration(conn: &DbConnection, telegram_id: i64, cost: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE users SET points = points - ?1, registered = registered + 1
         WHERE telegram_id = ?2 AND points >= ?1",
        rusqlite::params![cost, telegram_id],
    )?;
    Ok(updated > 0)
}

/// Records the referrer for a user, only if none is set yet.
///
/// Returns `true` when the referrer was applied; a second attempt with any
/// referrer id is a no-op.
pub fn set_referrer_once(conn: &DbConnection, telegram_id: i64, referrer_id: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE users SET referred_by = ?1 WHERE telegram_id = ?2 AND referred_by IS NULL",
        rusqlite::params![referrer_id, telegram_id],
    )?;
    Ok(updated > 0)
}

/// Credits a referrer with one referral and the configured reward.
pub fn credit_referral(conn: &DbConnection, referrer_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET referrals = referrals + 1, points = points + ?1 WHERE telegram_id = ?2",
        rusqlite::params![config::economy::REFERRAL_REWARD, referrer_id],
    )?;
    Ok(())
}

/// All users ordered by points, descending.
pub fn get_all_users(conn: &DbConnection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY points DESC, telegram_id ASC",
        USER_COLUMNS
    ))?;
    let rows = stmt.query_map([], row_to_user)?;
    rows.collect()
}

/// All known user ids, for the broadcast fan-out.
pub fn list_user_ids(conn: &DbConnection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT telegram_id FROM users ORDER BY telegram_id ASC")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

/// Searches users by id equality or case-insensitive substring match on
/// name or username, bounded by `limit`.
pub fn search_users(conn: &DbConnection, query: &str, limit: usize) -> Result<Vec<User>> {
    let id_query: i64 = query.trim().parse().unwrap_or(-1);
    let pattern = format!("%{}%", query.trim().to_lowercase());

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users
         WHERE telegram_id = ?1
            OR LOWER(name) LIKE ?2
            OR LOWER(IFNULL(username, '')) LIKE ?2
         ORDER BY points DESC
         LIMIT ?3",
        USER_COLUMNS
    ))?;
    let rows = stmt.query_map(rusqlite::params![id_query, pattern, limit as i64], row_to_user)?;
    rows.collect()
}

/// Aggregates the statistics shown by the admin console.
pub fn get_global_stats(conn: &DbConnection) -> Result<GlobalStats> {
    let (total_users, total_points, total_registered): (i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*), IFNULL(SUM(points), 0), IFNULL(SUM(registered), 0) FROM users",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    if total_users == 0 {
        return Ok(GlobalStats::default());
    }

    let active_today: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE substr(last_active, 1, 10) = strftime('%Y-%m-%d', 'now')",
        [],
        |row| row.get(0),
    )?;

    let mut top_stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY points DESC, telegram_id ASC LIMIT 5",
        USER_COLUMNS
    ))?;
    let top_users: Vec<User> = top_stmt.query_map([], row_to_user)?.collect::<Result<_>>()?;

    let mut bottom_stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY points ASC, telegram_id DESC LIMIT 5",
        USER_COLUMNS
    ))?;
    let bottom_users: Vec<User> = bottom_stmt.query_map([], row_to_user)?.collect::<Result<_>>()?;

    Ok(GlobalStats {
        total_users,
        total_points,
        average_points: total_points as f64 / total_users as f64,
        top_users,
        bottom_users,
        active_today,
        total_registered,
    })
}
