//! XHunter - Telegram bot with channel-gated access, a points economy and
//! an admin console.
//!
//! This library provides all the core functionality for the bot: the
//! conversational step engine, the persistence layer, the membership gate
//! and the Telegram integration.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, rate limiting, admin action log
//! - `storage`: SQLite-backed user store
//! - `engine`: Step engine driving the multi-turn flows
//! - `telegram`: Bot integration, keyboards and handlers

pub mod core;
pub mod engine;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use crate::engine::{Reply, SessionStore, Step, StepEngine, Transport};
pub use crate::storage::{create_pool, get_connection, DbConnection, DbPool};
