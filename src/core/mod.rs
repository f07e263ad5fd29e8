//! Core utilities: configuration, errors, logging, rate limiting and the
//! in-memory admin action log.

pub mod admin_log;
pub mod config;
pub mod error;
pub mod logging;
pub mod rate_limiter;

pub use admin_log::{AdminLog, AdminLogEntry};
pub use error::{AppError, AppResult};
pub use logging::init_logger;
pub use rate_limiter::ActionRateLimiter;
