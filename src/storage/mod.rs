//! Persistence layer backed by SQLite.

pub mod db;

pub use db::{
    create_memory_pool, create_pool, get_connection, DbConnection, DbPool, GlobalStats, User,
};
