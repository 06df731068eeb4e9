//! Relational store shared by the meta-bot and every generated bot

pub mod db;
pub mod migrations;

// Re-exports for convenience
pub use db::{create_pool, get_connection, BotRecord, DbConnection, DbPool, User};
