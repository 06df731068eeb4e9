//! Botforge - Telegram bot that builds and runs other Telegram bots
//!
//! Users answer a short interview in Telegram; the answers become a bot
//! configuration, the configuration is compiled into a bot program, and the
//! program runs as its own supervised OS process.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, escaping and input checks
//! - `schema`: configuration model and its two validators
//! - `generator`: compiles a configuration into a bot program
//! - `runtime`: runs one generated bot program
//! - `supervisor`: one OS process per generated bot
//! - `storage`: database pool, migrations and table accessors
//! - `templates`: business card, FAQ and poll configuration builders
//! - `provision`: validate, persist, generate and launch in one step
//! - `telegram`: the meta-bot itself

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod cli;
pub mod core;
pub mod generator;
pub mod provision;
pub mod runtime;
pub mod schema;
pub mod storage;
pub mod supervisor;
pub mod telegram;
pub mod templates;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
