//! Runtime of a generated bot.
//!
//! The supervisor starts `botforge run-bot --program <dir>/bot.toml` with the
//! bot directory as working directory. The runner loads the program, brings
//! the shared database schema up to date, builds a [`HandlerRegistry`] and
//! polls Telegram until the process is stopped.

pub mod registry;
pub mod runner;

pub use registry::{keyboard_markup, parse_command, HandlerRegistry, Reply};
pub use runner::{run, RuntimeBot};
