//! Meta-bot: registration, the creation wizard and bot management over Telegram

pub mod bot;
pub mod handlers;
pub mod markdown;
pub mod session;
pub mod texts;
pub mod token;
pub mod wizard;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use session::{Session, SessionStore};
