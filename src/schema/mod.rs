//! Configuration schema of generatable bots and its validators

pub mod model;
pub mod validate;

pub use model::{
    ActionButton, BotConfig, Button, CallbackHandler, CommandHandler, Handler, ReplyMarkup, SaveResponse, UrlButton,
};
pub use validate::{validate, validate_block_schema, validate_config, Verdict};
