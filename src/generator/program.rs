//! The bot program: what the generator emits and `run-bot` executes.
//!
//! A program is a TOML document:
//!
//! ```toml
//! [bot]
//! name = "TestBot"
//! config_id = 7
//! parse_mode = "MarkdownV2"
//! database = "/srv/botforge/bot_users.db"
//!
//! [[handler]]
//! kind = "command"
//! trigger = "start"
//! text = "Привет\\!"
//! keyboard = [
//!   [{ text = "Site", url = "https://example.com" }, { text = "Contacts", callback_data = "contact_info" }],
//! ]
//!
//! [[handler]]
//! kind = "callback"
//! trigger = "poll_1_option_1"
//! text = "..."
//!
//! [handler.save_response]
//! poll_id = 3
//! option_text = "Да"
//! thank_you_text = "Спасибо\\!"
//! ```

use serde::Deserialize;
use std::path::Path;
use strum::{AsRefStr, Display};

use crate::core::error::AppResult;
use crate::schema::SaveResponse;

/// Markup mode every generated bot uses for its whole lifetime
pub const PARSE_MODE: &str = "MarkdownV2";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotProgram {
    pub bot: ProgramHeader,
    #[serde(default, rename = "handler")]
    pub handlers: Vec<ProgramHandler>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProgramHeader {
    pub name: String,
    pub config_id: i64,
    pub parse_mode: String,
    /// Database shared with the meta-bot
    pub database: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HandlerKind {
    Command,
    Callback,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProgramHandler {
    pub kind: HandlerKind,
    /// Command name without the slash, or callback data
    pub trigger: String,
    pub text: String,
    #[serde(default)]
    pub keyboard: Vec<Vec<ProgramButton>>,
    #[serde(default)]
    pub save_response: Option<SaveResponse>,
}

/// A rendered keyboard button. Literal responses never reach this point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ProgramButton {
    Url { text: String, url: String },
    Callback { text: String, callback_data: String },
}

impl BotProgram {
    pub fn parse(source: &str) -> AppResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let source = fs_err::read_to_string(path.as_ref())?;
        Self::parse(&source)
    }

    pub fn handlers_of(&self, kind: HandlerKind) -> impl Iterator<Item = &ProgramHandler> {
        self.handlers.iter().filter(move |handler| handler.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_parse_program() {
        let source = indoc! {r#"
            [bot]
            name = "TestBot"
            config_id = 7
            parse_mode = "MarkdownV2"
            database = "bot_users.db"

            [[handler]]
            kind = "command"
            trigger = "start"
            text = "Hi\\!"
            keyboard = [
              [{ text = "Site", url = "https://example.com" }, { text = "Contacts", callback_data = "contact_info" }],
            ]

            [[handler]]
            kind = "callback"
            trigger = "poll_1_option_1"
            text = "Q"

            [handler.save_response]
            poll_id = 3
            option_text = "Yes"
            thank_you_text = "Thanks"
        "#};

        let program = BotProgram::parse(source).unwrap();
        assert_eq!(program.bot.config_id, 7);
        assert_eq!(program.handlers.len(), 2);

        let start = &program.handlers[0];
        assert_eq!(start.kind, HandlerKind::Command);
        assert_eq!(start.text, "Hi\\!");
        assert_eq!(
            start.keyboard[0][1],
            ProgramButton::Callback {
                text: "Contacts".to_string(),
                callback_data: "contact_info".to_string()
            }
        );
        assert!(start.save_response.is_none());

        let option = &program.handlers[1];
        assert_eq!(option.save_response.as_ref().map(|s| s.poll_id), Some(3));
        assert_eq!(program.handlers_of(HandlerKind::Callback).count(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(BotProgram::parse("[bot]\nname = 1").is_err());
    }
}
