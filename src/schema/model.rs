//! Typed configuration of a generatable bot
//!
//! The serialized form is the JSON stored in `bot_configs.config_json`:
//!
//! ```json
//! {
//!   "bot_name": "TestBot",
//!   "handlers": [
//!     {"command": "/start", "text": "Hi", "reply_markup": {"inline_keyboard": [[
//!       {"text": "Site", "url": "https://example.com"},
//!       {"text": "Contacts", "callback_data": "contact_info", "response": "Email: a@b"}
//!     ]]}},
//!     {"callback_query": "poll_1_option_1", "text": "...",
//!      "save_response": {"poll_id": 3, "option_text": "Yes", "thank_you_text": "Thanks"}}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::{AppError, AppResult};

/// Declarative description of one generated bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Display name, already MarkdownV2-escaped
    pub bot_name: String,
    /// Handlers in declaration order
    pub handlers: Vec<Handler>,
}

/// One trigger → response binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Handler {
    Command(CommandHandler),
    Callback(CallbackHandler),
}

/// Reacts to `/command`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandHandler {
    /// Command including the leading slash, e.g. `/start`
    pub command: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

/// Reacts to an inline button press carrying `callback_query` as its data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackHandler {
    pub callback_query: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_response: Option<SaveResponse>,
}

/// Inline keyboard wrapper, mirrors the Bot API `reply_markup` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyMarkup {
    pub inline_keyboard: Vec<Vec<Button>>,
}

/// Inline keyboard button: either a link or an action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Button {
    Url(UrlButton),
    Action(ActionButton),
}

/// Opens a URL, no bot interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlButton {
    pub text: String,
    pub url: String,
}

/// Sends `callback_data` back to the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    pub text: String,
    pub callback_data: String,
    /// Literal reply used at build time when no callback handler exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Persist the chosen poll option before answering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub poll_id: i64,
    pub option_text: String,
    pub thank_you_text: String,
}

impl BotConfig {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            handlers: Vec::new(),
        }
    }

    /// Parses a serialized configuration.
    ///
    /// A handler with neither `command` nor `callback_query` is rejected here,
    /// so a malformed configuration never reaches code generation.
    pub fn from_value(value: &Value) -> AppResult<Self> {
        let Some(handlers) = value.get("handlers").and_then(Value::as_array) else {
            return Err(AppError::Generation("configuration has no `handlers` list".to_string()));
        };
        for (idx, handler) in handlers.iter().enumerate() {
            if handler.get("command").is_none() && handler.get("callback_query").is_none() {
                return Err(AppError::Generation(format!(
                    "handler #{} has neither `command` nor `callback_query`",
                    idx + 1
                )));
            }
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn to_value(&self) -> AppResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Triggers of all explicit callback handlers, in declaration order
    pub fn callback_triggers(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().filter_map(|handler| match handler {
            Handler::Callback(callback) => Some(callback.callback_query.as_str()),
            Handler::Command(_) => None,
        })
    }

    /// All keyboard buttons of all handlers, in declaration order
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.handlers
            .iter()
            .filter_map(Handler::reply_markup)
            .flat_map(|markup| markup.inline_keyboard.iter().flatten())
    }
}

impl Handler {
    pub fn text(&self) -> &str {
        match self {
            Handler::Command(command) => &command.text,
            Handler::Callback(callback) => &callback.text,
        }
    }

    pub fn reply_markup(&self) -> Option<&ReplyMarkup> {
        match self {
            Handler::Command(command) => command.reply_markup.as_ref(),
            Handler::Callback(callback) => callback.reply_markup.as_ref(),
        }
    }
}

impl CommandHandler {
    pub fn new(command: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            text: text.into(),
            reply_markup: None,
        }
    }

    pub fn with_keyboard(mut self, rows: Vec<Vec<Button>>) -> Self {
        self.reply_markup = Some(ReplyMarkup { inline_keyboard: rows });
        self
    }

    /// Command name without the leading slash
    pub fn name(&self) -> &str {
        self.command.strip_prefix('/').unwrap_or(&self.command)
    }
}

impl CallbackHandler {
    pub fn new(callback_query: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            callback_query: callback_query.into(),
            text: text.into(),
            reply_markup: None,
            save_response: None,
        }
    }

    pub fn with_keyboard(mut self, rows: Vec<Vec<Button>>) -> Self {
        self.reply_markup = Some(ReplyMarkup { inline_keyboard: rows });
        self
    }

    pub fn saving(mut self, save_response: SaveResponse) -> Self {
        self.save_response = Some(save_response);
        self
    }
}

impl Button {
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Button::Url(UrlButton {
            text: text.into(),
            url: url.into(),
        })
    }

    pub fn action(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Button::Action(ActionButton {
            text: text.into(),
            callback_data: callback_data.into(),
            response: None,
        })
    }

    /// Action button that also carries the reply it should produce
    pub fn action_with_response(
        text: impl Into<String>,
        callback_data: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Button::Action(ActionButton {
            text: text.into(),
            callback_data: callback_data.into(),
            response: Some(response.into()),
        })
    }

    pub fn text(&self) -> &str {
        match self {
            Button::Url(button) => &button.text,
            Button::Action(button) => &button.text,
        }
    }
}

impl From<CommandHandler> for Handler {
    fn from(handler: CommandHandler) -> Self {
        Handler::Command(handler)
    }
}

impl From<CallbackHandler> for Handler {
    fn from(handler: CallbackHandler) -> Self {
        Handler::Callback(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_original_json_shape() {
        let value = json!({
            "bot_name": "TestBot",
            "handlers": [
                {
                    "command": "/start",
                    "text": "Hi",
                    "reply_markup": {"inline_keyboard": [[
                        {"text": "Site", "url": "https://example.com"},
                        {"text": "Contacts", "callback_data": "contact_info", "response": "Email"}
                    ]]}
                },
                {
                    "callback_query": "poll_1_option_1",
                    "text": "Q",
                    "save_response": {"poll_id": 3, "option_text": "Yes", "thank_you_text": "Thanks"}
                }
            ]
        });

        let config = BotConfig::from_value(&value).unwrap();
        assert_eq!(config.bot_name, "TestBot");
        assert_eq!(config.handlers.len(), 2);

        let Handler::Command(start) = &config.handlers[0] else {
            panic!("expected command handler");
        };
        assert_eq!(start.name(), "start");
        let buttons: Vec<_> = config.buttons().collect();
        assert_eq!(buttons[0], &Button::url("Site", "https://example.com"));
        assert_eq!(buttons[1], &Button::action_with_response("Contacts", "contact_info", "Email"));

        let Handler::Callback(option) = &config.handlers[1] else {
            panic!("expected callback handler");
        };
        assert_eq!(option.save_response.as_ref().map(|s| s.poll_id), Some(3));
        assert_eq!(config.callback_triggers().collect::<Vec<_>>(), vec!["poll_1_option_1"]);
    }

    #[test]
    fn test_serialization_skips_absent_fields() {
        let mut config = BotConfig::new("Bot");
        config.handlers.push(CommandHandler::new("/help", "Help").into());

        let value = config.to_value().unwrap();
        assert_eq!(
            value,
            json!({"bot_name": "Bot", "handlers": [{"command": "/help", "text": "Help"}]})
        );
    }

    #[test]
    fn test_from_value_rejects_missing_handlers() {
        let err = BotConfig::from_value(&json!({"bot_name": "Bot"})).unwrap_err();
        assert!(err.to_string().contains("handlers"));
    }

    #[test]
    fn test_from_value_rejects_triggerless_handler() {
        let value = json!({"bot_name": "Bot", "handlers": [{"text": "orphan"}]});
        let err = BotConfig::from_value(&value).unwrap_err();
        assert!(matches!(err, AppError::Generation(_)));
        assert!(err.to_string().contains("handler #1"));
    }
}
