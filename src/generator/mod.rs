//! Compiles a bot configuration into a standalone bot program.
//!
//! [`Generator::render`] is a pure function of the configuration and its id:
//! the same input always yields byte-identical output. The emitted program
//! carries everything the generated bot needs at runtime (texts, keyboards,
//! save directives, its own config id and the database path), so the bot
//! process shares no in-memory state with the meta-bot.
//!
//! Generation does not validate. Callers run [`crate::schema::validate`]
//! first; only a configuration that cannot be read at all is rejected here.

pub mod program;

use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::core::error::{AppError, AppResult};
use crate::core::escape::quote_literal;
use crate::schema::{BotConfig, Button, CallbackHandler, Handler, ReplyMarkup, SaveResponse};

pub use program::{BotProgram, HandlerKind, ProgramButton, ProgramHandler, PARSE_MODE};

/// Emits bot programs bound to one database
#[derive(Debug, Clone)]
pub struct Generator {
    database_path: String,
}

impl Generator {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn database_path(&self) -> &str {
        &self.database_path
    }

    /// Renders `config` and writes it to `destination`.
    ///
    /// The program is written to `<destination>.tmp` and renamed into place,
    /// so a failed generation never leaves a half-written file behind.
    pub fn generate(&self, config: &Value, destination: &Path, config_id: i64) -> AppResult<String> {
        let config = BotConfig::from_value(config)?;
        let source = self.render(&config, config_id)?;
        write_atomically(destination, &source)?;

        log::info!(
            "Generated program for config {} ({} bytes) at {}",
            config_id,
            source.len(),
            destination.display()
        );
        Ok(source)
    }

    /// Renders the program text for `config`
    pub fn render(&self, config: &BotConfig, config_id: i64) -> AppResult<String> {
        let mut out = String::with_capacity(1024);

        out.push_str("# Generated by botforge. Regenerate from the configuration instead of editing.\n\n");
        out.push_str("[bot]\n");
        push_key(&mut out, "name", &quote_literal(&config.bot_name));
        push_key(&mut out, "config_id", &config_id.to_string());
        push_key(&mut out, "parse_mode", &quote_literal(PARSE_MODE));
        push_key(&mut out, "database", &quote_literal(&self.database_path));

        for handler in &config.handlers {
            render_handler(&mut out, handler)?;
        }
        for handler in literal_response_handlers(config) {
            render_handler(&mut out, &Handler::Callback(handler))?;
        }

        Ok(out)
    }
}

fn render_handler(out: &mut String, handler: &Handler) -> AppResult<()> {
    let (kind, trigger, save_response) = match handler {
        Handler::Command(command) => {
            let name = command.name();
            if name.is_empty() {
                return Err(AppError::Generation(format!(
                    "command handler '{}' has an empty name",
                    command.command
                )));
            }
            (HandlerKind::Command, name, None)
        }
        Handler::Callback(callback) => (
            HandlerKind::Callback,
            callback.callback_query.as_str(),
            callback.save_response.as_ref(),
        ),
    };

    out.push_str("\n[[handler]]\n");
    push_key(out, "kind", &quote_literal(kind.as_ref()));
    push_key(out, "trigger", &quote_literal(trigger));
    push_key(out, "text", &quote_literal(handler.text()));
    if let Some(markup) = handler.reply_markup() {
        render_keyboard(out, markup);
    }
    if let Some(save) = save_response {
        render_save_response(out, save);
    }
    Ok(())
}

fn render_keyboard(out: &mut String, markup: &ReplyMarkup) {
    out.push_str("keyboard = [\n");
    for row in &markup.inline_keyboard {
        let buttons: Vec<String> = row.iter().map(render_button).collect();
        let _ = writeln!(out, "  [{}],", buttons.join(", "));
    }
    out.push_str("]\n");
}

fn render_button(button: &Button) -> String {
    // Only label and target are rendered, a literal response stays behind
    match button {
        Button::Url(link) => format!(
            "{{ text = {}, url = {} }}",
            quote_literal(&link.text),
            quote_literal(&link.url)
        ),
        Button::Action(action) => format!(
            "{{ text = {}, callback_data = {} }}",
            quote_literal(&action.text),
            quote_literal(&action.callback_data)
        ),
    }
}

fn render_save_response(out: &mut String, save: &SaveResponse) {
    out.push_str("\n[handler.save_response]\n");
    push_key(out, "poll_id", &save.poll_id.to_string());
    push_key(out, "option_text", &quote_literal(&save.option_text));
    push_key(out, "thank_you_text", &quote_literal(&save.thank_you_text));
}

fn push_key(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(out, "{} = {}", key, value);
}

/// Callback handlers for action buttons that carry a literal response.
///
/// An explicit callback handler for the same data wins. The first button
/// with a given data decides the text; order follows first appearance.
pub fn literal_response_handlers(config: &BotConfig) -> Vec<CallbackHandler> {
    let mut taken: HashSet<&str> = config.callback_triggers().collect();
    let mut handlers = Vec::new();

    for button in config.buttons() {
        let Button::Action(action) = button else {
            continue;
        };
        let Some(response) = action.response.as_deref() else {
            continue;
        };
        if taken.insert(action.callback_data.as_str()) {
            handlers.push(CallbackHandler::new(action.callback_data.clone(), response));
        }
    }

    handlers
}

fn temp_path(destination: &Path) -> PathBuf {
    let mut tmp = destination.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn write_atomically(destination: &Path, contents: &str) -> AppResult<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }

    let tmp = temp_path(destination);
    if let Err(e) = fs_err::write(&tmp, contents).and_then(|_| fs_err::rename(&tmp, destination)) {
        let _ = fs_err::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CommandHandler;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn generator() -> Generator {
        Generator::new("/tmp/bot_users.db")
    }

    #[test]
    fn test_render_header_and_command() {
        let mut config = BotConfig::new("Test\\.Bot");
        config.handlers.push(CommandHandler::new("/help", "Помощь\\!").into());

        let source = generator().render(&config, 7).unwrap();
        let program = BotProgram::parse(&source).unwrap();

        assert_eq!(program.bot.name, "Test\\.Bot");
        assert_eq!(program.bot.config_id, 7);
        assert_eq!(program.bot.parse_mode, "MarkdownV2");
        assert_eq!(program.bot.database, "/tmp/bot_users.db");
        assert_eq!(program.handlers[0].kind, HandlerKind::Command);
        assert_eq!(program.handlers[0].trigger, "help");
        assert_eq!(program.handlers[0].text, "Помощь\\!");
    }

    #[test]
    fn test_literal_responses_become_callback_handlers() {
        let value = json!({
            "bot_name": "Bot",
            "handlers": [
                {
                    "command": "/menu",
                    "text": "Меню",
                    "reply_markup": {"inline_keyboard": [
                        [
                            {"text": "A", "callback_data": "a", "response": "answer a"},
                            {"text": "B", "callback_data": "b", "response": "ignored"}
                        ],
                        [{"text": "A again", "callback_data": "a", "response": "second a"}]
                    ]}
                },
                {"callback_query": "b", "text": "explicit b"}
            ]
        });
        let config = BotConfig::from_value(&value).unwrap();

        let extra = literal_response_handlers(&config);
        assert_eq!(extra, vec![CallbackHandler::new("a", "answer a")]);

        let program = BotProgram::parse(&generator().render(&config, 1).unwrap()).unwrap();
        let triggers: Vec<(&str, &str)> = program
            .handlers_of(HandlerKind::Callback)
            .map(|h| (h.trigger.as_str(), h.text.as_str()))
            .collect();
        assert_eq!(triggers, vec![("b", "explicit b"), ("a", "answer a")]);
    }

    #[test]
    fn test_rendered_keyboard_has_no_response() {
        let value = json!({
            "bot_name": "Bot",
            "handlers": [{
                "command": "/start",
                "text": "Hi",
                "reply_markup": {"inline_keyboard": [[
                    {"text": "Site", "url": "https://example.com/?q=\"x\""},
                    {"text": "Contacts", "callback_data": "contact_info", "response": "SECRET-RESPONSE"}
                ]]}
            }]
        });
        let config = BotConfig::from_value(&value).unwrap();
        let source = generator().render(&config, 1).unwrap();

        assert!(!source.contains("response = "));
        assert_eq!(source.matches("SECRET-RESPONSE").count(), 1);

        let program = BotProgram::parse(&source).unwrap();
        assert_eq!(
            program.handlers[0].keyboard[0],
            vec![
                ProgramButton::Url {
                    text: "Site".to_string(),
                    url: "https://example.com/?q=\"x\"".to_string()
                },
                ProgramButton::Callback {
                    text: "Contacts".to_string(),
                    callback_data: "contact_info".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_generate_rejects_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bot.toml");

        let err = generator()
            .generate(&json!({"bot_name": "Bot"}), &dest, 1)
            .unwrap_err();
        assert!(err.is_config_error());
        assert!(!dest.exists());
        assert!(!temp_path(&dest).exists());
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("bot.toml");
        let value = json!({"bot_name": "Bot", "handlers": [{"command": "/start", "text": "Hi"}]});

        let source = generator().generate(&value, &dest, 3).unwrap();
        assert_eq!(fs_err::read_to_string(&dest).unwrap(), source);
        assert!(!temp_path(&dest).exists());
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        assert_eq!(temp_path(Path::new("bots/7/bot.toml")), PathBuf::from("bots/7/bot.toml.tmp"));
    }
}
