//! Two-stage validation of a serialized configuration.
//!
//! 1. [`validate_config`] checks structure. It wants a named bot with a non-empty
//!    handler list, one recognized trigger per handler, unique triggers, and
//!    every action button either carrying a literal response or matched by a
//!    callback handler.
//! 2. [`validate_block_schema`] checks the shape of every block: field
//!    types, allowed keys, keyboard nesting, button kind, Bot API limits.
//!
//! Both return a [`Verdict`] and never fail with an error; they have to run,
//! in this order, on every path that finalizes a configuration.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};
use url::Url;

use crate::core::config::limits::{CALLBACK_DATA_MAX_BYTES, MESSAGE_MAX_CHARS};
use crate::core::error::{AppError, AppResult};

/// Pass/fail outcome of a validator plus a human-readable reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub ok: bool,
    /// Empty when `ok`
    pub message: String,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            ok: true,
            message: String::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// The `(valid, message)` pair
    pub fn as_pair(&self) -> (bool, &str) {
        (self.ok, &self.message)
    }

    pub fn into_result(self) -> AppResult<()> {
        if self.ok {
            Ok(())
        } else {
            Err(AppError::Validation(self.message))
        }
    }
}

impl From<Result<(), String>> for Verdict {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Verdict::pass(),
            Err(message) => Verdict::fail(message),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok {
            write!(f, "valid")
        } else {
            write!(f, "invalid: {}", self.message)
        }
    }
}

/// Runs both validators in order and returns the first failure
pub fn validate(config: &Value) -> Verdict {
    let structural = validate_config(config);
    if !structural.ok {
        return structural;
    }
    validate_block_schema(config)
}

/// Structural validation of a configuration
pub fn validate_config(config: &Value) -> Verdict {
    check_structure(config).into()
}

/// Strict block-schema validation of a configuration
pub fn validate_block_schema(config: &Value) -> Verdict {
    check_blocks(config).into()
}

// ── structural pass ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Trigger<'a> {
    Command(&'a str),
    Callback(&'a str),
}

impl fmt::Display for Trigger<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Command(command) => write!(f, "{}", command),
            Trigger::Callback(data) => write!(f, "{}", data),
        }
    }
}

fn trigger_of(idx: usize, handler: &Value) -> Result<Trigger<'_>, String> {
    let command = handler.get("command").and_then(Value::as_str);
    let callback = handler.get("callback_query").and_then(Value::as_str);

    match (command, callback) {
        (Some(_), Some(_)) => Err(format!(
            "handler #{} has both `command` and `callback_query`",
            idx + 1
        )),
        (Some(command), None) => {
            if !is_command_name(command) {
                return Err(format!(
                    "handler #{}: command '{}' must be '/' followed by 1-32 of [a-z0-9_]",
                    idx + 1,
                    command
                ));
            }
            Ok(Trigger::Command(command))
        }
        (None, Some(data)) if !data.is_empty() => Ok(Trigger::Callback(data)),
        (None, Some(_)) => Err(format!("handler #{} has an empty `callback_query`", idx + 1)),
        (None, None) => Err(format!(
            "handler #{} has no recognized trigger (`command` or `callback_query`)",
            idx + 1
        )),
    }
}

fn is_command_name(command: &str) -> bool {
    let Some(name) = command.strip_prefix('/') else {
        return false;
    };
    !name.is_empty()
        && name.len() <= 32
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn check_structure(config: &Value) -> Result<(), String> {
    let config = config
        .as_object()
        .ok_or_else(|| "configuration must be an object".to_string())?;

    match config.get("bot_name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => {}
        _ => return Err("configuration has no `bot_name`".to_string()),
    }

    let handlers = match config.get("handlers").and_then(Value::as_array) {
        Some(handlers) if !handlers.is_empty() => handlers,
        _ => return Err("configuration has no handlers".to_string()),
    };

    let mut triggers = Vec::with_capacity(handlers.len());
    let mut seen = HashSet::new();
    for (idx, handler) in handlers.iter().enumerate() {
        let trigger = trigger_of(idx, handler)?;

        match handler.get("text").and_then(Value::as_str) {
            Some(text) if !text.trim().is_empty() => {}
            _ => return Err(format!("handler for trigger {} does not contain text", trigger)),
        }

        if !seen.insert(trigger) {
            return Err(format!("duplicate handler for trigger {}", trigger));
        }
        triggers.push(trigger);
    }

    let callbacks: HashSet<&str> = triggers
        .iter()
        .filter_map(|trigger| match trigger {
            Trigger::Callback(data) => Some(*data),
            Trigger::Command(_) => None,
        })
        .collect();

    for (handler, trigger) in handlers.iter().zip(&triggers) {
        for button in keyboard_buttons(handler) {
            let Some(data) = button.get("callback_data").and_then(Value::as_str) else {
                continue;
            };
            let has_response = button
                .get("response")
                .and_then(Value::as_str)
                .is_some_and(|response| !response.trim().is_empty());
            if has_response || callbacks.contains(data) {
                continue;
            }
            let label = button.get("text").and_then(Value::as_str).unwrap_or_default();
            return Err(format!(
                "button '{}' of handler {}: handler for trigger {} does not contain response",
                label, trigger, data
            ));
        }
    }

    Ok(())
}

/// Buttons of a handler's inline keyboard, skipping anything malformed
fn keyboard_buttons(handler: &Value) -> impl Iterator<Item = &Value> {
    handler
        .get("reply_markup")
        .and_then(|markup| markup.get("inline_keyboard"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .flatten()
}

// ── block-schema pass ────────────────────────────────────────────────────

const HANDLER_KEYS: &[&str] = &["command", "callback_query", "text", "reply_markup", "save_response"];
const BUTTON_KEYS: &[&str] = &["text", "url", "callback_data", "response"];
const SAVE_RESPONSE_KEYS: &[&str] = &["poll_id", "option_text", "thank_you_text"];

fn check_blocks(config: &Value) -> Result<(), String> {
    let config = expect_object(config, "configuration")?;
    expect_string(config, "bot_name", "configuration")?;

    let handlers = config
        .get("handlers")
        .and_then(Value::as_array)
        .ok_or_else(|| "configuration.handlers must be a list".to_string())?;

    for (idx, handler) in handlers.iter().enumerate() {
        check_handler(handler, &format!("handlers[{}]", idx))?;
    }
    Ok(())
}

fn check_handler(handler: &Value, path: &str) -> Result<(), String> {
    let handler = expect_object(handler, path)?;
    reject_unknown_keys(handler, HANDLER_KEYS, path)?;

    if handler.contains_key("command") {
        expect_string(handler, "command", path)?;
        if handler.contains_key("save_response") {
            return Err(format!("{}: `save_response` is only allowed on callback handlers", path));
        }
    }
    if handler.contains_key("callback_query") {
        let data = expect_string(handler, "callback_query", path)?;
        check_callback_data(data, &format!("{}.callback_query", path))?;
    }
    let text = expect_string(handler, "text", path)?;
    if text.chars().count() > MESSAGE_MAX_CHARS {
        return Err(format!("{}.text is longer than {} characters", path, MESSAGE_MAX_CHARS));
    }

    if let Some(markup) = handler.get("reply_markup") {
        check_reply_markup(markup, &format!("{}.reply_markup", path))?;
    }
    if let Some(save) = handler.get("save_response") {
        check_save_response(save, &format!("{}.save_response", path))?;
    }
    Ok(())
}

fn check_reply_markup(markup: &Value, path: &str) -> Result<(), String> {
    let markup = expect_object(markup, path)?;
    reject_unknown_keys(markup, &["inline_keyboard"], path)?;

    let rows = markup
        .get("inline_keyboard")
        .and_then(Value::as_array)
        .ok_or_else(|| format!("{}.inline_keyboard must be a list of rows", path))?;
    if rows.is_empty() {
        return Err(format!("{}.inline_keyboard has no rows", path));
    }

    for (r, row) in rows.iter().enumerate() {
        let row_path = format!("{}.inline_keyboard[{}]", path, r);
        let buttons = row
            .as_array()
            .ok_or_else(|| format!("{} must be a list of buttons", row_path))?;
        if buttons.is_empty() {
            return Err(format!("{} is empty", row_path));
        }
        for (b, button) in buttons.iter().enumerate() {
            check_button(button, &format!("{}[{}]", row_path, b))?;
        }
    }
    Ok(())
}

fn check_button(button: &Value, path: &str) -> Result<(), String> {
    let button = expect_object(button, path)?;
    reject_unknown_keys(button, BUTTON_KEYS, path)?;

    let text = expect_string(button, "text", path)?;
    if text.trim().is_empty() {
        return Err(format!("{}.text is empty", path));
    }

    match (button.contains_key("url"), button.contains_key("callback_data")) {
        (true, false) => {
            let url = expect_string(button, "url", path)?;
            Url::parse(url).map_err(|e| format!("{}.url '{}' is not a valid URL: {}", path, url, e))?;
            if button.contains_key("response") {
                return Err(format!("{}: link buttons cannot carry a `response`", path));
            }
        }
        (false, true) => {
            let data = expect_string(button, "callback_data", path)?;
            check_callback_data(data, &format!("{}.callback_data", path))?;
            if button.contains_key("response") {
                expect_string(button, "response", path)?;
            }
        }
        _ => {
            return Err(format!(
                "{}: button must have exactly one of `url` or `callback_data`",
                path
            ))
        }
    }
    Ok(())
}

fn check_save_response(save: &Value, path: &str) -> Result<(), String> {
    let save = expect_object(save, path)?;
    reject_unknown_keys(save, SAVE_RESPONSE_KEYS, path)?;

    if !save.get("poll_id").is_some_and(Value::is_i64) {
        return Err(format!("{}.poll_id must be an integer", path));
    }
    expect_string(save, "option_text", path)?;
    expect_string(save, "thank_you_text", path)?;
    Ok(())
}

fn check_callback_data(data: &str, path: &str) -> Result<(), String> {
    if data.is_empty() {
        return Err(format!("{} is empty", path));
    }
    if data.len() > CALLBACK_DATA_MAX_BYTES {
        return Err(format!(
            "{} is {} bytes, the limit is {}",
            path,
            data.len(),
            CALLBACK_DATA_MAX_BYTES
        ));
    }
    Ok(())
}

fn expect_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, String> {
    value
        .as_object()
        .ok_or_else(|| format!("{} must be an object", path))
}

fn expect_string<'a>(object: &'a Map<String, Value>, key: &str, path: &str) -> Result<&'a str, String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{}.{} must be a string", path, key))
}

fn reject_unknown_keys(object: &Map<String, Value>, allowed: &[&str], path: &str) -> Result<(), String> {
    match object.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(format!("{}: unknown field `{}`", path, key)),
        None => Ok(()),
    }
}
