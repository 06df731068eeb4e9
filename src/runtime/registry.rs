//! Flat trigger → reply table of one generated bot.
//!
//! Built once from the program at startup and never mutated; lookups are
//! plain map reads.

use std::collections::HashMap;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::core::error::{AppError, AppResult};
use crate::generator::{BotProgram, HandlerKind, ProgramButton, ProgramHandler};
use crate::schema::SaveResponse;

/// What a trigger answers with
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
    pub save_response: Option<SaveResponse>,
}

#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    commands: HashMap<String, Reply>,
    callbacks: HashMap<String, Reply>,
    /// Command names in declaration order
    command_order: Vec<String>,
}

impl HandlerRegistry {
    pub fn from_program(program: &BotProgram) -> AppResult<Self> {
        let mut registry = Self::default();

        for handler in &program.handlers {
            let reply = Reply {
                text: handler.text.clone(),
                keyboard: keyboard_markup(&handler.keyboard)?,
                save_response: handler.save_response.clone(),
            };

            let table = match handler.kind {
                HandlerKind::Command => {
                    if handler.save_response.is_some() {
                        return Err(invalid(handler, "save_response is only allowed on callbacks"));
                    }
                    &mut registry.commands
                }
                HandlerKind::Callback => &mut registry.callbacks,
            };
            if table.insert(handler.trigger.clone(), reply).is_some() {
                return Err(invalid(handler, "trigger is declared twice"));
            }
            if handler.kind == HandlerKind::Command {
                registry.command_order.push(handler.trigger.clone());
            }
        }

        Ok(registry)
    }

    pub fn command(&self, name: &str) -> Option<&Reply> {
        self.commands.get(name)
    }

    pub fn callback(&self, data: &str) -> Option<&Reply> {
        self.callbacks.get(data)
    }

    pub fn command_names(&self) -> &[String] {
        &self.command_order
    }

    pub fn len(&self) -> usize {
        self.commands.len() + self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn invalid(handler: &ProgramHandler, reason: &str) -> AppError {
    AppError::Generation(format!("{} handler '{}': {}", handler.kind, handler.trigger, reason))
}

/// Converts program rows into a Bot API inline keyboard
pub fn keyboard_markup(rows: &[Vec<ProgramButton>]) -> AppResult<Option<InlineKeyboardMarkup>> {
    if rows.is_empty() {
        return Ok(None);
    }

    let mut keyboard = Vec::with_capacity(rows.len());
    for row in rows {
        let mut buttons = Vec::with_capacity(row.len());
        for button in row {
            buttons.push(match button {
                ProgramButton::Url { text, url } => {
                    let url = Url::parse(url)
                        .map_err(|e| AppError::Generation(format!("button '{}' has invalid url: {}", text, e)))?;
                    InlineKeyboardButton::url(text.clone(), url)
                }
                ProgramButton::Callback { text, callback_data } => {
                    InlineKeyboardButton::callback(text.clone(), callback_data.clone())
                }
            });
        }
        keyboard.push(buttons);
    }

    Ok(Some(InlineKeyboardMarkup::new(keyboard)))
}

/// Extracts the command name from message text.
///
/// `/start`, `/start payload` and `/start@this_bot` all yield `start`;
/// a command addressed to another bot yields `None`.
pub fn parse_command<'a>(text: &'a str, bot_username: Option<&str>) -> Option<&'a str> {
    let first = text.split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    let (name, mention) = match command.split_once('@') {
        Some((name, mention)) => (name, Some(mention)),
        None => (command, None),
    };

    if let (Some(mention), Some(username)) = (mention, bot_username) {
        if !mention.eq_ignore_ascii_case(username) {
            return None;
        }
    }
    (!name.is_empty()).then_some(name)
}
