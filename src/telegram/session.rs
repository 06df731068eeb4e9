//! Per-chat conversation state of the meta-bot.
//!
//! A chat is in at most one flow at a time. Handlers take the session out
//! of the store, advance it and put it back if the flow goes on; teloxide
//! delivers updates of one chat sequentially, so a taken session is never
//! raced by the same chat.

use dashmap::DashMap;
use teloxide::types::ChatId;

use super::texts;
use super::wizard::WizardState;
use crate::core::validation::{validate_text, InputError};

/// Registration: name → confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    AwaitingName,
    Confirming { name: String },
}

/// Outcome of one registration answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStep {
    /// Keep going in `state`, replying with `reply`
    Continue { state: RegistrationState, reply: String },
    /// User confirmed `name`
    Confirmed { name: String },
    Declined,
}

impl RegistrationState {
    pub fn on_text(self, text: &str) -> RegistrationStep {
        match self {
            RegistrationState::AwaitingName => match validate_text(text) {
                Ok(()) => RegistrationStep::Continue {
                    reply: texts::confirm_name(text),
                    state: RegistrationState::Confirming { name: text.to_string() },
                },
                Err(InputError::ForbiddenChars(chars)) => RegistrationStep::Continue {
                    state: RegistrationState::AwaitingName,
                    reply: texts::forbidden_chars("Имя", &chars),
                },
                Err(_) => RegistrationStep::Continue {
                    state: RegistrationState::AwaitingName,
                    reply: texts::empty_text("Имя"),
                },
            },
            RegistrationState::Confirming { name } => {
                if text.trim().to_lowercase() == "да" {
                    RegistrationStep::Confirmed { name }
                } else {
                    RegistrationStep::Declined
                }
            }
        }
    }
}

#[derive(Debug)]
pub enum Session {
    Registration(RegistrationState),
    Wizard(WizardState),
    /// Waiting for the ID of a bot to delete
    Deleting,
}

/// Concurrent map of active sessions keyed by chat
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<ChatId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or replaces) the session of a chat
    pub fn set(&self, chat_id: ChatId, session: Session) {
        if let Some(previous) = self.sessions.insert(chat_id, session) {
            log::debug!("Chat {}: replaced session {:?}", chat_id, kind(&previous));
        }
    }

    /// Removes the session so it can be advanced by value
    pub fn take(&self, chat_id: ChatId) -> Option<Session> {
        self.sessions.remove(&chat_id).map(|(_, session)| session)
    }

    /// Returns `true` if there was a session to clear
    pub fn clear(&self, chat_id: ChatId) -> bool {
        self.sessions.remove(&chat_id).is_some()
    }

    pub fn is_active(&self, chat_id: ChatId) -> bool {
        self.sessions.contains_key(&chat_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn kind(session: &Session) -> &'static str {
    match session {
        Session::Registration(_) => "registration",
        Session::Wizard(_) => "wizard",
        Session::Deleting => "deleting",
    }
}
