//! Handler types and dependencies

use std::sync::Arc;

use teloxide::types::{CallbackQuery, Message};

use crate::provision::Provisioner;
use crate::storage::db;
use crate::telegram::session::SessionStore;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<db::DbPool>,
    pub sessions: Arc<SessionStore>,
    pub provisioner: Arc<Provisioner>,
    /// Client for the getMe check of user-supplied tokens
    pub http_client: reqwest::Client,
    /// Bot API base URL used for that check
    pub api_url: String,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        db_pool: Arc<db::DbPool>,
        sessions: Arc<SessionStore>,
        provisioner: Arc<Provisioner>,
        http_client: reqwest::Client,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            db_pool,
            sessions,
            provisioner,
            http_client,
            api_url: api_url.into(),
        }
    }
}

/// Telegram user id of the message author, if any
pub fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok())
}

/// Telegram user id of whoever pressed the button
pub fn presser_id(q: &CallbackQuery) -> Option<i64> {
    i64::try_from(q.from.id.0).ok()
}
