//! Free-text answers and button presses that move a session forward

use secrecy::ExposeSecret;
use teloxide::prelude::*;

use super::commands::{list_bots, prompt_delete, show_template_picker};
use super::types::{HandlerDeps, HandlerError};
use crate::provision;
use crate::storage::db;
use crate::storage::get_connection;
use crate::telegram::bot::{MENU_CREATE_BOT, MENU_DELETE_BOT, MENU_LIST_BOTS};
use crate::telegram::markdown::reply;
use crate::telegram::session::{RegistrationState, RegistrationStep, Session};
use crate::telegram::texts;
use crate::telegram::token::{check_token, TokenCheckError};
use crate::telegram::wizard::{self, Completed, PendingToken, Transition, WizardState};
use crate::templates::TemplateKind;

/// Who wrote a message, as far as flows care
pub(super) struct Sender<'a> {
    pub user_id: i64,
    pub username: Option<&'a str>,
}

pub(super) async fn handle_text(
    bot: &Bot,
    chat_id: ChatId,
    sender: Sender<'_>,
    text: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    match deps.sessions.take(chat_id) {
        Some(Session::Registration(state)) => register(bot, chat_id, sender, state, text, deps).await,
        Some(Session::Wizard(state)) => advance_wizard(bot, chat_id, sender.user_id, state, text, deps).await,
        Some(Session::Deleting) => delete_bot(bot, chat_id, sender.user_id, text, deps).await,
        None => {
            reply(bot, chat_id, texts::UNKNOWN_INPUT).await?;
            Ok(())
        }
    }
}

async fn register(
    bot: &Bot,
    chat_id: ChatId,
    sender: Sender<'_>,
    state: RegistrationState,
    text: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    match state.on_text(text) {
        RegistrationStep::Continue { state, reply: message } => {
            deps.sessions.set(chat_id, Session::Registration(state));
            reply(bot, chat_id, message).await?;
        }
        RegistrationStep::Confirmed { name } => {
            let conn = get_connection(&deps.db_pool)?;
            db::create_user(&conn, sender.user_id, sender.username, Some(&name), None)?;
            drop(conn);
            log::info!("User {} registered", sender.user_id);
            reply(bot, chat_id, texts::REGISTRATION_DONE).await?;
        }
        RegistrationStep::Declined => {
            reply(bot, chat_id, texts::REGISTRATION_CANCELLED).await?;
        }
    }
    Ok(())
}

async fn advance_wizard(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    state: WizardState,
    text: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let mut transition = state.on_text(text);
    loop {
        match transition {
            Transition::CheckToken(pending) => {
                transition = verify_token(bot, chat_id, pending, deps).await?;
            }
            Transition::Advance { state, prompt: message } | Transition::Retry { state, error: message } => {
                deps.sessions.set(chat_id, Session::Wizard(state));
                reply(bot, chat_id, message).await?;
                return Ok(());
            }
            Transition::Finished(completed) => return finalize(bot, chat_id, user_id, completed, deps).await,
            Transition::Cancelled => {
                reply(bot, chat_id, texts::WIZARD_CANCELLED).await?;
                return Ok(());
            }
        }
    }
}

async fn verify_token(
    bot: &Bot,
    chat_id: ChatId,
    pending: PendingToken,
    deps: &HandlerDeps,
) -> Result<Transition, HandlerError> {
    match check_token(&deps.http_client, &deps.api_url, pending.token().expose_secret()).await {
        Ok(identity) => {
            log::info!(
                "Chat {}: token of bot {} (@{}) accepted",
                chat_id,
                identity.id,
                identity.username.as_deref().unwrap_or("-")
            );
            reply(bot, chat_id, texts::TOKEN_ACCEPTED).await?;
            Ok(pending.accept())
        }
        Err(TokenCheckError::Rejected(description)) => Ok(pending.reject(&description)),
        Err(e @ TokenCheckError::Network(_)) => {
            log::warn!("Chat {}: token check failed: {}", chat_id, e);
            Ok(pending.reject(&e.to_string()))
        }
    }
}

/// Runs provisioning. The session is already gone whatever the outcome.
async fn finalize(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    completed: Completed,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    reply(bot, chat_id, texts::PROVISIONING).await?;

    let text = match deps.provisioner.provision(completed.into_request(user_id)).await {
        Ok(created) => {
            log::info!(
                "Chat {}: bot {} is running as pid {}",
                chat_id,
                created.config_id,
                created.pid
            );
            texts::bot_created(&created.bot_name, created.config_id)
        }
        Err(e) => {
            log::error!("Chat {}: provisioning failed: {}", chat_id, e);
            provision::user_message(&e)
        }
    };
    reply(bot, chat_id, text).await?;
    Ok(())
}

/// Deletes one of the user's bots: the process is stopped before the rows go
async fn delete_bot(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    text: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    if text.trim() == wizard::CANCEL {
        reply(bot, chat_id, texts::DELETE_CANCELLED).await?;
        return Ok(());
    }
    let Ok(config_id) = text.trim().parse::<i64>() else {
        reply(bot, chat_id, texts::DELETE_BAD_ID).await?;
        return Ok(());
    };

    let owned = db::get_bot_config(&*get_connection(&deps.db_pool)?, config_id)?
        .is_some_and(|record| record.user_id == user_id);
    if !owned {
        reply(bot, chat_id, texts::DELETE_NOT_FOUND).await?;
        return Ok(());
    }

    let outcome = deps.provisioner.supervisor().stop_and_forget(config_id).await?;
    if !outcome.is_stopped() {
        log::error!("Config {}: process survived deletion ({:?})", config_id, outcome);
    }

    let deleted = db::delete_bot_config(&*get_connection(&deps.db_pool)?, config_id, user_id)?;
    let text = if deleted {
        log::info!("User {} deleted config {}", user_id, config_id);
        texts::DELETE_DONE
    } else {
        texts::DELETE_NOT_FOUND
    };
    reply(bot, chat_id, text).await?;
    Ok(())
}

/// Menu and template buttons. The query itself is answered by the caller.
pub(super) async fn handle_button(
    bot: &Bot,
    chat_id: ChatId,
    user_id: Option<i64>,
    data: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    match data {
        MENU_CREATE_BOT => show_template_picker(bot, chat_id, deps).await?,
        MENU_LIST_BOTS => match user_id {
            Some(user_id) => list_bots(bot, chat_id, user_id, deps).await?,
            None => log::warn!("menu_list_bots without a user in chat {}", chat_id),
        },
        MENU_DELETE_BOT => prompt_delete(bot, chat_id, deps).await?,
        data => match TemplateKind::from_callback_data(data) {
            Some(template) => {
                let (state, prompt) = wizard::start(template);
                log::info!("Chat {}: creating a {} bot", chat_id, template);
                deps.sessions.set(chat_id, Session::Wizard(state));
                reply(bot, chat_id, prompt).await?;
            }
            None => log::warn!("Unknown callback data '{}' in chat {}", data, chat_id),
        },
    }
    Ok(())
}
