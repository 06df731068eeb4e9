//! Command and menu actions of the meta-bot.
//!
//! Commands and the matching `menu_*` buttons share these functions, so a
//! button press behaves exactly like typing the command.

use teloxide::prelude::*;

use super::types::{HandlerDeps, HandlerError};
use crate::storage::db;
use crate::storage::get_connection;
use crate::telegram::bot::{main_menu_keyboard, template_keyboard, Command};
use crate::telegram::markdown::{reply, send_message_markdown_v2};
use crate::telegram::session::{RegistrationState, Session};
use crate::telegram::texts;

pub(super) async fn handle_command(
    bot: &Bot,
    chat_id: ChatId,
    user_id: Option<i64>,
    cmd: Command,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    match cmd {
        Command::Start => handle_start(bot, chat_id, user_id, deps).await?,
        Command::Help => {
            reply(bot, chat_id, texts::HELP).await?;
        }
        Command::Menu => {
            send_message_markdown_v2(bot, chat_id, texts::MENU, Some(main_menu_keyboard())).await?;
        }
        Command::CreateBot => show_template_picker(bot, chat_id, deps).await?,
        Command::ListBots => match user_id {
            Some(user_id) => list_bots(bot, chat_id, user_id, deps).await?,
            None => log::warn!("/list_bots without sender in chat {}", chat_id),
        },
        Command::DeleteBot => prompt_delete(bot, chat_id, deps).await?,
        Command::Cancel => cancel(bot, chat_id, deps).await?,
    }
    Ok(())
}

/// Registered users get the main menu, everyone else starts registration
async fn handle_start(
    bot: &Bot,
    chat_id: ChatId,
    user_id: Option<i64>,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let registered = match user_id {
        Some(user_id) => db::is_registered(&*get_connection(&deps.db_pool)?, user_id)?,
        None => false,
    };

    if registered {
        deps.sessions.clear(chat_id);
        send_message_markdown_v2(bot, chat_id, texts::WELCOME_REGISTERED, Some(main_menu_keyboard())).await?;
    } else {
        deps.sessions
            .set(chat_id, Session::Registration(RegistrationState::AwaitingName));
        reply(bot, chat_id, texts::WELCOME_NEW_USER).await?;
    }
    Ok(())
}

/// Starts creation over: any flow in progress is dropped
pub(super) async fn show_template_picker(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if deps.sessions.clear(chat_id) {
        log::info!("Chat {}: previous flow dropped for a new bot", chat_id);
    }
    send_message_markdown_v2(bot, chat_id, texts::CHOOSE_TEMPLATE, Some(template_keyboard())).await?;
    Ok(())
}

pub(super) async fn list_bots(bot: &Bot, chat_id: ChatId, user_id: i64, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let bots = db::list_user_bots(&*get_connection(&deps.db_pool)?, user_id)?;
    let text = texts::bot_list(bots.iter().map(|b| (b.config_id, b.bot_name.as_str())));
    reply(bot, chat_id, text).await?;
    Ok(())
}

pub(super) async fn prompt_delete(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps) -> Result<(), HandlerError> {
    deps.sessions.set(chat_id, Session::Deleting);
    reply(bot, chat_id, texts::DELETE_PROMPT).await?;
    Ok(())
}

async fn cancel(bot: &Bot, chat_id: ChatId, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let text = match deps.sessions.take(chat_id) {
        Some(Session::Wizard(_)) => texts::WIZARD_CANCELLED,
        Some(Session::Deleting) => texts::DELETE_CANCELLED,
        Some(Session::Registration(_)) => texts::REGISTRATION_CANCELLED,
        None => texts::NOTHING_TO_CANCEL,
    };
    reply(bot, chat_id, text).await?;
    Ok(())
}
