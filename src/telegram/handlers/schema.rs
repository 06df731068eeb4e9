//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::handle_command;
use super::flow::{handle_button, handle_text, Sender};
use super::types::{presser_id, sender_id, HandlerDeps, HandlerError};
use crate::telegram::bot::Command;
use crate::telegram::markdown::reply;
use crate::telegram::texts;

/// Creates the dispatcher schema of the meta-bot.
///
/// Commands come first, so `/cancel` or `/start` work in the middle of any
/// flow; other text goes to the chat's session; button presses last.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);
                let result = handle_command(&bot, msg.chat.id, sender_id(&msg), cmd, &deps).await;
                report_failure(&bot, msg.chat.id, result).await
            }
        },
    ))
}

/// Plain text answers to whatever flow the chat is in
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let (Some(text), Some(user)) = (msg.text(), msg.from.as_ref()) else {
                    return Ok(());
                };
                let Some(user_id) = sender_id(&msg) else {
                    return Ok(());
                };
                let sender = Sender {
                    user_id,
                    username: user.username.as_deref(),
                };
                let result = handle_text(&bot, msg.chat.id, sender, text, &deps).await;
                report_failure(&bot, msg.chat.id, result).await
            }
        })
}

/// Menu and template buttons; every query is answered exactly once
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let data = q.data.as_deref().unwrap_or_default();
            match q.message.as_ref().map(|m| m.chat().id) {
                Some(chat_id) => {
                    if let Err(e) = handle_button(&bot, chat_id, presser_id(&q), data, &deps).await {
                        log::error!("Callback '{}' in chat {} failed: {}", data, chat_id, e);
                    }
                }
                None => log::warn!("Callback '{}' has no accessible message", data),
            }

            if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
                log::warn!("Failed to answer callback query: {}", e);
            }
            Ok(())
        }
    })
}

/// A failed handler is logged and the user gets a generic apology. Any flow
/// the chat was in is already gone, so the next message starts fresh.
async fn report_failure(bot: &Bot, chat_id: ChatId, result: Result<(), HandlerError>) -> Result<(), HandlerError> {
    if let Err(e) = result {
        log::error!("Handler failed in chat {}: {}", chat_id, e);
        reply(bot, chat_id, texts::INTERNAL_ERROR).await?;
    }
    Ok(())
}
