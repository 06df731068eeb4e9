//! Bot initialization and keyboards of the meta-bot
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Main menu and template picker keyboards

use reqwest::ClientBuilder;
use strum::IntoEnumIterator;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::templates::TemplateKind;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Я умею:")]
pub enum Command {
    #[command(description = "начать работу")]
    Start,
    #[command(description = "помощь")]
    Help,
    #[command(description = "меню управления ботами")]
    Menu,
    #[command(description = "создать нового бота")]
    CreateBot,
    #[command(description = "список ваших ботов")]
    ListBots,
    #[command(description = "удалить бота")]
    DeleteBot,
    #[command(description = "отменить текущее действие")]
    Cancel,
}

pub const MENU_CREATE_BOT: &str = "menu_create_bot";
pub const MENU_LIST_BOTS: &str = "menu_list_bots";
pub const MENU_DELETE_BOT: &str = "menu_delete_bot";

/// Creates the meta-bot with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - No token configured or invalid BOT_API_URL
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN is not set");
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    // Check if local Bot API server is configured
    let bot = if let Some(bot_api_url) = config::BOT_API_URL.as_deref() {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        bot.set_api_url(url)
    } else {
        bot
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

/// Main menu: create and list on the first row, delete below
pub fn main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("Создать бота", MENU_CREATE_BOT),
            InlineKeyboardButton::callback("Список ботов", MENU_LIST_BOTS),
        ],
        vec![InlineKeyboardButton::callback("Удалить бота", MENU_DELETE_BOT)],
    ])
}

/// One row with a button per template
pub fn template_keyboard() -> InlineKeyboardMarkup {
    let row = TemplateKind::iter()
        .map(|kind| InlineKeyboardButton::callback(kind.title(), kind.callback_data()))
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}
