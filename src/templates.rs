//! Configuration builders for the three bot templates.
//!
//! Builders take the answers exactly as the user typed them and apply
//! MarkdownV2 escaping themselves, so every text in the resulting
//! [`BotConfig`] is ready to send.

use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::core::escape::escape_markdown;
use crate::schema::{BotConfig, Button, CallbackHandler, CommandHandler, SaveResponse};

/// Template a user picks when creating a bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum TemplateKind {
    BusinessCard,
    Faq,
    Poll,
}

impl TemplateKind {
    /// Callback data of the template picker button
    pub fn callback_data(self) -> String {
        format!("template_{}", self)
    }

    /// Parses `template_<kind>` callback data
    pub fn from_callback_data(data: &str) -> Option<Self> {
        data.strip_prefix("template_")?.parse().ok()
    }

    pub fn title(self) -> &'static str {
        match self {
            TemplateKind::BusinessCard => "Визитка",
            TemplateKind::Faq => "FAQ",
            TemplateKind::Poll => "Опросник",
        }
    }
}

/// Default greeting of a business card when the user skips the step
pub const DEFAULT_WELCOME_TEXT: &str =
    "Привет! Я бот-визитка.\nЗдесь вы можете найти всю необходимую информацию обо мне.";

/// Default /help text of a business card
pub const DEFAULT_HELP_TEXT: &str = "Используйте /start для просмотра визитки.";

/// Answers collected for a business card, unescaped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessCard {
    pub welcome_text: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub help_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSpec {
    pub question: String,
    pub options: Vec<String>,
}

pub fn business_card(bot_name: &str, card: &BusinessCard) -> BotConfig {
    let welcome = escape_markdown(card.welcome_text.as_deref().unwrap_or(DEFAULT_WELCOME_TEXT));
    let help = escape_markdown(card.help_text.as_deref().unwrap_or(DEFAULT_HELP_TEXT));

    let mut contacts = format!("*{}*\n\n📋 *Контактная информация:*\n", welcome);
    if let Some(website) = &card.website {
        contacts.push_str(&format!("🌐 *Website:* {}\n", escape_markdown(website)));
    }
    if let Some(email) = &card.email {
        contacts.push_str(&format!("📧 *Email:* {}\n", escape_markdown(email)));
    }
    if let Some(phone) = &card.phone {
        contacts.push_str(&format!("📞 *Phone:* {}\n", escape_markdown(phone)));
    }
    if card.website.is_none() && card.email.is_none() && card.phone.is_none() {
        contacts.push_str("ℹ️ Контактная информация не указана\\.\n");
    }

    let mut config = BotConfig::new(escape_markdown(bot_name));
    config.handlers = vec![
        CommandHandler::new("/start", contacts).into(),
        CommandHandler::new("/help", help).into(),
        CommandHandler::new("/create_bot", "Начать создание нового бота\\.").into(),
        CommandHandler::new("/list_bots", "Показать список ваших ботов\\.").into(),
        CommandHandler::new("/delete_bot", "Удалить бота\\.").into(),
        CommandHandler::new("/menu", "Выберите действие:")
            .with_keyboard(vec![
                vec![
                    Button::action_with_response("Создать бота", "menu_create_bot", "Начнем создание бота\\!"),
                    Button::action_with_response("Список ботов", "menu_list_bots", "Показываю ваши боты\\."),
                ],
                vec![Button::action_with_response(
                    "Удалить бота",
                    "menu_delete_bot",
                    "Выберите бота для удаления\\.",
                )],
            ])
            .into(),
    ];
    config
}

pub fn faq(bot_name: &str, entries: &[FaqEntry]) -> BotConfig {
    let rows = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            vec![Button::action_with_response(
                escape_markdown(&entry.question),
                format!("faq_{}", i + 1),
                escape_markdown(&entry.answer),
            )]
        })
        .collect();

    let mut config = BotConfig::new(escape_markdown(bot_name));
    config.handlers = vec![
        CommandHandler::new(
            "/start",
            "Добро пожаловать в бот FAQ\\! Используйте /faq для просмотра вопросов\\.",
        )
        .into(),
        CommandHandler::new("/faq", "*Часто задаваемые вопросы* ❓\nВыберите интересующий вопрос\\.")
            .with_keyboard(rows)
            .into(),
    ];
    config
}

/// Builds a poll bot. `poll_ids[i]` is the `polls` row of `polls[i]`.
pub fn poll(bot_name: &str, polls: &[PollSpec], poll_ids: &[i64]) -> BotConfig {
    let escaped: Vec<(String, Vec<String>)> = polls
        .iter()
        .map(|poll| {
            (
                escape_markdown(&poll.question),
                poll.options.iter().map(|o| escape_markdown(o)).collect(),
            )
        })
        .collect();

    let selection_rows = escaped
        .iter()
        .enumerate()
        .map(|(i, (question, _))| vec![Button::action(question.clone(), format!("poll_{}", i + 1))])
        .collect();

    let mut config = BotConfig::new(escape_markdown(bot_name));
    config.handlers = vec![
        CommandHandler::new(
            "/start",
            "Добро пожаловать в бот опросов\\! Используйте /poll для просмотра опросов\\.",
        )
        .into(),
        CommandHandler::new("/poll", "*Опросы* 📊\nВыберите интересующий опрос\\.")
            .with_keyboard(selection_rows)
            .into(),
    ];

    for (i, (question, options)) in escaped.iter().enumerate() {
        let option_rows = options
            .iter()
            .enumerate()
            .map(|(j, option)| vec![Button::action(option.clone(), option_data(i, j))])
            .collect();
        config
            .handlers
            .push(CallbackHandler::new(format!("poll_{}", i + 1), poll_text(question, options)).with_keyboard(option_rows).into());
    }

    for (i, ((question, options), poll_id)) in escaped.iter().zip(poll_ids).enumerate() {
        for (j, option) in options.iter().enumerate() {
            let handler = CallbackHandler::new(option_data(i, j), poll_text(question, options)).saving(SaveResponse {
                poll_id: *poll_id,
                option_text: option.clone(),
                thank_you_text: format!("*Спасибо за ваш ответ\\!* ✅\nВы выбрали: {}", option),
            });
            config.handlers.push(handler.into());
        }
    }

    config
}

fn option_data(poll: usize, option: usize) -> String {
    format!("poll_{}_option_{}", poll + 1, option + 1)
}

fn poll_text(question: &str, options: &[String]) -> String {
    let list: Vec<String> = options.iter().map(|o| format!("\\- {}", o)).collect();
    format!("Вопрос: {}\nВарианты ответа:\n{}", question, list.join("\n"))
}
