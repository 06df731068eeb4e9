//! Тексты сообщений мета-бота (MarkdownV2, уже экранированы)

use crate::core::escape::escape_markdown;

pub const WELCOME_REGISTERED: &str = "*Привет\\!* 👋 Добро пожаловать в билдер Telegram\\-ботов\\.\nВыберите действие:";
pub const WELCOME_NEW_USER: &str = "*Привет\\!* 👋 Давай зарегистрируем тебя\\.\nВведи свое имя:";
pub const HELP: &str = "*Помощь* ℹ️\nИспользуйте /menu для управления ботами или /start для начала работы\\.";
pub const MENU: &str = "*Меню* 📋\nВыберите действие:";
pub const CHOOSE_TEMPLATE: &str = "*Создание бота* 🤖\nВыберите шаблон для нового бота:";
pub const NOTHING_TO_CANCEL: &str = "Нечего отменять\\.";
pub const UNKNOWN_INPUT: &str = "Не понимаю 🤔\nИспользуйте /menu или /help\\.";

// ── регистрация ──────────────────────────────────────────────────────────

pub const REGISTRATION_DONE: &str = "*Регистрация завершена* 🎉\nНажми /start, чтобы продолжить\\.";
pub const REGISTRATION_CANCELLED: &str = "*Регистрация отменена* ❌\nНажми /start, чтобы начать заново\\.";

pub fn confirm_name(name: &str) -> String {
    format!(
        "Ты ввел имя: *{}*\\.\nПодтвердить\\? \\(*да/нет*\\)",
        escape_markdown(name)
    )
}

// ── мастер создания ──────────────────────────────────────────────────────

pub const BOT_NAME_PROMPT: &str = "Введите *имя нового бота*:";
pub const TOKEN_PROMPT: &str = "Введите *токен бота*, полученный от @BotFather \\(или /cancel\\):";
pub const TOKEN_FORMAT_ERROR: &str = "*Ошибка* ⚠️\nНекорректный формат токена\\.\nПопробуйте снова или /cancel\\.";
pub const TOKEN_ACCEPTED: &str = "*Токен принят* ✅";
pub const WELCOME_PROMPT: &str =
    "Введите *текст приветствия* для команды /start \\(или /skip для значения по умолчанию\\):";
pub const PHONE_PROMPT: &str = "Введите *номер телефона* \\(например, \\+1234567890\\) или /skip:";
pub const PHONE_ERROR: &str = "*Ошибка* ⚠️\nНомер телефона должен начинаться с \\+ и содержать только цифры \\(например, \\+79522046894\\)\\.\nПопробуйте снова или /skip\\.";
pub const EMAIL_PROMPT: &str = "Введите *email* \\(например, user\\@example\\.com\\) или /skip:";
pub const EMAIL_ERROR: &str = "*Ошибка* ⚠️\nНекорректный формат email\\.\nПопробуйте снова или /skip\\.";
pub const WEBSITE_PROMPT: &str = "Введите *URL сайта* \\(например, https://example\\.com\\) или /skip:";
pub const WEBSITE_ERROR: &str =
    "*Ошибка* ⚠️\nURL должен начинаться с http:// или https://\\.\nПопробуйте снова или /skip\\.";
pub const HELP_TEXT_PROMPT: &str =
    "Введите *текст для команды /help* \\(или /skip для значения по умолчанию\\):";
pub const FAQ_COUNT_PROMPT: &str = "Сколько вопросов FAQ вы хотите добавить\\? \\(*1\\-4* или /cancel\\):";
pub const FIRST_FAQ_QUESTION_PROMPT: &str = "Введите текст *первого вопроса FAQ*:";
pub const POLL_COUNT_PROMPT: &str = "Сколько опросов вы хотите добавить\\? \\(*1\\-4* или /cancel\\):";
pub const FIRST_POLL_QUESTION_PROMPT: &str = "Введите текст *первого вопроса опроса*:";
pub const OPTION_COUNT_PROMPT: &str = "Сколько вариантов ответа для этого опроса\\? \\(*2\\-4* или /cancel\\):";
pub const FIRST_OPTION_PROMPT: &str = "Введите текст *первого варианта ответа* для опроса:";
pub const NOT_A_NUMBER: &str = "*Ошибка* ⚠️\nВведите число или /cancel\\.";
pub const WIZARD_CANCELLED: &str = "*Создание бота отменено* ❌";
pub const PROVISIONING: &str = "⏳ Создаю и запускаю бота\\.\\.\\.";

pub fn invalid_token(description: &str) -> String {
    format!(
        "*Ошибка* ⚠️\nНедействительный токен: {}\\.\nПопробуйте снова или /cancel\\.",
        escape_markdown(description)
    )
}

/// `subject` is a capitalized noun phrase such as "Имя бота"
pub fn forbidden_chars(subject: &str, chars: &str) -> String {
    format!(
        "*Ошибка* ⚠️\n{} содержит недопустимые символы: {}\nИспользуйте буквы, цифры, пробелы и знаки , : ; @ \\# $ % ^ &\\.",
        subject,
        escape_markdown(chars)
    )
}

pub fn empty_text(subject: &str) -> String {
    format!("*Ошибка* ⚠️\n{} не может быть пустым\\.", subject)
}

/// `what` is a genitive plural such as "вопросов"
pub fn count_out_of_range(what: &str, min: u32, max: u32) -> String {
    format!(
        "*Ошибка* ⚠️\nЧисло {} должно быть от *{}* до *{}*\\.\nПопробуйте снова или /cancel\\.",
        what, min, max
    )
}

pub fn faq_question_prompt(number: usize) -> String {
    format!("Введите текст вопроса FAQ *{}*:", number)
}

pub fn faq_answer_prompt(question: &str) -> String {
    format!("Введите *ответ* на вопрос '{}':", escape_markdown(question))
}

pub fn poll_question_prompt(number: usize) -> String {
    format!("Введите текст вопроса опроса *{}*:", number)
}

pub fn option_prompt(number: usize) -> String {
    format!("Введите текст *варианта ответа {}*:", number)
}

/// `bot_name` is already escaped
pub fn bot_created(bot_name: &str, config_id: i64) -> String {
    format!(
        "*Успех* 🎉\nБот '{}' успешно создан и запущен\\! ID: {}",
        bot_name, config_id
    )
}

// ── список и удаление ────────────────────────────────────────────────────

pub const NO_BOTS: &str = "У вас пока *нет ботов*\\.";
pub const DELETE_PROMPT: &str = "Введите *ID бота* для удаления \\(или /cancel\\):";
pub const DELETE_DONE: &str = "*Успех* 🎉\nБот успешно удален\\!";
pub const DELETE_NOT_FOUND: &str = "*Ошибка* ⚠️\nБот не найден или вы не владелец\\.";
pub const DELETE_BAD_ID: &str = "*Ошибка* ⚠️\nID должен быть числом\\.";
pub const DELETE_CANCELLED: &str = "*Удаление отменено* ❌";
pub const INTERNAL_ERROR: &str = "*Ошибка* ⚠️\nЧто\\-то пошло не так, попробуйте позже\\.";

/// Bot names are stored escaped, so they go out as is
pub fn bot_list<'a>(bots: impl IntoIterator<Item = (i64, &'a str)>) -> String {
    let lines: Vec<String> = bots
        .into_iter()
        .map(|(id, name)| format!("ID: {}, Имя: {}", id, name))
        .collect();

    if lines.is_empty() {
        NO_BOTS.to_string()
    } else {
        format!("*Ваши боты* 🤖\n{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_list() {
        assert_eq!(bot_list(Vec::<(i64, &str)>::new()), NO_BOTS);
        assert_eq!(
            bot_list([(1, "Shop"), (4, "My\\_bot")]),
            "*Ваши боты* 🤖\nID: 1, Имя: Shop\nID: 4, Имя: My\\_bot"
        );
    }

    #[test]
    fn test_user_input_is_escaped() {
        assert_eq!(confirm_name("Jo."), "Ты ввел имя: *Jo\\.*\\.\nПодтвердить\\? \\(*да/нет*\\)");
        assert!(invalid_token("Not Found!").contains("Not Found\\!"));
        assert!(forbidden_chars("Имя", "!.").contains("\\!\\."));
    }
}
