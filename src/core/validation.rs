//! User input validation for the creation wizard
//!
//! Every answer a user types is checked here before the wizard advances:
//! - Free text (bot names, questions, answers) against an allowed charset
//! - Bot tokens (format only; the live getMe check lives in `telegram::token`)
//! - Contact details (phone, email, website)
//! - Counts for repeated steps

use lazy_regex::regex_is_match;
use thiserror::Error;
use url::Url;

use crate::core::config;

/// Input validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    /// Text is empty or whitespace only
    #[error("text is empty")]
    Empty,

    /// Text contains characters outside the allowed set
    #[error("text contains forbidden characters: {0}")]
    ForbiddenChars(String),

    /// Token is not `<digits>:<secret>`
    #[error("token format is invalid")]
    TokenFormat,

    /// Phone is not `+` followed by enough digits
    #[error("phone number is invalid")]
    Phone,

    /// Email has no `@`
    #[error("email is invalid")]
    Email,

    /// Website is not an http(s) URL
    #[error("website URL is invalid")]
    Website,

    /// Not a number
    #[error("expected a number")]
    NotANumber,

    /// Number outside the allowed range
    #[error("number must be between {min} and {max}")]
    OutOfRange { min: u32, max: u32 },
}

/// Punctuation allowed in free text in addition to letters, digits and spaces.
///
/// Of the MarkdownV2 reserved characters only `#` is allowed; it reaches the
/// Bot API through [`escape_markdown`](crate::core::escape::escape_markdown)
/// like any other user text.
const ALLOWED_PUNCTUATION: &[char] = &[' ', ',', ':', ';', '@', '#', '$', '%', '^', '&'];

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || ALLOWED_PUNCTUATION.contains(&c) || is_cyrillic_letter(c)
}

fn is_cyrillic_letter(c: char) -> bool {
    matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё')
}

/// Checks that free text is non-blank and uses only the allowed characters.
///
/// # Examples
/// ```
/// use botforge::core::validation::is_valid_text;
///
/// assert!(is_valid_text("Мой бот 2"));
/// assert!(!is_valid_text("Bot!"));
/// assert!(!is_valid_text("   "));
/// ```
pub fn is_valid_text(text: &str) -> bool {
    validate_text(text).is_ok()
}

/// Same as [`is_valid_text`] but reports which characters were rejected
pub fn validate_text(text: &str) -> Result<(), InputError> {
    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }

    let mut forbidden: Vec<char> = text.chars().filter(|c| !is_allowed_char(*c)).collect();
    if forbidden.is_empty() {
        return Ok(());
    }

    forbidden.sort_unstable();
    forbidden.dedup();
    Err(InputError::ForbiddenChars(forbidden.into_iter().collect()))
}

/// Checks the `<bot id>:<secret>` shape of a bot token
pub fn validate_token_format(token: &str) -> Result<(), InputError> {
    if regex_is_match!(r"^[0-9]+:[A-Za-z0-9_-]+$", token.trim()) {
        Ok(())
    } else {
        Err(InputError::TokenFormat)
    }
}

/// Normalizes a phone number by removing spaces and a `tel:` prefix.
///
/// The result must be `+` followed by digits, at least
/// [`config::wizard::PHONE_MIN_LEN`] characters long.
pub fn normalize_phone(phone: &str) -> Result<String, InputError> {
    let normalized = phone.replace(' ', "").replace("tel:", "");

    let digits = normalized.strip_prefix('+').ok_or(InputError::Phone)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(InputError::Phone);
    }
    if normalized.len() < config::wizard::PHONE_MIN_LEN {
        return Err(InputError::Phone);
    }

    Ok(normalized)
}

/// Minimal email sanity check
pub fn validate_email(email: &str) -> Result<(), InputError> {
    if email.contains('@') {
        Ok(())
    } else {
        Err(InputError::Email)
    }
}

/// Checks that a website is an absolute http(s) URL
pub fn validate_website(website: &str) -> Result<(), InputError> {
    if !(website.starts_with("http://") || website.starts_with("https://")) {
        return Err(InputError::Website);
    }
    let url = Url::parse(website).map_err(|_| InputError::Website)?;
    if url.host_str().is_none() {
        return Err(InputError::Website);
    }
    Ok(())
}

/// Parses a count typed by the user and checks it against an inclusive range
pub fn parse_count(text: &str, (min, max): (u32, u32)) -> Result<u32, InputError> {
    let count: u32 = text.trim().parse().map_err(|_| InputError::NotANumber)?;
    if count < min || count > max {
        return Err(InputError::OutOfRange { min, max });
    }
    Ok(count)
}
