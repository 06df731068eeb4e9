//! Bot creation wizard as an explicit state machine.
//!
//! The machine is pure: [`WizardState::on_text`] consumes the current state
//! and one answer and returns a [`Transition`]. Sending messages, the live
//! token check and provisioning belong to the caller.
//!
//! ```text
//! BotName → Token ─(getMe)→ business card: Welcome → Phone → Email → Website → HelpText
//!                           FAQ:           FaqCount → (FaqQuestion → FaqAnswer)×n
//!                           poll:          PollCount → (PollQuestion → OptionCount → PollOption×m)×n
//! ```
//!
//! Invalid input keeps the machine in the same state. `/cancel` ends it
//! from any state.

use secrecy::SecretString;

use super::texts;
use crate::core::config;
use crate::core::validation::{
    normalize_phone, parse_count, validate_email, validate_text, validate_token_format, validate_website, InputError,
};
use crate::provision::{ProvisionRequest, TemplateAnswers};
use crate::templates::{BusinessCard, FaqEntry, PollSpec, TemplateKind};

pub const CANCEL: &str = "/cancel";
pub const SKIP: &str = "/skip";

/// Name and token shared by every template branch
#[derive(Debug)]
pub struct Draft {
    pub template: TemplateKind,
    pub bot_name: String,
    pub token: SecretString,
}

#[derive(Debug)]
pub enum WizardState {
    BotName {
        template: TemplateKind,
    },
    Token {
        template: TemplateKind,
        bot_name: String,
    },

    Welcome {
        draft: Draft,
    },
    Phone {
        draft: Draft,
        card: BusinessCard,
    },
    Email {
        draft: Draft,
        card: BusinessCard,
    },
    Website {
        draft: Draft,
        card: BusinessCard,
    },
    HelpText {
        draft: Draft,
        card: BusinessCard,
    },

    FaqCount {
        draft: Draft,
    },
    FaqQuestion {
        draft: Draft,
        total: u32,
        entries: Vec<FaqEntry>,
    },
    FaqAnswer {
        draft: Draft,
        total: u32,
        entries: Vec<FaqEntry>,
        question: String,
    },

    PollCount {
        draft: Draft,
    },
    PollQuestion {
        draft: Draft,
        total: u32,
        polls: Vec<PollSpec>,
    },
    OptionCount {
        draft: Draft,
        total: u32,
        polls: Vec<PollSpec>,
        question: String,
    },
    PollOption {
        draft: Draft,
        total: u32,
        polls: Vec<PollSpec>,
        question: String,
        count: u32,
        options: Vec<String>,
    },
}

/// Result of feeding one answer to the wizard
#[derive(Debug)]
pub enum Transition {
    /// Answer accepted; `prompt` asks for the next one
    Advance { state: WizardState, prompt: String },
    /// Answer rejected; the state is unchanged
    Retry { state: WizardState, error: String },
    /// The token is well-formed and must pass the live check to go on
    CheckToken(PendingToken),
    /// All answers collected
    Finished(Completed),
    Cancelled,
}

/// Token waiting for the getMe check
#[derive(Debug)]
pub struct PendingToken {
    template: TemplateKind,
    bot_name: String,
    token: SecretString,
}

impl PendingToken {
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// Moves on to the first template-specific step
    pub fn accept(self) -> Transition {
        let draft = Draft {
            template: self.template,
            bot_name: self.bot_name,
            token: self.token,
        };
        match draft.template {
            TemplateKind::BusinessCard => advance(WizardState::Welcome { draft }, texts::WELCOME_PROMPT),
            TemplateKind::Faq => advance(WizardState::FaqCount { draft }, texts::FAQ_COUNT_PROMPT),
            TemplateKind::Poll => advance(WizardState::PollCount { draft }, texts::POLL_COUNT_PROMPT),
        }
    }

    /// Back to the token step with Telegram's explanation
    pub fn reject(self, description: &str) -> Transition {
        Transition::Retry {
            state: WizardState::Token {
                template: self.template,
                bot_name: self.bot_name,
            },
            error: texts::invalid_token(description),
        }
    }
}

/// Everything the user answered, ready for provisioning
#[derive(Debug)]
pub struct Completed {
    pub bot_name: String,
    pub token: SecretString,
    pub answers: TemplateAnswers,
}

impl Completed {
    fn new(draft: Draft, answers: TemplateAnswers) -> Self {
        Self {
            bot_name: draft.bot_name,
            token: draft.token,
            answers,
        }
    }

    pub fn into_request(self, user_id: i64) -> ProvisionRequest {
        ProvisionRequest {
            user_id,
            bot_name: self.bot_name,
            token: self.token,
            answers: self.answers,
        }
    }
}

/// First state after a template was picked, with its prompt
pub fn start(template: TemplateKind) -> (WizardState, &'static str) {
    (WizardState::BotName { template }, texts::BOT_NAME_PROMPT)
}

fn advance(state: WizardState, prompt: impl Into<String>) -> Transition {
    Transition::Advance {
        state,
        prompt: prompt.into(),
    }
}

fn retry(state: WizardState, error: impl Into<String>) -> Transition {
    Transition::Retry {
        state,
        error: error.into(),
    }
}

/// Free text check; the error is ready to send
fn checked_text(text: &str, subject: &str) -> Result<String, String> {
    match validate_text(text) {
        Ok(()) => Ok(text.to_string()),
        Err(InputError::ForbiddenChars(chars)) => Err(texts::forbidden_chars(subject, &chars)),
        Err(_) => Err(texts::empty_text(subject)),
    }
}

fn checked_count(text: &str, range: (u32, u32), what: &str) -> Result<u32, String> {
    parse_count(text, range).map_err(|e| match e {
        InputError::OutOfRange { min, max } => texts::count_out_of_range(what, min, max),
        _ => texts::NOT_A_NUMBER.to_string(),
    })
}

/// `None` for `/skip`
fn optional(text: &str) -> Option<&str> {
    (text.trim() != SKIP).then_some(text)
}

impl WizardState {
    pub fn template(&self) -> TemplateKind {
        match self {
            WizardState::BotName { template } | WizardState::Token { template, .. } => *template,
            WizardState::Welcome { draft }
            | WizardState::Phone { draft, .. }
            | WizardState::Email { draft, .. }
            | WizardState::Website { draft, .. }
            | WizardState::HelpText { draft, .. }
            | WizardState::FaqCount { draft }
            | WizardState::FaqQuestion { draft, .. }
            | WizardState::FaqAnswer { draft, .. }
            | WizardState::PollCount { draft }
            | WizardState::PollQuestion { draft, .. }
            | WizardState::OptionCount { draft, .. }
            | WizardState::PollOption { draft, .. } => draft.template,
        }
    }

    /// Feeds one text answer to the wizard
    pub fn on_text(self, text: &str) -> Transition {
        if text.trim() == CANCEL {
            return Transition::Cancelled;
        }

        match self {
            WizardState::BotName { template } => match checked_text(text, "Имя бота") {
                Ok(bot_name) => advance(WizardState::Token { template, bot_name }, texts::TOKEN_PROMPT),
                Err(error) => retry(WizardState::BotName { template }, error),
            },

            WizardState::Token { template, bot_name } => {
                let token = text.trim();
                if validate_token_format(token).is_err() {
                    return retry(WizardState::Token { template, bot_name }, texts::TOKEN_FORMAT_ERROR);
                }
                Transition::CheckToken(PendingToken {
                    template,
                    bot_name,
                    token: SecretString::from(token.to_string()),
                })
            }

            WizardState::Welcome { draft } => {
                let welcome = match optional(text).map(|t| checked_text(t, "Текст приветствия")).transpose() {
                    Ok(welcome) => welcome,
                    Err(error) => return retry(WizardState::Welcome { draft }, error),
                };
                let card = BusinessCard {
                    welcome_text: welcome,
                    ..BusinessCard::default()
                };
                advance(WizardState::Phone { draft, card }, texts::PHONE_PROMPT)
            }

            WizardState::Phone { draft, mut card } => {
                match optional(text).map(normalize_phone).transpose() {
                    Ok(phone) => card.phone = phone,
                    Err(_) => return retry(WizardState::Phone { draft, card }, texts::PHONE_ERROR),
                }
                advance(WizardState::Email { draft, card }, texts::EMAIL_PROMPT)
            }

            WizardState::Email { draft, mut card } => {
                match optional(text) {
                    Some(email) if validate_email(email.trim()).is_err() => {
                        return retry(WizardState::Email { draft, card }, texts::EMAIL_ERROR);
                    }
                    email => card.email = email.map(|e| e.trim().to_string()),
                }
                advance(WizardState::Website { draft, card }, texts::WEBSITE_PROMPT)
            }

            WizardState::Website { draft, mut card } => {
                match optional(text) {
                    Some(website) if validate_website(website.trim()).is_err() => {
                        return retry(WizardState::Website { draft, card }, texts::WEBSITE_ERROR);
                    }
                    website => card.website = website.map(|w| w.trim().to_string()),
                }
                advance(WizardState::HelpText { draft, card }, texts::HELP_TEXT_PROMPT)
            }

            WizardState::HelpText { draft, mut card } => {
                match optional(text).map(|t| checked_text(t, "Текст помощи")).transpose() {
                    Ok(help) => card.help_text = help,
                    Err(error) => return retry(WizardState::HelpText { draft, card }, error),
                }
                Transition::Finished(Completed::new(draft, TemplateAnswers::BusinessCard(card)))
            }

            WizardState::FaqCount { draft } => match checked_count(text, config::wizard::FAQ_COUNT, "вопросов") {
                Ok(total) => advance(
                    WizardState::FaqQuestion {
                        draft,
                        total,
                        entries: Vec::new(),
                    },
                    texts::FIRST_FAQ_QUESTION_PROMPT,
                ),
                Err(error) => retry(WizardState::FaqCount { draft }, error),
            },

            WizardState::FaqQuestion { draft, total, entries } => match checked_text(text, "Вопрос FAQ") {
                Ok(question) => {
                    let prompt = texts::faq_answer_prompt(&question);
                    advance(
                        WizardState::FaqAnswer {
                            draft,
                            total,
                            entries,
                            question,
                        },
                        prompt,
                    )
                }
                Err(error) => retry(WizardState::FaqQuestion { draft, total, entries }, error),
            },

            WizardState::FaqAnswer {
                draft,
                total,
                mut entries,
                question,
            } => {
                let answer = match checked_text(text, "Ответ FAQ") {
                    Ok(answer) => answer,
                    Err(error) => {
                        return retry(
                            WizardState::FaqAnswer {
                                draft,
                                total,
                                entries,
                                question,
                            },
                            error,
                        );
                    }
                };
                entries.push(FaqEntry { question, answer });

                if entries.len() < total as usize {
                    let prompt = texts::faq_question_prompt(entries.len() + 1);
                    advance(WizardState::FaqQuestion { draft, total, entries }, prompt)
                } else {
                    Transition::Finished(Completed::new(draft, TemplateAnswers::Faq(entries)))
                }
            }

            WizardState::PollCount { draft } => match checked_count(text, config::wizard::POLL_COUNT, "опросов") {
                Ok(total) => advance(
                    WizardState::PollQuestion {
                        draft,
                        total,
                        polls: Vec::new(),
                    },
                    texts::FIRST_POLL_QUESTION_PROMPT,
                ),
                Err(error) => retry(WizardState::PollCount { draft }, error),
            },

            WizardState::PollQuestion { draft, total, polls } => match checked_text(text, "Вопрос опроса") {
                Ok(question) => advance(
                    WizardState::OptionCount {
                        draft,
                        total,
                        polls,
                        question,
                    },
                    texts::OPTION_COUNT_PROMPT,
                ),
                Err(error) => retry(WizardState::PollQuestion { draft, total, polls }, error),
            },

            WizardState::OptionCount {
                draft,
                total,
                polls,
                question,
            } => match checked_count(text, config::wizard::OPTION_COUNT, "вариантов ответа") {
                Ok(count) => advance(
                    WizardState::PollOption {
                        draft,
                        total,
                        polls,
                        question,
                        count,
                        options: Vec::new(),
                    },
                    texts::FIRST_OPTION_PROMPT,
                ),
                Err(error) => retry(
                    WizardState::OptionCount {
                        draft,
                        total,
                        polls,
                        question,
                    },
                    error,
                ),
            },

            WizardState::PollOption {
                draft,
                total,
                mut polls,
                question,
                count,
                mut options,
            } => {
                match checked_text(text, "Вариант ответа") {
                    Ok(option) => options.push(option),
                    Err(error) => {
                        return retry(
                            WizardState::PollOption {
                                draft,
                                total,
                                polls,
                                question,
                                count,
                                options,
                            },
                            error,
                        );
                    }
                }

                if options.len() < count as usize {
                    let prompt = texts::option_prompt(options.len() + 1);
                    return advance(
                        WizardState::PollOption {
                            draft,
                            total,
                            polls,
                            question,
                            count,
                            options,
                        },
                        prompt,
                    );
                }

                polls.push(PollSpec { question, options });
                if polls.len() < total as usize {
                    let prompt = texts::poll_question_prompt(polls.len() + 1);
                    advance(WizardState::PollQuestion { draft, total, polls }, prompt)
                } else {
                    Transition::Finished(Completed::new(draft, TemplateAnswers::Poll(polls)))
                }
            }
        }
    }
}
