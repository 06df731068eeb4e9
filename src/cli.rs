use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;
use std::path::PathBuf;

use crate::core::config;
use crate::core::validation::{
    normalize_phone, validate_email, validate_text, validate_token_format, validate_website, InputError,
};
use crate::provision::{ProvisionRequest, TemplateAnswers};
use crate::templates::{BusinessCard, FaqEntry, PollSpec};

#[derive(Parser)]
#[command(name = "botforge")]
#[command(author, version, about = "Telegram bot that builds and runs other Telegram bots", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the meta-bot (default)
    Run,

    /// Run one generated bot from its program file
    RunBot {
        /// Path to the generated bot.toml
        #[arg(long)]
        program: PathBuf,
    },

    /// Compile a JSON configuration into a bot program without running it
    Generate {
        /// Path to the configuration (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Configuration id written into the program header
        #[arg(long, default_value_t = 0)]
        id: i64,

        /// Where to write the program
        #[arg(long)]
        out: PathBuf,
    },

    /// Run both validators on a JSON configuration
    Validate {
        /// Path to the configuration (JSON)
        #[arg(long)]
        config: PathBuf,
    },

    /// Create and start a bot without the Telegram wizard
    Create {
        /// Owner recorded for the bot
        #[arg(long, default_value_t = 0)]
        user_id: i64,

        #[command(subcommand)]
        template: CreateTemplate,
    },
}

/// Name and token every template needs
#[derive(Args, Debug, Clone)]
pub struct BotIdentityArgs {
    /// Bot name
    #[arg(long)]
    pub name: String,

    /// Bot token from @BotFather
    #[arg(long)]
    pub token: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CreateTemplate {
    /// Business card bot
    BusinessCard {
        #[command(flatten)]
        identity: BotIdentityArgs,

        /// Greeting for /start
        #[arg(long)]
        welcome: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        website: Option<String>,

        /// Text for /help
        #[arg(long)]
        help_text: Option<String>,
    },

    /// FAQ bot
    Faq {
        #[command(flatten)]
        identity: BotIdentityArgs,

        /// Entry as 'question:answer', repeatable
        #[arg(long = "faq", required = true, value_parser = parse_faq_entry)]
        faqs: Vec<FaqEntry>,
    },

    /// Poll bot
    Poll {
        #[command(flatten)]
        identity: BotIdentityArgs,

        /// Poll as 'question:option1,option2,...', repeatable
        #[arg(long = "poll", required = true, value_parser = parse_poll_spec)]
        polls: Vec<PollSpec>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

fn checked(text: &str, what: &str) -> Result<String, String> {
    validate_text(text).map_err(|e| format!("{}: {}", what, e))?;
    Ok(text.to_string())
}

/// Parses `question:answer`
pub fn parse_faq_entry(value: &str) -> Result<FaqEntry, String> {
    let (question, answer) = value
        .split_once(':')
        .ok_or_else(|| "expected 'question:answer'".to_string())?;
    Ok(FaqEntry {
        question: checked(question, "question")?,
        answer: checked(answer, "answer")?,
    })
}

/// Parses `question:option1,option2,...`
pub fn parse_poll_spec(value: &str) -> Result<PollSpec, String> {
    let (question, options) = value
        .split_once(':')
        .ok_or_else(|| "expected 'question:option1,option2,...'".to_string())?;

    let (min, max) = config::wizard::OPTION_COUNT;
    let options: Vec<&str> = options.split(',').collect();
    if options.len() < min as usize || options.len() > max as usize {
        return Err(InputError::OutOfRange { min, max }.to_string());
    }

    Ok(PollSpec {
        question: checked(question, "question")?,
        options: options
            .into_iter()
            .map(|option| checked(option, "option"))
            .collect::<Result<_, _>>()?,
    })
}

impl CreateTemplate {
    /// Checks the answers the same way the wizard does
    pub fn into_request(self, user_id: i64) -> Result<ProvisionRequest, String> {
        let (identity, answers) = match self {
            CreateTemplate::BusinessCard {
                identity,
                welcome,
                phone,
                email,
                website,
                help_text,
            } => {
                let card = BusinessCard {
                    welcome_text: welcome.map(|w| checked(&w, "welcome")).transpose()?,
                    phone: phone
                        .map(|p| normalize_phone(&p).map_err(|e| e.to_string()))
                        .transpose()?,
                    email: email
                        .map(|e| validate_email(&e).map(|_| e).map_err(|err| err.to_string()))
                        .transpose()?,
                    website: website
                        .map(|w| validate_website(&w).map(|_| w).map_err(|err| err.to_string()))
                        .transpose()?,
                    help_text: help_text.map(|h| checked(&h, "help text")).transpose()?,
                };
                (identity, TemplateAnswers::BusinessCard(card))
            }
            CreateTemplate::Faq { identity, faqs } => {
                let (min, max) = config::wizard::FAQ_COUNT;
                if faqs.len() < min as usize || faqs.len() > max as usize {
                    return Err(format!("faq: {}", InputError::OutOfRange { min, max }));
                }
                (identity, TemplateAnswers::Faq(faqs))
            }
            CreateTemplate::Poll { identity, polls } => {
                let (min, max) = config::wizard::POLL_COUNT;
                if polls.len() < min as usize || polls.len() > max as usize {
                    return Err(format!("polls: {}", InputError::OutOfRange { min, max }));
                }
                (identity, TemplateAnswers::Poll(polls))
            }
        };

        let bot_name = checked(&identity.name, "name")?;
        validate_token_format(&identity.token).map_err(|e| e.to_string())?;

        Ok(ProvisionRequest {
            user_id,
            bot_name,
            token: SecretString::from(identity.token.trim().to_string()),
            answers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_parse_faq_entry() {
        let entry = parse_faq_entry("Цена:100 рублей").unwrap();
        assert_eq!(entry.question, "Цена");
        assert_eq!(entry.answer, "100 рублей");

        // Ответ может содержать двоеточие
        assert_eq!(parse_faq_entry("Time:9:00").unwrap().answer, "9:00");
        assert!(parse_faq_entry("no separator").is_err());
        assert!(parse_faq_entry("Why?:Because").is_err());
    }

    #[test]
    fn test_parse_poll_spec() {
        let poll = parse_poll_spec("Color:Red,Blue").unwrap();
        assert_eq!(poll.options, ["Red", "Blue"]);

        assert!(parse_poll_spec("Color:Red").is_err());
        assert!(parse_poll_spec("Color:a,b,c,d,e").is_err());
        assert!(parse_poll_spec("Color:Red,Blue!").is_err());
    }

    #[test]
    fn test_cli_parses_create_poll() {
        let cli = Cli::try_parse_from([
            "botforge",
            "create",
            "--user-id",
            "7",
            "poll",
            "--name",
            "Survey",
            "--token",
            "123:abc",
            "--poll",
            "Color:Red,Blue",
            "--poll",
            "Size:S,M,L",
        ])
        .unwrap();

        let Some(Commands::Create { user_id, template }) = cli.command else {
            panic!("not a create command");
        };
        let request = template.into_request(user_id).unwrap();
        assert_eq!(request.user_id, 7);
        assert_eq!(request.token.expose_secret(), "123:abc");
        match request.answers {
            TemplateAnswers::Poll(polls) => assert_eq!(polls.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_business_card_request_is_checked() {
        let template = CreateTemplate::BusinessCard {
            identity: BotIdentityArgs {
                name: "Card".to_string(),
                token: "123:abc".to_string(),
            },
            welcome: None,
            phone: Some("12345".to_string()),
            email: None,
            website: None,
            help_text: None,
        };
        assert!(template.into_request(0).is_err());

        let template = CreateTemplate::BusinessCard {
            identity: BotIdentityArgs {
                name: "Card".to_string(),
                token: "bad".to_string(),
            },
            welcome: None,
            phone: None,
            email: None,
            website: None,
            help_text: None,
        };
        assert_eq!(template.into_request(0).unwrap_err(), "token format is invalid");
    }

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::try_parse_from(["botforge"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["botforge", "run-bot", "--program", "bots/1/bot.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::RunBot { .. })));
    }
}
