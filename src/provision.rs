//! Finalize pipeline shared by the wizard and the `create` CLI:
//! build → validate → persist → generate → launch.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::core::error::{AppError, AppResult};
use crate::core::escape::escape_markdown;
use crate::generator::Generator;
use crate::schema::{validate, BotConfig};
use crate::storage::db::{self, DbPool};
use crate::storage::get_connection;
use crate::supervisor::Supervisor;
use crate::templates::{self, BusinessCard, FaqEntry, PollSpec, TemplateKind};

/// Template-specific answers, as typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateAnswers {
    BusinessCard(BusinessCard),
    Faq(Vec<FaqEntry>),
    Poll(Vec<PollSpec>),
}

impl TemplateAnswers {
    pub fn kind(&self) -> TemplateKind {
        match self {
            TemplateAnswers::BusinessCard(_) => TemplateKind::BusinessCard,
            TemplateAnswers::Faq(_) => TemplateKind::Faq,
            TemplateAnswers::Poll(_) => TemplateKind::Poll,
        }
    }
}

/// Everything needed to create one bot
#[derive(Debug)]
pub struct ProvisionRequest {
    pub user_id: i64,
    /// Bot name as typed, unescaped
    pub bot_name: String,
    pub token: SecretString,
    pub answers: TemplateAnswers,
}

/// A created and running bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub config_id: i64,
    pub pid: u32,
    /// Escaped bot name as stored
    pub bot_name: String,
}

pub struct Provisioner {
    db_pool: Arc<DbPool>,
    generator: Generator,
    supervisor: Arc<Supervisor>,
}

impl Provisioner {
    pub fn new(db_pool: Arc<DbPool>, generator: Generator, supervisor: Arc<Supervisor>) -> Self {
        Self {
            db_pool,
            generator,
            supervisor,
        }
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Creates and starts a bot.
    ///
    /// Polls, the configuration row and the poll links are written in one
    /// transaction, so a configuration that fails validation leaves nothing
    /// behind. A generation or launch failure keeps the row but never leaves
    /// a process running.
    pub async fn provision(&self, request: ProvisionRequest) -> AppResult<Provisioned> {
        let kind = request.answers.kind();
        let (config_id, config) = self.persist(&request)?;
        log::info!(
            "User {} created {} config {} '{}'",
            request.user_id,
            kind,
            config_id,
            config.bot_name
        );

        let files = self.supervisor.files(config_id);
        let value = config.to_value()?;
        if let Err(e) = self.generator.generate(&value, &files.program, config_id) {
            log::error!("Generation of config {} failed: {}", config_id, e);
            return Err(e);
        }

        let pid = match self.supervisor.launch(&files.program, &request.token, config_id).await {
            Ok(pid) => pid,
            Err(e) => {
                log::error!("Launch of config {} failed: {}", config_id, e);
                return Err(e);
            }
        };

        Ok(Provisioned {
            config_id,
            pid,
            bot_name: config.bot_name,
        })
    }

    fn persist(&self, request: &ProvisionRequest) -> AppResult<(i64, BotConfig)> {
        let mut conn = get_connection(&self.db_pool)?;
        let tx = conn.transaction()?;

        let mut poll_ids = Vec::new();
        if let TemplateAnswers::Poll(polls) = &request.answers {
            for poll in polls {
                let options: Vec<String> = poll.options.iter().map(|o| escape_markdown(o)).collect();
                poll_ids.push(db::insert_poll(&tx, None, &escape_markdown(&poll.question), &options)?);
            }
        }

        let config = build_config(&request.bot_name, &request.answers, &poll_ids);
        let value = config.to_value()?;
        validate(&value).into_result()?;

        let config_id = db::insert_bot_config(
            &tx,
            request.user_id,
            &config.bot_name,
            &serde_json::to_string(&value)?,
            request.token.expose_secret(),
        )?;
        db::link_polls(&tx, &poll_ids, config_id)?;
        tx.commit()?;

        Ok((config_id, config))
    }
}

/// Configuration for a set of answers; `poll_ids` is used by poll bots only
pub fn build_config(bot_name: &str, answers: &TemplateAnswers, poll_ids: &[i64]) -> BotConfig {
    match answers {
        TemplateAnswers::BusinessCard(card) => templates::business_card(bot_name, card),
        TemplateAnswers::Faq(entries) => templates::faq(bot_name, entries),
        TemplateAnswers::Poll(polls) => templates::poll(bot_name, polls, poll_ids),
    }
}

/// Maps a provisioning error to the text shown to the user (MarkdownV2)
pub fn user_message(error: &AppError) -> String {
    if error.is_config_error() {
        format!("*Ошибка* ⚠️\nОшибка в конфигурации: {}", escape_markdown(&error.to_string()))
    } else {
        format!("*Ошибка* ⚠️\nОшибка при запуске бота: {}", escape_markdown(&error.to_string()))
    }
}
