//! Event loop of one generated bot (`botforge run-bot --program <path>`)

use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::adaptors::DefaultParseMode;
use teloxide::types::{BotCommand, ChatId, ParseMode};

use super::registry::{parse_command, HandlerRegistry, Reply};
use crate::core::config;
use crate::core::logging::init_logger;
use crate::generator::{BotProgram, PARSE_MODE};
use crate::storage::db::{self, DbPool};
use crate::storage::{create_pool, get_connection};
use crate::supervisor::layout::{read_credential, BotFiles, TOKEN_KEY};

/// Bot client of a generated bot: every message goes out as MarkdownV2
pub type RuntimeBot = DefaultParseMode<Bot>;

type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone)]
pub struct RuntimeDeps {
    pub registry: Arc<HandlerRegistry>,
    pub db_pool: Arc<DbPool>,
    pub config_id: i64,
    pub bot_username: Option<String>,
}

/// Loads the program next to its credential and polls until shutdown
pub async fn run(program_path: &Path) -> anyhow::Result<()> {
    let files = BotFiles::for_program(program_path);
    init_logger(&files.log)?;

    let program = BotProgram::load(program_path)
        .with_context(|| format!("load program {}", program_path.display()))?;
    if program.bot.parse_mode != PARSE_MODE {
        anyhow::bail!("unsupported parse mode {}", program.bot.parse_mode);
    }
    log::info!(
        "Starting bot '{}' (config {}) from {}",
        program.bot.name,
        program.bot.config_id,
        program_path.display()
    );

    let token = load_token(&files)?;
    let database = resolve_database(&files.dir, &program.bot.database);
    let db_pool = Arc::new(
        create_pool(&database.to_string_lossy()).with_context(|| format!("open database {}", database.display()))?,
    );

    let registry = Arc::new(HandlerRegistry::from_program(&program)?);
    log::info!("Registered {} handlers", registry.len());

    let bot = create_runtime_bot(&token)?;
    let bot_username = match bot.get_me().await {
        Ok(me) => me.user.username.clone(),
        Err(e) => {
            log::warn!("getMe failed: {}", e);
            None
        }
    };
    if let Err(e) = setup_commands(&bot, &registry).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let deps = RuntimeDeps {
        registry,
        db_pool,
        config_id: program.bot.config_id,
        bot_username,
    };

    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Bot for config {} stopped", program.bot.config_id);
    Ok(())
}

/// Token from the credential file, falling back to the environment
fn load_token(files: &BotFiles) -> anyhow::Result<SecretString> {
    match read_credential(&files.credential) {
        Ok(token) => Ok(token),
        Err(e) => {
            log::warn!("{}, trying {} from the environment", e, TOKEN_KEY);
            std::env::var(TOKEN_KEY)
                .map(SecretString::from)
                .with_context(|| format!("no {} available", TOKEN_KEY))
        }
    }
}

/// A relative database path is relative to the bot directory
fn resolve_database(bot_dir: &Path, database: &str) -> PathBuf {
    let path = Path::new(database);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        bot_dir.join(path)
    }
}

fn create_runtime_bot(token: &SecretString) -> anyhow::Result<RuntimeBot> {
    let client = reqwest::ClientBuilder::new()
        .timeout(config::network::timeout())
        .build()?;
    let mut bot = Bot::with_client(token.expose_secret(), client);
    if let Some(api_url) = config::BOT_API_URL.as_deref() {
        let url = url::Url::parse(api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        bot = bot.set_api_url(url);
    }
    Ok(bot.parse_mode(ParseMode::MarkdownV2))
}

async fn setup_commands(bot: &RuntimeBot, registry: &HandlerRegistry) -> Result<(), teloxide::RequestError> {
    let commands: Vec<BotCommand> = registry
        .command_names()
        .iter()
        .map(|name| BotCommand::new(name.clone(), name.replace('_', " ")))
        .collect();
    bot.set_my_commands(commands).await?;
    Ok(())
}

/// Dispatch tree of a generated bot: commands and callback queries
pub fn schema(deps: RuntimeDeps) -> UpdateHandler<HandlerError> {
    let deps_messages = deps.clone();
    let deps_callbacks = deps;

    dptree::entry()
        .branch(Update::filter_message().endpoint(move |bot: RuntimeBot, msg: Message| {
            let deps = deps_messages.clone();
            async move { handle_message(&bot, &msg, &deps).await }
        }))
        .branch(Update::filter_callback_query().endpoint(move |bot: RuntimeBot, q: CallbackQuery| {
            let deps = deps_callbacks.clone();
            async move { handle_callback(&bot, &q, &deps).await }
        }))
}

async fn handle_message(bot: &RuntimeBot, msg: &Message, deps: &RuntimeDeps) -> Result<(), HandlerError> {
    let Some(name) = msg.text().and_then(|text| parse_command(text, deps.bot_username.as_deref())) else {
        return Ok(());
    };
    let Some(reply) = deps.registry.command(name) else {
        log::debug!("Unknown command /{} from chat {}", name, msg.chat.id);
        return Ok(());
    };

    send_reply(bot, msg.chat.id, reply).await?;
    Ok(())
}

/// Answers a callback query. The query is acknowledged exactly once, after
/// the reply, whether or not the reply went out.
async fn handle_callback(bot: &RuntimeBot, q: &CallbackQuery, deps: &RuntimeDeps) -> Result<(), HandlerError> {
    let data = q.data.as_deref().unwrap_or_default();
    let chat_id = q.message.as_ref().map(|m| m.chat().id);

    match (deps.registry.callback(data), chat_id) {
        (Some(reply), Some(chat_id)) => {
            if let Err(e) = respond_to_callback(bot, chat_id, q.from.id.0 as i64, reply, deps).await {
                log::error!("Callback '{}' in chat {} failed: {}", data, chat_id, e);
            }
        }
        (Some(_), None) => log::warn!("Callback '{}' has no accessible message", data),
        (None, _) => log::warn!("Unknown callback data '{}'", data),
    }

    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        log::warn!("Failed to answer callback query: {}", e);
    }
    Ok(())
}

async fn respond_to_callback(
    bot: &RuntimeBot,
    chat_id: ChatId,
    user_id: i64,
    reply: &Reply,
    deps: &RuntimeDeps,
) -> Result<(), HandlerError> {
    send_reply(bot, chat_id, reply).await?;

    if let Some(save) = &reply.save_response {
        let conn = get_connection(&deps.db_pool)?;
        db::save_poll_response(&conn, user_id, save.poll_id, deps.config_id, &save.option_text)?;
        drop(conn);
        log::info!("Saved answer of user {} to poll {}", user_id, save.poll_id);
        bot.send_message(chat_id, save.thank_you_text.clone()).await?;
    }
    Ok(())
}

async fn send_reply(bot: &RuntimeBot, chat_id: ChatId, reply: &Reply) -> Result<(), teloxide::RequestError> {
    let mut request = bot.send_message(chat_id, reply.text.clone());
    if let Some(keyboard) = &reply.keyboard {
        request = request.reply_markup(keyboard.clone());
    }
    request.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::ops::ControlFlow;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const POLL_PROGRAM: &str = indoc! {r#"
        [bot]
        name = "PollBot"
        config_id = 7
        parse_mode = "MarkdownV2"
        database = "bot_users.db"

        [[handler]]
        kind = "callback"
        trigger = "poll_3_option_1"
        text = "Your choice: Yes"

        [handler.save_response]
        poll_id = 3
        option_text = "Yes"
        thank_you_text = "Thanks"
    "#};

    async fn telegram() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/sendmessage$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {
                    "message_id": 2,
                    "date": 1700000000,
                    "chat": {"id": 42, "type": "private", "first_name": "User"},
                    "text": "ok"
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/answercallbackquery$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .mount(&server)
            .await;
        server
    }

    fn runtime_bot(server: &MockServer) -> RuntimeBot {
        let url = url::Url::parse(&server.uri()).unwrap();
        Bot::new("123:abc").set_api_url(url).parse_mode(ParseMode::MarkdownV2)
    }

    fn poll_deps(dir: &Path) -> RuntimeDeps {
        let program = BotProgram::parse(POLL_PROGRAM).unwrap();
        RuntimeDeps {
            registry: Arc::new(HandlerRegistry::from_program(&program).unwrap()),
            db_pool: Arc::new(create_pool(dir.join("bot_users.db").to_str().unwrap()).unwrap()),
            config_id: program.bot.config_id,
            bot_username: Some("poll_bot".to_string()),
        }
    }

    fn callback_update(data: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 1,
            "callback_query": {
                "id": "cbq-1",
                "from": {"id": 42, "is_bot": false, "first_name": "User"},
                "chat_instance": "instance",
                "data": data,
                "message": {
                    "message_id": 1,
                    "date": 1700000000,
                    "chat": {"id": 42, "type": "private", "first_name": "User"},
                    "text": "Poll"
                }
            }
        }))
        .unwrap()
    }

    /// Bot API methods in the order they were called, with the sent text if any
    async fn calls(server: &MockServer) -> Vec<(String, Option<String>)> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|request| {
                let name = request.url.path().rsplit('/').next().unwrap_or_default().to_lowercase();
                let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
                (name, body["text"].as_str().map(str::to_string))
            })
            .collect()
    }

    fn saved_responses(deps: &RuntimeDeps) -> Vec<(i64, i64, i64, String)> {
        let conn = get_connection(&deps.db_pool).unwrap();
        let mut stmt = conn
            .prepare("SELECT user_id, poll_id, config_id, option_text FROM poll_responses ORDER BY response_id")
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[tokio::test]
    async fn test_poll_answer_is_saved_then_acknowledged() {
        let server = telegram().await;
        let dir = tempfile::tempdir().unwrap();
        let deps = poll_deps(dir.path());

        let flow = schema(deps.clone())
            .dispatch(dptree::deps![runtime_bot(&server), callback_update("poll_3_option_1")])
            .await;
        assert!(matches!(flow, ControlFlow::Break(Ok(()))));

        assert_eq!(
            calls(&server).await,
            vec![
                ("sendmessage".to_string(), Some("Your choice: Yes".to_string())),
                ("sendmessage".to_string(), Some("Thanks".to_string())),
                ("answercallbackquery".to_string(), None),
            ]
        );
        assert_eq!(saved_responses(&deps), vec![(42, 3, 7, "Yes".to_string())]);
    }

    #[tokio::test]
    async fn test_unknown_callback_is_only_acknowledged() {
        let server = telegram().await;
        let dir = tempfile::tempdir().unwrap();
        let deps = poll_deps(dir.path());

        let flow = schema(deps.clone())
            .dispatch(dptree::deps![runtime_bot(&server), callback_update("poll_9_option_9")])
            .await;
        assert!(matches!(flow, ControlFlow::Break(Ok(()))));

        assert_eq!(calls(&server).await, vec![("answercallbackquery".to_string(), None)]);
        assert!(saved_responses(&deps).is_empty());
    }

    #[tokio::test]
    async fn test_failed_reply_is_still_acknowledged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/sendmessage$"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)/answercallbackquery$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let deps = poll_deps(dir.path());

        let flow = schema(deps.clone())
            .dispatch(dptree::deps![runtime_bot(&server), callback_update("poll_3_option_1")])
            .await;
        assert!(matches!(flow, ControlFlow::Break(Ok(()))));

        let names: Vec<String> = calls(&server).await.into_iter().map(|(name, _)| name).collect();
        assert_eq!(names.last().map(String::as_str), Some("answercallbackquery"));
        assert_eq!(names.iter().filter(|name| *name == "answercallbackquery").count(), 1);
        // Без отправленного ответа голос не сохраняется
        assert!(saved_responses(&deps).is_empty());
    }

    #[test]
    fn test_resolve_database() {
        assert_eq!(
            resolve_database(Path::new("/srv/bots/7"), "/srv/bot_users.db"),
            PathBuf::from("/srv/bot_users.db")
        );
        assert_eq!(
            resolve_database(Path::new("/srv/bots/7"), "bot_users.db"),
            PathBuf::from("/srv/bots/7/bot_users.db")
        );
    }

    #[test]
    fn test_load_token_prefers_credential_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = BotFiles::new(dir.path(), 1);
        files.write_credential(&SecretString::from("1:file".to_string())).unwrap();
        assert_eq!(load_token(&files).unwrap().expose_secret(), "1:file");
    }
}
