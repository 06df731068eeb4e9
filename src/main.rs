use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::path::Path;
use std::sync::Arc;
use teloxide::prelude::*;

use botforge::cli::{Cli, Commands, CreateTemplate};
use botforge::core::{config, init_logger, log_startup_configuration};
use botforge::generator::Generator;
use botforge::provision::Provisioner;
use botforge::schema::{validate_block_schema, validate_config};
use botforge::storage::db;
use botforge::storage::{create_pool, get_connection};
use botforge::supervisor::Supervisor;
use botforge::telegram::{create_bot, schema, setup_bot_commands, token, HandlerDeps, SessionStore};

/// Main entry point
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    match cli.command {
        // A generated bot sets up its own log file next to its program
        Some(Commands::RunBot { program }) => botforge::runtime::run(&program).await,
        Some(Commands::Generate { config, id, out }) => generate(&config, id, &out),
        Some(Commands::Validate { config }) => validate(&config),
        Some(Commands::Create { user_id, template }) => {
            init_logger(&*config::LOG_FILE_PATH)?;
            create(user_id, template).await
        }
        Some(Commands::Run) | None => {
            init_logger(&*config::LOG_FILE_PATH)?;
            run_meta_bot().await
        }
    }
}

fn read_config(path: &Path) -> Result<serde_json::Value> {
    let source = fs_err::read_to_string(path)?;
    serde_json::from_str(&source).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn generate(config_path: &Path, config_id: i64, out: &Path) -> Result<()> {
    let value = read_config(config_path)?;
    let generator = Generator::new(database_path()?);
    generator.generate(&value, out, config_id)?;
    println!("Program written to {}", out.display());
    Ok(())
}

fn validate(config_path: &Path) -> Result<()> {
    let value = read_config(config_path)?;
    let structural = validate_config(&value);
    let block = validate_block_schema(&value);
    println!("structure:    {}", structural);
    println!("block schema: {}", block);

    if structural.is_ok() && block.is_ok() {
        Ok(())
    } else {
        anyhow::bail!("configuration is invalid")
    }
}

/// Absolute database path, so generated bots find it from their own directory
fn database_path() -> Result<String> {
    let path = std::path::absolute(&*config::DATABASE_PATH)
        .with_context(|| format!("cannot resolve {}", *config::DATABASE_PATH))?;
    Ok(path.to_string_lossy().into_owned())
}

fn open_pool() -> Result<Arc<db::DbPool>> {
    Ok(Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    ))
}

fn provisioner(db_pool: &Arc<db::DbPool>) -> Result<Provisioner> {
    let supervisor = Supervisor::new(Arc::clone(db_pool), &*config::BOTS_DIR)?;
    Ok(Provisioner::new(
        Arc::clone(db_pool),
        Generator::new(database_path()?),
        Arc::new(supervisor),
    ))
}

/// Non-interactive creation through the same pipeline as the wizard
async fn create(user_id: i64, template: CreateTemplate) -> Result<()> {
    let request = template.into_request(user_id).map_err(|e| anyhow::anyhow!("Ошибка: {}", e))?;
    let db_pool = open_pool()?;
    db::create_user(&*get_connection(&db_pool)?, user_id, None, None, None)?;

    match provisioner(&db_pool)?.provision(request).await {
        Ok(created) => {
            println!(
                "Бот '{}' успешно создан и запущен! ID: {} (pid {})",
                created.bot_name, created.config_id, created.pid
            );
            Ok(())
        }
        Err(e) => {
            let kind = if e.is_config_error() {
                "Ошибка в конфигурации"
            } else {
                "Ошибка при запуске бота"
            };
            anyhow::bail!("{}: {}", kind, e)
        }
    }
}

async fn run_meta_bot() -> Result<()> {
    log::info!("Starting meta-bot...");
    log_startup_configuration();

    let bot = create_bot()?;
    let db_pool = open_pool()?;
    let provisioner = Arc::new(provisioner(&db_pool)?);

    // Bots recorded by a previous run are stopped before anything new starts
    let report = provisioner.supervisor().recover_on_startup().await?;
    if report.timed_out > 0 {
        log::warn!("{} bot process(es) from the previous run could not be stopped", report.timed_out);
    }

    match bot.get_me().await {
        Ok(me) => log::info!("Bot username: {:?}, Bot ID: {}", me.username, me.id),
        Err(e) => log::warn!("getMe failed: {}", e),
    }
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let deps = HandlerDeps::new(
        Arc::clone(&db_pool),
        Arc::new(SessionStore::new()),
        provisioner,
        token::client()?,
        config::bot_api_url(),
    );

    log::info!("📡 Ready to receive updates!");
    let listener = teloxide::update_listeners::Polling::builder(bot.clone())
        .drop_pending_updates()
        .build();
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
