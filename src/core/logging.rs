//! Logging initialization
//!
//! Both the meta-bot and every generated bot log through the `log` facade;
//! this module wires it to the console and a log file.

use anyhow::Result;
use simplelog::*;
use std::path::Path;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: impl AsRef<Path>) -> Result<()> {
    let log_file = fs_err::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path.as_ref())
        .map_err(|e| anyhow::anyhow!("Failed to open log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs where the meta-bot keeps its state, once at startup
pub fn log_startup_configuration() {
    use crate::core::config;

    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🤖 botforge {}", env!("CARGO_PKG_VERSION"));
    log::info!("   Database:  {}", *config::DATABASE_PATH);
    log::info!("   Bots dir:  {}", *config::BOTS_DIR);
    log::info!("   Log file:  {}", *config::LOG_FILE_PATH);
    match config::BOT_API_URL.as_deref() {
        Some(url) => log::info!("   Bot API:   {} (custom)", url),
        None => log::info!("   Bot API:   {}", config::DEFAULT_BOT_API_URL),
    }
    if config::BOT_TOKEN.is_empty() {
        log::warn!("⚠️  BOT_TOKEN is not set - the meta-bot cannot start");
    }
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
