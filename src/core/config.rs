//! Configuration for the meta-bot and the processes it supervises.
//!
//! Values are read once from the environment (after `.env` has been loaded).

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot token of the meta-bot itself
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path shared by the meta-bot and every generated bot
/// Read from DATABASE_PATH environment variable
/// Default: bot_users.db
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "bot_users.db".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: botforge.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "botforge.log".to_string()));

/// Root directory of generated bots, one subdirectory per configuration id
/// Read from BOTS_DIR environment variable
/// Default: bots
pub static BOTS_DIR: Lazy<String> = Lazy::new(|| env::var("BOTS_DIR").unwrap_or_else(|_| "bots".to_string()));

/// Custom Bot API server (local telegram-bot-api or a test double)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Public Telegram Bot API endpoint
pub const DEFAULT_BOT_API_URL: &str = "https://api.telegram.org";

/// Returns the Bot API base URL, preferring BOT_API_URL when set
pub fn bot_api_url() -> String {
    BOT_API_URL
        .clone()
        .unwrap_or_else(|| DEFAULT_BOT_API_URL.to_string())
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Timeout for the getMe identity check performed on user-supplied tokens
    pub const TOKEN_CHECK_TIMEOUT_SECS: u64 = 10;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    /// Token check timeout duration
    pub fn token_check_timeout() -> Duration {
        Duration::from_secs(TOKEN_CHECK_TIMEOUT_SECS)
    }
}

/// Process supervision configuration
pub mod supervisor {
    use super::Duration;

    /// How long a generated bot gets to exit after SIGTERM (in seconds)
    pub const TERMINATE_TIMEOUT_SECS: u64 = 3;

    /// Interval between liveness checks while waiting for exit (in milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 100;

    /// Escalate to SIGKILL when the graceful wait runs out
    pub const KILL_ON_TIMEOUT: bool = true;

    /// Name of the generated program file inside a bot directory
    pub const PROGRAM_FILE: &str = "bot.toml";

    /// Name of the credential file inside a bot directory
    pub const CREDENTIAL_FILE: &str = "bot.env";

    /// Name of the log file written by a generated bot
    pub const LOG_FILE: &str = "bot.log";

    /// Termination timeout duration
    pub fn terminate_timeout() -> Duration {
        Duration::from_secs(TERMINATE_TIMEOUT_SECS)
    }

    /// Poll interval duration
    pub fn poll_interval() -> Duration {
        Duration::from_millis(POLL_INTERVAL_MS)
    }
}

/// Limits of the creation wizard
pub mod wizard {
    /// Allowed number of FAQ entries
    pub const FAQ_COUNT: (u32, u32) = (1, 4);

    /// Allowed number of polls in a poll bot
    pub const POLL_COUNT: (u32, u32) = (1, 4);

    /// Allowed number of options per poll
    pub const OPTION_COUNT: (u32, u32) = (2, 4);

    /// Minimum length of a normalized phone number, including the leading '+'
    pub const PHONE_MIN_LEN: usize = 7;
}

/// Limits imposed by the Telegram Bot API
pub mod limits {
    /// Maximum size of callback_data in bytes
    pub const CALLBACK_DATA_MAX_BYTES: usize = 64;

    /// Maximum length of a message text in characters
    pub const MESSAGE_MAX_CHARS: usize = 4096;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_durations() {
        assert_eq!(supervisor::terminate_timeout(), Duration::from_secs(3));
        assert!(supervisor::poll_interval() < supervisor::terminate_timeout());
    }

    #[test]
    fn test_wizard_limits_are_ordered() {
        for (min, max) in [wizard::FAQ_COUNT, wizard::POLL_COUNT, wizard::OPTION_COUNT] {
            assert!(min <= max);
        }
    }
}
