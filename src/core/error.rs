use thiserror::Error;

/// Centralized error types for the application
///
/// All errors in the application are converted to this enum for consistent error handling.
/// Uses `thiserror` for automatic error conversion and display formatting.
///
/// Validators are deliberately not part of this picture: they report through
/// [`crate::schema::Verdict`] and only turn into `AppError::Validation` when a
/// caller asks for a `Result`.
///
/// # Example
///
/// ```no_run
/// use botforge::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialized configuration could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generated program could not be parsed
    #[error("Program parse error: {0}")]
    Program(#[from] toml::de::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed configuration reached the generator
    #[error("Generation error: {0}")]
    Generation(String),

    /// Spawning or signalling a bot process failed
    #[error("Process error: {0}")]
    Process(String),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// True for errors caused by the configuration itself rather than the environment
    pub fn is_config_error(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::Generation(_))
    }
}
