use thiserror::Error;

use crate::media::ConversionError;

/// Centralized error types for the application
///
/// Uses `thiserror` for automatic error conversion and display formatting.
/// Job code returns [`AppResult`]; the dispatcher turns errors into a user-visible
/// failure on the job's status message.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[cfg(feature = "telegram")]
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Transport-level failures that are not Telegram API errors (missing handle, bad chat)
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP status code errors
    #[error("HTTP request failed with status: {0}")]
    HttpStatus(reqwest::StatusCode),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of stored settings
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// External media tool errors
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Validation errors (bad user input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A bounded wait elapsed
    #[error("Timed out: {0}")]
    Timeout(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Short text suitable for a status message
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Conversion(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}
