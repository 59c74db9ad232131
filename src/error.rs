use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(calform::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calform::config))]
    Config(String),

    #[error("Credentials error: {0}")]
    #[diagnostic(code(calform::credentials))]
    Credentials(String),

    #[error("Authorization error: {0}")]
    #[diagnostic(
        code(calform::authorization),
        help("run `get_calendar_token` or delete the token file to start a fresh consent flow")
    )]
    Authorization(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(calform::google_calendar))]
    GoogleCalendar(String),

    #[error(transparent)]
    #[diagnostic(code(calform::io))]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    #[diagnostic(code(calform::http))]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(calform::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(calform::other))]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Invalid environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create credentials errors
pub fn credentials_error(message: &str) -> Error {
    Error::Credentials(message.to_string())
}

/// Helper to create authorization errors
pub fn authorization_error(message: &str) -> Error {
    Error::Authorization(message.to_string())
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}
