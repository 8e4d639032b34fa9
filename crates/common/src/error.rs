//! Common error types.

use thiserror::Error;

/// Main error type for the devtools shell.
#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Window could not be opened: {0}")]
    WindowBlocked(String),

    #[error("Unsupported window kind: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),
}

pub type ShellResult<T> = Result<T, ShellError>;

impl ShellError {
    pub fn invalid_url(msg: impl Into<String>) -> Self {
        Self::InvalidUrl(msg.into())
    }

    pub fn blocked(msg: impl Into<String>) -> Self {
        Self::WindowBlocked(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_color(msg: impl Into<String>) -> Self {
        Self::InvalidColor(msg.into())
    }

    /// Whether the caller may retry the same operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WindowBlocked(_) | Self::Io(_))
    }
}
