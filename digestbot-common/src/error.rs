// ================================================================
// File: digestbot-common/src/error.rs
// ================================================================

use thiserror::Error;

use crate::models::message::ChannelId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid time period '{0}', should be in hours (h) or days (d), e.g. '24h' or '7d'")]
    InvalidPeriod(String),

    /// Hydration finished and the channel bucket is still empty.
    #[error("No messages found in channel {0} within the requested window")]
    NoMessages(ChannelId),

    /// The history source refused access to the channel.
    #[error("Missing access to channel {0}")]
    Forbidden(ChannelId),

    #[error("AI error: {0}")]
    Ai(String),

    #[error("Variable store error: {0}")]
    VariableStore(String),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Failures of a collaborator across an I/O boundary (model, history,
    /// Discord, stores). These are reported to the requester with a
    /// correlation id and are never retried.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Platform(_)
                | Error::Ai(_)
                | Error::VariableStore(_)
                | Error::Timeout(_)
        )
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Ai(e.to_string())
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
