use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, XError>;

#[derive(Debug, Error)]
pub enum XError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Rate limited (resets at {reset_at:?})")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl XError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            XError::Unauthorized { .. } => Some(401),
            XError::RateLimited { .. } => Some(429),
            XError::Api { status, .. } => Some(*status),
            XError::Network(_) | XError::Timeout(_) | XError::Parse(_) => None,
        }
    }
}

impl From<reqwest::Error> for XError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            XError::Timeout(err.to_string())
        } else if err.is_decode() {
            XError::Parse(err.to_string())
        } else {
            XError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for XError {
    fn from(err: serde_json::Error) -> Self {
        XError::Parse(err.to_string())
    }
}
