//! Gateway error model.

use thiserror::Error;

/// Failure of an authorized API call.
///
/// `Unauthorized` and `Http` display exactly their message so the UI layer
/// can show them verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The API rejected the credential; the session has been torn down.
    #[error("Unauthorized")]
    Unauthorized,

    /// Non-success status, with the server's message when it sent one.
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
