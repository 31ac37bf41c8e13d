//! Error types for the typed backend API

use core_auth::AuthError;
use thiserror::Error;

/// Message used when the backend rejects a request without explaining why.
pub const DEFAULT_ERROR_MESSAGE: &str = "request failed";

#[derive(Error, Debug)]
pub enum ApiError {
    /// No backend-authenticated session; the request was not sent
    #[error("Not signed in")]
    NotAuthenticated,

    /// The token was rejected and could not be renewed; the user was signed out
    #[error("Session expired")]
    SessionExpired,

    /// Backend answered with a non-2xx status
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Request rejected locally before sending
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Auth(AuthError),
}

impl ApiError {
    /// HTTP status of a backend rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::SessionExpired => Some(401),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Unauthorized => ApiError::SessionExpired,
            AuthError::NotAuthenticated => ApiError::NotAuthenticated,
            AuthError::Backend { status, message } => ApiError::Api {
                status,
                message: message.unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
            },
            AuthError::Network(message) => ApiError::Connection(message),
            AuthError::Serialization(message) => ApiError::InvalidResponse(message),
            other => ApiError::Auth(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
