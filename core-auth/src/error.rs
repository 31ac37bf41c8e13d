use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Message shown to end users for every failed backend exchange.
///
/// Diagnostics (status codes, content types, body previews) are logged,
/// never surfaced.
pub const AUTH_INCOMPLETE_MESSAGE: &str = "authentication could not be completed";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Identity provider finished without an assertion")]
    IdentityAssertionMissing,

    #[error("Token exchange endpoint unreachable: {0}")]
    ExchangeUnreachable(String),

    #[error("Token exchange returned a malformed response (content-type '{content_type}'): {reason}")]
    ExchangeMalformedResponse {
        content_type: String,
        reason: String,
    },

    #[error("Token exchange rejected with status {status}")]
    ExchangeRejected { status: u16 },

    #[error("Token exchange response did not contain an access token")]
    TokenMissing,

    #[error("Backend rejected the access token")]
    Unauthorized,

    #[error("Backend error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Backend { status: u16, message: Option<String> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Session storage error: {0}")]
    SessionStorage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sign-in failed")]
    SignInFailed,

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    /// User-safe description of the failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::IdentityAssertionMissing
            | AuthError::ExchangeUnreachable(_)
            | AuthError::ExchangeMalformedResponse { .. }
            | AuthError::ExchangeRejected { .. }
            | AuthError::TokenMissing
            | AuthError::SignInFailed => AUTH_INCOMPLETE_MESSAGE,
            AuthError::Unauthorized | AuthError::NotAuthenticated => {
                "your session has expired, please sign in again"
            }
            AuthError::Network(_) => "the server could not be reached",
            AuthError::Backend { .. } => "the server could not process the request",
            AuthError::SessionStorage(_)
            | AuthError::Serialization(_)
            | AuthError::Config(_) => "an internal error occurred",
        }
    }

    /// Whether signing in again (or retrying) can resolve the failure.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AuthError::Config(_) | AuthError::Serialization(_) | AuthError::SessionStorage(_)
        )
    }

    /// Whether the failure came from contacting the verify/refresh/login endpoints.
    pub fn is_exchange_failure(&self) -> bool {
        matches!(
            self,
            AuthError::ExchangeUnreachable(_)
                | AuthError::ExchangeMalformedResponse { .. }
                | AuthError::ExchangeRejected { .. }
                | AuthError::TokenMissing
        )
    }
}

impl From<BridgeError> for AuthError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Timeout(after) => {
                AuthError::Network(format!("request timed out after {:?}", after))
            }
            other => AuthError::Network(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        AuthError::Serialization(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
