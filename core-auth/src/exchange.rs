//! # Token Exchange Client
//!
//! Swaps an identity-provider assertion (or a stale backend token, or a
//! username/password pair) for a backend access token.
//!
//! ## Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | exchange  | `POST <backend>/auth/verify-<provider>` `{assertion, email?, name?, image?}` |
//! | renew     | `POST <backend>/auth/refresh` with `Authorization: Bearer <token>` |
//! | login     | `POST <backend>/auth/login` `{email, password}` |
//! | logout    | `POST <backend>/auth/logout` with `Authorization: Bearer <token>` |
//! | forgot password | `POST <backend>/auth/forgot-password` `{email}` |
//! | reset password  | `POST <backend>/auth/reset-password` `{token, newPassword}` |
//!
//! The first four answer with `{accessToken, expiresAt?, role?, user?: {id?, role?}}`,
//! optionally wrapped in a `data` envelope. The password endpoints carry no
//! token and only their status matters.
//!
//! ## Failure handling
//!
//! The token operations never fail: any network error, non-2xx status,
//! non-JSON content type, malformed body or missing token yields `None`.
//! The response body is read as text before anything else so the log line
//! can tell an HTML error page from broken JSON from a real rejection.

use crate::error::{AuthError, Result};
use crate::transport::{error_message, execute_bounded};
use crate::types::{parse_expiry, AccessToken, IdentityAssertion, Role, TokenGrant, WireId};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_runtime::config::{join_url, AppConfig};
use core_runtime::logging::{truncate_body, BODY_PREVIEW_LIMIT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
pub const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

/// Verify endpoint path for an identity provider, e.g. `/auth/verify-google`.
pub fn verify_path(provider: &str) -> String {
    format!("/auth/verify-{}", provider)
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    assertion: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    new_password: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantResponse {
    #[serde(default, alias = "symfonyToken", alias = "token")]
    access_token: Option<String>,
    #[serde(default)]
    expires_at: Option<serde_json::Value>,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    user: Option<GrantUser>,
    #[serde(default)]
    data: Option<Box<GrantResponse>>,
}

#[derive(Debug, Default, Deserialize)]
struct GrantUser {
    #[serde(default)]
    id: Option<WireId>,
    #[serde(default)]
    role: Option<Role>,
}

impl GrantResponse {
    /// Unwraps a `{"data": {...}}` envelope when the top level has no token.
    fn unwrap_envelope(self) -> Self {
        match self {
            GrantResponse {
                access_token: None,
                data: Some(inner),
                ..
            } => (*inner).unwrap_envelope(),
            other => other,
        }
    }

    fn into_grant(self) -> Option<TokenGrant> {
        let token = self.access_token.filter(|t| !t.is_empty())?;
        let (user_id, user_role) = match self.user {
            Some(user) => (user.id.map(WireId::into_string), user.role),
            None => (None, None),
        };

        Some(TokenGrant {
            access_token: AccessToken::new(token),
            expires_at: self.expires_at.as_ref().and_then(parse_expiry),
            role: self.role.or(user_role),
            user_id,
        })
    }
}

/// Client for the backend's token endpoints.
#[derive(Clone)]
pub struct TokenExchangeClient {
    http_client: Arc<dyn HttpClient>,
    backend_base_url: Option<String>,
    timeout: Duration,
}

impl TokenExchangeClient {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        backend_base_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            backend_base_url: backend_base_url.map(|url| url.trim_end_matches('/').to_string()),
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.http_client.clone(),
            config.backend_base_url.clone(),
            config.request_timeout,
        )
    }

    /// Whether a backend base URL is configured.
    pub fn is_configured(&self) -> bool {
        self.backend_base_url.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<String> {
        self.backend_base_url
            .as_deref()
            .map(|base| join_url(base, path))
            .ok_or_else(|| AuthError::Config("backend base URL is not configured".to_string()))
    }

    /// Exchanges an identity assertion for a backend token.
    ///
    /// Returns `None` on any failure; the cause is logged.
    #[instrument(skip(self, assertion))]
    pub async fn exchange(
        &self,
        provider: &str,
        assertion: &IdentityAssertion,
    ) -> Option<TokenGrant> {
        self.try_exchange(provider, assertion)
            .await
            .map_err(|e| log_failure("exchange", &e))
            .ok()
    }

    /// Same as [`exchange`](Self::exchange) but keeps the failure kind.
    pub async fn try_exchange(
        &self,
        provider: &str,
        assertion: &IdentityAssertion,
    ) -> Result<TokenGrant> {
        let url = self.endpoint(&verify_path(provider))?;
        let body = VerifyRequest {
            assertion: &assertion.assertion,
            email: assertion.hints.email.as_deref(),
            name: assertion.hints.name.as_deref(),
            image: assertion.hints.image.as_deref(),
        };
        let request = HttpRequest::new(HttpMethod::Post, url).json(&body)?;

        debug!("Verifying identity assertion with backend");
        self.request_grant(request).await
    }

    /// Renews a (possibly expired) backend token.
    #[instrument(skip(self, token))]
    pub async fn renew(&self, token: &AccessToken) -> Option<TokenGrant> {
        self.try_renew(token)
            .await
            .map_err(|e| log_failure("renew", &e))
            .ok()
    }

    pub async fn try_renew(&self, token: &AccessToken) -> Result<TokenGrant> {
        let url = self.endpoint(REFRESH_PATH)?;
        let request = HttpRequest::new(HttpMethod::Post, url).bearer_token(token.as_str());

        debug!("Renewing backend token");
        self.request_grant(request).await
    }

    /// Signs in with e-mail and password.
    #[instrument(skip(self, email, password))]
    pub async fn login(&self, email: &str, password: &str) -> Option<TokenGrant> {
        self.try_login(email, password)
            .await
            .map_err(|e| log_failure("login", &e))
            .ok()
    }

    pub async fn try_login(&self, email: &str, password: &str) -> Result<TokenGrant> {
        let url = self.endpoint(LOGIN_PATH)?;
        let request = HttpRequest::new(HttpMethod::Post, url).json(&LoginRequest { email, password })?;
        self.request_grant(request).await
    }

    /// Best-effort backend sign-out. Failures are logged and ignored.
    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &AccessToken) {
        let url = match self.endpoint(LOGOUT_PATH) {
            Ok(url) => url,
            Err(_) => return,
        };
        let request = HttpRequest::new(HttpMethod::Post, url).bearer_token(token.as_str());

        match execute_bounded(self.http_client.as_ref(), request, self.timeout).await {
            Ok(response) if response.is_success() => debug!("Backend session closed"),
            Ok(response) => debug!(status = response.status, "Backend logout not acknowledged"),
            Err(e) => debug!(error = %e, "Backend logout failed"),
        }
    }

    /// Asks the backend to e-mail a password reset link.
    #[instrument(skip(self, email))]
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let url = self.endpoint(FORGOT_PASSWORD_PATH)?;
        let request = HttpRequest::new(HttpMethod::Post, url).json(&ForgotPasswordRequest { email })?;
        self.request_ack("forgot_password", request).await?;
        info!("Password reset requested");
        Ok(())
    }

    /// Sets a new password using the token from the reset e-mail.
    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        let url = self.endpoint(RESET_PASSWORD_PATH)?;
        let request = HttpRequest::new(HttpMethod::Post, url).json(&ResetPasswordRequest {
            token,
            new_password,
        })?;
        self.request_ack("reset_password", request).await?;
        info!("Password reset completed");
        Ok(())
    }

    /// Sends a request whose only meaningful output is a 2xx status.
    async fn request_ack(&self, operation: &'static str, request: HttpRequest) -> Result<()> {
        let response = execute_bounded(self.http_client.as_ref(), request, self.timeout).await?;
        if response.is_success() {
            return Ok(());
        }

        let message = error_message(&response);
        warn!(
            operation,
            status = response.status,
            content_type = %response.content_type(),
            body_preview = %truncate_body(&String::from_utf8_lossy(&response.body), BODY_PREVIEW_LIMIT),
            "Account endpoint rejected the request"
        );
        Err(AuthError::Backend {
            status: response.status,
            message,
        })
    }

    async fn request_grant(&self, request: HttpRequest) -> Result<TokenGrant> {
        let response = execute_bounded(self.http_client.as_ref(), request, self.timeout)
            .await
            .map_err(|e| match e {
                AuthError::Network(message) => AuthError::ExchangeUnreachable(message),
                other => other,
            })?;

        let grant = parse_grant_response(&response)?;
        info!(
            status = response.status,
            has_expiry = grant.expires_at.is_some(),
            role = grant.role.as_ref().map(Role::as_str),
            "Backend issued access token"
        );
        Ok(grant)
    }
}

impl fmt::Debug for TokenExchangeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchangeClient")
            .field("backend_base_url", &self.backend_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Validates a token endpoint response: status, then content type, then JSON,
/// then the token field.
fn parse_grant_response(response: &HttpResponse) -> Result<TokenGrant> {
    let body = String::from_utf8_lossy(&response.body);
    let content_type = response.content_type().to_string();
    let preview = || truncate_body(&body, BODY_PREVIEW_LIMIT);

    if !response.is_success() {
        warn!(
            status = response.status,
            content_type = %content_type,
            body_preview = %preview(),
            "Token endpoint rejected the request"
        );
        return Err(AuthError::ExchangeRejected {
            status: response.status,
        });
    }

    if !response.is_json() {
        warn!(
            status = response.status,
            content_type = %content_type,
            body_preview = %preview(),
            "Token endpoint did not return JSON"
        );
        return Err(AuthError::ExchangeMalformedResponse {
            content_type,
            reason: "expected a JSON body".to_string(),
        });
    }

    let parsed: GrantResponse = serde_json::from_str(&body).map_err(|e| {
        warn!(
            status = response.status,
            content_type = %content_type,
            body_preview = %preview(),
            error = %e,
            "Token endpoint returned malformed JSON"
        );
        AuthError::ExchangeMalformedResponse {
            content_type: content_type.clone(),
            reason: e.to_string(),
        }
    })?;

    parsed.unwrap_envelope().into_grant().ok_or_else(|| {
        warn!(
            status = response.status,
            content_type = %content_type,
            "Token endpoint response has no access token"
        );
        AuthError::TokenMissing
    })
}

fn log_failure(operation: &'static str, error: &AuthError) {
    match error {
        AuthError::Config(_) => warn!(operation, error = %error, "Skipping token request"),
        other => warn!(operation, error = %other, "Token request failed"),
    }
}
