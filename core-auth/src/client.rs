//! # Authenticated Request Client
//!
//! Sends backend requests with the current session token and performs at
//! most one renew-and-retry cycle per logical request.
//!
//! ## 401 handling
//!
//! 1. The one-shot retry flag of the [`PendingRequest`] is consumed.
//! 2. Without a token the session is unrecoverable: forced sign-out.
//! 3. Otherwise the token is renewed, the [`SessionStore`] is updated, and
//!    only then is the request re-sent with the new token.
//! 4. A failed renewal, or a second 401, forces a sign-out and returns
//!    [`AuthError::Unauthorized`].
//!
//! Concurrent requests that hit 401 at the same time each renew on their
//! own. Renewal is idempotent on the backend, so this only costs extra calls.

use crate::error::{AuthError, Result};
use crate::exchange::TokenExchangeClient;
use crate::session_store::SessionStore;
use crate::transport::{error_message, execute_bounded};
use crate::types::{AccessToken, SessionPatch};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use core_runtime::config::{join_url, AppConfig};
use core_runtime::events::{AuthEvent, EventBus};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// One logical outbound request, alive for the request plus its optional retry.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Correlates the original attempt and its retry in logs
    pub request_id: Uuid,
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    retried: bool,
}

impl PendingRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Consumes the single retry. Returns `true` only the first time.
    pub fn take_retry(&mut self) -> bool {
        !std::mem::replace(&mut self.retried, true)
    }

    /// Wire request carrying `token` as the only `Authorization` header.
    pub fn to_http_request(&self, token: Option<&AccessToken>) -> HttpRequest {
        let mut request = HttpRequest::new(self.method, self.url.clone());
        for (name, value) in &self.headers {
            request = request.header(name.clone(), value.clone());
        }
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }
        match token {
            Some(token) => request.bearer_token(token.as_str()),
            None => request,
        }
    }
}

/// Backend client that attaches the session token and renews it on 401.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http_client: Arc<dyn HttpClient>,
    backend_base_url: Option<String>,
    timeout: Duration,
    exchange: TokenExchangeClient,
    store: Arc<SessionStore>,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl AuthenticatedClient {
    pub fn new(
        config: &AppConfig,
        exchange: TokenExchangeClient,
        store: Arc<SessionStore>,
        events: EventBus,
    ) -> Self {
        Self {
            http_client: config.http_client.clone(),
            backend_base_url: config.backend_base_url.clone(),
            timeout: config.request_timeout,
            exchange,
            store,
            events,
            clock: Arc::new(SystemClock),
        }
    }

    /// Time source for the advisory expiry check.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether the session token is past its advisory expiry.
    ///
    /// Requests still carry an expired token; the backend decides and a 401
    /// triggers renewal.
    pub async fn token_expired(&self) -> bool {
        self.store
            .current()
            .await
            .map_or(false, |session| session.is_token_expired(self.clock.now()))
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    fn endpoint(&self, path: &str) -> Result<String> {
        self.backend_base_url
            .as_deref()
            .map(|base| join_url(base, path))
            .ok_or_else(|| AuthError::Config("backend base URL is not configured".to_string()))
    }

    /// Sends `method path` with an optional JSON body.
    ///
    /// Returns the successful response, [`AuthError::Unauthorized`] after a
    /// failed renewal, or [`AuthError::Backend`] for other non-2xx statuses.
    #[instrument(skip(self, body), fields(request_id = tracing::field::Empty))]
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<HttpResponse> {
        let mut pending = PendingRequest::new(method, self.endpoint(path)?);
        if let Some(body) = body {
            pending = pending.with_json(&body)?;
        }
        tracing::Span::current().record("request_id", tracing::field::display(pending.request_id));
        if self.token_expired().await {
            debug!("Sending a token past its advisory expiry");
        }

        self.send(pending).await
    }

    /// Runs a pending request through the 401 renewal cycle.
    pub async fn send(&self, mut pending: PendingRequest) -> Result<HttpResponse> {
        loop {
            let token = self.store.current_token().await;
            let request = pending.to_http_request(token.as_ref());
            let response =
                execute_bounded(self.http_client.as_ref(), request, self.timeout).await?;

            if response.is_unauthorized() {
                if !pending.take_retry() {
                    warn!(request_id = %pending.request_id, "Backend rejected the renewed token");
                    self.force_sign_out().await;
                    return Err(AuthError::Unauthorized);
                }

                let token = match token {
                    Some(token) => token,
                    None => {
                        debug!(request_id = %pending.request_id, "401 without a session token");
                        self.force_sign_out().await;
                        return Err(AuthError::Unauthorized);
                    }
                };

                self.renew(&token).await?;
                debug!(request_id = %pending.request_id, "Retrying with renewed token");
                continue;
            }

            if !response.is_success() {
                let message = error_message(&response);
                debug!(
                    request_id = %pending.request_id,
                    status = response.status,
                    "Backend returned an error"
                );
                return Err(AuthError::Backend {
                    status: response.status,
                    message,
                });
            }

            return Ok(response);
        }
    }

    /// Renews `token` and stores the result before returning.
    async fn renew(&self, token: &AccessToken) -> Result<()> {
        self.events.emit_auth(AuthEvent::TokenRenewing);

        let grant = match self.exchange.renew(token).await {
            Some(grant) => grant,
            None => {
                self.force_sign_out().await;
                return Err(AuthError::Unauthorized);
            }
        };

        match self.store.update(SessionPatch::from(&grant)).await {
            Ok(_) => {}
            Err(AuthError::SessionStorage(reason)) => {
                warn!(%reason, "Renewed token kept in memory only");
            }
            Err(e) => return Err(e),
        }

        info!(expires_at = ?grant.expires_at, "Access token renewed");
        self.events.emit_auth(AuthEvent::TokenRenewed {
            expires_at: grant.expires_at.map(|at| at.timestamp()),
        });
        Ok(())
    }

    /// Clears the session after an unrecoverable 401.
    async fn force_sign_out(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear durable session during forced sign-out");
        }
        info!("Session cleared after failed token renewal");
        self.events.emit_auth(AuthEvent::SignedOut { forced: true });
    }

    /// Sends a request and decodes the JSON response body.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let response = self.request(method, path, body).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request_json(HttpMethod::Get, path, None).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request_json(HttpMethod::Post, path, Some(body)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request_json(HttpMethod::Put, path, Some(body)).await
    }

    /// Sends a `POST` whose response body is ignored.
    pub async fn post_no_content<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let body = serde_json::to_value(body)?;
        self.request(HttpMethod::Post, path, Some(body)).await?;
        Ok(())
    }

    /// Sends a `DELETE`; the response body is ignored.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.request(HttpMethod::Delete, path, None).await?;
        Ok(())
    }
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("backend_base_url", &self.backend_base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
