//! # Session Store
//!
//! Single owner of the current [`Session`]. Reads go through
//! [`SessionStore::current`]; writes only through the sign-in path
//! ([`establish`](SessionStore::establish)), the renewal path
//! ([`update`](SessionStore::update)) and [`clear`](SessionStore::clear).
//!
//! Every write holds the snapshot lock until the durable backend has been
//! written, so once `update` returns the next `current()` observes the new
//! token, including reads from a request that is about to be retried.

use crate::error::{AuthError, Result};
use crate::transport::execute_bounded;
use crate::types::{AccessToken, Session, SessionPatch, SessionStatus};
use async_trait::async_trait;
use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::storage::SecureStore;
use core_runtime::config::{join_url, AppConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Key under which [`SecureSessionBackend`] keeps the serialized session.
pub const SESSION_SECRET_KEY: &str = "quinicat.session";

pub const SESSION_ENDPOINT_PATH: &str = "/api/auth/session";
pub const SESSION_UPDATE_PATH: &str = "/api/auth/session?update";
pub const SIGN_OUT_ENDPOINT_PATH: &str = "/api/auth/signout";

/// Durable representation of the session.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Loads the persisted session, `None` if there is none.
    async fn load(&self) -> Result<Option<Session>>;

    /// Persists the session, replacing any previous one.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Removes the persisted session.
    async fn clear(&self) -> Result<()>;
}

/// Process-local backend; nothing survives a restart.
#[derive(Default)]
pub struct InMemorySessionBackend {
    session: Mutex<Option<Session>>,
}

impl InMemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

#[async_trait]
impl SessionBackend for InMemorySessionBackend {
    async fn load(&self) -> Result<Option<Session>> {
        Ok(self.session.lock().await.clone())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.session.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.session.lock().await = None;
        Ok(())
    }
}

fn storage_error(error: BridgeError) -> AuthError {
    AuthError::SessionStorage(error.to_string())
}

/// Session serialized as JSON in the platform secure store.
pub struct SecureSessionBackend {
    store: Arc<dyn SecureStore>,
    key: String,
}

impl SecureSessionBackend {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self {
            store,
            key: SESSION_SECRET_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

#[async_trait]
impl SessionBackend for SecureSessionBackend {
    async fn load(&self) -> Result<Option<Session>> {
        let bytes = match self.store.get_secret(&self.key).await.map_err(storage_error)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding corrupted session entry");
                self.store
                    .delete_secret(&self.key)
                    .await
                    .map_err(storage_error)?;
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let bytes = serde_json::to_vec(session)?;
        self.store
            .set_secret(&self.key, &bytes)
            .await
            .map_err(storage_error)
    }

    async fn clear(&self) -> Result<()> {
        self.store
            .delete_secret(&self.key)
            .await
            .map_err(storage_error)
    }
}

/// Same-origin session endpoint of the web host.
///
/// Cookies identifying the session are the host HTTP client's concern.
pub struct SessionEndpointBackend {
    http_client: Arc<dyn HttpClient>,
    app_url: String,
    timeout: Duration,
}

impl SessionEndpointBackend {
    pub fn new(http_client: Arc<dyn HttpClient>, app_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client,
            app_url: app_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.http_client.clone(),
            config.app_url.clone(),
            config.request_timeout,
        )
    }

    async fn send(&self, request: HttpRequest) -> Result<bridge_traits::http::HttpResponse> {
        let response = execute_bounded(self.http_client.as_ref(), request, self.timeout)
            .await
            .map_err(|e| AuthError::SessionStorage(e.to_string()))?;
        if !response.is_success() {
            return Err(AuthError::SessionStorage(format!(
                "session endpoint returned status {}",
                response.status
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl SessionBackend for SessionEndpointBackend {
    async fn load(&self) -> Result<Option<Session>> {
        let request = HttpRequest::new(HttpMethod::Get, join_url(&self.app_url, SESSION_ENDPOINT_PATH));
        let response = self.send(request).await?;
        if response.body.is_empty() {
            return Ok(None);
        }

        let value: serde_json::Value = serde_json::from_slice(&response.body)?;
        let empty = match &value {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let patch = SessionPatch {
            access_token: session.access_token.clone(),
            expires_at: session.expires_at,
            role: session.role.clone(),
        };
        let request = HttpRequest::new(HttpMethod::Post, join_url(&self.app_url, SESSION_UPDATE_PATH))
            .json(&patch)?;
        self.send(request).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, join_url(&self.app_url, SIGN_OUT_ENDPOINT_PATH));
        self.send(request).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StoreState {
    session: Option<Session>,
    restored: bool,
}

/// Owner of the current session snapshot.
pub struct SessionStore {
    state: RwLock<StoreState>,
    backend: Arc<dyn SessionBackend>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySessionBackend::new()))
    }

    /// Loads the durable session and resolves the status.
    ///
    /// A backend failure still resolves the status (to unauthenticated) so
    /// the route guard never stays pending; the error is returned.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<SessionStatus> {
        let mut state = self.state.write().await;
        let loaded = self.backend.load().await;
        state.restored = true;

        match loaded {
            Ok(session) => {
                state.session = session;
                let status = SessionStatus::of(state.session.as_ref());
                debug!(%status, "Session restored");
                Ok(status)
            }
            Err(e) => {
                warn!(error = %e, "Failed to restore session");
                state.session = None;
                Err(e)
            }
        }
    }

    /// Snapshot of the current session.
    pub async fn current(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }

    /// Current backend token, if the session is backend-authenticated.
    pub async fn current_token(&self) -> Option<AccessToken> {
        self.state
            .read()
            .await
            .session
            .as_ref()
            .and_then(|session| session.access_token.clone())
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.state.read().await;
        if !state.restored {
            return SessionStatus::Pending;
        }
        SessionStatus::of(state.session.as_ref())
    }

    /// Replaces the session (sign-in path).
    #[instrument(skip(self, session), fields(backend_authenticated = session.is_backend_authenticated()))]
    pub async fn establish(&self, session: Session) -> Result<()> {
        let mut state = self.state.write().await;
        state.restored = true;
        state.session = Some(session.clone());
        self.backend.save(&session).await?;
        info!(user_id = ?session.user.id, "Session established");
        Ok(())
    }

    /// Applies `patch` to the current session and persists it (renewal path).
    ///
    /// The in-memory snapshot is updated even if persisting fails; the
    /// persistence error is still returned.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, patch: SessionPatch) -> Result<Session> {
        let mut state = self.state.write().await;
        let session = state.session.as_mut().ok_or(AuthError::NotAuthenticated)?;
        session.apply(&patch);
        let updated = session.clone();

        self.backend.save(&updated).await?;
        debug!(
            token_changed = patch.access_token.is_some(),
            expires_at = ?updated.expires_at,
            "Session updated"
        );
        Ok(updated)
    }

    /// Drops the session locally and in the durable backend.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.restored = true;
        state.session = None;
        self.backend.clear().await
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}
