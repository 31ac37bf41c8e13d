//! # Authentication Manager
//!
//! Facade over the exchange client, session store, authenticated client and
//! route guard. Its only own state is a `loading` flag and the last
//! user-facing error; every read goes back to the [`SessionStore`].
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{AuthManager, IdentityAssertion, StaticIdentityProvider};
//! use core_runtime::config::AppConfig;
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! let config = AppConfig::from_env().map_err(|e| core_auth::AuthError::Config(e.to_string()))?;
//! let provider = StaticIdentityProvider::new("google", Some(IdentityAssertion::new("id-token")));
//! let manager = AuthManager::from_config(&config, EventBus::default())
//!     .with_identity_provider(Arc::new(provider));
//!
//! manager.restore().await;
//! let session = manager.sign_in_with_provider().await?;
//! if !session.is_backend_authenticated() {
//!     println!("{}", manager.error().await.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::AuthenticatedClient;
use crate::error::{AuthError, Result, AUTH_INCOMPLETE_MESSAGE};
use crate::exchange::TokenExchangeClient;
use crate::guard::{GuardDecision, RouteGuard};
use crate::provider::IdentityProvider;
use crate::session_store::{InMemorySessionBackend, SecureSessionBackend, SessionBackend, SessionStore};
use crate::types::{Session, SessionPatch, SessionStatus, SessionUser};
use core_runtime::config::AppConfig;
use core_runtime::events::{AuthEvent, EventBus};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

const CREDENTIALS_PROVIDER: &str = "credentials";

#[derive(Debug, Default)]
struct FacadeState {
    loading: bool,
    error: Option<String>,
}

/// Entry point consumed by the UI layer.
pub struct AuthManager {
    exchange: TokenExchangeClient,
    store: Arc<SessionStore>,
    client: AuthenticatedClient,
    guard: RouteGuard,
    events: EventBus,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
    state: RwLock<FacadeState>,
}

impl AuthManager {
    pub fn new(config: &AppConfig, backend: Arc<dyn SessionBackend>, events: EventBus) -> Self {
        let exchange = TokenExchangeClient::from_config(config);
        let store = Arc::new(SessionStore::new(backend));
        let client =
            AuthenticatedClient::new(config, exchange.clone(), store.clone(), events.clone());
        let guard = RouteGuard::from_config(config).with_events(events.clone());

        Self {
            exchange,
            store,
            client,
            guard,
            events,
            identity_provider: None,
            state: RwLock::new(FacadeState::default()),
        }
    }

    /// Uses the configured secure store for the durable session when present,
    /// otherwise keeps the session in memory.
    pub fn from_config(config: &AppConfig, events: EventBus) -> Self {
        let backend: Arc<dyn SessionBackend> = match &config.secure_store {
            Some(store) => Arc::new(SecureSessionBackend::new(store.clone())),
            None => Arc::new(InMemorySessionBackend::new()),
        };
        Self::new(config, backend, events)
    }

    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    /// Loads the durable session. Failures are logged and leave the user
    /// signed out.
    pub async fn restore(&self) -> SessionStatus {
        match self.store.restore().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Starting without a session");
                SessionStatus::Unauthenticated
            }
        }
    }

    /// Runs the identity-provider flow and exchanges its assertion.
    ///
    /// When the backend exchange fails the identity is still kept as a
    /// partial session (not backend-authenticated) and [`error`](Self::error)
    /// reports the generic failure message.
    #[instrument(skip(self))]
    pub async fn sign_in_with_provider(&self) -> Result<Session> {
        let provider = match &self.identity_provider {
            Some(provider) => provider.clone(),
            None => {
                return Err(self
                    .fail(AuthError::Config("no identity provider configured".to_string()))
                    .await)
            }
        };

        self.begin(provider.name()).await;

        let assertion = match provider.authenticate().await {
            Ok(Some(assertion)) => assertion,
            Ok(None) => return Err(self.fail(AuthError::IdentityAssertionMissing).await),
            Err(e) => return Err(self.fail(e).await),
        };

        let user = assertion.to_user();
        let session = match self.exchange.exchange(provider.name(), &assertion).await {
            Some(grant) => Session::from_grant(user, grant),
            None => {
                self.events.emit_auth(AuthEvent::ExchangeFailed {
                    message: AUTH_INCOMPLETE_MESSAGE.to_string(),
                });
                Session::partial(user)
            }
        };

        self.complete(session).await
    }

    /// Signs in with e-mail and password against the backend.
    #[instrument(skip(self, email, password))]
    pub async fn sign_in_with_credentials(&self, email: &str, password: &str) -> Result<Session> {
        self.begin(CREDENTIALS_PROVIDER).await;

        let grant = match self.exchange.login(email, password).await {
            Some(grant) => grant,
            None => {
                self.events.emit_auth(AuthEvent::ExchangeFailed {
                    message: AUTH_INCOMPLETE_MESSAGE.to_string(),
                });
                return Err(self.fail(AuthError::SignInFailed).await);
            }
        };

        let user = SessionUser {
            email: Some(email.to_string()),
            ..SessionUser::default()
        };
        self.complete(Session::from_grant(user, grant)).await
    }

    /// Signs out locally and, best effort, on the backend.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        if let Some(token) = self.store.current_token().await {
            self.exchange.logout(&token).await;
        }

        let cleared = self.store.clear().await;
        *self.state.write().await = FacadeState::default();
        self.events.emit_auth(AuthEvent::SignedOut { forced: false });
        info!("User signed out");

        cleared
    }

    pub async fn get_session(&self) -> Option<Session> {
        self.store.current().await
    }

    pub async fn status(&self) -> SessionStatus {
        self.store.status().await
    }

    /// Applies a partial update to the current session.
    pub async fn refresh_session(&self, patch: SessionPatch) -> Result<Session> {
        self.store.update(patch).await
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Last user-facing error, cleared by the next sign-in attempt.
    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Starts password recovery for `email`; works without a session.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        self.exchange.forgot_password(email).await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        self.exchange.reset_password(token, new_password).await
    }

    /// Route guard decision for navigating to `path` now.
    pub async fn navigate(&self, path: &str) -> GuardDecision {
        self.guard.check(&self.store, path).await
    }

    async fn begin(&self, provider: &str) {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
        }
        self.events.emit_auth(AuthEvent::SigningIn {
            provider: provider.to_string(),
        });
    }

    async fn complete(&self, session: Session) -> Result<Session> {
        let backend_authenticated = session.is_backend_authenticated();

        match self.store.establish(session.clone()).await {
            Ok(()) => {}
            Err(AuthError::SessionStorage(reason)) => {
                warn!(%reason, "Session kept in memory only");
            }
            Err(e) => return Err(self.fail(e).await),
        }

        {
            let mut state = self.state.write().await;
            state.loading = false;
            state.error = if backend_authenticated {
                None
            } else {
                Some(AUTH_INCOMPLETE_MESSAGE.to_string())
            };
        }

        info!(user_id = ?session.user.id, backend_authenticated, "Sign-in completed");
        self.events.emit_auth(AuthEvent::SignedIn {
            user_id: session.user.id.clone(),
            backend_authenticated,
        });
        Ok(session)
    }

    async fn fail(&self, error: AuthError) -> AuthError {
        warn!(error = %error, "Sign-in failed");
        {
            let mut state = self.state.write().await;
            state.loading = false;
            state.error = Some(error.user_message().to_string());
        }
        self.events.emit_auth(AuthEvent::AuthError {
            message: error.user_message().to_string(),
            recoverable: error.is_recoverable(),
        });
        error
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("exchange", &self.exchange)
            .field("guard", &self.guard)
            .field("has_identity_provider", &self.identity_provider.is_some())
            .finish_non_exhaustive()
    }
}
