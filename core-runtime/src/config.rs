//! # Application Configuration
//!
//! Provides configuration management for the QuiniCat auth bridge.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! [`AppConfig`] that holds the backend endpoints, identity-provider client
//! credentials, route classification defaults and the injected host bridges.
//! Malformed values fail fast at [`build()`](AppConfigBuilder::build); absent
//! optional values (most notably the backend URL) are allowed so that the
//! token exchange can degrade to "no token" instead of crashing.
//!
//! ## Environment
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `QUINICAT_BACKEND_URL` | Base URL of the token-issuing backend | unset |
//! | `QUINICAT_APP_URL` | Same-origin base for the session endpoint | `http://localhost:3000` |
//! | `GOOGLE_CLIENT_ID` | Identity-provider client id | unset |
//! | `GOOGLE_CLIENT_SECRET` | Identity-provider client secret | unset |
//! | `QUINICAT_REQUEST_TIMEOUT_SECS` | Whole-request timeout for backend calls | `10` |
//! | `QUINICAT_LOG` | Log filter directive | unset |
//!
//! Empty variables are treated as unset.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::AppConfig;
//! use std::sync::Arc;
//!
//! let config = AppConfig::builder()
//!     .backend_base_url("https://api.quinicat.example")
//!     .http_client(Arc::new(MyHttpClient))
//!     .build()?;
//! ```
//!
//! When the `desktop-shims` feature is enabled a reqwest-backed `HttpClient`
//! honouring the configured timeout is injected if none is provided.

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, SecureStore};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const ENV_BACKEND_URL: &str = "QUINICAT_BACKEND_URL";
pub const ENV_APP_URL: &str = "QUINICAT_APP_URL";
pub const ENV_GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
pub const ENV_GOOGLE_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "QUINICAT_REQUEST_TIMEOUT_SECS";
pub const ENV_LOG: &str = "QUINICAT_LOG";

pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SIGN_IN_PATH: &str = "/login";
pub const DEFAULT_LANDING_PATH: &str = "/dashboard";
pub const DEFAULT_PROTECTED_PREFIX: &str = "/dashboard";

const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Application configuration.
///
/// Use [`AppConfigBuilder`] (via [`AppConfig::builder`] or
/// [`AppConfigBuilder::from_env`]) to construct instances.
#[derive(Clone)]
pub struct AppConfig {
    /// Backend base URL without trailing slash. `None` disables token exchange.
    pub backend_base_url: Option<String>,

    /// Same-origin application URL hosting `/api/auth/*`, without trailing slash
    pub app_url: String,

    /// Identity-provider client credentials
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,

    /// Whole-request timeout applied to every backend call
    pub request_timeout: Duration,

    /// Sign-in page path
    pub sign_in_path: String,

    /// Default page for authenticated users
    pub landing_path: String,

    /// URL prefixes that require a backend-authenticated session
    pub protected_prefixes: Vec<String>,

    /// Log filter directive (e.g. `core_auth=debug`)
    pub log_filter: Option<String>,

    /// HTTP transport
    pub http_client: Arc<dyn HttpClient>,

    /// Durable secret storage (optional; only the secure session backend needs it)
    pub secure_store: Option<Arc<dyn SecureStore>>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("backend_base_url", &self.backend_base_url)
            .field("app_url", &self.app_url)
            .field("google_client_id", &self.google_client_id)
            .field(
                "google_client_secret",
                &self.google_client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .field("sign_in_path", &self.sign_in_path)
            .field("landing_path", &self.landing_path)
            .field("protected_prefixes", &self.protected_prefixes)
            .field("log_filter", &self.log_filter)
            .field("http_client", &"HttpClient { ... }")
            .field(
                "secure_store",
                &self.secure_store.as_ref().map(|_| "SecureStore { ... }"),
            )
            .finish()
    }
}

impl AppConfig {
    /// Creates a new builder for constructing an `AppConfig`.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Loads settings from the process environment and builds the config.
    pub fn from_env() -> Result<Self> {
        AppConfigBuilder::from_env()?.build()
    }

    /// Absolute URL of a backend endpoint, or `None` when no backend is configured.
    pub fn backend_endpoint(&self, path: &str) -> Option<String> {
        self.backend_base_url
            .as_deref()
            .map(|base| join_url(base, path))
    }

    /// Absolute URL of a same-origin application endpoint.
    pub fn app_endpoint(&self, path: &str) -> String {
        join_url(&self.app_url, path)
    }

    /// Whether the identity-provider client credentials are configured.
    pub fn has_identity_provider(&self) -> bool {
        self.google_client_id.is_some()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - URLs parse and use http(s)
    /// - The request timeout is within (0, 300s]
    /// - Route paths are absolute
    /// - A client secret is never configured without a client id
    pub fn validate(&self) -> Result<()> {
        if let Some(base) = &self.backend_base_url {
            validate_http_url("backend URL", base)?;
        }
        validate_http_url("application URL", &self.app_url)?;

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(Error::Config(format!(
                "Request timeout exceeds maximum of {} seconds",
                MAX_REQUEST_TIMEOUT.as_secs()
            )));
        }

        validate_path("Sign-in path", &self.sign_in_path)?;
        validate_path("Landing path", &self.landing_path)?;
        for prefix in &self.protected_prefixes {
            validate_path("Protected prefix", prefix)?;
        }

        if self.google_client_secret.is_some() && self.google_client_id.is_none() {
            return Err(Error::Config(format!(
                "{} is set but {} is missing",
                ENV_GOOGLE_CLIENT_SECRET, ENV_GOOGLE_CLIENT_ID
            )));
        }

        Ok(())
    }
}

/// Joins a base URL and a path with exactly one slash between them.
///
/// ```
/// use core_runtime::config::join_url;
/// assert_eq!(join_url("https://api.example/", "/auth/refresh"), "https://api.example/auth/refresh");
/// ```
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn validate_http_url(label: &str, value: &str) -> Result<()> {
    let url =
        Url::parse(value).map_err(|e| Error::Config(format!("Invalid {}: {}", label, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "Invalid {}: unsupported scheme '{}'",
            label, other
        ))),
    }
}

fn validate_path(label: &str, path: &str) -> Result<()> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} must start with '/': {}",
            label, path
        )))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::with_timeout(timeout));
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for backend calls. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Other hosts: inject an implementation with .http_client()."
            .to_string(),
    })
}

/// Builder for constructing [`AppConfig`] instances.
#[derive(Default)]
pub struct AppConfigBuilder {
    backend_base_url: Option<String>,
    app_url: Option<String>,
    google_client_id: Option<String>,
    google_client_secret: Option<String>,
    request_timeout: Option<Duration>,
    sign_in_path: Option<String>,
    landing_path: Option<String>,
    protected_prefixes: Option<Vec<String>>,
    log_filter: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
}

impl AppConfigBuilder {
    /// Seeds a builder from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Seeds a builder from an arbitrary key lookup.
    ///
    /// ```
    /// use core_runtime::config::AppConfigBuilder;
    /// use std::collections::HashMap;
    ///
    /// let vars = HashMap::from([("QUINICAT_BACKEND_URL", "https://api.example")]);
    /// let builder = AppConfigBuilder::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));

        let request_timeout = match get(ENV_REQUEST_TIMEOUT_SECS) {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    Error::Config(format!(
                        "{} must be a whole number of seconds, got '{}'",
                        ENV_REQUEST_TIMEOUT_SECS, raw
                    ))
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            backend_base_url: get(ENV_BACKEND_URL),
            app_url: get(ENV_APP_URL),
            google_client_id: get(ENV_GOOGLE_CLIENT_ID),
            google_client_secret: get(ENV_GOOGLE_CLIENT_SECRET),
            request_timeout,
            log_filter: get(ENV_LOG),
            ..Self::default()
        })
    }

    /// Sets the backend base URL.
    pub fn backend_base_url(mut self, url: impl Into<String>) -> Self {
        self.backend_base_url = Some(url.into());
        self
    }

    /// Sets the same-origin application URL.
    ///
    /// Default: `http://localhost:3000`
    pub fn app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = Some(url.into());
        self
    }

    /// Sets the identity-provider client credentials.
    pub fn google_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.google_client_id = Some(client_id.into());
        self.google_client_secret = Some(client_secret.into());
        self
    }

    /// Sets the whole-request timeout.
    ///
    /// Default: 10 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = Some(path.into());
        self
    }

    pub fn landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = Some(path.into());
        self
    }

    /// Replaces the protected prefixes.
    ///
    /// Default: `["/dashboard"]`
    pub fn protected_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_prefixes = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the secure store implementation.
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Builds the final `AppConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No `HttpClient` is injected and no desktop default is available
    /// - Any value fails [`AppConfig::validate`]
    pub fn build(self) -> Result<AppConfig> {
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let config = AppConfig {
            backend_base_url: non_empty(self.backend_base_url)
                .map(|url| url.trim_end_matches('/').to_string()),
            app_url: non_empty(self.app_url)
                .unwrap_or_else(|| DEFAULT_APP_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            google_client_id: non_empty(self.google_client_id),
            google_client_secret: non_empty(self.google_client_secret),
            request_timeout,
            sign_in_path: self
                .sign_in_path
                .unwrap_or_else(|| DEFAULT_SIGN_IN_PATH.to_string()),
            landing_path: self
                .landing_path
                .unwrap_or_else(|| DEFAULT_LANDING_PATH.to_string()),
            protected_prefixes: self
                .protected_prefixes
                .unwrap_or_else(|| vec![DEFAULT_PROTECTED_PREFIX.to_string()]),
            log_filter: non_empty(self.log_filter),
            http_client,
            secure_store: self.secure_store,
        };

        config.validate()?;

        Ok(config)
    }
}
