//! # Route Guard
//!
//! Per-navigation decision over the session status:
//!
//! | Status            | Destination   | Decision |
//! |-------------------|---------------|----------|
//! | pending           | any           | [`GuardDecision::Pending`] |
//! | unauthenticated   | protected     | redirect to sign-in with `callbackUrl` |
//! | authenticated     | sign-in page  | redirect to the landing page |
//! | otherwise         |               | allow |
//!
//! Builds with the `dev-bypass` feature and debug assertions skip the
//! protected-route check. Release builds never do, and there is no runtime
//! switch.

use crate::session_store::SessionStore;
use crate::types::SessionStatus;
use core_runtime::config::{
    AppConfig, DEFAULT_LANDING_PATH, DEFAULT_PROTECTED_PREFIX, DEFAULT_SIGN_IN_PATH,
};
use core_runtime::events::{CoreEvent, EventBus, RouteEvent};
use tracing::{debug, warn};

/// Whether protected routes are open without a session in this build.
pub const DEV_BYPASS_ENABLED: bool = cfg!(all(feature = "dev-bypass", debug_assertions));

/// Query parameter carrying the original destination to the sign-in page.
pub const CALLBACK_PARAM: &str = "callbackUrl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Requires a backend-authenticated session
    Protected,
    Public,
    /// The sign-in page itself
    SignIn,
}

/// Static classification of URL paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    protected_prefixes: Vec<String>,
    sign_in_path: String,
    landing_path: String,
}

impl RouteTable {
    pub fn new(sign_in_path: impl Into<String>, landing_path: impl Into<String>) -> Self {
        Self {
            protected_prefixes: Vec::new(),
            sign_in_path: sign_in_path.into(),
            landing_path: landing_path.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            protected_prefixes: config.protected_prefixes.clone(),
            sign_in_path: config.sign_in_path.clone(),
            landing_path: config.landing_path.clone(),
        }
    }

    pub fn with_protected_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.protected_prefixes.push(prefix.into());
        self
    }

    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    /// Classifies `path`; query string and fragment are ignored.
    ///
    /// Prefixes match on segment boundaries: `/dashboard` covers
    /// `/dashboard` and `/dashboard/apuestas` but not `/dashboards`.
    pub fn classify(&self, path: &str) -> RouteClass {
        let path = strip_query(path);

        if trim_slash(path) == trim_slash(&self.sign_in_path) {
            return RouteClass::SignIn;
        }

        let protected = self
            .protected_prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix));
        if protected {
            RouteClass::Protected
        } else {
            RouteClass::Public
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(DEFAULT_SIGN_IN_PATH, DEFAULT_LANDING_PATH)
            .with_protected_prefix(DEFAULT_PROTECTED_PREFIX)
    }
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

fn trim_slash(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Outcome of a navigation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session not resolved yet; render a loading state
    Pending,
    Allow,
    /// Navigate to this path (with query) instead
    Redirect(String),
}

/// Navigation gate over the session status.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    routes: RouteTable,
    events: Option<EventBus>,
}

impl RouteGuard {
    pub fn new(routes: RouteTable) -> Self {
        if DEV_BYPASS_ENABLED {
            warn!("Development bypass active: protected routes are not checked");
        }
        Self {
            routes,
            events: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(RouteTable::from_config(config))
    }

    /// Publishes a [`RouteEvent::Redirected`] for every redirect.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decides a navigation to `path` (which may carry a query string).
    pub fn evaluate(&self, status: SessionStatus, path: &str) -> GuardDecision {
        if status == SessionStatus::Pending {
            return GuardDecision::Pending;
        }

        let authenticated = status == SessionStatus::Authenticated;
        let decision = match self.routes.classify(path) {
            RouteClass::SignIn if authenticated => {
                GuardDecision::Redirect(self.routes.landing_path.clone())
            }
            RouteClass::Protected if !authenticated && !DEV_BYPASS_ENABLED => {
                GuardDecision::Redirect(self.sign_in_redirect(path))
            }
            _ => GuardDecision::Allow,
        };

        if let GuardDecision::Redirect(to) = &decision {
            debug!(from = %path, to = %to, %status, "Navigation redirected");
            if let Some(events) = &self.events {
                let _ = events.emit(CoreEvent::Route(RouteEvent::Redirected {
                    from: path.to_string(),
                    to: to.clone(),
                }));
            }
        }
        decision
    }

    /// Reads the store status and evaluates `path`.
    pub async fn check(&self, store: &SessionStore, path: &str) -> GuardDecision {
        self.evaluate(store.status().await, path)
    }

    fn sign_in_redirect(&self, destination: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(destination.as_bytes()).collect();
        format!("{}?{}={}", self.routes.sign_in_path, CALLBACK_PARAM, encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> RouteGuard {
        RouteGuard::new(RouteTable::default())
    }

    #[test]
    fn test_classification() {
        let routes = RouteTable::default();
        assert_eq!(routes.classify("/dashboard"), RouteClass::Protected);
        assert_eq!(routes.classify("/dashboard/"), RouteClass::Protected);
        assert_eq!(routes.classify("/dashboard/apuestas?jornada=12"), RouteClass::Protected);
        assert_eq!(routes.classify("/dashboards"), RouteClass::Public);
        assert_eq!(routes.classify("/"), RouteClass::Public);
        assert_eq!(routes.classify("/resultados"), RouteClass::Public);
        assert_eq!(routes.classify("/login"), RouteClass::SignIn);
        assert_eq!(routes.classify("/login?callbackUrl=%2F"), RouteClass::SignIn);
    }

    #[test]
    fn test_pending_makes_no_decision() {
        assert_eq!(
            guard().evaluate(SessionStatus::Pending, "/dashboard"),
            GuardDecision::Pending
        );
        assert_eq!(
            guard().evaluate(SessionStatus::Pending, "/login"),
            GuardDecision::Pending
        );
    }

    #[cfg(not(all(feature = "dev-bypass", debug_assertions)))]
    #[test]
    fn test_unauthenticated_protected_redirects_with_callback() {
        assert_eq!(
            guard().evaluate(SessionStatus::Unauthenticated, "/dashboard/apuestas"),
            GuardDecision::Redirect("/login?callbackUrl=%2Fdashboard%2Fapuestas".to_string())
        );
        assert_eq!(
            guard().evaluate(SessionStatus::Unauthenticated, "/dashboard/apuestas?jornada=3"),
            GuardDecision::Redirect(
                "/login?callbackUrl=%2Fdashboard%2Fapuestas%3Fjornada%3D3".to_string()
            )
        );
    }

    #[test]
    fn test_authenticated_sign_in_redirects_to_landing() {
        assert_eq!(
            guard().evaluate(SessionStatus::Authenticated, "/login"),
            GuardDecision::Redirect("/dashboard".to_string())
        );
    }

    #[test]
    fn test_allowed_navigations() {
        let guard = guard();
        assert_eq!(
            guard.evaluate(SessionStatus::Authenticated, "/dashboard/perfil"),
            GuardDecision::Allow
        );
        assert_eq!(
            guard.evaluate(SessionStatus::Unauthenticated, "/resultados"),
            GuardDecision::Allow
        );
        assert_eq!(
            guard.evaluate(SessionStatus::Authenticated, "/resultados"),
            GuardDecision::Allow
        );
        assert_eq!(
            guard.evaluate(SessionStatus::Unauthenticated, "/login"),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_redirect_event_published() {
        let events = EventBus::default();
        let mut receiver = events.subscribe();
        let guard = guard().with_events(events);

        guard.evaluate(SessionStatus::Authenticated, "/login");

        assert_eq!(
            receiver.try_recv().unwrap(),
            CoreEvent::Route(RouteEvent::Redirected {
                from: "/login".to_string(),
                to: "/dashboard".to_string(),
            })
        );
    }

    #[test]
    fn test_bypass_never_in_release() {
        if !cfg!(debug_assertions) {
            assert!(!DEV_BYPASS_ENABLED);
        }
        if !cfg!(feature = "dev-bypass") {
            assert!(!DEV_BYPASS_ENABLED);
        }
    }

    #[tokio::test]
    async fn test_check_reads_store_status() {
        let store = SessionStore::in_memory();
        assert_eq!(guard().check(&store, "/dashboard").await, GuardDecision::Pending);

        store.restore().await.unwrap();
        let decision = guard().check(&store, "/dashboard").await;
        if DEV_BYPASS_ENABLED {
            assert_eq!(decision, GuardDecision::Allow);
        } else {
            assert_eq!(decision, GuardDecision::Redirect("/login?callbackUrl=%2Fdashboard".to_string()));
        }
    }
}
