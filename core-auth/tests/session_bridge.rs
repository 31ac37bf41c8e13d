//! End-to-end tests of the session bridge: facade, exchange client,
//! authenticated client, session store and route guard together.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use core_auth::{
    AccessToken, AuthError, AuthManager, GuardDecision, IdentityAssertion, InMemorySessionBackend,
    Role, Session, SessionStatus, SessionUser, StaticIdentityProvider, DEV_BYPASS_ENABLED,
};
use core_runtime::config::AppConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

const BACKEND: &str = "http://localhost:8000";

fn json(status: u16, body: &str) -> HttpResponse {
    HttpResponse::new(status, body.to_string()).with_header("Content-Type", "application/json")
}

fn is_refresh(request: &HttpRequest) -> bool {
    request.url == format!("{BACKEND}/auth/refresh")
}

fn authorization_headers(request: &HttpRequest) -> Vec<String> {
    request
        .headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("authorization"))
        .map(|(_, value)| value.clone())
        .collect()
}

fn signed_in(token: &str) -> Session {
    Session {
        user: SessionUser {
            id: Some("77".to_string()),
            name: Some("Laia".to_string()),
            email: Some("laia@quinicat.cat".to_string()),
            image: None,
        },
        access_token: Some(AccessToken::new(token)),
        expires_at: Some(Utc::now() - Duration::minutes(5)),
        role: Some(Role::User),
    }
}

async fn manager(http: MockHttpClient, session: Option<Session>, events: EventBus) -> AuthManager {
    let config = AppConfig::builder()
        .backend_base_url(BACKEND)
        .http_client(Arc::new(http))
        .build()
        .unwrap();
    let backend = match session {
        Some(session) => InMemorySessionBackend::with_session(session),
        None => InMemorySessionBackend::new(),
    };
    let manager = AuthManager::new(&config, Arc::new(backend), events);
    manager.restore().await;
    manager
}

#[tokio::test]
async fn test_authenticated_requests_carry_exactly_one_current_token() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| {
            authorization_headers(request) == vec!["Bearer tok-current".to_string()]
        })
        .times(3)
        .returning(|_| Ok(json(200, "[]")));

    let manager = manager(http, Some(signed_in("tok-current")), EventBus::default()).await;
    let client = manager.client();

    for _ in 0..3 {
        let _: Vec<serde_json::Value> = client.get("/apuestas").await.unwrap();
    }
}

#[tokio::test]
async fn test_repeated_401_renews_at_most_once() {
    let api_calls = Arc::new(AtomicUsize::new(0));
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(is_refresh)
        .times(1)
        .returning(|_| Ok(json(200, r#"{"accessToken":"tok-renewed"}"#)));
    let counter = api_calls.clone();
    http.expect_execute()
        .withf(|request| !is_refresh(request))
        .times(2)
        .returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json(401, r#"{"message":"Expired JWT Token"}"#))
        });

    let manager = manager(http, Some(signed_in("tok-stale")), EventBus::default()).await;

    let error = manager
        .client()
        .request(HttpMethod::Get, "/users/profile", None)
        .await
        .unwrap_err();

    assert!(matches!(error, AuthError::Unauthorized));
    assert_eq!(api_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_renewed_token_is_visible_before_the_retry_is_sent() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(is_refresh)
        .times(1)
        .returning(|_| {
            Ok(json(
                200,
                r#"{"accessToken":"tok-renewed","expiresAt":"2030-01-01T00:00:00Z","user":{"role":"ROLE_ADMIN"}}"#,
            ))
        });
    http.expect_execute()
        .withf(|request| {
            !is_refresh(request) && request.header_value("Authorization") == Some("Bearer tok-stale")
        })
        .times(1)
        .returning(|_| Ok(json(401, "{}")));
    http.expect_execute()
        .withf(|request| {
            !is_refresh(request)
                && request.header_value("Authorization") == Some("Bearer tok-renewed")
        })
        .times(1)
        .returning(|_| Ok(json(200, r#"{"id":1}"#)));

    let events = EventBus::default();
    let mut stream = events.auth_stream();
    let manager = manager(http, Some(signed_in("tok-stale")), events).await;

    let response = manager
        .client()
        .request(HttpMethod::Get, "/apuestas/1", None)
        .await
        .unwrap();
    assert_eq!(response.status, 200);

    let session = manager.get_session().await.unwrap();
    assert_eq!(session.access_token.as_ref().unwrap().as_str(), "tok-renewed");
    assert_eq!(session.role, Some(Role::Admin));
    assert!(!session.is_token_expired(Utc::now()));

    assert_eq!(
        stream.try_recv().unwrap().unwrap(),
        CoreEvent::Auth(AuthEvent::TokenRenewing)
    );
    assert!(matches!(
        stream.try_recv().unwrap().unwrap(),
        CoreEvent::Auth(AuthEvent::TokenRenewed { expires_at: Some(_) })
    ));
}

#[tokio::test]
async fn test_html_error_page_from_exchange_degrades_gracefully() {
    let mut http = MockHttpClient::new();
    http.expect_execute().times(1).returning(|_| {
        Ok(HttpResponse::new(
            500,
            "<!DOCTYPE html><html><head><title>500</title></head><body>Whoops</body></html>",
        )
        .with_header("Content-Type", "text/html; charset=UTF-8"))
    });

    let events = EventBus::default();
    let mut stream = events.auth_stream();
    let provider = StaticIdentityProvider::new(
        "google",
        Some(IdentityAssertion::new("id-token").with_subject("sub-9")),
    );
    let manager = manager(http, None, events)
        .await
        .with_identity_provider(Arc::new(provider));

    let session = manager.sign_in_with_provider().await.unwrap();

    assert!(!session.is_backend_authenticated());
    assert_eq!(manager.status().await, SessionStatus::Unauthenticated);
    assert_eq!(
        manager.error().await.as_deref(),
        Some("authentication could not be completed")
    );

    let mut saw_exchange_failed = false;
    while let Some(Ok(event)) = stream.try_recv() {
        if let CoreEvent::Auth(AuthEvent::ExchangeFailed { message }) = event {
            assert!(!message.contains("500"));
            saw_exchange_failed = true;
        }
    }
    assert!(saw_exchange_failed);
}

#[tokio::test]
async fn test_protected_route_without_session_redirects_to_login() {
    let mut http = MockHttpClient::new();
    http.expect_execute().times(0);
    let manager = manager(http, None, EventBus::default()).await;

    let decision = manager.navigate("/dashboard/apuestas").await;

    if DEV_BYPASS_ENABLED {
        assert_eq!(decision, GuardDecision::Allow);
    } else {
        assert_eq!(
            decision,
            GuardDecision::Redirect("/login?callbackUrl=%2Fdashboard%2Fapuestas".to_string())
        );
    }
}

#[tokio::test]
async fn test_login_page_with_session_redirects_to_dashboard() {
    let mut http = MockHttpClient::new();
    http.expect_execute().times(0);
    let manager = manager(http, Some(signed_in("tok")), EventBus::default()).await;

    assert_eq!(
        manager.navigate("/login").await,
        GuardDecision::Redirect("/dashboard".to_string())
    );
    assert_eq!(manager.navigate("/dashboard/apuestas").await, GuardDecision::Allow);
}

#[tokio::test]
async fn test_failed_renewal_forces_sign_out() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(is_refresh)
        .times(1)
        .returning(|_| Ok(json(401, r#"{"code":401,"message":"Invalid JWT Token"}"#)));
    http.expect_execute()
        .withf(|request| !is_refresh(request))
        .times(1)
        .returning(|_| Ok(json(401, "{}")));

    let events = EventBus::default();
    let mut stream = events.auth_stream();
    let session = signed_in("tok-expired");
    assert!(session.is_token_expired(Utc::now()));
    let manager = manager(http, Some(session), events).await;
    assert_eq!(manager.status().await, SessionStatus::Authenticated);

    let error = manager
        .client()
        .request(HttpMethod::Get, "/apuestas", None)
        .await
        .unwrap_err();

    assert!(matches!(error, AuthError::Unauthorized));
    assert!(manager.get_session().await.is_none());
    assert_eq!(manager.status().await, SessionStatus::Unauthenticated);

    let mut forced = false;
    while let Some(Ok(event)) = stream.try_recv() {
        if event == CoreEvent::Auth(AuthEvent::SignedOut { forced: true }) {
            forced = true;
        }
    }
    assert!(forced);

    if !DEV_BYPASS_ENABLED {
        assert!(matches!(
            manager.navigate("/dashboard").await,
            GuardDecision::Redirect(_)
        ));
    }
}
