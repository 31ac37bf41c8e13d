//! Integration tests for configuration loading and logging setup

use async_trait::async_trait;
use bridge_traits::time::LogLevel;
use bridge_traits::{BridgeError, HttpClient, HttpRequest, HttpResponse};
use core_runtime::config::{AppConfigBuilder, DEFAULT_REQUEST_TIMEOUT};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, truncate_body, LogFormat, LoggingConfig, BODY_PREVIEW_LIMIT,
};
use std::collections::HashMap;
use std::sync::Arc;

struct NoopHttpClient;

#[async_trait]
impl HttpClient for NoopHttpClient {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, BridgeError> {
        Ok(HttpResponse::new(204, ""))
    }
}

fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
    vars.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_config_from_environment_feeds_logging() {
    let vars = env(&[
        ("QUINICAT_BACKEND_URL", "http://localhost:8000"),
        ("QUINICAT_LOG", "core_auth=debug,reqwest=warn"),
    ]);

    let config = AppConfigBuilder::from_lookup(|k| vars.get(k).cloned())
        .unwrap()
        .http_client(Arc::new(NoopHttpClient))
        .build()
        .unwrap();

    assert_eq!(
        config.backend_endpoint("/auth/verify-google").as_deref(),
        Some("http://localhost:8000/auth/verify-google")
    );
    assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);

    let logging = LoggingConfig::from_app_config(&config);
    assert_eq!(
        logging.filter.as_deref(),
        Some("core_auth=debug,reqwest=warn")
    );
}

#[test]
fn test_missing_backend_is_not_a_config_error() {
    let vars: HashMap<String, String> = HashMap::new();
    let config = AppConfigBuilder::from_lookup(|k| vars.get(k).cloned())
        .unwrap()
        .http_client(Arc::new(NoopHttpClient))
        .build()
        .unwrap();

    assert!(config.backend_endpoint("/auth/refresh").is_none());
}

#[test]
fn test_logging_initializes_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());
}

#[test]
fn test_token_fields_never_reach_logs_verbatim() {
    for field in ["access_token", "accessToken", "symfonyToken", "Authorization", "password"] {
        assert_eq!(redact_if_sensitive(field, "value"), "[REDACTED]", "{field}");
    }

    assert_eq!(redact_if_sensitive("content_type", "text/html"), "text/html");
}

#[test]
fn test_html_error_page_preview_is_bounded() {
    let page = format!("<html><body>{}</body></html>", "Bad Gateway ".repeat(100));
    let preview = truncate_body(&page, BODY_PREVIEW_LIMIT);

    assert!(preview.starts_with("<html><body>Bad Gateway"));
    assert!(preview.chars().count() <= BODY_PREVIEW_LIMIT + 1);
}
