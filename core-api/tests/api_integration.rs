//! Typed API calls through the authenticated client

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_api::{
    ApiError, ChangePasswordDto, CreateApuestaDto, EstadoApuesta, NuevoPartido, Pronostico,
    QuiniCatApi, Theme, UpdateApuestaDto, UpdatePreferencesDto, UpdateProfileDto,
};
use core_auth::{AccessToken, AuthManager, InMemorySessionBackend, Session, SessionUser};
use core_runtime::config::AppConfig;
use core_runtime::events::EventBus;
use mockall::mock;
use std::sync::Arc;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

const APUESTA: &str = r#"{
    "id": "a-1",
    "fecha": "2024-12-01",
    "partidos": [{"id": "p1", "local": "Girona", "visitante": "Barça", "apuesta": "1"}],
    "estado": "pendiente",
    "monto": 2.0
}"#;

fn json(status: u16, body: &str) -> HttpResponse {
    HttpResponse::new(status, body.to_string()).with_header("Content-Type", "application/json")
}

fn body_of(request: &HttpRequest) -> serde_json::Value {
    serde_json::from_slice(request.body.as_deref().unwrap_or(b"null".as_slice())).unwrap()
}

async fn api(http: MockHttpClient, token: Option<&str>) -> QuiniCatApi {
    let config = AppConfig::builder()
        .backend_base_url("http://localhost:8000/api")
        .http_client(Arc::new(http))
        .build()
        .unwrap();
    let backend = match token {
        Some(token) => InMemorySessionBackend::with_session(Session {
            user: SessionUser::default(),
            access_token: Some(AccessToken::new(token)),
            expires_at: None,
            role: None,
        }),
        None => InMemorySessionBackend::new(),
    };
    let manager = AuthManager::new(&config, Arc::new(backend), EventBus::default());
    manager.restore().await;
    QuiniCatApi::new(manager.client().clone())
}

#[tokio::test]
async fn test_list_bets_sends_bearer_token() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| {
            request.method == HttpMethod::Get
                && request.url == "http://localhost:8000/api/apuestas"
                && request.header_value("Authorization") == Some("Bearer jwt")
        })
        .times(1)
        .returning(|_| Ok(json(200, &format!("[{APUESTA}]"))));

    let apuestas = api(http, Some("jwt")).await.apuestas.list().await.unwrap();
    assert_eq!(apuestas.len(), 1);
    assert_eq!(apuestas[0].partidos[0].apuesta, Pronostico::Local);
}

#[tokio::test]
async fn test_create_bet_posts_dto() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| {
            let body = body_of(request);
            request.method == HttpMethod::Post
                && request.url.ends_with("/apuestas")
                && body["monto"] == 2.0
                && body["partidos"][0]["apuesta"] == "1"
                && body["partidos"][0].get("id").is_none()
        })
        .times(1)
        .returning(|_| Ok(json(201, APUESTA)));

    let dto = CreateApuestaDto {
        partidos: vec![NuevoPartido::new("Girona", "Barça", Pronostico::Local)],
        monto: 2.0,
    };
    let apuesta = api(http, Some("jwt")).await.apuestas.create(&dto).await.unwrap();
    assert_eq!(apuesta.id, "a-1");
}

#[tokio::test]
async fn test_invalid_bet_is_not_sent() {
    let mut http = MockHttpClient::new();
    http.expect_execute().times(0);

    let dto = CreateApuestaDto {
        partidos: vec![],
        monto: 2.0,
    };
    let error = api(http, Some("jwt")).await.apuestas.create(&dto).await.unwrap_err();
    assert!(matches!(error, ApiError::Validation(_)));
}

#[tokio::test]
async fn test_update_and_delete_target_the_bet() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| {
            request.method == HttpMethod::Put
                && request.url.ends_with("/apuestas/a-1")
                && body_of(request) == serde_json::json!({"estado": "ganada", "ganancia": 40.0})
        })
        .times(1)
        .returning(|_| {
            Ok(json(
                200,
                &APUESTA.replace("pendiente", "ganada").replace("\"monto\": 2.0", "\"monto\": 2.0, \"ganancia\": 40.0"),
            ))
        });
    http.expect_execute()
        .withf(|request| request.method == HttpMethod::Delete && request.url.ends_with("/apuestas/a-1"))
        .times(1)
        .returning(|_| Ok(HttpResponse::new(204, "")));

    let api = api(http, Some("jwt")).await;
    let updated = api
        .apuestas
        .update(
            "a-1",
            &UpdateApuestaDto {
                estado: Some(EstadoApuesta::Ganada),
                ganancia: Some(40.0),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.estado, EstadoApuesta::Ganada);
    assert_eq!(updated.ganancia, Some(40.0));

    api.apuestas.delete("a-1").await.unwrap();
}

#[tokio::test]
async fn test_backend_message_surfaces_in_error() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .times(1)
        .returning(|_| Ok(json(404, r#"{"message":"Apuesta no encontrada"}"#)));

    let error = api(http, Some("jwt")).await.apuestas.get("zzz").await.unwrap_err();
    match error {
        ApiError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Apuesta no encontrada");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_profile_requires_session() {
    let mut http = MockHttpClient::new();
    http.expect_execute().times(0);

    let error = api(http, None).await.usuarios.profile().await.unwrap_err();
    assert!(matches!(error, ApiError::NotAuthenticated));
}

#[tokio::test]
async fn test_update_profile_round_trip() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| {
            request.method == HttpMethod::Put
                && request.url.ends_with("/users/profile")
                && body_of(request) == serde_json::json!({"saldo": 25.0})
        })
        .times(1)
        .returning(|_| {
            Ok(json(
                200,
                r#"{"id":"u1","email":"a@quinicat.cat","nombre":"Arnau","saldo":25.0,"apuestasGanadas":1,"apuestasPerdidas":2}"#,
            ))
        });

    let profile = api(http, Some("jwt"))
        .await
        .usuarios
        .update_profile(&UpdateProfileDto {
            nombre: None,
            saldo: Some(25.0),
        })
        .await
        .unwrap();
    assert_eq!(profile.saldo, 25.0);
}

#[tokio::test]
async fn test_expired_session_maps_to_session_expired() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| request.url.ends_with("/auth/refresh"))
        .times(1)
        .returning(|_| Ok(json(401, "{}")));
    http.expect_execute()
        .withf(|request| request.url.ends_with("/users/profile"))
        .times(1)
        .returning(|_| Ok(json(401, "{}")));

    let error = api(http, Some("expired")).await.usuarios.profile().await.unwrap_err();
    assert!(matches!(error, ApiError::SessionExpired));
}

#[tokio::test]
async fn test_change_password_posts_both_passwords() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| {
            request.method == HttpMethod::Post
                && request.url == "http://localhost:8000/api/usuario/change-password"
                && request.header_value("Authorization") == Some("Bearer jwt")
                && body_of(request)
                    == serde_json::json!({"currentPassword": "vella", "newPassword": "nova-1234"})
        })
        .times(1)
        .returning(|_| Ok(HttpResponse::new(204, "")));

    api(http, Some("jwt"))
        .await
        .usuarios
        .change_password(&ChangePasswordDto::new("vella", "nova-1234"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_change_password_rejection_keeps_backend_message() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .times(1)
        .returning(|_| Ok(json(400, r#"{"message":"Contraseña actual incorrecta"}"#)));

    let error = api(http, Some("jwt"))
        .await
        .usuarios
        .change_password(&ChangePasswordDto::new("equivocada", "nova-1234"))
        .await
        .unwrap_err();
    match error {
        ApiError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Contraseña actual incorrecta");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_preferences_get_and_update() {
    let mut http = MockHttpClient::new();
    http.expect_execute()
        .withf(|request| {
            request.method == HttpMethod::Get && request.url.ends_with("/usuario/preferences")
        })
        .times(1)
        .returning(|_| {
            Ok(json(
                200,
                r#"{"theme":"light","notifications":true,"language":"es"}"#,
            ))
        });
    http.expect_execute()
        .withf(|request| {
            request.method == HttpMethod::Put
                && request.url.ends_with("/usuario/preferences")
                && body_of(request) == serde_json::json!({"theme": "dark", "language": "ca"})
        })
        .times(1)
        .returning(|_| {
            Ok(json(
                200,
                r#"{"theme":"dark","notifications":true,"language":"ca"}"#,
            ))
        });

    let api = api(http, Some("jwt")).await;
    let current = api.usuarios.preferences().await.unwrap();
    assert_eq!(current.theme, Theme::Light);
    assert_eq!(current.language, "es");

    let updated = api
        .usuarios
        .update_preferences(&UpdatePreferencesDto {
            theme: Some(Theme::Dark),
            notifications: None,
            language: Some("ca".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(updated.theme, Theme::Dark);
    assert!(updated.notifications);
}

#[tokio::test]
async fn test_preferences_require_session() {
    let mut http = MockHttpClient::new();
    http.expect_execute().times(0);

    let error = api(http, None).await.usuarios.preferences().await.unwrap_err();
    assert!(matches!(error, ApiError::NotAuthenticated));
}
