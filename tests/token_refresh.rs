mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use futures_util::future::join_all;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use time::{Duration, OffsetDateTime};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tradelink_auth::AuthError;
use tradelink_auth::clock::{Clock, ManualClock};
use tradelink_auth::oauth::endpoints::TOKEN_PATH;
use tradelink_auth::refresh::{
    JsonFileTokenStore, MemoryTokenStore, TokenRefresher, TokenState, TokenStore,
};

use common::*;

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

fn initial_state(expires_at: OffsetDateTime) -> TokenState {
    TokenState {
        access_token: secret("AT1"),
        refresh_token: Some(secret("RT1")),
        expires_at,
    }
}

fn build_refresher(
    server: &MockServer,
    clock: &Arc<ManualClock>,
    expires_at: OffsetDateTime,
    store: Arc<dyn TokenStore>,
) -> TokenRefresher {
    init_tracing();
    TokenRefresher::new(build_oauth_client(server), initial_state(expires_at))
        .with_clock(as_dyn(clock))
        .with_store(store)
}

async fn mount_refresh(server: &MockServer, body: serde_json::Value, expected: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=RT1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .set_delay(StdDuration::from_millis(100)),
        )
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    mount_refresh(&server, token_body("AT2", None, None), 1).await;

    let clock = manual_clock();
    let store = Arc::new(MemoryTokenStore::new());
    let refresher = build_refresher(&server, &clock, clock.now(), store.clone());
    assert!(!refresher.is_valid());

    let tokens = join_all((0..8).map(|_| refresher.access_token())).await;
    for token in tokens {
        assert_eq!(token.unwrap().expose_secret(), "AT2");
    }

    assert!(refresher.is_valid());
    assert_eq!(refresher.expires_at(), clock.now() + Duration::hours(1));

    // No refresh token came back, so the old one is kept.
    let saved = store.load().await.unwrap().unwrap();
    assert_eq!(saved.access_token.expose_secret(), "AT2");
    assert_eq!(saved.refresh_token.unwrap().expose_secret(), "RT1");
}

#[tokio::test]
async fn test_refresh_inside_safety_margin() {
    let server = MockServer::start().await;
    mount_refresh(&server, token_body("AT2", Some("RT2"), None), 1).await;

    let clock = manual_clock();
    let store = Arc::new(MemoryTokenStore::new());
    let refresher = build_refresher(
        &server,
        &clock,
        clock.now() + Duration::minutes(10),
        store.clone(),
    );

    assert_eq!(refresher.access_token().await.unwrap().expose_secret(), "AT1");

    clock.advance(Duration::minutes(6));
    assert_eq!(refresher.access_token().await.unwrap().expose_secret(), "AT2");

    let saved = store.load().await.unwrap().unwrap();
    assert_eq!(saved.refresh_token.unwrap().expose_secret(), "RT2");
}

#[tokio::test]
async fn test_unauthorized_call_refreshes_once_and_retries_once() {
    let server = MockServer::start().await;
    mount_refresh(&server, token_body("AT2", None, None), 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/report"))
        .and(header("authorization", "Bearer AT1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/report"))
        .and(header("authorization", "Bearer AT2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": 3 })))
        .expect(1)
        .mount(&server)
        .await;

    let clock = manual_clock();
    let refresher = build_refresher(
        &server,
        &clock,
        clock.now() + Duration::hours(1),
        Arc::new(MemoryTokenStore::new()),
    );

    let report = refresher
        .get_json(&format!("{}/v1/report", server.uri()))
        .await
        .unwrap();
    assert_eq!(report["rows"], 3);
}

#[tokio::test]
async fn test_second_unauthorized_is_returned() {
    let server = MockServer::start().await;
    mount_refresh(&server, token_body("AT2", None, None), 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/report"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token rejected"))
        .expect(2)
        .mount(&server)
        .await;

    let clock = manual_clock();
    let refresher = build_refresher(
        &server,
        &clock,
        clock.now() + Duration::hours(1),
        Arc::new(MemoryTokenStore::new()),
    );

    let err = refresher
        .get_json(&format!("{}/v1/report", server.uri()))
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    assert!(matches!(err, AuthError::ProviderApi { status: 401, .. }));
}

#[tokio::test]
async fn test_unauthorized_without_refresh_token_keeps_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("AT2", None, None)))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/report"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token revoked"))
        .expect(1)
        .mount(&server)
        .await;

    init_tracing();
    let clock = manual_clock();
    let state = TokenState {
        refresh_token: None,
        ..initial_state(clock.now() + Duration::hours(1))
    };
    let refresher = TokenRefresher::new(build_oauth_client(&server), state).with_clock(as_dyn(&clock));

    match refresher
        .get_json(&format!("{}/v1/report", server.uri()))
        .await
        .unwrap_err()
    {
        AuthError::ProviderApi { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "token revoked");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_other_failures_do_not_refresh() {
    let server = MockServer::start().await;
    mount_refresh(&server, token_body("AT2", None, None), 0).await;
    Mock::given(method("GET"))
        .and(path("/v1/report"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let clock = manual_clock();
    let refresher = build_refresher(
        &server,
        &clock,
        clock.now() + Duration::hours(1),
        Arc::new(MemoryTokenStore::new()),
    );

    let err = refresher
        .get_json(&format!("{}/v1/report", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ProviderApi { status: 500, .. }));
}

#[tokio::test]
async fn test_rejected_refresh_keeps_old_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .expect(1)
        .mount(&server)
        .await;

    let clock = manual_clock();
    let expires_at = clock.now() - Duration::minutes(1);
    let refresher = build_refresher(&server, &clock, expires_at, Arc::new(MemoryTokenStore::new()));

    let err = refresher.access_token().await.unwrap_err();
    assert!(matches!(err, AuthError::TokenEndpoint { status: 400, .. }));
    assert_eq!(refresher.expires_at(), expires_at);
}

#[tokio::test]
async fn test_file_store_round_trip_through_refresh() {
    let server = MockServer::start().await;
    mount_refresh(&server, token_body("AT2", Some("RT2"), None), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn TokenStore> = Arc::new(JsonFileTokenStore::new(dir.path().join("tokens.json")));
    store
        .save(&initial_state(OffsetDateTime::UNIX_EPOCH))
        .await
        .unwrap();

    let clock = manual_clock();
    let refresher = TokenRefresher::from_store(build_oauth_client(&server), store.clone())
        .await
        .unwrap()
        .unwrap()
        .with_clock(as_dyn(&clock));
    refresher.refresh().await.unwrap();

    let reloaded = store.load().await.unwrap().unwrap();
    assert_eq!(reloaded.access_token.expose_secret(), "AT2");
    assert_eq!(reloaded.refresh_token.unwrap().expose_secret(), "RT2");
    assert_eq!(reloaded.expires_at, clock.now() + Duration::hours(1));
}
