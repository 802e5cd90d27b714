#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use time::macros::datetime;
use wiremock::MockServer;

use tradelink_auth::clock::{Clock, ManualClock};
use tradelink_auth::config::{EncryptionKey, OAuthConfig};
use tradelink_auth::oauth::OAuthClient;
use tradelink_auth::store::Store;

pub const PKCS8_PEM: &str = include_str!("../fixtures/rsa_pkcs8.pem");
pub const PKCS1_PEM: &str = include_str!("../fixtures/rsa_pkcs1.pem");

pub const TEST_KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn oauth_config(server: &MockServer) -> OAuthConfig {
    OAuthConfig::new("test_client", "test_secret", "https://app.example.com/callback")
        .with_base_url(&server.uri())
}

pub fn build_oauth_client(server: &MockServer) -> OAuthClient {
    OAuthClient::new(oauth_config(server))
}

pub fn encryption_key() -> EncryptionKey {
    EncryptionKey::from_hex(TEST_KEY_HEX).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(datetime!(2025-06-01 12:00 UTC)))
}

pub fn as_dyn(clock: &Arc<ManualClock>) -> Arc<dyn Clock> {
    clock.clone()
}

pub async fn store() -> Store {
    Store::in_memory().await.unwrap()
}

pub fn token_body(access_token: &str, refresh_token: Option<&str>, subject: Option<&str>) -> serde_json::Value {
    let mut body = json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }
    if let Some(subject) = subject {
        body["xoauth_yahoo_guid"] = json!(subject);
    }
    body
}
