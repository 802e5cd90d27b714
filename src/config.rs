//! Startup configuration.
//!
//! Each subsystem reads its own settings so a missing OAuth secret does not
//! take the credential vault down with it (and vice versa). Every
//! `from_env` has a `from_lookup` twin that takes a variable lookup function,
//! which keeps tests away from process-global environment state.

use std::time::Duration as StdDuration;

use secrecy::{SecretBox, SecretString};
use time::Duration;

use crate::error::AuthError;
use crate::oauth::endpoints;
use crate::trading::endpoints::{TRADING_DEMO_BASE_URL, TRADING_PROD_BASE_URL};

/// Environment variable holding the hex-encoded 32-byte vault key.
pub const ENCRYPTION_KEY_VAR: &str = "ENCRYPTION_KEY";
/// Environment variable holding the OAuth client id.
pub const OAUTH_CLIENT_ID_VAR: &str = "OAUTH_CLIENT_ID";
/// Environment variable holding the OAuth client secret.
pub const OAUTH_CLIENT_SECRET_VAR: &str = "OAUTH_CLIENT_SECRET";
/// Environment variable holding the OAuth callback URL.
pub const OAUTH_REDIRECT_URI_VAR: &str = "OAUTH_REDIRECT_URI";

const DEFAULT_DATABASE_URL: &str = "sqlite://tradelink.db?mode=rwc";
const DEFAULT_SESSION_TTL_DAYS: i64 = 30;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, name: &str) -> Result<String, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AuthError::Configuration(format!("{name} environment variable not set")))
}

fn parse_optional<F, T>(lookup: &F, name: &str) -> Result<Option<T>, AuthError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AuthError::Configuration(format!("{name} has an invalid value"))),
        None => Ok(None),
    }
}

/// The process-wide symmetric key for encrypting credentials at rest.
pub struct EncryptionKey(SecretBox<[u8; 32]>);

impl EncryptionKey {
    /// Parse a key from 64 hex characters.
    pub fn from_hex(hex_key: &str) -> Result<Self, AuthError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| {
            AuthError::Configuration(format!("{ENCRYPTION_KEY_VAR} must be hex-encoded"))
        })?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| {
            AuthError::Configuration(format!(
                "{ENCRYPTION_KEY_VAR} must be 32 bytes (64 hex characters)"
            ))
        })?;
        Ok(Self(SecretBox::new(Box::new(key))))
    }

    /// Read the key from `ENCRYPTION_KEY`.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(env_lookup)
    }

    /// Read the key through a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_hex(&required(&lookup, ENCRYPTION_KEY_VAR)?)
    }

    pub(crate) fn bytes(&self) -> &[u8; 32] {
        use secrecy::ExposeSecret;
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// OAuth client registration and provider endpoints.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Client id issued by the provider
    pub client_id: String,
    /// Client secret issued by the provider
    pub client_secret: SecretString,
    /// Callback URL registered with the provider
    pub redirect_uri: String,
    /// Authorization page the user is sent to
    pub authorize_url: String,
    /// Token endpoint for code and refresh grants
    pub token_url: String,
    /// Dedicated identity lookup (first subject fallback)
    pub userinfo_url: String,
    /// Application-scoped user lookup (second subject fallback)
    pub app_user_url: String,
    /// Upper bound for each provider call
    pub timeout: StdDuration,
}

impl OAuthConfig {
    /// Create a config with the default provider endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            redirect_uri: redirect_uri.into(),
            authorize_url: endpoints::AUTHORIZE_URL.to_string(),
            token_url: endpoints::TOKEN_URL.to_string(),
            userinfo_url: endpoints::USERINFO_URL.to_string(),
            app_user_url: endpoints::APP_USER_URL.to_string(),
            timeout: StdDuration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Point every provider endpoint at `base` (useful for testing with a mock server).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.authorize_url = format!("{base}{}", endpoints::AUTHORIZE_PATH);
        self.token_url = format!("{base}{}", endpoints::TOKEN_PATH);
        self.userinfo_url = format!("{base}{}", endpoints::USERINFO_PATH);
        self.app_user_url = format!("{base}{}", endpoints::APP_USER_PATH);
        self
    }

    /// Read OAuth settings from the environment.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(env_lookup)
    }

    /// Read OAuth settings through a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(
            required(&lookup, OAUTH_CLIENT_ID_VAR)?,
            required(&lookup, OAUTH_CLIENT_SECRET_VAR)?,
            required(&lookup, OAUTH_REDIRECT_URI_VAR)?,
        );
        if let Some(url) = lookup("OAUTH_AUTHORIZE_URL") {
            config.authorize_url = url;
        }
        if let Some(url) = lookup("OAUTH_TOKEN_URL") {
            config.token_url = url;
        }
        if let Some(url) = lookup("OAUTH_USERINFO_URL") {
            config.userinfo_url = url;
        }
        if let Some(url) = lookup("OAUTH_APP_USER_URL") {
            config.app_user_url = url;
        }
        if let Some(secs) = parse_optional::<_, u64>(&lookup, "HTTP_TIMEOUT_SECS")? {
            config.timeout = StdDuration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Full startup configuration for [`AuthContext`](crate::context::AuthContext).
#[derive(Debug)]
pub struct Config {
    /// sqlx connection string for the relational store
    pub database_url: String,
    /// Vault key
    pub encryption_key: EncryptionKey,
    /// OAuth client settings
    pub oauth: OAuthConfig,
    /// Lifetime of newly issued sessions
    pub session_ttl: Duration,
    /// Base URL of the remote trading API
    pub trading_base_url: String,
    /// Upper bound for each trading API call
    pub http_timeout: StdDuration,
}

impl Config {
    /// Read the full configuration from the environment.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(env_lookup)
    }

    /// Read the full configuration through a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let encryption_key = EncryptionKey::from_lookup(&lookup)?;
        let oauth = OAuthConfig::from_lookup(&lookup)?;

        let ttl_days =
            parse_optional::<_, i64>(&lookup, "SESSION_TTL_DAYS")?.unwrap_or(DEFAULT_SESSION_TTL_DAYS);
        if ttl_days <= 0 {
            return Err(AuthError::Configuration(
                "SESSION_TTL_DAYS must be positive".to_string(),
            ));
        }

        let use_demo = parse_optional::<_, bool>(&lookup, "TRADING_USE_DEMO")?.unwrap_or(false);
        let trading_base_url = lookup("TRADING_API_BASE_URL").unwrap_or_else(|| {
            if use_demo {
                TRADING_DEMO_BASE_URL.to_string()
            } else {
                TRADING_PROD_BASE_URL.to_string()
            }
        });

        let timeout_secs = parse_optional::<_, u64>(&lookup, "HTTP_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            encryption_key,
            oauth,
            session_ttl: Duration::days(ttl_days),
            trading_base_url,
            http_timeout: StdDuration::from_secs(timeout_secs),
        })
    }
}
