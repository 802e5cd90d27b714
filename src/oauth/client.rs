//! OAuth token endpoint and bearer API client.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest_middleware::ClientWithMiddleware;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use url::Url;

use crate::config::OAuthConfig;
use crate::error::AuthError;
use crate::http;
use crate::oauth::types::{ProviderTokens, TokenResponse};

/// Client for the identity provider's OAuth endpoints.
///
/// # Example
///
/// ```rust,no_run
/// use tradelink_auth::config::OAuthConfig;
/// use tradelink_auth::oauth::OAuthClient;
///
/// # async fn run() -> Result<(), tradelink_auth::AuthError> {
/// let client = OAuthClient::new(OAuthConfig::from_env()?);
/// let login_url = client.authorization_url(Some("csrf-state"))?;
/// println!("Sign in at {login_url}");
///
/// let tokens = client.exchange_code("code-from-callback").await?;
/// println!("Token valid for {}", tokens.expires_in);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OAuthClient {
    http_client: ClientWithMiddleware,
    config: Arc<OAuthConfig>,
}

impl OAuthClient {
    /// Create a client for the given registration.
    pub fn new(config: OAuthConfig) -> Self {
        let http_client = http::build_client(None, config.timeout);
        Self {
            http_client,
            config: Arc::new(config),
        }
    }

    /// The registration this client was built with.
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// URL of the provider's authorization page for this client.
    pub fn authorization_url(&self, state: Option<&str>) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.config.authorize_url)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.config.redirect_uri)
                .append_pair("response_type", "code");
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        Ok(url)
    }

    /// Exchange an authorization code for provider tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthError> {
        if code.trim().is_empty() {
            return Err(AuthError::InvalidInput(
                "authorization code is empty".to_string(),
            ));
        }
        let tokens = self
            .token_grant(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .await?;
        tracing::info!(has_subject = tokens.subject.is_some(), "authorization code exchanged");
        Ok(tokens)
    }

    /// Run a refresh-token grant.
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<ProviderTokens, AuthError> {
        let tokens = self
            .token_grant(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .await?;
        tracing::info!(
            rotated = tokens.refresh_token.is_some(),
            "provider access token refreshed"
        );
        Ok(tokens)
    }

    /// GET a provider API URL as JSON with bearer authentication.
    pub async fn get_json(&self, url: &str, access_token: &SecretString) -> Result<Value, AuthError> {
        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {}", access_token.expose_secret()))
                .map_err(|_| AuthError::InvalidInput("access token is not header-safe".to_string()))?;
        bearer.set_sensitive(true);

        let response = self
            .http_client
            .get(url)
            .header(AUTHORIZATION, bearer)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(AuthError::from_transport)?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::ProviderApi {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn basic_auth_header(&self) -> Result<HeaderValue, AuthError> {
        let credentials = format!(
            "{}:{}",
            self.config.client_id,
            self.config.client_secret.expose_secret()
        );
        let mut value = HeaderValue::from_str(&format!("Basic {}", BASE64.encode(credentials)))
            .map_err(|_| AuthError::Configuration("OAuth client id is not header-safe".to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }

    async fn token_grant(&self, form: &[(&str, &str)]) -> Result<ProviderTokens, AuthError> {
        let body = serde_urlencoded::to_string(form)
            .map_err(|e| AuthError::InvalidInput(e.to_string()))?;

        let response = self
            .http_client
            .post(&self.config.token_url)
            .header(AUTHORIZATION, self.basic_auth_header()?)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(AuthError::from_transport)?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "token endpoint rejected grant");
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body: text,
            });
        }

        let raw: TokenResponse = serde_json::from_str(&text)?;
        Ok(ProviderTokens::from(raw))
    }
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.config.client_id)
            .field("token_url", &self.config.token_url)
            .finish()
    }
}
