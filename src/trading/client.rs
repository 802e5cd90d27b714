//! Signed REST client for the remote trading API.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::auth::RequestSigner;
use crate::error::AuthError;
use crate::http;
use crate::trading::endpoints::{TRADING_DEMO_BASE_URL, TRADING_PROD_BASE_URL, portfolio, public};
use crate::trading::types::{Balance, PageRequest};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the remote trading API.
///
/// Portfolio calls are signed with the configured [`RequestSigner`]. A
/// client without a signer can still reach public endpoints; portfolio
/// calls then fail with [`AuthError::Signing`] instead of going out
/// unsigned.
///
/// Rejections (HTTP 401/403) come back as [`AuthError::RemoteAuth`] with
/// the body untouched and are never retried here.
///
/// # Example
///
/// ```rust,no_run
/// use tradelink_auth::auth::RequestSigner;
/// use tradelink_auth::trading::TradingClient;
///
/// # async fn run() -> Result<(), tradelink_auth::AuthError> {
/// let pem = std::fs::read_to_string("trading-key.pem")?;
/// let client = TradingClient::builder()
///     .use_demo()
///     .signer(RequestSigner::new("AK1", &pem)?)
///     .build();
///
/// let balance = client.get_balance().await?;
/// println!("Balance: {} cents", balance.balance);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TradingClient {
    http_client: ClientWithMiddleware,
    base_url: String,
    signer: Option<RequestSigner>,
}

impl TradingClient {
    /// Create an unsigned client against the production API.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    pub fn builder() -> TradingClientBuilder {
        TradingClientBuilder::new()
    }

    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The signer, if one is configured.
    pub fn signer(&self) -> Option<&RequestSigner> {
        self.signer.as_ref()
    }

    /// Make an unsigned GET request.
    pub async fn public_get<T>(&self, path: &str) -> Result<T, AuthError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint_url(path)?;
        self.send(Method::GET, url, None::<&()>, false).await
    }

    /// Make a signed GET request with optional query parameters.
    pub async fn signed_get<T, Q>(&self, path: &str, query: Option<&Q>) -> Result<T, AuthError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let query = query
            .map(serde_urlencoded::to_string)
            .transpose()
            .map_err(|e| AuthError::InvalidInput(e.to_string()))?;
        let mut url = self.endpoint_url(path)?;
        url.set_query(query.as_deref().filter(|q| !q.is_empty()));
        self.send(Method::GET, url, None::<&()>, true).await
    }

    /// Make a signed POST request with a JSON body.
    pub async fn signed_post<T, B>(&self, path: &str, body: &B) -> Result<T, AuthError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint_url(path)?;
        self.send(Method::POST, url, Some(body), true).await
    }

    /// Make a signed DELETE request.
    pub async fn signed_delete<T>(&self, path: &str) -> Result<T, AuthError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint_url(path)?;
        self.send(Method::DELETE, url, None::<&()>, true).await
    }

    /// Resolve `path` against the base URL, keeping any base path prefix.
    fn endpoint_url(&self, path: &str) -> Result<Url, AuthError> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    async fn send<T, B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        signed: bool,
    ) -> Result<T, AuthError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        // Sign the path exactly as it goes on the wire: encoded, prefix
        // included, query excluded.
        let path = url.path().to_string();
        let mut request = if signed {
            let signer = self.signer.as_ref().ok_or_else(|| {
                AuthError::Signing("no trading credentials configured".to_string())
            })?;
            let headers = signer.sign(method.as_str(), &path)?;
            self.http_client
                .request(method, url)
                .headers(headers.to_header_map()?)
        } else {
            self.http_client.request(method, url)
        };
        request = request.header(ACCEPT, "application/json");

        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        let response = request.send().await.map_err(AuthError::from_transport)?;
        let status = response.status();
        let body = response.text().await?;

        match status.as_u16() {
            401 | 403 => {
                tracing::warn!(status = status.as_u16(), %path, "trading API rejected signed request");
                Err(AuthError::RemoteAuth {
                    status: status.as_u16(),
                    body,
                })
            }
            _ if !status.is_success() => Err(AuthError::Api {
                status: status.as_u16(),
                body,
            }),
            _ => Ok(serde_json::from_str(&body)?),
        }
    }

    // Public endpoints.

    /// Get exchange status and trading hours.
    pub async fn get_exchange_status(&self) -> Result<Value, AuthError> {
        self.public_get(public::EXCHANGE_STATUS).await
    }

    // Portfolio endpoints.

    /// Get the account balance.
    ///
    /// Also the cheapest way to check that a credential pair is accepted.
    pub async fn get_balance(&self) -> Result<Balance, AuthError> {
        self.signed_get(portfolio::BALANCE, None::<&()>).await
    }

    /// Get current positions.
    pub async fn get_positions(&self, page: &PageRequest) -> Result<Value, AuthError> {
        self.signed_get(portfolio::POSITIONS, Some(page)).await
    }

    /// Get orders.
    pub async fn get_orders(&self, page: &PageRequest) -> Result<Value, AuthError> {
        self.signed_get(portfolio::ORDERS, Some(page)).await
    }

    /// Get fill history.
    pub async fn get_fills(&self, page: &PageRequest) -> Result<Value, AuthError> {
        self.signed_get(portfolio::FILLS, Some(page)).await
    }

    /// Submit an order. The body is passed through as-is.
    pub async fn create_order(&self, order: &Value) -> Result<Value, AuthError> {
        self.signed_post(portfolio::ORDERS, order).await
    }

    /// Cancel an order.
    pub async fn cancel_order(&self, order_id: &str) -> Result<Value, AuthError> {
        if matches!(order_id, "" | "." | "..") || order_id.contains(['/', '?']) {
            return Err(AuthError::InvalidInput(format!("invalid order id {order_id:?}")));
        }
        // Pushed as one segment so reserved characters are percent-encoded.
        let mut url = self.endpoint_url(portfolio::ORDERS)?;
        url.path_segments_mut()
            .map_err(|_| AuthError::InvalidInput(format!("unusable base URL {}", self.base_url)))?
            .push(order_id);
        self.send(Method::DELETE, url, None::<&()>, true).await
    }
}

impl Default for TradingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TradingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingClient")
            .field("base_url", &self.base_url)
            .field("signer", &self.signer)
            .finish()
    }
}

/// Builder for [`TradingClient`].
pub struct TradingClientBuilder {
    base_url: String,
    signer: Option<RequestSigner>,
    user_agent: Option<String>,
    timeout: Duration,
}

impl TradingClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: TRADING_PROD_BASE_URL.to_string(),
            signer: None,
            user_agent: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use the demo environment.
    pub fn use_demo(mut self) -> Self {
        self.base_url = TRADING_DEMO_BASE_URL.to_string();
        self
    }

    /// Sign portfolio calls with `signer`.
    pub fn signer(mut self, signer: RequestSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Bound every request by `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client.
    pub fn build(self) -> TradingClient {
        TradingClient {
            http_client: http::build_client(self.user_agent.as_deref(), self.timeout),
            base_url: self.base_url,
            signer: self.signer,
        }
    }
}

impl Default for TradingClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
