//! Shared HTTP client construction.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;

/// Build a traced HTTP client whose every request is bounded by `timeout`.
///
/// No retry middleware is installed: the token endpoint consumes
/// authorization codes and the trading API places orders, so replays are
/// left to the caller.
pub(crate) fn build_client(user_agent: Option<&str>, timeout: Duration) -> ClientWithMiddleware {
    let mut headers = HeaderMap::new();
    let user_agent = user_agent
        .map(str::to_string)
        .unwrap_or_else(|| format!("tradelink-auth/{}", env!("CARGO_PKG_VERSION")));
    let header_value = HeaderValue::from_str(&user_agent)
        .unwrap_or_else(|_| HeaderValue::from_static("tradelink-auth"));
    headers.insert(USER_AGENT, header_value);

    let reqwest_client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    ClientBuilder::new(reqwest_client)
        .with(TracingMiddleware::default())
        .build()
}
