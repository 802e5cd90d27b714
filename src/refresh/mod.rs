//! Keeping a server-side provider access token valid.
//!
//! A [`TokenRefresher`] owns one `{access_token, refresh_token, expires_at}`
//! tuple. Batch jobs ask it for a token and it runs a refresh grant when the
//! current one is inside the safety margin.
//!
//! ## Single flight
//!
//! Providers rotate refresh tokens, so two overlapping refresh grants would
//! invalidate each other. Refreshes are serialized behind a per-refresher
//! lock and every caller remembers which generation of the tuple it saw
//! before waiting. Once it holds the lock, a caller whose generation is
//! stale uses the result of the refresh that just finished instead of
//! starting another one.
//!
//! ## Retry on 401
//!
//! [`TokenRefresher::with_token`] runs a downstream call and, if it comes
//! back unauthorized, refreshes exactly once and retries exactly once.

mod store;

use std::future::Future;
use std::sync::{Arc, RwLock};

use secrecy::SecretString;
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::AuthError;
use crate::oauth::{OAuthClient, ProviderTokens};

pub use store::{JsonFileTokenStore, MemoryTokenStore, TokenStore};

/// How long before expiry a token is already treated as expired.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::minutes(5);

/// The provider token tuple.
#[derive(Debug, Clone)]
pub struct TokenState {
    /// Current bearer token
    pub access_token: SecretString,
    /// Token for the next refresh grant
    pub refresh_token: Option<SecretString>,
    /// When `access_token` stops working
    pub expires_at: OffsetDateTime,
}

impl TokenState {
    /// Build the tuple from a grant response received at `now`.
    pub fn from_tokens(tokens: &ProviderTokens, now: OffsetDateTime) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: now + tokens.expires_in,
        }
    }

    /// True iff `now < expires_at - margin`.
    pub fn is_valid_at(&self, now: OffsetDateTime, margin: Duration) -> bool {
        now < self.expires_at - margin
    }
}

struct Current {
    state: TokenState,
    generation: u64,
}

/// Maintains one provider token tuple.
pub struct TokenRefresher {
    oauth: OAuthClient,
    current: RwLock<Current>,
    refresh_lock: Mutex<()>,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    safety_margin: Duration,
}

impl TokenRefresher {
    /// Create a refresher starting from `initial`.
    pub fn new(oauth: OAuthClient, initial: TokenState) -> Self {
        Self {
            oauth,
            current: RwLock::new(Current {
                state: initial,
                generation: 0,
            }),
            refresh_lock: Mutex::new(()),
            store: Arc::new(MemoryTokenStore::new()),
            clock: Arc::new(SystemClock),
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }

    /// Create a refresher from the tuple saved in `store`.
    ///
    /// Returns `Ok(None)` if the store is empty.
    pub async fn from_store(
        oauth: OAuthClient,
        store: Arc<dyn TokenStore>,
    ) -> Result<Option<Self>, AuthError> {
        Ok(store
            .load()
            .await?
            .map(|state| Self::new(oauth, state).with_store(store)))
    }

    /// Persist every refreshed tuple to `store`.
    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = store;
        self
    }

    /// Use a custom time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the five-minute safety margin.
    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    fn snapshot(&self) -> (TokenState, u64) {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        (current.state.clone(), current.generation)
    }

    /// Whether the current access token is outside the safety margin.
    pub fn is_valid(&self) -> bool {
        self.snapshot()
            .0
            .is_valid_at(self.clock.now(), self.safety_margin)
    }

    /// Expiry of the current access token.
    pub fn expires_at(&self) -> OffsetDateTime {
        self.snapshot().0.expires_at
    }

    /// Run a refresh grant, unless one finished while this call was waiting.
    pub async fn refresh(&self) -> Result<SecretString, AuthError> {
        let (_, generation) = self.snapshot();
        self.refresh_from(generation).await.map(|(token, _)| token)
    }

    /// A valid access token, refreshing first if needed.
    pub async fn access_token(&self) -> Result<SecretString, AuthError> {
        self.valid_token().await.map(|(token, _)| token)
    }

    /// Run `call` with a valid token; on 401, refresh once and retry once.
    pub async fn with_token<T, F, Fut>(&self, call: F) -> Result<T, AuthError>
    where
        F: Fn(SecretString) -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        let (token, generation) = self.valid_token().await?;
        match call(token).await {
            Err(e) if e.is_unauthorized() => {
                tracing::info!("downstream call unauthorized, refreshing token once");
                match self.refresh_from(generation).await {
                    Ok((token, _)) => call(token).await,
                    Err(AuthError::RefreshUnavailable) => {
                        tracing::warn!("no refresh token held, returning the rejection");
                        Err(e)
                    }
                    Err(refresh_err) => Err(refresh_err),
                }
            }
            other => other,
        }
    }

    /// GET a provider API URL as JSON with automatic refresh.
    pub async fn get_json(&self, url: &str) -> Result<Value, AuthError> {
        let oauth = &self.oauth;
        self.with_token(|token| async move { oauth.get_json(url, &token).await })
            .await
    }

    async fn valid_token(&self) -> Result<(SecretString, u64), AuthError> {
        let (state, generation) = self.snapshot();
        if state.is_valid_at(self.clock.now(), self.safety_margin) {
            return Ok((state.access_token, generation));
        }
        self.refresh_from(generation).await
    }

    async fn refresh_from(&self, observed: u64) -> Result<(SecretString, u64), AuthError> {
        let _guard = self.refresh_lock.lock().await;

        let (state, generation) = self.snapshot();
        if generation != observed {
            tracing::debug!(generation, "token refreshed by a concurrent caller");
            return Ok((state.access_token, generation));
        }

        let refresh_token = state
            .refresh_token
            .clone()
            .ok_or(AuthError::RefreshUnavailable)?;
        let tokens = self.oauth.refresh(&refresh_token).await?;

        let next = TokenState {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token.or(state.refresh_token),
            expires_at: self.clock.now() + tokens.expires_in,
        };
        let generation = {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            current.state = next.clone();
            current.generation += 1;
            current.generation
        };

        if let Err(e) = self.store.save(&next).await {
            tracing::warn!(error = %e, "failed to persist refreshed token");
        }

        Ok((next.access_token, generation))
    }
}

impl std::fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("expires_at", &self.expires_at())
            .field("safety_margin", &self.safety_margin)
            .finish()
    }
}
