//! Opaque session tokens.
//!
//! A token is `active` from creation until its expiry passes or it is
//! revoked. Expired, revoked and never-issued tokens all validate to
//! `None`; callers cannot tell them apart.
//!
//! Expired rows are not removed by a background task. Whoever schedules
//! periodic jobs calls [`SessionManager::sweep_expired`].

pub mod transport;

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use time::{Duration, OffsetDateTime};

use crate::clock::{Clock, ceil_to_millis, unix_millis};
use crate::error::AuthError;
use crate::identity::{Identity, IdentityId, IdentityRow};
use crate::store::{Store, is_unique_violation};

pub use transport::token_from_headers;

/// Random bytes per token (256 bits).
const TOKEN_BYTES: usize = 32;
const MAX_INSERT_ATTEMPTS: usize = 3;

/// A freshly issued session token.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    /// When the token stops validating
    pub expires_at: OffsetDateTime,
}

impl SessionToken {
    /// The token string to hand to the client.
    ///
    /// This method exposes the secret - use carefully.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Consume the token, returning the string.
    pub fn into_string(self) -> String {
        self.value
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues, validates and revokes session tokens.
#[derive(Clone)]
pub struct SessionManager {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    /// Create a manager over `store`.
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Issue a token for `identity_id` that expires after `ttl`.
    pub async fn create(&self, identity_id: IdentityId, ttl: Duration) -> Result<SessionToken, AuthError> {
        if !ttl.is_positive() {
            return Err(AuthError::InvalidInput(
                "session ttl must be positive".to_string(),
            ));
        }

        let now = self.clock.now();
        // The returned expiry is exactly the stored one.
        let expires_at = ceil_to_millis(now + ttl);

        for _ in 0..MAX_INSERT_ATTEMPTS {
            let value = generate_token();
            let inserted = sqlx::query(
                "INSERT INTO sessions (identity_id, token, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(identity_id)
            .bind(&value)
            .bind(unix_millis(expires_at))
            .bind(unix_millis(now))
            .execute(self.store.pool())
            .await;

            match inserted {
                Ok(_) => {
                    tracing::debug!(identity_id = %identity_id, %expires_at, "session issued");
                    return Ok(SessionToken { value, expires_at });
                }
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::InvalidInput(
            "could not generate a unique session token".to_string(),
        ))
    }

    /// Return the identity behind `token`, or `None` if the token is
    /// unknown, revoked or expired.
    pub async fn validate(&self, token: &str) -> Result<Option<Identity>, AuthError> {
        if token.is_empty() {
            return Ok(None);
        }

        let row: Option<IdentityRow> = sqlx::query_as(
            "SELECT i.id, i.external_subject_id, i.display_name, i.email, i.created_at
             FROM sessions s
             JOIN identities i ON i.id = s.identity_id
             WHERE s.token = ?1 AND s.expires_at > ?2",
        )
        .bind(token)
        .bind(self.clock.now_millis())
        .fetch_optional(self.store.pool())
        .await?;

        Ok(row.map(Identity::from))
    }

    /// Like [`SessionManager::validate`], but a missing or invalid token is
    /// [`AuthError::SessionInvalid`].
    pub async fn require(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = token.ok_or(AuthError::SessionInvalid)?;
        self.validate(token).await?.ok_or(AuthError::SessionInvalid)
    }

    /// Delete `token`. Revoking an unknown token is not an error.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(self.store.pool())
            .await?;
        tracing::debug!(removed = result.rows_affected(), "session revoked");
        Ok(())
    }

    /// Delete every session of `identity_id`. Returns how many were removed.
    pub async fn revoke_all_for(&self, identity_id: IdentityId) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE identity_id = ?1")
            .bind(identity_id)
            .execute(self.store.pool())
            .await?;
        tracing::info!(identity_id = %identity_id, removed = result.rows_affected(), "all sessions revoked");
        Ok(result.rows_affected())
    }

    /// Delete every session whose expiry has passed. Returns how many were removed.
    pub async fn sweep_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(self.clock.now_millis())
            .execute(self.store.pool())
            .await?;
        if result.rows_affected() > 0 {
            tracing::info!(removed = result.rows_affected(), "expired sessions swept");
        }
        Ok(result.rows_affected())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}
