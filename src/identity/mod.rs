//! Local identities linked to an external OAuth subject.
//!
//! An [`Identity`] is created the first time a subject signs in and its
//! display fields are refreshed on every later sign-in. The
//! `external_subject_id` is write-once.

pub mod linker;
pub mod profile;

use std::sync::Arc;

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::clock::{Clock, from_unix_millis};
use crate::error::AuthError;
use crate::store::Store;

pub use linker::{IdentityLinker, LinkedSubject};
pub use profile::{MissingField, SubjectProfile};

/// Stable local key of an [`Identity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct IdentityId(pub i64);

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for IdentityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A local record representing one authenticated external user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Local key
    pub id: IdentityId,
    /// Provider subject identifier, never changed after creation
    pub external_subject_id: String,
    /// Name reported by the provider at the last sign-in
    pub display_name: Option<String>,
    /// Email reported by the provider at the last sign-in
    pub email: Option<String>,
    /// When the identity was first seen
    pub created_at: OffsetDateTime,
}

#[derive(FromRow)]
pub(crate) struct IdentityRow {
    pub(crate) id: i64,
    pub(crate) external_subject_id: String,
    pub(crate) display_name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) created_at: i64,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Self {
            id: IdentityId(row.id),
            external_subject_id: row.external_subject_id,
            display_name: row.display_name,
            email: row.email,
            created_at: from_unix_millis(row.created_at),
        }
    }
}

/// Repository of identities.
#[derive(Clone)]
pub struct Identities {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl Identities {
    /// Create a repository over `store`.
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Find or create the identity for `subject_id`.
    ///
    /// An existing identity gets its display fields updated where the
    /// provider supplied a value; absent values keep what is stored.
    /// Runs as a single upsert so two concurrent first sign-ins for the same
    /// subject converge on one row.
    pub async fn resolve(
        &self,
        subject_id: &str,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Identity, AuthError> {
        if subject_id.trim().is_empty() {
            return Err(AuthError::IdentityResolution(
                "subject identifier is empty".to_string(),
            ));
        }

        let row: IdentityRow = sqlx::query_as(
            "INSERT INTO identities (external_subject_id, display_name, email, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(external_subject_id) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, identities.display_name),
                email = COALESCE(excluded.email, identities.email)
             RETURNING id, external_subject_id, display_name, email, created_at",
        )
        .bind(subject_id)
        .bind(display_name)
        .bind(email)
        .bind(self.clock.now_millis())
        .fetch_one(self.store.pool())
        .await?;

        let identity = Identity::from(row);
        tracing::debug!(identity_id = %identity.id, "identity resolved");
        Ok(identity)
    }

    /// Look up an identity by local id.
    pub async fn find(&self, id: IdentityId) -> Result<Option<Identity>, AuthError> {
        let row: Option<IdentityRow> = sqlx::query_as(
            "SELECT id, external_subject_id, display_name, email, created_at
             FROM identities WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.store.pool())
        .await?;
        Ok(row.map(Identity::from))
    }

    /// Look up an identity by provider subject.
    pub async fn find_by_subject(&self, subject_id: &str) -> Result<Option<Identity>, AuthError> {
        let row: Option<IdentityRow> = sqlx::query_as(
            "SELECT id, external_subject_id, display_name, email, created_at
             FROM identities WHERE external_subject_id = ?1",
        )
        .bind(subject_id)
        .fetch_optional(self.store.pool())
        .await?;
        Ok(row.map(Identity::from))
    }

    /// Delete an identity together with its credential pair and sessions.
    ///
    /// Returns `true` if a row was removed.
    pub async fn delete(&self, id: IdentityId) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM identities WHERE id = ?1")
            .bind(id)
            .execute(self.store.pool())
            .await?;
        let removed = result.rows_affected() > 0;
        if removed {
            tracing::info!(identity_id = %id, "identity deleted");
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for Identities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identities").finish_non_exhaustive()
    }
}
