//! Access predicates for request handlers.
//!
//! Each check returns an explicit result. Any error along the way is an
//! error for the caller, never an implicit "allowed".

use crate::auth::CredentialPair;
use crate::error::AuthError;
use crate::identity::Identity;
use crate::session::SessionManager;
use crate::vault::CredentialVault;

/// Resolve the identity behind a presented session token.
///
/// A missing, unknown, revoked or expired token is
/// [`AuthError::SessionInvalid`].
pub async fn authenticated_identity(
    sessions: &SessionManager,
    token: Option<&str>,
) -> Result<Identity, AuthError> {
    sessions.require(token).await
}

/// Whether `identity` has a credential pair linked.
pub async fn has_linked_credentials(
    vault: &CredentialVault,
    identity: &Identity,
) -> Result<bool, AuthError> {
    vault.exists(identity.id).await
}

/// The decrypted credential pair of `identity`.
///
/// Nothing linked is [`AuthError::CredentialsNotLinked`]; a pair that no
/// longer decrypts is [`AuthError::Decryption`].
pub async fn linked_credentials(
    vault: &CredentialVault,
    identity: &Identity,
) -> Result<CredentialPair, AuthError> {
    vault
        .load(identity.id)
        .await?
        .ok_or(AuthError::CredentialsNotLinked)
}
