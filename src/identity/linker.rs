//! Resolving a local identity from an OAuth authorization code.
//!
//! The token response may or may not carry the subject identifier. When it
//! does not, two fallbacks run in order with the fresh access token:
//!
//! 1. the dedicated userinfo lookup (`sub`)
//! 2. the application-scoped current-user lookup (`guid`)
//!
//! If neither yields a subject the flow stops with
//! [`AuthError::IdentityResolution`] and no identity or session is created.

use url::Url;

use crate::error::AuthError;
use crate::identity::profile::{SubjectProfile, app_user_guid, userinfo_profile};
use crate::identity::{Identities, Identity};
use crate::oauth::{OAuthClient, ProviderTokens};

/// Provider tokens plus the subject they belong to.
#[derive(Debug, Clone)]
pub struct LinkedSubject {
    /// Tokens from the code exchange
    pub tokens: ProviderTokens,
    /// Resolved subject and display fields
    pub profile: SubjectProfile,
}

/// Exchanges authorization codes and maps subjects onto local identities.
#[derive(Debug, Clone)]
pub struct IdentityLinker {
    oauth: OAuthClient,
    identities: Identities,
}

impl IdentityLinker {
    /// Create a linker.
    pub fn new(oauth: OAuthClient, identities: Identities) -> Self {
        Self { oauth, identities }
    }

    /// The OAuth client used for exchanges and lookups.
    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    /// Exchange `code` and determine whose tokens they are.
    pub async fn exchange_code(&self, code: &str) -> Result<LinkedSubject, AuthError> {
        let tokens = self.oauth.exchange_code(code).await?;

        // Userinfo is the only source of display fields, so it is consulted
        // even when the token response already names the subject.
        let userinfo = match self
            .oauth
            .get_json(&self.oauth.config().userinfo_url, &tokens.access_token)
            .await
        {
            Ok(payload) => match userinfo_profile(&payload) {
                Ok(profile) => Some(profile),
                Err(missing) => {
                    tracing::warn!(%missing, "userinfo lookup returned no subject");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "userinfo lookup failed");
                None
            }
        };

        let profile = match (tokens.subject.clone(), userinfo) {
            (Some(subject), Some(info)) if info.subject == subject => SubjectProfile {
                subject,
                display_name: info.display_name,
                email: info.email,
            },
            (Some(subject), Some(info)) => {
                tracing::warn!(
                    token_subject = %subject,
                    userinfo_subject = %info.subject,
                    "userinfo describes a different subject; display fields ignored"
                );
                SubjectProfile {
                    subject,
                    display_name: None,
                    email: None,
                }
            }
            (Some(subject), None) => SubjectProfile {
                subject,
                display_name: None,
                email: None,
            },
            (None, Some(info)) => info,
            (None, None) => SubjectProfile {
                subject: self.app_scoped_subject(&tokens).await?,
                display_name: None,
                email: None,
            },
        };

        Ok(LinkedSubject { tokens, profile })
    }

    /// Find or create the identity for `subject_id`, refreshing display fields.
    pub async fn resolve(
        &self,
        subject_id: &str,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Identity, AuthError> {
        self.identities.resolve(subject_id, display_name, email).await
    }

    /// Exchange `code` and resolve the resulting identity in one step.
    pub async fn link(&self, code: &str) -> Result<(Identity, ProviderTokens), AuthError> {
        let linked = self.exchange_code(code).await?;
        let identity = self
            .resolve(
                &linked.profile.subject,
                linked.profile.display_name.as_deref(),
                linked.profile.email.as_deref(),
            )
            .await?;
        tracing::info!(identity_id = %identity.id, "identity linked via OAuth");
        Ok((identity, linked.tokens))
    }

    async fn app_scoped_subject(&self, tokens: &ProviderTokens) -> Result<String, AuthError> {
        let mut url = Url::parse(&self.oauth.config().app_user_url)?;
        url.query_pairs_mut().append_pair("format", "json");

        let payload = self
            .oauth
            .get_json(url.as_str(), &tokens.access_token)
            .await
            .map_err(|e| {
                AuthError::IdentityResolution(format!("application-scoped lookup failed: {e}"))
            })?;

        app_user_guid(&payload).map_err(|missing| {
            AuthError::IdentityResolution(format!(
                "no subject in token response or fallback lookups ({missing})"
            ))
        })
    }
}
