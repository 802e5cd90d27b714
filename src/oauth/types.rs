//! Token endpoint payloads.

use secrecy::SecretString;
use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use time::Duration;

/// Raw token endpoint response.
///
/// Some providers send `expires_in` as a string, so both forms are accepted.
#[serde_as]
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub(crate) expires_in: i64,
    #[serde(default, rename = "xoauth_yahoo_guid")]
    pub(crate) subject: Option<String>,
}

/// Tokens issued by the provider for one grant.
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    /// Bearer token for provider API calls
    pub access_token: SecretString,
    /// Token for the next refresh grant; providers may omit it on refresh
    pub refresh_token: Option<SecretString>,
    /// Lifetime of `access_token` from the moment it was issued
    pub expires_in: Duration,
    /// Subject identifier, when the provider includes it in the token response
    pub subject: Option<String>,
}

impl From<TokenResponse> for ProviderTokens {
    fn from(raw: TokenResponse) -> Self {
        Self {
            access_token: SecretString::from(raw.access_token),
            refresh_token: raw
                .refresh_token
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            expires_in: Duration::seconds(raw.expires_in.max(0)),
            subject: raw.subject.filter(|s| !s.trim().is_empty()),
        }
    }
}
