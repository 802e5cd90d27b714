//! Error types for the tradelink-auth library.

use thiserror::Error;

/// The main error type for all authentication-core operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// A required startup secret or setting is missing or malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Stored ciphertext could not be decrypted with the configured key
    #[error("Stored credentials could not be decrypted, please relink")]
    Decryption,

    /// The OAuth flow finished without yielding a subject identifier
    #[error("Identity resolution failed: {0}")]
    IdentityResolution(String),

    /// The signing key is missing or unusable
    #[error("Signing error: {0}")]
    Signing(String),

    /// The remote trading API rejected a signed request
    #[error("Remote API rejected credentials (HTTP {status}): {body}")]
    RemoteAuth {
        /// HTTP status code returned by the remote API
        status: u16,
        /// Response body, unmodified
        body: String,
    },

    /// Session token is unknown, revoked or expired
    #[error("Session is invalid or expired")]
    SessionInvalid,

    /// A token refresh was needed but no refresh token is held
    #[error("No refresh token available, sign in again")]
    RefreshUnavailable,

    /// The identity has no linked credential pair
    #[error("No trading credentials linked")]
    CredentialsNotLinked,

    /// The provider token endpoint returned a non-success status
    #[error("Token endpoint error (HTTP {status}): {body}")]
    TokenEndpoint {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// A bearer-authenticated provider API call failed
    #[error("Provider API error (HTTP {status}): {body}")]
    ProviderApi {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The remote trading API returned a non-auth failure
    #[error("Trading API error (HTTP {status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Caller supplied an argument outside the accepted range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network call exceeded its timeout
    #[error("Request timed out")]
    Timeout,

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request with middleware failed
    #[error("HTTP request failed: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// Persistent store error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local I/O error (token files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
}

impl AuthError {
    /// Map a transport error, folding timeouts into [`AuthError::Timeout`].
    pub(crate) fn from_transport(err: reqwest_middleware::Error) -> Self {
        let timed_out = matches!(&err, reqwest_middleware::Error::Reqwest(e) if e.is_timeout());
        if timed_out {
            AuthError::Timeout
        } else {
            AuthError::HttpMiddleware(err)
        }
    }

    /// Check if this error represents an HTTP 401 from a downstream call.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            AuthError::RemoteAuth { status, .. }
            | AuthError::ProviderApi { status, .. }
            | AuthError::TokenEndpoint { status, .. } => *status == 401,
            AuthError::Http(e) => e.status().is_some_and(|s| s.as_u16() == 401),
            _ => false,
        }
    }

    /// Check if the user must relink their trading credentials.
    pub fn requires_relink(&self) -> bool {
        matches!(
            self,
            AuthError::Decryption | AuthError::CredentialsNotLinked | AuthError::Signing(_)
        )
    }

    /// Check if the user must sign in again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            AuthError::SessionInvalid
                | AuthError::IdentityResolution(_)
                | AuthError::RefreshUnavailable
        )
    }
}
