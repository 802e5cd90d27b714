//! # tradelink-auth
//!
//! Authentication core for an app that signs users in through an OAuth2
//! identity provider and places signed requests against a trading API on
//! their behalf.
//!
//! ## Features
//!
//! - Identity resolution from an authorization code, with userinfo and
//!   application-scoped fallbacks for the subject
//! - Opaque session tokens with expiry, revocation and sweeping
//! - Trading credentials encrypted at rest with AES-256-GCM
//! - RSA-PSS request signing (`ACCESS-KEY`, `ACCESS-SIGNATURE`,
//!   `ACCESS-TIMESTAMP`)
//! - A provider token refresher with single-flight refresh and one retry
//!   on 401
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tradelink_auth::{AuthContext, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = AuthContext::connect(Config::from_env()?).await?;
//!
//!     // OAuth callback handler
//!     let login = context.login("code-from-callback").await?;
//!     println!("Signed in as {}", login.identity.external_subject_id);
//!
//!     // Later requests
//!     let identity = context.authenticate(Some(login.session.as_str())).await?;
//!     let balance = context
//!         .trading_client_for(&identity)
//!         .await?
//!         .get_balance()
//!         .await?;
//!     println!("Balance: {}", balance.balance);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
mod http;
pub mod identity;
pub mod oauth;
pub mod refresh;
pub mod session;
pub mod store;
pub mod trading;
pub mod vault;

// Re-export commonly used types at crate root
pub use auth::{CredentialPair, RequestSigner};
pub use config::{Config, EncryptionKey, OAuthConfig};
pub use context::{AuthContext, Login};
pub use error::AuthError;
pub use identity::{Identity, IdentityId};
pub use refresh::TokenRefresher;
pub use session::{SessionManager, SessionToken};
pub use vault::CredentialVault;

/// Result type alias using AuthError
pub type Result<T> = std::result::Result<T, AuthError>;
