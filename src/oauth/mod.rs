//! OAuth2 client for the identity provider.
//!
//! Covers the two grants this crate needs:
//! - `authorization_code`, to sign a user in
//! - `refresh_token`, to keep a server-side access token alive
//!
//! Both authenticate the client with HTTP Basic over
//! `client_id:client_secret` and post a form-encoded body.

mod client;
pub mod endpoints;
mod types;

pub use client::OAuthClient;
pub use types::ProviderTokens;
