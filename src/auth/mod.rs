//! Trading-API authentication.
//!
//! This module provides:
//! - The credential pair (access-key id and private key) with secret storage
//! - RSA-PSS request signing for the remote trading API

mod credentials;
mod signature;

pub use credentials::{CredentialPair, EnvCredentials};
pub use signature::{
    ACCESS_KEY_HEADER, ACCESS_SIGNATURE_HEADER, ACCESS_TIMESTAMP_HEADER, RequestSigner,
    SignedHeaders, canonical_message,
};
