//! The trading-account credential pair.

use secrecy::{ExposeSecret, SecretString};

/// Access-key id plus the PEM-encoded private key used for signing.
#[derive(Clone)]
pub struct CredentialPair {
    /// The access-key id (public identifier)
    pub access_key_id: String,
    /// The private key in PEM form (PKCS#1 or PKCS#8)
    private_key: SecretString,
}

impl CredentialPair {
    /// Create a pair from an access-key id and a PEM private key.
    pub fn new(access_key_id: impl Into<String>, private_key_pem: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            private_key: SecretString::from(private_key_pem.into()),
        }
    }

    /// Get the private key PEM.
    ///
    /// This method exposes the secret - use carefully.
    pub fn expose_private_key(&self) -> &str {
        self.private_key.expose_secret()
    }
}

impl PartialEq for CredentialPair {
    fn eq(&self, other: &Self) -> bool {
        self.access_key_id == other.access_key_id
            && self.expose_private_key() == other.expose_private_key()
    }
}

impl Eq for CredentialPair {}

impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_key_id", &self.access_key_id)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Credential pair read from environment variables, for operator tooling
/// and live smoke tests rather than per-user links.
///
/// By default, reads `TRADING_ACCESS_KEY_ID` and `TRADING_PRIVATE_KEY_PATH`.
pub struct EnvCredentials;

impl EnvCredentials {
    /// Try to read the pair from the default variables.
    ///
    /// Returns `None` if a variable is unset or the key file cannot be read.
    pub fn try_from_env() -> Option<CredentialPair> {
        Self::try_from_env_vars("TRADING_ACCESS_KEY_ID", "TRADING_PRIVATE_KEY_PATH")
    }

    /// Try to read the pair from custom variable names.
    ///
    /// `key_path_var` names a variable holding the path of a PEM file.
    pub fn try_from_env_vars(key_id_var: &str, key_path_var: &str) -> Option<CredentialPair> {
        let access_key_id = std::env::var(key_id_var).ok()?;
        let key_path = std::env::var(key_path_var).ok()?;
        let pem = std::fs::read_to_string(key_path).ok()?;
        Some(CredentialPair::new(access_key_id, pem))
    }
}
