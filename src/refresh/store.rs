//! Persistence of the refresher's token tuple.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::clock::{from_unix_millis, unix_millis};
use crate::error::AuthError;
use crate::refresh::TokenState;

/// Somewhere to keep the token tuple across restarts.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the last saved state, if any.
    async fn load(&self) -> Result<Option<TokenState>, AuthError>;

    /// Save `state`, replacing what was there.
    async fn save(&self, state: &TokenState) -> Result<(), AuthError>;
}

/// Keeps the tuple in memory only.
#[derive(Default)]
pub struct MemoryTokenStore {
    state: Mutex<Option<TokenState>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<TokenState>, AuthError> {
        Ok(self.state.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn save(&self, state: &TokenState) -> Result<(), AuthError> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(state.clone());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredTokens {
    access_token: String,
    refresh_token: Option<String>,
    /// Milliseconds since the UNIX epoch, rounded down
    expires_at_ms: i64,
}

/// Keeps the tuple in a JSON file.
///
/// The file holds live tokens in plain text; restrict its permissions.
#[derive(Debug, Clone)]
pub struct JsonFileTokenStore {
    path: PathBuf,
}

impl JsonFileTokenStore {
    /// Store tokens at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sibling file a save is staged in before it replaces `path`.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TokenStore for JsonFileTokenStore {
    async fn load(&self) -> Result<Option<TokenState>, AuthError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredTokens = serde_json::from_str(&raw)?;
        Ok(Some(TokenState {
            access_token: SecretString::from(stored.access_token),
            refresh_token: stored.refresh_token.map(SecretString::from),
            expires_at: from_unix_millis(stored.expires_at_ms),
        }))
    }

    async fn save(&self, state: &TokenState) -> Result<(), AuthError> {
        let stored = StoredTokens {
            access_token: state.access_token.expose_secret().to_string(),
            refresh_token: state
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            expires_at_ms: unix_millis(state.expires_at),
        };
        let json = serde_json::to_string_pretty(&stored)?;

        // The old file is replaced only once the new one is complete on disk.
        let staging = self.staging_path();
        let mut file = tokio::fs::File::create(&staging).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn state() -> TokenState {
        TokenState {
            access_token: SecretString::from("AT".to_string()),
            refresh_token: Some(SecretString::from("RT".to_string())),
            expires_at: datetime!(2025-01-01 10:00 UTC),
        }
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert!(store.load().await.unwrap().is_none());
        store.save(&state()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token.expose_secret(), "AT");
    }

    #[tokio::test]
    async fn test_json_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileTokenStore::new(dir.path().join("oauth_token.json"));

        assert!(store.load().await.unwrap().is_none());
        store.save(&state()).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token.expose_secret(), "AT");
        assert_eq!(loaded.refresh_token.unwrap().expose_secret(), "RT");
        assert_eq!(loaded.expires_at, datetime!(2025-01-01 10:00 UTC));
    }

    #[tokio::test]
    async fn test_json_file_store_keeps_milliseconds() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileTokenStore::new(dir.path().join("oauth_token.json"));
        let mut saved = state();
        saved.expires_at = datetime!(2025-01-01 10:00:00.789 UTC);

        store.save(&saved).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.expires_at, datetime!(2025-01-01 10:00:00.789 UTC));
    }

    #[tokio::test]
    async fn test_json_file_store_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth_token.json");
        let store = JsonFileTokenStore::new(&path);

        // Leftover staging file from an interrupted save.
        tokio::fs::write(store.staging_path(), "{ truncated").await.unwrap();
        store.save(&state()).await.unwrap();

        let mut rotated = state();
        rotated.refresh_token = Some(SecretString::from("RT2".to_string()));
        store.save(&rotated).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.refresh_token.unwrap().expose_secret(), "RT2");
        assert!(!store.staging_path().exists());
        assert_eq!(
            store.staging_path(),
            dir.path().join("oauth_token.json.tmp")
        );
    }
}
