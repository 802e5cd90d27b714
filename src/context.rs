//! Everything the authentication core needs, wired once at startup.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use time::Duration;

use crate::auth::{CredentialPair, RequestSigner};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::AuthError;
use crate::guard;
use crate::identity::{Identities, Identity, IdentityLinker};
use crate::oauth::{OAuthClient, ProviderTokens};
use crate::session::{SessionManager, SessionToken};
use crate::store::Store;
use crate::trading::{Balance, TradingClient};
use crate::vault::CredentialVault;

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct Login {
    /// The local identity
    pub identity: Identity,
    /// Session token to hand to the client
    pub session: SessionToken,
    /// Provider tokens from the code exchange
    pub provider_tokens: ProviderTokens,
}

/// Shared handle to the store, vault, sessions and OAuth linker.
///
/// # Example
///
/// ```rust,no_run
/// use tradelink_auth::{AuthContext, Config};
///
/// # async fn run(code: &str) -> Result<(), tradelink_auth::AuthError> {
/// let context = AuthContext::connect(Config::from_env()?).await?;
/// let login = context.login(code).await?;
///
/// let identity = context.authenticate(Some(login.session.as_str())).await?;
/// assert_eq!(identity.id, login.identity.id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AuthContext {
    store: Store,
    clock: Arc<dyn Clock>,
    identities: Identities,
    sessions: SessionManager,
    vault: CredentialVault,
    linker: IdentityLinker,
    session_ttl: Duration,
    trading_base_url: String,
    http_timeout: StdDuration,
}

impl AuthContext {
    /// Connect to `config.database_url` and build the context.
    pub async fn connect(config: Config) -> Result<Self, AuthError> {
        let store = Store::connect(&config.database_url).await?;
        Ok(Self::with_store(store, config, Arc::new(SystemClock)))
    }

    /// Build the context over an already opened store.
    ///
    /// `config.database_url` is ignored.
    pub fn with_store(store: Store, config: Config, clock: Arc<dyn Clock>) -> Self {
        let identities = Identities::new(store.clone(), clock.clone());
        let sessions = SessionManager::new(store.clone(), clock.clone());
        let vault = CredentialVault::new(store.clone(), &config.encryption_key, clock.clone());
        let linker = IdentityLinker::new(OAuthClient::new(config.oauth), identities.clone());

        Self {
            store,
            clock,
            identities,
            sessions,
            vault,
            linker,
            session_ttl: config.session_ttl,
            trading_base_url: config.trading_base_url,
            http_timeout: config.http_timeout,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The time source.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The identity repository.
    pub fn identities(&self) -> &Identities {
        &self.identities
    }

    /// The session manager.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The credential vault.
    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    /// The OAuth identity linker.
    pub fn linker(&self) -> &IdentityLinker {
        &self.linker
    }

    /// Lifetime of sessions issued by [`AuthContext::login`].
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Complete the OAuth callback: exchange `code`, resolve the identity
    /// and issue a session.
    ///
    /// If no subject can be determined nothing is created.
    pub async fn login(&self, code: &str) -> Result<Login, AuthError> {
        let (identity, provider_tokens) = self.linker.link(code).await?;
        let session = self.sessions.create(identity.id, self.session_ttl).await?;
        tracing::info!(identity_id = %identity.id, "login completed");
        Ok(Login {
            identity,
            session,
            provider_tokens,
        })
    }

    /// Resolve the identity behind a presented session token.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        guard::authenticated_identity(&self.sessions, token).await
    }

    /// Revoke a session token.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.revoke(token).await
    }

    /// Revoke every session of `identity`.
    pub async fn logout_everywhere(&self, identity: &Identity) -> Result<u64, AuthError> {
        self.sessions.revoke_all_for(identity.id).await
    }

    /// Store a credential pair for `identity` after checking the key parses.
    ///
    /// A key that cannot sign is rejected with [`AuthError::Signing`] and
    /// nothing is stored.
    pub async fn link_credentials(
        &self,
        identity: &Identity,
        pair: &CredentialPair,
    ) -> Result<(), AuthError> {
        RequestSigner::from_pair(pair)?;
        self.vault.store(identity.id, pair).await
    }

    /// Like [`AuthContext::link_credentials`], but stores the pair only
    /// after the trading API accepted a signed balance request with it.
    pub async fn link_and_verify_credentials(
        &self,
        identity: &Identity,
        pair: &CredentialPair,
    ) -> Result<Balance, AuthError> {
        let signer = RequestSigner::from_pair(pair)?.with_clock(self.clock.clone());
        let balance = self.trading_client(signer).get_balance().await?;
        self.vault.store(identity.id, pair).await?;
        Ok(balance)
    }

    /// Remove the credential pair of `identity`.
    pub async fn unlink_credentials(&self, identity: &Identity) -> Result<bool, AuthError> {
        self.vault.delete(identity.id).await
    }

    /// A signer for the credential pair linked to `identity`.
    pub async fn signer_for(&self, identity: &Identity) -> Result<RequestSigner, AuthError> {
        let pair = guard::linked_credentials(&self.vault, identity).await?;
        Ok(RequestSigner::from_pair(&pair)?.with_clock(self.clock.clone()))
    }

    /// A trading client signing with the pair linked to `identity`.
    pub async fn trading_client_for(&self, identity: &Identity) -> Result<TradingClient, AuthError> {
        let signer = self.signer_for(identity).await?;
        Ok(self.trading_client(signer))
    }

    /// Delete sessions whose expiry has passed.
    pub async fn sweep_expired_sessions(&self) -> Result<u64, AuthError> {
        self.sessions.sweep_expired().await
    }

    fn trading_client(&self, signer: RequestSigner) -> TradingClient {
        TradingClient::builder()
            .base_url(self.trading_base_url.clone())
            .timeout(self.http_timeout)
            .signer(signer)
            .build()
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("session_ttl", &self.session_ttl)
            .field("trading_base_url", &self.trading_base_url)
            .finish_non_exhaustive()
    }
}
