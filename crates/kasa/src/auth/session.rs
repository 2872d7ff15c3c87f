//! Session lifecycle for the wallet client.

use std::sync::{Arc, Weak};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::api::{ApiClient, AuthClient, RequestPipeline, WalletApi};
use crate::config::ClientConfig;
use crate::error::{AuthError, Error, StorageError};
use crate::store::CredentialStore;

use super::claims::{self, Claims, Identity};
use super::credentials::LoginCredentials;
use super::refresh::{RefreshCoordinator, Renewer, SessionObserver};
use super::tokens::CredentialPair;

/// Where the session currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No credentials.
    #[default]
    Unauthenticated,
    /// A login or startup renewal is in flight.
    Authenticating,
    /// Signed in; `identity` was decoded from `credentials.access`.
    Authenticated {
        identity: Identity,
        credentials: CredentialPair,
    },
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }
}

/// The process-wide authentication state of the client.
///
/// `login`, `logout` and `restore_from_storage` are the only ways the
/// application changes credentials; renewal triggered by an expired call
/// updates the session through the [`RefreshCoordinator`]. State changes
/// are published on a watch channel, so subscribers see each transition
/// after it has completed.
///
/// Sessions are cheap to clone (they use internal `Arc`) and safe to
/// share across tasks.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use kasa::{ClientConfig, FileStore, LoginCredentials, Session};
///
/// # async fn example() -> Result<(), kasa::Error> {
/// let store = Arc::new(FileStore::new("/tmp/kasa/credentials.json"));
/// let session = Session::new(&ClientConfig::from_env()?, store)?;
///
/// if !session.restore_from_storage().await?.is_authenticated() {
///     session.login(&LoginCredentials::new("alice", "hunter22")).await?;
/// }
///
/// let wallet = session.wallet().wallet().await?;
/// println!("{} {}", wallet.balance, wallet.currency);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Arc<dyn CredentialStore>,
    auth: AuthClient,
    coordinator: RefreshCoordinator,
    pipeline: RequestPipeline,
    state: watch::Sender<SessionState>,
}

impl Session {
    /// Build an unauthenticated session for the configured API.
    ///
    /// Call [`restore_from_storage`](Self::restore_from_storage) next to
    /// pick up a session persisted by an earlier run.
    pub fn new(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let client = ApiClient::new(config)?;
        let auth = AuthClient::new(client.clone(), config);
        let renewer: Arc<dyn Renewer> = Arc::new(auth.clone());
        let coordinator = RefreshCoordinator::new(renewer, Arc::clone(&store));
        let pipeline = RequestPipeline::new(client, Arc::clone(&store), coordinator.clone());
        let (state, _) = watch::channel(SessionState::Unauthenticated);

        let inner = Arc::new(SessionInner {
            store,
            auth,
            coordinator,
            pipeline,
            state,
        });

        let observer: Arc<dyn SessionObserver> = inner.clone();
        let observer: Weak<dyn SessionObserver> = Arc::downgrade(&observer);
        inner.coordinator.set_observer(observer);

        Ok(Self { inner })
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receive every future state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// The pipeline every authenticated API call should use.
    pub fn pipeline(&self) -> &RequestPipeline {
        &self.inner.pipeline
    }

    pub fn wallet(&self) -> WalletApi {
        WalletApi::new(self.inner.pipeline.clone())
    }

    /// The unauthenticated endpoints (registration).
    pub fn auth(&self) -> &AuthClient {
        &self.inner.auth
    }

    /// Pick up the session persisted by an earlier run.
    ///
    /// - nothing stored: stays unauthenticated
    /// - stored token still valid: authenticated, no network call
    /// - stored token expired: one renewal; on failure storage is cleared
    /// - stored data unreadable: storage is cleared silently
    ///
    /// # Errors
    ///
    /// Only storage I/O errors are reported. Invalid or unrenewable
    /// credentials are not errors; they leave the session unauthenticated.
    #[instrument(skip(self))]
    pub async fn restore_from_storage(&self) -> Result<SessionState> {
        let pair = match self.inner.store.load() {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                debug!("No stored session");
                self.inner.set_state(SessionState::Unauthenticated);
                return Ok(self.state());
            }
            Err(Error::Storage(e @ StorageError::Corrupt { .. })) => {
                warn!(error = %e, "Discarding unreadable credential file");
                self.inner.invalidate_stored()?;
                return Ok(self.state());
            }
            Err(e) => return Err(e),
        };

        let claims = match claims::decode(&pair.access) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Discarding undecodable stored credential");
                self.inner.invalidate_stored()?;
                return Ok(self.state());
            }
        };

        if !claims::is_expired(&claims, Utc::now()) {
            info!(username = %claims.username, "Restored session");
            self.inner.authenticate(&claims, pair);
            return Ok(self.state());
        }

        debug!(expired_at = %claims.expires_at, "Stored access token expired, renewing");
        self.inner.set_state(SessionState::Authenticating);

        match self.inner.coordinator.refresh().await {
            Ok(_) => {}
            Err(Error::Auth(e)) => {
                // The coordinator has already cleared storage.
                debug!(error = %e, "Stored session could not be renewed");
                self.inner.set_state(SessionState::Unauthenticated);
            }
            Err(e) => return Err(e),
        }

        Ok(self.state())
    }

    /// Sign in with a username and password.
    ///
    /// On success the new pair is persisted and the session becomes
    /// authenticated; a renewal still in flight for the previous
    /// credentials is abandoned. On failure the previous state and
    /// storage are left as they were.
    ///
    /// # Errors
    ///
    /// [`AuthError::AccountLocked`] for a locked account,
    /// [`AuthError::LoginFailed`] for rejected credentials, or the
    /// underlying transport or storage error.
    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<Identity> {
        info!("Logging in");
        let previous = self.state();
        self.inner.set_state(SessionState::Authenticating);

        let result: Result<(CredentialPair, Claims)> = async {
            let pair = self.inner.auth.login(credentials).await?;
            let claims = claims::decode(&pair.access)?;
            // A renewal started for the previous credentials must not
            // overwrite or clear these.
            self.inner.coordinator.invalidate();
            self.inner.store.save(&pair)?;
            Ok::<_, Error>((pair, claims))
        }
        .await;

        match result {
            Ok((pair, claims)) => {
                info!(subject = %claims.subject, "Logged in");
                self.inner.authenticate(&claims, pair);
                Ok(claims.identity())
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.inner.set_state(previous);
                Err(e)
            }
        }
    }

    /// Renew the credential pair now instead of waiting for a rejection.
    ///
    /// Joins a renewal already in flight. A failed renewal ends the
    /// session exactly as a failed automatic renewal does.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Identity> {
        if !self.is_authenticated() {
            return Err(AuthError::NotAuthenticated.into());
        }
        self.inner.coordinator.refresh().await?;
        self.identity()
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    /// Forget the current credentials. Safe to call when signed out.
    ///
    /// Any renewal still in flight is abandoned and will not bring the
    /// session back.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<()> {
        info!("Logging out");
        self.inner.coordinator.invalidate();
        let cleared = self.inner.store.clear();
        self.inner.set_state(SessionState::Unauthenticated);
        cleared
    }
}

impl SessionInner {
    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn authenticate(&self, claims: &Claims, credentials: CredentialPair) {
        self.set_state(SessionState::Authenticated {
            identity: claims.identity(),
            credentials,
        });
    }

    /// Clear storage and drop to unauthenticated.
    fn invalidate_stored(&self) -> Result<()> {
        self.set_state(SessionState::Unauthenticated);
        self.store.clear()
    }
}

impl SessionObserver for SessionInner {
    fn renewed(&self, pair: &CredentialPair) -> std::result::Result<(), AuthError> {
        let claims = claims::decode(&pair.access)?;
        debug!(subject = %claims.subject, "Session credentials renewed");
        self.authenticate(&claims, pair.clone());
        Ok(())
    }

    fn renewal_failed(&self, error: &AuthError) {
        info!(error = %error, "Session ended after failed renewal");
        self.set_state(SessionState::Unauthenticated);
    }
}

// Custom Debug impl that hides sensitive data
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity())
            .field("store", &self.inner.store)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::test_support::token;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use serde_json::json;

    fn session_with(store: Arc<MemoryStore>) -> Session {
        // Nothing listens on port 9; any network call fails fast.
        let config = ClientConfig::new("http://127.0.0.1:9/api/".parse().unwrap());
        Session::new(&config, store).unwrap()
    }

    #[tokio::test]
    async fn restore_with_empty_store_stays_unauthenticated() {
        let session = session_with(Arc::new(MemoryStore::new()));
        let state = session.restore_from_storage().await.unwrap();
        assert_eq!(state, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn restore_valid_token_is_local() {
        let exp = (Utc::now() + Duration::seconds(600)).timestamp();
        let access = token(json!("u1"), "alice", exp);
        let pair = CredentialPair {
            access,
            refresh: crate::auth::RefreshToken::new("R1"),
        };
        let store = Arc::new(MemoryStore::with_pair(&pair));
        let session = session_with(store);

        let state = session.restore_from_storage().await.unwrap();

        let identity = state.identity().unwrap();
        assert_eq!(identity.subject.as_str(), "u1");
        assert_eq!(identity.username, "alice");
    }

    #[tokio::test]
    async fn restore_malformed_token_clears_silently() {
        let store = Arc::new(MemoryStore::with_pair(&CredentialPair::new("garbage", "R1")));
        let session = session_with(store.clone());

        let state = session.restore_from_storage().await.unwrap();

        assert_eq!(state, SessionState::Unauthenticated);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn logout_twice_is_harmless() {
        let store = Arc::new(MemoryStore::with_pair(&CredentialPair::new("a", "r")));
        let session = session_with(store.clone());

        session.logout().unwrap();
        session.logout().unwrap();

        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn renewal_failure_signal_ends_session() {
        let store = Arc::new(MemoryStore::new());
        let session = session_with(store);
        session.inner.set_state(SessionState::Authenticating);

        session
            .inner
            .renewal_failed(&AuthError::refresh_failed("rejected"));

        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn refresh_requires_a_session() {
        let session = session_with(Arc::new(MemoryStore::new()));
        let err = session.refresh().await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::NotAuthenticated)));
    }

    #[test]
    fn debug_redacts_tokens() {
        let store = Arc::new(MemoryStore::with_pair(&CredentialPair::new("secret-a", "secret-r")));
        let session = session_with(store);
        let debug = format!("{:?}", session);
        assert!(!debug.contains("secret"));
    }
}
