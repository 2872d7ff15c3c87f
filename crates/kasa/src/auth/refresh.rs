//! Single-flight credential renewal.
//!
//! Any number of callers may discover at the same moment that the access
//! token has expired. [`RefreshCoordinator::refresh`] collapses them into
//! one renewal round-trip: the first caller opens a [`RefreshTicket`],
//! later callers join it, and everyone receives the same outcome in one
//! batch when the round-trip completes.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::error::{AuthError, Error};
use crate::store::CredentialStore;

use super::tokens::{CredentialPair, RefreshToken};

/// The one capability the coordinator needs from the authentication API.
#[async_trait]
pub trait Renewer: Send + Sync {
    /// Exchange `refresh` for a new pair.
    async fn renew(&self, refresh: &RefreshToken) -> Result<CredentialPair>;
}

/// Receives the outcome of every renewal that completes in its epoch.
///
/// Called after the store has been updated and before any waiter is
/// resolved.
pub trait SessionObserver: Send + Sync {
    /// Adopt a renewed pair. An error turns the renewal into a failure.
    fn renewed(&self, pair: &CredentialPair) -> std::result::Result<(), AuthError>;
    fn renewal_failed(&self, error: &AuthError);
}

type Outcome = std::result::Result<CredentialPair, AuthError>;

/// One in-flight renewal and everyone waiting on it.
#[derive(Default)]
struct RefreshTicket {
    waiters: Vec<oneshot::Sender<Outcome>>,
}

#[derive(Default)]
struct TicketState {
    ticket: Option<RefreshTicket>,
    /// Bumped by [`RefreshCoordinator::invalidate`]; a renewal that
    /// finishes in a later epoch than it started in is discarded.
    /// `ticket` always belongs to the current epoch.
    epoch: u64,
}

/// Serialises credential renewal so each expiry causes at most one
/// round-trip.
///
/// Cheap to clone; clones share the same ticket.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    renewer: Arc<dyn Renewer>,
    store: Arc<dyn CredentialStore>,
    observer: RwLock<Option<Weak<dyn SessionObserver>>>,
    state: Mutex<TicketState>,
}

impl RefreshCoordinator {
    pub fn new(renewer: Arc<dyn Renewer>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                renewer,
                store,
                observer: RwLock::new(None),
                state: Mutex::new(TicketState::default()),
            }),
        }
    }

    /// Register the target of renewal success and failure signals.
    ///
    /// Held weakly so the observer may own this coordinator.
    pub fn set_observer(&self, observer: Weak<dyn SessionObserver>) {
        *self
            .inner
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    /// Whether a renewal round-trip is currently executing.
    pub fn is_refreshing(&self) -> bool {
        self.inner.lock_state().ticket.is_some()
    }

    /// End the current epoch.
    ///
    /// A renewal already in flight will neither persist its result nor
    /// signal the observer. Its waiters receive `RefreshFailed` now, and
    /// the next [`refresh`](Self::refresh) starts a new attempt instead
    /// of joining it.
    pub fn invalidate(&self) {
        let stale = {
            let mut state = self.inner.lock_state();
            state.epoch += 1;
            state.ticket.take()
        };

        if let Some(ticket) = stale {
            debug!(waiters = ticket.waiters.len(), "Invalidated in-flight renewal");
            let outcome: Outcome = Err(AuthError::refresh_failed("session ended during renewal"));
            for waiter in ticket.waiters {
                let _ = waiter.send(outcome.clone());
            }
        }
    }

    /// Obtain a renewed credential pair, sharing any renewal in progress.
    ///
    /// On success the new pair has already been saved to the store. On
    /// failure the store has been cleared and the observer told to end
    /// the session. Failures are never retried here.
    ///
    /// Must be called from within a Tokio runtime: the round-trip runs on
    /// its own task so that dropping one caller does not strand the rest.
    ///
    /// # Errors
    ///
    /// Always [`AuthError::RefreshFailed`].
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<CredentialPair> {
        let (tx, rx) = oneshot::channel();

        let started_epoch = {
            let mut state = self.inner.lock_state();
            match state.ticket.as_mut() {
                Some(ticket) => {
                    ticket.waiters.push(tx);
                    debug!(waiters = ticket.waiters.len(), "Joined in-flight renewal");
                    None
                }
                None => {
                    state.ticket = Some(RefreshTicket { waiters: vec![tx] });
                    Some(state.epoch)
                }
            }
        };

        if let Some(epoch) = started_epoch {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run(epoch).await });
        }

        match rx.await {
            Ok(outcome) => outcome.map_err(Error::from),
            Err(_) => Err(AuthError::refresh_failed("renewal attempt was abandoned").into()),
        }
    }
}

impl CoordinatorInner {
    fn lock_state(&self) -> MutexGuard<'_, TicketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observer(&self) -> Option<Arc<dyn SessionObserver>> {
        self.observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    async fn run(&self, epoch: u64) {
        info!("Renewing credentials");
        let outcome = self.attempt().await;

        // Settle and close the ticket in one critical section so an
        // invalidation cannot slip in between the epoch check and the write.
        let (outcome, waiters) = {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                // `invalidate` already answered this attempt's waiters.
                debug!("Discarding renewal from an ended session");
                return;
            }
            let outcome = self.settle(outcome);
            let waiters = state.ticket.take().unwrap_or_default().waiters;
            (outcome, waiters)
        };

        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "Renewal settled");
        for waiter in waiters {
            // A waiter that stopped listening has nothing to be told.
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn attempt(&self) -> Outcome {
        let stored = self
            .store
            .load()
            .map_err(|e| AuthError::refresh_failed(format!("could not read credentials: {}", e)))?;

        let refresh = stored
            .map(|pair| pair.refresh)
            .ok_or_else(|| AuthError::refresh_failed("no renewal token available"))?;

        self.renewer.renew(&refresh).await.map_err(|e| match e {
            Error::Auth(failed @ AuthError::RefreshFailed { .. }) => failed,
            other => AuthError::refresh_failed(other.to_string()),
        })
    }

    /// Apply a fresh outcome to the store and observer.
    fn settle(&self, outcome: Outcome) -> Outcome {
        match outcome {
            Ok(pair) => match self.store.save(&pair) {
                Ok(()) => {
                    info!("Credentials renewed");
                    match self.observer().map(|observer| observer.renewed(&pair)) {
                        Some(Err(rejected)) => self.fail(AuthError::refresh_failed(format!(
                            "renewed credentials were rejected: {}",
                            rejected
                        ))),
                        _ => Ok(pair),
                    }
                }
                Err(e) => self.fail(AuthError::refresh_failed(format!(
                    "could not persist renewed credentials: {}",
                    e
                ))),
            },
            Err(error) => self.fail(error),
        }
    }

    fn fail(&self, error: AuthError) -> Outcome {
        warn!(error = %error, "Credential renewal failed, ending session");
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Could not clear credentials after failed renewal");
        }
        if let Some(observer) = self.observer() {
            observer.renewal_failed(&error);
        }
        Err(error)
    }
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("store", &self.inner.store)
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Renewer that blocks until released, then answers with `result`.
    struct GatedRenewer {
        calls: AtomicUsize,
        gate: Notify,
        result: std::result::Result<(&'static str, &'static str), &'static str>,
    }

    impl GatedRenewer {
        fn succeeding(access: &'static str, refresh: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
                result: Ok((access, refresh)),
            })
        }

        fn failing(reason: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
                result: Err(reason),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Renewer for GatedRenewer {
        async fn renew(&self, refresh: &RefreshToken) -> Result<CredentialPair> {
            assert_eq!(refresh.as_str(), "R1");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            match self.result {
                Ok((access, refresh)) => Ok(CredentialPair::new(access, refresh)),
                Err(reason) => Err(AuthError::refresh_failed(reason).into()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        renewed: AtomicUsize,
        failed: AtomicUsize,
        reject: bool,
    }

    impl SessionObserver for RecordingObserver {
        fn renewed(&self, _pair: &CredentialPair) -> std::result::Result<(), AuthError> {
            self.renewed.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(AuthError::malformed("not a token"));
            }
            Ok(())
        }

        fn renewal_failed(&self, _error: &AuthError) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stored(access: &str, refresh: &str) -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_pair(&CredentialPair::new(access, refresh)))
    }

    fn coordinator(
        renewer: Arc<GatedRenewer>,
        store: Arc<MemoryStore>,
    ) -> (RefreshCoordinator, Arc<RecordingObserver>) {
        with_observer(renewer, store, RecordingObserver::default())
    }

    fn with_observer(
        renewer: Arc<GatedRenewer>,
        store: Arc<MemoryStore>,
        observer: RecordingObserver,
    ) -> (RefreshCoordinator, Arc<RecordingObserver>) {
        let coordinator = RefreshCoordinator::new(renewer, store);
        let observer = Arc::new(observer);
        let weak: Weak<RecordingObserver> = Arc::downgrade(&observer);
        coordinator.set_observer(weak);
        (coordinator, observer)
    }

    /// Let spawned tasks and joined callers reach their await points.
    async fn settle_tasks() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_renewal() {
        let renewer = GatedRenewer::succeeding("A2", "R2");
        let store = stored("A1", "R1");
        let (coordinator, observer) = coordinator(renewer.clone(), store.clone());

        let callers: Vec<_> = (0..5)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.refresh().await })
            })
            .collect();

        settle_tasks().await;
        assert!(coordinator.is_refreshing());
        assert_eq!(renewer.calls(), 1);

        renewer.gate.notify_one();
        for caller in callers {
            let pair = caller.await.unwrap().unwrap();
            assert_eq!(pair, CredentialPair::new("A2", "R2"));
        }

        assert_eq!(renewer.calls(), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(store.load().unwrap(), Some(CredentialPair::new("A2", "R2")));
        assert_eq!(observer.renewed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter_and_clears_store() {
        let renewer = GatedRenewer::failing("Token is invalid or expired");
        let store = stored("A1", "R1");
        let (coordinator, observer) = coordinator(renewer.clone(), store.clone());

        let callers: Vec<_> = (0..3)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.refresh().await })
            })
            .collect();

        settle_tasks().await;
        renewer.gate.notify_one();

        for caller in callers {
            let err = caller.await.unwrap().unwrap_err();
            assert!(matches!(
                err,
                Error::Auth(AuthError::RefreshFailed { ref reason }) if reason == "Token is invalid or expired"
            ));
        }

        assert_eq!(renewer.calls(), 1);
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(observer.failed.load(Ordering::SeqCst), 1);
        assert_eq!(observer.renewed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_network() {
        let renewer = GatedRenewer::succeeding("A2", "R2");
        let store = Arc::new(MemoryStore::new());
        let (coordinator, observer) = coordinator(renewer.clone(), store);

        let err = coordinator.refresh().await.unwrap_err();

        assert!(matches!(err, Error::Auth(AuthError::RefreshFailed { .. })));
        assert_eq!(renewer.calls(), 0);
        assert_eq!(observer.failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn next_refresh_after_settle_starts_fresh_attempt() {
        let renewer = GatedRenewer::succeeding("A2", "R1");
        let store = stored("A1", "R1");
        let (coordinator, _observer) = coordinator(renewer.clone(), store);

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        settle_tasks().await;
        renewer.gate.notify_one();
        first.await.unwrap().unwrap();

        let second = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        settle_tasks().await;
        renewer.gate.notify_one();
        second.await.unwrap().unwrap();

        assert_eq!(renewer.calls(), 2);
    }

    #[tokio::test]
    async fn invalidated_renewal_is_discarded() {
        let renewer = GatedRenewer::succeeding("A2", "R2");
        let store = stored("A1", "R1");
        let (coordinator, observer) = coordinator(renewer.clone(), store.clone());

        let caller = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        settle_tasks().await;

        coordinator.invalidate();
        store.clear().unwrap();
        renewer.gate.notify_one();

        let err = caller.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::RefreshFailed { .. })));
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(observer.renewed.load(Ordering::SeqCst), 0);
        assert_eq!(observer.failed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_after_invalidate_starts_new_attempt() {
        let renewer = GatedRenewer::succeeding("A2", "R2");
        let store = stored("A1", "R1");
        let (coordinator, observer) = coordinator(renewer.clone(), store.clone());

        let stale = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        settle_tasks().await;

        coordinator.invalidate();
        let err = stale.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::RefreshFailed { .. })));
        assert!(!coordinator.is_refreshing());

        let fresh = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        settle_tasks().await;
        assert_eq!(renewer.calls(), 2);

        renewer.gate.notify_one();
        renewer.gate.notify_one();

        assert_eq!(fresh.await.unwrap().unwrap(), CredentialPair::new("A2", "R2"));
        assert_eq!(store.load().unwrap(), Some(CredentialPair::new("A2", "R2")));
        assert_eq!(observer.renewed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_renewed_pair_fails_every_waiter() {
        let renewer = GatedRenewer::succeeding("garbage", "R2");
        let store = stored("A1", "R1");
        let observer = RecordingObserver {
            reject: true,
            ..Default::default()
        };
        let (coordinator, observer) = with_observer(renewer.clone(), store.clone(), observer);

        let callers: Vec<_> = (0..2)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.refresh().await })
            })
            .collect();
        settle_tasks().await;
        renewer.gate.notify_one();

        for caller in callers {
            let err = caller.await.unwrap().unwrap_err();
            assert!(matches!(err, Error::Auth(AuthError::RefreshFailed { .. })));
        }
        assert_eq!(store.load().unwrap(), None);
        assert_eq!(observer.failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_initiator_does_not_strand_waiters() {
        let renewer = GatedRenewer::succeeding("A2", "R2");
        let store = stored("A1", "R1");
        let (coordinator, _observer) = coordinator(renewer.clone(), store);

        let initiator = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        settle_tasks().await;
        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        settle_tasks().await;

        initiator.abort();
        renewer.gate.notify_one();

        assert_eq!(
            waiter.await.unwrap().unwrap(),
            CredentialPair::new("A2", "R2")
        );
        assert_eq!(renewer.calls(), 1);
    }
}
