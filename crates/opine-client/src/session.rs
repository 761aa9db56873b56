use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use opine_types::models::{FullName, User};

use crate::credential::{Credential, CredentialStore};
use crate::error::{ClientError, Result};
use crate::fetcher::{Fetcher, LoginGrant};

/// Where the session stands.
///
/// `Unknown` → `Verifying` → {`Authenticated`, `Anonymous`}, and
/// `Authenticated` → `Anonymous` on logout or when the server rejects the
/// credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has been checked yet.
    Unknown,
    /// A stored credential exists but the server has not confirmed it.
    Verifying,
    Authenticated(User),
    Anonymous,
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// The attached credential and a counter bumped on every change, so an
/// in-flight verification can tell whether its answer is still about the
/// credential in place.
#[derive(Default)]
struct Slot {
    credential: Option<Credential>,
    generation: u64,
}

/// Owns the credential and the current user.
///
/// UI surfaces read the state through [`SessionStore::state`] or watch it via
/// [`SessionStore::subscribe`]; nothing else holds a copy of the token. Every
/// credential change is pushed to the fetcher before the state changes, so no
/// request issued after a transition can carry a stale token.
pub struct SessionStore<F> {
    fetcher: Arc<F>,
    store: Box<dyn CredentialStore>,
    credential: RwLock<Slot>,
    state: watch::Sender<SessionState>,
    /// Serializes verifications. Callers that queued behind a running one
    /// adopt its result instead of issuing another request.
    verify_gate: Mutex<()>,
    verifications: AtomicU64,
}

impl<F: Fetcher> SessionStore<F> {
    pub fn new(fetcher: Arc<F>, store: impl CredentialStore + 'static) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            fetcher,
            store: Box::new(store),
            credential: RwLock::new(Slot::default()),
            state,
            verify_gate: Mutex::new(()),
            verifications: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.read_slot().credential.clone()
    }

    /// Load the persisted token, if any. No network traffic; the token stays
    /// untrusted until [`verify`](Self::verify) confirms it.
    pub fn restore_credential(&self) -> SessionState {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Cannot read stored credential, starting anonymous: {}", e);
                None
            }
        };

        let next = if stored.is_some() {
            SessionState::Verifying
        } else {
            SessionState::Anonymous
        };
        self.attach(stored, next.clone());
        debug!(state = ?next, "Credential restored");
        next
    }

    /// Confirm the held credential with the server.
    ///
    /// Concurrent calls collapse into one request: whoever gets the gate first
    /// does the work, everyone queued behind it returns the state it produced.
    /// An already authenticated session stays authenticated while the request
    /// is out. If a login or logout replaces the credential meanwhile, the
    /// answer is dropped and the newer state stands.
    pub async fn verify(&self) -> SessionState {
        let seen = self.verifications.load(Ordering::Acquire);
        let _gate = self.verify_gate.lock().await;
        if self.verifications.load(Ordering::Acquire) != seen {
            return self.state();
        }

        let (credential, generation) = {
            let slot = self.read_slot();
            (slot.credential.clone(), slot.generation)
        };

        let state = match credential {
            None => {
                self.set_state(SessionState::Anonymous);
                SessionState::Anonymous
            }
            Some(credential) => {
                let fetched = self.fetcher.fetch_current_user(&credential).await;

                let mut slot = self.write_slot();
                if slot.generation != generation {
                    debug!("Credential changed during verification, result discarded");
                    drop(slot);
                    self.state()
                } else {
                    match fetched {
                        Ok(user) => {
                            info!(user_id = %user.id, "Session verified");
                            let state = SessionState::Authenticated(user);
                            self.set_state(state.clone());
                            state
                        }
                        Err(e) => {
                            warn!("Credential rejected during verification: {}", e);
                            self.forget_locked(&mut slot);
                            SessionState::Anonymous
                        }
                    }
                }
            }
        };

        self.verifications.fetch_add(1, Ordering::AcqRel);
        state
    }

    /// Gate for protected views: verifies, then yields the user or an
    /// `Auth` error.
    pub async fn authorize(&self) -> Result<User> {
        match self.verify().await {
            SessionState::Authenticated(user) => Ok(user),
            _ => Err(ClientError::Auth("login required".into())),
        }
    }

    /// On failure the existing session is left exactly as it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let LoginGrant { credential, user } = match self.fetcher.login(email, password).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!("Login failed: {}", e);
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&credential) {
            warn!("Logged in, but the credential will not survive a restart: {}", e);
        }
        self.attach(Some(credential), SessionState::Authenticated(user.clone()));

        info!(user_id = %user.id, "Logged in");
        Ok(user)
    }

    /// Creates the account only; the caller logs in separately.
    pub async fn register(&self, fullname: &FullName, email: &str, password: &str) -> Result<()> {
        match self.fetcher.register(fullname, email, password).await {
            Ok(()) => {
                info!("Registered {}", email);
                Ok(())
            }
            Err(e) => {
                warn!("Registration failed: {}", e);
                Err(e)
            }
        }
    }

    /// Tell the server (best effort), then drop the local session no matter
    /// what the server said.
    pub async fn logout(&self) {
        if let Some(credential) = self.credential() {
            if let Err(e) = self.fetcher.logout(&credential).await {
                warn!("Logout notification failed, clearing local session anyway: {}", e);
            }
        }
        self.forget();
        info!("Logged out");
    }

    /// Force the session anonymous after the server rejected the credential.
    pub fn expire(&self) {
        if self.credential().is_some() || self.is_authenticated() {
            warn!("Credential expired or revoked, session cleared");
        }
        self.forget();
    }

    /// Route an error from any remote call through the session: an `Auth`
    /// failure expires it, anything else is left to the caller.
    pub fn observe_error(&self, error: &ClientError) {
        if error.is_auth() {
            self.expire();
        }
    }

    fn forget(&self) {
        let mut slot = self.write_slot();
        self.forget_locked(&mut slot);
    }

    /// Clear the credential everywhere and go anonymous, with the slot
    /// already held so nothing can attach in between.
    fn forget_locked(&self, slot: &mut Slot) {
        if let Err(e) = self.store.clear() {
            warn!("Cannot remove stored credential: {}", e);
        }
        Self::replace(&*self.fetcher, slot, None);
        self.set_state(SessionState::Anonymous);
    }

    /// Swap in a credential and the state that goes with it in one step.
    fn attach(&self, credential: Option<Credential>, state: SessionState) {
        let mut slot = self.write_slot();
        Self::replace(&*self.fetcher, &mut slot, credential);
        self.set_state(state);
    }

    fn replace(fetcher: &F, slot: &mut Slot, credential: Option<Credential>) {
        fetcher.set_credential(credential.clone());
        slot.credential = credential;
        slot.generation += 1;
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Slot> {
        self.credential.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Slot> {
        self.credential.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}
