//! Process-wide session state. The context hydrates once from the durable
//! store, is the only component that moves the state machine, and publishes
//! every transition on a `watch` channel so the navigator (and anything else)
//! can react. Rejections announced by the dispatcher are folded into the state
//! before it is read, whichever caller made the rejected request.
//!
//! ```text
//! Initializing ──▶ Unauthenticated ◀──▶ Authenticated
//!        └──────────────────────────────────▲
//! ```

use crate::console::{
    dispatcher::Expiry,
    errors::ConsoleError,
    gateway::CredentialGateway,
    store::SessionStore,
    types::{Credential, UserInfo},
};
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::watch;
use tracing::{debug, info, instrument};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Before the stored session has been read; guards must wait.
    Initializing,
    Unauthenticated,
    Authenticated(UserInfo),
}

impl SessionState {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Initializing)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub const fn user(&self) -> Option<&UserInfo> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

pub struct SessionContext {
    store: Arc<SessionStore>,
    gateway: CredentialGateway,
    state: watch::Sender<SessionState>,
    expirations: watch::Receiver<Expiry>,
    // last expiry count folded into the state
    absorbed: AtomicU64,
    // message of an expiry no navigator has picked up yet
    unreported: Mutex<Option<String>>,
}

impl SessionContext {
    /// Creates a context in `Initializing`; call [`Self::initialize`] before
    /// any guard decision.
    #[must_use]
    pub fn new(store: Arc<SessionStore>, gateway: CredentialGateway) -> Self {
        let (state, _) = watch::channel(SessionState::Initializing);
        let expirations = gateway.expirations();
        let absorbed = AtomicU64::new(expirations.borrow().count);
        Self {
            store,
            gateway,
            state,
            expirations,
            absorbed,
            unreported: Mutex::new(None),
        }
    }

    /// Creates and hydrates in one step.
    #[must_use]
    pub fn start(store: Arc<SessionStore>, gateway: CredentialGateway) -> Self {
        let context = Self::new(store, gateway);
        context.initialize();
        context
    }

    /// Reads the stored session once. No-op once the context has settled.
    pub fn initialize(&self) -> SessionState {
        if !self.state.borrow().is_loading() {
            return self.state();
        }

        let next = match self.store.read() {
            Some(session) => SessionState::Authenticated(session.user()),
            None => SessionState::Unauthenticated,
        };
        debug!(authenticated = next.is_authenticated(), "session hydrated");
        self.transition(next.clone());
        next
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.absorb_expirations();
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.absorb_expirations();
        self.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn user(&self) -> Option<UserInfo> {
        self.absorb_expirations();
        self.state.borrow().user().cloned()
    }

    /// Takes the message of a dispatcher-announced expiry that signed this
    /// context out and has not been taken yet.
    pub fn take_expiry(&self) -> Option<String> {
        self.absorb_expirations();
        self.unreported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Signs in through the gateway and persists the session.
    ///
    /// On failure the store is cleared, the state becomes `Unauthenticated`
    /// and the gateway error is returned unchanged.
    ///
    /// # Errors
    /// Any error raised by [`CredentialGateway::login`].
    #[instrument(skip_all, fields(username = %credential.username))]
    pub async fn login(&self, credential: &Credential) -> Result<UserInfo, ConsoleError> {
        match self.gateway.login(credential).await {
            Ok(session) => {
                // rejections announced so far belong to the previous session
                self.settle_expirations();
                self.store.write(&session);
                let user = session.user();
                info!(role = %user.role, "signed in");
                self.transition(SessionState::Authenticated(user.clone()));
                Ok(user)
            }
            Err(err) => {
                self.store.clear();
                self.transition(SessionState::Unauthenticated);
                Err(err)
            }
        }
    }

    /// Local sign-out; the service is not contacted.
    pub fn logout(&self) {
        self.settle_expirations();
        self.store.clear();
        info!("signed out");
        self.transition(SessionState::Unauthenticated);
    }

    /// Reaction to `SessionExpired`: the dispatcher already cleared the store,
    /// clear again in case a write raced it, and settle to `Unauthenticated`.
    pub fn expire(&self) {
        self.settle_expirations();
        self.store.clear();
        if self.state.borrow().is_authenticated() {
            info!("session expired");
        }
        self.transition(SessionState::Unauthenticated);
    }

    fn absorb_expirations(&self) {
        let announced = self.expirations.borrow().clone();
        if self.absorbed.swap(announced.count, Ordering::AcqRel) == announced.count {
            return;
        }
        if !self.state.borrow().is_authenticated() {
            return;
        }

        info!("session expired");
        *self.unreported.lock().unwrap_or_else(PoisonError::into_inner) = Some(announced.message);
        self.transition(SessionState::Unauthenticated);
    }

    /// Marks every announced expiry as handled without touching the state.
    fn settle_expirations(&self) {
        self.absorbed
            .store(self.expirations.borrow().count, Ordering::Release);
        self.unreported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn transition(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SessionContext")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
