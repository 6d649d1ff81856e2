use crate::broker::{IdentityBroker, IdentitySink, IdentitySubscription};
use crate::{BrokerError, RawIdentity};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Counts of provider operations, for assertions and the CLI summary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BrokerCalls {
    pub begin_redirect_sign_in: usize,
    pub consume_redirect_result: usize,
    pub subscribe: usize,
    pub sign_out: usize,
}

#[derive(Debug, Default)]
struct BrokerState {
    current: Option<RawIdentity>,
    pending_redirect: Option<Result<Option<RawIdentity>, BrokerError>>,
    next_sign_in: Option<RawIdentity>,
    listeners: BTreeMap<u64, IdentitySink>,
    next_listener_id: u64,
    begin_sign_in_failure: Option<BrokerError>,
    sign_out_failure: Option<BrokerError>,
    calls: BrokerCalls,
}

impl BrokerState {
    fn notify(&mut self) {
        let current = self.current.clone();
        self.listeners
            .retain(|_, sink| sink.deliver(current.clone()));
    }
}

/// In-process identity provider.
///
/// A completed redirect is held as the pending outcome until the next
/// `consume_redirect_result`, which is how a page returning from the provider sees it.
#[derive(Clone, Debug, Default)]
pub struct MemoryIdentityBroker {
    inner: Arc<Mutex<BrokerState>>,
}

impl MemoryIdentityBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending_redirect(self, identity: RawIdentity) -> Self {
        self.state().pending_redirect = Some(Ok(Some(identity)));
        self
    }

    pub fn with_failed_redirect(self, error: BrokerError) -> Self {
        self.state().pending_redirect = Some(Err(error));
        self
    }

    pub fn with_signed_in(self, identity: RawIdentity) -> Self {
        self.state().current = Some(identity);
        self
    }

    /// Identity the provider will hand back after the next `begin_redirect_sign_in`.
    pub fn set_next_sign_in(&self, identity: Option<RawIdentity>) {
        self.state().next_sign_in = identity;
    }

    pub fn fail_begin_sign_in(&self, error: Option<BrokerError>) {
        self.state().begin_sign_in_failure = error;
    }

    pub fn fail_sign_out(&self, error: Option<BrokerError>) {
        self.state().sign_out_failure = error;
    }

    /// Provider-side sign-in that did not go through a redirect (another tab, token refresh).
    pub fn simulate_sign_in(&self, identity: RawIdentity) {
        let mut state = self.state();
        state.current = Some(identity);
        state.notify();
    }

    /// Provider-side sign-out (session expiry, revocation).
    pub fn simulate_sign_out(&self) {
        let mut state = self.state();
        state.current = None;
        state.notify();
    }

    pub fn current_identity(&self) -> Option<RawIdentity> {
        self.state().current.clone()
    }

    pub fn has_pending_redirect(&self) -> bool {
        self.state().pending_redirect.is_some()
    }

    pub fn listener_count(&self) -> usize {
        let mut state = self.state();
        state.listeners.retain(|_, sink| !sink.is_closed());
        state.listeners.len()
    }

    pub fn calls(&self) -> BrokerCalls {
        self.state().calls.clone()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl IdentityBroker for MemoryIdentityBroker {
    async fn begin_redirect_sign_in(&self) -> Result<(), BrokerError> {
        let mut state = self.state();
        state.calls.begin_redirect_sign_in += 1;
        if let Some(error) = state.begin_sign_in_failure.clone() {
            return Err(error);
        }
        let returning = state.next_sign_in.take();
        state.pending_redirect = Some(Ok(returning));
        Ok(())
    }

    async fn consume_redirect_result(&self) -> Result<Option<RawIdentity>, BrokerError> {
        let mut state = self.state();
        state.calls.consume_redirect_result += 1;
        match state.pending_redirect.take() {
            Some(Ok(Some(identity))) => {
                state.current = Some(identity.clone());
                state.notify();
                Ok(Some(identity))
            }
            Some(Ok(None)) | None => Ok(None),
            Some(Err(error)) => Err(error),
        }
    }

    fn on_identity_changed(&self, sink: IdentitySink) -> IdentitySubscription {
        let mut state = self.state();
        state.calls.subscribe += 1;
        if !sink.deliver(state.current.clone()) {
            return IdentitySubscription::detached();
        }
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.insert(id, sink);

        let inner = Arc::clone(&self.inner);
        IdentitySubscription::new(move || {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&id);
        })
    }

    async fn sign_out(&self) -> Result<(), BrokerError> {
        let mut state = self.state();
        state.calls.sign_out += 1;
        if let Some(error) = state.sign_out_failure.clone() {
            return Err(error);
        }
        state.current = None;
        state.notify();
        Ok(())
    }
}
