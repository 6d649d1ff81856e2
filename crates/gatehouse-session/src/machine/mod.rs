use crate::broker::IdentitySink;
use crate::events::timestamp_now;
use crate::generation::Generation;
use crate::{
    AppUser, AuthorizationGate, FaultKind, IdentityBroker, IdentitySubscription, SessionConfig,
    SessionError, SessionEvent, SessionEventKind, SessionEventSink, SessionFault, SessionPhase,
    SessionState,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

mod commands;
mod listener;

/// Orchestrates an [`IdentityBroker`] and an [`AuthorizationGate`] into one observable session.
///
/// The machine is the only writer of its [`SessionState`]; readers get immutable snapshots
/// through [`SessionStateMachine::state`] or a `watch` receiver from
/// [`SessionStateMachine::subscribe`].
pub struct SessionStateMachine {
    shared: Arc<Shared>,
    subscription: Mutex<Option<IdentitySubscription>>,
}

pub(crate) struct Shared {
    id: String,
    broker: Arc<dyn IdentityBroker>,
    gate: Arc<dyn AuthorizationGate>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    processed: watch::Sender<u64>,
    events: SessionEventSink,
    sequence_no: AtomicU64,
    generation: Arc<Generation>,
    teardown: watch::Sender<bool>,
}

impl SessionStateMachine {
    /// Runs the startup sequence: the pending redirect is fully consumed before the live
    /// listener is attached. Returns once the listener is attached; the first identity
    /// delivery settles in the background (see [`SessionStateMachine::initialized`]).
    pub async fn start(
        broker: Arc<dyn IdentityBroker>,
        gate: Arc<dyn AuthorizationGate>,
        config: SessionConfig,
    ) -> Self {
        Self::start_with_events(broker, gate, config, SessionEventSink::default()).await
    }

    pub async fn start_with_events(
        broker: Arc<dyn IdentityBroker>,
        gate: Arc<dyn AuthorizationGate>,
        config: SessionConfig,
        events: SessionEventSink,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let (processed, _) = watch::channel(0);
        let (teardown, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            id: Uuid::new_v4().to_string(),
            broker,
            gate,
            config,
            state,
            processed,
            events,
            sequence_no: AtomicU64::new(0),
            generation: Arc::new(Generation::default()),
            teardown,
        });

        shared.resolve_redirect().await;

        let (sink, receiver) = IdentitySink::channel(Arc::clone(&shared.generation));
        tokio::spawn(listener::run(Arc::clone(&shared), receiver));
        let subscription = shared.broker.on_identity_changed(sink);
        tracing::debug!(session.id = %shared.id, "identity listener attached");
        shared.emit(SessionEventKind::ListenerAttached);

        Self {
            shared,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn current_user(&self) -> Option<AppUser> {
        self.shared.state.borrow().user.clone()
    }

    pub fn is_initializing(&self) -> bool {
        self.shared.state.borrow().is_initializing
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<SessionFault> {
        self.shared.state.borrow().error.clone()
    }

    /// Resolves with the first snapshot in which `is_initializing` is false, or with the last
    /// published snapshot once the machine is shut down.
    pub async fn initialized(&self) -> SessionState {
        let mut receiver = self.subscribe();
        tokio::select! {
            _ = receiver.wait_for(|state| !state.is_initializing) => {}
            _ = self.shared.wait_torn_down() => {}
        }
        self.state()
    }

    /// Resolves once every identity change delivered so far has been fully processed.
    pub async fn settled(&self) -> SessionState {
        let target = self.shared.generation.latest_seq();
        let mut processed = self.shared.processed.subscribe();
        let _ = processed.wait_for(|done| *done >= target).await;
        self.state()
    }

    /// Detaches the listener and stops publishing. A pending lookup is abandoned; a forced
    /// sign-out already under way still runs to completion. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        if self.shared.teardown.send_replace(true) {
            return;
        }
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        self.shared.processed.send_replace(u64::MAX);
        tracing::debug!(session.id = %self.shared.id, "session machine shut down");
        self.shared.emit(SessionEventKind::ShutDown);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.is_torn_down()
    }
}

impl Drop for SessionStateMachine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    async fn resolve_redirect(&self) {
        match self.broker.consume_redirect_result().await {
            Ok(identity) => {
                let email = identity
                    .as_ref()
                    .and_then(|identity| identity.verified_email())
                    .map(str::to_string);
                tracing::debug!(
                    session.id = %self.id,
                    redirect.email = email.as_deref().unwrap_or("<none>"),
                    "redirect result consumed"
                );
                self.emit(SessionEventKind::RedirectResolved { email });
            }
            Err(error) => {
                let error = SessionError::RedirectResolution(error);
                tracing::warn!(session.id = %self.id, %error, "redirect result could not be resolved");
                let fault = self.fault_for(&error);
                self.publish(|state| {
                    state.error = fault;
                    enter_phase(state, SessionPhase::Error);
                    state.finish_initializing();
                });
                self.emit(SessionEventKind::RedirectFailed {
                    reason: error.to_string(),
                });
            }
        }
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        *self.teardown.borrow()
    }

    /// Resolves once the machine is shut down.
    pub(crate) async fn wait_torn_down(&self) {
        let mut receiver = self.teardown.subscribe();
        let _ = receiver.wait_for(|down| *down).await;
    }

    /// Applies `update` to the published state. No-op once the machine is torn down.
    pub(crate) fn publish<F>(&self, update: F) -> bool
    where
        F: FnOnce(&mut SessionState),
    {
        if self.is_torn_down() {
            return false;
        }
        self.state.send_modify(update);
        true
    }

    /// The published fault for `error`, worded by the configured messages.
    pub(crate) fn fault_for(&self, error: &SessionError) -> Option<SessionFault> {
        error.fault_kind().map(|kind| self.fault(kind))
    }

    fn fault(&self, kind: FaultKind) -> SessionFault {
        SessionFault {
            kind,
            message: self.config.messages.for_kind(kind).to_string(),
        }
    }

    pub(crate) fn emit(&self, kind: SessionEventKind) {
        if !self.events.is_enabled() {
            return;
        }
        let sequence_no = self.sequence_no.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.emit(SessionEvent {
            sequence_no,
            timestamp: timestamp_now(),
            session_id: self.id.clone(),
            kind,
        });
    }

    pub(crate) fn mark_processed(&self, seq: u64) {
        self.processed.send_if_modified(|done| {
            if seq > *done {
                *done = seq;
                true
            } else {
                false
            }
        });
    }
}

pub(crate) fn enter_phase(state: &mut SessionState, next: SessionPhase) {
    if let Err(error) = state.enter(next) {
        tracing::warn!(%error, "ignoring illegal session phase transition");
    }
}
