use crate::generation::{Generation, Stamp};
use crate::{BrokerError, RawIdentity};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The external identity provider, seen through the four operations the session needs.
#[async_trait::async_trait]
pub trait IdentityBroker: Send + Sync {
    /// Navigates the user to the provider. Completion is observed after the page returns.
    async fn begin_redirect_sign_in(&self) -> Result<(), BrokerError>;

    /// Absorbs the outcome of a redirect that brought the user back, if any.
    async fn consume_redirect_result(&self) -> Result<Option<RawIdentity>, BrokerError>;

    /// Attaches a live listener. Providers deliver the current identity right away and then
    /// every subsequent change, in order, through `sink`.
    fn on_identity_changed(&self, sink: IdentitySink) -> IdentitySubscription;

    async fn sign_out(&self) -> Result<(), BrokerError>;
}

#[derive(Clone, Debug)]
pub(crate) struct IdentityChange {
    pub(crate) identity: Option<RawIdentity>,
    pub(crate) stamp: Stamp,
}

pub(crate) type IdentityChangeReceiver = mpsc::UnboundedReceiver<IdentityChange>;

/// Write end of a listener's single-consumer queue.
#[derive(Clone, Debug)]
pub struct IdentitySink {
    sender: mpsc::UnboundedSender<IdentityChange>,
    generation: Arc<Generation>,
}

impl IdentitySink {
    pub(crate) fn channel(generation: Arc<Generation>) -> (Self, IdentityChangeReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender, generation }, receiver)
    }

    /// Queues an identity change. Returns `false` once the listener is gone.
    pub fn deliver(&self, identity: Option<RawIdentity>) -> bool {
        if self.sender.is_closed() {
            return false;
        }
        let stamp = self.generation.advance();
        self.sender.send(IdentityChange { identity, stamp }).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Handle returned by [`IdentityBroker::on_identity_changed`]. Unsubscribes on drop.
pub struct IdentitySubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl IdentitySubscription {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for IdentitySubscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for IdentitySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentitySubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
