use crate::{Role, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub sequence_no: u64,
    pub timestamp: String,
    pub session_id: String,
    pub kind: SessionEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEventKind {
    RedirectResolved {
        email: Option<String>,
    },
    RedirectFailed {
        reason: String,
    },
    ListenerAttached,
    IdentityChanged {
        email: Option<String>,
    },
    AuthorizationGranted {
        email: String,
        user_id: UserId,
        role: Role,
    },
    AuthorizationDenied {
        email: String,
    },
    LookupFailed {
        email: String,
        reason: String,
    },
    StaleResultDiscarded {
        email: Option<String>,
    },
    ForcedSignOutCompleted {
        email: String,
    },
    ForcedSignOutFailed {
        email: String,
        reason: String,
    },
    SignInStarted,
    SignInFailed {
        reason: String,
    },
    SignedOut,
    SignOutFailed {
        reason: String,
    },
    ShutDown,
}

impl SessionEventKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RedirectResolved { .. } => "redirect_resolved",
            Self::RedirectFailed { .. } => "redirect_failed",
            Self::ListenerAttached => "listener_attached",
            Self::IdentityChanged { .. } => "identity_changed",
            Self::AuthorizationGranted { .. } => "authorization_granted",
            Self::AuthorizationDenied { .. } => "authorization_denied",
            Self::LookupFailed { .. } => "lookup_failed",
            Self::StaleResultDiscarded { .. } => "stale_result_discarded",
            Self::ForcedSignOutCompleted { .. } => "forced_sign_out_completed",
            Self::ForcedSignOutFailed { .. } => "forced_sign_out_failed",
            Self::SignInStarted => "sign_in_started",
            Self::SignInFailed { .. } => "sign_in_failed",
            Self::SignedOut => "signed_out",
            Self::SignOutFailed { .. } => "sign_out_failed",
            Self::ShutDown => "shut_down",
        }
    }
}

pub trait SessionEventObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

impl<F> SessionEventObserver for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: &SessionEvent) {
        self(event);
    }
}

pub type SharedSessionEventObserver = Arc<dyn SessionEventObserver>;
pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;
pub type SessionEventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

#[derive(Clone, Default)]
pub struct SessionEventSink {
    observer: Option<SharedSessionEventObserver>,
    sender: Option<SessionEventSender>,
}

impl SessionEventSink {
    pub fn with_observer(observer: SharedSessionEventObserver) -> Self {
        Self {
            observer: Some(observer),
            sender: None,
        }
    }

    pub fn with_sender(sender: SessionEventSender) -> Self {
        Self {
            observer: None,
            sender: Some(sender),
        }
    }

    pub fn observer(mut self, observer: SharedSessionEventObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn sender(mut self, sender: SessionEventSender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.observer.is_some() || self.sender.is_some()
    }

    pub fn emit(&self, event: SessionEvent) {
        if let Some(observer) = self.observer.as_ref() {
            observer.on_event(&event);
        }
        if let Some(sender) = self.sender.as_ref() {
            let _ = sender.send(event);
        }
    }
}

pub fn session_event_channel() -> (SessionEventSender, SessionEventReceiver) {
    mpsc::unbounded_channel()
}

pub(crate) fn timestamp_now() -> String {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!(
        "{}.{:03}Z",
        since_epoch.as_secs(),
        since_epoch.subsec_millis()
    )
}
