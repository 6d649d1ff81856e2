use crate::FaultKind;
use thiserror::Error;

/// Failure reported by the identity provider behind an [`crate::IdentityBroker`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("redirect rejected by provider: {0}")]
    Redirect(String),
    #[error("sign-in blocked before navigation: {0}")]
    Blocked(String),
    #[error("provider unreachable: {0}")]
    Network(String),
    #[error("provider error: {0}")]
    Provider(String),
}

/// Failure of the allow-list lookup itself, as opposed to a negative answer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("user directory unavailable: {0}")]
    Unavailable(String),
    #[error("lookup failed: {0}")]
    Backend(String),
}

/// Top-level error type for the gatehouse-session crate.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("redirect resolution failed: {0}")]
    RedirectResolution(#[source] BrokerError),
    #[error("account not authorized: {email}")]
    AuthorizationDenied { email: String },
    #[error("authorization lookup failed: {0}")]
    LookupFailure(#[source] GateError),
    #[error("sign-in could not be started: {0}")]
    SignInStart(#[source] BrokerError),
    #[error("sign-out failed: {0}")]
    SignOut(#[source] BrokerError),
    #[error("invalid session phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("session machine is shut down")]
    ShutDown,
}

impl SessionError {
    /// The user-facing fault category, if this error is ever published on the session state.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::RedirectResolution(_) => Some(FaultKind::RedirectResolution),
            Self::AuthorizationDenied { .. } => Some(FaultKind::AuthorizationDenied),
            Self::LookupFailure(_) => Some(FaultKind::LookupFailure),
            Self::SignInStart(_) => Some(FaultKind::SignInStart),
            Self::SignOut(_) => Some(FaultKind::SignOut),
            Self::InvalidTransition { .. } | Self::ShutDown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_out_error_display_expected_provider_reason() {
        let error = SessionError::SignOut(BrokerError::Network("timeout".to_string()));
        assert_eq!(
            error.to_string(),
            "sign-out failed: provider unreachable: timeout"
        );
        assert_eq!(error.fault_kind(), Some(FaultKind::SignOut));
    }

    #[test]
    fn shut_down_error_expected_no_fault_kind() {
        assert_eq!(SessionError::ShutDown.fault_kind(), None);
        let denied = SessionError::AuthorizationDenied {
            email: "ghost@x.com".to_string(),
        };
        assert_eq!(denied.fault_kind(), Some(FaultKind::AuthorizationDenied));
    }
}
