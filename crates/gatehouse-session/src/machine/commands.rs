use super::{SessionStateMachine, enter_phase};
use crate::{SessionError, SessionEventKind, SessionPhase};

impl SessionStateMachine {
    /// Starts a redirect sign-in.
    ///
    /// Success only means the hand-off to the provider began; the resulting identity arrives
    /// through the listener of the machine started after the browser returns.
    pub async fn login(&self) -> Result<(), SessionError> {
        let shared = &self.shared;
        if shared.is_torn_down() {
            return Err(SessionError::ShutDown);
        }

        shared.publish(|state| {
            state.is_loading = true;
            state.error = None;
            if state.phase == SessionPhase::Error {
                enter_phase(state, SessionPhase::Unauthenticated);
            }
        });
        tracing::info!(session.id = %shared.id, "starting redirect sign-in");
        shared.emit(SessionEventKind::SignInStarted);

        match shared.broker.begin_redirect_sign_in().await {
            Ok(()) => {
                shared.publish(|state| state.is_loading = false);
                Ok(())
            }
            Err(error) => {
                let error = SessionError::SignInStart(error);
                tracing::warn!(session.id = %shared.id, %error, "redirect sign-in could not start");
                let fault = shared.fault_for(&error);
                shared.publish(|state| {
                    state.is_loading = false;
                    state.error = fault;
                    if state.user.is_none() && !state.is_initializing {
                        enter_phase(state, SessionPhase::Error);
                    }
                });
                shared.emit(SessionEventKind::SignInFailed {
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Signs out at the provider. On failure the current user is left in place.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let shared = &self.shared;
        if shared.is_torn_down() {
            return Err(SessionError::ShutDown);
        }

        match shared.broker.sign_out().await {
            Ok(()) => {
                shared.generation.raise_fence();
                shared.publish(|state| {
                    state.user = None;
                    if !state.is_initializing {
                        enter_phase(state, SessionPhase::Unauthenticated);
                    }
                });
                tracing::info!(session.id = %shared.id, "signed out");
                shared.emit(SessionEventKind::SignedOut);
                Ok(())
            }
            Err(error) => {
                let error = SessionError::SignOut(error);
                tracing::warn!(session.id = %shared.id, %error, "sign-out failed");
                let fault = shared.fault_for(&error);
                shared.publish(|state| state.error = fault);
                shared.emit(SessionEventKind::SignOutFailed {
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }
}
