use super::{Shared, enter_phase};
use crate::broker::{IdentityChange, IdentityChangeReceiver};
use crate::generation::Freshness;
use crate::{AppUser, GateError, SessionError, SessionEventKind, SessionPhase};
use std::sync::Arc;

/// Single consumer of the identity-change queue. Each change, including its lookup and any
/// forced sign-out, completes before the next one is taken.
///
/// Exits once the machine is shut down and the change in hand is finished. Only a pending
/// lookup is abandoned at teardown; a forced sign-out is never interrupted.
pub(super) async fn run(shared: Arc<Shared>, mut receiver: IdentityChangeReceiver) {
    loop {
        let change = tokio::select! {
            change = receiver.recv() => change,
            _ = shared.wait_torn_down() => None,
        };
        let Some(change) = change else {
            break;
        };
        if shared.is_torn_down() {
            break;
        }
        let seq = change.stamp.seq;
        handle_change(&shared, change).await;
        shared.mark_processed(seq);
    }
}

async fn handle_change(shared: &Shared, change: IdentityChange) {
    let email = change
        .identity
        .as_ref()
        .and_then(|identity| identity.verified_email())
        .map(str::to_string);
    tracing::debug!(
        session.id = %shared.id,
        change.seq = change.stamp.seq,
        identity.email = email.as_deref().unwrap_or("<none>"),
        "identity changed"
    );
    shared.emit(SessionEventKind::IdentityChanged {
        email: email.clone(),
    });

    match shared.generation.check(change.stamp) {
        Freshness::Current => {}
        Freshness::Superseded => {
            discard_superseded(shared, email);
            return;
        }
        Freshness::Fenced => {
            discard_fenced(shared, email);
            return;
        }
    }

    let Some(email) = email else {
        shared.publish(|state| {
            state.user = None;
            enter_phase(state, SessionPhase::Unauthenticated);
            state.finish_initializing();
        });
        return;
    };

    let outcome = tokio::select! {
        outcome = shared.gate.lookup(&email) => outcome,
        _ = shared.wait_torn_down() => {
            tracing::debug!(session.id = %shared.id, "shut down during lookup; result abandoned");
            return;
        }
    };
    if shared.is_torn_down() {
        return;
    }
    match shared.generation.check(change.stamp) {
        Freshness::Current => {}
        Freshness::Superseded => {
            discard_superseded(shared, Some(email));
            return;
        }
        Freshness::Fenced => {
            discard_fenced(shared, Some(email));
            return;
        }
    }

    match outcome {
        Ok(Some(user)) => grant(shared, email, user),
        Ok(None) => deny(shared, email).await,
        Err(error) => lookup_failed(shared, email, error),
    }
}

fn grant(shared: &Shared, email: String, user: AppUser) {
    tracing::info!(
        session.id = %shared.id,
        user.id = user.id,
        user.role = %user.role,
        "authorization granted"
    );
    let user_id = user.id;
    let role = user.role;
    shared.publish(|state| {
        state.user = Some(user);
        state.error = None;
        enter_phase(state, SessionPhase::Authenticated);
        state.finish_initializing();
    });
    shared.emit(SessionEventKind::AuthorizationGranted {
        email,
        user_id,
        role,
    });
}

async fn deny(shared: &Shared, email: String) {
    tracing::warn!(
        session.id = %shared.id,
        identity.email = %email,
        "identity is not on the allow-list; forcing sign-out"
    );
    let fault = shared.fault_for(&SessionError::AuthorizationDenied {
        email: email.clone(),
    });
    shared.publish(|state| {
        state.user = None;
        state.error = fault;
        enter_phase(state, SessionPhase::Denied);
    });
    shared.emit(SessionEventKind::AuthorizationDenied {
        email: email.clone(),
    });

    match shared.broker.sign_out().await {
        Ok(()) => {
            tracing::info!(session.id = %shared.id, "forced sign-out completed");
            shared.emit(SessionEventKind::ForcedSignOutCompleted { email });
        }
        Err(error) => {
            tracing::warn!(session.id = %shared.id, %error, "forced sign-out failed");
            shared.emit(SessionEventKind::ForcedSignOutFailed {
                email,
                reason: error.to_string(),
            });
        }
    }

    shared.publish(|state| {
        enter_phase(state, SessionPhase::Unauthenticated);
        state.finish_initializing();
    });
}

fn lookup_failed(shared: &Shared, email: String, error: GateError) {
    let error = SessionError::LookupFailure(error);
    tracing::warn!(session.id = %shared.id, %error, "authorization lookup failed");
    let fault = shared.fault_for(&error);
    shared.publish(|state| {
        state.user = None;
        state.error = fault;
        enter_phase(state, SessionPhase::Error);
        state.finish_initializing();
    });
    shared.emit(SessionEventKind::LookupFailed {
        email,
        reason: error.to_string(),
    });
}

fn discard_superseded(shared: &Shared, email: Option<String>) {
    tracing::debug!(session.id = %shared.id, "newer identity change queued; result discarded");
    shared.emit(SessionEventKind::StaleResultDiscarded { email });
}

/// A logout completed after the change was enqueued, so the user stays signed out.
/// The change still counts as delivered for initialization.
fn discard_fenced(shared: &Shared, email: Option<String>) {
    tracing::debug!(session.id = %shared.id, "identity change predates logout; result discarded");
    shared.publish(|state| {
        state.finish_initializing();
    });
    shared.emit(SessionEventKind::StaleResultDiscarded { email });
}
