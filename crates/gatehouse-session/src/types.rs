use crate::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub type UserId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An application user record from the allow-list.
///
/// Published snapshots hold their own copy; a new sign-in always yields a new value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl AppUser {
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Provider-level identity. Only the email takes part in authorization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl RawIdentity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            ..Self::default()
        }
    }

    pub fn with_email(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: Some(email.into()),
            display_name: None,
        }
    }

    /// Email usable for an allow-list lookup. Blank emails count as absent.
    pub fn verified_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    RedirectResolution,
    AuthorizationDenied,
    LookupFailure,
    SignInStart,
    SignOut,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RedirectResolution => "redirect_resolution",
            Self::AuthorizationDenied => "authorization_denied",
            Self::LookupFailure => "lookup_failure",
            Self::SignInStart => "sign_in_start",
            Self::SignOut => "sign_out",
        }
    }
}

/// Human-readable error attached to the session state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFault {
    pub kind: FaultKind,
    pub message: String,
}

impl Display for SessionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Initializing,
    Unauthenticated,
    Authenticated,
    Denied,
    Error,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Authenticated => "AUTHENTICATED",
            Self::Denied => "DENIED",
            Self::Error => "ERROR",
        }
    }

    pub fn can_transition_to(&self, next: &SessionPhase) -> bool {
        if self == next {
            return true;
        }

        if *next == SessionPhase::Initializing {
            return false;
        }

        match self {
            SessionPhase::Initializing => true,
            SessionPhase::Unauthenticated | SessionPhase::Authenticated | SessionPhase::Error => {
                true
            }
            SessionPhase::Denied => matches!(
                next,
                SessionPhase::Unauthenticated | SessionPhase::Error
            ),
        }
    }

    /// Rest phases are the ones a settled session can stay in indefinitely.
    pub fn is_rest(&self) -> bool {
        matches!(
            self,
            SessionPhase::Unauthenticated | SessionPhase::Authenticated
        )
    }
}

impl Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of the observable session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub user: Option<AppUser>,
    pub is_loading: bool,
    pub is_initializing: bool,
    pub error: Option<SessionFault>,
    pub phase: SessionPhase,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            is_loading: false,
            is_initializing: true,
            error: None,
            phase: SessionPhase::Initializing,
        }
    }
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|fault| fault.message.as_str())
    }

    pub fn error_kind(&self) -> Option<FaultKind> {
        self.error.as_ref().map(|fault| fault.kind)
    }

    pub(crate) fn enter(&mut self, next: SessionPhase) -> Result<(), SessionError> {
        if !self.phase.can_transition_to(&next) {
            return Err(SessionError::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Clears `is_initializing` once. Leaves `Initializing` for the phase matching `user`.
    pub(crate) fn finish_initializing(&mut self) -> bool {
        if !self.is_initializing {
            return false;
        }
        self.is_initializing = false;
        if self.phase == SessionPhase::Initializing {
            self.phase = if self.user.is_some() {
                SessionPhase::Authenticated
            } else {
                SessionPhase::Unauthenticated
            };
        }
        true
    }
}
