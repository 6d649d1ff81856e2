use crate::FaultKind;

/// Texts published on [`crate::SessionState::error`], one per fault category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionMessages {
    pub redirect_failed: String,
    pub not_authorized: String,
    pub lookup_failed: String,
    pub sign_in_start_failed: String,
    pub sign_out_failed: String,
}

impl Default for SessionMessages {
    fn default() -> Self {
        Self {
            redirect_failed: "sign-in failed".to_string(),
            not_authorized: "account not authorized".to_string(),
            lookup_failed: "authentication check failed".to_string(),
            sign_in_start_failed: "sign-in could not be started".to_string(),
            sign_out_failed: "sign-out failed".to_string(),
        }
    }
}

impl SessionMessages {
    pub fn for_kind(&self, kind: FaultKind) -> &str {
        match kind {
            FaultKind::RedirectResolution => &self.redirect_failed,
            FaultKind::AuthorizationDenied => &self.not_authorized,
            FaultKind::LookupFailure => &self.lookup_failed,
            FaultKind::SignInStart => &self.sign_in_start_failed,
            FaultKind::SignOut => &self.sign_out_failed,
        }
    }
}

/// Runtime configuration for a session state machine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub messages: SessionMessages,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_messages_defaults_match_fault_taxonomy() {
        let messages = SessionConfig::default().messages;
        assert_eq!(messages.for_kind(FaultKind::RedirectResolution), "sign-in failed");
        assert_eq!(
            messages.for_kind(FaultKind::AuthorizationDenied),
            "account not authorized"
        );
        assert_eq!(
            messages.for_kind(FaultKind::LookupFailure),
            "authentication check failed"
        );
        assert_eq!(messages.for_kind(FaultKind::SignOut), "sign-out failed");
    }
}
