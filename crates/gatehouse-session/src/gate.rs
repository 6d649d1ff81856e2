use crate::{AppUser, GateError};

/// Maps a verified email to a known application user.
#[async_trait::async_trait]
pub trait AuthorizationGate: Send + Sync {
    /// `Ok(None)` means the email is not on the allow-list; `Err` means the check itself failed.
    async fn lookup(&self, email: &str) -> Result<Option<AppUser>, GateError>;
}
