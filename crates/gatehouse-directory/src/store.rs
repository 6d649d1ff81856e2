use crate::types::NewUser;
use gatehouse_session::{AppUser, GateError};

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("user not found: {email}")]
    NotFound { email: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

impl From<DirectoryError> for GateError {
    fn from(error: DirectoryError) -> Self {
        match error {
            DirectoryError::Backend(reason) => GateError::Unavailable(reason),
            other => GateError::Backend(other.to_string()),
        }
    }
}

/// Storage of the application's known users, keyed by normalized email.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Exact match after normalization. Malformed emails find nobody.
    async fn find_by_email(&self, email: &str) -> DirectoryResult<Option<AppUser>>;

    /// All users, ordered by email.
    async fn list_users(&self) -> DirectoryResult<Vec<AppUser>>;

    /// Stores `user` as given. Rejects an email or id that is already taken.
    async fn insert_user(&self, user: AppUser) -> DirectoryResult<AppUser>;

    /// Stores a new user under the next free id.
    async fn register_user(&self, user: NewUser) -> DirectoryResult<AppUser>;

    async fn remove_user(&self, email: &str) -> DirectoryResult<AppUser>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_error_not_found_expected_email_in_message() {
        let error = DirectoryError::NotFound {
            email: "ghost@x.com".to_string(),
        };
        assert_eq!(error.to_string(), "user not found: ghost@x.com");
    }

    #[test]
    fn backend_failure_maps_to_unavailable_gate() {
        let gate: GateError = DirectoryError::Backend("disk gone".to_string()).into();
        assert_eq!(gate, GateError::Unavailable("disk gone".to_string()));

        let gate: GateError = DirectoryError::Serialization("bad json".to_string()).into();
        assert_eq!(
            gate,
            GateError::Backend("serialization failed: bad json".to_string())
        );
    }
}
