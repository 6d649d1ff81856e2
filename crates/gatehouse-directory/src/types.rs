use gatehouse_session::{AppUser, Role};
use serde::{Deserialize, Serialize};

/// Canonical lookup key for an email: trimmed and ASCII-lowercased.
///
/// Returns `None` unless the value has a non-empty local part and domain around one `@`.
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (local, domain) = trimmed.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}

/// On-disk shape of a user directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryFile {
    #[serde(default)]
    pub users: Vec<AppUser>,
}

/// A user to register; the directory assigns the id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_expected_trimmed_lowercase() {
        assert_eq!(
            normalize_email("  Ada@Example.COM "),
            Some("ada@example.com".to_string())
        );
    }

    #[test]
    fn normalize_email_rejects_missing_parts() {
        for raw in ["", "   ", "ada", "@example.com", "ada@", "a@b@c"] {
            assert_eq!(normalize_email(raw), None, "{raw:?} should be rejected");
        }
    }

    #[test]
    fn directory_file_without_users_key_expected_empty() {
        let file: DirectoryFile = serde_json::from_str("{}").expect("empty object should parse");
        assert!(file.users.is_empty());

        let file: DirectoryFile = serde_json::from_str(
            r#"{"users":[{"id":4,"name":"Ada","email":"ada@x.com","role":"admin"}]}"#,
        )
        .expect("users should parse");
        assert_eq!(file.users[0].role, Role::Admin);
    }
}
