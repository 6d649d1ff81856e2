use crate::memory::{DirectoryState, MemoryUserDirectory};
use crate::store::{DirectoryError, DirectoryResult, UserDirectory};
use crate::types::{DirectoryFile, NewUser};
use gatehouse_session::{AppUser, AuthorizationGate, GateError};
use std::fs;
use std::path::{Path, PathBuf};

/// User directory backed by one JSON file, rewritten atomically after every mutation.
#[derive(Clone, Debug)]
pub struct FsUserDirectory {
    path: PathBuf,
    inner: MemoryUserDirectory,
}

impl FsUserDirectory {
    /// Loads `path`, or starts empty when the file does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> DirectoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let raw = fs::read(&path).map_err(|err| {
                DirectoryError::Backend(format!("read directory file failed: {err}"))
            })?;
            let file = serde_json::from_slice::<DirectoryFile>(&raw)
                .map_err(|err| DirectoryError::Serialization(err.to_string()))?;
            DirectoryState::from_file(file)?
        } else {
            DirectoryState::default()
        };

        Ok(Self {
            path,
            inner: MemoryUserDirectory::from_state(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> DirectoryResult<()> {
        let snapshot = self.inner.snapshot()?;
        let raw = serde_json::to_vec_pretty(&snapshot)
            .map_err(|err| DirectoryError::Serialization(err.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                DirectoryError::Backend(format!("create directory root failed: {err}"))
            })?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|err| {
            DirectoryError::Backend(format!("write directory file failed: {err}"))
        })?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            DirectoryError::Backend(format!("rename directory file failed: {err}"))
        })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserDirectory for FsUserDirectory {
    async fn find_by_email(&self, email: &str) -> DirectoryResult<Option<AppUser>> {
        self.inner.find_by_email(email).await
    }

    async fn list_users(&self) -> DirectoryResult<Vec<AppUser>> {
        self.inner.list_users().await
    }

    async fn insert_user(&self, user: AppUser) -> DirectoryResult<AppUser> {
        let inserted = self.inner.insert_user(user).await?;
        self.persist()?;
        Ok(inserted)
    }

    async fn register_user(&self, user: NewUser) -> DirectoryResult<AppUser> {
        let registered = self.inner.register_user(user).await?;
        self.persist()?;
        Ok(registered)
    }

    async fn remove_user(&self, email: &str) -> DirectoryResult<AppUser> {
        let removed = self.inner.remove_user(email).await?;
        self.persist()?;
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl AuthorizationGate for FsUserDirectory {
    async fn lookup(&self, email: &str) -> Result<Option<AppUser>, GateError> {
        Ok(self.find_by_email(email).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_session::Role;

    #[tokio::test(flavor = "current_thread")]
    async fn fs_directory_reopen_restores_users() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let path = tmp.path().join("nested").join("users.json");
        let directory = FsUserDirectory::open(&path).expect("fs directory should open");

        let added = directory
            .register_user(NewUser::new("Ada", "ada@x.com", Role::Admin))
            .await
            .expect("register should succeed");
        drop(directory);

        let reopened = FsUserDirectory::open(&path).expect("fs directory should reopen");
        let found = reopened
            .find_by_email("ada@x.com")
            .await
            .expect("lookup should succeed");
        assert_eq!(found, Some(added));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_file_expected_serialization_error() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let path = tmp.path().join("users.json");
        fs::write(&path, b"{not json").expect("seed file should write");
        assert!(matches!(
            FsUserDirectory::open(&path),
            Err(DirectoryError::Serialization(_))
        ));
    }

    #[test]
    fn duplicate_emails_in_file_expected_conflict() {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        let path = tmp.path().join("users.json");
        fs::write(
            &path,
            br#"{"users":[
                {"id":1,"name":"Ada","email":"ada@x.com","role":"admin"},
                {"id":2,"name":"Ada Again","email":"ADA@x.com","role":"member"}
            ]}"#,
        )
        .expect("seed file should write");
        assert!(matches!(
            FsUserDirectory::open(&path),
            Err(DirectoryError::Conflict(_))
        ));
    }
}
