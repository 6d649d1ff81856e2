use crate::store::{DirectoryError, DirectoryResult, UserDirectory};
use crate::types::{DirectoryFile, NewUser, normalize_email};
use gatehouse_session::{AppUser, AuthorizationGate, GateError, UserId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
pub(crate) struct DirectoryState {
    users: BTreeMap<String, AppUser>,
}

impl DirectoryState {
    pub(crate) fn from_file(file: DirectoryFile) -> DirectoryResult<Self> {
        let mut state = Self::default();
        for user in file.users {
            state.insert(user)?;
        }
        Ok(state)
    }

    pub(crate) fn to_file(&self) -> DirectoryFile {
        DirectoryFile {
            users: self.users.values().cloned().collect(),
        }
    }

    fn next_id(&self) -> UserId {
        self.users
            .values()
            .map(|user| user.id)
            .max()
            .map_or(1, |id| id + 1)
    }

    fn insert(&mut self, mut user: AppUser) -> DirectoryResult<AppUser> {
        if user.name.trim().is_empty() {
            return Err(DirectoryError::InvalidInput(
                "user name must not be empty".to_string(),
            ));
        }
        let key = normalize_email(&user.email).ok_or_else(|| {
            DirectoryError::InvalidInput(format!("not an email address: {:?}", user.email))
        })?;
        if self.users.contains_key(&key) {
            return Err(DirectoryError::Conflict(format!(
                "email already registered: {key}"
            )));
        }
        if self.users.values().any(|existing| existing.id == user.id) {
            return Err(DirectoryError::Conflict(format!(
                "user id already registered: {}",
                user.id
            )));
        }
        user.email = key.clone();
        self.users.insert(key, user.clone());
        Ok(user)
    }
}

/// In-process user directory.
#[derive(Clone, Debug, Default)]
pub struct MemoryUserDirectory {
    inner: Arc<Mutex<DirectoryState>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = AppUser>) -> DirectoryResult<Self> {
        let state = DirectoryState::from_file(DirectoryFile {
            users: users.into_iter().collect(),
        })?;
        Ok(Self::from_state(state))
    }

    pub(crate) fn from_state(state: DirectoryState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub(crate) fn snapshot(&self) -> DirectoryResult<DirectoryFile> {
        Ok(self.state()?.to_file())
    }

    fn state(&self) -> DirectoryResult<MutexGuard<'_, DirectoryState>> {
        self.inner
            .lock()
            .map_err(|_| DirectoryError::Backend("memory directory mutex poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> DirectoryResult<Option<AppUser>> {
        let Some(key) = normalize_email(email) else {
            return Ok(None);
        };
        Ok(self.state()?.users.get(&key).cloned())
    }

    async fn list_users(&self) -> DirectoryResult<Vec<AppUser>> {
        Ok(self.state()?.users.values().cloned().collect())
    }

    async fn insert_user(&self, user: AppUser) -> DirectoryResult<AppUser> {
        self.state()?.insert(user)
    }

    async fn register_user(&self, user: NewUser) -> DirectoryResult<AppUser> {
        let mut state = self.state()?;
        let id = state.next_id();
        state.insert(AppUser::new(id, user.name, user.email, user.role))
    }

    async fn remove_user(&self, email: &str) -> DirectoryResult<AppUser> {
        let key = normalize_email(email).unwrap_or_else(|| email.trim().to_string());
        self.state()?
            .users
            .remove(&key)
            .ok_or(DirectoryError::NotFound { email: key })
    }
}

#[async_trait::async_trait]
impl AuthorizationGate for MemoryUserDirectory {
    async fn lookup(&self, email: &str) -> Result<Option<AppUser>, GateError> {
        Ok(self.find_by_email(email).await?)
    }
}
