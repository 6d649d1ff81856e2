use async_trait::async_trait;
use gatehouse_session::{
    AppUser, AuthorizationGate, GateError, RawIdentity, Role, SessionEvent, SessionEventKind,
    SessionEventSink,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Fixed allow-list with an optional hold on the next lookup of one email.
#[derive(Default)]
pub struct AllowList {
    users: HashMap<String, AppUser>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
    pub started: Notify,
}

impl AllowList {
    pub fn new(users: impl IntoIterator<Item = AppUser>) -> Arc<Self> {
        Arc::new(Self {
            users: users
                .into_iter()
                .map(|user| (user.email.clone(), user))
                .collect(),
            ..Self::default()
        })
    }

    pub fn hold(&self, email: &str) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        self.holds
            .lock()
            .expect("holds mutex")
            .insert(email.to_string(), Arc::clone(&release));
        release
    }
}

#[async_trait]
impl AuthorizationGate for AllowList {
    async fn lookup(&self, email: &str) -> Result<Option<AppUser>, GateError> {
        self.started.notify_one();
        let hold = self.holds.lock().expect("holds mutex").remove(email);
        if let Some(release) = hold {
            release.notified().await;
        }
        Ok(self.users.get(email).cloned())
    }
}

pub fn identity(email: &str) -> RawIdentity {
    RawIdentity::with_email(format!("uid-{email}"), email)
}

pub fn member(id: u64, name: &str, email: &str) -> AppUser {
    AppUser::new(id, name, email, Role::Member)
}

pub fn admin(id: u64, name: &str, email: &str) -> AppUser {
    AppUser::new(id, name, email, Role::Admin)
}

pub type Recorded = Arc<Mutex<Vec<SessionEventKind>>>;

pub fn recording_sink() -> (SessionEventSink, Recorded) {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let observer_recorded = Arc::clone(&recorded);
    let sink = SessionEventSink::with_observer(Arc::new(move |event: &SessionEvent| {
        observer_recorded
            .lock()
            .expect("events mutex")
            .push(event.kind.clone());
    }));
    (sink, recorded)
}

pub fn position(recorded: &Recorded, label: &str) -> Option<usize> {
    recorded
        .lock()
        .expect("events mutex")
        .iter()
        .position(|kind| kind.label() == label)
}
