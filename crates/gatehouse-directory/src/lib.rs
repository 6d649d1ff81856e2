//! Allow-list of application users, usable as the session's [`AuthorizationGate`].
//!
//! [`AuthorizationGate`]: gatehouse_session::AuthorizationGate

pub mod fs;
pub mod memory;
pub mod store;
pub mod types;

pub use fs::FsUserDirectory;
pub use memory::MemoryUserDirectory;
pub use store::{DirectoryError, DirectoryResult, UserDirectory};
pub use types::{DirectoryFile, NewUser, normalize_email};
