//! Session and authorization state machine for Gatehouse.
//!
//! An identity provider ([`IdentityBroker`]) establishes who the user is; an allow-list
//! ([`AuthorizationGate`]) decides whether that user belongs to the application. The
//! [`SessionStateMachine`] sequences the two and publishes one [`SessionState`] that UI code
//! reads without ever writing.

pub mod broker;
pub mod config;
pub mod errors;
pub mod events;
pub mod gate;
mod generation;
pub mod machine;
pub mod memory;
pub mod types;

pub use broker::{IdentityBroker, IdentitySink, IdentitySubscription};
pub use config::*;
pub use errors::*;
pub use events::{
    SessionEvent, SessionEventKind, SessionEventObserver, SessionEventReceiver,
    SessionEventSender, SessionEventSink, SharedSessionEventObserver, session_event_channel,
};
pub use gate::AuthorizationGate;
pub use machine::SessionStateMachine;
pub use memory::{BrokerCalls, MemoryIdentityBroker};
pub use types::*;
