//! Device cloud collaborators
//!
//! This module provides:
//! - The state store queried for the latest device record
//! - The command channel that publishes desired state to a device
//! - The authorization provider used when a grant is accepted

mod auth;
mod mqtt;
mod store;
mod traits;

pub use auth::AcceptAllGrants;
pub use mqtt::{shadow_topic, MqttCommandChannel, MqttConfig};
pub use store::{FileStateStore, MemoryStateStore};
pub use traits::{AuthorizationProvider, CommandChannel, GrantOutcome, StateRecord, StateStore};
