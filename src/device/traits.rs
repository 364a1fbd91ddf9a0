//! Collaborator traits for the device cloud

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use skillbridge_shared::codec::ShadowUpdate;

/// One recorded telemetry sample for a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub serial_number: String,
    /// Sort key; the newest record has the largest timestamp
    pub timestamp: i64,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl StateRecord {
    /// Luminosity reading rendered as a string, e.g. `"42"`
    pub fn luminosity(&self) -> Option<String> {
        match self.payload.get("luminosity")? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Key-value store of device state records
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Most recently written record for `serial_number`
    async fn latest(&self, serial_number: &str) -> Result<Option<StateRecord>>;

    /// Human-readable name for this store
    fn name(&self) -> &'static str;
}

/// Fire-and-forget command path to a device
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Publish a desired state for the device behind `endpoint_id`
    ///
    /// Success means the publish was handed off, not that the device applied it.
    async fn publish_desired(&self, endpoint_id: &str, update: &ShadowUpdate) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Outcome of an authorization grant exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    Accepted,
    Refused { reason: String },
}

/// Exchanges an authorization grant for tokens
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    async fn accept_grant(&self, code: &str, grantee_token: &str) -> Result<GrantOutcome>;
}

