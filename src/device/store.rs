//! Device state stores

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::{StateRecord, StateStore};

/// Pick the newest record for a serial number
fn newest<'a>(
    records: impl IntoIterator<Item = &'a StateRecord>,
    serial_number: &str,
) -> Option<StateRecord> {
    records
        .into_iter()
        .filter(|r| r.serial_number == serial_number)
        .max_by_key(|r| r.timestamp)
        .cloned()
}

/// In-process store, used for local runs and tests
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: RwLock<Vec<StateRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<StateRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Record a new sample
    pub async fn insert(&self, record: StateRecord) {
        self.records.write().await.push(record);
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn latest(&self, serial_number: &str) -> Result<Option<StateRecord>> {
        Ok(newest(self.records.read().await.iter(), serial_number))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Store backed by a JSON array of records on disk
///
/// The file is re-read on every query so external writers are picked up.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn latest(&self, serial_number: &str) -> Result<Option<StateRecord>> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading state file {}", self.path.display()))?;
        let records: Vec<StateRecord> = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing state file {}", self.path.display()))?;

        debug!(
            "State file {} holds {} records",
            self.path.display(),
            records.len()
        );

        Ok(newest(&records, serial_number))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
