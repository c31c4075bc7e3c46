//! Event sinks backing the audit trail.

use crate::MonitorError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;
use ztmc_types::EventRecord;

/// Append-only store for audit records.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Durably append one record.
    async fn append(&self, record: &EventRecord) -> Result<(), MonitorError>;

    /// Read the full trail in append order.
    async fn read_all(&self) -> Result<Vec<EventRecord>, MonitorError>;
}

/// File-backed sink: one JSON object per line, append-only.
pub struct FileEventSink {
    path: PathBuf,
}

impl FileEventSink {
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self, MonitorError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventSink for FileEventSink {
    async fn append(&self, record: &EventRecord) -> Result<(), MonitorError> {
        let json = serde_json::to_string(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<EventRecord>, MonitorError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut records = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EventRecord>(&line) {
                Ok(record) => records.push(record),
                Err(error) => {
                    // A torn tail line after a crash is skippable; every
                    // complete record before it is still good.
                    warn!(path = %self.path.display(), %error, "skipping unreadable audit line");
                }
            }
        }

        Ok(records)
    }
}

/// In-memory sink for tests and embedded use.
#[derive(Default)]
pub struct MemoryEventSink {
    records: RwLock<Vec<EventRecord>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.read().clone()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn append(&self, record: &EventRecord) -> Result<(), MonitorError> {
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<EventRecord>, MonitorError> {
        Ok(self.records.read().clone())
    }
}
