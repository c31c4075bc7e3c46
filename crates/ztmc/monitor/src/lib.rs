//! ZTMC Monitor - Central monitoring: durable audit trail + live metrics
//!
//! Every component writes its events here. The append-only log is the
//! source of truth; the aggregate counters are a cache that can always be
//! rebuilt by replaying the log from an empty state.

#![deny(unsafe_code)]

mod sink;

pub use sink::{EventSink, FileEventSink, MemoryEventSink};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use ztmc_types::{EventRecord, MetricsSnapshot};

/// Bounded retries for the audit append before escalating.
const APPEND_ATTEMPTS: u32 = 3;
const APPEND_RETRY_DELAY: Duration = Duration::from_millis(25);

struct MonitorInner {
    sink: Box<dyn EventSink>,
    metrics: MetricsSnapshot,
    metrics_path: Option<PathBuf>,
}

/// The single serialization point of the pipeline.
///
/// All appends and metrics mutations pass through one critical section, so a
/// [`CentralMonitor::snapshot`] is always consistent with some prefix of the
/// log. The lock is a `tokio` mutex because the append itself is async; no
/// adapter or PDP work ever runs under it.
pub struct CentralMonitor {
    inner: Mutex<MonitorInner>,
    alarm: AtomicBool,
}

impl CentralMonitor {
    /// Monitor over an arbitrary sink, starting from zeroed metrics.
    pub fn new(sink: Box<dyn EventSink>, metrics_path: Option<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(MonitorInner {
                sink,
                metrics: MetricsSnapshot::default(),
                metrics_path,
            }),
            alarm: AtomicBool::new(false),
        }
    }

    /// In-memory monitor for tests and embedded use.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryEventSink::new()), None)
    }

    /// Open the file-backed monitor, rebuilding metrics by replaying the
    /// existing log (crash recovery: the metrics side file is only a cache).
    pub async fn open(
        log_path: impl Into<PathBuf>,
        metrics_path: Option<PathBuf>,
    ) -> Result<Self, MonitorError> {
        let sink = FileEventSink::new(log_path).await?;
        let records = sink.read_all().await?;
        let metrics = Self::replay(records.iter());

        info!(
            events = records.len(),
            access_requests = metrics.total_access_requests,
            "central monitor opened, metrics rebuilt from log"
        );

        let monitor = Self {
            inner: Mutex::new(MonitorInner {
                sink: Box::new(sink),
                metrics,
                metrics_path,
            }),
            alarm: AtomicBool::new(false),
        };
        monitor.persist_current_metrics().await;
        Ok(monitor)
    }

    /// Fold a sequence of records into fresh counters. This is the recovery
    /// procedure: replaying the full log must reproduce the live metrics.
    pub fn replay<'a>(records: impl IntoIterator<Item = &'a EventRecord>) -> MetricsSnapshot {
        let mut metrics = MetricsSnapshot::default();
        for record in records {
            metrics.apply(record);
        }
        metrics
    }

    /// Append one record to the log, then update and persist the metrics —
    /// all under a single critical section.
    ///
    /// The append is retried a bounded number of times. If it still fails,
    /// the monitor raises the process-level audit alarm and returns the
    /// error without touching the counters: metrics must never get ahead of
    /// the log.
    pub async fn record(&self, record: EventRecord) -> Result<(), MonitorError> {
        let mut inner = self.inner.lock().await;

        let mut last_error: Option<MonitorError> = None;
        for attempt in 1..=APPEND_ATTEMPTS {
            match inner.sink.append(&record).await {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "audit append failed");
                    last_error = Some(err);
                    if attempt < APPEND_ATTEMPTS {
                        tokio::time::sleep(APPEND_RETRY_DELAY * attempt).await;
                    }
                }
            }
        }

        if let Some(err) = last_error {
            self.alarm.store(true, Ordering::SeqCst);
            error!(
                kind = %record.kind,
                user = %record.user,
                error = %err,
                "audit trail unavailable after {APPEND_ATTEMPTS} attempts, raising alarm"
            );
            return Err(MonitorError::AuditWrite {
                attempts: APPEND_ATTEMPTS,
                last_error: err.to_string(),
            });
        }

        inner.metrics.apply(&record);

        if let Some(path) = inner.metrics_path.clone() {
            let metrics = inner.metrics.clone();
            if let Err(err) = Self::write_metrics_file(&path, &metrics).await {
                // The log already has the event; the side file is a cache.
                warn!(path = %path.display(), error = %err, "failed to persist metrics file");
            }
        }

        Ok(())
    }

    /// Point-in-time deep copy of the counters, never a live view.
    pub async fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().await.metrics.clone()
    }

    /// The full audit trail in append order.
    pub async fn events(&self) -> Result<Vec<EventRecord>, MonitorError> {
        self.inner.lock().await.sink.read_all().await
    }

    /// Latched once an audit append has exhausted its retries.
    pub fn alarm_raised(&self) -> bool {
        self.alarm.load(Ordering::SeqCst)
    }

    async fn persist_current_metrics(&self) {
        let inner = self.inner.lock().await;
        if let Some(path) = inner.metrics_path.clone() {
            let metrics = inner.metrics.clone();
            drop(inner);
            if let Err(err) = Self::write_metrics_file(&path, &metrics).await {
                warn!(path = %path.display(), error = %err, "failed to persist metrics file");
            }
        }
    }

    async fn write_metrics_file(
        path: &PathBuf,
        metrics: &MetricsSnapshot,
    ) -> Result<(), MonitorError> {
        let json = serde_json::to_vec_pretty(metrics)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Monitoring-related errors.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("audit log unavailable after {attempts} attempts: {last_error}")]
    AuditWrite { attempts: u32, last_error: String },
}
