//! Persistence sink: best-effort storage of successful scores.
//!
//! # Responsibilities
//! - Define the write contract for scored items
//! - Provide a no-op sink and a JSON-file sink with upsert semantics
//! - Run persistence as a side channel detached from the caller
//!
//! # Design Decisions
//! - Upserts keyed by (context fingerprint, item id); resubmission is harmless
//! - Sink errors are logged and counted, never returned to batch callers
//! - File writes go to a temp file and are renamed into place

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::observability::metrics;
use crate::scoring::error::SinkError;
use crate::scoring::types::ScoredItem;

/// Successful items of one batch, with the context they were scored against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistBatch {
    pub context_fingerprint: String,
    pub items: Vec<ScoredItem>,
}

/// Durable destination for scored items.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn persist(&self, batch: &PersistBatch) -> Result<(), SinkError>;
}

/// Sink used when persistence is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl PersistenceSink for NoopSink {
    async fn persist(&self, _batch: &PersistBatch) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Stored record in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedScore {
    pub context_fingerprint: String,
    pub item: ScoredItem,
}

/// Upserting sink backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    records: Arc<DashMap<String, PersistedScore>>,
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileSink {
    /// Open the sink, loading existing records if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        let records = DashMap::new();

        if path.exists() {
            let content = std::fs::read(&path)?;
            if !content.is_empty() {
                let stored: BTreeMap<String, PersistedScore> = serde_json::from_slice(&content)?;
                for (k, v) in stored {
                    records.insert(k, v);
                }
            }
            tracing::info!(path = %path.display(), records = records.len(), "Loaded persisted scores");
        }

        Ok(Self {
            records: Arc::new(records),
            path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn record_key(fingerprint: &str, item_id: &str) -> String {
        format!("{fingerprint}/{item_id}")
    }

    /// Look up a persisted score.
    pub fn get(&self, fingerprint: &str, item_id: &str) -> Option<PersistedScore> {
        self.records
            .get(&Self::record_key(fingerprint, item_id))
            .map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let _guard = self.write_lock.lock().await;

        // Sorted so the file is stable across writes.
        let snapshot: BTreeMap<String, PersistedScore> = self
            .records
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for JsonFileSink {
    async fn persist(&self, batch: &PersistBatch) -> Result<(), SinkError> {
        for item in batch.items.iter().filter(|i| i.success) {
            self.records.insert(
                Self::record_key(&batch.context_fingerprint, &item.item_id),
                PersistedScore {
                    context_fingerprint: batch.context_fingerprint.clone(),
                    item: item.clone(),
                },
            );
        }
        self.flush().await?;
        tracing::debug!(items = batch.items.len(), path = %self.path.display(), "Persisted scores");
        Ok(())
    }
}

/// Hand a batch to the sink without waiting for it.
///
/// Errors are logged and counted here and go nowhere else.
pub fn spawn_persist(sink: Arc<dyn PersistenceSink>, batch: PersistBatch) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = sink.persist(&batch).await {
            metrics::record_persist_failure();
            tracing::warn!(
                error = %e,
                items = batch.items.len(),
                "Failed to persist scores; batch result unaffected"
            );
        }
    })
}
