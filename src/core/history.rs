//! Durable, append-ordered ledger of backup job outcomes.
//!
//! Backed by a single JSON document that is fully rewritten after every
//! append or update. The in-memory copy is authoritative: a persistence
//! failure is logged and the process keeps serving history from memory
//! even if the durable copy falls behind.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

use super::models::BackupRecord;

/// Records returned by a history query when the caller gives no limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Thread-safe backup history, newest-first by insertion order.
#[derive(Clone)]
pub struct HistoryStore {
    path: Arc<PathBuf>,
    records: Arc<RwLock<Vec<BackupRecord>>>,
}

impl HistoryStore {
    /// Load the ledger from disk. A missing or corrupt file starts an
    /// empty history rather than failing.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<BackupRecord>>(&raw) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Backup history file is corrupt, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read backup history, starting empty");
                Vec::new()
            }
        };

        Self {
            path: Arc::new(path),
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Insert a record at the head of the history and persist.
    pub async fn append(&self, record: BackupRecord) {
        let mut records = self.records.write().await;
        records.insert(0, record);
        self.persist(&records);
    }

    /// Replace the record with the matching id in place and persist.
    /// An unknown id is a logged no-op; the store is left untouched.
    pub async fn update(&self, id: &str, record: BackupRecord) {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == id) {
            Some(slot) => {
                *slot = record;
                self.persist(&records);
            }
            None => warn!(job_id = %id, "No backup record with this id, update dropped"),
        }
    }

    /// The first `limit` records, newest-first. Empty history returns an
    /// empty list, never an error.
    pub async fn list(&self, limit: usize) -> Vec<BackupRecord> {
        let records = self.records.read().await;
        records.iter().take(limit).cloned().collect()
    }

    /// Point lookup by job id.
    pub async fn get(&self, id: &str) -> Option<BackupRecord> {
        let records = self.records.read().await;
        records.iter().find(|r| r.id == id).cloned()
    }

    fn persist(&self, records: &[BackupRecord]) {
        let json = match serde_json::to_string_pretty(records) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize backup history");
                return;
            }
        };

        if let Err(e) = std::fs::write(self.path.as_ref(), json) {
            error!(path = %self.path.display(), error = %e, "Failed to write backup history, in-memory history stays authoritative");
        }
    }
}
