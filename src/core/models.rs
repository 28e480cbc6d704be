use serde::{Deserialize, Serialize};

/// A request to run one backup job.
///
/// An empty `selected_paths` means "archive the whole server directory";
/// otherwise one copy runs per listed sub-path, in order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackupRequest {
    pub selected_paths: Vec<String>,
}

impl BackupRequest {
    pub fn full_tree() -> Self {
        Self::default()
    }

    pub fn selective(paths: Vec<String>) -> Self {
        Self {
            selected_paths: paths,
        }
    }

    pub fn is_full_tree(&self) -> bool {
        self.selected_paths.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Running,
    Success,
    Error,
}

impl BackupStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BackupStatus::Success | BackupStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::Running => "running",
            BackupStatus::Success => "success",
            BackupStatus::Error => "error",
        }
    }
}

/// One entry in the backup ledger.
///
/// Created with status `Running` before any transfer starts, then updated
/// in place exactly once when the job reaches a terminal state. The id is
/// assigned at creation and never changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    pub timestamp: String,
    pub status: BackupStatus,
    pub source_path: String,
    pub remote_path: String,
    #[serde(default)]
    pub selected_paths: Vec<String>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default)]
    pub files_transferred: u64,
    #[serde(default)]
    pub bytes_transferred: u64,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
}
