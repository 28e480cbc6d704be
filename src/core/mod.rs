pub mod format;
pub mod history;
pub mod models;
pub mod notifications;
pub mod rclone;
pub mod runner;
pub mod stats;

pub use history::{DEFAULT_HISTORY_LIMIT, HistoryStore};
pub use models::{BackupRecord, BackupRequest, BackupStatus};
pub use runner::BackupRunner;
