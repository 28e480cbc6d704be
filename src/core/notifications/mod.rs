mod webhook;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::BackupConfig;

pub use webhook::WebhookNotifier;

/// Events that trigger notifications
#[derive(Debug, Clone)]
pub enum BackupEvent {
    Started {
        job_id: String,
        source_path: String,
        remote_path: String,
    },
    Completed {
        job_id: String,
        duration_secs: f64,
        files_transferred: u64,
        bytes_transferred: u64,
        remote_path: String,
    },
    Failed {
        job_id: String,
        duration_secs: f64,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl BackupEvent {
    pub fn severity(&self) -> Severity {
        match self {
            BackupEvent::Started { .. } => Severity::Info,
            BackupEvent::Completed { .. } => Severity::Success,
            BackupEvent::Failed { .. } => Severity::Error,
        }
    }
}

/// Trait for notification channel implementations
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, event: BackupEvent) -> Result<()>;
}

/// Factory function to create a notifier based on config.
/// No webhook endpoint configured means notifications are off entirely.
pub fn create_notifier(config: &BackupConfig) -> Option<Arc<dyn NotificationChannel>> {
    if config.webhook_url.is_empty() {
        return None;
    }
    Some(Arc::new(WebhookNotifier::new(config.webhook_url.clone())))
}
