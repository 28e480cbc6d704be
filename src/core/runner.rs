//! Backup job orchestration.
//!
//! One `execute` call drives a job through its whole lifecycle: a durable
//! `running` record lands in the ledger before any transfer starts, the
//! sub-transfers run strictly one after another, and the record is updated
//! exactly once when the job reaches a terminal state. Notifications fire
//! after the ledger write, never instead of it.

use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::AppConfig;

use super::history::HistoryStore;
use super::models::{BackupRecord, BackupRequest, BackupStatus};
use super::notifications::{BackupEvent, NotificationChannel};
use super::rclone::{TransferOutput, build_invocations};
use super::stats::{TransferStats, parse_transfer_stats};

pub struct BackupRunner {
    config: Arc<AppConfig>,
    history: HistoryStore,
    notifier: Option<Arc<dyn NotificationChannel>>,
}

/// Everything the sub-transfers produced, folded together in execution order.
struct TransferAggregate {
    output: String,
    errors: String,
    all_succeeded: bool,
    stats: TransferStats,
}

impl BackupRunner {
    pub fn new(
        config: Arc<AppConfig>,
        history: HistoryStore,
        notifier: Option<Arc<dyn NotificationChannel>>,
    ) -> Self {
        Self {
            config,
            history,
            notifier,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Run one backup job to completion and return its final record.
    ///
    /// Never returns an error: a failing tool and an orchestration exception
    /// both end as an `error` record in the ledger.
    pub async fn execute(&self, request: BackupRequest) -> BackupRecord {
        let started = Instant::now();
        let now = Local::now();
        let timestamp = now.format("%Y%m%d_%H%M%S").to_string();
        let id = self.unique_job_id(&timestamp).await;

        let backup = &self.config.backup;
        let remote_path = format!(
            "{}:{}/{}",
            backup.rclone_remote, backup.bucket_path, timestamp
        );

        let mut record = BackupRecord {
            id,
            timestamp,
            status: BackupStatus::Running,
            source_path: backup.source_path.display().to_string(),
            remote_path: remote_path.clone(),
            selected_paths: request.selected_paths.clone(),
            output: String::new(),
            error: None,
            duration_secs: 0.0,
            files_transferred: 0,
            bytes_transferred: 0,
            start_time: now.to_rfc3339(),
            end_time: None,
        };

        // Durable trace first: a crash mid-transfer must still leave a
        // `running` record behind for history readers.
        self.history.append(record.clone()).await;

        info!(job_id = %record.id, remote = %record.remote_path, "Backup job started");
        self.notify(BackupEvent::Started {
            job_id: record.id.clone(),
            source_path: record.source_path.clone(),
            remote_path: record.remote_path.clone(),
        })
        .await;

        match self.run_transfers(&request, &remote_path).await {
            Ok(aggregate) => {
                record.output = aggregate.output;
                record.files_transferred = aggregate.stats.files;
                record.bytes_transferred = aggregate.stats.bytes;

                if aggregate.all_succeeded {
                    record.status = BackupStatus::Success;
                } else {
                    record.status = BackupStatus::Error;
                    record.error = Some(if aggregate.errors.is_empty() {
                        "unknown error".to_string()
                    } else {
                        aggregate.errors
                    });
                }
            }
            Err(e) => {
                record.status = BackupStatus::Error;
                record.error = Some(format!("{e:#}"));
            }
        }

        record.duration_secs = round_secs(started.elapsed().as_secs_f64());
        record.end_time = Some(Local::now().to_rfc3339());

        // Terminal state is persisted before anyone is told about it.
        self.history.update(&record.id, record.clone()).await;

        match record.status {
            BackupStatus::Success => {
                info!(
                    job_id = %record.id,
                    duration_secs = record.duration_secs,
                    files = record.files_transferred,
                    bytes = record.bytes_transferred,
                    "Backup job finished"
                );
                self.notify(BackupEvent::Completed {
                    job_id: record.id.clone(),
                    duration_secs: record.duration_secs,
                    files_transferred: record.files_transferred,
                    bytes_transferred: record.bytes_transferred,
                    remote_path: record.remote_path.clone(),
                })
                .await;
            }
            _ => {
                error!(
                    job_id = %record.id,
                    error = record.error.as_deref().unwrap_or(""),
                    "Backup job failed"
                );
                self.notify(BackupEvent::Failed {
                    job_id: record.id.clone(),
                    duration_secs: record.duration_secs,
                    error: record.error.clone().unwrap_or_default(),
                })
                .await;
            }
        }

        record
    }

    /// Timestamp-derived id, disambiguated with a numeric suffix when two
    /// jobs start within the same second.
    async fn unique_job_id(&self, timestamp: &str) -> String {
        let base = format!("backup_{timestamp}");
        if self.history.get(&base).await.is_none() {
            return base;
        }

        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if self.history.get(&candidate).await.is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    async fn run_transfers(
        &self,
        request: &BackupRequest,
        remote_path: &str,
    ) -> Result<TransferAggregate> {
        let invocations = build_invocations(&self.config.backup, request, remote_path);

        let mut aggregate = TransferAggregate {
            output: String::new(),
            errors: String::new(),
            all_succeeded: true,
            stats: TransferStats::default(),
        };

        for invocation in invocations {
            info!(
                source = %invocation.source.display(),
                destination = %invocation.destination,
                "Starting sub-transfer"
            );

            let TransferOutput {
                stdout,
                stderr,
                success,
            } = invocation.run(&self.config.backup).await?;

            aggregate.stats.add(parse_transfer_stats(&stdout));
            aggregate.output.push_str(&stdout);
            aggregate.errors.push_str(&stderr);

            if !success {
                // Remaining sub-transfers still run; the job as a whole fails.
                warn!(destination = %invocation.destination, "Sub-transfer reported failure");
                aggregate.all_succeeded = false;
            }
        }

        Ok(aggregate)
    }

    async fn notify(&self, event: BackupEvent) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(event).await {
                warn!(error = %e, "Failed to deliver notification");
            }
        }
    }
}

fn round_secs(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}
