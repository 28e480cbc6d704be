use super::{BackupEvent, NotificationChannel, Severity};
use crate::core::format::format_bytes;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use serde_json::json;
use std::time::Duration;

/// Delivery deadline; a dead endpoint must never stall the job runner.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure bodies carry at most this much of the captured error text.
const ERROR_PREVIEW_LEN: usize = 500;

/// Posts job events as markdown messages to a webhook endpoint.
///
/// Payload shape: `{"msgtype": "markdown", "markdown": {"content": …}}`.
pub struct WebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            webhook_url,
            client,
        }
    }

    fn format_message(&self, event: &BackupEvent) -> serde_json::Value {
        let emoji = match event.severity() {
            Severity::Info => "ℹ️",
            Severity::Success => "✅",
            Severity::Error => "❌",
        };

        let (title, body) = match event {
            BackupEvent::Started {
                job_id,
                source_path,
                remote_path,
            } => (
                "Backup started",
                format!(
                    "**Source**: `{}`\n**Destination**: `{}`\n**Job ID**: `{}`",
                    source_path, remote_path, job_id
                ),
            ),
            BackupEvent::Completed {
                job_id,
                duration_secs,
                files_transferred,
                bytes_transferred,
                remote_path,
            } => (
                "Backup finished",
                format!(
                    "**Job ID**: `{}`\n**Status**: ✅ success\n**Duration**: {} s\n\
                     **Files transferred**: {}\n**Data transferred**: {}\n**Destination**: `{}`",
                    job_id,
                    duration_secs,
                    files_transferred,
                    format_bytes(*bytes_transferred),
                    remote_path
                ),
            ),
            BackupEvent::Failed {
                job_id,
                duration_secs,
                error,
            } => {
                let preview: String = error.chars().take(ERROR_PREVIEW_LEN).collect();
                let preview = if preview.is_empty() {
                    "unknown error".to_string()
                } else {
                    preview
                };
                (
                    "Backup failed",
                    format!(
                        "**Job ID**: `{}`\n**Status**: ❌ error\n**Duration**: {} s\n\
                         **Error**:\n```\n{}\n```",
                        job_id, duration_secs, preview
                    ),
                )
            }
        };

        let content = format!(
            "# {} {}\n\n{}\n\n**Time**: {}",
            emoji,
            title,
            body,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        json!({
            "msgtype": "markdown",
            "markdown": { "content": content }
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookNotifier {
    async fn notify(&self, event: BackupEvent) -> Result<()> {
        let payload = self.format_message(&event);
        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
