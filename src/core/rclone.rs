//! Sub-transfer invocations of the external rclone binary.
//!
//! A backup job is one or more of these, built up front and run strictly in
//! sequence. Two whole-tree syncs racing against the same remote prefix can
//! corrupt destination metadata, so the runner never executes them
//! concurrently.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::warn;

use crate::config::BackupConfig;
use crate::core::models::BackupRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Mirror the destination to the source, deletions included.
    Sync,
    /// Copy without deleting extra destination content.
    Copy,
}

impl TransferMode {
    fn subcommand(self) -> &'static str {
        match self {
            TransferMode::Sync => "sync",
            TransferMode::Copy => "copy",
        }
    }
}

/// One fully-specified rclone run.
#[derive(Debug, Clone)]
pub struct RcloneInvocation {
    pub mode: TransferMode,
    pub source: PathBuf,
    pub destination: String,
}

/// Captured outcome of a finished rclone process.
#[derive(Debug)]
pub struct TransferOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl RcloneInvocation {
    /// Argument list for this invocation. Every run gets the same tuning:
    /// bounded parallelism, symlink targets followed rather than the links
    /// themselves, source mtimes left alone. Sync mode additionally excludes
    /// transient server noise so a mirror never ships logs or crash dumps.
    pub fn args(&self, config: &BackupConfig) -> Vec<String> {
        let mut args = vec![
            self.mode.subcommand().to_string(),
            self.source.to_string_lossy().into_owned(),
            self.destination.clone(),
            "--transfers".to_string(),
            config.transfers.to_string(),
            "--checkers".to_string(),
            config.checkers.to_string(),
            "--skip-links".to_string(),
            "--copy-links".to_string(),
            "--no-update-modtime".to_string(),
        ];

        if self.mode == TransferMode::Sync {
            for pattern in &config.excludes {
                args.push("--exclude".to_string());
                args.push(pattern.clone());
            }
        }

        args.push("--progress".to_string());
        args.push("--stats".to_string());
        args.push("1s".to_string());
        args.push("-v".to_string());
        args
    }

    /// Run the external tool to completion, capturing both output streams.
    pub async fn run(&self, config: &BackupConfig) -> Result<TransferOutput> {
        let output = Command::new(&config.rclone_bin)
            .args(self.args(config))
            .output()
            .await
            .with_context(|| format!("Failed to run {}", config.rclone_bin))?;

        Ok(TransferOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        })
    }
}

/// Build the sub-transfer list for a request.
///
/// Full-tree mode is a single mirror of the whole server directory.
/// Selective mode is one copy per chosen sub-path, each landing under the
/// same timestamped remote prefix; a path missing on disk is skipped here,
/// not treated as a failure.
pub fn build_invocations(
    config: &BackupConfig,
    request: &BackupRequest,
    remote_path: &str,
) -> Vec<RcloneInvocation> {
    if request.is_full_tree() {
        return vec![RcloneInvocation {
            mode: TransferMode::Sync,
            source: config.source_path.clone(),
            destination: remote_path.to_string(),
        }];
    }

    let mut invocations = Vec::new();
    for relative in &request.selected_paths {
        let source = config.source_path.join(relative);
        if !source.exists() {
            warn!(path = %source.display(), "Selected backup path does not exist, skipping");
            continue;
        }
        invocations.push(RcloneInvocation {
            mode: TransferMode::Copy,
            source,
            destination: format!("{}/{}", remote_path, relative),
        });
    }
    invocations
}
