//! End-to-end tests for the backup job pipeline.
//!
//! These drive `BackupRunner` against a fake rclone script that records its
//! argv and emits canned transfer summaries, exercising the full
//! append-run-update lifecycle without touching a real remote.

use craftd::config::AppConfig;
use craftd::core::history::{DEFAULT_HISTORY_LIMIT, HistoryStore};
use craftd::core::models::{BackupRequest, BackupStatus};
use craftd::core::notifications::create_notifier;
use craftd::core::runner::BackupRunner;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const SUCCESS_SCRIPT: &str = "#!/bin/sh\n\
echo \"Transferred:   42 / 42, 100%, 3.5 MB, 4.57 MB/s, ETA 0s\"\n\
exit 0\n";

const FAILURE_SCRIPT: &str = "#!/bin/sh\n\
echo \"remote unreachable: connection reset\" >&2\n\
exit 3\n";

struct Fixture {
    temp: TempDir,
    config: AppConfig,
}

impl Fixture {
    /// Workspace with a server source directory and a fake rclone binary.
    fn new(script_body: &str) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("server");
        std::fs::create_dir_all(&source).unwrap();

        let rclone = temp.path().join("fake-rclone");
        write_script(&rclone, script_body);

        let mut config = AppConfig::default();
        config.backup.source_path = source;
        config.backup.rclone_bin = rclone.to_string_lossy().into_owned();
        config.backup.history_file = temp.path().join("history.json");
        config.backup.rclone_remote = "r2".to_string();
        config.backup.bucket_path = "world-backups".to_string();

        Self { temp, config }
    }

    fn runner(&self) -> (BackupRunner, HistoryStore) {
        let history = HistoryStore::load(self.config.backup.history_file.clone());
        let runner = BackupRunner::new(
            Arc::new(self.config.clone()),
            history.clone(),
            create_notifier(&self.config.backup),
        );
        (runner, history)
    }
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

#[tokio::test]
async fn full_tree_backup_aggregates_stats() {
    let fx = Fixture::new(SUCCESS_SCRIPT);
    let (runner, history) = fx.runner();

    let record = runner.execute(BackupRequest::full_tree()).await;

    assert_eq!(record.status, BackupStatus::Success);
    assert_eq!(record.files_transferred, 42);
    assert_eq!(record.bytes_transferred, 3_670_016);
    assert!(record.output.contains("Transferred"));
    assert!(record.error.is_none());
    assert!(record.end_time.is_some());
    assert!(record.remote_path.starts_with("r2:world-backups/"));
    assert!(record.id.starts_with("backup_"));

    // Exactly one record, already terminal, both in memory and on disk
    let listed = history.list(DEFAULT_HISTORY_LIMIT).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, BackupStatus::Success);

    let ledger = std::fs::read_to_string(&fx.config.backup.history_file).unwrap();
    assert!(ledger.contains(&record.id));
    assert!(ledger.contains("\"success\""));
}

#[tokio::test]
async fn running_record_is_durable_before_any_transfer() {
    let fx = Fixture::new(SUCCESS_SCRIPT);
    let capture = fx.temp.path().join("ledger-during-run.json");

    // The fake rclone snapshots the ledger while it "transfers", i.e.
    // between the append and the terminal update.
    let script = format!(
        "#!/bin/sh\n\
         cat '{}' > '{}'\n\
         echo \"Transferred:   1 / 1, 100%, 512 B, 1 B/s, ETA 0s\"\n\
         exit 0\n",
        fx.config.backup.history_file.display(),
        capture.display(),
    );
    write_script(Path::new(&fx.config.backup.rclone_bin), &script);

    let (runner, _) = fx.runner();
    let record = runner.execute(BackupRequest::full_tree()).await;
    assert_eq!(record.status, BackupStatus::Success);

    let snapshot = std::fs::read_to_string(&capture).unwrap();
    assert!(snapshot.contains(&record.id));
    assert!(snapshot.contains("\"running\""));
}

#[tokio::test]
async fn nonzero_exit_marks_the_job_error() {
    let fx = Fixture::new(FAILURE_SCRIPT);
    let (runner, history) = fx.runner();

    let record = runner.execute(BackupRequest::full_tree()).await;

    assert_eq!(record.status, BackupStatus::Error);
    let error = record.error.as_deref().unwrap();
    assert!(error.contains("remote unreachable"));

    let stored = history.get(&record.id).await.unwrap();
    assert_eq!(stored.status, BackupStatus::Error);
}

#[tokio::test]
async fn missing_binary_is_caught_at_the_job_boundary() {
    let mut fx = Fixture::new(SUCCESS_SCRIPT);
    fx.config.backup.rclone_bin = fx
        .temp
        .path()
        .join("does-not-exist")
        .to_string_lossy()
        .into_owned();

    let (runner, history) = fx.runner();
    let record = runner.execute(BackupRequest::full_tree()).await;

    assert_eq!(record.status, BackupStatus::Error);
    assert!(record.error.as_deref().unwrap().contains("does-not-exist"));
    assert!(record.end_time.is_some());

    // The exception still went through the normal append + update path
    let stored = history.get(&record.id).await.unwrap();
    assert_eq!(stored.status, BackupStatus::Error);
}

#[tokio::test]
async fn selective_backup_skips_missing_paths() {
    let fx = Fixture::new(SUCCESS_SCRIPT);
    std::fs::create_dir_all(fx.config.backup.source_path.join("world")).unwrap();

    let argv_log = fx.temp.path().join("argv.log");
    let script = format!(
        "#!/bin/sh\n\
         echo \"$@\" >> '{}'\n\
         echo \"Transferred:   5 / 5, 100%, 1.0 KB, 1 KB/s, ETA 0s\"\n\
         exit 0\n",
        argv_log.display(),
    );
    write_script(Path::new(&fx.config.backup.rclone_bin), &script);

    let (runner, _) = fx.runner();
    let record = runner
        .execute(BackupRequest::selective(vec![
            "world".to_string(),
            "missing_dir".to_string(),
        ]))
        .await;

    assert_eq!(record.status, BackupStatus::Success);
    assert_eq!(record.files_transferred, 5);

    // Only the existing path produced an invocation, in copy mode
    let argv = std::fs::read_to_string(&argv_log).unwrap();
    let lines: Vec<&str> = argv.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("copy "));
    assert!(lines[0].contains("world-backups"));
    assert!(lines[0].contains("/world"));
    assert!(!argv.contains("missing_dir"));
}

#[tokio::test]
async fn one_failing_path_does_not_stop_the_rest() {
    let fx = Fixture::new(SUCCESS_SCRIPT);
    for dir in ["alpha", "bravo"] {
        std::fs::create_dir_all(fx.config.backup.source_path.join(dir)).unwrap();
    }

    let argv_log = fx.temp.path().join("argv.log");
    let script = format!(
        "#!/bin/sh\n\
         echo \"$@\" >> '{}'\n\
         case \"$*\" in\n\
         *alpha*) echo \"alpha transfer blew up\" >&2; exit 1;;\n\
         esac\n\
         echo \"Transferred:   2 / 2, 100%, 2.0 KB, 1 KB/s, ETA 0s\"\n\
         exit 0\n",
        argv_log.display(),
    );
    write_script(Path::new(&fx.config.backup.rclone_bin), &script);

    let (runner, _) = fx.runner();
    let record = runner
        .execute(BackupRequest::selective(vec![
            "alpha".to_string(),
            "bravo".to_string(),
        ]))
        .await;

    // Both sub-transfers ran, the job as a whole failed
    let argv = std::fs::read_to_string(&argv_log).unwrap();
    assert_eq!(argv.lines().count(), 2);
    assert_eq!(record.status, BackupStatus::Error);
    assert!(record.error.as_deref().unwrap().contains("alpha transfer blew up"));
    // Stats from the surviving sub-transfer are still counted
    assert_eq!(record.files_transferred, 2);
}

#[tokio::test]
async fn back_to_back_jobs_get_distinct_ids() {
    let fx = Fixture::new(SUCCESS_SCRIPT);
    let (runner, history) = fx.runner();

    let first = runner.execute(BackupRequest::full_tree()).await;
    let second = runner.execute(BackupRequest::full_tree()).await;

    assert_ne!(first.id, second.id);
    assert_eq!(history.list(DEFAULT_HISTORY_LIMIT).await.len(), 2);
    assert!(history.get(&first.id).await.is_some());
    assert!(history.get(&second.id).await.is_some());
}

#[tokio::test]
async fn unreachable_webhook_does_not_affect_the_job() {
    let mut fx = Fixture::new(SUCCESS_SCRIPT);
    // Nothing listens here; every notification attempt fails fast
    fx.config.backup.webhook_url = "http://127.0.0.1:1/notify".to_string();

    let (runner, history) = fx.runner();
    let record = runner.execute(BackupRequest::full_tree()).await;

    assert_eq!(record.status, BackupStatus::Success);
    assert_eq!(record.files_transferred, 42);
    assert_eq!(
        history.get(&record.id).await.unwrap().status,
        BackupStatus::Success
    );
}
