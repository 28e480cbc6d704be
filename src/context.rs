use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::history::HistoryStore;
use crate::core::notifications;
use crate::core::runner::BackupRunner;
use crate::docker::ContainerManager;

/// Shared handles threaded through the web layer and CLI. Built once from
/// the loaded configuration; nothing here is a process-wide global.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub history: HistoryStore,
    pub runner: Arc<BackupRunner>,
    pub containers: Arc<ContainerManager>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let history = HistoryStore::load(config.backup.history_file.clone());
        let notifier = notifications::create_notifier(&config.backup);
        let runner = Arc::new(BackupRunner::new(
            config.clone(),
            history.clone(),
            notifier,
        ));
        let containers = Arc::new(ContainerManager::new(&config.docker));

        Self {
            config,
            history,
            runner,
            containers,
        }
    }
}
