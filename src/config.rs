//! Application configuration.
//!
//! Layered with figment: built-in defaults, then the TOML config file, then
//! environment variables prefixed with `CRAFTD_` (double underscore as the
//! nesting separator, e.g. `CRAFTD_SERVER__PORT=9000`). A missing config
//! file is written out with the defaults so a fresh install has something
//! to edit.

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "craftd.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub docker: DockerConfig,
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Name of the managed game-server container.
    pub container_name: String,
    pub docker_bin: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            container_name: "minecraft-server".to_string(),
            docker_bin: "docker".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Local server data directory that gets archived.
    pub source_path: PathBuf,
    /// rclone remote name, as configured in rclone.conf.
    pub rclone_remote: String,
    /// Bucket prefix under the remote; each job lands in a timestamped
    /// subdirectory beneath it.
    pub bucket_path: String,
    pub rclone_bin: String,
    /// Webhook endpoint for job notifications. Empty disables them.
    pub webhook_url: String,
    pub history_file: PathBuf,
    /// rclone --transfers / --checkers parallelism.
    pub transfers: u32,
    pub checkers: u32,
    /// Patterns excluded from full-tree mirrors.
    pub excludes: Vec<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("/srv/minecraft"),
            rclone_remote: "cloudflare_r2".to_string(),
            bucket_path: "backups".to_string(),
            rclone_bin: "rclone".to_string(),
            webhook_url: String::new(),
            history_file: PathBuf::from("backup_history.json"),
            transfers: 4,
            checkers: 8,
            excludes: vec![
                "*.tmp".to_string(),
                "*.log".to_string(),
                "*.lock".to_string(),
                "logs/**".to_string(),
                "crash-reports/**".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration, creating the file with defaults when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));

        if !path.exists() {
            Self::write_defaults(path)?;
        }

        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CRAFTD_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid server bind address {}:{}",
                    self.server.host, self.server.port
                )
            })
    }

    fn write_defaults(path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(&AppConfig::default())
            .context("Failed to serialize default configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write default config to {}", path.display()))?;

        tracing::info!(path = %path.display(), "Wrote default configuration file");
        Ok(())
    }
}
