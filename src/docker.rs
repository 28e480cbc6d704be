//! Thin wrapper around the docker CLI for the managed game-server container.
//!
//! Lifecycle operations shell out to `docker start/stop/restart/inspect`;
//! admin commands are forwarded into the container through whichever console
//! bridge the image ships (`rcon-cli`, falling back to `mc-send-to-console`).

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::DockerConfig;

/// Stop deadline handed to `docker restart`, in seconds.
const RESTART_TIMEOUT_SECS: u32 = 30;

/// Console bridges tried in order when forwarding a command.
const CONSOLE_BRIDGES: [&str; 2] = ["rcon-cli", "mc-send-to-console"];

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container '{0}' is not running")]
    NotRunning(String),
    #[error("docker command failed: {0}")]
    CommandFailed(String),
    #[error("failed to run docker: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerState {
    pub status: String,
    pub running: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub output: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlayerList {
    pub players: Vec<String>,
    pub count: u32,
    pub max: u32,
}

pub struct ContainerManager {
    docker_bin: String,
    container_name: String,
}

impl ContainerManager {
    pub fn new(config: &DockerConfig) -> Self {
        Self {
            docker_bin: config.docker_bin.clone(),
            container_name: config.container_name.clone(),
        }
    }

    pub async fn status(&self) -> Result<ContainerState, ContainerError> {
        let output = Command::new(&self.docker_bin)
            .args(["inspect", "-f", "{{.State.Status}}"])
            .arg(&self.container_name)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ContainerError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let status = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let running = status == "running";
        Ok(ContainerState { status, running })
    }

    pub async fn start(&self) -> Result<(), ContainerError> {
        self.lifecycle_command(&["start"]).await
    }

    pub async fn stop(&self) -> Result<(), ContainerError> {
        self.lifecycle_command(&["stop"]).await
    }

    pub async fn restart(&self) -> Result<(), ContainerError> {
        let timeout = RESTART_TIMEOUT_SECS.to_string();
        self.lifecycle_command(&["restart", "-t", timeout.as_str()])
            .await
    }

    async fn lifecycle_command(&self, args: &[&str]) -> Result<(), ContainerError> {
        let output = Command::new(&self.docker_bin)
            .args(args)
            .arg(&self.container_name)
            .output()
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ContainerError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    /// Forward an admin command to the server console.
    ///
    /// Requires a running container. Bridges are tried in order; the first
    /// one that exits cleanly wins, and the last attempt's output is
    /// returned when none do.
    pub async fn exec_command(&self, command: &str) -> Result<CommandOutcome, ContainerError> {
        if !self.status().await?.running {
            return Err(ContainerError::NotRunning(self.container_name.clone()));
        }

        let mut last = CommandOutcome {
            success: false,
            output: String::new(),
        };

        for bridge in CONSOLE_BRIDGES {
            match self.exec_in_container(bridge, command).await {
                Ok(outcome) if outcome.success => return Ok(outcome),
                Ok(outcome) => last = outcome,
                Err(e) => debug!(bridge, error = %e, "Console bridge unavailable"),
            }
        }

        if last.output.is_empty() {
            last.output =
                "Command failed: the container exposes neither rcon-cli nor mc-send-to-console"
                    .to_string();
        }
        Ok(last)
    }

    async fn exec_in_container(
        &self,
        bridge: &str,
        command: &str,
    ) -> Result<CommandOutcome, ContainerError> {
        let output = Command::new(&self.docker_bin)
            .args(["exec", "-u", "root"])
            .arg(&self.container_name)
            .args([bridge, command])
            .output()
            .await?;

        Ok(CommandOutcome {
            success: output.status.success(),
            output: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    /// Who is online right now. A stopped container or unparseable console
    /// response degrades to an empty list.
    pub async fn online_players(&self) -> Result<PlayerList, ContainerError> {
        if !self.status().await?.running {
            return Ok(PlayerList::default());
        }

        let outcome = self.exec_command("list").await?;
        Ok(parse_player_list(&outcome.output))
    }
}

/// Parse the vanilla `list` response:
/// `There are 2 of a max of 20 players online: alice, bob`
pub fn parse_player_list(output: &str) -> PlayerList {
    let re = Regex::new(r"There are (\d+) of a max of (\d+) players online").unwrap();

    let mut list = PlayerList::default();
    let Some(caps) = re.captures(output) else {
        return list;
    };

    list.count = caps[1].parse().unwrap_or(0);
    list.max = caps[2].parse().unwrap_or(0);

    if let Some((_, names)) = output.split_once("online:") {
        list.players = names
            .trim()
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
    }

    list
}
