//! JSON REST API for the dashboard.
//!
//! Thin handlers over the backup core and the container manager. The backup
//! trigger returns immediately; job outcomes are only observable through
//! the history endpoints.
//!
//! ## Endpoints
//!
//! - `GET  /api/status` — container state
//! - `POST /api/container/{start,stop,restart}` — lifecycle control
//! - `POST /api/command` — forward an admin command to the server console
//! - `GET  /api/players` — who is online
//! - `POST /api/backup/start` — fire-and-forget backup trigger
//! - `GET  /api/backup/history?limit=20` — recent jobs, newest first
//! - `GET  /api/backup/{id}` — one job record

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use tokio::sync::broadcast;

use crate::context::AppContext;
use crate::core::history::DEFAULT_HISTORY_LIMIT;
use crate::core::models::BackupRequest;
use crate::docker::ContainerError;

/// Web server for the dashboard API.
pub struct WebServer {
    bind_addr: SocketAddr,
    ctx: AppContext,
    shutdown_tx: broadcast::Sender<()>,
}

impl WebServer {
    /// Create a new web server bound to the given address.
    pub fn new(ctx: AppContext, bind_addr: SocketAddr) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            bind_addr,
            ctx,
            shutdown_tx,
        }
    }

    /// Start the web server. Runs until shutdown() is called.
    pub async fn start(&self) -> anyhow::Result<()> {
        let app = router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "Dashboard API listening");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Signal the server to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/status", get(container_status))
        .route("/api/container/start", post(container_start))
        .route("/api/container/stop", post(container_stop))
        .route("/api/container/restart", post(container_restart))
        .route("/api/command", post(run_command))
        .route("/api/players", get(players))
        .route("/api/backup/start", post(backup_start))
        .route("/api/backup/history", get(backup_history))
        .route("/api/backup/{id}", get(backup_detail))
        .with_state(ctx)
}

type ApiError = (StatusCode, Json<Value>);

fn container_error(e: ContainerError) -> ApiError {
    let code = match &e {
        ContainerError::NotRunning(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(json!({ "success": false, "error": e.to_string() })))
}

/// Container state; errors are folded into the body so dashboards can poll
/// this without special-casing failures.
async fn container_status(State(ctx): State<AppContext>) -> Json<Value> {
    match ctx.containers.status().await {
        Ok(state) => Json(json!({ "status": state.status, "running": state.running })),
        Err(e) => Json(json!({
            "status": "error",
            "running": false,
            "error": e.to_string(),
        })),
    }
}

async fn container_start(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    ctx.containers.start().await.map_err(container_error)?;
    Ok(Json(json!({ "success": true, "message": "Container started" })))
}

async fn container_stop(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    ctx.containers.stop().await.map_err(container_error)?;
    Ok(Json(json!({ "success": true, "message": "Container stopped" })))
}

async fn container_restart(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    ctx.containers.restart().await.map_err(container_error)?;
    Ok(Json(json!({ "success": true, "message": "Container restarted" })))
}

#[derive(Deserialize)]
struct CommandBody {
    command: String,
}

async fn run_command(
    State(ctx): State<AppContext>,
    Json(body): Json<CommandBody>,
) -> Result<Json<Value>, ApiError> {
    let command = body.command.trim();
    if command.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "command must not be empty" })),
        ));
    }

    let outcome = ctx
        .containers
        .exec_command(command)
        .await
        .map_err(container_error)?;

    Ok(Json(json!({
        "success": outcome.success,
        "output": outcome.output,
    })))
}

async fn players(State(ctx): State<AppContext>) -> Json<Value> {
    match ctx.containers.online_players().await {
        Ok(list) => Json(json!({
            "players": list.players,
            "count": list.count,
            "max": list.max,
        })),
        Err(e) => Json(json!({
            "players": [],
            "count": 0,
            "max": 0,
            "error": e.to_string(),
        })),
    }
}

#[derive(Deserialize, Default)]
struct StartBackupBody {
    #[serde(default)]
    paths: Vec<String>,
}

/// Trigger a backup and return immediately. The job runs on a detached
/// task; callers watch its progress through the history endpoints.
///
/// The body is optional: no body (or `{}`) means a full-tree backup.
async fn backup_start(
    State(ctx): State<AppContext>,
    body: axum::body::Bytes,
) -> Result<Json<Value>, ApiError> {
    let paths = if body.is_empty() {
        Vec::new()
    } else {
        serde_json::from_slice::<StartBackupBody>(&body)
            .map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "success": false, "error": e.to_string() })),
                )
            })?
            .paths
    };

    let runner = ctx.runner.clone();
    tokio::spawn(async move {
        runner.execute(BackupRequest::selective(paths)).await;
    });

    Ok(Json(json!({
        "success": true,
        "message": "Backup started in the background",
    })))
}

#[derive(Deserialize, Default)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn backup_history(
    State(ctx): State<AppContext>,
    Query(query): Query<HistoryQuery>,
) -> Json<Value> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = ctx.history.list(limit).await;
    Json(json!({ "success": true, "history": history }))
}

async fn backup_detail(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match ctx.history.get(&id).await {
        Some(record) => Ok(Json(json!({ "success": true, "backup": record }))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "backup record not found" })),
        )),
    }
}
