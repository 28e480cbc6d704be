use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use craftd::config::AppConfig;
use craftd::context::AppContext;
use craftd::core::format::format_bytes;
use craftd::core::models::{BackupRequest, BackupStatus};
use craftd::logging::{self, LogConfig};
use craftd::web::WebServer;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "craftd")]
#[command(about = "Game server dashboard and backup daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dashboard daemon
    Serve(ServeArgs),
    /// Run a single backup job in the foreground
    Backup(BackupArgs),
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args)]
struct BackupArgs {
    /// Sub-paths to back up; none means the whole server directory
    paths: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(LogConfig {
        json: cli.log_json,
        verbose: cli.verbose,
    });

    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve(args) => {
            if let Some(host) = args.host {
                config.server.host = host;
            }
            if let Some(port) = args.port {
                config.server.port = port;
            }
            run_serve(AppContext::new(config))
                .await
                .context("Failed to run dashboard server")
        }
        Commands::Backup(args) => run_backup(AppContext::new(config), args.paths).await,
    }
}

async fn run_serve(ctx: AppContext) -> Result<()> {
    let bind_addr = ctx.config.bind_addr()?;
    let server = Arc::new(WebServer::new(ctx, bind_addr));

    let shutdown = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
            shutdown.shutdown();
        }
    });

    server.start().await
}

async fn run_backup(ctx: AppContext, paths: Vec<String>) -> Result<()> {
    let record = ctx.runner.execute(BackupRequest::selective(paths)).await;

    println!("id:       {}", record.id);
    println!("status:   {}", record.status.as_str());
    println!("duration: {:.2}s", record.duration_secs);
    println!(
        "moved:    {} files, {}",
        record.files_transferred,
        format_bytes(record.bytes_transferred)
    );
    println!("remote:   {}", record.remote_path);

    if record.status == BackupStatus::Error {
        anyhow::bail!(
            "backup failed: {}",
            record.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
