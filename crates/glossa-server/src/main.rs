//! `glossa` command-line entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glossa_core::batch_hash;
use glossa_server::{init_logging, routes, LogFormat};
use glossa_service::{GlossaConfig, ServiceContext, SyncService, TranslationService};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Repository-backed translations with a reviewed overlay
#[derive(Debug, Parser)]
#[command(name = "glossa")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log output format (pretty or json)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// TOML configuration file
        #[arg(long, short)]
        config: PathBuf,

        /// Listen address, overriding `server.bind`
        #[arg(long)]
        bind: Option<String>,

        /// Sync every project before accepting requests
        #[arg(long)]
        sync_on_start: bool,
    },
    /// Sync projects into the cache once and print the reports
    Sync {
        /// TOML configuration file
        #[arg(long, short)]
        config: PathBuf,

        /// Project to sync; every configured project when omitted
        #[arg(long)]
        project: Option<String>,
    },
    /// Print source hashes of the given values
    Hash {
        #[arg(required = true)]
        values: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run(cli.command))
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Serve {
            config,
            bind,
            sync_on_start,
        } => serve(&config, bind, sync_on_start).await,
        Command::Sync { config, project } => sync(&config, project).await,
        Command::Hash { values } => {
            for (value, hash) in values.iter().zip(batch_hash(values.as_slice())) {
                println!("{hash}\t{value}");
            }
            Ok(())
        }
    }
}

async fn context(path: &Path) -> Result<(GlossaConfig, Arc<ServiceContext>)> {
    let config = GlossaConfig::load(path).with_context(|| format!("loading {}", path.display()))?;
    let ctx = ServiceContext::from_config(&config)
        .await
        .context("building service context")?;
    Ok((config, Arc::new(ctx)))
}

async fn serve(path: &Path, bind: Option<String>, sync_on_start: bool) -> Result<()> {
    let (config, ctx) = context(path).await?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind.parse().with_context(|| format!("invalid bind address: {bind}"))?;

    if sync_on_start {
        let sync = SyncService::new(ctx.clone());
        for project in ctx.project_ids() {
            match sync.sync(project).await {
                Ok(report) => tracing::info!(
                    project,
                    synced = report.succeeded.len(),
                    failed = report.failed.len(),
                    "startup sync finished"
                ),
                Err(err) => tracing::warn!(project, error = %err, "startup sync failed"),
            }
        }
    }

    let service = Arc::new(TranslationService::new(ctx));
    let (addr, server) = warp::serve(routes(service))
        .try_bind_with_graceful_shutdown(addr, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
        })
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, version = glossa_server::VERSION, "glossa listening");
    server.await;
    Ok(())
}

async fn sync(path: &Path, project: Option<String>) -> Result<()> {
    let (config, ctx) = context(path).await?;
    let projects: Vec<String> = match project {
        Some(id) => vec![id],
        None => config.projects.iter().map(|p| p.id.clone()).collect(),
    };

    let service = SyncService::new(ctx);
    for id in projects {
        let report = service.sync(&id).await.with_context(|| format!("syncing {id}"))?;
        if !report.is_complete() {
            tracing::warn!(
                project = %id,
                failed = report.failed.len(),
                failed_dirs = report.failed_dirs.len(),
                "sync finished with failures"
            );
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
