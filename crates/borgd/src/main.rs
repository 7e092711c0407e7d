//! `borgd`: serves one brain to any number of front-ends.
//!
//! Examples:
//!   borgd                              # current brain on 127.0.0.1:2001
//!   borgd --port 3000 --brain old.borg.json
//!
//! Settings come from `<data dir>/borgd.json`; flags override them. The brain is saved
//! when the gateway shuts down on Ctrl-C.

mod config;
mod gateway;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use borg::prelude::*;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, Level};

use crate::config::GatewayConfig;

#[derive(Parser, Debug)]
#[command(name = "borgd", version)]
#[command(about = "Share one borg brain between front-ends over HTTP")]
struct Args {
    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Brain to serve (name in the brains directory or a path)
    #[arg(long)]
    brain: Option<String>,

    /// Data directory (defaults to the platform data directory)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log debug output
    #[arg(long)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(long, conflicts_with = "debug")]
    silent: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug {
        Level::DEBUG
    } else if args.silent {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let paths = match &args.data_dir {
        Some(dir) => AppPaths::at(dir),
        None => AppPaths::new(),
    }
    .context("failed to prepare the data directory")?;

    let mut cfg = GatewayConfig::load(&paths.gateway_config_file())?;
    if let Some(host) = args.host {
        cfg.host = host;
    }
    if let Some(port) = args.port {
        cfg.port = port;
    }
    if let Some(target) = &args.brain {
        cfg.brain = Some(paths.resolve_brain(target));
    }

    let brain_path = cfg.brain.clone().unwrap_or_else(|| paths.current_brain());
    let brain = Arc::new(
        LocalBrainClient::open(&brain_path, cfg.brain_settings.clone())
            .with_context(|| format!("failed to load brain {}", brain_path.display()))?,
    );
    let stats = brain.stats().await?;
    info!(
        "Serving {:?}: {} words, {} contexts, {} lines",
        brain_path, stats.words, stats.contexts, stats.lines
    );

    let listener = TcpListener::bind(cfg.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr()))?;
    info!("borg gateway listening on {}", cfg.bind_addr());

    axum::serve(listener, gateway::router(Arc::clone(&brain)))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Ctrl-C: shutting down");
        })
        .await?;

    brain.save_all().await?;
    info!("Brain saved to {:?}", brain_path);
    Ok(())
}
