// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! relayd: the relay broker daemon
//!
//! Serves the framed publish/subscribe protocol over TCP. Usage:
//! `relayd [data-dir]` — the data directory holds the per-topic logs, the
//! cursor snapshot, and the instance lock file.

use std::path::PathBuf;

use relay_daemon::{Config, Server};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let data_dir = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        std::env::current_dir()?
    };

    let config = Config::for_data_dir(&data_dir);

    let server = match Server::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            error!("failed to start relayd: {}", e);
            return Err(e.into());
        }
    };

    let addr = server.local_addr()?;
    info!("relayd listening on {}", addr);

    // Signal ready for parent process (specs and supervisors wait for this)
    println!("READY {}", addr);

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = server.run() => {}
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        }
    }

    info!("relayd stopped");
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // RELAY_LOG follows the usual env-filter syntax; default to info
    let filter = EnvFilter::try_from_env("RELAY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
