//! anchord — the Pharos anchor daemon.
//!
//! Keeps the inventory of edge nodes, groups, apps, and registries, tracks
//! node liveness, and fans commands out to node agents.
//!
//! # Usage
//!
//! ```text
//! REVERSE_PROXY=false SECURED=false anchord --port 48099 --data-dir /var/lib/pharos-anchor
//! ```

mod app;
mod config;

use std::net::SocketAddr;

use clap::Parser;
use tracing::{error, info};

use crate::app::Application;
use crate::config::{Cli, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,anchord=debug,pharos=debug")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(e) if !e.use_stderr() => {
            e.print()?;
            return Ok(());
        }
        Err(e) => {
            error!(error = %e.render(), "invalid command line");
            return Err(e.into());
        }
    };

    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{e:#}"), "invalid configuration");
            return Err(e);
        }
    };

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("Pharos anchor starting");

    let app = Application::from_config(&config)?;
    let router = app.router();
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
    })
    .await?;

    app.shutdown();
    info!("Pharos anchor stopped");
    Ok(())
}
