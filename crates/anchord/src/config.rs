//! Startup configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{ArgAction, Parser};

use pharos_dispatch::Environment;

#[derive(Debug, Parser)]
#[command(name = "anchord", about = "Pharos anchor — edge fleet control plane")]
pub struct Cli {
    /// Port to listen on.
    #[arg(long, default_value = "48099")]
    pub port: u16,

    /// Data directory for persistent state.
    #[arg(long, default_value = "/var/lib/pharos-anchor")]
    pub data_dir: PathBuf,

    /// Keep all state in memory; nothing survives a restart.
    #[arg(long)]
    pub in_memory: bool,

    /// Timeout for each call to a node, in seconds.
    #[arg(long, default_value = "30")]
    pub dispatch_timeout_secs: u64,

    /// Nodes are reached over https through a reverse proxy.
    #[arg(long, env = "SECURED", default_value_t = false, action = ArgAction::Set, hide_env_values = true)]
    pub secured: bool,

    /// Nodes are reached through a reverse proxy.
    #[arg(long, env = "REVERSE_PROXY", default_value_t = false, action = ArgAction::Set, hide_env_values = true)]
    pub reverse_proxy: bool,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// `None` for an in-memory store.
    pub data_dir: Option<PathBuf>,
    pub dispatch_timeout: Duration,
    pub environment: Environment,
}

impl Config {
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let environment = Environment::new(cli.reverse_proxy, cli.secured)
            .context("invalid deployment environment")?;

        if cli.dispatch_timeout_secs == 0 {
            bail!("--dispatch-timeout-secs must be greater than zero");
        }

        Ok(Self {
            port: cli.port,
            data_dir: (!cli.in_memory).then_some(cli.data_dir),
            dispatch_timeout: Duration::from_secs(cli.dispatch_timeout_secs),
            environment,
        })
    }
}
