//! Gomoku session server: entry point.
//!
//! # Usage
//!
//! ```text
//! gomoku-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>        TOML configuration file
//!   --bind <ADDR>          IP address to listen on [file/default: 0.0.0.0]
//!   --port <PORT>          TCP port [file/default: 8080]
//!   --idle-timeout <SECS>  Close silent connections after SECS (0 disables)
//!   --log-level <LEVEL>    tracing level when RUST_LOG is unset
//!   --no-console           Do not read operator commands from stdin
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Flag             |
//! |-----------------------|------------------|
//! | `GOMOKU_CONFIG`       | `--config`       |
//! | `GOMOKU_BIND`         | `--bind`         |
//! | `GOMOKU_PORT`         | `--port`         |
//! | `GOMOKU_IDLE_TIMEOUT` | `--idle-timeout` |
//! | `GOMOKU_LOG_LEVEL`    | `--log-level`    |
//!
//! Precedence is command line / environment, then the configuration file,
//! then built-in defaults.  `RUST_LOG`, when set, overrides the log level.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gomoku_server::application::Registry;
use gomoku_server::domain::ServerConfig;
use gomoku_server::infrastructure::console::run_console;
use gomoku_server::infrastructure::storage::{load_config, FileConfig};
use gomoku_server::infrastructure::{run_server, spawn_reaper};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Multi-room Gomoku server speaking a line-oriented TCP protocol.
#[derive(Debug, Parser)]
#[command(name = "gomoku-server", version, about)]
struct Cli {
    /// TOML configuration file.  A missing file means "use defaults".
    #[arg(long, env = "GOMOKU_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the listener to.
    #[arg(long, env = "GOMOKU_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "GOMOKU_PORT")]
    port: Option<u16>,

    /// Seconds of silence before a connection is closed; 0 disables.
    #[arg(long, env = "GOMOKU_IDLE_TIMEOUT")]
    idle_timeout: Option<u64>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "GOMOKU_LOG_LEVEL")]
    log_level: Option<String>,

    /// Disable the stdin operator console.
    #[arg(long)]
    no_console: bool,
}

impl Cli {
    /// Loads the configuration file (if any) and applies CLI overrides.
    ///
    /// Returns the resolved server config and the log level to use.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or parsed,
    /// or if the bind address is not an IP address.
    fn resolve(&self) -> anyhow::Result<(ServerConfig, String)> {
        let file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => FileConfig::default(),
        };
        self.apply(file)
    }

    fn apply(&self, file: FileConfig) -> anyhow::Result<(ServerConfig, String)> {
        let mut config = file.to_server_config()?;

        if let Some(bind) = &self.bind {
            let ip: IpAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
            config.bind_addr = SocketAddr::new(ip, config.bind_addr.port());
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(secs) = self.idle_timeout {
            config.idle_timeout = ServerConfig::idle_timeout_from_secs(secs);
        }
        let log_level = self
            .log_level
            .clone()
            .unwrap_or_else(|| file.server.log_level.clone());
        Ok((config, log_level))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, log_level) = cli.resolve()?;

    // RUST_LOG wins; otherwise the configured level, falling back to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let registry = Arc::new(Registry::new());
    info!(
        instance = %registry.instance_id(),
        "gomoku server starting on {} (idle timeout: {:?})",
        config.bind_addr, config.idle_timeout
    );

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    let reaper = spawn_reaper(
        Arc::clone(&registry),
        config.finished_ttl,
        config.sweep_interval,
        Arc::clone(&running),
    );

    if !cli.no_console {
        // Detached: stdin reads cannot be cancelled, so the task is left to
        // die with the runtime.
        tokio::spawn(run_console(
            Arc::clone(&registry),
            config.finished_ttl,
            Arc::clone(&running),
        ));
    }

    run_server(config, Arc::clone(&registry), Arc::clone(&running)).await?;

    running.store(false, Ordering::Relaxed);
    reaper.abort();
    info!("gomoku server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
