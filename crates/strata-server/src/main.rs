//! # Strata
//!
//! World server entry point. Loads the configuration, generates the spawn
//! area, and reads operator commands from stdin until `quit` or Ctrl-C.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use strata_common::ClientId;
use strata_server::config::{ServerConfig, CONFIG_FILE};
use strata_server::console::{Command, Console, Reply};
use strata_world::{BlockRegistry, ClientView, World};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let loaded = ServerConfig::read(&path);
    let filter = match &loaded {
        Ok(Some(config)) => config.log_filter.clone(),
        _ => ServerConfig::default().log_filter,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&filter))?)
        .init();

    info!("Strata starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(Some(config)) => {
            info!("Loaded config from {}", path.display());
            config
        },
        Ok(None) => {
            info!("Config file not found at {}, using defaults", path.display());
            ServerConfig::default()
        },
        Err(e) => {
            warn!("Failed to load config file: {e}");
            ServerConfig::default()
        },
    };

    let registry = match &config.blocks {
        Some(palette) => {
            let contents = std::fs::read_to_string(palette)
                .with_context(|| format!("reading block palette {}", palette.display()))?;
            let registry = BlockRegistry::from_toml_str(&contents)
                .with_context(|| format!("parsing block palette {}", palette.display()))?;
            info!(blocks = registry.len(), "Loaded block palette from {}", palette.display());
            registry
        },
        None => BlockRegistry::default(),
    };

    let world = Arc::new(World::with_registry(config.world.clone(), registry)?);

    let spawn = ClientView::new(
        ClientId::from_raw(0),
        config.spawn_position,
        config.default_render_radius,
    );
    let report = world.generate(&spawn).await?;
    info!(
        created = report.created,
        decorated = report.decorated,
        "Spawn area ready"
    );

    let console = Console::new(Arc::clone(&world), config.default_render_radius);
    run_console(&console).await?;

    let stats = world.stats();
    info!(chunks = stats.total, "Strata shutdown complete");
    Ok(())
}

/// Reads commands from stdin until `quit`, end of input, or Ctrl-C.
async fn run_console(console: &Console) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            },
        };
        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Ok(command) => match console.execute(command).await {
                Ok(Reply::Text(text)) => println!("{text}"),
                Ok(Reply::Quit) => return Ok(()),
                Err(e) => error!("{e}"),
            },
            Err(e) => println!("{e}"),
        }
    }
}
