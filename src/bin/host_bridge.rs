//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! Reads `CommandEnvelope` messages as newline-delimited JSON from stdin,
//! drives the playback runtime, and writes `ResponseEnvelope` and
//! `EventEnvelope` messages to stdout.
//!
//! Configuration comes from `REEL_CONFIG` (or the default config path when
//! present) plus `REEL_*` environment overrides. All tracing output goes to
//! stderr so that stdout remains a clean JSON protocol channel.

use anyhow::Context;
use reel::host::stdio::run_stdio_bridge;
use reel::{Collaborators, ReelConfig};
use std::path::PathBuf;

fn load_config() -> anyhow::Result<ReelConfig> {
    let (path, explicit) = match std::env::var_os("REEL_CONFIG") {
        Some(path) => (PathBuf::from(path), true),
        None => (ReelConfig::default_config_path(), false),
    };

    let mut config = if explicit || path.exists() {
        ReelConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        ReelConfig::default()
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for the JSON protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("reel-host starting");

    let config = load_config()?;
    let collaborators = Collaborators::from_config(&config).context("invalid collaborator config")?;

    run_stdio_bridge(&config, collaborators).await.map_err(|e| {
        tracing::error!(error = %e, "reel-host exited with error");
        anyhow::anyhow!("reel-host failed: {e}")
    })?;

    tracing::info!("reel-host shut down cleanly");
    Ok(())
}
