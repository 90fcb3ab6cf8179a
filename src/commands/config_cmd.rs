//! `config` subcommands (§4.K): initialize and display the on-disk settings file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{self, TrafficConfig};

pub fn handle_config_init(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(config::config_path);
    if path.exists() {
        anyhow::bail!("config already exists at {path:?}; remove it first or pass a different --config path");
    }
    TrafficConfig::default().save(&path).with_context(|| format!("failed to write {path:?}"))?;
    info!(?path, "wrote default configuration");
    Ok(())
}

pub fn handle_config_show(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(config::config_path);
    let cfg = TrafficConfig::load(&path).with_context(|| format!("failed to load {path:?}"))?;
    println!("{}", toml::to_string_pretty(&cfg).context("failed to render config")?);
    Ok(())
}
