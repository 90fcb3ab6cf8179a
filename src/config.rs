//! On-disk settings (component L, §4.L, §6): TOML-backed `TrafficConfig`, atomic save, and
//! env-resolved path, in the style of the reference crate's ingest-config module.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkOutput {
    pub host: String,
    pub port: u16,
    pub gdl90: bool,
    pub flarm: bool,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_queue_size() -> usize {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficConfig {
    #[serde(default)]
    pub ownship_mode_s: Vec<String>,
    #[serde(default)]
    pub ogn_addr: Option<String>,
    #[serde(default = "default_true")]
    pub uat_enabled: bool,
    #[serde(default = "default_true")]
    pub es_enabled: bool,
    #[serde(default = "default_true")]
    pub ogn_enabled: bool,
    #[serde(default)]
    pub aprs_enabled: bool,
    #[serde(default = "default_true")]
    pub gps_enabled: bool,
    #[serde(default)]
    pub imu_sensor_enabled: bool,
    #[serde(default)]
    pub ping_enabled: bool,
    #[serde(default)]
    pub pong_enabled: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub display_traffic_source: bool,
    #[serde(default)]
    pub network_outputs: Vec<NetworkOutput>,
}

fn default_true() -> bool {
    true
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            ownship_mode_s: Vec::new(),
            ogn_addr: None,
            uat_enabled: true,
            es_enabled: true,
            ogn_enabled: true,
            aprs_enabled: false,
            gps_enabled: true,
            imu_sensor_enabled: false,
            ping_enabled: false,
            pong_enabled: false,
            debug: false,
            display_traffic_source: false,
            network_outputs: Vec::new(),
        }
    }
}

impl TrafficConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
        let config: TrafficConfig = toml::from_str(&contents).with_context(|| format!("failed to parse {path:?}"))?;
        Ok(config)
    }

    /// Save config to a TOML file atomically: write to a `.tmp` sibling, then rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config to TOML")?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, &contents).with_context(|| format!("failed to write {tmp_path:?}"))?;
        std::fs::rename(&tmp_path, path).with_context(|| format!("failed to rename {tmp_path:?} to {path:?}"))?;
        Ok(())
    }

    /// Parse `ownship_mode_s` hex strings into addresses, skipping malformed entries with a
    /// warning (startup-time validation, not a fatal error).
    pub fn ownship_addrs(&self) -> Vec<u32> {
        self.ownship_mode_s
            .iter()
            .filter_map(|hex| match u32::from_str_radix(hex.trim(), 16) {
                Ok(addr) => Some(addr),
                Err(_) => {
                    tracing::warn!(hex, "ignoring malformed ownship_mode_s address");
                    None
                }
            })
            .collect()
    }

    pub fn ogn_addr_parsed(&self) -> Option<u32> {
        self.ogn_addr.as_deref().and_then(|hex| u32::from_str_radix(hex.trim(), 16).ok())
    }
}

/// Resolve the settings file path.
///
/// Priority:
/// 1. `SOAR_TRAFFIC_CONFIG` env var
/// 2. `/etc/soar/traffic.toml` (`SOAR_ENV=production`/`staging`)
/// 3. `./traffic.toml` (development)
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("SOAR_TRAFFIC_CONFIG") {
        return PathBuf::from(path);
    }

    match std::env::var("SOAR_ENV").as_deref() {
        Ok("production") | Ok("staging") => PathBuf::from("/etc/soar/traffic.toml"),
        _ => PathBuf::from("./traffic.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_enables_the_primary_protocols() {
        let cfg = TrafficConfig::default();
        assert!(cfg.es_enabled);
        assert!(cfg.uat_enabled);
        assert!(!cfg.aprs_enabled);
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let mut cfg = TrafficConfig::default();
        cfg.ownship_mode_s.push("A12345".to_string());
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: TrafficConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.ownship_mode_s, vec!["A12345".to_string()]);
    }

    #[test]
    fn config_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traffic.toml");
        let mut cfg = TrafficConfig::default();
        cfg.display_traffic_source = true;
        cfg.save(&path).unwrap();
        let loaded = TrafficConfig::load(&path).unwrap();
        assert!(loaded.display_traffic_source);
    }

    #[test]
    fn ownship_addrs_parses_hex_and_skips_malformed() {
        let mut cfg = TrafficConfig::default();
        cfg.ownship_mode_s = vec!["A12345".to_string(), "not-hex".to_string()];
        assert_eq!(cfg.ownship_addrs(), vec![0xA12345]);
    }
}
