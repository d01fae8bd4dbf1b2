//! Service config loader (strict parsing).
//!
//! Lookup order: `$MATADD_CONFIG` (must exist), then `matadd.yaml` in the
//! working directory, then built-in defaults.

pub mod schema;

use std::fmt;
use std::fs;
use std::path::Path;

use matadd_core::error::{MatAddError, Result};

pub use schema::{ComputeSection, ProbeSection, ServerSection, ServiceConfig};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MATADD_CONFIG";
/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_PATH: &str = "matadd.yaml";

/// Where the effective config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(String),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(p) => write!(f, "{p}"),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

pub fn load() -> Result<(ServiceConfig, ConfigSource)> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let cfg = load_from_file(&path)?;
        return Ok((cfg, ConfigSource::File(path)));
    }
    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        let cfg = load_from_file(DEFAULT_CONFIG_PATH)?;
        return Ok((cfg, ConfigSource::File(DEFAULT_CONFIG_PATH.to_string())));
    }
    Ok((ServiceConfig::default(), ConfigSource::Defaults))
}

pub fn load_from_file(path: &str) -> Result<ServiceConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MatAddError::BadConfig(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServiceConfig> {
    let cfg: ServiceConfig = serde_yaml::from_str(s)
        .map_err(|e| MatAddError::BadConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
