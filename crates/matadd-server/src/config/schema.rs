use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use matadd_core::error::{MatAddError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub probe: ProbeSection,

    #[serde(default)]
    pub compute: ComputeSection,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            probe: ProbeSection::default(),
            compute: ComputeSection::default(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MatAddError::BadConfig("unsupported config version".into()));
        }

        self.server.validate()?;
        self.probe.validate()?;
        self.compute.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !(1024..=(1 << 30)).contains(&self.max_upload_bytes) {
            return Err(MatAddError::BadConfig(
                "server.max_upload_bytes must be between 1024 and 1073741824".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            MatAddError::BadConfig(format!(
                "server.listen must be a valid SocketAddr, got {:?}",
                self.listen
            ))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeSection {
    #[serde(default = "default_probe_binary")]
    pub binary: String,

    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            binary: default_probe_binary(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl ProbeSection {
    pub fn validate(&self) -> Result<()> {
        if self.binary.trim().is_empty() {
            return Err(MatAddError::BadConfig("probe.binary must not be empty".into()));
        }
        if !(100..=60000).contains(&self.timeout_ms) {
            return Err(MatAddError::BadConfig(
                "probe.timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComputeSection {
    #[serde(default = "default_compute_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ComputeSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_compute_timeout_ms(),
        }
    }
}

impl ComputeSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=600000).contains(&self.timeout_ms) {
            return Err(MatAddError::BadConfig(
                "compute.timeout_ms must be between 100 and 600000".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}
fn default_max_upload_bytes() -> usize {
    64 * 1024 * 1024
}
fn default_probe_binary() -> String {
    "nvidia-smi".into()
}
fn default_probe_timeout_ms() -> u64 {
    5000
}
fn default_compute_timeout_ms() -> u64 {
    30000
}
