//! Device inventory probes.
//!
//! `DeviceProbe` hides where device stats come from. The production probe
//! shells out to `nvidia-smi`; tests plug in their own implementations.

use std::io::ErrorKind;

use async_trait::async_trait;
use tokio::process::Command;

use matadd_core::device::{parse_query_output, DeviceStat, QUERY_ARGS};
use matadd_core::error::{MatAddError, Result};

#[async_trait]
pub trait DeviceProbe: Send + Sync {
    /// Query every visible device, in probe order.
    async fn query(&self) -> Result<Vec<DeviceStat>>;
}

/// Runs `nvidia-smi` (or a compatible binary) and parses its CSV output.
///
/// The child is killed if the returned future is dropped, so callers can bound
/// the call with `tokio::time::timeout`.
#[derive(Debug, Clone)]
pub struct NvidiaSmiProbe {
    binary: String,
}

impl NvidiaSmiProbe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait]
impl DeviceProbe for NvidiaSmiProbe {
    async fn query(&self) -> Result<Vec<DeviceStat>> {
        let output = Command::new(&self.binary)
            .args(QUERY_ARGS)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    MatAddError::ProbeUnavailable(format!("{} not found on host", self.binary))
                }
                _ => MatAddError::ProbeExecutionError(format!(
                    "{} failed to start: {e}",
                    self.binary
                )),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MatAddError::ProbeExecutionError(format!(
                "{} failed: {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| {
            MatAddError::ProbeExecutionError(format!("{} printed non-UTF-8 output", self.binary))
        })?;
        parse_query_output(&stdout)
    }
}
