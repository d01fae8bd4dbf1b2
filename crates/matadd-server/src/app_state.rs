//! Shared application state for the matadd server.
//!
//! Holds the validated config, the process-wide metrics registry, and the two
//! external collaborators (device probe and add kernel) behind trait objects
//! so tests can substitute them.

use std::sync::Arc;

use matadd_core::kernel::{AddKernel, HostKernel};

use crate::config::ServiceConfig;
use crate::obs::ServiceMetrics;
use crate::probe::{DeviceProbe, NvidiaSmiProbe};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServiceConfig,
    metrics: ServiceMetrics,
    probe: Arc<dyn DeviceProbe>,
    kernel: Arc<dyn AddKernel>,
}

impl AppState {
    /// Production wiring: `nvidia-smi` probe from config, host kernel.
    pub fn new(cfg: ServiceConfig) -> Self {
        let probe = Arc::new(NvidiaSmiProbe::new(cfg.probe.binary.clone()));
        Self::with_parts(cfg, probe, Arc::new(HostKernel))
    }

    pub fn with_parts(
        cfg: ServiceConfig,
        probe: Arc<dyn DeviceProbe>,
        kernel: Arc<dyn AddKernel>,
    ) -> Self {
        tracing::debug!(device = kernel.device(), "add kernel registered");
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                metrics: ServiceMetrics::new(),
                probe,
                kernel,
            }),
        }
    }

    pub fn cfg(&self) -> &ServiceConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.inner.metrics
    }

    pub fn probe(&self) -> Arc<dyn DeviceProbe> {
        Arc::clone(&self.inner.probe)
    }

    pub fn kernel(&self) -> Arc<dyn AddKernel> {
        Arc::clone(&self.inner.kernel)
    }
}
