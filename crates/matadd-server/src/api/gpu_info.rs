//! `GET /gpu-info`: device inventory plus memory gauge refresh.

use axum::{extract::State, Json};
use serde::Serialize;

use matadd_core::device::DeviceStat;
use matadd_core::error::MatAddError;

use crate::api::ApiError;
use crate::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct GpuInfoResponse {
    pub gpus: Vec<DeviceStat>,
}

pub async fn gpu_info(State(app): State<AppState>) -> Result<Json<GpuInfoResponse>, ApiError> {
    let probe = app.probe();
    let timeout = app.cfg().probe.timeout();

    let stats = match tokio::time::timeout(timeout, probe.query()).await {
        Ok(res) => res,
        Err(_) => Err(MatAddError::ProbeExecutionError(format!(
            "device probe timed out after {} ms",
            app.cfg().probe.timeout_ms
        ))),
    }
    .map_err(|e| {
        tracing::warn!(error = %e, "device probe failed");
        ApiError(e)
    })?;

    // Parsing is all-or-nothing, so gauges only move once the whole list is good.
    for stat in &stats {
        app.metrics().set_device_memory(stat);
    }
    tracing::debug!(devices = stats.len(), "device inventory refreshed");

    Ok(Json(GpuInfoResponse { gpus: stats }))
}
