//! `POST /add`: element-wise sum of two uploaded matrices.
//!
//! Pipeline: read `file_a`/`file_b` -> decode -> shape check -> rank check ->
//! normalize to f32 and run the kernel on a blocking worker. Only the kernel
//! call is reported as `elapsed_time`; end-to-end latency goes to the
//! histogram on success.
//!
//! The response always names the GPU as the device; the kernel's own label
//! only goes to the log.

use std::time::Instant;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Serialize;

use matadd_core::array::decode_upload;
use matadd_core::error::{fmt_shape, MatAddError, Result};
use matadd_core::kernel::run_add;

use crate::api::ApiError;
use crate::app_state::AppState;

const ENDPOINT: &str = "/add";
const METHOD: &str = "POST";

pub const FIELD_A: &str = "file_a";
pub const FIELD_B: &str = "file_b";

/// Device advertised in every successful response.
pub const RESPONSE_DEVICE: &str = "GPU";

#[derive(Debug, Serialize)]
pub struct AddResponse {
    pub matrix_shape: [usize; 2],
    pub elapsed_time: f64,
    pub device: &'static str,
}

pub async fn add_matrices(
    State(app): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<AddResponse>, ApiError> {
    let started = Instant::now();

    let outcome = match multipart {
        Ok(m) => run(&app, m).await,
        Err(rej) => Err(MatAddError::InvalidRequest(rej.body_text())),
    };

    match outcome {
        Ok(body) => {
            app.metrics().record_request(ENDPOINT, METHOD, 200);
            app.metrics().observe_latency(ENDPOINT, METHOD, started.elapsed());
            Ok(Json(body))
        }
        Err(e) => {
            let status = e.client_code().http_status();
            app.metrics().record_request(ENDPOINT, METHOD, status);
            if status >= 500 {
                tracing::warn!(error = %e, "matrix add failed");
            } else {
                tracing::debug!(error = %e, "matrix add rejected");
            }
            Err(ApiError(e))
        }
    }
}

async fn run(app: &AppState, multipart: Multipart) -> Result<AddResponse> {
    let (raw_a, raw_b) = read_operands(multipart).await?;
    let member_limit = app.cfg().server.max_upload_bytes as u64;
    let a = decode_upload(raw_a, member_limit)?;
    let b = decode_upload(raw_b, member_limit)?;

    if a.shape() != b.shape() {
        return Err(MatAddError::ShapeMismatch {
            left: a.shape().to_vec(),
            right: b.shape().to_vec(),
        });
    }
    let &[rows, cols] = a.shape() else {
        return Err(MatAddError::InvalidRequest(format!(
            "expected a 2-D matrix, got shape {}",
            fmt_shape(a.shape())
        )));
    };

    let kernel = app.kernel();
    let kernel_device = kernel.device();
    let timeout = app.cfg().compute.timeout();

    let task = tokio::task::spawn_blocking(move || {
        let lhs = a.to_f32();
        let rhs = b.to_f32();
        run_add(kernel.as_ref(), &lhs, &rhs, a.shape())
    });

    let result = match tokio::time::timeout(timeout, task).await {
        Err(_) => {
            return Err(MatAddError::ComputeError(format!(
                "kernel did not finish within {} ms",
                app.cfg().compute.timeout_ms
            )))
        }
        Ok(Err(join)) => {
            return Err(MatAddError::ComputeError(format!("kernel worker failed: {join}")))
        }
        Ok(Ok(res)) => res?,
    };

    tracing::info!(
        rows,
        cols,
        kernel_device,
        elapsed_ms = result.elapsed.as_secs_f64() * 1000.0,
        "matrix add done"
    );

    Ok(AddResponse {
        matrix_shape: [rows, cols],
        elapsed_time: result.elapsed.as_secs_f64(),
        device: RESPONSE_DEVICE,
    })
}

/// Pull both operand fields out of the form. Unknown fields are skipped.
async fn read_operands(mut multipart: Multipart) -> Result<(Bytes, Bytes)> {
    let mut file_a = None;
    let mut file_b = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MatAddError::InvalidRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        let slot = match name.as_deref() {
            Some(FIELD_A) => &mut file_a,
            Some(FIELD_B) => &mut file_b,
            other => {
                tracing::debug!(field = ?other, "ignoring unexpected multipart field");
                continue;
            }
        };
        let data = field.bytes().await.map_err(|e| {
            let name = name.as_deref().unwrap_or("");
            MatAddError::InvalidRequest(format!("failed to read field {name}: {e}"))
        })?;
        *slot = Some(data);
    }

    let missing = |f: &str| MatAddError::InvalidRequest(format!("missing upload field {f}"));
    Ok((
        file_a.ok_or_else(|| missing(FIELD_A))?,
        file_b.ok_or_else(|| missing(FIELD_B))?,
    ))
}
