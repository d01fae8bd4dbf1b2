//! Shared fixtures: array payload builders, multipart bodies, stub kernels and
//! probes, and a router harness.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;
use zip::write::FileOptions;
use zip::CompressionMethod;

use matadd_core::device::{parse_query_output, DeviceStat};
use matadd_core::error::{MatAddError, Result};
use matadd_core::kernel::{AddKernel, HostKernel};
use matadd_server::app_state::AppState;
use matadd_server::config::ServiceConfig;
use matadd_server::probe::DeviceProbe;
use matadd_server::router::build_router;

// --------------------
// Array payloads
// --------------------
fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [n] => format!("({n},)"),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn npy(descr: &str, shape: &[usize], fortran: bool, data: &[u8]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '{descr}', 'fortran_order': {}, 'shape': {}, }}",
        if fortran { "True" } else { "False" },
        shape_literal(shape)
    );
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut out = b"\x93NUMPY\x01\x00".to_vec();
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(data);
    out
}

/// `.npy` bytes for a C-ordered float32 array.
pub fn npy_f32(shape: &[usize], values: &[f32]) -> Vec<u8> {
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    npy("<f4", shape, false, &data)
}

/// `.npy` bytes for a float64 array stored column-major.
pub fn npy_f64_fortran(shape: &[usize], column_major: &[f64]) -> Vec<u8> {
    let data: Vec<u8> = column_major.iter().flat_map(|v| v.to_le_bytes()).collect();
    npy("<f8", shape, true, &data)
}

/// Wrap `.npy` members into an uncompressed `.npz` archive, in order, the way
/// `numpy.savez` writes it. Archive size tracks the array size.
pub fn npz(members: &[(&str, Vec<u8>)]) -> Vec<u8> {
    npz_with(members, CompressionMethod::Stored)
}

/// Like [`npz`] but deflated, as `numpy.savez_compressed` writes it.
pub fn npz_deflated(members: &[(&str, Vec<u8>)]) -> Vec<u8> {
    npz_with(members, CompressionMethod::Deflated)
}

fn npz_with(members: &[(&str, Vec<u8>)], method: CompressionMethod) -> Vec<u8> {
    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(method);
    for (name, body) in members {
        w.start_file(*name, opts).unwrap();
        w.write_all(body).unwrap();
    }
    w.finish().unwrap().into_inner()
}

/// Single-array `.npz`, the way `numpy.savez(f, x)` writes it.
pub fn npz_f32(shape: &[usize], values: &[f32]) -> Vec<u8> {
    npz(&[("arr_0.npy", npy_f32(shape, values))])
}

// --------------------
// Requests
// --------------------
pub const BOUNDARY: &str = "matadd-test-boundary";

pub fn multipart_body(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
                 Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}.npz\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn add_request(parts: &[(&str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/add")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

pub async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, req).await;
    let v = serde_json::from_slice(&body)
        .unwrap_or_else(|e| panic!("non-JSON body ({e}): {}", String::from_utf8_lossy(&body)));
    (status, v)
}

// --------------------
// Kernels
// --------------------

/// Host addition that records how often it ran and what it produced.
#[derive(Default)]
pub struct CountingKernel {
    calls: AtomicUsize,
    last_sum: Mutex<Vec<f32>>,
}

impl CountingKernel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_sum(&self) -> Vec<f32> {
        self.last_sum.lock().unwrap().clone()
    }
}

impl AddKernel for CountingKernel {
    fn device(&self) -> &'static str {
        "test"
    }

    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let out = HostKernel.add(a, b)?;
        *self.last_sum.lock().unwrap() = out.clone();
        Ok(out)
    }
}

pub struct FailingKernel;

impl AddKernel for FailingKernel {
    fn device(&self) -> &'static str {
        "test"
    }

    fn add(&self, _a: &[f32], _b: &[f32]) -> Result<Vec<f32>> {
        Err(MatAddError::ComputeError("device out of memory".into()))
    }
}

pub struct SlowKernel(pub Duration);

impl AddKernel for SlowKernel {
    fn device(&self) -> &'static str {
        "test"
    }

    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        std::thread::sleep(self.0);
        HostKernel.add(a, b)
    }
}

// --------------------
// Probes
// --------------------

/// Replays canned probe stdout through the real parser.
pub struct StaticProbe(pub String);

#[async_trait]
impl DeviceProbe for StaticProbe {
    async fn query(&self) -> Result<Vec<DeviceStat>> {
        parse_query_output(&self.0)
    }
}

/// Returns a fixed error every time.
pub struct BrokenProbe(pub fn() -> MatAddError);

#[async_trait]
impl DeviceProbe for BrokenProbe {
    async fn query(&self) -> Result<Vec<DeviceStat>> {
        Err((self.0)())
    }
}

pub struct SlowProbe(pub Duration);

#[async_trait]
impl DeviceProbe for SlowProbe {
    async fn query(&self) -> Result<Vec<DeviceStat>> {
        tokio::time::sleep(self.0).await;
        Ok(Vec::new())
    }
}

// --------------------
// Harness
// --------------------
pub fn app_with(
    cfg: ServiceConfig,
    probe: Arc<dyn DeviceProbe>,
    kernel: Arc<dyn AddKernel>,
) -> (AppState, Router) {
    let state = AppState::with_parts(cfg, probe, kernel);
    let router = build_router(state.clone());
    (state, router)
}

pub fn default_app(kernel: Arc<dyn AddKernel>) -> (AppState, Router) {
    app_with(
        ServiceConfig::default(),
        Arc::new(StaticProbe(String::new())),
        kernel,
    )
}
