//! Axum router wiring.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::{api, app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.cfg().server.max_upload_bytes;

    Router::new()
        .route("/health", get(ops::health))
        .route("/gpu-info", get(api::gpu_info::gpu_info))
        .route("/add", post(api::add::add_matrices))
        .route("/metrics", get(ops::metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
