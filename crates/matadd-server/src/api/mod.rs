//! JSON API handlers (`/add`, `/gpu-info`) and their error mapping.
//!
//! Every failure leaves a handler as `ApiError`, which renders
//! `{"detail": ..., "code": ...}` with the status taken from the error's
//! client code.

pub mod add;
pub mod gpu_info;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use matadd_core::error::MatAddError;

#[derive(Debug)]
pub struct ApiError(pub MatAddError);

impl From<MatAddError> for ApiError {
    fn from(e: MatAddError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "detail": self.0.to_string(),
            "code": code.as_str(),
        });
        (status, Json(body)).into_response()
    }
}
