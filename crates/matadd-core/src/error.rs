//! Shared error type across matadd crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Upload could not be read or decoded.
    InvalidUpload,
    /// Operand shapes differ.
    ShapeMismatch,
    /// Kernel failed or timed out.
    ComputeError,
    /// Device probe binary is not installed.
    ProbeUnavailable,
    /// Device probe ran but failed or produced garbage.
    ProbeExecutionError,
    /// Configuration rejected at startup.
    BadConfig,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::InvalidUpload => "INVALID_UPLOAD",
            ClientCode::ShapeMismatch => "SHAPE_MISMATCH",
            ClientCode::ComputeError => "COMPUTE_ERROR",
            ClientCode::ProbeUnavailable => "PROBE_UNAVAILABLE",
            ClientCode::ProbeExecutionError => "PROBE_EXECUTION_ERROR",
            ClientCode::BadConfig => "BAD_CONFIG",
            ClientCode::Internal => "INTERNAL",
        }
    }

    /// HTTP status the code maps to. Client-caused errors are 4xx, the rest 5xx.
    pub fn http_status(self) -> u16 {
        match self {
            ClientCode::InvalidUpload | ClientCode::ShapeMismatch | ClientCode::BadConfig => 400,
            ClientCode::ComputeError
            | ClientCode::ProbeUnavailable
            | ClientCode::ProbeExecutionError
            | ClientCode::Internal => 500,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MatAddError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum MatAddError {
    #[error("invalid .npz file: {0}")]
    InvalidUpload(String),
    /// The request around the files is unusable (multipart framing, missing
    /// fields, operands that are not matrices). Shares the upload client code.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("Matrices must have the same shape: {} vs {}", fmt_shape(.left), fmt_shape(.right))]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },
    #[error("compute failed: {0}")]
    ComputeError(String),
    #[error("{0}")]
    ProbeUnavailable(String),
    #[error("{0}")]
    ProbeExecutionError(String),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl MatAddError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            MatAddError::InvalidUpload(_) | MatAddError::InvalidRequest(_) => {
                ClientCode::InvalidUpload
            }
            MatAddError::ShapeMismatch { .. } => ClientCode::ShapeMismatch,
            MatAddError::ComputeError(_) => ClientCode::ComputeError,
            MatAddError::ProbeUnavailable(_) => ClientCode::ProbeUnavailable,
            MatAddError::ProbeExecutionError(_) => ClientCode::ProbeExecutionError,
            MatAddError::BadConfig(_) => ClientCode::BadConfig,
            MatAddError::Internal(_) => ClientCode::Internal,
        }
    }
}

/// Render a shape the way NumPy prints tuples: `(2, 3)`, `(4,)`, `()`.
pub fn fmt_shape(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}
