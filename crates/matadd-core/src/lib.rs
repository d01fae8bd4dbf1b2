//! matadd core: upload decoding, compute kernels, device records, and the
//! shared error type.
//!
//! This crate carries no HTTP or async runtime dependencies so the decoding and
//! compute paths can be exercised directly from tests and other front-ends.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed uploads and probe output surface as `MatAddError`, never a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod array;
pub mod device;
pub mod error;
pub mod kernel;

/// Shared result type.
pub use error::{MatAddError, Result};
