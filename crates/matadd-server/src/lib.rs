//! matadd server library entry.
//!
//! Wires config, metrics, the device probe and the add kernel into an axum
//! router. Consumed by the binary (`main.rs`) and by integration tests.

pub mod api;
pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod probe;
pub mod router;
