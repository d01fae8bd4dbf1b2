//! Top-level facade crate for matadd.
//!
//! Re-exports the core types and the server library so users can depend on a single crate.

pub mod core {
    pub use matadd_core::*;
}

pub mod server {
    pub use matadd_server::*;
}
