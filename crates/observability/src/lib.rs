//! Tracing/logging setup shared by medstock binaries.

/// Subscriber configuration (filters, output format).
pub mod subscriber;

pub use subscriber::{LogFormat, init, init_with};
