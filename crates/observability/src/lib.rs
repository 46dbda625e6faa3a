//! Process-wide tracing setup shared by the worker binary and tests.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::{LogFormat, init, init_from_env};
