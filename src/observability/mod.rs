//! Observability: structured logging through `tracing`.
//!
//! Console output in pretty, compact or JSON format, filtered by the
//! configured level or `RUST_LOG`.

mod tracing_init;

pub use tracing_init::*;
