//! Observability setup for Heartline.
//!
//! Installs the global tracing subscriber (human or JSON output, optional
//! OpenTelemetry span export) and flushes it on exit.

pub mod tracing_setup;

pub use tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
