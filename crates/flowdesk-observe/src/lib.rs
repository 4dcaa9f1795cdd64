//! Observability setup for Flowdesk: tracing subscriber and optional
//! OpenTelemetry export.

pub mod tracing_setup;
