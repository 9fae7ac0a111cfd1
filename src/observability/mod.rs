//! # Observability
//!
//! Structured logging for the binary and for embedders that do not install
//! their own subscriber. The library itself only emits `tracing` events and
//! `metrics` counters:
//!
//! - `pkiproxy_certificates_issued_total{issuer,status}`
//! - `pkiproxy_token_renewals_total{status}`
//!
//! No metrics exporter is installed here; the embedding process picks a recorder.

pub mod logging;

pub use logging::{init_logging, log_config_info};
