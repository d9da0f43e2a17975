#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry primitives shared across the pdfpress workspace.
//!
//! Layout: `init.rs` (subscriber installation), `context.rs` (application and
//! request spans plus request-id layers), `metrics.rs` (Prometheus registry),
//! `error.rs` (telemetry errors).

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{
    GlobalContextGuard, RequestContext, propagate_request_id_layer, set_request_id_layer,
};
pub use error::{TelemetryError, TelemetryResult};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{ItemOutcomeLabel, Metrics, MetricsSnapshot};
