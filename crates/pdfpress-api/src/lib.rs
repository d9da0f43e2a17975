#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

//! HTTP surface for pdfpress.
//!
//! Layout: `http/router.rs` (router and server host), `http/compress.rs`,
//! `http/convert.rs`, `http/download.rs`, `http/health.rs` (handlers),
//! `http/errors.rs` (problem responses), `http/telemetry.rs` (request
//! metrics), `models.rs` (response bodies), `state.rs`, `error.rs`.

pub mod error;
pub mod http;
pub mod models;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
