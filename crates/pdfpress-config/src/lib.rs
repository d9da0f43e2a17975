#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

//! Environment-backed configuration for pdfpress.
//!
//! Layout: `model.rs` (typed configuration), `loader.rs` (environment
//! parsing and validation), `defaults.rs` (fallback values), `error.rs`.

mod defaults;
pub mod error;
pub mod loader;
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use model::{LoggingSettings, ServiceConfig, ToolPaths};
