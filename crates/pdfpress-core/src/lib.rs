#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, unreachable_pub)]
#![allow(clippy::module_name_repetitions)]

//! Batch PDF compression core.
//!
//! Layout: `command.rs` (subprocess wrapper), `transform.rs` (stage trait and
//! tool-backed stages), `profile.rs` (quality profiles), `pipeline.rs`
//! (two-stage run with size safety), `batch.rs` (bounded fan-out and ordered
//! fan-in), `aggregate.rs` (totals and delivery shape), `archive.rs` (zip
//! bundling), `sweeper.rs` (retention task), `convert.rs` (Word conversion),
//! `service.rs` (entry points used by the HTTP and CLI surfaces).

pub mod aggregate;
pub mod archive;
pub mod batch;
pub mod command;
pub mod convert;
pub mod error;
pub mod item;
pub mod pipeline;
pub mod profile;
pub mod service;
pub mod sweeper;
pub mod transform;

mod naming;

pub use aggregate::{
    BatchSummary, BatchTotals, Classification, Delivery, FailedItem, format_signed_size, format_size,
};
pub use archive::{ArchiveEntry, ArchiveError, ArchiveManifest, SkippedEntry};
pub use batch::{BatchCoordinator, BatchResult};
pub use command::{ToolCommand, ToolError};
pub use convert::{DocxWriter, ImageStripStage, PythonDocxWriter, ScriptLocation, WordConverter};
pub use error::{PipelineError, PipelineResult};
pub use item::{FailureReason, ItemFailure, ItemOutcome, ItemSource, ProcessingItem, SubmittedItem};
pub use pipeline::{CompressionPipeline, PipelineOutcome};
pub use profile::Profile;
pub use service::{BatchReport, CompressionService, Download, WordReport};
pub use sweeper::{RetentionSweeper, SweepReport, SweeperHandle};
pub use transform::{GhostscriptStage, QpdfStage, Transform};
