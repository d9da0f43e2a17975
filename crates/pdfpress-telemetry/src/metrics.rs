//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes counters for batch throughput, byte savings, and sweeper activity.

use std::sync::Arc;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};

/// Outcome label recorded for each processed batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcomeLabel {
    /// The pipeline produced a smaller output.
    Compressed,
    /// The safety invariant restored the original bytes.
    Reverted,
    /// The item failed and produced no output.
    Failed,
}

impl ItemOutcomeLabel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Compressed => "compressed",
            Self::Reverted => "reverted",
            Self::Failed => "failed",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    batches_total: IntCounter,
    batch_items_total: IntCounterVec,
    bytes_saved_total: IntCounter,
    active_jobs: IntGauge,
    sweep_deleted_total: IntCounter,
    sweep_failures_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting and tests.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Total batches accepted by the service.
    pub batches_total: u64,
    /// Items that produced a smaller output.
    pub items_compressed: u64,
    /// Items reverted to their original bytes.
    pub items_reverted: u64,
    /// Items that failed.
    pub items_failed: u64,
    /// Total bytes saved across all successful items.
    pub bytes_saved_total: u64,
    /// Pipeline runs currently holding a worker permit.
    pub active_jobs: i64,
    /// Working-directory entries removed by the sweeper.
    pub sweep_deleted_total: u64,
    /// Sweeper delete attempts that failed.
    pub sweep_failures_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )
        .map_err(|source| TelemetryError::metric_build("http_requests_total", source))?;
        let batches_total = counter("batches_total", "Batches accepted for compression")?;
        let batch_items_total = IntCounterVec::new(
            Opts::new("batch_items_total", "Batch items processed by outcome"),
            &["outcome"],
        )
        .map_err(|source| TelemetryError::metric_build("batch_items_total", source))?;
        let bytes_saved_total =
            counter("bytes_saved_total", "Bytes saved across successful items")?;
        let active_jobs = IntGauge::with_opts(Opts::new(
            "active_jobs",
            "Pipeline runs currently holding a worker permit",
        ))
        .map_err(|source| TelemetryError::metric_build("active_jobs", source))?;
        let sweep_deleted_total =
            counter("sweep_deleted_total", "Working-directory entries reclaimed")?;
        let sweep_failures_total =
            counter("sweep_failures_total", "Failed working-directory deletions")?;

        register(&registry, "http_requests_total", http_requests_total.clone())?;
        register(&registry, "batches_total", batches_total.clone())?;
        register(&registry, "batch_items_total", batch_items_total.clone())?;
        register(&registry, "bytes_saved_total", bytes_saved_total.clone())?;
        register(&registry, "active_jobs", active_jobs.clone())?;
        register(&registry, "sweep_deleted_total", sweep_deleted_total.clone())?;
        register(&registry, "sweep_failures_total", sweep_failures_total.clone())?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                batches_total,
                batch_items_total,
                bytes_saved_total,
                active_jobs,
                sweep_deleted_total,
                sweep_failures_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count one accepted batch.
    pub fn inc_batch(&self) {
        self.inner.batches_total.inc();
    }

    /// Count one processed item with its outcome.
    pub fn inc_item(&self, outcome: ItemOutcomeLabel) {
        self.inner
            .batch_items_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Add saved bytes for a successful item.
    pub fn add_bytes_saved(&self, bytes: u64) {
        self.inner.bytes_saved_total.inc_by(bytes);
    }

    /// Mark a pipeline run as started.
    pub fn job_started(&self) {
        self.inner.active_jobs.inc();
    }

    /// Mark a pipeline run as finished.
    pub fn job_finished(&self) {
        self.inner.active_jobs.dec();
    }

    /// Record the outcome of one sweep.
    pub fn record_sweep(&self, deleted: u64, failed: u64) {
        self.inner.sweep_deleted_total.inc_by(deleted);
        self.inner.sweep_failures_total.inc_by(failed);
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Render`] if the gathered families cannot be encoded.
    pub fn render(&self) -> TelemetryResult<String> {
        TextEncoder::new()
            .encode_to_string(&self.inner.registry.gather())
            .map_err(|source| TelemetryError::Render { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let items = |outcome: ItemOutcomeLabel| {
            self.inner
                .batch_items_total
                .with_label_values(&[outcome.as_str()])
                .get()
        };
        MetricsSnapshot {
            batches_total: self.inner.batches_total.get(),
            items_compressed: items(ItemOutcomeLabel::Compressed),
            items_reverted: items(ItemOutcomeLabel::Reverted),
            items_failed: items(ItemOutcomeLabel::Failed),
            bytes_saved_total: self.inner.bytes_saved_total.get(),
            active_jobs: self.inner.active_jobs.get(),
            sweep_deleted_total: self.inner.sweep_deleted_total.get(),
            sweep_failures_total: self.inner.sweep_failures_total.get(),
        }
    }
}

fn counter(name: &'static str, help: &str) -> TelemetryResult<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::metric_build(name, source))
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> TelemetryResult<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::metric_register(name, source))
}
