//! Periodic reclamation of stale working-directory entries.
//!
//! # Design
//! - Each sweep lists the directory once and judges only that snapshot.
//! - Entries are removed once their modification time is at least `retention` old;
//!   a zero retention removes everything in the snapshot.
//! - Individual delete failures are logged and counted; the sweep carries on.
//! - The background task is owned by a [`SweeperHandle`] and joined on shutdown.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use pdfpress_telemetry::Metrics;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries present in the snapshot.
    pub scanned: usize,
    /// Entries removed.
    pub deleted: usize,
    /// Entries younger than the retention window.
    pub retained: usize,
    /// Entries whose removal failed.
    pub failed: usize,
}

/// Reclaims working-directory entries older than a retention window.
#[derive(Clone)]
pub struct RetentionSweeper {
    dir: PathBuf,
    interval: Duration,
    retention: Duration,
    metrics: Option<Metrics>,
}

impl RetentionSweeper {
    /// Sweeper over `dir`, ticking every `interval`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, interval: Duration, retention: Duration) -> Self {
        Self {
            dir: dir.into(),
            interval,
            retention,
            metrics: None,
        }
    }

    /// Record sweep results in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Directory being swept.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run a single sweep.
    ///
    /// A missing directory is an empty sweep.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Resource`] when the directory cannot be listed.
    pub async fn sweep_once(&self) -> PipelineResult<SweepReport> {
        let started = SystemTime::now();
        let snapshot = match self.snapshot().await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.dir.display(), "sweep skipped; directory absent");
                return Ok(SweepReport::default());
            }
            Err(source) => return Err(PipelineError::io("sweeper.read_dir", &self.dir, source)),
        };

        let mut report = SweepReport {
            scanned: snapshot.len(),
            ..SweepReport::default()
        };
        for path in snapshot {
            let metadata = match tokio::fs::symlink_metadata(&path).await {
                Ok(metadata) => metadata,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => {
                    warn!(error = %err, path = %path.display(), "failed to stat sweep candidate");
                    report.failed += 1;
                    continue;
                }
            };
            if !self.is_expired(started, metadata.modified().ok()) {
                report.retained += 1;
                continue;
            }
            let removed = if metadata.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match removed {
                Ok(()) => report.deleted += 1,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(error = %err, path = %path.display(), "failed to delete stale entry");
                    report.failed += 1;
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_sweep(report.deleted as u64, report.failed as u64);
        }
        if report.deleted > 0 || report.failed > 0 {
            info!(
                path = %self.dir.display(),
                scanned = report.scanned,
                deleted = report.deleted,
                failed = report.failed,
                "sweep finished"
            );
        }
        Ok(report)
    }

    /// Start sweeping in the background until the returned handle is shut down.
    ///
    /// The first sweep runs one `interval` after spawning.
    #[must_use]
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown, mut signal) = watch::channel(false);
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                path = %self.dir.display(),
                interval_secs = self.interval.as_secs(),
                retention_secs = self.retention.as_secs(),
                "retention sweeper started"
            );
            loop {
                tokio::select! {
                    changed = signal.changed() => {
                        if changed.is_err() || *signal.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep_once().await {
                            warn!(error = %err, path = %self.dir.display(), "sweep failed");
                        }
                    }
                }
            }
            info!("retention sweeper stopped");
        });
        SweeperHandle { shutdown, task }
    }

    async fn snapshot(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        Ok(paths)
    }

    fn is_expired(&self, now: SystemTime, modified: Option<SystemTime>) -> bool {
        if self.retention.is_zero() {
            return true;
        }
        modified
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age >= self.retention)
    }
}

/// Owner of a running sweeper task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "retention sweeper task did not stop cleanly");
        }
    }
}
