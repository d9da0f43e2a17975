//! Errors raised while wiring logging and metrics.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Failures from subscriber installation and the metrics registry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already set, or installing one failed.
    #[error("failed to install tracing subscriber")]
    Subscriber {
        /// Underlying subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A collector could not be built or added to the registry.
    #[error("failed to set up metric")]
    Metric {
        /// `build` or `register`.
        operation: &'static str,
        /// Metric name.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: prometheus::Error,
    },
    /// Gathered metrics could not be rendered as Prometheus text.
    #[error("failed to render metrics")]
    Render {
        /// Underlying Prometheus error.
        #[source]
        source: prometheus::Error,
    },
}

impl TelemetryError {
    pub(crate) const fn metric_build(name: &'static str, source: prometheus::Error) -> Self {
        Self::Metric {
            operation: "build",
            name,
            source,
        }
    }

    pub(crate) const fn metric_register(name: &'static str, source: prometheus::Error) -> Self {
        Self::Metric {
            operation: "register",
            name,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn metric_errors_keep_name_and_source() {
        let err = TelemetryError::metric_register(
            "batches_total",
            prometheus::Error::AlreadyReg,
        );
        assert_eq!(err.to_string(), "failed to set up metric");
        assert!(matches!(
            err,
            TelemetryError::Metric {
                operation: "register",
                name: "batches_total",
                ..
            }
        ));
        assert!(err.source().is_some());
    }

    #[test]
    fn render_error_has_constant_message() {
        let err = TelemetryError::Render {
            source: prometheus::Error::Msg("bad family".into()),
        };
        assert_eq!(err.to_string(), "failed to render metrics");
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("bad family")
        );
    }
}
