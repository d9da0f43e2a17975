use std::future::Future;
use std::path::Path;

use pdfpress_api::ApiServer;
use pdfpress_config::ServiceConfig;
use pdfpress_core::{CompressionService, RetentionSweeper};
use pdfpress_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, init_logging};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Dependencies required to bootstrap the pdfpress server.
pub(crate) struct BootstrapDependencies {
    config: ServiceConfig,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            ServiceConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self { config, telemetry })
    }
}

/// Entry point for the pdfpress server boot sequence.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the working directory cannot
/// be prepared, or the HTTP listener fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    let logging = &dependencies.config.logging;
    init_logging(&LoggingConfig {
        level: &logging.level,
        format: logging
            .format
            .as_deref()
            .map_or_else(LogFormat::infer, LogFormat::parse_or_infer),
        ..LoggingConfig::default()
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    run_app_with(dependencies, shutdown_signal()).await
}

/// Boot sequence over injected dependencies; serves until `shutdown` resolves.
pub(crate) async fn run_app_with<F>(dependencies: BootstrapDependencies, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let _context = GlobalContextGuard::new("serve");
    let BootstrapDependencies { config, telemetry } = dependencies;
    info!(
        upload_dir = %config.upload_dir.display(),
        max_concurrent_jobs = config.max_concurrent_jobs,
        max_upload_size_mb = config.max_upload_size_mb,
        "pdfpress bootstrap starting"
    );

    prepare_work_dir(&config.upload_dir).await?;

    let sweeper = RetentionSweeper::new(
        &config.upload_dir,
        config.cleanup_interval,
        config.retention,
    )
    .with_metrics(telemetry.clone())
    .spawn();

    let service = CompressionService::from_config(&config, telemetry.clone());
    let api = ApiServer::new(service, telemetry, &config);
    let addr = config.socket_addr();
    info!(addr = %addr, "launching api listener");

    let served = api.serve(addr, shutdown).await;
    sweeper.shutdown().await;

    served.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("pdfpress shutdown complete");
    Ok(())
}

async fn prepare_work_dir(dir: &Path) -> AppResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| AppError::io("work_dir.create", dir, source))
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("interrupt received; shutting down"),
        () = terminate => info!("terminate received; shutting down"),
    }
}
