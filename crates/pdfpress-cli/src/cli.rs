//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pdfpress_config::{ConfigError, ServiceConfig};
use pdfpress_core::Profile;
use pdfpress_telemetry::{LogFormat, LoggingConfig, Metrics, init_logging};

use crate::commands::compress::handle_compress;
use crate::commands::word::handle_word;
use crate::error::{CliError, CliResult};

const DEFAULT_CLI_LOG_LEVEL: &str = "warn";

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

/// Shared dependencies for command handlers.
pub(crate) struct CliContext {
    pub(crate) config: ServiceConfig,
    pub(crate) metrics: Metrics,
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let mut config = ServiceConfig::from_env().map_err(|err| config_error(&err))?;
    if let Some(jobs) = cli.jobs {
        config.max_concurrent_jobs = jobs;
    }
    if let Err(err) = init_logging(&LoggingConfig {
        level: &cli.log_level,
        format: LogFormat::Pretty,
        ..LoggingConfig::default()
    }) {
        eprintln!("warning: {err}");
    }
    let metrics = Metrics::new().map_err(CliError::failure)?;
    let ctx = CliContext { config, metrics };

    match cli.command {
        Command::Compress(args) => handle_compress(&ctx, args).await,
        Command::Word(args) => handle_word(&ctx, args).await,
    }
}

fn config_error(err: &ConfigError) -> CliError {
    match err {
        ConfigError::InvalidField {
            field,
            reason,
            value,
        } => CliError::validation(match value {
            Some(value) => format!("invalid {field} ({reason}): `{value}`"),
            None => format!("invalid {field} ({reason})"),
        }),
        ConfigError::EnvFile { source } => {
            CliError::validation(format!("failed to load .env file: {source}"))
        }
    }
}

fn parse_profile(value: &str) -> Result<Profile, String> {
    value.parse().map_err(|_| {
        let names: Vec<&str> = Profile::ALL.iter().map(|profile| profile.as_str()).collect();
        format!("expected one of {}", names.join(", "))
    })
}

fn parse_jobs(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(jobs) => Ok(jobs),
        Err(err) => Err(err.to_string()),
    }
}

#[derive(Parser)]
#[command(
    name = "pdfpress",
    version,
    about = "Compress PDFs and convert them to Word documents"
)]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = DEFAULT_CLI_LOG_LEVEL)]
    log_level: String,
    /// Maximum number of files processed at once.
    #[arg(long, global = true, value_parser = parse_jobs)]
    jobs: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress PDFs, writing `<stem>_compressed<ext>` for each input.
    Compress(CompressArgs),
    /// Convert PDFs to `.docx` documents.
    Word(WordArgs),
}

#[derive(Args)]
pub(crate) struct CompressArgs {
    /// Compression profile: printer, ebook, screen, or extreme.
    #[arg(long, short, value_parser = parse_profile, default_value = "ebook")]
    pub(crate) level: Profile,
    /// Output directory; defaults to each input's directory.
    #[arg(long, short)]
    pub(crate) out: Option<PathBuf>,
    #[arg(required = true)]
    pub(crate) files: Vec<PathBuf>,
}

#[derive(Args)]
pub(crate) struct WordArgs {
    /// Output directory; defaults to each input's directory.
    #[arg(long, short)]
    pub(crate) out: Option<PathBuf>,
    /// Keep text in content-stream order instead of sorting into columns.
    #[arg(long)]
    pub(crate) no_sort: bool,
    #[arg(required = true)]
    pub(crate) files: Vec<PathBuf>,
}
