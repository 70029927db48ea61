mod config;

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use reconciler::errors::ReconcilerError;
use reconciler::reconcile::{PayloadError, ReconcilePayload, ReconcileStatus, StageOutcome};
use serde_json::json;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "groupsync", about = "Stores messaging groups and curates featured invite links")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short)]
    config_file: PathBuf,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve batch submissions over HTTP
    Serve(ConfigArgs),
    /// Reconcile a single payload file against the configured store
    Reconcile {
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long, short)]
        payload: PathBuf,
    },
    /// Load and validate a config file
    CheckConfig(ConfigArgs),
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("could not initialize metrics: {0}")]
    Metrics(String),
    #[error("{0}")]
    Reconciler(#[from] ReconcilerError),
    #[error("could not read payload: {0}")]
    PayloadFile(std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid payload: {0}")]
    Payload(#[from] PayloadError),
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("groupsync: {e}");
            1
        }
    };
    process::exit(exit_code);
}

fn run(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::CheckConfig(args) => {
            Config::from_file(&args.config_file)?;
            println!("{}: ok", args.config_file.display());
            Ok(0)
        }
        CliCommand::Serve(args) => {
            let config = Config::from_file(&args.config_file)?;
            let _sentry = init_logging(&config.common.logging);
            if let Some(metrics) = &config.common.metrics {
                init_metrics(metrics)?;
            }

            tracing::info!("starting groupsync");
            runtime()?.block_on(reconciler::run(config.reconciler))?;
            Ok(0)
        }
        CliCommand::Reconcile { config, payload } => {
            let config = Config::from_file(&config.config_file)?;
            let _sentry = init_logging(&config.common.logging);

            let body = std::fs::read(&payload).map_err(CliError::PayloadFile)?;
            let payload = ReconcilePayload::from_slice(&body)?;

            runtime()?.block_on(async move {
                let reconciler = reconciler::build_reconciler(&config.reconciler).await?;
                let outcome = reconciler.reconcile(&payload).await;

                let summary = json!({
                    "status": outcome.status().as_str(),
                    "groups": stage_summary(&outcome.groups),
                    "inviteLinks": stage_summary(&outcome.invite_links),
                });
                println!("{summary:#}");

                Ok::<_, CliError>(match outcome.status() {
                    ReconcileStatus::Success => 0,
                    _ => 1,
                })
            })
        }
    }
}

fn stage_summary(stage: &StageOutcome) -> serde_json::Value {
    match stage {
        StageOutcome::NoValidRecords => json!({"succeeded": false, "noValidRecords": true}),
        StageOutcome::Written(outcome) => json!({
            "succeeded": outcome.succeeded,
            "unprocessed": outcome.unprocessed_count,
            "error": outcome.cause.as_ref().map(|e| e.to_string()),
        }),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

/// Installs the fmt subscriber and, when a DSN is configured, Sentry reporting.
/// The returned guard flushes Sentry events when dropped.
fn init_logging(logging: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let guard = logging.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(guard.is_some().then(sentry::integrations::tracing::layer))
        .try_init()
    {
        eprintln!("groupsync: logging already initialized: {e}");
    }

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(config.prefix.as_str()))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    Ok(())
}
