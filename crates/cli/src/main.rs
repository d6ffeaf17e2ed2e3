mod metrics;
mod progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidscribe_core::{
    load_config_or_default, validate_config, HttpBackend, JobOrchestrator, JobSnapshot, JobStatus,
    TranscriptionBackend,
};

use progress::ProgressPrinter;

/// Upload a video to the processing service and print its transcript and summary.
#[derive(Parser, Debug)]
#[command(name = "vidscribe", version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML). Missing files fall back to defaults.
    #[arg(short, long, env = "VIDSCRIBE_CONFIG", default_value = "vidscribe.toml")]
    config: PathBuf,

    /// Override the backend base URL from the configuration.
    #[arg(long)]
    base_url: Option<String>,

    /// Print Prometheus metrics before exiting.
    #[arg(long, action)]
    print_metrics: bool,

    /// Video file to transcribe.
    video: PathBuf,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the job completed.
async fn run() -> Result<bool> {
    // Logs go to stderr, results to stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    info!("Loading configuration from {:?}", args.config);
    let mut config = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    if let Some(base_url) = args.base_url {
        config.backend.base_url = base_url;
    }
    validate_config(&config).context("Configuration validation failed")?;
    info!("Backend: {}", config.backend.base_url);

    let content = tokio::fs::read(&args.video)
        .await
        .with_context(|| format!("Failed to read video {:?}", args.video))?;
    let filename = upload_name(&args.video);

    let backend: Arc<dyn TranscriptionBackend> = Arc::new(
        HttpBackend::new(config.backend.clone()).context("Failed to create HTTP backend")?,
    );
    let orchestrator = JobOrchestrator::new(backend, config.polling.clone());

    let job = {
        let orchestrator = orchestrator.clone();
        async move {
            let mut printer = ProgressPrinter::default();
            let mut handle = orchestrator.submit(content, filename).await;
            printer.show(handle.last_snapshot());
            while let Some(snapshot) = handle.next_update().await {
                printer.show(&snapshot);
            }
            handle.last_snapshot().clone()
        }
    };

    let finished = tokio::select! {
        finished = job => finished,
        _ = shutdown_signal() => {
            warn!("Interrupted, cancelling job");
            orchestrator.cancel().await;
            orchestrator.snapshot().await
        }
    };

    let completed = report(&finished);

    if args.print_metrics {
        print!("{}", metrics::encode_metrics().context("Failed to encode metrics")?);
    }

    Ok(completed)
}

/// Name the file is uploaded under: the last path component.
fn upload_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Print the outcome. Returns whether the job completed.
fn report(snapshot: &JobSnapshot) -> bool {
    if snapshot.cancelled {
        eprintln!("Job cancelled");
        return false;
    }

    match (snapshot.status, &snapshot.result) {
        (JobStatus::Complete, Some(result)) => {
            println!("Transcript:\n{}\n", result.transcript);
            println!("Summary:\n{}", result.summary);
            true
        }
        (JobStatus::Failed, _) => {
            match &snapshot.error_message {
                Some(message) => eprintln!("Job failed: {}", message),
                None => eprintln!("Job failed, see the processing log above"),
            }
            false
        }
        (status, _) => {
            eprintln!("Job stopped while {}", status);
            false
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
