mod report;

use clap::Parser;
use report::Format;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use whypending_cluster::{ApiSource, ClusterError, ClusterSource, FileSource, SnapshotRequest};
use whypending_engine::{Diagnoser, DiagnoserConfig};

#[derive(Parser)]
#[command(
    name = "ypd",
    version,
    about = "Tell you why a Kubernetes pod is pending"
)]
struct Cli {
    /// Namespace of the pod
    namespace: String,
    /// Name of the pod
    pod: String,
    /// Path to kubeconfig. Uses ~/.kube/config or the in-cluster service account by default
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<String>,
    /// Kubeconfig context to use instead of current-context
    #[arg(long)]
    context: Option<String>,
    /// Diagnose against a saved `kubectl get ... -o yaml` or `-o json` file
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Print one JSON record per node
    #[arg(short, long)]
    json: bool,
    /// Print every mismatch section, not only the summary
    #[arg(short, long)]
    all: bool,
    /// Seconds to wait for the cluster snapshot
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    /// Number of threads evaluating nodes
    #[arg(long, default_value_t = 1)]
    parallel: usize,
    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn format(&self) -> Format {
        if self.json {
            Format::Json
        } else if self.all {
            Format::Full
        } else {
            Format::Summary
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let token = CancellationToken::new();
    tokio::spawn(watch_signals(token.clone()));

    let source = create_source(&cli).await?;
    let request = SnapshotRequest::new(&cli.namespace, &cli.pod);

    let timeout = Duration::from_secs(cli.timeout);
    let snapshot = tokio::select! {
        result = tokio::time::timeout(timeout, source.fetch(&request)) => match result {
            Ok(snapshot) => snapshot?,
            Err(_) => {
                return Err(miette::miette!(
                    help = "Raise --timeout or check that the API server is reachable",
                    "Timed out after {}s waiting for the cluster snapshot",
                    cli.timeout
                ))
            }
        },
        _ = token.cancelled() => {
            return Err(miette::miette!("Interrupted before the snapshot was complete"));
        }
    };

    let target = snapshot
        .find_pod(&cli.namespace, &cli.pod)
        .ok_or_else(|| ClusterError::pod_not_found(&cli.namespace, &cli.pod))?;
    if snapshot.nodes.is_empty() {
        warn!("Snapshot contains no nodes, nothing to diagnose");
    }

    let diagnoser = Diagnoser::new(DiagnoserConfig {
        workers: cli.parallel.max(1),
    });
    let details = diagnoser.diagnose(Some(target), &snapshot);
    debug!("Diagnosed {} nodes", details.len());

    let mut out = std::io::stdout().lock();
    report::render(&mut out, &details, cli.format())
        .and_then(|_| out.flush())
        .map_err(|e| miette::miette!("Failed to write report: {}", e))?;

    Ok(())
}

/// Logs go to stderr so stdout carries only the report
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// A saved snapshot file wins over any cluster configuration
async fn create_source(cli: &Cli) -> miette::Result<Box<dyn ClusterSource>> {
    if let Some(path) = &cli.snapshot {
        return Ok(Box::new(FileSource::new(path)));
    }

    let source = ApiSource::connect(cli.kubeconfig.as_deref(), cli.context.as_deref()).await?;
    Ok(Box::new(source))
}

/// SIGINT or SIGTERM abandons the snapshot; a second signal exits at once
async fn watch_signals(token: CancellationToken) {
    loop {
        if let Err(e) = shutdown_signal().await {
            warn!("Cannot listen for shutdown signals: {}", e);
            return;
        }
        if escalate(&token) {
            warn!("Second signal received, exiting");
            std::process::exit(1);
        }
        info!("Interrupted, abandoning snapshot");
    }
}

/// Cancel the token; true when it was already cancelled
fn escalate(token: &CancellationToken) -> bool {
    if token.is_cancelled() {
        return true;
    }
    token.cancel();
    false
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
