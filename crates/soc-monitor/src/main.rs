//! Security Monitor - Main Entry Point
//!
//! Reads line-delimited JSON requests on stdin and writes one JSON
//! response per line on stdout.
//!
//! ```bash
//! echo '{"action":"getStatus"}' | soc-monitor --state-file /var/lib/soc/state.json
//! ```

use clap::Parser;
use soc_connector::TimeRange;
use soc_monitor::{
    channel, periodic_trigger, serve_requests, shutdown, JsonFileStore, LogNotifier, MonitorClient,
    MonitorOptions, MonitorRequest, MonitorResponse, SecurityMonitor,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "soc-monitor")]
#[command(version, about = "SIEM alert monitor", long_about = None)]
struct Args {
    /// File holding persisted monitor state
    #[arg(long, env = "SOC_MONITOR_STATE", default_value = "soc-monitor-state.json")]
    state_file: PathBuf,

    /// Seconds between periodic checks
    #[arg(long, env = "SOC_MONITOR_CHECK_INTERVAL", default_value_t = 300)]
    check_interval_secs: u64,

    /// Look-back window for each check (e.g. 5m, 1h)
    #[arg(long, default_value = "5m")]
    time_range: TimeRange,

    /// Start monitoring at launch
    #[arg(long)]
    start: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    tracing::info!("SOC Monitor v{}", env!("CARGO_PKG_VERSION"));

    let options = MonitorOptions {
        time_range: args.time_range,
        check_interval: Duration::from_secs(args.check_interval_secs.max(1)),
        ..Default::default()
    };
    let store = Arc::new(JsonFileStore::new(&args.state_file));
    let monitor = Arc::new(SecurityMonitor::new(store, Arc::new(LogNotifier), options.clone()));

    if let Err(e) = monitor.load_state().await {
        tracing::warn!(error = %e, path = %args.state_file.display(), "state not loaded, using defaults");
    }

    if args.start || monitor.is_monitoring() {
        if let Err(e) = monitor.start_monitoring().await {
            tracing::warn!(error = %e, "could not start monitoring");
        }
    }

    let cancel = shutdown::shutdown_token();
    let (client, requests) = channel(32);

    let server = tokio::spawn(serve_requests(monitor.clone(), requests, cancel.clone()));
    let trigger = tokio::spawn(periodic_trigger(monitor.clone(), options.check_interval, cancel.clone()));
    let bridge = tokio::spawn(async move {
        if let Err(e) = bridge_stdio(client).await {
            tracing::error!(error = %e, "stdin bridge failed");
        }
    });

    cancel.cancelled().await;

    let (server, trigger) = tokio::join!(server, trigger);
    report_exit("request server", server);
    report_exit("periodic trigger", trigger);
    if bridge.is_finished() {
        report_exit("stdin bridge", bridge.await);
    } else {
        bridge.abort();
    }
    monitor.shutdown().await;
    tracing::info!("SOC Monitor stopped");
    Ok(())
}

/// Forward stdin requests to the monitor and print the replies
async fn bridge_stdio(client: MonitorClient) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<MonitorRequest>(&line) {
            Ok(request) => client.request(request).await?,
            Err(e) => MonitorResponse::failed(format!("invalid request: {}", e)),
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    tracing::debug!("stdin closed");
    Ok(())
}

/// Log a background task that panicked or was cancelled
fn report_exit(task: &str, result: Result<(), JoinError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(task, error = %e, "task ended abnormally");
            false
        }
    }
}
