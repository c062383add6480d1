//! CLI entry point for the NYC taxi dashboard.
//!
//! Loads the per-borough trip CSVs, aggregates them and prints the dashboard
//! summary, a page of the trips table, or a periodically refreshed summary.

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use taxi_dashboard::{
    config::SourceConfig,
    dashboard::{Dashboard, DashboardState, RefreshOutcome},
    loader::{MetricsSink, fetcher_for},
    metrics::DashboardMetrics,
    output::{print_json, print_pretty, render_summary, render_trips_page, write_json},
    view::{BoroughFilter, TRIPS_PER_PAGE, paginate},
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "taxi_dashboard")]
#[command(about = "Summaries over NYC yellow taxi trip CSVs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Directory or base URL holding the source CSVs
    #[arg(short, long, env = "TAXI_SOURCE", default_value = "public")]
    source: String,

    /// JSON file listing sources and their boroughs (defaults to Brooklyn, Manhattan, Queens)
    #[arg(short, long, env = "TAXI_SOURCES_CONFIG")]
    config: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the summary cards and breakdowns
    Summary {
        #[command(flatten)]
        source: SourceArgs,

        /// "All" or a single borough
        #[arg(short, long, default_value = "All")]
        borough: String,

        /// Log the metrics as JSON instead of the text summary
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Also write the metrics as JSON to this file
        #[arg(short, long)]
        out: Option<String>,
    },
    /// Print one page of the trips table
    Trips {
        #[command(flatten)]
        source: SourceArgs,

        /// "All" or a single borough
        #[arg(short, long, default_value = "All")]
        borough: String,

        /// 1-based page number
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Reload the sources periodically and print each new summary
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        /// Seconds between refreshes
        #[arg(short, long, default_value_t = 300)]
        interval: u64,

        /// Number of refreshes to run (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_refreshes: usize,
    },
}

/// Prints every new snapshot to stdout.
struct StdoutSink;

impl MetricsSink for StdoutSink {
    fn on_metrics_ready(&self, metrics: &DashboardMetrics) {
        print_pretty(metrics);
        println!("{}", render_summary(metrics));
    }
}

/// Only logs; the caller decides what to print.
struct LogSink;

impl MetricsSink for LogSink {
    fn on_metrics_ready(&self, metrics: &DashboardMetrics) {
        print_pretty(metrics);
        info!(
            trips = metrics.total_trips,
            revenue = metrics.total_revenue,
            "Metrics ready"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/taxi_dashboard.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("taxi_dashboard.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Summary {
            source,
            borough,
            json,
            out,
        } => {
            let state = load_once(&source).await?;
            let filter = BoroughFilter::parse(&borough);
            let metrics = metrics_for(&state, &filter);

            if json {
                print_json(&metrics)?;
            } else {
                println!("{}", render_summary(&metrics));
            }
            if let Some(path) = out {
                write_json(&path, &metrics)?;
                info!(path, "Metrics written");
            }
        }
        Commands::Trips {
            source,
            borough,
            page,
        } => {
            let state = load_once(&source).await?;
            let trips = BoroughFilter::parse(&borough).apply(&state.trips);
            let view = paginate(&trips, page, TRIPS_PER_PAGE);
            println!("{}", render_trips_page(&view));
        }
        Commands::Watch {
            source,
            interval,
            num_refreshes,
        } => {
            watch(&source, interval, num_refreshes).await?;
        }
    }

    Ok(())
}

fn build_dashboard(args: &SourceArgs) -> Result<Dashboard> {
    let config = SourceConfig::load_or_default(args.config.as_deref())?;
    let fetcher = fetcher_for(&args.source, Duration::from_secs(args.timeout))?;
    info!(
        source = %args.source,
        boroughs = ?config.boroughs(),
        "Dashboard sources configured"
    );
    Ok(Dashboard::new(fetcher, config.sources().to_vec()))
}

/// Runs a single refresh and returns the loaded state.
async fn load_once(args: &SourceArgs) -> Result<DashboardState> {
    let dashboard = build_dashboard(args)?;
    match dashboard.refresh(&LogSink).await? {
        RefreshOutcome::Loaded { .. } => Ok(dashboard.snapshot().await),
        RefreshOutcome::Skipped => bail!("a refresh was already running"),
    }
}

/// Reuses the loaded snapshot for "All", otherwise aggregates the filtered trips.
fn metrics_for(state: &DashboardState, filter: &BoroughFilter) -> DashboardMetrics {
    match (filter, &state.metrics) {
        (BoroughFilter::All, Some(metrics)) => metrics.clone(),
        _ => DashboardMetrics::from_trips(&filter.apply(&state.trips)),
    }
}

/// Refreshes on a fixed interval. A failed refresh is logged and the previous
/// snapshot stays current until the next successful one.
#[tracing::instrument(skip(args), fields(source = %args.source))]
async fn watch(args: &SourceArgs, interval: u64, num_refreshes: usize) -> Result<()> {
    let dashboard = build_dashboard(args)?;
    let mut refresh_count = 0;

    if num_refreshes == 0 {
        info!(interval, "Refreshing indefinitely. Press Ctrl+C to stop.");
    }

    loop {
        if num_refreshes > 0 && refresh_count >= num_refreshes {
            break;
        }
        refresh_count += 1;

        match dashboard.refresh(&StdoutSink).await {
            Ok(RefreshOutcome::Loaded { trips }) => {
                info!(refresh = refresh_count, trips, "Refresh complete")
            }
            Ok(RefreshOutcome::Skipped) => info!(refresh = refresh_count, "Refresh skipped"),
            Err(e) => {
                let state = dashboard.snapshot().await;
                warn!(
                    refresh = refresh_count,
                    error = %e,
                    showing_previous = state.metrics.is_some(),
                    "Refresh failed"
                );
            }
        }

        if num_refreshes == 0 || refresh_count < num_refreshes {
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }

    info!(refresh_count, "Finished refreshing");
    Ok(())
}
