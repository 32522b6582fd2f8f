use anyhow::{Context, Result};
use clap::Parser;
use repstress::{
    keys::{KeyPool, Selection},
    report::{influx::DEFAULT_WRITE_TIMEOUT, CsvReporter, InfluxReporter, StdoutReporter},
    ConfigLoader, Executor, OutcomeSet, PoolExecutor, Report, Reporter, ReputationClient,
    RunResult, RunStatistics, Scenario, Termination,
};
use std::{future::Future, io, path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "repstress")]
#[command(about = "Reputation Service Stress Test")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config.yaml")]
    config_file: PathBuf,

    /// Number of concurrent requests
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    concurrent_requests: u32,

    /// Number of domains to test (max: 5000)
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=5000))]
    num_domains: u32,

    /// Timeout in seconds to finish the stress process
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// File with one domain per line, used instead of generated domains
    #[arg(long)]
    domains_file: Option<PathBuf>,

    /// Draw domains at random from the pool instead of in order
    #[arg(long)]
    random: bool,

    /// Seed for --random, makes the draw reproducible
    #[arg(long, requires = "random")]
    seed: Option<u64>,

    /// Where to write per-request results
    #[arg(long, default_value = repstress::report::csv::DEFAULT_PATH)]
    output: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Do not export results to InfluxDB even if configured
    #[arg(long)]
    skip_influx: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = ConfigLoader::new()
        .from_file(&args.config_file)
        .with_context(|| format!("Failed to load config from {:?}", args.config_file))?;
    let client = ReputationClient::from_config(&config).context("Failed to create HTTP client")?;

    let selection = if args.random {
        Selection::Random { seed: args.seed }
    } else {
        Selection::Sequential
    };
    let keys = match &args.domains_file {
        Some(path) => KeyPool::from_file(path, selection)
            .with_context(|| format!("Failed to read domains from {path:?}"))?,
        None => KeyPool::generated(selection),
    };

    let scenario = Scenario::builder()
        .name("Reputation API stress test")
        .lookup(client)
        .keys(Arc::new(keys))
        .build();
    let executor = PoolExecutor::builder()
        .concurrency(args.concurrent_requests as usize)
        .samples(args.num_domains as usize)
        .deadline(Duration::from_secs(args.timeout))
        .build();

    let cancel = CancellationToken::new();
    tokio::spawn(interrupt_on_ctrl_c(cancel.clone()));

    info!(
        "Starting {} lookups with {} concurrent requests, timeout {}s",
        executor.samples, executor.concurrency, args.timeout
    );
    let run: RunResult<OutcomeSet> = executor.exec(&scenario, cancel).await?;
    match run.termination {
        Termination::Completed => info!("All {} lookups completed", run.outcomes.len()),
        Termination::TimedOut => warn!("Timeout reached. Ending stress test."),
        Termination::Interrupted => warn!("Interrupted. Ending stress test early."),
    }

    let stats = RunStatistics::summarize(&run.outcomes, run.elapsed);

    StdoutReporter { json: args.json }
        .report(&run.outcomes, &stats)
        .await?;
    CsvReporter::new(&args.output)
        .report(&run.outcomes, &stats)
        .await
        .with_context(|| format!("Failed to write results to {:?}", args.output))?;

    match (&config.influxdb, args.skip_influx) {
        (Some(influx), false) => InfluxReporter::new(influx)?
            .with_timeout(config.request_timeout().unwrap_or(DEFAULT_WRITE_TIMEOUT))
            .report(&run.outcomes, &stats)
            .await
            .context("Failed to write results to InfluxDB")?,
        _ => info!("InfluxDB export skipped"),
    }

    if run.termination == Termination::Interrupted {
        std::process::exit(1);
    }
    Ok(())
}

/// Turns Ctrl-C into a cancelled run, so partial results are still reported.
/// A second Ctrl-C aborts the process, reporting included.
async fn interrupt_on_ctrl_c(cancel: CancellationToken) {
    if watch_interrupts(tokio::signal::ctrl_c, cancel).await {
        std::process::exit(1);
    }
}

/// Cancels `cancel` on the first interrupt. Returns `true` once a second one
/// arrives, `false` if interrupts cannot be listened for.
async fn watch_interrupts<F, Fut>(mut interrupt: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(e) = interrupt().await {
        warn!("Unable to listen for Ctrl-C: {e}");
        return false;
    }
    warn!("Interrupt received, ending stress test early. Press Ctrl-C again to abort.");
    cancel.cancel();

    match interrupt().await {
        Ok(()) => {
            warn!("Second interrupt received, aborting");
            true
        }
        Err(e) => {
            warn!("Unable to listen for Ctrl-C: {e}");
            false
        }
    }
}
