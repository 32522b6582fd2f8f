//! repstress: a concurrent stress harness for reputation lookup APIs.
//!
//! The harness fires a fixed number of lookups at a reputation endpoint through a
//! bounded pool of workers, stops collecting when the run completes, its deadline
//! elapses or the operator interrupts it, and reduces whatever was collected to
//! latency and error statistics.
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`Scenario`]: what is looked up ([`Lookup`]) and which keys are used
//!   ([`keys::KeySource`]).
//! - [`Executor`]: runs a scenario. The built-in [`PoolExecutor`] keeps a fixed
//!   number of lookups in flight and enforces the deadline and cancellation.
//! - [`Metric`]: the smallest unit produced by a lookup. Here that is a
//!   [`LookupOutcome`]: success, HTTP error or transport error.
//! - [`Aggregate`]: collects metrics while the run is going. [`OutcomeSet`] keeps
//!   every outcome so percentiles can be computed afterwards.
//! - [`Report`]: derives final figures from an aggregate. [`RunStatistics`]
//!   holds error rate, mean, max and p90 latency.
//! - [`Reporter`]: sends a finished run somewhere: stdout, a CSV file, InfluxDB.
//!
//! Per-lookup failures never surface as errors. They are recorded as outcomes
//! and show up in the error rate. Only configuration problems and sink failures
//! are returned as `Err`.
//!
//! # Example
//!
//! ```rust,no_run
//! use repstress::{
//!     keys::{KeyPool, Selection},
//!     Executor, OutcomeSet, PoolExecutor, Report, ReputationClient, RunResult,
//!     RunStatistics, Scenario,
//! };
//! use std::{sync::Arc, time::Duration};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ReputationClient::new("https://reputation.local/domain/ranking/{}", "token", None)?;
//! let scenario = Scenario::builder()
//!     .name("Reputation API")
//!     .lookup(client)
//!     .keys(Arc::new(KeyPool::generated(Selection::Random { seed: None })))
//!     .build();
//!
//! let run: RunResult<OutcomeSet> = PoolExecutor::builder()
//!     .concurrency(10)
//!     .samples(100)
//!     .deadline(Duration::from_secs(60))
//!     .build()
//!     .exec(&scenario, CancellationToken::new())
//!     .await?;
//!
//! let stats = RunStatistics::summarize(&run.outcomes, run.elapsed);
//! println!("{} requests, {:.2}% errors", stats.total, stats.error_rate * 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//! - `internals`: exposes the executor's execution context and worker spawning.

/// Metric aggregators
pub mod aggregate;
/// Reputation endpoint client
pub mod client;
/// YAML configuration
pub mod config;
/// Error types
pub mod error;
/// Orchestrators that define how things will actually run
pub mod executor;
/// Key generation and selection
pub mod keys;
/// Single metrics
pub mod metric;
/// Reports and Reporters
pub mod report;
/// Glue between a lookup and its keys
pub mod scenario;

pub use aggregate::{Aggregate, OutcomeSet};
pub use client::{Lookup, ReputationClient};
pub use config::{ConfigLoader, StressConfig};
pub use executor::{Executor, PoolExecutor, RunResult, Termination};
pub use metric::{LookupKey, LookupOutcome, Metric};
pub use report::{Report, Reporter, RunStatistics};
pub use scenario::Scenario;
