use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fmt::Debug, future::Future, time::Duration};

use crate::{aggregate::OutcomeSet, error::ReportError, Aggregate};

pub mod csv;
pub mod influx;
pub mod stdout;

pub use self::csv::CsvReporter;
pub use influx::InfluxReporter;
pub use stdout::StdoutReporter;

/// A [`Report`] is the processed form of an [`Aggregate`].
///
/// Reports derive final figures such as averages, percentiles and ratios. They
/// are pure data: building one has no side effects and the same aggregate and
/// wall clock always give the same report.
///
/// See also: [`Reporter`].
pub trait Report<A>
where
    Self: Send + Sync + Debug + Serialize + DeserializeOwned,
    A: Aggregate,
{
    /// Derive the report from a finished run.
    fn summarize(aggregate: &A, wall_clock: Duration) -> Self;
}

/// A [`Reporter`] consumes a finished run and its [`Report`] and performs side
/// effects: printing it, writing a file, shipping it to a database.
///
/// Reporters are the I/O boundary of the harness, which keeps the
/// metric -> aggregate -> report pipeline deterministic.
pub trait Reporter<A: Aggregate, R: Report<A>> {
    fn report(
        &self,
        aggregate: &A,
        report: &R,
    ) -> impl Future<Output = Result<(), ReportError>>;
}

/// Summary statistics of one run.
///
/// Latency figures only consider outcomes that carry a latency, so transport
/// failures count as errors but never skew the latency distribution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
    /// `error_count / total`, in `[0, 1]`, 0 for an empty run.
    pub error_rate: f64,
    pub mean_latency: Duration,
    pub max_latency: Duration,
    /// Element `floor(0.9 * n)` of the ascending latencies, no interpolation.
    pub p90_latency: Duration,
    /// Run start to run end, independent of individual latencies.
    pub wall_clock: Duration,
}

impl Report<OutcomeSet> for RunStatistics {
    fn summarize(aggregate: &OutcomeSet, wall_clock: Duration) -> Self {
        let total = aggregate.len();
        let success_count = aggregate.success_count();
        let error_count = total - success_count;
        let error_rate = if total == 0 {
            0.0
        } else {
            error_count as f64 / total as f64
        };

        let mut latencies: Vec<Duration> = aggregate.iter().filter_map(|o| o.latency()).collect();
        latencies.sort_unstable();

        Self {
            total,
            success_count,
            error_count,
            error_rate,
            mean_latency: mean(&latencies),
            max_latency: latencies.last().copied().unwrap_or_default(),
            p90_latency: p90(&latencies),
            wall_clock,
        }
    }
}

fn mean(latencies: &[Duration]) -> Duration {
    if latencies.is_empty() {
        return Duration::ZERO;
    }
    let total: u128 = latencies.iter().map(Duration::as_nanos).sum();
    let nanos = total / latencies.len() as u128;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// `sorted` must be ascending.
fn p90(sorted: &[Duration]) -> Duration {
    let index = sorted.len() * 9 / 10;
    sorted.get(index).copied().unwrap_or_default()
}
