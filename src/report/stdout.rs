use super::{Reporter, RunStatistics};
use crate::{aggregate::OutcomeSet, error::ReportError};

/// Prints the run summary to stdout, as text or as a single JSON object.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutReporter {
    pub json: bool,
}

impl StdoutReporter {
    pub fn render(&self, stats: &RunStatistics) -> Result<String, ReportError> {
        if self.json {
            return Ok(serde_json::to_string(stats)?);
        }

        Ok(format!(
            "Test is over!\n\
             Time in total: {:.2} seconds\n\
             Requests in total: {}\n\
             Error rate: {:.2}% ({} / {})\n\
             Average time for one request: {:.2} ms\n\
             Max time for one request: {:.2} seconds\n\
             p90 time for requests: {:.2} seconds",
            stats.wall_clock.as_secs_f64(),
            stats.total,
            stats.error_rate * 100.0,
            stats.error_count,
            stats.total,
            stats.mean_latency.as_secs_f64() * 1000.0,
            stats.max_latency.as_secs_f64(),
            stats.p90_latency.as_secs_f64(),
        ))
    }
}

impl Reporter<OutcomeSet, RunStatistics> for StdoutReporter {
    async fn report(&self, _: &OutcomeSet, report: &RunStatistics) -> Result<(), ReportError> {
        println!("{}", self.render(report)?);
        Ok(())
    }
}
