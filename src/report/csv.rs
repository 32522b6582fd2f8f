use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{Reporter, RunStatistics};
use crate::{aggregate::OutcomeSet, error::ReportError, metric::LookupOutcome};

pub const DEFAULT_PATH: &str = "stress_test_results.csv";

/// Writes one `elapsed_time,error` row per outcome.
///
/// `elapsed_time` is in seconds and left empty for transport failures; `error`
/// is empty for successes, the status code for HTTP errors and the failure
/// message for transport errors.
#[derive(Clone, Debug)]
pub struct CsvReporter {
    path: PathBuf,
}

impl Default for CsvReporter {
    fn default() -> Self {
        Self::new(DEFAULT_PATH)
    }
}

#[derive(Serialize)]
struct Row {
    elapsed_time: Option<f64>,
    error: Option<String>,
}

impl From<&LookupOutcome> for Row {
    fn from(outcome: &LookupOutcome) -> Self {
        Self {
            elapsed_time: outcome.latency().map(|l| l.as_secs_f64()),
            error: outcome.error(),
        }
    }
}

impl CsvReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the whole table, header included even when there are no rows.
    pub fn render(outcomes: &OutcomeSet) -> Result<Vec<u8>, ReportError> {
        let mut wtr = ::csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        wtr.write_record(["elapsed_time", "error"])?;
        for outcome in outcomes {
            wtr.serialize(Row::from(outcome))?;
        }
        wtr.into_inner()
            .map_err(|e| ReportError::Io(e.into_error()))
    }
}

impl Reporter<OutcomeSet, RunStatistics> for CsvReporter {
    async fn report(&self, aggregate: &OutcomeSet, _: &RunStatistics) -> Result<(), ReportError> {
        let content = Self::render(aggregate)?;
        tokio::fs::write(&self.path, content).await?;
        tracing::info!(
            "Wrote {} results to {}",
            aggregate.len(),
            self.path.display()
        );
        Ok(())
    }
}
