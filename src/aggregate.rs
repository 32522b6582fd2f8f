use crate::{metric::LookupOutcome, Metric};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;

/// The `Aggregate` trait defines how [`Metric`] values produced by workers are
/// collected into a mergeable representation.
///
/// Aggregates do **not** compute final statistics such as averages or
/// percentiles. That belongs in a [`crate::Report`], which is derived from an
/// aggregate once the run has finished.
///
/// # Implementor notes
/// - `merge` must be associative and commutative: completion order between
///   workers is a race and the collector makes no ordering promise.
/// - `consume` is called from the single collector task, never concurrently.
pub trait Aggregate
where
    Self: Serialize + DeserializeOwned + Send + Sync + Debug + Clone + 'static,
{
    /// The metric type this aggregate collects.
    type Metric: Metric;

    /// Create a new, empty instance of the aggregate.
    fn new() -> Self;

    /// Aggregate multiple metrics into the current instance.
    fn aggregate(&mut self, metrics: &[Self::Metric]) {
        metrics.iter().for_each(|m| self.consume(m));
    }

    /// Incorporate a single metric into the aggregate.
    fn consume(&mut self, metric: &Self::Metric);

    /// Combine two different aggregates into one.
    fn merge(&mut self, other: Self);
}

/// Every outcome collected during one run.
///
/// Percentiles need the full latency distribution, so unlike a counter-based
/// aggregate this keeps each outcome. Order carries no meaning.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeSet {
    outcomes: Vec<LookupOutcome>,
}

impl OutcomeSet {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LookupOutcome> {
        self.outcomes.iter()
    }

    pub fn success_count(&self) -> usize {
        self.iter().filter(|o| o.is_success()).count()
    }

    pub fn error_count(&self) -> usize {
        self.len() - self.success_count()
    }
}

impl Aggregate for OutcomeSet {
    type Metric = LookupOutcome;

    fn new() -> Self {
        Self::default()
    }

    fn consume(&mut self, metric: &Self::Metric) {
        self.outcomes.push(metric.clone());
    }

    fn merge(&mut self, other: Self) {
        self.outcomes.extend(other.outcomes);
    }
}

impl FromIterator<LookupOutcome> for OutcomeSet {
    fn from_iter<T: IntoIterator<Item = LookupOutcome>>(iter: T) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a OutcomeSet {
    type Item = &'a LookupOutcome;
    type IntoIter = std::slice::Iter<'a, LookupOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn counts_partition_total() {
        let mut set = OutcomeSet::new();
        set.aggregate(&[
            LookupOutcome::success(Duration::from_millis(5)),
            LookupOutcome::http_error(500, Duration::from_millis(7)),
            LookupOutcome::transport_error("reset"),
            LookupOutcome::success(Duration::from_millis(9)),
        ]);

        assert_eq!(set.len(), 4);
        assert_eq!(set.success_count(), 2);
        assert_eq!(set.error_count(), 2);
        assert_eq!(set.success_count() + set.error_count(), set.len());
    }

    #[test]
    fn merge_keeps_every_outcome() {
        let mut a: OutcomeSet = [LookupOutcome::success(Duration::from_millis(1))]
            .into_iter()
            .collect();
        let b: OutcomeSet = [
            LookupOutcome::transport_error("timeout"),
            LookupOutcome::http_error(429, Duration::from_millis(3)),
        ]
        .into_iter()
        .collect();

        a.merge(b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.error_count(), 2);
    }
}
