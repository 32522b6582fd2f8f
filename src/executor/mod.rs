//! Executor: orchestration of a stress run
//!
//! The `Executor` trait is the runtime that executes a [`Scenario`]. It decides
//! how many lookups are in flight, when the run is over and what happens to
//! work that is still pending when it ends.
//!
//! The built-in [`PoolExecutor`] keeps a fixed pool of workers busy until the
//! key plan is exhausted, the deadline elapses or the caller cancels.
//!
//! # Run lifecycle
//!
//! ```text
//! Idle -> Dispatching -> Draining    -> Finished
//!                     \-> TimedOut    -/
//!                     \-> Interrupted -/
//! ```
//!
//! - `Dispatching`: keys remain to be claimed by workers.
//! - `Draining`: every key has been claimed, the collector waits for the last
//!   outcomes.
//! - `TimedOut` / `Interrupted`: collection stopped early. Lookups still in
//!   flight are abandoned and never recorded.
//!
//! The aggregate is frozen on entry to `Finished` and returned together with
//! the [`Termination`] reason, since the outcomes alone cannot tell a complete
//! run from a cut-short one.
pub mod pool;
pub use pool::PoolExecutor;

use crate::{aggregate::Aggregate, client::Lookup, metric::LookupOutcome, scenario::Scenario};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, time::Duration};
use tokio_util::sync::CancellationToken;

/// The runtime hook that executes a `Scenario`.
///
/// Generic over the lookup and the aggregate so that tests can run the real
/// scheduling logic against stubbed lookups.
pub trait Executor<L, A>
where
    Self: Send + Sync + Sized,
    L: Lookup,
    A: Aggregate<Metric = LookupOutcome>,
{
    type Error;

    /// Execute the scenario and return whatever was collected.
    ///
    /// Cancelling `cancel` ends the run early; the outcomes collected so far are
    /// still returned with [`Termination::Interrupted`]. Only configuration
    /// problems are reported as errors.
    fn exec(
        &self,
        scenario: &Scenario<L>,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<RunResult<A>, Self::Error>> + Send;
}

/// Why collection stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Every dispatched lookup reported back.
    Completed,
    /// The deadline elapsed first.
    TimedOut,
    /// The caller cancelled the run.
    Interrupted,
}

impl Termination {
    /// `true` when outcomes may be missing for dispatched lookups.
    pub fn is_early(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::TimedOut => "timed out",
            Self::Interrupted => "interrupted",
        })
    }
}

/// Everything a run hands back.
#[derive(Clone, Debug)]
pub struct RunResult<A> {
    /// Outcomes collected before the run ended.
    pub outcomes: A,
    pub termination: Termination,
    /// Wall clock time from dispatch start to the end of collection.
    pub elapsed: Duration,
    /// Number of keys handed to workers, collected or not.
    pub dispatched: usize,
}
