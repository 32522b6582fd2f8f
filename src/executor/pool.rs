//! The `PoolExecutor` and its components: a fixed-size worker pool fed from a
//! precomputed key plan.
//!
//! # High-level flow
//! 1. The scenario's [`crate::keys::KeySource`] produces the plan, one key per
//!    sample.
//! 2. A shared execution context is created, holding the plan, the dispatch
//!    counter and the shutdown signal.
//! 3. `min(concurrency, samples)` workers are spawned. Each worker repeatedly:
//!    - claims the next key by bumping the atomic dispatch counter,
//!    - awaits the lookup,
//!    - sends the outcome to the collector over an mpsc channel.
//!
//!    A worker exits once the plan is exhausted, so the pool sustains
//!    `concurrency` lookups in flight until there is nothing left to claim.
//!    A worker whose lookup panics is not replaced: the key it claimed yields
//!    no outcome and the pool runs one lookup short for the rest of the run.
//! 4. The collector (the `exec` future itself) consumes outcomes into the
//!    aggregate until every worker has hung up, the deadline elapses or the
//!    cancellation token fires.
//! 5. On early termination the shutdown signal is sent and the worker tasks
//!    are aborted. Aborting drops the in-flight lookup futures, which for the
//!    HTTP client closes their connections; anything that still manages to
//!    finish finds the channel closed and is discarded.
//!
//! The only shared state is the dispatch counter and the channel. Neither
//! survives the run.
use futures::future::join_all;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::{
        mpsc,
        watch::{self, Receiver, Sender},
    },
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

use super::{Executor, RunResult, Termination};
use crate::{
    aggregate::Aggregate,
    client::Lookup,
    error::ExecutorError,
    metric::{LookupKey, LookupOutcome},
    scenario::Scenario,
};
use internals::*;

/// Executor that keeps `concurrency` lookups in flight until `samples` keys
/// have been dispatched.
///
/// - `concurrency`: size of the worker pool. Zero is rejected.
/// - `samples`: number of lookups to dispatch.
/// - `deadline`: optional bound on collection, measured from dispatch start.
///   Without it the run only ends on completion or cancellation.
///
/// A panicking lookup takes its worker down with it. The panic is logged once
/// the run completes, the claimed key is counted as dispatched but has no
/// outcome, and the remaining workers carry on with a smaller pool.
#[derive(Clone, Debug, TypedBuilder)]
pub struct PoolExecutor {
    /// Maximum number of lookups in flight.
    pub concurrency: usize,
    /// Number of keys to dispatch.
    pub samples: usize,
    #[builder(default, setter(strip_option))]
    pub deadline: Option<Duration>,
}

impl<L, A> Executor<L, A> for PoolExecutor
where
    Self: Send + Sync + Sized,
    L: Lookup,
    A: Aggregate<Metric = LookupOutcome>,
{
    type Error = ExecutorError;

    async fn exec(
        &self,
        scenario: &Scenario<L>,
        cancel: CancellationToken,
    ) -> Result<RunResult<A>, Self::Error> {
        if self.concurrency == 0 {
            return Err(ExecutorError::ZeroConcurrency);
        }

        let plan = scenario.keys.plan(self.samples);
        if plan.len() != self.samples {
            tracing::warn!(
                "Key source produced {} keys for {} samples",
                plan.len(),
                self.samples
            );
        }
        let workers = self.concurrency.min(plan.len());
        let (ctx, shutdown_tx) = ExecutionContext::new(plan);
        let (outcomes_tx, mut outcomes_rx) = mpsc::channel(workers.max(1));

        let started = Instant::now();
        let deadline = self.deadline.map(|d| started + d);
        let mut phase = RunPhase::Idle;

        tracing::info!("Spawning {workers} workers...");
        let handles = spawn_workers(ctx.clone(), workers, scenario.lookup.clone(), outcomes_tx);
        phase.advance(RunPhase::Dispatching);
        tracing::info!("Running scenario: {}!", scenario.name);

        let mut outcomes = A::new();
        let termination = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    phase.advance(RunPhase::Interrupted);
                    break Termination::Interrupted;
                }
                _ = wait_for_deadline(deadline) => {
                    phase.advance(RunPhase::TimedOut);
                    break Termination::TimedOut;
                }
                next = outcomes_rx.recv() => match next {
                    Some(outcome) => {
                        outcomes.consume(&outcome);
                        if phase == RunPhase::Dispatching && ctx.exhausted() {
                            phase.advance(RunPhase::Draining);
                        }
                    }
                    None => break Termination::Completed,
                },
            }
        };
        let elapsed = started.elapsed();
        phase.advance(RunPhase::Finished);

        // Nothing is collected past this point.
        drop(outcomes_rx);
        let _ = shutdown_tx.send(true);
        let dispatched = ctx.dispatched();

        if termination.is_early() {
            tracing::warn!(
                "Run {termination} after {elapsed:?}, abandoning lookups still in flight \
                 ({dispatched} dispatched)"
            );
            handles.iter().for_each(JoinHandle::abort);
        } else {
            tracing::info!("Retrieving data from workers...");
            let completed: usize = join_all(handles)
                .await
                .into_iter()
                .map(|res| match res {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::error!("Worker panicked with error: {e}");
                        0
                    }
                })
                .sum();
            tracing::debug!("Workers reported {completed} completed lookups");
        }

        tracing::info!("Done running scenario: {}!", scenario.name);
        Ok(RunResult {
            outcomes,
            termination,
            elapsed,
            dispatched,
        })
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(feature = "internals")]
pub use internals::*;

/// Internal components for the `PoolExecutor`.
mod internals {
    use super::*;

    /// Where a run currently is, see the module docs of [`crate::executor`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum RunPhase {
        Idle,
        Dispatching,
        Draining,
        TimedOut,
        Interrupted,
        Finished,
    }

    impl RunPhase {
        pub fn advance(&mut self, next: RunPhase) {
            tracing::debug!("Run phase {self:?} -> {next:?}");
            *self = next;
        }
    }

    /// Shared state for all workers of one run.
    #[derive(Clone)]
    pub struct ExecutionContext {
        /// Broadcasts the signal to stop all workers.
        pub shutdown: Receiver<bool>,
        /// Keys in dispatch order.
        pub plan: Arc<[LookupKey]>,
        /// Index of the next key to hand out.
        pub next: Arc<AtomicUsize>,
    }

    impl ExecutionContext {
        pub fn new(plan: Vec<LookupKey>) -> (Self, Sender<bool>) {
            let (tx, rx) = watch::channel(false);
            (
                Self {
                    shutdown: rx,
                    plan: plan.into(),
                    next: Arc::new(AtomicUsize::new(0)),
                },
                tx,
            )
        }

        /// Claim the next key, `None` once the plan is exhausted.
        pub fn claim(&self) -> Option<LookupKey> {
            let i = self.next.fetch_add(1, Ordering::Relaxed);
            self.plan.get(i).cloned()
        }

        /// Number of keys handed out so far.
        pub fn dispatched(&self) -> usize {
            self.next.load(Ordering::Relaxed).min(self.plan.len())
        }

        pub fn exhausted(&self) -> bool {
            self.dispatched() == self.plan.len()
        }
    }

    /// Spawns `workers` Tokio tasks pulling keys from `ctx`.
    ///
    /// Each task returns how many outcomes it delivered. The sender is moved in
    /// so that the channel closes once the last worker exits.
    pub fn spawn_workers<L>(
        ctx: ExecutionContext,
        workers: usize,
        lookup: L,
        outcomes: mpsc::Sender<LookupOutcome>,
    ) -> Vec<JoinHandle<usize>>
    where
        L: Lookup,
    {
        (0..workers)
            .map(|i| {
                let ctx = ctx.clone();
                let mut shutdown = ctx.shutdown.clone();
                let lookup = lookup.clone();
                let outcomes = outcomes.clone();
                tokio::spawn(async move {
                    let mut delivered = 0;
                    tracing::debug!("Worker {i} started.");

                    let main_task = async {
                        while let Some(key) = ctx.claim() {
                            let outcome = lookup.lookup(key).await;
                            if outcomes.send(outcome).await.is_err() {
                                tracing::debug!("Worker {i} outcome discarded, collection ended.");
                                break;
                            }
                            delivered += 1;
                        }
                    };

                    tokio::select! {
                        _ = main_task => {},
                        _ = shutdown.wait_for(|b| *b) => {
                            tracing::debug!("Worker {i} received shutdown signal.");
                        }
                    };

                    tracing::debug!("Worker {i} shutting down after {delivered} lookups.");
                    delivered
                })
            })
            .collect()
    }
}
