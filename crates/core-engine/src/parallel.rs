//! Parallel reduce step: candidate tests dispatched to a bounded pool of
//! worker threads.
//!
//! The dispatcher preserves two guarantees of the sequential engine.
//! First, the winning FAIL is the one at the earliest enumeration
//! position among all completed tests, so for a deterministic tester the
//! chosen partition matches the sequential choice whenever every
//! dispatched test runs to completion. Second, cancellation is
//! cooperative: once any FAIL is observed (from the cache or from a
//! worker) no new test starts, and in-flight workers are drained with
//! their results still counted toward the minimum.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, info, trace, warn};

use core_cache::{CachePolicy, ConfigCache, OutcomeCache, SharedCache};
use core_model::{Config, ConfigId, IdTag, Outcome, ReductionFailure, Tester};
use core_strategy::{CombinedIterator, Splitter};

use crate::limit::StopCondition;
use crate::reduce::{
    Interrupt, ReduceStep, Session, StepResult, complement_of, run_reduction,
};

/// Decoded meaning of one signed candidate index.
#[derive(Debug, Clone, Copy)]
enum Action {
    Subset(usize),
    Complement(usize),
}

/// What one worker sends back to the dispatcher.
struct Report {
    /// Enumeration position of the candidate in iterator order.
    position: usize,
    action: Action,
    outcome: anyhow::Result<Outcome>,
}

/// Samples system CPU load for the optional dispatch throttle.
struct CpuGauge {
    system: sysinfo::System,
    limit: f32,
}

impl CpuGauge {
    const POLL: Duration = Duration::from_millis(200);

    fn new(limit: f32) -> Self {
        let mut system = sysinfo::System::new();
        // Prime the counters; utilization is a delta between refreshes.
        system.refresh_cpu_usage();
        Self { system, limit }
    }

    /// Block until system CPU utilization drops to the configured limit.
    /// In-flight workers keep finishing while the dispatcher waits here.
    fn wait_for_headroom(&mut self) {
        loop {
            self.system.refresh_cpu_usage();
            let usage = self.system.global_cpu_info().cpu_usage();
            if usage <= self.limit {
                return;
            }
            trace!(target: "engine.pool", usage, limit = self.limit, "dispatch throttled");
            thread::sleep(Self::POLL);
        }
    }
}

struct ParallelStep {
    iterator: CombinedIterator,
    jobs: usize,
    cache: SharedCache,
    gauge: Option<CpuGauge>,
}

fn consider(best: &mut Option<(usize, Action)>, position: usize, action: Action) {
    if best.map_or(true, |(p, _)| position < p) {
        *best = Some((position, action));
    }
}

fn record(best: &mut Option<(usize, Action)>, error: &mut Option<anyhow::Error>, report: Report) {
    match report.outcome {
        Ok(Outcome::Pass) => {}
        Ok(Outcome::Fail) => consider(best, report.position, report.action),
        Err(err) => {
            // First error wins; later ones add nothing actionable.
            error.get_or_insert(err);
        }
    }
}

fn decode(
    subsets: &[Vec<usize>],
    signed: isize,
    complement_offset: usize,
    run: usize,
) -> (Action, Vec<usize>, ConfigId) {
    if signed >= 0 {
        let index = signed as usize;
        (
            Action::Subset(index),
            subsets[index].clone(),
            ConfigId::new(vec![IdTag::Run(run), IdTag::Subset(index)]),
        )
    } else {
        let index = ((-signed - 1) as usize + complement_offset) % subsets.len();
        (
            Action::Complement(index),
            complement_of(subsets, index),
            ConfigId::new(vec![IdTag::Run(run), IdTag::Complement(index)]),
        )
    }
}

impl ReduceStep for ParallelStep {
    fn reduce_step(
        &mut self,
        session: &mut Session,
        run: usize,
        subsets: &[Vec<usize>],
        complement_offset: usize,
    ) -> Result<StepResult, Interrupt> {
        let n = subsets.len();
        let (tx, rx) = crossbeam_channel::unbounded::<Report>();
        let cancel = AtomicBool::new(false);

        let mut best: Option<(usize, Action)> = None;
        let mut tester_error: Option<anyhow::Error> = None;
        let mut stop_reason: Option<String> = None;

        let iterator = self.iterator;
        let jobs = self.jobs;
        let gauge = self.gauge.as_mut();
        let shared = &self.cache;

        thread::scope(|scope| {
            let mut gauge = gauge;
            let mut in_flight = 0usize;

            'dispatch: for (position, signed) in iterator.indices(n).enumerate() {
                // Fold in any results that arrived since the last check.
                while let Ok(report) = rx.try_recv() {
                    in_flight -= 1;
                    record(&mut best, &mut tester_error, report);
                }
                if cancel.load(Ordering::Acquire) || tester_error.is_some() {
                    break 'dispatch;
                }

                let (action, candidate, id) = decode(subsets, signed, complement_offset, run);

                match session.lookup_cache(&candidate, &id) {
                    Some(Outcome::Pass) => continue,
                    Some(Outcome::Fail) => {
                        consider(&mut best, position, action);
                        cancel.store(true, Ordering::Release);
                        break 'dispatch;
                    }
                    None => {}
                }

                // Stop protocol: dispatching thread only, once per test.
                if let Some(stop) = session.stop.as_mut() {
                    if let Err(reason) = stop.check() {
                        stop_reason = Some(reason);
                        break 'dispatch;
                    }
                }

                // Wait for a worker slot.
                while in_flight >= jobs {
                    let Ok(report) = rx.recv() else { break };
                    in_flight -= 1;
                    record(&mut best, &mut tester_error, report);
                    if cancel.load(Ordering::Acquire) || tester_error.is_some() {
                        break 'dispatch;
                    }
                }

                if let Some(gauge) = gauge.as_mut() {
                    gauge.wait_for_headroom();
                }

                let full_id = session.iteration_prefix.join(&id);
                let tester = Arc::clone(&session.tester);
                let mut cache = shared.clone();
                let tx = tx.clone();
                let cancel = &cancel;
                scope.spawn(move || {
                    debug!(target: "engine.test", id = %full_id, size = candidate.len(), "test");
                    let outcome = catch_unwind(AssertUnwindSafe(|| tester.test(&candidate, &full_id)))
                        .unwrap_or_else(|_| Err(anyhow!("tester panicked")));
                    match &outcome {
                        Ok(outcome) => {
                            debug!(target: "engine.test", id = %full_id, %outcome, "tested");
                            cache.add(&candidate, *outcome);
                        }
                        Err(err) => {
                            warn!(target: "engine.test", id = %full_id, error = %err, "tester failed");
                        }
                    }
                    if matches!(outcome, Ok(Outcome::Fail) | Err(_)) {
                        cancel.store(true, Ordering::Release);
                    }
                    let _ = tx.send(Report {
                        position,
                        action,
                        outcome,
                    });
                });
                in_flight += 1;
            }

            // Drain survivors; completed results count toward the winner.
            while in_flight > 0 {
                let Ok(report) = rx.recv() else { break };
                in_flight -= 1;
                record(&mut best, &mut tester_error, report);
            }
        });

        if let Some(err) = tester_error {
            return Err(Interrupt::Error(err));
        }
        if let Some(reason) = stop_reason {
            return Err(Interrupt::Stopped(reason));
        }

        match best {
            Some((_, Action::Subset(index))) => Ok(StepResult {
                next: Some(vec![subsets[index].clone()]),
                complement_offset: 0,
            }),
            Some((_, Action::Complement(index))) => {
                let mut next = subsets.to_vec();
                next.remove(index);
                Ok(StepResult {
                    next: Some(next),
                    complement_offset: index,
                })
            }
            None => Ok(StepResult {
                next: None,
                complement_offset,
            }),
        }
    }
}

/// Multi-threaded ddmin / dd-star reducer.
///
/// Shares the outer loop with [`Reducer`](crate::Reducer); only the
/// reduce step differs. The provided cache is wrapped in a
/// [`SharedCache`] so workers can record outcomes concurrently.
pub struct ParallelReducer {
    session: Session,
    iterator: CombinedIterator,
    shared: SharedCache,
    jobs: usize,
    max_utilization: Option<f32>,
}

impl ParallelReducer {
    pub fn new(tester: Arc<dyn Tester>) -> Self {
        let shared = SharedCache::new(Box::new(ConfigCache::new(CachePolicy::default())));
        let mut session = Session::new(tester);
        session.cache = Box::new(shared.clone());
        Self {
            session,
            iterator: CombinedIterator::default(),
            shared,
            jobs: num_cpus::get(),
            max_utilization: None,
        }
    }

    pub fn with_cache(mut self, cache: Box<dyn OutcomeCache>) -> Self {
        self.shared = SharedCache::new(cache);
        self.session.cache = Box::new(self.shared.clone());
        self
    }

    pub fn with_split(mut self, split: Box<dyn Splitter>) -> Self {
        self.session.split = split;
        self
    }

    pub fn with_iterator(mut self, iterator: CombinedIterator) -> Self {
        self.iterator = iterator;
        self
    }

    /// Re-run ddmin until a fixed point (on by default).
    pub fn with_dd_star(mut self, dd_star: bool) -> Self {
        self.session.dd_star = dd_star;
        self
    }

    pub fn with_stop(mut self, stop: Box<dyn StopCondition>) -> Self {
        self.session.stop = Some(stop);
        self
    }

    /// Tags prepended to every test id, e.g. the driver's atom phase.
    pub fn with_id_prefix(mut self, prefix: ConfigId) -> Self {
        self.session.id_prefix = prefix;
        self
    }

    /// Maximum number of concurrently running tests. Defaults to the
    /// CPU count; values below one are clamped up.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Hold back new dispatches while system CPU utilization (percent)
    /// exceeds this threshold.
    pub fn with_max_utilization(mut self, percent: f32) -> Self {
        self.max_utilization = Some(percent);
        self
    }

    /// Reduce `config` to a 1-minimal failing configuration.
    ///
    /// On interruption the returned [`ReductionFailure`] carries the
    /// smallest failing config observed up to that point.
    pub fn reduce(&mut self, config: Config) -> Result<Config, ReductionFailure> {
        info!(
            target: "engine.run",
            size = config.len(),
            jobs = self.jobs,
            "parallel reduce starts"
        );
        let mut step = ParallelStep {
            iterator: self.iterator,
            jobs: self.jobs,
            cache: self.shared.clone(),
            gauge: self.max_utilization.map(CpuGauge::new),
        };
        run_reduction(&mut self.session, &mut step, config)
    }
}
