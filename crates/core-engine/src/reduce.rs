//! The shared ddmin run loop and the single-threaded engine.

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use core_cache::{CachePolicy, ConfigCache, OutcomeCache};
use core_model::{Config, ConfigId, FailureKind, IdTag, Outcome, ReductionFailure, Tester};
use core_strategy::{CombinedIterator, Splitter, ZellerSplit};

use crate::limit::StopCondition;

/// An ordered partition of the current config into non-empty subsets.
pub(crate) type Partition = Vec<Vec<usize>>;

/// Premature end of the run loop, before the partial result is attached.
pub(crate) enum Interrupt {
    Stopped(String),
    Error(anyhow::Error),
}

impl From<Interrupt> for FailureKind {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Stopped(reason) => FailureKind::Stopped(reason),
            Interrupt::Error(err) => FailureKind::Error(err),
        }
    }
}

/// State shared by both engines for one reduction call: the tester, the
/// cache, the splitter, and the id bookkeeping.
pub(crate) struct Session {
    pub tester: Arc<dyn Tester>,
    pub cache: Box<dyn OutcomeCache>,
    pub split: Box<dyn Splitter>,
    pub dd_star: bool,
    pub stop: Option<Box<dyn StopCondition>>,
    pub id_prefix: ConfigId,
    pub iteration_prefix: ConfigId,
}

impl Session {
    pub(crate) fn new(tester: Arc<dyn Tester>) -> Self {
        Self {
            tester,
            cache: Box::new(ConfigCache::new(CachePolicy::default())),
            split: Box::new(ZellerSplit::default()),
            dd_star: true,
            stop: None,
            id_prefix: ConfigId::default(),
            iteration_prefix: ConfigId::default(),
        }
    }

    pub(crate) fn check_stop(&mut self) -> Result<(), Interrupt> {
        if let Some(stop) = self.stop.as_mut() {
            stop.check().map_err(Interrupt::Stopped)?;
        }
        Ok(())
    }

    pub(crate) fn lookup_cache(&self, config: &[usize], id: &ConfigId) -> Option<Outcome> {
        let cached = self.cache.lookup(config);
        if let Some(outcome) = cached {
            debug!(
                target: "engine.cache",
                id = %self.iteration_prefix.join(id),
                %outcome,
                "cache hit"
            );
        }
        cached
    }

    /// Run one real test and record its outcome, unless the id carries
    /// the assert sentinel. The stop protocol fires here, once per
    /// dispatched test.
    pub(crate) fn test_config(
        &mut self,
        config: &[usize],
        id: &ConfigId,
    ) -> Result<Outcome, Interrupt> {
        let full = self.iteration_prefix.join(id);
        self.check_stop()?;
        debug!(target: "engine.test", id = %full, size = config.len(), "test");
        let outcome = self
            .tester
            .test(config, &full)
            .map_err(Interrupt::Error)?;
        debug!(target: "engine.test", id = %full, %outcome, "tested");
        if !full.is_assert() {
            self.cache.add(config, outcome);
        }
        Ok(outcome)
    }
}

/// Result of one reduce step over the current partition.
pub(crate) struct StepResult {
    /// The partition to continue with, or `None` when every candidate
    /// passed.
    pub next: Option<Partition>,
    pub complement_offset: usize,
}

/// The part that differs between the engines: how one round of subset
/// and complement candidates is evaluated.
pub(crate) trait ReduceStep {
    fn reduce_step(
        &mut self,
        session: &mut Session,
        run: usize,
        subsets: &[Vec<usize>],
        complement_offset: usize,
    ) -> Result<StepResult, Interrupt>;
}

/// Drive the outer dd-star loop and the per-iteration run loop, catching
/// interruptions and attaching the smallest failing config seen so far.
pub(crate) fn run_reduction(
    session: &mut Session,
    step: &mut dyn ReduceStep,
    mut config: Config,
) -> Result<Config, ReductionFailure> {
    match drive(session, step, &mut config) {
        Ok(()) => {
            info!(target: "engine.run", size = config.len(), "done");
            Ok(config)
        }
        Err(interrupt) => {
            if let Interrupt::Stopped(reason) = &interrupt {
                warn!(target: "engine.run", reason = %reason, "stopped before reaching a minimum");
            }
            Err(ReductionFailure {
                result: config,
                kind: interrupt.into(),
            })
        }
    }
}

fn drive(
    session: &mut Session,
    step: &mut dyn ReduceStep,
    config: &mut Config,
) -> Result<(), Interrupt> {
    for iteration in 0usize.. {
        info!(target: "engine.run", iteration, "iteration");
        session.iteration_prefix = session.id_prefix.child(IdTag::Iteration(iteration));
        let mut changed = false;
        let mut subsets: Partition = vec![config.clone()];
        let mut complement_offset = 0usize;

        for run in 0usize.. {
            info!(target: "engine.run", run, size = config.len(), "run");

            // Invariant: the config entering a run must still fail. The
            // outcome is deliberately kept out of the cache.
            let verify = ConfigId::new(vec![IdTag::Run(run), IdTag::Assert]);
            if session.test_config(config, &verify)? != Outcome::Fail {
                return Err(Interrupt::Error(anyhow!(
                    "current config no longer fails; the tester looks non-deterministic"
                )));
            }

            // A single atom cannot be reduced further.
            if config.len() < 2 {
                break;
            }

            if subsets.len() < 2 {
                subsets = session.split.split(&subsets);
            }
            debug!(target: "engine.run", granularity = subsets.len(), "granularity");

            let result = step.reduce_step(session, run, &subsets, complement_offset)?;
            complement_offset = result.complement_offset;

            if let Some(next) = result.next {
                subsets = next;
                *config = subsets.concat();
                changed = true;
                info!(target: "engine.run", size = config.len(), "reduced");
            } else if subsets.len() < config.len() {
                let next = session.split.split(&subsets);
                // Keep the offset aligned with the finer partition;
                // integer division keeps it a valid subset index.
                complement_offset = complement_offset * next.len() / subsets.len();
                subsets = next;
                info!(target: "engine.run", granularity = subsets.len(), "increased granularity");
            } else {
                // No reduction at the finest granularity: 1-minimal.
                break;
            }
        }

        if !session.dd_star || !changed {
            break;
        }
    }
    Ok(())
}

/// The current config with subset `index` removed.
pub(crate) fn complement_of(subsets: &[Vec<usize>], index: usize) -> Vec<usize> {
    subsets
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .flat_map(|(_, subset)| subset.iter().copied())
        .collect()
}

/// Sequential reduce step: candidates are evaluated one at a time in
/// iterator order; the first FAIL wins and ends the round.
pub(crate) struct SequentialStep {
    pub iterator: CombinedIterator,
}

impl ReduceStep for SequentialStep {
    fn reduce_step(
        &mut self,
        session: &mut Session,
        run: usize,
        subsets: &[Vec<usize>],
        complement_offset: usize,
    ) -> Result<StepResult, Interrupt> {
        let n = subsets.len();
        for signed in self.iterator.indices(n) {
            if signed >= 0 {
                let index = signed as usize;
                let id = ConfigId::new(vec![IdTag::Run(run), IdTag::Subset(index)]);
                let candidate = &subsets[index];
                let outcome = match session.lookup_cache(candidate, &id) {
                    Some(outcome) => outcome,
                    None => session.test_config(candidate, &id)?,
                };
                if outcome == Outcome::Fail {
                    // Continue from this subset alone, at fresh offset.
                    return Ok(StepResult {
                        next: Some(vec![subsets[index].clone()]),
                        complement_offset: 0,
                    });
                }
            } else {
                let index = ((-signed - 1) as usize + complement_offset) % n;
                let id = ConfigId::new(vec![IdTag::Run(run), IdTag::Complement(index)]);
                let candidate = complement_of(subsets, index);
                let outcome = match session.lookup_cache(&candidate, &id) {
                    Some(outcome) => outcome,
                    None => session.test_config(&candidate, &id)?,
                };
                if outcome == Outcome::Fail {
                    // The next run starts examining the subset after the
                    // one just removed.
                    let mut next = subsets.to_vec();
                    next.remove(index);
                    return Ok(StepResult {
                        next: Some(next),
                        complement_offset: index,
                    });
                }
            }
        }
        Ok(StepResult {
            next: None,
            complement_offset,
        })
    }
}

/// Single-threaded ddmin / dd-star reducer.
///
/// Construct with a tester, adjust strategies with the `with_*` methods,
/// then call [`reduce`](Reducer::reduce) with the initial config. The
/// initial config must be interesting (the tester must FAIL it).
pub struct Reducer {
    session: Session,
    iterator: CombinedIterator,
}

impl Reducer {
    pub fn new(tester: Arc<dyn Tester>) -> Self {
        Self {
            session: Session::new(tester),
            iterator: CombinedIterator::default(),
        }
    }

    pub fn with_cache(mut self, cache: Box<dyn OutcomeCache>) -> Self {
        self.session.cache = cache;
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

    /// Reduce `config` to a 1-minimal failing configuration.
    ///
    /// On interruption the returned [`ReductionFailure`] carries the
    /// smallest failing config observed up to that point.
    pub fn reduce(&mut self, config: Config) -> Result<Config, ReductionFailure> {
        info!(target: "engine.run", size = config.len(), "sequential reduce starts");
        let mut step = SequentialStep {
            iterator: self.iterator,
        };
        run_reduction(&mut self.session, &mut step, config)
    }
}
