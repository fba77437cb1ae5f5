#![allow(dead_code)] // Shared across the engine test binaries; each uses a subset of helpers.

//! Shared fixtures for the engine scenario tests: pure in-memory testers
//! over small integer atom sequences.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use core_cache::{CachePolicy, OutcomeCache};
use core_engine::{ParallelReducer, Reducer};
use core_model::{Config, ConfigId, Outcome, ReductionFailure, Tester};
use core_strategy::{CombinedIterator, SplitFactor, iterator, splitter};

/// Deterministic tester: the predicate sees the atom values selected by
/// the config. Counts real tester invocations.
pub struct SetTester {
    atoms: Vec<u32>,
    interesting: fn(&[u32]) -> bool,
    calls: AtomicUsize,
}

impl SetTester {
    pub fn new(atoms: Vec<u32>, interesting: fn(&[u32]) -> bool) -> Self {
        Self {
            atoms,
            interesting,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn atoms_of(&self, config: &[usize]) -> Vec<u32> {
        config.iter().map(|&i| self.atoms[i]).collect()
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }
}

impl Tester for SetTester {
    fn test(&self, config: &[usize], _id: &ConfigId) -> anyhow::Result<Outcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let selected = self.atoms_of(config);
        Ok(if (self.interesting)(&selected) {
            Outcome::Fail
        } else {
            Outcome::Pass
        })
    }
}

/// Interesting iff {5, 8} is selected and 7 is not selected without 2.
/// The only 1-minimal interesting config is [5, 8].
pub fn two_atom_predicate(selected: &[u32]) -> bool {
    if selected.contains(&7) && !selected.contains(&2) {
        return false;
    }
    selected.contains(&5) && selected.contains(&8)
}

/// Interesting iff all eight atoms are selected: nothing can be removed.
pub fn all_or_nothing(selected: &[u32]) -> bool {
    (1..=8).all(|v| selected.contains(&v))
}

/// Interesting iff {1, 2, 3, 4, 6, 8} is selected.
pub fn six_of_eight(selected: &[u32]) -> bool {
    [1, 2, 3, 4, 6, 8].iter().all(|v| selected.contains(v))
}

pub fn one_to_eight() -> Vec<u32> {
    (1..=8).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Sequential,
    Parallel,
}

/// One strategy combination of the scenario matrix.
#[derive(Clone, Copy)]
pub struct Combo {
    pub split: &'static str,
    pub subset_first: bool,
    pub subset_iterator: &'static str,
    pub complement_iterator: &'static str,
    pub cache: &'static str,
}

impl Combo {
    pub fn label(&self) -> String {
        format!(
            "{}/{}/{}/{}/subset_first={}",
            self.split, self.subset_iterator, self.complement_iterator, self.cache, self.subset_first
        )
    }
}

pub const COMBOS: [Combo; 6] = [
    Combo {
        split: "balanced",
        subset_first: true,
        subset_iterator: "forward",
        complement_iterator: "forward",
        cache: "none",
    },
    Combo {
        split: "zeller",
        subset_first: true,
        subset_iterator: "forward",
        complement_iterator: "backward",
        cache: "config",
    },
    Combo {
        split: "balanced",
        subset_first: false,
        subset_iterator: "backward",
        complement_iterator: "forward",
        cache: "none",
    },
    Combo {
        split: "zeller",
        subset_first: false,
        subset_iterator: "backward",
        complement_iterator: "backward",
        cache: "config",
    },
    Combo {
        split: "balanced",
        subset_first: true,
        subset_iterator: "skip",
        complement_iterator: "forward",
        cache: "none",
    },
    Combo {
        split: "zeller",
        subset_first: true,
        subset_iterator: "skip",
        complement_iterator: "backward",
        cache: "config",
    },
];

/// Run one reduction over the full atom range of `tester`.
pub fn run(
    engine: Engine,
    tester: Arc<SetTester>,
    combo: Combo,
    granularity: SplitFactor,
) -> Result<Config, ReductionFailure> {
    let split = splitter::lookup(combo.split, granularity).expect("known splitter");
    let combined = CombinedIterator::new(
        combo.subset_first,
        iterator::lookup(combo.subset_iterator).expect("known iterator"),
        iterator::lookup(combo.complement_iterator).expect("known iterator"),
    );
    let cache: Box<dyn OutcomeCache> =
        core_cache::lookup(combo.cache, CachePolicy::default()).expect("known cache");
    let initial: Config = (0..tester.len()).collect();

    match engine {
        Engine::Sequential => Reducer::new(tester)
            .with_split(split)
            .with_iterator(combined)
            .with_cache(cache)
            .reduce(initial),
        Engine::Parallel => ParallelReducer::new(tester)
            .with_split(split)
            .with_iterator(combined)
            .with_cache(cache)
            .with_jobs(4)
            .reduce(initial),
    }
}
