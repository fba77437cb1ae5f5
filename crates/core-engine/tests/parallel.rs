//! Parallel dispatcher semantics: the earliest-position FAIL wins no
//! matter which worker finishes first.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use core_engine::ParallelReducer;
use core_model::{ConfigId, Outcome, Tester};

/// Every candidate fails, but candidates containing atom 0 answer
/// slowly. A dispatcher that let the fastest FAIL win would keep the
/// last subset; the position-ordered winner keeps the first.
struct SlowFirstTester;

impl Tester for SlowFirstTester {
    fn test(&self, config: &[usize], _id: &ConfigId) -> anyhow::Result<Outcome> {
        if config.contains(&0) {
            thread::sleep(Duration::from_millis(20));
        }
        Ok(Outcome::Fail)
    }
}

#[test]
fn earliest_position_fail_wins_over_faster_later_fails() {
    for _ in 0..3 {
        let minimal = ParallelReducer::new(Arc::new(SlowFirstTester))
            .with_jobs(4)
            .reduce((0..4).collect())
            .expect("reduction");
        assert_eq!(minimal, vec![0]);
    }
}

/// Workers recording into the shared cache must not disturb the result;
/// a second identical reduction is answered mostly from cache.
#[test]
fn shared_cache_survives_across_runs() {
    use common::SetTester;
    use core_cache::{CachePolicy, ConfigCache, OutcomeCache, SharedCache};

    // Cache FAIL outcomes and keep everything so the second run can be
    // answered from the cache alone.
    let policy = CachePolicy {
        cache_fail: true,
        evict_after_fail: false,
    };
    let mut shared = SharedCache::new(Box::new(ConfigCache::new(policy)));

    let first = Arc::new(SetTester::new(common::one_to_eight(), common::two_atom_predicate));
    let minimal = ParallelReducer::new(Arc::clone(&first) as Arc<dyn Tester>)
        .with_cache(Box::new(shared.clone()))
        .reduce((0..8).collect())
        .expect("reduction");
    assert_eq!(first.atoms_of(&minimal), &[5, 8]);

    // The cache now knows every candidate of the first run.
    let second = Arc::new(SetTester::new(common::one_to_eight(), common::two_atom_predicate));
    let minimal = ParallelReducer::new(Arc::clone(&second) as Arc<dyn Tester>)
        .with_cache(Box::new(shared.clone()))
        .reduce((0..8).collect())
        .expect("reduction");
    assert_eq!(second.atoms_of(&minimal), &[5, 8]);
    assert!(second.calls() < first.calls());

    shared.clear();
    assert_eq!(shared.lookup(&[0, 1, 2, 3]), None);
}
