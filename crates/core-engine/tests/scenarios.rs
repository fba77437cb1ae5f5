//! Literal reduction scenarios over pure predicates, run across the
//! strategy matrix for both engines.

mod common;

use std::sync::Arc;

use common::{COMBOS, Engine, SetTester, run};
use core_strategy::SplitFactor;

fn assert_scenario(
    engine: Engine,
    interesting: fn(&[u32]) -> bool,
    expect: &[u32],
) {
    for granularity in [SplitFactor::Finite(2), SplitFactor::Max] {
        for combo in COMBOS {
            let tester = Arc::new(SetTester::new(common::one_to_eight(), interesting));
            let minimal = run(engine, Arc::clone(&tester), combo, granularity)
                .unwrap_or_else(|e| panic!("{} at {granularity}: {e}", combo.label()));
            assert_eq!(
                tester.atoms_of(&minimal),
                expect,
                "engine={engine:?} combo={} granularity={granularity}",
                combo.label()
            );
        }
    }
}

#[test]
fn two_atom_predicate_sequential() {
    assert_scenario(Engine::Sequential, common::two_atom_predicate, &[5, 8]);
}

#[test]
fn two_atom_predicate_parallel() {
    assert_scenario(Engine::Parallel, common::two_atom_predicate, &[5, 8]);
}

#[test]
fn all_or_nothing_sequential() {
    assert_scenario(
        Engine::Sequential,
        common::all_or_nothing,
        &[1, 2, 3, 4, 5, 6, 7, 8],
    );
}

#[test]
fn all_or_nothing_parallel() {
    assert_scenario(
        Engine::Parallel,
        common::all_or_nothing,
        &[1, 2, 3, 4, 5, 6, 7, 8],
    );
}

#[test]
fn six_of_eight_sequential() {
    assert_scenario(Engine::Sequential, common::six_of_eight, &[1, 2, 3, 4, 6, 8]);
}

#[test]
fn six_of_eight_parallel() {
    assert_scenario(Engine::Parallel, common::six_of_eight, &[1, 2, 3, 4, 6, 8]);
}

/// A 1-minimal result does not depend on the candidate order, so even
/// the unseeded random iterators must land on the unique minimum.
#[test]
fn random_iterators_reach_the_same_minimum() {
    use common::Combo;

    let combo = Combo {
        split: "zeller",
        subset_first: true,
        subset_iterator: "random",
        complement_iterator: "random",
        cache: "config",
    };
    for engine in [Engine::Sequential, Engine::Parallel] {
        for _ in 0..5 {
            let tester = Arc::new(SetTester::new(
                common::one_to_eight(),
                common::two_atom_predicate,
            ));
            let minimal = run(engine, Arc::clone(&tester), combo, SplitFactor::Finite(2))
                .expect("reduction must finish");
            assert_eq!(tester.atoms_of(&minimal), &[5, 8], "engine={engine:?}");
        }
    }
}

/// With a config cache, repeated candidates are answered without calling
/// the tester again, so strictly fewer invocations happen than in the
/// cache-off baseline.
#[test]
fn config_cache_saves_tester_invocations() {
    use common::Combo;

    let without = Combo {
        split: "zeller",
        subset_first: true,
        subset_iterator: "forward",
        complement_iterator: "forward",
        cache: "none",
    };
    let with = Combo { cache: "config", ..without };

    let baseline = Arc::new(SetTester::new(
        common::one_to_eight(),
        common::two_atom_predicate,
    ));
    run(
        Engine::Sequential,
        Arc::clone(&baseline),
        without,
        SplitFactor::Finite(2),
    )
    .expect("baseline reduction");

    let cached = Arc::new(SetTester::new(
        common::one_to_eight(),
        common::two_atom_predicate,
    ));
    run(
        Engine::Sequential,
        Arc::clone(&cached),
        with,
        SplitFactor::Finite(2),
    )
    .expect("cached reduction");

    assert!(
        cached.calls() < baseline.calls(),
        "cached {} must be below baseline {}",
        cached.calls(),
        baseline.calls()
    );
}

/// The parallel engine must choose the same partition as the sequential
/// one for deterministic testers on a cold cache.
#[test]
fn parallel_matches_sequential() {
    for interesting in [
        common::two_atom_predicate,
        common::all_or_nothing,
        common::six_of_eight,
    ] {
        for combo in COMBOS {
            let sequential = run(
                Engine::Sequential,
                Arc::new(SetTester::new(common::one_to_eight(), interesting)),
                combo,
                SplitFactor::Finite(2),
            )
            .expect("sequential reduction");
            let parallel = run(
                Engine::Parallel,
                Arc::new(SetTester::new(common::one_to_eight(), interesting)),
                combo,
                SplitFactor::Finite(2),
            )
            .expect("parallel reduction");
            assert_eq!(sequential, parallel, "combo={}", combo.label());
        }
    }
}
