//! Delta Debugging reduction engines.
//!
//! [`Reducer`] is the single-threaded ddmin / dd-star implementation;
//! [`ParallelReducer`] dispatches candidate tests to a bounded pool of
//! worker threads while preserving the sequential engine's choice of
//! winner. Both walk the same outer loop: re-verify that the current
//! config still fails, refine the partition, enumerate subset and
//! complement candidates through a [`CombinedIterator`], consult the
//! cache, and either shrink the config on a FAIL or increase granularity
//! until the finest split is exhausted. With dd-star enabled the whole
//! process repeats until a fixed point.
//!
//! [`CombinedIterator`]: core_strategy::CombinedIterator

mod limit;
mod parallel;
mod reduce;

pub use limit::{LimitReduction, StopCondition};
pub use parallel::ParallelReducer;
pub use reduce::Reducer;
