//! Enumeration strategies of the reduction engines: index iterators that
//! order candidate checks, and splitters that refine the current
//! partition. Both are selectable by registered short names.

pub mod iterator;
pub mod splitter;

pub use iterator::{CombinedIterator, IndexIter, IteratorFn};
pub use splitter::{BalancedSplit, SplitFactor, Splitter, ZellerSplit};
