//! Partition refinement strategies.
//!
//! A splitter maps the current partition of the config to a finer one.
//! The engines only call a splitter when the current config holds at
//! least two atoms, so the resulting partition is never empty.

use std::fmt;
use std::str::FromStr;

/// How many pieces a refinement aims for, relative to the current
/// partition: each refinement multiplies the subset count by the factor,
/// capped at one subset per atom. `Max` splits straight to singletons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitFactor {
    Finite(usize),
    Max,
}

impl SplitFactor {
    /// Number of chunks to produce for a config of `length` atoms
    /// currently split into `current` subsets.
    fn chunks(self, current: usize, length: usize) -> usize {
        match self {
            SplitFactor::Finite(n) => length.min(current.saturating_mul(n)),
            SplitFactor::Max => length,
        }
    }
}

impl Default for SplitFactor {
    fn default() -> Self {
        SplitFactor::Finite(2)
    }
}

impl fmt::Display for SplitFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitFactor::Finite(n) => write!(f, "{n}"),
            SplitFactor::Max => f.write_str("max"),
        }
    }
}

impl FromStr for SplitFactor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("max") || s == "inf" {
            return Ok(SplitFactor::Max);
        }
        let n: usize = s
            .parse()
            .map_err(|_| format!("invalid split factor: {s:?}"))?;
        if n < 2 {
            return Err(format!("split factor must be at least 2, got {n}"));
        }
        Ok(SplitFactor::Finite(n))
    }
}

/// Refines a partition into a finer one. The returned subsets must be
/// non-empty, disjoint, order-preserving, and concatenate to the same
/// config as the input partition.
pub trait Splitter: Send + Sync {
    fn split(&self, subsets: &[Vec<usize>]) -> Vec<Vec<usize>>;
}

/// Zeller's split from the original reference implementation: slice off
/// `1/m`-th of the config, then `1/(m-1)`-th of the remainder, and so on,
/// always with integer division. Chunk sizes come out monotonically
/// non-decreasing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZellerSplit {
    n: SplitFactor,
}

impl ZellerSplit {
    pub fn new(n: SplitFactor) -> Self {
        Self { n }
    }
}

impl Splitter for ZellerSplit {
    fn split(&self, subsets: &[Vec<usize>]) -> Vec<Vec<usize>> {
        let config: Vec<usize> = subsets.concat();
        let length = config.len();
        let m = self.n.chunks(subsets.len(), length);

        let mut next = Vec::with_capacity(m);
        let mut start = 0;
        for i in 0..m {
            let stop = start + (length - start) / (m - i);
            next.push(config[start..stop].to_vec());
            start = stop;
        }
        next
    }
}

/// Variant of Zeller's split that distributes the residuals of the
/// integer division over all chunks, keeping chunk sizes within one of
/// each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalancedSplit {
    n: SplitFactor,
}

impl BalancedSplit {
    pub fn new(n: SplitFactor) -> Self {
        Self { n }
    }
}

impl Splitter for BalancedSplit {
    fn split(&self, subsets: &[Vec<usize>]) -> Vec<Vec<usize>> {
        let config: Vec<usize> = subsets.concat();
        let length = config.len();
        let m = self.n.chunks(subsets.len(), length);

        (0..m)
            .map(|i| config[length * i / m..length * (i + 1) / m].to_vec())
            .collect()
    }
}

/// Names accepted by [`lookup`].
pub const NAMES: [&str; 2] = ["balanced", "zeller"];

/// Construct a splitter by its registered short name.
pub fn lookup(name: &str, n: SplitFactor) -> Option<Box<dyn Splitter>> {
    match name {
        "zeller" => Some(Box::new(ZellerSplit::new(n))),
        "balanced" => Some(Box::new(BalancedSplit::new(n))),
        _ => None,
    }
}
