//! Index iteration order for subset and complement checks.
//!
//! An iterator strategy maps `n` to a lazy sequence of indices in
//! `[0, n)`. The engines never materialize the sequence; `skip` yields
//! nothing at all and is used to disable one side of the check loop.

use rand::seq::SliceRandom;

/// Lazy sequence of indices in `[0, n)`.
pub type IndexIter = Box<dyn Iterator<Item = usize> + Send>;

/// Strategy producing the order in which candidate indices are examined.
pub type IteratorFn = fn(usize) -> IndexIter;

/// Indices from `0` to `n - 1`.
pub fn forward(n: usize) -> IndexIter {
    Box::new(0..n)
}

/// Indices from `n - 1` down to `0`.
pub fn backward(n: usize) -> IndexIter {
    Box::new((0..n).rev())
}

/// No indices at all. Used to skip subset (or, less often, complement)
/// checks entirely.
pub fn skip(_n: usize) -> IndexIter {
    Box::new(std::iter::empty())
}

/// Indices `0..n` in uniformly random order. Not reproducible across
/// invocations.
pub fn random(n: usize) -> IndexIter {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rand::rng());
    Box::new(indices.into_iter())
}

/// Names accepted by [`lookup`].
pub const NAMES: [&str; 4] = ["backward", "forward", "random", "skip"];

/// Look up an iterator strategy by its registered short name.
pub fn lookup(name: &str) -> Option<IteratorFn> {
    match name {
        "forward" => Some(forward),
        "backward" => Some(backward),
        "skip" => Some(skip),
        "random" => Some(random),
        _ => None,
    }
}

/// Interleaves subset and complement indices over `n` subsets into a
/// single signed stream.
///
/// A yielded value `i >= 0` means "keep subset `i`"; a value `i < 0`
/// means "remove subset `-i - 1`". This sign encoding is the only
/// contract between the iterator and the engines, which keeps the stream
/// a plain sequence of integers.
#[derive(Clone, Copy)]
pub struct CombinedIterator {
    subset_first: bool,
    subset: IteratorFn,
    complement: IteratorFn,
}

impl CombinedIterator {
    pub fn new(subset_first: bool, subset: IteratorFn, complement: IteratorFn) -> Self {
        Self {
            subset_first,
            subset,
            complement,
        }
    }

    /// Signed candidate indices over `n` subsets, in check order.
    pub fn indices(&self, n: usize) -> Box<dyn Iterator<Item = isize> + Send> {
        let subsets = (self.subset)(n).map(|i| i as isize);
        let complements = (self.complement)(n).map(|i| -(i as isize) - 1);
        if self.subset_first {
            Box::new(subsets.chain(complements))
        } else {
            Box::new(complements.chain(subsets))
        }
    }
}

impl Default for CombinedIterator {
    fn default() -> Self {
        Self::new(true, forward, forward)
    }
}
