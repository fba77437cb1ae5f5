//! Shared vocabulary of the reduction engines: test outcomes, test
//! identifiers, failure types, and the tester contract.

use std::fmt;

/// Result of evaluating one candidate configuration.
///
/// `Fail` means the candidate is *interesting*: the behavior under
/// investigation is still exhibited. Reduction always moves from one
/// failing configuration to a smaller failing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    #[inline]
    pub fn is_fail(self) -> bool {
        matches!(self, Outcome::Fail)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => f.write_str("PASS"),
            Outcome::Fail => f.write_str("FAIL"),
        }
    }
}

/// A candidate configuration: indices into the original atom sequence.
/// Invariant: strictly increasing, no duplicates.
pub type Config = Vec<usize>;

/// One tag of a hierarchical test identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdTag {
    /// Atom phase of the driver (e.g. line pass vs char pass).
    Atom(usize),
    /// dd-star iteration counter.
    Iteration(usize),
    /// Run counter within an iteration.
    Run(usize),
    /// Keep-subset candidate at the given subset index.
    Subset(usize),
    /// Remove-subset candidate at the given subset index.
    Complement(usize),
    /// Re-verification of the current config at the top of a run.
    /// Outcomes of assert-tagged tests are never written to the cache.
    Assert,
}

impl fmt::Display for IdTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdTag::Atom(n) => write!(f, "a{n}"),
            IdTag::Iteration(n) => write!(f, "i{n}"),
            IdTag::Run(n) => write!(f, "r{n}"),
            IdTag::Subset(n) => write!(f, "s{n}"),
            IdTag::Complement(n) => write!(f, "c{n}"),
            IdTag::Assert => f.write_str("assert"),
        }
    }
}

/// Ordered identifier naming one test, used for logging and for work
/// directory names. Kept structured so the `assert` sentinel is detected
/// by tag membership rather than substring matching.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigId {
    tags: Vec<IdTag>,
}

impl ConfigId {
    pub fn new(tags: Vec<IdTag>) -> Self {
        Self { tags }
    }

    /// Return a new id with `tag` appended.
    pub fn child(&self, tag: IdTag) -> Self {
        let mut tags = self.tags.clone();
        tags.push(tag);
        Self { tags }
    }

    /// Return a new id with all of `tail`'s tags appended.
    pub fn join(&self, tail: &ConfigId) -> Self {
        let mut tags = self.tags.clone();
        tags.extend_from_slice(&tail.tags);
        Self { tags }
    }

    pub fn tags(&self) -> &[IdTag] {
        &self.tags
    }

    /// Whether this id names a debug re-verification test.
    pub fn is_assert(&self) -> bool {
        self.tags.iter().any(|t| matches!(t, IdTag::Assert))
    }

    /// Filesystem-safe rendering, e.g. `a0_i1_r2_s3`.
    pub fn dir_name(&self) -> String {
        let mut out = String::new();
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                out.push('_');
            }
            out.push_str(&tag.to_string());
        }
        out
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(" / ")?;
            }
            write!(f, "{tag}")?;
        }
        Ok(())
    }
}

impl From<Vec<IdTag>> for ConfigId {
    fn from(tags: Vec<IdTag>) -> Self {
        Self::new(tags)
    }
}

/// Why a reduction ended before reaching a 1-minimal configuration.
#[derive(Debug, thiserror::Error)]
pub enum FailureKind {
    /// Cooperative termination: a time or test budget was exhausted.
    #[error("reduction stopped: {0}")]
    Stopped(String),
    /// Unexpected error in a tester or inside the engine.
    #[error("reduction error: {0}")]
    Error(#[from] anyhow::Error),
}

/// Premature end of a reduction.
///
/// Carries the smallest failing configuration observed so far, so callers
/// can still emit a useful (if non-minimal) result. A `Stopped` failure is
/// an expected way for bounded reductions to finish; an `Error` failure is
/// fatal.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct ReductionFailure {
    /// Smallest failing configuration observed before the interruption.
    pub result: Config,
    pub kind: FailureKind,
}

impl ReductionFailure {
    pub fn stopped(result: Config, reason: impl Into<String>) -> Self {
        Self {
            result,
            kind: FailureKind::Stopped(reason.into()),
        }
    }

    pub fn error(result: Config, err: anyhow::Error) -> Self {
        Self {
            result,
            kind: FailureKind::Error(err),
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.kind, FailureKind::Stopped(_))
    }
}

/// Decides whether a candidate configuration is still interesting.
///
/// Implementations must be deterministic with respect to `config` and must
/// not mutate it; a non-deterministic tester degrades the result but must
/// not corrupt the engine. Side effects (temp files, subprocesses) are the
/// tester's concern. An `Err` aborts the whole reduction.
pub trait Tester: Send + Sync {
    fn test(&self, config: &[usize], id: &ConfigId) -> anyhow::Result<Outcome>;
}

impl<F> Tester for F
where
    F: Fn(&[usize], &ConfigId) -> anyhow::Result<Outcome> + Send + Sync,
{
    fn test(&self, config: &[usize], id: &ConfigId) -> anyhow::Result<Outcome> {
        self(config, id)
    }
}

/// Materializes the atoms referenced by a config into a single artifact.
///
/// Content-keyed caches and testers must share one builder so that equal
/// configs produce byte-identical artifacts.
pub trait TestBuilder: Send + Sync {
    fn build(&self, config: &[usize]) -> String;
}

impl<F> TestBuilder for F
where
    F: Fn(&[usize]) -> String + Send + Sync,
{
    fn build(&self, config: &[usize]) -> String {
        self(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_display_joins_tags_with_slashes() {
        let id = ConfigId::new(vec![
            IdTag::Atom(0),
            IdTag::Iteration(1),
            IdTag::Run(2),
            IdTag::Subset(3),
        ]);
        assert_eq!(id.to_string(), "a0 / i1 / r2 / s3");
        assert_eq!(id.dir_name(), "a0_i1_r2_s3");
    }

    #[test]
    fn assert_tag_detected_structurally() {
        let id = ConfigId::new(vec![IdTag::Run(0), IdTag::Assert]);
        assert!(id.is_assert());
        // A subset index must never be mistaken for the assert sentinel.
        let id = ConfigId::new(vec![IdTag::Run(0), IdTag::Subset(7)]);
        assert!(!id.is_assert());
    }

    #[test]
    fn child_and_join_append() {
        let prefix = ConfigId::new(vec![IdTag::Atom(0)]);
        let id = prefix.child(IdTag::Iteration(4));
        assert_eq!(id.to_string(), "a0 / i4");
        let tail = ConfigId::new(vec![IdTag::Run(1), IdTag::Complement(2)]);
        assert_eq!(id.join(&tail).to_string(), "a0 / i4 / r1 / c2");
    }

    #[test]
    fn failure_carries_partial_result() {
        let failure = ReductionFailure::stopped(vec![1, 2, 3], "deadline expired");
        assert!(failure.is_stopped());
        assert_eq!(failure.result, vec![1, 2, 3]);
        assert_eq!(failure.to_string(), "reduction stopped: deadline expired");
    }
}
