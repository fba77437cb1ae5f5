//! Outcome caches: remember which configurations already passed or
//! failed so the engines can skip re-running their testers.
//!
//! Four interchangeable strategies are provided, selectable by short
//! name: `none` (caching disabled), `config` (trie keyed by the config
//! itself), `content` (keyed by the built artifact), and `content-hash`
//! (keyed by a digest of the artifact). Entry lifecycles are governed by
//! [`CachePolicy`]: whether FAIL outcomes are stored at all, and whether
//! adding a FAIL evicts every larger cached entry. Eviction after FAIL is
//! safe because reduction continues strictly within sizes no larger than
//! the failing config, so bigger entries can never be looked up again.

mod content;
mod shared;
mod trie;

pub use content::{ContentCache, ContentHashCache};
pub use shared::SharedCache;
pub use trie::ConfigCache;

use std::sync::Arc;

use core_model::{Outcome, TestBuilder};

/// Entry lifecycle knobs shared by all cache strategies.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    /// Store FAIL outcomes too. Off by default: reduction revisits
    /// failing configs far less often than passing ones.
    pub cache_fail: bool,
    /// When a FAIL of size L is added, drop every cached entry larger
    /// than L.
    pub evict_after_fail: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            cache_fail: false,
            evict_after_fail: true,
        }
    }
}

/// Key → outcome store consulted before every test.
///
/// A `None` lookup means "unknown"; the engines then run a real test and
/// record its outcome with [`add`](OutcomeCache::add). Implementations
/// that key by artifact content need a [`TestBuilder`] installed first.
pub trait OutcomeCache: Send {
    /// Install the builder used to materialize configs. No-op for caches
    /// that do not key by content.
    fn set_test_builder(&mut self, _builder: Arc<dyn TestBuilder>) {}

    /// Record the outcome of a tested configuration, subject to the
    /// cache's policy.
    fn add(&mut self, config: &[usize], outcome: Outcome);

    /// Outcome of a previously tested configuration, if known.
    fn lookup(&self, config: &[usize]) -> Option<Outcome>;

    /// Forget everything.
    fn clear(&mut self);
}

/// Cache strategy that never stores and never hits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl OutcomeCache for NoCache {
    fn add(&mut self, _config: &[usize], _outcome: Outcome) {}

    fn lookup(&self, _config: &[usize]) -> Option<Outcome> {
        None
    }

    fn clear(&mut self) {}
}

/// Names accepted by [`lookup`].
pub const NAMES: [&str; 4] = ["config", "content", "content-hash", "none"];

/// Construct a cache by its registered short name.
pub fn lookup(name: &str, policy: CachePolicy) -> Option<Box<dyn OutcomeCache>> {
    match name {
        "none" => Some(Box::new(NoCache)),
        "config" => Some(Box::new(ConfigCache::new(policy))),
        "content" => Some(Box::new(ContentCache::new(policy))),
        "content-hash" => Some(Box::new(ContentHashCache::new(policy))),
        _ => None,
    }
}
