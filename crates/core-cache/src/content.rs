//! Caches keyed by the built test artifact rather than by the config.
//!
//! Artifact keys stay valid across atom phases of a driver (the same
//! bytes are the same test regardless of how the input was split), so
//! `clear` deliberately keeps the stored entries.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::trace;

use core_model::{Outcome, TestBuilder};

use crate::{CachePolicy, OutcomeCache};

/// Cache keyed by the materialized artifact string.
#[derive(Default)]
pub struct ContentCache {
    policy: CachePolicy,
    builder: Option<Arc<dyn TestBuilder>>,
    entries: HashMap<String, Outcome>,
}

impl ContentCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            builder: None,
            entries: HashMap::new(),
        }
    }
}

impl OutcomeCache for ContentCache {
    fn set_test_builder(&mut self, builder: Arc<dyn TestBuilder>) {
        self.builder = Some(builder);
    }

    fn add(&mut self, config: &[usize], outcome: Outcome) {
        // Nothing to store and nothing to evict: skip building the
        // artifact altogether.
        if outcome == Outcome::Fail && !self.policy.cache_fail && !self.policy.evict_after_fail {
            return;
        }
        let Some(builder) = &self.builder else {
            return;
        };
        let content = builder.build(config);

        if outcome == Outcome::Pass || self.policy.cache_fail {
            self.entries.insert(content.clone(), outcome);
        }

        if outcome == Outcome::Fail && self.policy.evict_after_fail {
            let length = content.len();
            let before = self.entries.len();
            self.entries.retain(|key, _| key.len() <= length);
            trace!(
                target: "engine.cache",
                length,
                evicted = before - self.entries.len(),
                "evicted larger artifacts"
            );
        }
    }

    fn lookup(&self, config: &[usize]) -> Option<Outcome> {
        let builder = self.builder.as_ref()?;
        self.entries.get(&builder.build(config)).copied()
    }

    fn clear(&mut self) {}
}

type Sha256Digest = [u8; 32];

/// Cache keyed by a SHA-256 digest of the artifact, storing the artifact
/// length alongside for size-based eviction.
///
/// FAIL outcomes are never stored, regardless of
/// [`CachePolicy::cache_fail`]: a digest collision could otherwise make a
/// never-tested config look like a known failure, silently corrupting the
/// reduction. The policy flag is ignored rather than rejected.
pub struct ContentHashCache {
    evict_after_fail: bool,
    builder: Option<Arc<dyn TestBuilder>>,
    entries: HashMap<Sha256Digest, (Outcome, usize)>,
}

impl ContentHashCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            evict_after_fail: policy.evict_after_fail,
            builder: None,
            entries: HashMap::new(),
        }
    }

    fn digest(content: &str) -> Sha256Digest {
        Sha256::digest(content.as_bytes()).into()
    }
}

impl OutcomeCache for ContentHashCache {
    fn set_test_builder(&mut self, builder: Arc<dyn TestBuilder>) {
        self.builder = Some(builder);
    }

    fn add(&mut self, config: &[usize], outcome: Outcome) {
        if outcome == Outcome::Fail && !self.evict_after_fail {
            return;
        }
        let Some(builder) = &self.builder else {
            return;
        };
        let content = builder.build(config);
        let length = content.len();

        if outcome == Outcome::Pass {
            self.entries
                .insert(Self::digest(&content), (outcome, length));
        }

        if outcome == Outcome::Fail && self.evict_after_fail {
            self.entries.retain(|_, (_, len)| *len <= length);
        }
    }

    fn lookup(&self, config: &[usize]) -> Option<Outcome> {
        let builder = self.builder.as_ref()?;
        let digest = Self::digest(&builder.build(config));
        self.entries.get(&digest).map(|(outcome, _)| *outcome)
    }

    fn clear(&mut self) {}
}
