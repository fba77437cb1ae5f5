//! Config-keyed cache over a trie of atom indices.

use std::collections::HashMap;

use tracing::trace;

use core_model::Outcome;

use crate::{CachePolicy, OutcomeCache};

#[derive(Debug, Default)]
struct Node {
    /// Outcome of the exact config ending at this node, if tested.
    outcome: Option<Outcome>,
    children: HashMap<usize, Node>,
}

/// Zeller's original caching approach: configurations are paths in a
/// trie, each node holding the outcome of the prefix that ends there.
/// Lookup and insertion are `O(|config|)`.
#[derive(Debug, Default)]
pub struct ConfigCache {
    policy: CachePolicy,
    root: Node,
}

impl ConfigCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            root: Node::default(),
        }
    }
}

impl OutcomeCache for ConfigCache {
    fn add(&mut self, config: &[usize], outcome: Outcome) {
        if outcome == Outcome::Pass || self.policy.cache_fail {
            let mut node = &mut self.root;
            for &atom in config {
                node = node.children.entry(atom).or_default();
            }
            node.outcome = Some(outcome);
        }

        if outcome == Outcome::Fail && self.policy.evict_after_fail {
            trace!(target: "engine.cache", depth = config.len(), "evicting larger entries");
            evict_below(&mut self.root, config.len());
        }
    }

    fn lookup(&self, config: &[usize]) -> Option<Outcome> {
        let mut node = &self.root;
        for &atom in config {
            node = node.children.get(&atom)?;
        }
        node.outcome
    }

    fn clear(&mut self) {
        self.root = Node::default();
    }
}

/// Drop every subtree below `depth`, erasing all entries longer than the
/// config that just failed. The entry at exactly `depth` survives.
fn evict_below(node: &mut Node, depth: usize) {
    if depth == 0 {
        node.children.clear();
        return;
    }
    for child in node.children.values_mut() {
        evict_below(child, depth - 1);
    }
}
