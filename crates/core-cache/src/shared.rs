//! Mutex-mediated cache sharing for concurrent workers.

use std::sync::{Arc, Mutex};

use core_model::{Outcome, TestBuilder};

use crate::OutcomeCache;

/// Cloneable, lock-mediated view of an outcome cache.
///
/// Every clone talks to the same underlying cache; each trait method
/// acquires the lock for the duration of the call. The wrapper itself
/// implements [`OutcomeCache`], so engines use it exactly like the cache
/// it wraps. Contention stays low in practice: lookups either hit
/// quickly or miss and lead into a long tester run.
#[derive(Clone)]
pub struct SharedCache {
    inner: Arc<Mutex<Box<dyn OutcomeCache>>>,
}

impl SharedCache {
    pub fn new(cache: Box<dyn OutcomeCache>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }
}

impl OutcomeCache for SharedCache {
    fn set_test_builder(&mut self, builder: Arc<dyn TestBuilder>) {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .set_test_builder(builder);
    }

    fn add(&mut self, config: &[usize], outcome: Outcome) {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .add(config, outcome);
    }

    fn lookup(&self, config: &[usize]) -> Option<Outcome> {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .lookup(config)
    }

    fn clear(&mut self) {
        self.inner.lock().expect("cache lock poisoned").clear();
    }
}
