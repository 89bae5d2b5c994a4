//! Caller-owned storage for released resumptions
//!
//! Clauses that keep a resumption past their own return release it into a
//! [`ResumptionSlot`] or a [`ResumptionTable`] shared with whoever resumes
//! it later. Both hand a stored resumption out at most once.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::runtime::{Released, Resumption};

/// Holds at most one released resumption
#[derive(Debug, Default)]
pub struct ResumptionSlot {
    inner: Mutex<Option<Released>>,
}

impl ResumptionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `released`; an occupied slot hands it back
    pub fn put(&self, released: Released) -> Result<(), Released> {
        let mut slot = self.inner.lock();
        if slot.is_some() {
            return Err(released);
        }
        *slot = Some(released);
        Ok(())
    }

    /// Empty the slot
    pub fn take(&self) -> Option<Released> {
        self.inner.lock().take()
    }

    /// Empty the slot and reconstitute what it held
    pub fn take_as<Out: Send + 'static, A: Send + 'static>(&self) -> Option<Resumption<Out, A>> {
        self.take().map(Resumption::reconstitute)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_none()
    }
}

/// Released resumptions keyed by `K`
#[derive(Debug)]
pub struct ResumptionTable<K> {
    inner: Mutex<HashMap<K, Released>>,
}

impl<K: Eq + Hash> Default for ResumptionTable<K> {
    fn default() -> Self {
        ResumptionTable {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash> ResumptionTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `released` under `key`; an occupied key hands it back
    pub fn insert(&self, key: K, released: Released) -> Result<(), Released> {
        let mut table = self.inner.lock();
        if table.contains_key(&key) {
            return Err(released);
        }
        table.insert(key, released);
        Ok(())
    }

    pub fn remove(&self, key: &K) -> Option<Released> {
        self.inner.lock().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Remove and return every stored resumption
    pub fn drain(&self) -> Vec<(K, Released)> {
        self.inner.lock().drain().collect()
    }
}
