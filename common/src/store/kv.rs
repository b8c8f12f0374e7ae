// Versioned key-value state
// Committed entries live in a BTreeMap; writes of the current round are
// kept as an ordered overlay where `None` marks a removal. Savepoints
// snapshot the overlay so a failed transaction can be rolled back
// without touching committed state.

use indexmap::IndexMap;
use log::trace;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Snapshot of the uncommitted overlay of one state
#[derive(Debug, Clone)]
pub struct KvSavepoint<K: Hash + Eq, V> {
    modifications: IndexMap<K, Option<V>>,
}

impl<K: Hash + Eq, V> KvSavepoint<K, V> {
    fn get(&self, key: &K) -> Option<Option<&V>> {
        self.modifications.get(key).map(Option::as_ref)
    }
}

#[derive(Debug, Clone)]
pub struct WritableKvState<K: Hash + Eq, V> {
    name: &'static str,
    committed: BTreeMap<K, V>,
    modifications: IndexMap<K, Option<V>>,
}

impl<K, V> WritableKvState<K, V>
where
    K: Ord + Hash + Eq + Clone + Debug,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            committed: BTreeMap::new(),
            modifications: IndexMap::new(),
        }
    }

    /// Build a state whose entries are already committed
    pub fn with_committed<I: IntoIterator<Item = (K, V)>>(name: &'static str, entries: I) -> Self {
        Self {
            name,
            committed: entries.into_iter().collect(),
            modifications: IndexMap::new(),
        }
    }

    /// Current value, seeing uncommitted writes
    pub fn get(&self, key: &K) -> Option<&V> {
        match self.modifications.get(key) {
            Some(modified) => modified.as_ref(),
            None => self.committed.get(key),
        }
    }

    /// Value as of the last commit
    pub fn get_original(&self, key: &K) -> Option<&V> {
        self.committed.get(key)
    }

    /// Value as of the given savepoint
    pub fn get_at<'a>(&'a self, savepoint: &'a KvSavepoint<K, V>, key: &K) -> Option<&'a V> {
        match savepoint.get(key) {
            Some(modified) => modified,
            None => self.committed.get(key),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn put(&mut self, key: K, value: V) {
        self.modifications.insert(key, Some(value));
    }

    pub fn remove(&mut self, key: &K) {
        self.modifications.insert(key.clone(), None);
    }

    /// Read-ahead hook; the in-memory state has nothing to prefetch
    pub fn warm(&self, key: &K) {
        let _ = self.get(key);
    }

    /// Number of live entries, counting uncommitted writes
    pub fn size(&self) -> usize {
        let mut size = self.committed.len();
        for (key, value) in &self.modifications {
            match (self.committed.contains_key(key), value.is_some()) {
                (false, true) => size += 1,
                (true, false) => size = size.saturating_sub(1),
                _ => {}
            }
        }
        size
    }

    /// Keys written since the last commit, in write order
    pub fn modified_keys(&self) -> impl Iterator<Item = &K> {
        self.modifications.keys()
    }

    pub fn is_modified(&self) -> bool {
        !self.modifications.is_empty()
    }

    pub fn savepoint(&self) -> KvSavepoint<K, V> {
        KvSavepoint {
            modifications: self.modifications.clone(),
        }
    }

    pub fn rollback_to(&mut self, savepoint: KvSavepoint<K, V>) {
        self.modifications = savepoint.modifications;
    }

    /// Drop every uncommitted write
    pub fn discard(&mut self) {
        self.modifications.clear();
    }

    /// Fold the overlay into committed state
    pub fn commit(&mut self) {
        if log::log_enabled!(log::Level::Trace) {
            trace!("Committing {} writes to {}", self.modifications.len(), self.name);
        }
        for (key, value) in self.modifications.drain(..) {
            match value {
                Some(value) => {
                    self.committed.insert(key, value);
                }
                None => {
                    self.committed.remove(&key);
                }
            }
        }
    }

    /// Merged view of all live entries, ordered by key
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        let mut merged: BTreeMap<&K, &V> = self.committed.iter().collect();
        for (key, value) in &self.modifications {
            match value {
                Some(value) => {
                    merged.insert(key, value);
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged.into_iter()
    }
}
