// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Memoized, dependency-tracked key-value storage for one layer.
//!
//! A [`Table`] pairs a memoized cache with per-key dependent tracking, so a later transaction
//! can tell exactly which registered dependencies a changed value needs to propagate to.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::registry::{Descriptor, Handle};

/// Whether a [`Table`] retains computed values for fast repeated reads, or evicts them
/// immediately after the read that produced them, trading memory for recomputation.
///
/// Both modes observe the same external contract; see the module docs on [`Table::get`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CacheMode {
    /// Keep every computed value until it is explicitly invalidated.
    WithCache,
    /// Keep only what is needed to diff a future recompute; every `get` beyond the one that
    /// populated an entry recomputes it again.
    NoCache,
}

struct Inner<K, V, D> {
    mode: CacheMode,
    values: HashMap<K, V>,
    dependents: HashMap<K, HashSet<Handle<D>>>,
}

/// A memoized `Key -> Value` table that also records, per key, which registered dependencies
/// read it.
///
/// `get` takes `&self`: a `Table` is read through an internal lock so that multiple scheduler
/// workers can read the *previous* layer's table concurrently while this layer's own update is
/// in flight. Mutation through [`Table::execute_optimistic`]/[`Table::execute_pessimistic`] is
/// still expected to be driven single-threaded, by the one layer that owns this table.
pub struct Table<K, V, D> {
    inner: Mutex<Inner<K, V, D>>,
}

impl<K, V, D> fmt::Debug for Table<K, V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Table")
            .field("mode", &inner.mode)
            .field("len", &inner.values.len())
            .finish()
    }
}

impl<K, V, D> Table<K, V, D>
where
    K: Clone + Eq + Hash,
    V: Clone + PartialEq,
    D: Descriptor,
{
    /// Creates an empty table in the given cache mode.
    #[must_use]
    pub fn new(mode: CacheMode) -> Self {
        Self {
            inner: Mutex::new(Inner { mode, values: HashMap::new(), dependents: HashMap::new() }),
        }
    }

    /// Looks up `key`, recording `consumer` (if given) as a dependent of it.
    ///
    /// Returns `None` on a cache miss (the caller must compute and [`Table::add`] the value).
    /// In [`CacheMode::NoCache`], a hit still records `consumer` but always returns `None`,
    /// forcing the caller to recompute — the table only remembers enough to diff the next
    /// recompute against, not the value itself.
    pub fn get(&self, key: &K, consumer: Option<Handle<D>>) -> Option<V> {
        let mut inner = self.inner.lock();
        let hit = inner.values.get(key).cloned();
        if hit.is_some() {
            if let Some(handle) = consumer {
                inner.dependents.entry(key.clone()).or_default().insert(handle);
            }
        }
        match inner.mode {
            CacheMode::WithCache => hit,
            CacheMode::NoCache => None,
        }
    }

    /// Unconditionally stores `value` under `key`, overwriting any previous value.
    pub fn add(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        inner.values.insert(key, value);
    }

    /// Records `consumer` as a dependent of `key` without performing a lookup.
    ///
    /// Used by a layer right after a cache-miss [`Table::add`], to attribute the read that
    /// triggered the computation.
    pub fn record_dependent(&self, key: K, consumer: Handle<D>) {
        let mut inner = self.inner.lock();
        inner.dependents.entry(key).or_default().insert(consumer);
    }

    /// Discards the values for `keys` without recomputation, returning the union of every
    /// handle previously recorded as a dependent of any discarded key.
    ///
    /// This is the pessimistic invalidation path (`lazy_incremental` layers): the framework
    /// cannot know whether the discarded value would have changed, so it conservatively
    /// propagates to every recorded consumer. The key becomes a cache miss; a later `get`
    /// recomputes it lazily.
    pub fn execute_pessimistic(&self, tx: Transaction<K>) -> HashSet<Handle<D>> {
        let mut inner = self.inner.lock();
        let mut triggered = HashSet::new();
        for key in tx.keys {
            inner.values.remove(&key);
            if let Some(deps) = inner.dependents.remove(&key) {
                triggered.extend(deps);
            }
        }
        triggered
    }

    /// Recomputes the values for `tx`'s keys via `update`, then diffs old against new per key.
    ///
    /// `update` must call [`Table::add`] for every key in `tx` (it may also legitimately leave
    /// a key absent, e.g. a trigger whose definition was deleted). Returns the union of handles
    /// recorded against keys whose new value is not equal to the value it held before this
    /// call — the "locally triggered dependencies" for this update. If `update` fails, the
    /// pre-call values are restored before the error is returned.
    pub fn execute_optimistic<F>(
        &self,
        tx: Transaction<K>,
        update: F,
    ) -> Result<HashSet<Handle<D>>, TransactionError>
    where
        F: FnOnce(&Self) -> Result<(), TransactionError>,
    {
        let old: Vec<(K, Option<V>)> = {
            let mut inner = self.inner.lock();
            tx.keys
                .iter()
                .map(|key| (key.clone(), inner.values.remove(key)))
                .collect()
        };

        if let Err(err) = update(self) {
            let mut inner = self.inner.lock();
            for (key, value) in old {
                if let Some(value) = value {
                    inner.values.insert(key, value);
                }
            }
            return Err(err);
        }

        let mut triggered = HashSet::new();
        let inner = self.inner.lock();
        for (key, old_value) in old {
            let new_value = inner.values.get(&key);
            let changed = match (&old_value, new_value) {
                (Some(o), Some(n)) => o != n,
                (None, None) => false,
                _ => true,
            };
            if changed {
                if let Some(deps) = inner.dependents.get(&key) {
                    triggered.extend(deps.iter().copied());
                }
            }
        }
        Ok(triggered)
    }

    /// Number of keys currently holding a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    /// Whether the table holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A batch of keys staged for invalidation, to be handed to
/// [`Table::execute_pessimistic`]/[`Table::execute_optimistic`].
///
/// Two-phase by construction: `open` then `stage`, a build-then-commit transaction shape.
#[derive(Debug, Default)]
pub struct Transaction<K> {
    keys: Vec<K>,
}

impl<K> Transaction<K> {
    /// Opens an empty transaction.
    #[must_use]
    pub fn open() -> Self {
        Self { keys: Vec::new() }
    }

    /// Stages `keys` for invalidation.
    pub fn stage(&mut self, keys: impl IntoIterator<Item = K>) {
        self.keys.extend(keys);
    }

    /// Number of keys staged so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys have been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A recompute failed while an optimistic transaction was in flight.
///
/// Hand-written `Display`/`Error` impl rather than `thiserror`: this type sits at the bottom of
/// the stack, next to the memoization primitive itself, where the lowest-level errors stay
/// dependency-free.
#[derive(Debug)]
pub struct TransactionError {
    message: String,
}

impl TransactionError {
    /// Builds an error carrying a human-readable `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transaction failed: {}", self.message)
    }
}

impl std::error::Error for TransactionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
    struct D(u32);

    fn table() -> Table<&'static str, u32, D> {
        Table::new(CacheMode::WithCache)
    }

    #[test]
    fn miss_then_add_then_hit() {
        let t = table();
        assert_eq!(t.get(&"a", None), None);
        t.add("a", 1);
        assert_eq!(t.get(&"a", None), Some(1));
    }

    #[test]
    fn no_cache_always_misses_but_still_records_dependents() {
        let t: Table<&str, u32, D> = Table::new(CacheMode::NoCache);
        t.add("a", 1);
        let registry = crate::registry::Registry::<D>::new();
        let h = registry.register(D(1));
        assert_eq!(t.get(&"a", Some(h)), None);

        let mut tx = Transaction::open();
        tx.stage(["a"]);
        let triggered = t.execute_optimistic(tx, |table| {
            table.add("a", 2);
            Ok(())
        }).unwrap();
        assert!(triggered.contains(&h));
    }

    #[test]
    fn optimistic_equal_value_does_not_trigger() {
        let t = table();
        t.add("a", 1);
        let registry = crate::registry::Registry::<D>::new();
        let h = registry.register(D(1));
        assert_eq!(t.get(&"a", Some(h)), Some(1));

        let mut tx = Transaction::open();
        tx.stage(["a"]);
        let triggered = t.execute_optimistic(tx, |table| {
            table.add("a", 1);
            Ok(())
        }).unwrap();
        assert!(triggered.is_empty());
        assert_eq!(t.get(&"a", None), Some(1));
    }

    #[test]
    fn optimistic_changed_value_triggers_recorded_dependents() {
        let t = table();
        t.add("a", 1);
        let registry = crate::registry::Registry::<D>::new();
        let h = registry.register(D(1));
        assert_eq!(t.get(&"a", Some(h)), Some(1));

        let mut tx = Transaction::open();
        tx.stage(["a"]);
        let triggered = t.execute_optimistic(tx, |table| {
            table.add("a", 2);
            Ok(())
        }).unwrap();
        assert_eq!(triggered, HashSet::from([h]));
    }

    #[test]
    fn optimistic_failure_restores_old_value() {
        let t = table();
        t.add("a", 1);
        let mut tx = Transaction::open();
        tx.stage(["a"]);
        let err = t.execute_optimistic(tx, |_table| Err(TransactionError::new("boom")));
        assert!(err.is_err());
        assert_eq!(t.get(&"a", None), Some(1));
    }

    #[test]
    fn pessimistic_discards_and_triggers_unconditionally() {
        let t = table();
        t.add("a", 1);
        let registry = crate::registry::Registry::<D>::new();
        let h = registry.register(D(1));
        assert_eq!(t.get(&"a", Some(h)), Some(1));

        let mut tx = Transaction::open();
        tx.stage(["a"]);
        let triggered = t.execute_pessimistic(tx);
        assert_eq!(triggered, HashSet::from([h]));
        assert_eq!(t.get(&"a", None), None);
    }
}
