// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A generic, incrementally-updatable derived view over a previous layer.
//!
//! [`EnvironmentLayer`] wraps a memoized table and a previous layer into one struct whose public
//! surface is "read a key's value" and "tell me what changed since the last update," generalized
//! to an arbitrary `Key -> Value` mapping over an arbitrary previous layer via the [`LayerRules`]
//! bridge a concrete domain crate implements once per layer.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::registry::{Descriptor, Handle, Registry};
use crate::scheduler::{DependencyCollector, Policy, Scheduler};
use crate::table::{CacheMode, Table, Transaction};
use crate::update_result::UpdateResult;

/// A previous layer's read-only surface, as seen by the layer built on top of it.
///
/// Implemented by [`EnvironmentLayer`] itself (so layers stack), and by a domain crate's
/// external seams (e.g. a parser layer) at the floor of a stack.
pub trait ReadableLayer<D: Descriptor>: Send + Sync {
    /// The previous layer's key type.
    type Key;
    /// The previous layer's value type.
    type Value;

    /// Reads `key`, attributing the read to `dependency` if given.
    fn get(&self, dependency: Option<Handle<D>>, key: &Self::Key) -> Self::Value;
}

/// The six bridging functions a concrete layer implements to plug into [`EnvironmentLayer`].
///
/// `Key`/`Trigger` are often the same type (most layers recompute exactly what they're keyed
/// on); they are kept distinct because some layers invalidate at a coarser grain than they key
/// at (e.g. a class-hierarchy layer keyed by class name but triggered per module).
pub trait LayerRules<D: Descriptor>: Send + Sync {
    /// What this layer's table is keyed by.
    type Key: Clone + Eq + Hash + Ord + Send + Sync;
    /// What this layer's table stores.
    type Value: Clone + PartialEq + Send + Sync;
    /// The unit of recomputation work during an `update` (see [`LayerRules::key_to_trigger`]).
    type Trigger: Clone + Eq + Hash + Send + Sync;
    /// The layer beneath this one.
    type Previous: ReadableLayer<D>;

    /// Derives the recomputation trigger for a key read lazily via [`EnvironmentLayer::get`].
    fn key_to_trigger(&self, key: &Self::Key) -> Self::Trigger;

    /// The inverse of [`LayerRules::key_to_trigger`]: which key a trigger recomputes.
    fn convert_trigger(&self, trigger: &Self::Trigger) -> Self::Key;

    /// The dependency descriptor that identifies this trigger's own fact, registered so that
    /// future reads of the key it produces can be attributed back to it.
    fn trigger_to_dependency(&self, trigger: &Self::Trigger) -> D;

    /// Maps an upstream descriptor onto the trigger it should cause in this layer, if any.
    fn filter_upstream_dependency(&self, descriptor: &D) -> Option<Self::Trigger>;

    /// Computes the value for `trigger`, reading `upstream` as needed. `dependency` is this
    /// trigger's own registered handle: every `upstream.get` call made while producing this
    /// value should pass it along, so a later upstream invalidation reaches this trigger.
    fn produce_value(
        &self,
        upstream: &Self::Previous,
        trigger: &Self::Trigger,
        dependency: Option<Handle<D>>,
    ) -> Self::Value;

    /// Whether this layer discards invalidated values without recomputing them eagerly,
    /// recomputing lazily instead on the next [`EnvironmentLayer::get`].
    ///
    /// Pessimistic layers unconditionally propagate invalidation to every recorded consumer of
    /// a discarded key, since the framework has no recomputed value to diff against.
    fn lazy_incremental(&self) -> bool {
        false
    }

    /// The cache mode this layer's table is constructed with.
    fn cache_mode(&self) -> CacheMode {
        CacheMode::WithCache
    }

    /// Serializes this layer's non-tabular state (table contents are never persisted).
    fn store_state(&self, _writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        Ok(())
    }

    /// Restores this layer's non-tabular state from a prior [`LayerRules::store_state`] call.
    fn load_state(&mut self, _reader: &mut dyn std::io::Read) -> std::io::Result<()> {
        Ok(())
    }
}

/// A lazily-computed, incrementally-updatable derived view over a previous layer.
///
/// Owns its [`LayerRules`] implementation, the previous layer it reads through, a shared
/// [`Registry`], and its own memoization [`Table`]. `get` takes `&self` (safe to call from
/// multiple scheduler workers between updates); `update` takes `&mut self`, so the borrow
/// checker enforces that no concurrent reader observes a layer mid-update.
pub struct EnvironmentLayer<R: LayerRules<D>, D: Descriptor> {
    rules: R,
    previous: R::Previous,
    registry: Arc<Registry<D>>,
    table: Table<R::Key, R::Value, D>,
}

impl<R: LayerRules<D>, D: Descriptor> EnvironmentLayer<R, D> {
    /// Builds a fresh, empty layer over `previous`, sharing `registry` with the rest of the
    /// stack.
    pub fn new(rules: R, previous: R::Previous, registry: Arc<Registry<D>>) -> Self {
        let table = Table::new(rules.cache_mode());
        Self { rules, previous, registry, table }
    }

    /// Reads `key`, computing and memoizing it on a miss. `dependency` is the handle of
    /// whatever is reading `key` (usually another layer's current trigger), recorded so that a
    /// future change to `key`'s value is known to affect that consumer.
    pub fn get(&self, dependency: Option<Handle<D>>, key: &R::Key) -> R::Value {
        if let Some(value) = self.table.get(key, dependency) {
            return value;
        }

        let trigger = self.rules.key_to_trigger(key);
        let own_descriptor = self.rules.trigger_to_dependency(&trigger);
        let own_handle = self.registry.register(own_descriptor);
        let value = self.rules.produce_value(&self.previous, &trigger, Some(own_handle));

        self.table.add(key.clone(), value.clone());
        if let Some(consumer) = dependency {
            self.table.record_dependent(key.clone(), consumer);
        }
        value
    }

    /// Applies the upstream update result to this layer: every trigger it causes here is either
    /// discarded (lazy layers) or recomputed (eager layers), and the resulting "locally
    /// triggered dependencies" are chained onto `upstream_result` for the next layer up.
    pub fn update<S: Scheduler>(&mut self, scheduler: &S, upstream_result: UpdateResult<D>) -> UpdateResult<D> {
        let span = tracing::debug_span!("envtrack_core::layer::update");
        let _enter = span.enter();

        let mut trigger_map: HashMap<R::Trigger, Handle<D>> = HashMap::new();
        for set in upstream_result.all_triggered_dependencies() {
            for &handle in set.iter() {
                let descriptor = self.registry.get_descriptor(handle);
                if let Some(trigger) = self.rules.filter_upstream_dependency(&descriptor) {
                    trigger_map.entry(trigger).or_insert(handle);
                }
            }
        }
        tracing::trace!(triggers = trigger_map.len(), "collected upstream triggers");

        let keys: Vec<R::Key> = trigger_map.keys().map(|trigger| self.rules.convert_trigger(trigger)).collect();

        let locally_triggered = if self.rules.lazy_incremental() {
            let mut tx = Transaction::open();
            tx.stage(keys);
            self.table.execute_pessimistic(tx)
        } else {
            let mut tx = Transaction::open();
            tx.stage(keys);
            let triggers: Vec<R::Trigger> = trigger_map.into_keys().collect();
            let rules = &self.rules;
            let previous = &self.previous;
            let registry = &self.registry;
            self.table
                .execute_optimistic(tx, |table| {
                    let (results, _candidates) = scheduler.collected_map_reduce(
                        Policy::fixed_chunk_count(1, 100, 5),
                        registry,
                        &|chunk: &[R::Trigger], collector: &DependencyCollector<'_, D>| {
                            Self::recompute_chunk(rules, previous, chunk, collector)
                        },
                        &|mut a: Vec<(R::Key, R::Value)>, mut b: Vec<(R::Key, R::Value)>| {
                            a.append(&mut b);
                            a
                        },
                        &triggers,
                        Vec::new(),
                    );
                    for (key, value) in results {
                        table.add(key, value);
                    }
                    Ok(())
                })
                .expect("produce_value is total; a layer update does not fail")
        };

        tracing::debug!(changed = locally_triggered.len(), "layer update complete");
        UpdateResult::chain(locally_triggered, upstream_result)
    }

    fn recompute_chunk(
        rules: &R,
        previous: &R::Previous,
        chunk: &[R::Trigger],
        collector: &DependencyCollector<'_, D>,
    ) -> Vec<(R::Key, R::Value)> {
        chunk
            .iter()
            .map(|trigger| {
                let descriptor = rules.trigger_to_dependency(trigger);
                let own_handle = collector.register(descriptor);
                let value = rules.produce_value(previous, trigger, Some(own_handle));
                (rules.convert_trigger(trigger), value)
            })
            .collect()
    }

    /// The layer beneath this one.
    ///
    /// Layers nest by value (`EnvironmentLayer` owns its `previous`), so a stack built from
    /// these is one single chain with one table per layer; reach an intermediate layer through
    /// this accessor rather than constructing a second, divergent copy of the chain beneath it.
    #[must_use]
    pub fn previous(&self) -> &R::Previous {
        &self.previous
    }

    /// Mutable access to the layer beneath this one, for driving its own `update` before this
    /// layer's.
    pub fn previous_mut(&mut self) -> &mut R::Previous {
        &mut self.previous
    }

    /// Number of keys currently memoized.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no keys are currently memoized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Serializes this layer's non-tabular state.
    pub fn store_state(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        self.rules.store_state(writer)
    }

    /// Restores this layer's non-tabular state.
    pub fn load_state(&mut self, reader: &mut dyn std::io::Read) -> std::io::Result<()> {
        self.rules.load_state(reader)
    }
}

impl<R: LayerRules<D>, D: Descriptor> ReadableLayer<D> for EnvironmentLayer<R, D> {
    type Key = R::Key;
    type Value = R::Value;

    fn get(&self, dependency: Option<Handle<D>>, key: &Self::Key) -> Self::Value {
        EnvironmentLayer::get(self, dependency, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SequentialScheduler;
    use std::collections::HashSet;

    #[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
    enum D {
        Input(&'static str),
        Doubled(&'static str),
    }

    struct Floor {
        values: std::sync::Mutex<HashMap<&'static str, i64>>,
    }

    impl ReadableLayer<D> for Floor {
        type Key = &'static str;
        type Value = i64;

        fn get(&self, _dependency: Option<Handle<D>>, key: &Self::Key) -> Self::Value {
            *self.values.lock().unwrap().get(key).unwrap_or(&0)
        }
    }

    struct DoublingRules;

    impl LayerRules<D> for DoublingRules {
        type Key = &'static str;
        type Value = i64;
        type Trigger = &'static str;
        type Previous = Floor;

        fn key_to_trigger(&self, key: &Self::Key) -> Self::Trigger {
            key
        }

        fn convert_trigger(&self, trigger: &Self::Trigger) -> Self::Key {
            trigger
        }

        fn trigger_to_dependency(&self, trigger: &Self::Trigger) -> D {
            D::Doubled(trigger)
        }

        fn filter_upstream_dependency(&self, descriptor: &D) -> Option<Self::Trigger> {
            match descriptor {
                D::Input(name) => Some(name),
                D::Doubled(_) => None,
            }
        }

        fn produce_value(&self, upstream: &Self::Previous, trigger: &Self::Trigger, dependency: Option<Handle<D>>) -> Self::Value {
            upstream.get(dependency, trigger) * 2
        }
    }

    fn floor(values: &[(&'static str, i64)]) -> Floor {
        Floor { values: std::sync::Mutex::new(values.iter().copied().collect()) }
    }

    #[test]
    fn lazy_get_computes_and_memoizes() {
        let registry = Registry::shared();
        let layer = EnvironmentLayer::new(DoublingRules, floor(&[("a", 3)]), registry);
        assert_eq!(layer.get(None, &"a"), 6);
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.get(None, &"a"), 6);
        assert_eq!(layer.len(), 1);
    }

    #[test]
    fn update_leaves_unchanged_values_untriggered() {
        let registry = Registry::shared();
        let mut layer = EnvironmentLayer::new(DoublingRules, floor(&[("a", 3), ("b", 5)]), registry.clone());
        assert_eq!(layer.get(None, &"a"), 6);
        assert_eq!(layer.get(None, &"b"), 10);

        let input_a = registry.register(D::Input("a"));
        let upstream = UpdateResult::from_single(HashSet::from([input_a]));

        let scheduler = SequentialScheduler;
        let result = layer.update(&scheduler, upstream);

        let sets: Vec<_> = result.all_triggered_dependencies().collect();
        assert_eq!(sets.len(), 2);
        assert!(sets[1].is_empty(), "floor value for \"a\" did not change, so nothing should trigger");
        assert_eq!(layer.get(None, &"a"), 6);
        assert_eq!(layer.get(None, &"b"), 10);
    }

    #[test]
    fn update_propagates_to_recorded_consumers_when_value_changes() {
        let registry = Registry::shared();
        let floor = floor(&[("a", 3)]);
        let mut layer = EnvironmentLayer::new(DoublingRules, floor, registry.clone());

        let consumer = registry.register(D::Input("consumer-of-a"));
        assert_eq!(layer.get(Some(consumer), &"a"), 6);

        layer.previous.values.lock().unwrap().insert("a", 100);

        let input_a = registry.register(D::Input("a"));
        let upstream = UpdateResult::from_single(HashSet::from([input_a]));

        let scheduler = SequentialScheduler;
        let result = layer.update(&scheduler, upstream);

        assert_eq!(result.top(), Some(&HashSet::from([consumer])));
        assert_eq!(layer.get(None, &"a"), 200);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::scheduler::SequentialScheduler;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
    enum D {
        Input(&'static str),
        Doubled(&'static str),
    }

    const KEYS: [&str; 4] = ["a", "b", "c", "d"];

    struct Floor {
        values: std::sync::Mutex<HashMap<&'static str, i64>>,
    }

    impl ReadableLayer<D> for Floor {
        type Key = &'static str;
        type Value = i64;

        fn get(&self, _dependency: Option<Handle<D>>, key: &Self::Key) -> Self::Value {
            *self.values.lock().unwrap().get(key).unwrap_or(&0)
        }
    }

    struct DoublingRules;

    impl LayerRules<D> for DoublingRules {
        type Key = &'static str;
        type Value = i64;
        type Trigger = &'static str;
        type Previous = Floor;

        fn key_to_trigger(&self, key: &Self::Key) -> Self::Trigger {
            key
        }

        fn convert_trigger(&self, trigger: &Self::Trigger) -> Self::Key {
            trigger
        }

        fn trigger_to_dependency(&self, trigger: &Self::Trigger) -> D {
            D::Doubled(trigger)
        }

        fn filter_upstream_dependency(&self, descriptor: &D) -> Option<Self::Trigger> {
            match descriptor {
                D::Input(name) => Some(name),
                D::Doubled(_) => None,
            }
        }

        fn produce_value(&self, upstream: &Self::Previous, trigger: &Self::Trigger, dependency: Option<Handle<D>>) -> Self::Value {
            upstream.get(dependency, trigger) * 2
        }
    }

    fn floor_values() -> impl Strategy<Value = Vec<(&'static str, i64)>> {
        proptest::collection::vec((proptest::sample::select(&KEYS[..]), -1000i64..1000), 0..KEYS.len())
    }

    fn build(values: &[(&'static str, i64)]) -> (Arc<Registry<D>>, EnvironmentLayer<DoublingRules, D>) {
        let registry = Registry::shared();
        let floor = Floor { values: std::sync::Mutex::new(values.iter().copied().collect()) };
        (registry.clone(), EnvironmentLayer::new(DoublingRules, floor, registry))
    }

    proptest! {
        /// Invariant 1 (memoization purity): two successive `get` calls for the same key, with
        /// no intervening update, return equal values.
        #[test]
        fn memoization_purity(values in floor_values(), key in proptest::sample::select(&KEYS[..])) {
            let (_registry, layer) = build(&values);
            let first = layer.get(None, &key);
            let second = layer.get(None, &key);
            prop_assert_eq!(first, second);
        }

        /// Invariant 2 (recomputation equivalence): after an update, every key whose value
        /// changed now equals `produce_value` computed from scratch on a fresh layer over the
        /// same upstream state.
        #[test]
        fn recomputation_equivalence(initial in floor_values(), updated in floor_values()) {
            let (registry, mut layer) = build(&initial);
            for &(key, _) in &initial {
                let _ = layer.get(None, &key);
            }

            {
                let mut inner = layer.previous_mut().values.lock().unwrap();
                inner.clear();
                inner.extend(updated.iter().copied());
            }

            let touched: HashSet<Handle<D>> = initial
                .iter()
                .chain(updated.iter())
                .map(|&(key, _)| registry.register(D::Input(key)))
                .collect();
            let upstream = UpdateResult::from_single(touched);
            let scheduler = SequentialScheduler;
            layer.update(&scheduler, upstream);

            let fresh_floor = Floor { values: std::sync::Mutex::new(updated.iter().copied().collect()) };
            for &(key, _) in &updated {
                let from_scratch = DoublingRules.produce_value(&fresh_floor, &key, None);
                prop_assert_eq!(layer.get(None, &key), from_scratch);
            }
        }

        /// Invariant 3 (minimal invalidation): if no upstream descriptor matches this layer's
        /// `filter_upstream_dependency`, the locally-triggered set from `update` is empty.
        #[test]
        fn minimal_invalidation(values in floor_values()) {
            let (registry, mut layer) = build(&values);
            for &(key, _) in &values {
                let _ = layer.get(None, &key);
            }

            // `D::Doubled` never matches `filter_upstream_dependency` (only `D::Input` does).
            let irrelevant = registry.register(D::Doubled("unrelated"));
            let upstream = UpdateResult::from_single(HashSet::from([irrelevant]));
            let scheduler = SequentialScheduler;
            let result = layer.update(&scheduler, upstream);

            prop_assert!(result.top().unwrap().is_empty());
        }
    }

    /// Invariant 4 (chain monotonicity): `all_triggered_dependencies` has exactly one entry per
    /// layer update applied, bottom-first.
    #[test]
    fn chain_monotonicity_has_one_entry_per_layer() {
        let registry = Registry::shared();
        let floor = Floor { values: std::sync::Mutex::new(HashMap::from([("a", 1)])) };
        let mut layer = EnvironmentLayer::new(DoublingRules, floor, registry.clone());

        let seed = UpdateResult::from_single(HashSet::new());
        assert_eq!(seed.all_triggered_dependencies().count(), 1);

        let scheduler = SequentialScheduler;
        let result = layer.update(&scheduler, seed);
        assert_eq!(result.all_triggered_dependencies().count(), 2);
    }
}
