// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The topmost layer: type-checking results for individual function/method definitions.
//!
//! Unlike the four layers beneath it, this one is not a generic [`envtrack_core::LayerRules`]
//! implementation: its triggers come from the recheck driver's own function-level analysis
//! (extracted `TypeCheckDefine` triggers and `define_additions`), not from a 1:1 mapping over
//! the previous layer's module-grain invalidation. It takes the
//! annotated-globals layer as a parameter on each call rather than owning it, since the stack
//! already owns the one canonical copy of that layer (and everything beneath it) and this type
//! would otherwise need a second, divergent copy to hold onto it itself.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use envtrack_core::{CacheMode, Handle, ReadableLayer, Registry, Table, Transaction};

use crate::descriptor::Descriptor;
use crate::facts::{AnnotatedGlobal, ModuleTable, TypeCheckResult};
use crate::names::{ModuleName, QualifiedName};
use crate::seams::TypeInferencePass;

/// Memoized type-checking results, keyed by fully-qualified definition name.
pub struct TypeEnvironmentLayer {
    registry: Arc<Registry<Descriptor>>,
    table: Table<QualifiedName, TypeCheckResult, Descriptor>,
    /// The last `AnnotatedGlobal` fact observed for each definition this layer has read
    /// through, at function grain. `AnnotatedGlobal` itself is keyed module-wide, so a change
    /// anywhere in a module (including a sibling's own edit) flips every reader's module-grain
    /// dependency; comparing against this map is what lets a recheck tell a definition that
    /// genuinely changed apart from one that was merely swept up by its module's invalidation.
    last_seen_facts: Mutex<HashMap<QualifiedName, AnnotatedGlobal>>,
}

impl TypeEnvironmentLayer {
    /// Builds an empty type environment sharing `registry` with the rest of the stack.
    pub fn new(registry: Arc<Registry<Descriptor>>) -> Self {
        Self { registry, table: Table::new(CacheMode::WithCache), last_seen_facts: Mutex::new(HashMap::new()) }
    }

    /// Narrows `candidates` down to the definitions that must actually be re-inferred, using
    /// `changed_modules` (the modules whose own parse tree changed this recheck) and `current`
    /// (a fresh read of every candidate's containing module). Updates this layer's record of
    /// what it has seen for every name looked up.
    ///
    /// A candidate only gets the per-symbol treatment when its own module is one that changed:
    /// that is exactly the module-grain invalidation sweeping up every definition that reads
    /// through it, so only the ones whose own `AnnotatedGlobal` fact actually moved survive. A
    /// candidate whose own module did *not* change was triggered through some other module's
    /// table (e.g. a caller reading a callee defined elsewhere) — the dependent-tracking that
    /// put it in `candidates` in the first place already pinned that down precisely, so it is
    /// never second-guessed here.
    pub fn filter_changed_definitions(
        &self,
        candidates: &[QualifiedName],
        changed_modules: &HashSet<ModuleName>,
        current: &HashMap<ModuleName, ModuleTable<AnnotatedGlobal>>,
    ) -> Vec<QualifiedName> {
        let mut last_seen = self.last_seen_facts.lock();
        let mut changed = Vec::new();
        for name in candidates {
            let fresh = current.get(name.module()).and_then(|table| table.get(name).cloned());
            let previous = last_seen.get(name).cloned();
            if !changed_modules.contains(name.module()) || fresh != previous {
                changed.push(name.clone());
            }
            match fresh {
                Some(fact) => {
                    last_seen.insert(name.clone(), fact);
                }
                None => {
                    last_seen.remove(name);
                }
            }
        }
        changed
    }

    /// Reads the type-checking result for `key`, falling back to the declared annotation if it
    /// has not been checked yet. `annotated` is the stack's annotated-globals layer.
    pub fn get<A>(&self, dependency: Option<Handle<Descriptor>>, key: &QualifiedName, annotated: &A) -> TypeCheckResult
    where
        A: ReadableLayer<Descriptor, Key = ModuleName, Value = ModuleTable<AnnotatedGlobal>>,
    {
        if let Some(value) = self.table.get(key, dependency) {
            return value;
        }
        let own = self.registry.register(Descriptor::TypeCheckDefine(key.clone()));
        let value = Self::fallback_infer(key, Some(own), annotated);
        self.table.add(key.clone(), value.clone());
        if let Some(consumer) = dependency {
            self.table.record_dependent(key.clone(), consumer);
        }
        value
    }

    fn fallback_infer<A>(key: &QualifiedName, dependency: Option<Handle<Descriptor>>, annotated: &A) -> TypeCheckResult
    where
        A: ReadableLayer<Descriptor, Key = ModuleName, Value = ModuleTable<AnnotatedGlobal>>,
    {
        let module = annotated.get(dependency, key.module());
        let resolved_type = module
            .get(key)
            .and_then(|entry| entry.type_annotation.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        TypeCheckResult { resolved_type }
    }

    /// Driver-invoked: type-checks exactly `defines` via `pass`, returning the registered
    /// handles of definitions whose result actually changed. `annotated` is the stack's
    /// annotated-globals layer.
    ///
    /// `pass` is the external [`TypeInferencePass`]; this layer's own `fallback_infer` stands in
    /// for reading its result, since the real inference algorithm is out of scope here.
    pub fn recompute_defines<A>(
        &self,
        defines: &[QualifiedName],
        pass: &dyn TypeInferencePass,
        annotated: &A,
    ) -> HashSet<Handle<Descriptor>>
    where
        A: ReadableLayer<Descriptor, Key = ModuleName, Value = ModuleTable<AnnotatedGlobal>>,
    {
        if defines.is_empty() {
            return HashSet::new();
        }

        let pairs: Vec<(QualifiedName, Handle<Descriptor>)> = defines
            .iter()
            .map(|name| (name.clone(), self.registry.register(Descriptor::TypeCheckDefine(name.clone()))))
            .collect();

        let mut tx = Transaction::open();
        tx.stage(defines.iter().cloned());
        self.table
            .execute_optimistic(tx, |table| {
                pass.populate_for_definitions(&pairs);
                for (name, handle) in &pairs {
                    let value = Self::fallback_infer(name, Some(*handle), annotated);
                    table.add(name.clone(), value);
                }
                Ok(())
            })
            .expect("type-check recompute does not fail in this scaffold")
    }

    /// Number of definitions currently memoized.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no definitions are currently memoized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
