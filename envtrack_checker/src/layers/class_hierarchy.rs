// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Linearizes each module's class definitions into a method resolution order.

use std::marker::PhantomData;

use envtrack_core::{CacheMode, EnvironmentLayer, Handle, LayerRules};

use crate::descriptor::Descriptor;
use crate::facts::{ClassMro, ClassifiedGlobal, ModuleTable};
use crate::names::{ModuleName, QualifiedName};
use crate::seams::ParserLayer;
use crate::seams::ParsedModule;

use super::unannotated_globals::UnannotatedGlobalsRules;

/// Bridges a module's [`crate::facts::GlobalDefinition`] table into a table of
/// [`ClassifiedGlobal`]s, each carrying its linearized base-class chain.
pub struct ClassHierarchyRules<P> {
    _parser: PhantomData<fn() -> P>,
}

impl<P> Default for ClassHierarchyRules<P> {
    fn default() -> Self {
        Self { _parser: PhantomData }
    }
}

impl<P> ClassHierarchyRules<P> {
    /// Builds the bridging rules for this layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn linearize(
    globals: &ModuleTable<crate::facts::GlobalDefinition>,
    name: &QualifiedName,
    seen: &mut Vec<QualifiedName>,
) {
    if seen.contains(name) {
        return;
    }
    seen.push(name.clone());
    if let Some(def) = globals.get(name) {
        for base in &def.base_classes {
            linearize(globals, base, seen);
        }
    }
}

impl<P> LayerRules<Descriptor> for ClassHierarchyRules<P>
where
    P: ParserLayer,
    P::Value: ParsedModule,
{
    type Key = ModuleName;
    type Value = ModuleTable<ClassifiedGlobal>;
    type Trigger = ModuleName;
    type Previous = EnvironmentLayer<UnannotatedGlobalsRules<P>, Descriptor>;

    fn key_to_trigger(&self, key: &Self::Key) -> Self::Trigger {
        key.clone()
    }

    fn convert_trigger(&self, trigger: &Self::Trigger) -> Self::Key {
        trigger.clone()
    }

    fn trigger_to_dependency(&self, trigger: &Self::Trigger) -> Descriptor {
        Descriptor::ClassMro(trigger.clone())
    }

    fn filter_upstream_dependency(&self, descriptor: &Descriptor) -> Option<Self::Trigger> {
        match descriptor {
            Descriptor::UnannotatedGlobal(module) => Some(module.clone()),
            _ => None,
        }
    }

    fn produce_value(
        &self,
        upstream: &Self::Previous,
        trigger: &Self::Trigger,
        dependency: Option<Handle<Descriptor>>,
    ) -> Self::Value {
        let globals = upstream.get(dependency, trigger);
        globals
            .iter()
            .map(|(name, definition)| {
                let mut chain = Vec::new();
                linearize(&globals, name, &mut chain);
                let classified = ClassifiedGlobal { definition: definition.clone(), mro: ClassMro(chain) };
                (name.clone(), classified)
            })
            .collect()
    }

    fn cache_mode(&self) -> CacheMode {
        CacheMode::WithCache
    }

    /// Linearization is comparatively expensive (it walks the whole base-class chain per
    /// class) and most edits touch only one or two modules' worth of classes, so an
    /// invalidated MRO is discarded rather than recomputed eagerly; a later `get` recomputes
    /// it lazily, and the recheck driver forces that recomputation ahead of re-inference for
    /// whatever it is about to read through (`envtrack_checker::recheck`).
    fn lazy_incremental(&self) -> bool {
        true
    }
}
