// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resolves same-module forward references in each symbol's base-class chain.

use std::marker::PhantomData;

use envtrack_core::{CacheMode, EnvironmentLayer, Handle, LayerRules};

use crate::descriptor::Descriptor;
use crate::facts::{ModuleTable, ResolvedGlobal};
use crate::names::ModuleName;
use crate::seams::{ParsedModule, ParserLayer};

use super::class_hierarchy::ClassHierarchyRules;
use super::unannotated_globals::UnannotatedGlobalsRules;

/// Bridges a module's [`crate::facts::ClassifiedGlobal`] table into a table of
/// [`ResolvedGlobal`]s, with same-module base-class references confirmed to resolve.
pub struct ResolvedGlobalsRules<P> {
    _parser: PhantomData<fn() -> P>,
}

impl<P> Default for ResolvedGlobalsRules<P> {
    fn default() -> Self {
        Self { _parser: PhantomData }
    }
}

impl<P> ResolvedGlobalsRules<P> {
    /// Builds the bridging rules for this layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P> LayerRules<Descriptor> for ResolvedGlobalsRules<P>
where
    P: ParserLayer,
    P::Value: ParsedModule,
{
    type Key = ModuleName;
    type Value = ModuleTable<ResolvedGlobal>;
    type Trigger = ModuleName;
    type Previous = EnvironmentLayer<ClassHierarchyRules<P>, Descriptor>;

    fn key_to_trigger(&self, key: &Self::Key) -> Self::Trigger {
        key.clone()
    }

    fn convert_trigger(&self, trigger: &Self::Trigger) -> Self::Key {
        trigger.clone()
    }

    fn trigger_to_dependency(&self, trigger: &Self::Trigger) -> Descriptor {
        Descriptor::ResolvedGlobal(trigger.clone())
    }

    fn filter_upstream_dependency(&self, descriptor: &Descriptor) -> Option<Self::Trigger> {
        match descriptor {
            Descriptor::ClassMro(module) => Some(module.clone()),
            _ => None,
        }
    }

    fn produce_value(
        &self,
        upstream: &Self::Previous,
        trigger: &Self::Trigger,
        dependency: Option<Handle<Descriptor>>,
    ) -> Self::Value {
        let classified = upstream.get(dependency, trigger);
        classified
            .iter()
            .map(|(name, entry)| {
                let resolved_bases = entry
                    .mro
                    .0
                    .iter()
                    .skip(1)
                    .filter(|base| classified.contains_key(*base))
                    .cloned()
                    .collect();
                (name.clone(), ResolvedGlobal { classified: entry.clone(), resolved_bases })
            })
            .collect()
    }

    fn cache_mode(&self) -> CacheMode {
        CacheMode::WithCache
    }
}
