// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The first derived layer: a module's global/class definitions straight out of its parse tree.

use std::marker::PhantomData;

use envtrack_core::{CacheMode, Handle, LayerRules};

use crate::descriptor::Descriptor;
use crate::facts::{GlobalDefinition, ModuleTable};
use crate::names::ModuleName;
use crate::seams::{ParserLayer, ParsedModule};

/// Bridges a [`ParserLayer`]'s parse trees into per-module [`GlobalDefinition`] tables.
pub struct UnannotatedGlobalsRules<P> {
    _parser: PhantomData<fn() -> P>,
}

impl<P> Default for UnannotatedGlobalsRules<P> {
    fn default() -> Self {
        Self { _parser: PhantomData }
    }
}

impl<P> UnannotatedGlobalsRules<P> {
    /// Builds the bridging rules for this layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P> LayerRules<Descriptor> for UnannotatedGlobalsRules<P>
where
    P: ParserLayer,
    P::Value: ParsedModule,
{
    type Key = ModuleName;
    type Value = ModuleTable<GlobalDefinition>;
    type Trigger = ModuleName;
    type Previous = P;

    fn key_to_trigger(&self, key: &Self::Key) -> Self::Trigger {
        key.clone()
    }

    fn convert_trigger(&self, trigger: &Self::Trigger) -> Self::Key {
        trigger.clone()
    }

    fn trigger_to_dependency(&self, trigger: &Self::Trigger) -> Descriptor {
        Descriptor::UnannotatedGlobal(trigger.clone())
    }

    fn filter_upstream_dependency(&self, descriptor: &Descriptor) -> Option<Self::Trigger> {
        match descriptor {
            Descriptor::ModuleParse(module) => Some(module.clone()),
            _ => None,
        }
    }

    fn produce_value(
        &self,
        upstream: &Self::Previous,
        trigger: &Self::Trigger,
        dependency: Option<Handle<Descriptor>>,
    ) -> Self::Value {
        let parsed = upstream.get(dependency, trigger);
        parsed
            .defined_symbols()
            .into_iter()
            .map(|name| {
                let base_classes = parsed.base_classes(&name);
                let type_annotation = parsed.annotation(&name);
                let definition = GlobalDefinition { name: name.clone(), base_classes, type_annotation };
                (name, definition)
            })
            .collect()
    }

    fn cache_mode(&self) -> CacheMode {
        CacheMode::WithCache
    }
}
