// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Attaches each symbol's declared type annotation to its resolved global entry.

use std::marker::PhantomData;

use envtrack_core::{CacheMode, EnvironmentLayer, Handle, LayerRules};

use crate::descriptor::Descriptor;
use crate::facts::{AnnotatedGlobal, ModuleTable};
use crate::names::ModuleName;
use crate::seams::{ParsedModule, ParserLayer};

use super::resolved_globals::ResolvedGlobalsRules;

/// Bridges a module's [`crate::facts::ResolvedGlobal`] table into a table of
/// [`AnnotatedGlobal`]s.
///
/// Annotation text rides along inside `GlobalDefinition` ever since `UnannotatedGlobalsRules`
/// started capturing it there, so this layer no longer needs its own direct read of the
/// parser: an annotation-only edit already flips the equality of every layer between the
/// parser and here, so it is never missed by an upstream cutoff the way a parser-only read
/// here would be.
pub struct AnnotatedGlobalsRules<P> {
    _parser: PhantomData<fn() -> P>,
}

impl<P> Default for AnnotatedGlobalsRules<P> {
    fn default() -> Self {
        Self { _parser: PhantomData }
    }
}

impl<P> AnnotatedGlobalsRules<P> {
    /// Builds the bridging rules for this layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P> LayerRules<Descriptor> for AnnotatedGlobalsRules<P>
where
    P: ParserLayer,
    P::Value: ParsedModule,
{
    type Key = ModuleName;
    type Value = ModuleTable<AnnotatedGlobal>;
    type Trigger = ModuleName;
    type Previous = EnvironmentLayer<ResolvedGlobalsRules<P>, Descriptor>;

    fn key_to_trigger(&self, key: &Self::Key) -> Self::Trigger {
        key.clone()
    }

    fn convert_trigger(&self, trigger: &Self::Trigger) -> Self::Key {
        trigger.clone()
    }

    fn trigger_to_dependency(&self, trigger: &Self::Trigger) -> Descriptor {
        Descriptor::AnnotatedGlobal(trigger.clone())
    }

    fn filter_upstream_dependency(&self, descriptor: &Descriptor) -> Option<Self::Trigger> {
        match descriptor {
            Descriptor::ResolvedGlobal(module) => Some(module.clone()),
            _ => None,
        }
    }

    fn produce_value(
        &self,
        upstream: &Self::Previous,
        trigger: &Self::Trigger,
        dependency: Option<Handle<Descriptor>>,
    ) -> Self::Value {
        let resolved = upstream.get(dependency, trigger);
        resolved
            .into_iter()
            .map(|(name, entry)| {
                let type_annotation = entry.classified.definition.type_annotation.clone();
                (name, AnnotatedGlobal { resolved: entry, type_annotation })
            })
            .collect()
    }

    fn cache_mode(&self) -> CacheMode {
        CacheMode::WithCache
    }
}
