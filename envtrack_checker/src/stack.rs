// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The six-layer environment stack, nested bottom-up per `envtrack_core`'s contract.

use std::collections::HashSet;
use std::sync::Arc;

use envtrack_core::{EnvironmentLayer, Handle, Registry, Scheduler, UpdateResult};
use thiserror::Error;

use crate::descriptor::Descriptor;
use crate::facts::{AnnotatedGlobal, GlobalDefinition, ModuleTable};
use crate::layers::{
    AnnotatedGlobalsRules, ClassHierarchyRules, ResolvedGlobalsRules, TypeEnvironmentLayer, UnannotatedGlobalsRules,
};
use crate::names::ModuleName;
use crate::seams::{ParsedModule, ParserLayer};

type UnannotatedLayer<P> = EnvironmentLayer<UnannotatedGlobalsRules<P>, Descriptor>;
type ClassHierarchyLayer<P> = EnvironmentLayer<ClassHierarchyRules<P>, Descriptor>;
type ResolvedLayer<P> = EnvironmentLayer<ResolvedGlobalsRules<P>, Descriptor>;
type AnnotatedLayer<P> = EnvironmentLayer<AnnotatedGlobalsRules<P>, Descriptor>;

/// The whole derived environment: parser at the floor, four module-grain fact layers nested one
/// chain deep, and a define-grain type environment on top that reads the chain by reference.
///
/// There is exactly one copy of each layer's table: `annotated` owns the full nested chain down
/// to the parser, and `type_environment` borrows `annotated` on every call rather than owning a
/// second copy of it (see `envtrack_core::EnvironmentLayer::previous`).
pub struct EnvironmentStack<P: ParserLayer> {
    registry: Arc<Registry<Descriptor>>,
    annotated: AnnotatedLayer<P>,
    type_environment: TypeEnvironmentLayer,
}

impl<P> EnvironmentStack<P>
where
    P: ParserLayer,
    P::Value: ParsedModule,
{
    /// Builds a fresh, empty stack over `parser`, sharing one registry across every layer.
    pub fn new(parser: P, registry: Arc<Registry<Descriptor>>) -> Self {
        let unannotated = EnvironmentLayer::new(UnannotatedGlobalsRules::new(), parser.clone(), registry.clone());
        let class_hierarchy = EnvironmentLayer::new(ClassHierarchyRules::new(), unannotated, registry.clone());
        let resolved = EnvironmentLayer::new(ResolvedGlobalsRules::new(), class_hierarchy, registry.clone());
        let annotated = EnvironmentLayer::new(AnnotatedGlobalsRules::new(), resolved, registry.clone());
        let type_environment = TypeEnvironmentLayer::new(registry.clone());

        Self { registry, annotated, type_environment }
    }

    /// The shared registry this stack interns every descriptor through.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry<Descriptor>> {
        &self.registry
    }

    /// The annotated-globals layer, for reading a module's current symbol table.
    #[must_use]
    pub fn annotated(&self) -> &AnnotatedLayer<P> {
        &self.annotated
    }

    /// The type environment, for reading or driving individual definitions' check results.
    #[must_use]
    pub fn type_environment(&self) -> &TypeEnvironmentLayer {
        &self.type_environment
    }

    /// Reads a module's current annotated global table, computing it lazily if needed.
    #[must_use]
    pub fn annotated_globals(&self, module: &ModuleName) -> ModuleTable<AnnotatedGlobal> {
        self.annotated.get(None, module)
    }

    /// Reads a module's current unannotated global table — the "unannotated-global read view"
    /// the recheck driver consults to find a function's containing module.
    #[must_use]
    pub fn unannotated_globals(&self, module: &ModuleName) -> ModuleTable<GlobalDefinition> {
        self.annotated.previous().previous().previous().get(None, module)
    }

    /// The parser at the floor of the stack, for the recheck driver to reparse through.
    #[must_use]
    pub fn parser(&self) -> &P {
        self.annotated.previous().previous().previous().previous()
    }

    /// Propagates `invalidated_modules` through the four module-grain layers, in stack order.
    ///
    /// Returns the chained [`UpdateResult`] the recheck driver inspects to find which modules'
    /// annotated globals changed (used to decide which definitions need re-inference). Each
    /// layer is driven bottom-up through chained [`EnvironmentLayer::previous_mut`] calls into
    /// the single nested chain `annotated` owns, so there is never more than one table per
    /// layer in memory.
    pub fn update_fact_layers<S: Scheduler>(&mut self, invalidated_modules: &[ModuleName], scheduler: &S) -> UpdateResult<Descriptor> {
        let seed: HashSet<Handle<Descriptor>> = invalidated_modules
            .iter()
            .map(|module| self.registry.register(Descriptor::ModuleParse(module.clone())))
            .collect();
        let result = UpdateResult::from_single(seed);

        let result = self.annotated.previous_mut().previous_mut().previous_mut().update(scheduler, result);
        let result = self.annotated.previous_mut().previous_mut().update(scheduler, result);
        let result = self.annotated.previous_mut().update(scheduler, result);
        self.annotated.update(scheduler, result)
    }

    /// Re-checks exactly `defines`, returning the handles whose result changed.
    ///
    /// Delegates to [`TypeEnvironmentLayer::recompute_defines`], passing `annotated` by
    /// reference so the type environment never needs its own copy of the fact-layer chain.
    pub fn recompute_defines(
        &self,
        defines: &[crate::names::QualifiedName],
        pass: &dyn crate::seams::TypeInferencePass,
    ) -> HashSet<Handle<Descriptor>> {
        self.type_environment.recompute_defines(defines, pass, &self.annotated)
    }
}

/// Failure while persisting or restoring an [`EnvironmentStack`]'s non-tabular state.
///
/// `thiserror`-based, matching the driver-level error altitude the rest of this crate uses.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The underlying storage could not be read from or written to.
    #[error("environment stack persistence failed: {0}")]
    Io(#[from] std::io::Error),
}
