// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! External collaborators this crate depends on but does not implement.
//!
//! A parser, a type inference algorithm, a worker-pool implementation, an error
//! post-processing pass, and configuration loading are all out of scope for this crate; this
//! module names the narrow trait each one is expected to satisfy.
//! `envtrack_checker::testing` provides deterministic fakes for all of them.

use crate::descriptor::Descriptor;
use crate::error_table::ErrorTable;
use crate::names::{ModuleName, QualifiedName};
use envtrack_core::{Handle, ReadableLayer};

pub use envtrack_core::Scheduler;

// `Scheduler::collected_map_reduce` is generic, so `Scheduler` itself is not object-safe;
// collaborators below that need parallelism take a concrete `S: Scheduler` instead of `&dyn
// Scheduler`, or manage their own parallelism entirely (the common case for an external pass
// this crate never constructs).

/// What one parse of a module produced, as far as the stack's upper layers can see.
pub trait ParsedModule: Clone + PartialEq + Send + Sync + 'static {
    /// The qualified names of every top-level definition this module's parse tree contains.
    fn defined_symbols(&self) -> Vec<QualifiedName>;
    /// The direct base classes `symbol` declares, in source order. Empty for non-class symbols.
    fn base_classes(&self, symbol: &QualifiedName) -> Vec<QualifiedName>;
    /// The declared type annotation text for `symbol`, if the source wrote one.
    fn annotation(&self, symbol: &QualifiedName) -> Option<String>;
}

/// The result of one parser run: which modules were invalidated, which were (re)parsed, and
/// which definitions are newly present that were not present before.
pub trait ParserUpdateResult {
    /// Modules whose parse tree may have changed (a superset is fine; it only costs work).
    fn invalidated_modules(&self) -> &[ModuleName];
    /// Modules that were actually (re)parsed during this run.
    fn module_updates(&self) -> &[ModuleName];
    /// Definitions present in the new parse that were not present in the old one.
    fn define_additions(&self) -> &[QualifiedName];
}

/// The floor of the stack: a parser that turns source on disk into per-module parse trees and
/// reports what changed on each run.
///
/// `Clone` is required so that the one layer that needs parse-tree access directly
/// (`AnnotatedGlobalsRules`, for declared annotation text) and the layer stack's own nested
/// `EnvironmentLayer<UnannotatedGlobalsRules<P>, _>` can each hold an independent handle to the
/// same underlying parser without this crate needing its own `Arc` wrapper convention — a real
/// implementation's `ParserLayer` is expected to be a cheap, shared-state handle, not an owner
/// of the parse trees it reports.
pub trait ParserLayer: ReadableLayer<Descriptor, Key = ModuleName> + Clone {
    /// The concrete [`ParserUpdateResult`] this parser reports after a run.
    type UpdateResult: ParserUpdateResult;

    /// Re-parses whatever `changed_paths` names (and anything transitively invalidated by it),
    /// updating every clone of this handle's shared state, and reports what changed.
    fn parse_changed(&self, changed_paths: &[std::path::PathBuf]) -> Self::UpdateResult;
}

/// Runs type inference for a batch of function/method definitions.
pub trait TypeInferencePass: Send + Sync {
    /// Infers (or re-infers) every definition in `defines`, each tagged with the registered
    /// handle reads during its inference should be attributed to.
    fn populate_for_definitions(&self, defines: &[(QualifiedName, Handle<Descriptor>)]);
}

/// Runs after type inference to turn internal state into user-facing diagnostics.
pub trait PostprocessingPass: Send + Sync {
    /// Produces diagnostics for `modules`, pushing each one into `errors` under its own module
    /// key. Does not clear any module's existing entries — the recheck driver does that first.
    fn run(&self, modules: &[ModuleName], errors: &mut ErrorTable);
}

/// The shared-memory heap the checker's data structures live in, as far as this crate's
/// cache-maintenance hooks need to know.
pub trait SharedMemoryRuntime: Send + Sync {
    /// Drops cached state that is no longer reachable after an invalidation.
    fn invalidate_caches(&self);
    /// Runs a collection pass over the heap.
    fn collect(&self);
    /// Approximate heap size in bytes, for diagnostics.
    fn heap_size(&self) -> usize;
}

/// An opaque marker for a loaded configuration.
///
/// Configuration *loading* is external; this crate never parses one, it only accepts an
/// already-loaded value through this seam where a caller needs to thread one through.
pub trait Configuration: Send + Sync + 'static {}
