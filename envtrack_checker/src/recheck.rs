// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The recheck driver: the orchestrator entry point that turns a batch of changed source paths
//! into an updated type environment and diagnostic list.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use envtrack_core::{Handle, Scheduler};
use thiserror::Error;

use crate::descriptor::Descriptor;
use crate::error_table::ErrorTable;
use crate::facts::{AnnotatedGlobal, ModuleTable};
use crate::names::{ModuleName, QualifiedName};
use crate::seams::{ParsedModule, ParserLayer, ParserUpdateResult, PostprocessingPass, SharedMemoryRuntime, TypeInferencePass};
use crate::stack::EnvironmentStack;

/// A recheck could not be completed.
#[derive(Debug, Error)]
pub enum RecheckError {
    /// An upstream layer's read view disagreed with what the parser reported, which should
    /// never happen with a correctly-implemented [`ParserLayer`].
    #[error("upstream state inconsistent during recheck: {0}")]
    Inconsistent(String),
    /// A layer's transaction failed while propagating invalidation through the stack.
    #[error("recheck aborted by a layer transaction failure: {0}")]
    Producer(#[from] envtrack_core::TransactionError),
}

/// The outcome of one successful [`recheck`] call.
pub struct RecheckOutcome {
    /// Every module that was post-processed during this recheck.
    pub modules: Vec<ModuleName>,
}

/// Re-establishes consistency across the whole environment stack after `changed_paths` have
/// been edited, returning the modules that were post-processed.
///
/// Implements the nine-step algorithm a whole-program incremental type checker's driver runs on
/// every edit: invalidate auxiliary caches, reparse, propagate through the fact layers, extract
/// which functions need re-inference, re-infer them, figure out which modules need fresh
/// diagnostics, run post-processing, and reconcile `errors` against the new diagnostics.
pub fn recheck<P, S>(
    runtime: &dyn SharedMemoryRuntime,
    scheduler: &S,
    stack: &mut EnvironmentStack<P>,
    errors: &mut ErrorTable,
    inference: &dyn TypeInferencePass,
    postprocessing: &dyn PostprocessingPass,
    changed_paths: &[PathBuf],
) -> Result<RecheckOutcome, RecheckError>
where
    P: ParserLayer,
    P::Value: ParsedModule,
    S: Scheduler,
{
    let span = tracing::debug_span!("envtrack_checker::recheck");
    let _enter = span.enter();

    // Step 1: invalidate process-wide auxiliary caches, opaque to this framework.
    runtime.invalidate_caches();

    // Step 2: reparse, then propagate the change through the four fact layers.
    let parse_result = stack.parser().parse_changed(changed_paths);
    let update = stack.update_fact_layers(parse_result.invalidated_modules(), scheduler);
    tracing::trace!(modules = parse_result.invalidated_modules().len(), "fact layers updated");

    // Step 3: extract function triggers, first-wins on duplicates. A module-grain fact change
    // propagates to every definition that has ever read through it, so this set is only a
    // superset of candidates at this point — narrowed to function grain below, once fresh facts
    // are in hand.
    let mut function_triggers: HashMap<QualifiedName, Handle<Descriptor>> = HashMap::new();
    for set in update.all_triggered_dependencies() {
        for &handle in set {
            if let Descriptor::TypeCheckDefine(name) = stack.registry().get_descriptor(handle) {
                function_triggers.entry(name).or_insert(handle);
            }
        }
    }

    // Step 4: extract function additions from the parser's own report.
    for name in parse_result.define_additions() {
        function_triggers
            .entry(name.clone())
            .or_insert_with(|| stack.registry().register(Descriptor::TypeCheckDefine(name.clone())));
    }

    let candidates: Vec<QualifiedName> = function_triggers.keys().cloned().collect();

    // Step 5: force a fresh read of every module a candidate lives in before handing anything
    // to the external inference pass, so a lazily-discarded upstream fact (the class-hierarchy
    // layer's pessimistic invalidation) is never observed stale by a read made *through* a
    // registered dependency during inference (the Open Question resolution). The fresh tables
    // gathered here also let us narrow `candidates` down to function grain immediately below.
    let changed_modules: HashSet<ModuleName> = parse_result.invalidated_modules().iter().cloned().collect();
    let mut affected_modules: HashSet<ModuleName> = changed_modules.clone();
    for name in &candidates {
        affected_modules.insert(name.module().clone());
    }
    let mut current_facts: HashMap<ModuleName, ModuleTable<AnnotatedGlobal>> = HashMap::new();
    for module in &affected_modules {
        current_facts.insert(module.clone(), stack.annotated_globals(module));
    }

    // Narrow the module-grain propagation above down to the definitions whose own fact
    // actually changed, so editing one function never re-infers an untouched sibling; a
    // candidate triggered through some other module's table (a cross-module caller) passes
    // through unfiltered.
    let defines = stack.type_environment().filter_changed_definitions(&candidates, &changed_modules, &current_facts);
    tracing::debug!(functions = defines.len(), "functions selected for re-inference");

    stack.recompute_defines(&defines, inference);

    // Step 6: compute the modules to post-process, starting from the parser's invalidated-
    // modules list (not `module_updates`, which only reports modules actually reparsed, and so
    // misses a module that was invalidated by deletion without being reparsed).
    let mut candidate_modules: HashSet<ModuleName> = changed_modules;
    for name in &defines {
        let containing = stack.unannotated_globals(name.module());
        if containing.contains_key(name) {
            candidate_modules.insert(name.module().clone());
        }
    }

    // A module the parser no longer has any definitions for has been deleted outright: its
    // stale diagnostics must be dropped, but there is nothing left to post-process for it.
    let (modules, deleted_modules): (Vec<ModuleName>, Vec<ModuleName>) =
        candidate_modules.into_iter().partition(|module| !stack.parser().get(None, module).defined_symbols().is_empty());

    for module in &deleted_modules {
        errors.clear_module(module);
    }

    // Step 8 (cleared ahead of step 7 so `postprocessing.run` only ever appends onto an empty
    // slate for each module it is about to populate): drop every existing entry for the
    // modules about to be re-post-processed.
    for module in &modules {
        errors.clear_module(module);
    }

    // Step 7: run post-processing over the affected modules, appending its diagnostics.
    postprocessing.run(&modules, errors);

    tracing::debug!(modules = modules.len(), deleted = deleted_modules.len(), "recheck complete");
    Ok(RecheckOutcome { modules })
}
