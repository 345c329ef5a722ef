// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic in-memory fakes for every trait in [`crate::seams`].
//!
//! Used by this crate's own unit tests, by `envtrack_checker_conformance`, and by the demo
//! binaries — none of them need a real parser or type inference algorithm to exercise the
//! engine end-to-end.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use parking_lot::Mutex;

use envtrack_core::{Handle, ReadableLayer};

use crate::descriptor::Descriptor;
use crate::error_table::ErrorTable;
use crate::names::{ModuleName, QualifiedName};
use crate::seams::{Configuration, ParsedModule, ParserLayer, ParserUpdateResult, PostprocessingPass, SharedMemoryRuntime, TypeInferencePass};

/// A fake module's parse-tree contents: its symbols, each with declared bases and an optional
/// annotation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FakeModule {
    symbols: Vec<FakeSymbol>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct FakeSymbol {
    name: QualifiedName,
    base_classes: Vec<QualifiedName>,
    annotation: Option<String>,
}

impl FakeModule {
    /// Builds an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a symbol with no base classes and no annotation.
    #[must_use]
    pub fn with_symbol(mut self, name: QualifiedName) -> Self {
        self.symbols.push(FakeSymbol { name, base_classes: Vec::new(), annotation: None });
        self
    }

    /// Adds a symbol declaring `base_classes`.
    #[must_use]
    pub fn with_class(mut self, name: QualifiedName, base_classes: Vec<QualifiedName>) -> Self {
        self.symbols.push(FakeSymbol { name, base_classes, annotation: None });
        self
    }

    /// Adds a symbol with a declared type annotation.
    #[must_use]
    pub fn with_annotated_symbol(mut self, name: QualifiedName, annotation: impl Into<String>) -> Self {
        self.symbols.push(FakeSymbol { name, base_classes: Vec::new(), annotation: Some(annotation.into()) });
        self
    }
}

impl ParsedModule for FakeModule {
    fn defined_symbols(&self) -> Vec<QualifiedName> {
        self.symbols.iter().map(|s| s.name.clone()).collect()
    }

    fn base_classes(&self, symbol: &QualifiedName) -> Vec<QualifiedName> {
        self.symbols.iter().find(|s| &s.name == symbol).map(|s| s.base_classes.clone()).unwrap_or_default()
    }

    fn annotation(&self, symbol: &QualifiedName) -> Option<String> {
        self.symbols.iter().find(|s| &s.name == symbol).and_then(|s| s.annotation.clone())
    }
}

/// A recorded [`ParserUpdateResult`] for [`FakeParser`].
#[derive(Clone, Debug, Default)]
pub struct FakeParserUpdateResult {
    invalidated: Vec<ModuleName>,
    updates: Vec<ModuleName>,
    additions: Vec<QualifiedName>,
}

impl ParserUpdateResult for FakeParserUpdateResult {
    fn invalidated_modules(&self) -> &[ModuleName] {
        &self.invalidated
    }

    fn module_updates(&self) -> &[ModuleName] {
        &self.updates
    }

    fn define_additions(&self) -> &[QualifiedName] {
        &self.additions
    }
}

struct FakeParserState {
    modules: HashMap<ModuleName, FakeModule>,
    pending: Vec<ModuleName>,
    pending_additions: Vec<QualifiedName>,
}

/// A shared-state, in-memory stand-in for a real parser/module-tracker layer.
///
/// Test code drives it by calling [`FakeParser::set_module`] directly (bypassing any actual
/// source text); [`FakeParser::parse_changed`] then reports whatever modules actually changed
/// since the last call — re-setting a module to an equal value is a no-op, giving tests a way
/// to exercise the equality short-circuit all the way from the floor of the stack — and
/// computes function additions by diffing each changed module's symbol set against its previous
/// snapshot.
#[derive(Clone)]
pub struct FakeParser {
    state: std::sync::Arc<Mutex<FakeParserState>>,
}

impl FakeParser {
    /// Builds a parser with no modules yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: std::sync::Arc::new(Mutex::new(FakeParserState {
                modules: HashMap::new(),
                pending: Vec::new(),
                pending_additions: Vec::new(),
            })),
        }
    }

    /// Replaces `name`'s parse tree with `module`. A no-op if `module` is equal to what `name`
    /// already maps to; otherwise queues `name` to be reported on the next
    /// [`FakeParser::parse_changed`] call, along with any symbol `module` defines that the
    /// previous snapshot did not.
    pub fn set_module(&self, name: ModuleName, module: FakeModule) {
        let mut state = self.state.lock();
        let previous = state.modules.get(&name).cloned();
        if previous.as_ref() == Some(&module) {
            return;
        }

        let old_symbols: HashSet<QualifiedName> =
            previous.map(|m| m.defined_symbols().into_iter().collect()).unwrap_or_default();
        for symbol in module.defined_symbols() {
            if !old_symbols.contains(&symbol) {
                state.pending_additions.push(symbol);
            }
        }

        state.modules.insert(name.clone(), module);
        if !state.pending.contains(&name) {
            state.pending.push(name);
        }
    }

    /// Removes `name`'s parse tree entirely, queuing it to be reported as invalidated. A no-op
    /// if `name` was not present.
    pub fn remove_module(&self, name: ModuleName) {
        let mut state = self.state.lock();
        if state.modules.remove(&name).is_none() {
            return;
        }
        if !state.pending.contains(&name) {
            state.pending.push(name);
        }
    }
}

impl Default for FakeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadableLayer<Descriptor> for FakeParser {
    type Key = ModuleName;
    type Value = FakeModule;

    fn get(&self, _dependency: Option<Handle<Descriptor>>, key: &Self::Key) -> Self::Value {
        self.state.lock().modules.get(key).cloned().unwrap_or_default()
    }
}

impl ParserLayer for FakeParser {
    type UpdateResult = FakeParserUpdateResult;

    fn parse_changed(&self, _changed_paths: &[PathBuf]) -> Self::UpdateResult {
        let mut state = self.state.lock();
        let pending: Vec<ModuleName> = state.pending.drain(..).collect();
        let additions: Vec<QualifiedName> = state.pending_additions.drain(..).collect();

        FakeParserUpdateResult { invalidated: pending.clone(), updates: pending, additions }
    }
}

/// A [`TypeInferencePass`] that just records which definitions it was asked to infer, in call
/// order, for assertions.
#[derive(Default)]
pub struct RecordingInferencePass {
    calls: Mutex<Vec<QualifiedName>>,
}

impl RecordingInferencePass {
    /// Builds a pass with no recorded calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every definition name passed to [`TypeInferencePass::populate_for_definitions`] so far,
    /// across every call, in the order each batch was received.
    #[must_use]
    pub fn recorded(&self) -> Vec<QualifiedName> {
        self.calls.lock().clone()
    }
}

impl TypeInferencePass for RecordingInferencePass {
    fn populate_for_definitions(&self, defines: &[(QualifiedName, Handle<Descriptor>)]) {
        let mut calls = self.calls.lock();
        calls.extend(defines.iter().map(|(name, _)| name.clone()));
    }
}

/// A [`PostprocessingPass`] that emits one [`crate::error_table::Diagnostic`] per module it is
/// asked to process, so tests can assert reconciliation behavior without a real diagnostic
/// format.
#[derive(Default)]
pub struct MarkerPostprocessingPass;

impl MarkerPostprocessingPass {
    /// Builds the pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PostprocessingPass for MarkerPostprocessingPass {
    fn run(&self, modules: &[ModuleName], errors: &mut ErrorTable) {
        for module in modules {
            errors.push(module.clone(), crate::error_table::Diagnostic::new(format!("checked {module}")));
        }
    }
}

/// A no-op [`SharedMemoryRuntime`] that only counts its own calls, for tests that just need to
/// satisfy the seam.
#[derive(Default)]
pub struct NoopRuntime {
    invalidations: Mutex<usize>,
}

impl NoopRuntime {
    /// Builds a runtime with no recorded calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times [`SharedMemoryRuntime::invalidate_caches`] has been called.
    #[must_use]
    pub fn invalidation_count(&self) -> usize {
        *self.invalidations.lock()
    }
}

impl SharedMemoryRuntime for NoopRuntime {
    fn invalidate_caches(&self) {
        *self.invalidations.lock() += 1;
    }

    fn collect(&self) {}

    fn heap_size(&self) -> usize {
        0
    }
}

/// An opaque configuration value with no fields, for seams that only need *a* [`Configuration`].
pub struct FakeConfiguration;

impl Configuration for FakeConfiguration {}
