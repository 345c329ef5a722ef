// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The diagnostic table a recheck reconciles against, keyed by module.
//!
//! A diagnostic's actual shape is produced entirely by the external
//! [`crate::seams::PostprocessingPass`]; this crate only needs to group and replace them per
//! module, so `Diagnostic` stays opaque.

use std::collections::HashMap;
use std::fmt;

use crate::names::ModuleName;

/// One diagnostic emitted by a [`crate::seams::PostprocessingPass`] run, opaque to this crate
/// beyond its `Debug` rendering.
pub struct Diagnostic {
    payload: Box<dyn fmt::Debug + Send + Sync>,
}

impl Diagnostic {
    /// Wraps an externally-produced diagnostic payload.
    pub fn new(payload: impl fmt::Debug + Send + Sync + 'static) -> Self {
        Self { payload: Box::new(payload) }
    }
}

impl fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.payload, f)
    }
}

/// The diagnostics currently reported for the whole program, grouped by the module that
/// produced them.
#[derive(Default)]
pub struct ErrorTable {
    by_module: HashMap<ModuleName, Vec<Diagnostic>>,
}

impl ErrorTable {
    /// Builds an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every diagnostic previously recorded for `module`.
    pub fn clear_module(&mut self, module: &ModuleName) {
        self.by_module.remove(module);
    }

    /// Appends `diagnostic` under `module`, leaving any other module's entries untouched.
    pub fn push(&mut self, module: ModuleName, diagnostic: Diagnostic) {
        self.by_module.entry(module).or_default().push(diagnostic);
    }

    /// The diagnostics currently recorded for `module`, if any.
    #[must_use]
    pub fn for_module(&self, module: &ModuleName) -> &[Diagnostic] {
        self.by_module.get(module).map_or(&[], Vec::as_slice)
    }

    /// Total diagnostics across every module.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_module.values().map(Vec::len).sum()
    }

    /// Whether no module currently has a diagnostic.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_module.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_clear_removes_only_that_module() {
        let mut table = ErrorTable::new();
        let a = ModuleName::new("a");
        let b = ModuleName::new("b");
        table.push(a.clone(), Diagnostic::new("a: bad thing"));
        table.push(b.clone(), Diagnostic::new("b: bad thing"));
        assert_eq!(table.len(), 2);

        table.clear_module(&a);
        assert!(table.for_module(&a).is_empty());
        assert_eq!(table.for_module(&b).len(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn empty_table_reports_empty_for_unknown_module() {
        let table = ErrorTable::new();
        assert!(table.for_module(&ModuleName::new("nowhere")).is_empty());
        assert!(table.is_empty());
    }
}
