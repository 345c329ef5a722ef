// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The value types the layer stack's tables hold.
//!
//! Each later stage wraps the stage beneath it rather than recomputing it from scratch, so
//! equality-diffing a whole record (the cutoff `envtrack_core::table::Table` performs) also
//! catches changes that originated further down the stack (e.g. a base class's `ClassMro`
//! changing flips the equality of every subclass's `ClassifiedGlobal`, without this crate
//! needing its own cross-layer dependency bookkeeping on top of what `envtrack_core` already
//! tracks through `produce_value`'s `upstream.get` calls).

use std::collections::BTreeMap;

use crate::names::QualifiedName;

/// One module's worth of per-symbol facts, keyed by qualified name.
pub type ModuleTable<T> = BTreeMap<QualifiedName, T>;

/// An unannotated global or class definition, as seen straight out of the parse tree.
///
/// Carries the declared type-annotation text even though nothing before `AnnotatedGlobal`
/// interprets it: the cutoff every layer above this one diffs against is whole-value equality,
/// so an edit that only changes a symbol's annotation (name and base classes untouched) still
/// has to flip this value, or it is invisible to every layer's `execute_optimistic` cutoff and
/// never reaches the layer that actually reads it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GlobalDefinition {
    /// The symbol this definition is for.
    pub name: QualifiedName,
    /// Direct base classes, in source order. Empty for non-class symbols.
    pub base_classes: Vec<QualifiedName>,
    /// The symbol's declared type, as captured by the parser. `None` for an unannotated
    /// definition.
    pub type_annotation: Option<String>,
}

/// A class's linearized method resolution order (most-derived first), or an empty list for
/// non-class symbols.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassMro(pub Vec<QualifiedName>);

/// A global definition enriched with its class hierarchy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassifiedGlobal {
    /// The underlying definition.
    pub definition: GlobalDefinition,
    /// This symbol's linearized base classes (`[self, ...bases]`).
    pub mro: ClassMro,
}

/// A classified global with its base-class references resolved against what is actually
/// defined in the same module (forward references and same-module imports).
///
/// Bases that are not found locally are kept as-is: cross-module import resolution is left to
/// a real front end; this layer only guarantees same-module names resolve regardless of
/// declaration order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedGlobal {
    /// The underlying classified global.
    pub classified: ClassifiedGlobal,
    /// The subset of `mro` (after `self`) that resolved to a definition in this module.
    pub resolved_bases: Vec<QualifiedName>,
}

/// A resolved global with its declared type annotation attached, if any.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnnotatedGlobal {
    /// The underlying resolved global.
    pub resolved: ResolvedGlobal,
    /// The symbol's declared type, as captured by the parser. `None` for an unannotated
    /// definition (the common case for inferred locals/returns).
    pub type_annotation: Option<String>,
}

/// The outcome of type-checking one function or method definition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TypeCheckResult {
    /// The type this definition checked against, as a display string.
    ///
    /// A real type inference algorithm is out of scope for this crate: this crate's own
    /// fallback simply echoes the declared annotation, standing in for whatever
    /// `TypeInferencePass::populate_for_definitions` actually computes.
    pub resolved_type: String,
}
