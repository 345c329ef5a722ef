// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The dependency descriptor shared across the whole layer stack.
//!
//! One `Descriptor` type spans every layer (see `envtrack_core::registry::Registry`'s doc
//! comment for why): each layer contributes the variants for the facts it produces, plus the
//! layer-private kinds a stack needs internally (`ClassMro`).

use crate::names::{ModuleName, QualifiedName};

/// A tagged, totally-ordered, hashable dependency descriptor.
///
/// Registered through the stack's single `Registry<Descriptor>`, interned into a small
/// `Handle<Descriptor>` everywhere a table needs to record who reads what.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Descriptor {
    /// A module's parse tree, produced by the external parser seam.
    ModuleParse(ModuleName),
    /// A module's table of unannotated global definitions.
    UnannotatedGlobal(ModuleName),
    /// A module's class hierarchy (MRO per class defined in it).
    ClassMro(ModuleName),
    /// A module's table of globals with imports/forward references resolved.
    ResolvedGlobal(ModuleName),
    /// A module's table of globals with type annotations attached.
    AnnotatedGlobal(ModuleName),
    /// One function or method definition's inferred type-checking result.
    TypeCheckDefine(QualifiedName),
}
