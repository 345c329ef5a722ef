// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The concrete `LayerRules` implementations that make up the environment stack.

mod annotated_globals;
mod class_hierarchy;
mod resolved_globals;
mod type_environment;
mod unannotated_globals;

pub use annotated_globals::AnnotatedGlobalsRules;
pub use class_hierarchy::ClassHierarchyRules;
pub use resolved_globals::ResolvedGlobalsRules;
pub use type_environment::TypeEnvironmentLayer;
pub use unannotated_globals::UnannotatedGlobalsRules;
