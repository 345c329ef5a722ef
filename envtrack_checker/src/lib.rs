// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A concrete layer stack and recheck driver built on `envtrack_core`.
//!
//! The stack has six layers, floor to ceiling: an external parser, unannotated globals, class
//! hierarchy, resolved globals, annotated globals, and a define-grain type environment.
//! [`recheck::recheck`] is the driver entry point a host application calls after an edit.

pub mod descriptor;
pub mod error_table;
pub mod facts;
pub mod layers;
pub mod names;
pub mod recheck;
pub mod seams;
pub mod stack;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use descriptor::Descriptor;
pub use error_table::{Diagnostic, ErrorTable};
pub use recheck::{recheck, RecheckError, RecheckOutcome};
pub use stack::{EnvironmentStack, PersistError};
