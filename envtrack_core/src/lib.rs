// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency-tracked, memoized environment table framework.
//!
//! This crate implements the reusable, domain-agnostic half of an incremental analysis
//! engine: a process-wide handle [`registry`], a per-layer memoized key-value [`table`],
//! and a generic [`layer`] that wraps a previous layer's read view, a table, and a
//! `produce_value` rule into a lazily-computed, incrementally-updatable derived view.
//!
//! It knows nothing about modules, classes, or type annotations — see the `envtrack_checker`
//! crate for a concrete layer stack built on top of this one.

pub mod layer;
pub mod registry;
pub mod scheduler;
pub mod table;
pub mod update_result;

pub use layer::{EnvironmentLayer, LayerRules, ReadableLayer};
pub use registry::{Descriptor, Handle, Registry};
pub use scheduler::{DependencyCollector, Policy, Scheduler};
pub use table::{CacheMode, Table, Transaction, TransactionError};
pub use update_result::UpdateResult;
