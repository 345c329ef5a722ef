// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The chained "what changed" result threaded bottom-up through a layer stack.
//!
//! Each [`EnvironmentLayer::update`](crate::layer::EnvironmentLayer::update) call hands back its
//! own triggered set *plus* everything triggered beneath it, so the next layer up can see past
//! its immediate neighbor.

use std::collections::HashSet;

use crate::registry::{Descriptor, Handle};

/// The set of registered dependencies that changed at each layer of a stack, from the floor up
/// to (but not including) the layer that produced this result.
///
/// A fresh stack's floor starts an empty chain; each [`EnvironmentLayer::update`](crate::layer::EnvironmentLayer::update)
/// call prepends its own "locally triggered dependencies" set, in the Design Notes' words, onto
/// the chain it was handed, so `all_triggered_dependencies` never loses the layers further down.
#[derive(Debug, Default, Clone)]
pub struct UpdateResult<D: Descriptor> {
    layers: Vec<HashSet<Handle<D>>>,
}

impl<D: Descriptor> UpdateResult<D> {
    /// The result for a stack that has not run any update yet (an empty chain).
    #[must_use]
    pub fn empty() -> Self {
        Self { layers: Vec::new() }
    }

    /// A single-layer result, for the floor of a stack (e.g. a translated `ParserUpdateResult`).
    #[must_use]
    pub fn from_single(triggered: HashSet<Handle<D>>) -> Self {
        Self { layers: vec![triggered] }
    }

    /// Prepends this layer's own triggered set onto the chain it was handed, returning the
    /// chain for the next layer up.
    #[must_use]
    pub fn chain(locally_triggered: HashSet<Handle<D>>, upstream: Self) -> Self {
        let mut layers = upstream.layers;
        layers.push(locally_triggered);
        Self { layers }
    }

    /// Every triggered-dependency set recorded so far, floor first.
    pub fn all_triggered_dependencies(&self) -> impl Iterator<Item = &HashSet<Handle<D>>> {
        self.layers.iter()
    }

    /// The set this stack's topmost layer produced, if any update has run.
    #[must_use]
    pub fn top(&self) -> Option<&HashSet<Handle<D>>> {
        self.layers.last()
    }

    /// Whether every layer's triggered set is empty — nothing changed anywhere in the stack.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.layers.iter().all(HashSet::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
    struct D(u32);

    #[test]
    fn chain_preserves_layer_order() {
        let registry: Registry<D> = Registry::new();
        let h1 = registry.register(D(1));
        let h2 = registry.register(D(2));

        let floor = UpdateResult::from_single(HashSet::from([h1]));
        let next = UpdateResult::chain(HashSet::from([h2]), floor);

        let sets: Vec<_> = next.all_triggered_dependencies().collect();
        assert_eq!(sets.len(), 2);
        assert!(sets[0].contains(&h1));
        assert!(sets[1].contains(&h2));
    }

    #[test]
    fn empty_chain_is_quiescent() {
        assert!(UpdateResult::<D>::empty().is_quiescent());
    }
}
