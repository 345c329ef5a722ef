// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide interning of dependency descriptors into stable handles.
//!
//! Interns descriptors through `understory_dirty::intern::Interner` to get small, `Copy`,
//! totally-ordered ids that can be stored in maps without cloning the underlying descriptor.
//! [`Registry`] is shared by every layer in a stack so that equal descriptors compare equal
//! by handle regardless of which layer registered them first.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use understory_dirty::intern::Interner;
use understory_dirty::InternId;

/// The bound every dependency descriptor type must satisfy to be interned by a [`Registry`].
///
/// Blanket-implemented for every type that already satisfies it — this is a bound alias, not
/// a trait callers implement.
pub trait Descriptor: Clone + Eq + Hash + Ord + fmt::Debug + Send + Sync + 'static {}

impl<T> Descriptor for T where T: Clone + Eq + Hash + Ord + fmt::Debug + Send + Sync + 'static {}

/// A stable, `Copy` handle for a descriptor interned in a [`Registry<D>`].
///
/// Two [`Registry::register`] calls for equal descriptors, on the same registry, always
/// produce equal handles. Handles from different `Registry` instances must never be mixed.
pub struct Handle<D> {
    id: InternId,
    _descriptor: PhantomData<fn() -> D>,
}

impl<D> Handle<D> {
    #[inline]
    fn from_id(id: InternId) -> Self {
        Self { id, _descriptor: PhantomData }
    }
}

impl<D> fmt::Debug for Handle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.id).finish()
    }
}

impl<D> Clone for Handle<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for Handle<D> {}

impl<D> PartialEq for Handle<D> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<D> Eq for Handle<D> {}

impl<D> Hash for Handle<D> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<D> Ord for Handle<D> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<D> PartialOrd for Handle<D> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Interns dependency descriptors into small, `Copy` handles, shared across an entire layer
/// stack.
///
/// A stack has exactly one `Registry` (wrapped in an `Arc` and cloned into every layer): the
/// framework relies on descriptors registered by different layers comparing equal-by-handle
/// whenever they are structurally equal, which only holds if every layer interns through the
/// same instance.
pub struct Registry<D> {
    interner: Mutex<Interner<D>>,
}

impl<D: Descriptor> fmt::Debug for Registry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("len", &self.interner.lock().len()).finish()
    }
}

impl<D: Descriptor> Default for Registry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Descriptor> Registry<D> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { interner: Mutex::new(Interner::new()) }
    }

    /// Wraps a fresh registry in an `Arc` for sharing across a layer stack.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Interns `descriptor`, returning its stable handle.
    ///
    /// Idempotent: registering an equal descriptor twice returns the same handle. Safe to call
    /// concurrently from scheduler workers.
    pub fn register(&self, descriptor: D) -> Handle<D> {
        let mut interner = self.interner.lock();
        Handle::from_id(interner.intern(descriptor))
    }

    /// Reverse-looks-up the descriptor behind `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` was not produced by this registry.
    #[must_use]
    pub fn get_descriptor(&self, handle: Handle<D>) -> D {
        let interner = self.interner.lock();
        interner
            .get(handle.id)
            .cloned()
            .expect("handle was not produced by this registry")
    }

    /// Number of distinct descriptors interned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interner.lock().len()
    }

    /// Whether any descriptor has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
