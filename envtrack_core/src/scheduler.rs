// Copyright 2026 the envtrack Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The narrow parallel-execution seam a layer stack's recompute step is driven through.
//!
//! A [`Scheduler`] keeps the recompute decision off the caller by running every batched
//! recompute through a trait, with a serial in-process implementation as the default.
//! `RayonScheduler` fills the same slot with `rayon`, one of the most common worker-pool crates
//! in this space.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::registry::{Descriptor, Handle, Registry};

/// How a batch of work is chunked across scheduler workers.
///
/// Grounded on the "fixed-chunk-count" policy named in the component design: a batch is split
/// into roughly-equal chunks sized off how many workers the scheduler has, rather than one task
/// per item, to amortize per-task overhead for small inputs while still giving a busy scheduler
/// enough chunks to rebalance across workers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Policy {
    min_chunks_per_worker: usize,
    min_chunk_size: usize,
    preferred_chunks_per_worker: usize,
}

impl Policy {
    /// A policy that targets `preferred_per_worker` chunks per worker, never dropping below
    /// `min_per_worker` chunks per worker or a chunk size of `min_chunk`.
    #[must_use]
    pub fn fixed_chunk_count(min_per_worker: usize, min_chunk: usize, preferred_per_worker: usize) -> Self {
        Self {
            min_chunks_per_worker: min_per_worker.max(1),
            min_chunk_size: min_chunk.max(1),
            preferred_chunks_per_worker: preferred_per_worker.max(1),
        }
    }

    /// The chunk size `inputs.chunks(..)` should use, given `worker_count` workers and `len`
    /// total items.
    ///
    /// Starts from the chunk size that would yield `preferred_chunks_per_worker` chunks per
    /// worker, floors it at `min_chunk_size`, then grows back down to whatever size still
    /// guarantees at least `min_chunks_per_worker` chunks per worker — the floor on chunk size
    /// never gets to starve a busy scheduler down to one chunk per worker.
    fn chunk_size(self, worker_count: usize, len: usize) -> usize {
        if len == 0 {
            return 1;
        }
        let workers = worker_count.max(1);
        let preferred_chunks = workers.saturating_mul(self.preferred_chunks_per_worker).max(1);
        let mut size = len.div_ceil(preferred_chunks).max(self.min_chunk_size);

        // Only shrink back toward `min_chunks_per_worker` chunks when doing so still respects
        // the minimum chunk size — for small inputs there just isn't enough work to spread
        // across every worker without going below it, and the size floor wins.
        let min_chunks = workers.saturating_mul(self.min_chunks_per_worker).max(1);
        let size_for_min_chunks = len.div_ceil(min_chunks).max(1);
        if size_for_min_chunks >= self.min_chunk_size {
            size = size.min(size_for_min_chunks);
        }

        size.max(1)
    }
}

/// A per-chunk context that a `map` closure passed to [`Scheduler::collected_map_reduce`]
/// registers descriptors through, so handle interning during parallel work never needs
/// thread-local state.
///
/// Grounded on the Design Notes' "explicit context parameter, never thread-local state" for
/// dependency collection inside `produce_value`.
pub struct DependencyCollector<'a, D: Descriptor> {
    registry: &'a Registry<D>,
    touched: Mutex<HashSet<Handle<D>>>,
}

impl<'a, D: Descriptor> DependencyCollector<'a, D> {
    fn new(registry: &'a Registry<D>) -> Self {
        Self { registry, touched: Mutex::new(HashSet::new()) }
    }

    /// Registers `descriptor`, recording the resulting handle as touched by this chunk of work.
    pub fn register(&self, descriptor: D) -> Handle<D> {
        let handle = self.registry.register(descriptor);
        self.touched.lock().insert(handle);
        handle
    }

    /// Records an already-registered `handle` as touched by this chunk of work, without
    /// re-registering its descriptor.
    pub fn touch(&self, handle: Handle<D>) {
        self.touched.lock().insert(handle);
    }

    fn into_touched(self) -> HashSet<Handle<D>> {
        self.touched.into_inner()
    }
}

/// The collaborator interface a layer stack's recompute step is parallelized through.
///
/// An external caller supplies the implementation (§6): this crate never spawns threads on its
/// own. `Scheduler: Send + Sync` so one scheduler instance can be shared by every layer in a
/// stack.
pub trait Scheduler: Send + Sync {
    /// Runs `f` once on each worker the scheduler owns, with no return value collected.
    ///
    /// Used for whole-worker maintenance (e.g. a `SharedMemoryRuntime::collect` sweep) that has
    /// no per-item shape.
    fn once_per_worker(&self, f: &(dyn Fn() + Send + Sync));

    /// Splits `inputs` into chunks per `policy`, maps each chunk with `map`, reduces the chunk
    /// outputs with `reduce` starting from `initial`, and returns the reduced output alongside
    /// the union of every [`DependencyCollector`] handle touched across all chunks.
    fn collected_map_reduce<In, Out, D>(
        &self,
        policy: Policy,
        registry: &Registry<D>,
        map: &(dyn Fn(&[In], &DependencyCollector<'_, D>) -> Out + Send + Sync),
        reduce: &(dyn Fn(Out, Out) -> Out + Send + Sync),
        inputs: &[In],
        initial: Out,
    ) -> (Out, HashSet<Handle<D>>)
    where
        In: Sync,
        Out: Send,
        D: Descriptor;
}

/// A serial, fail-fast [`Scheduler`] that runs every chunk in the calling thread.
///
/// Deterministic ordering makes this the right default for unit tests and conformance tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialScheduler;

impl Scheduler for SequentialScheduler {
    fn once_per_worker(&self, f: &(dyn Fn() + Send + Sync)) {
        f();
    }

    fn collected_map_reduce<In, Out, D>(
        &self,
        policy: Policy,
        registry: &Registry<D>,
        map: &(dyn Fn(&[In], &DependencyCollector<'_, D>) -> Out + Send + Sync),
        reduce: &(dyn Fn(Out, Out) -> Out + Send + Sync),
        inputs: &[In],
        initial: Out,
    ) -> (Out, HashSet<Handle<D>>)
    where
        In: Sync,
        Out: Send,
        D: Descriptor,
    {
        let chunk_size = policy.chunk_size(1, inputs.len());
        let mut acc = initial;
        let mut touched = HashSet::new();
        for chunk in inputs.chunks(chunk_size.max(1)) {
            let collector = DependencyCollector::new(registry);
            let out = map(chunk, &collector);
            acc = reduce(acc, out);
            touched.extend(collector.into_touched());
        }
        (acc, touched)
    }
}

/// A chunked-parallel [`Scheduler`] backed by `rayon`'s global thread pool.
///
/// Available behind the `rayon-scheduler` feature (on by default).
#[cfg(feature = "rayon-scheduler")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RayonScheduler;

#[cfg(feature = "rayon-scheduler")]
impl Scheduler for RayonScheduler {
    fn once_per_worker(&self, f: &(dyn Fn() + Send + Sync)) {
        let pool_len = rayon::current_num_threads().max(1);
        rayon::broadcast(|_ctx| f());
        let _ = pool_len;
    }

    fn collected_map_reduce<In, Out, D>(
        &self,
        policy: Policy,
        registry: &Registry<D>,
        map: &(dyn Fn(&[In], &DependencyCollector<'_, D>) -> Out + Send + Sync),
        reduce: &(dyn Fn(Out, Out) -> Out + Send + Sync),
        inputs: &[In],
        initial: Out,
    ) -> (Out, HashSet<Handle<D>>)
    where
        In: Sync,
        Out: Send,
        D: Descriptor,
    {
        use rayon::prelude::*;

        let chunk_size = policy.chunk_size(rayon::current_num_threads().max(1), inputs.len());
        let (acc, touched) = inputs
            .par_chunks(chunk_size.max(1))
            .map(|chunk| {
                let collector = DependencyCollector::new(registry);
                let out = map(chunk, &collector);
                (out, collector.into_touched())
            })
            .reduce(
                || (None, HashSet::new()),
                |(acc, mut acc_touched), (out, touched)| {
                    let merged = match acc {
                        None => out,
                        Some(acc) => reduce(acc, out),
                    };
                    acc_touched.extend(touched);
                    (Some(merged), acc_touched)
                },
            );

        (acc.unwrap_or(initial), touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
    struct D(u32);

    #[test]
    fn sequential_scheduler_sums_and_collects_handles() {
        let scheduler = SequentialScheduler;
        let registry: Registry<D> = Registry::new();
        let inputs = vec![1u32, 2, 3, 4, 5];
        let (sum, touched) = scheduler.collected_map_reduce(
            Policy::fixed_chunk_count(1, 100, 5),
            &registry,
            &|chunk: &[u32], collector: &DependencyCollector<'_, D>| -> u32 {
                for &n in chunk {
                    collector.register(D(n));
                }
                chunk.iter().sum()
            },
            &|a: u32, b: u32| a + b,
            &inputs,
            0u32,
        );
        assert_eq!(sum, 15);
        assert_eq!(touched.len(), 5);
    }

    #[test]
    fn fixed_chunk_count_never_produces_zero_sized_chunks() {
        let policy = Policy::fixed_chunk_count(1, 100, 5);
        assert_eq!(policy.chunk_size(4, 0), 1);
        assert!(policy.chunk_size(4, 10) >= 1);
    }

    #[test]
    fn fixed_chunk_count_honors_min_chunk_size_for_small_inputs() {
        let policy = Policy::fixed_chunk_count(1, 100, 5);
        // 50 items across 4 workers would want small chunks to hit 5-per-worker, but the
        // 100-item floor keeps it down to a single chunk.
        assert_eq!(policy.chunk_size(4, 50), 100);
    }

    #[test]
    fn fixed_chunk_count_keeps_min_chunks_per_worker_for_large_inputs() {
        let policy = Policy::fixed_chunk_count(1, 100, 5);
        // 10_000 items across 4 workers: preferred chunking (20 chunks of 500) respects both the
        // 100-item floor and the at-least-one-chunk-per-worker guarantee.
        let size = policy.chunk_size(4, 10_000);
        assert_eq!(size, 500);
        assert!(10_000usize.div_ceil(size) >= 4);
    }
}
