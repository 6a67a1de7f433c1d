//! A thread-safe pool of reusable [`PathfindingContext`]s.
use std::{
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicUsize, Ordering},
};

use bevy::log::{info, warn};
use crossbeam_queue::SegQueue;

use crate::context::PathfindingContext;

/// Pool of search contexts shared by every search worker.
///
/// Contexts are reset when rented, so a renter never sees state from the previous
/// tenant. Renting while the free list is empty allocates a new context and counts it in
/// [`PathfindingPool::overflow_allocations`].
#[derive(Debug)]
pub struct PathfindingPool {
    node_capacity: usize,
    path_capacity: usize,
    free: SegQueue<PathfindingContext>,
    allocated: AtomicUsize,
    overflow: AtomicUsize,
    rented: AtomicUsize,
}

impl PathfindingPool {
    /// Creates a pool and eagerly allocates `pre_warm` contexts.
    pub fn new(node_capacity: usize, path_capacity: usize, pre_warm: usize) -> Self {
        let free = SegQueue::new();
        for _ in 0..pre_warm {
            free.push(PathfindingContext::new(node_capacity, path_capacity));
        }

        info!(
            "Pre-warmed {} pathfinding contexts with {} nodes each",
            pre_warm, node_capacity
        );

        PathfindingPool {
            node_capacity,
            path_capacity,
            free,
            allocated: AtomicUsize::new(pre_warm),
            overflow: AtomicUsize::new(0),
            rented: AtomicUsize::new(0),
        }
    }

    pub fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    pub fn path_capacity(&self) -> usize {
        self.path_capacity
    }

    /// Rents a reset context that goes back to the pool when the guard is dropped.
    pub fn rent(&self) -> RentedContext<'_> {
        RentedContext {
            pool: self,
            ctx: self.take(),
        }
    }

    /// Rents a reset context by value. Hand it back with [`PathfindingPool::give_back`].
    pub fn take(&self) -> PathfindingContext {
        let mut ctx = match self.free.pop() {
            Some(ctx) => ctx,
            None => {
                let total = self.allocated.fetch_add(1, Ordering::Relaxed) + 1;
                self.overflow.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Pathfinding pool exhausted, allocating context #{} ({} nodes)",
                    total, self.node_capacity
                );
                PathfindingContext::new(self.node_capacity, self.path_capacity)
            }
        };

        ctx.reset();
        self.rented.fetch_add(1, Ordering::AcqRel);
        ctx
    }

    /// Returns a context to the free list. Contexts sized for a different grid are dropped.
    pub fn give_back(&self, ctx: PathfindingContext) {
        let _ = self
            .rented
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)));

        if ctx.capacity() != self.node_capacity {
            warn!(
                "Dropping pathfinding context with capacity {} (pool capacity {})",
                ctx.capacity(),
                self.node_capacity
            );
            self.allocated.fetch_sub(1, Ordering::Relaxed);
            return;
        }

        self.free.push(ctx);
    }

    /// Contexts waiting in the free list.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Contexts currently rented out.
    pub fn rented(&self) -> usize {
        self.rented.load(Ordering::Acquire)
    }

    /// Contexts created over the pool's lifetime, including pre-warmed ones.
    pub fn total_allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Contexts allocated because the free list was empty.
    pub fn overflow_allocations(&self) -> usize {
        self.overflow.load(Ordering::Relaxed)
    }
}

/// A rented [`PathfindingContext`]. Returned to its pool on drop.
pub struct RentedContext<'a> {
    pool: &'a PathfindingPool,
    ctx: PathfindingContext,
}

impl Deref for RentedContext<'_> {
    type Target = PathfindingContext;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl DerefMut for RentedContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ctx
    }
}

impl Drop for RentedContext<'_> {
    fn drop(&mut self) {
        // A zero capacity context does not allocate.
        let ctx = std::mem::replace(&mut self.ctx, PathfindingContext::new(0, 0));
        self.pool.give_back(ctx);
    }
}
