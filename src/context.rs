//! Per-search scratch memory.
use crate::{bits::BitMask, node::PathNode};

/// Heap slot value for a node that is not in the open list.
pub(crate) const NOT_IN_HEAP: u32 = u32::MAX;

/// Scratch memory for a single A* search: node table, open list, closed set and the
/// generation counter that makes stale node slots invisible without clearing them.
///
/// A context is owned by whoever rented it from the [`crate::pool::PathfindingPool`]
/// and is never shared while rented.
#[derive(Debug, Clone)]
pub struct PathfindingContext {
    pub(crate) nodes: Vec<PathNode>,
    // Binary heap of node indices, only the first `open_count` entries are live.
    pub(crate) open: Vec<u32>,
    pub(crate) open_count: usize,
    // Position of each node in `open`, valid for current-generation nodes only.
    pub(crate) heap_slot: Vec<u32>,
    closed: BitMask,
    generation: u32,
    expanded: usize,
    // Reused when walking parent links back from the goal.
    pub(crate) path_scratch: Vec<u32>,
}

impl PathfindingContext {
    /// Creates a context able to search a grid of up to `node_capacity` cells.
    pub fn new(node_capacity: usize, path_capacity: usize) -> Self {
        PathfindingContext {
            nodes: vec![PathNode::default(); node_capacity],
            open: vec![0; node_capacity],
            open_count: 0,
            heap_slot: vec![NOT_IN_HEAP; node_capacity],
            closed: BitMask::new(node_capacity),
            // Fresh node slots carry generation 0, so they start out stale.
            generation: 1,
            expanded: 0,
            path_scratch: Vec::with_capacity(path_capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn open_count(&self) -> usize {
        self.open_count
    }

    /// Number of nodes expanded since the last reset.
    pub fn expanded(&self) -> usize {
        self.expanded
    }

    /// Number of `u64` words in the closed set.
    pub fn closed_words(&self) -> usize {
        self.closed.word_count()
    }

    /// Starts a new search.
    ///
    /// Only the open count, the closed bits and the generation change. Node slots
    /// from earlier searches become stale through the generation check.
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            // Wrapped around: old stamps could collide with new ones.
            for node in self.nodes.iter_mut() {
                node.generation = 0;
            }
            self.generation = 1;
        }

        self.open_count = 0;
        self.expanded = 0;
        self.closed.clear();
        self.path_scratch.clear();
    }

    #[inline(always)]
    pub fn mark_closed(&mut self, index: usize) {
        self.closed.set(index, true);
    }

    #[inline(always)]
    pub fn is_closed(&self, index: usize) -> bool {
        self.closed.get(index)
    }

    /// Was this slot written during the current search?
    #[inline(always)]
    pub fn is_current(&self, index: usize) -> bool {
        self.nodes
            .get(index)
            .is_some_and(|node| node.generation == self.generation)
    }

    /// The node at `index` if it belongs to the current search.
    pub fn node(&self, index: usize) -> Option<&PathNode> {
        self.nodes
            .get(index)
            .filter(|node| node.generation == self.generation)
    }

    #[inline(always)]
    pub(crate) fn node_mut(&mut self, index: usize) -> &mut PathNode {
        &mut self.nodes[index]
    }

    /// Is the node currently in the open list?
    #[inline(always)]
    pub fn is_open(&self, index: usize) -> bool {
        self.is_current(index) && self.heap_slot[index] != NOT_IN_HEAP
    }

    /// Claims a slot for the current search. Returns `true` if the slot was stale and
    /// has been initialized, `false` if it already belongs to this search.
    #[inline(always)]
    pub(crate) fn touch(&mut self, index: usize, x: i32, y: i32) -> bool {
        let generation = self.generation;
        let node = &mut self.nodes[index];
        if node.generation == generation {
            return false;
        }

        *node = PathNode {
            x,
            y,
            g_cost: f32::INFINITY,
            h_cost: 0.0,
            parent_index: crate::node::NO_PARENT,
            generation,
        };
        self.heap_slot[index] = NOT_IN_HEAP;
        true
    }

    #[inline(always)]
    pub(crate) fn count_expansion(&mut self) -> usize {
        self.expanded += 1;
        self.expanded
    }
}
