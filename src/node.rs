//! This module defines the `PathNode` struct, one slot of a search context's node table.
use std::hash::{Hash, Hasher};

/// Sentinel parent index for the start node.
pub const NO_PARENT: u32 = u32::MAX;

/// A `PathNode` for use in [`crate::context::PathfindingContext`].
///
/// Slots are allocated once and reused across searches. A slot only holds data for the
/// current search when its `generation` equals the context generation.
#[derive(Debug, Clone, Copy)]
pub struct PathNode {
    pub x: i32,
    pub y: i32,
    /// Cost from the start.
    pub g_cost: f32,
    /// Heuristic estimate to the goal.
    pub h_cost: f32,
    /// Node table index of the parent, [`NO_PARENT`] for the start.
    pub parent_index: u32,
    pub generation: u32,
}

impl PathNode {
    pub(crate) fn new(x: i32, y: i32) -> Self {
        PathNode {
            x,
            y,
            g_cost: 0.0,
            h_cost: 0.0,
            parent_index: NO_PARENT,
            generation: 0,
        }
    }

    #[inline(always)]
    pub fn f_cost(&self) -> f32 {
        self.g_cost + self.h_cost
    }
}

impl Default for PathNode {
    fn default() -> Self {
        PathNode::new(0, 0)
    }
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl Eq for PathNode {}

impl Hash for PathNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.hash(state);
        self.y.hash(state);
    }
}
