//! A* search over a [`NavGrid`] using a pooled [`PathfindingContext`].
use bevy::math::IVec2;

use crate::{
    context::PathfindingContext,
    dir::{manhattan_distance, octile_distance, DIRECTION_TABLE},
    error::PathFailReason,
    grid::NavGrid,
    heap,
    node::NO_PARENT,
    path::{PathBuffer, PATH_BUFFER_CAPACITY},
};

/// Per search options resolved from a request and the navigation config.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchOptions {
    pub ignore_dynamic: bool,
    pub cardinal_only: bool,
    pub allow_corner_cutting: bool,
    /// Expansions allowed before the search gives up with `Timeout`.
    pub max_nodes: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            ignore_dynamic: false,
            cardinal_only: false,
            allow_corner_cutting: false,
            max_nodes: usize::MAX,
        }
    }
}

#[inline(always)]
fn heuristic(from: IVec2, to: IVec2, cardinal_only: bool) -> f32 {
    if cardinal_only {
        manhattan_distance(from, to)
    } else {
        octile_distance(from, to)
    }
}

/// A* search from `start` to `goal`.
///
/// Both positions must be in bounds and `ctx` must have been reset and sized for the grid.
/// On success the path is left in the context's scratch list in start to goal order,
/// without the start cell. Use [`write_path`] to copy it into a [`PathBuffer`].
pub(crate) fn astar_grid(
    grid: &NavGrid,
    ctx: &mut PathfindingContext,
    start: IVec2,
    goal: IVec2,
    options: &SearchOptions,
) -> Result<(), PathFailReason> {
    let start_index = grid.coord_to_index(start.x, start.y);
    let goal_index = grid.coord_to_index(goal.x, goal.y);

    ctx.touch(start_index, start.x, start.y);
    {
        let node = ctx.node_mut(start_index);
        node.g_cost = 0.0;
        node.h_cost = heuristic(start, goal, options.cardinal_only);
    }
    heap::push(ctx, start_index as u32);

    while let Some(current) = heap::pop(ctx) {
        let current = current as usize;
        if ctx.is_closed(current) {
            continue;
        }

        if current == goal_index {
            reconstruct_path(ctx, start_index, goal_index);
            return Ok(());
        }

        if ctx.count_expansion() > options.max_nodes {
            return Err(PathFailReason::Timeout);
        }
        ctx.mark_closed(current);

        let pos = grid.index_to_coord(current);
        let g_cost = ctx.nodes[current].g_cost;

        for entry in DIRECTION_TABLE.iter() {
            let diagonal = entry.offset.x != 0 && entry.offset.y != 0;
            if diagonal && options.cardinal_only {
                continue;
            }

            let next = pos + entry.offset;
            let Some(next_index) = grid.pos_to_index(next) else {
                continue;
            };

            if ctx.is_closed(next_index) || !grid.is_index_walkable(next_index, options.ignore_dynamic) {
                continue;
            }

            if diagonal && !options.allow_corner_cutting && !corners_clear(grid, pos, entry.offset, options.ignore_dynamic) {
                continue;
            }

            let cost = g_cost + entry.cost * grid.index_movement_cost(next_index);
            ctx.touch(next_index, next.x, next.y);

            let node = ctx.node_mut(next_index);
            if cost < node.g_cost {
                node.g_cost = cost;
                node.h_cost = heuristic(next, goal, options.cardinal_only);
                node.parent_index = current as u32;
                heap::push(ctx, next_index as u32);
            }
        }
    }

    Err(PathFailReason::NoPathExists)
}

// Both orthogonal cells next to a diagonal step have to be open.
#[inline(always)]
fn corners_clear(grid: &NavGrid, pos: IVec2, offset: IVec2, ignore_dynamic: bool) -> bool {
    let horizontal = grid.pos_to_index(IVec2::new(pos.x + offset.x, pos.y));
    let vertical = grid.pos_to_index(IVec2::new(pos.x, pos.y + offset.y));

    match (horizontal, vertical) {
        (Some(h), Some(v)) => {
            grid.is_index_walkable(h, ignore_dynamic) && grid.is_index_walkable(v, ignore_dynamic)
        }
        _ => false,
    }
}

fn reconstruct_path(ctx: &mut PathfindingContext, start_index: usize, goal_index: usize) {
    ctx.path_scratch.clear();

    let mut current = goal_index as u32;
    while current as usize != start_index && current != NO_PARENT {
        ctx.path_scratch.push(current);
        current = ctx.nodes[current as usize].parent_index;
    }

    ctx.path_scratch.reverse();
}

/// Copies the path found by [`astar_grid`] into `buffer`.
///
/// A path longer than the buffer fails with `BufferTooSmall`, or with `allow_partial`
/// keeps the leading waypoints and marks the buffer partial.
pub(crate) fn write_path(
    ctx: &PathfindingContext,
    buffer: &mut PathBuffer,
    allow_partial: bool,
) -> Result<(), PathFailReason> {
    if ctx.path_scratch.len() > PATH_BUFFER_CAPACITY && !allow_partial {
        return Err(PathFailReason::BufferTooSmall);
    }

    buffer.fill_from(&ctx.path_scratch);
    Ok(())
}
