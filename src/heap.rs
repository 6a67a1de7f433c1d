//! Binary heap operations over a [`PathfindingContext`]'s open list.
//!
//! The heap stores node indices and orders them by the nodes' `f_cost`. Ties go to the
//! lower `h_cost`, then to the lower node index, so a search is reproducible no matter
//! in which order equal nodes were pushed.
use std::cmp::Ordering;

use crate::context::{PathfindingContext, NOT_IN_HEAP};

#[inline(always)]
fn compare(ctx: &PathfindingContext, a: u32, b: u32) -> Ordering {
    let na = &ctx.nodes[a as usize];
    let nb = &ctx.nodes[b as usize];
    na.f_cost()
        .total_cmp(&nb.f_cost())
        .then_with(|| na.h_cost.total_cmp(&nb.h_cost))
        .then_with(|| a.cmp(&b))
}

#[inline(always)]
fn place(ctx: &mut PathfindingContext, slot: usize, node: u32) {
    ctx.open[slot] = node;
    ctx.heap_slot[node as usize] = slot as u32;
}

fn sift_up(ctx: &mut PathfindingContext, mut slot: usize) {
    let node = ctx.open[slot];
    while slot > 0 {
        let parent = (slot - 1) / 2;
        let parent_node = ctx.open[parent];
        if compare(ctx, node, parent_node) != Ordering::Less {
            break;
        }
        place(ctx, slot, parent_node);
        slot = parent;
    }
    place(ctx, slot, node);
}

fn sift_down(ctx: &mut PathfindingContext, mut slot: usize) {
    let node = ctx.open[slot];
    let count = ctx.open_count;
    loop {
        let left = slot * 2 + 1;
        if left >= count {
            break;
        }
        let right = left + 1;
        let child = if right < count && compare(ctx, ctx.open[right], ctx.open[left]) == Ordering::Less {
            right
        } else {
            left
        };

        let child_node = ctx.open[child];
        if compare(ctx, child_node, node) != Ordering::Less {
            break;
        }
        place(ctx, slot, child_node);
        slot = child;
    }
    place(ctx, slot, node);
}

/// Adds a node to the open list. A node that is already open is re-sifted instead.
pub fn push(ctx: &mut PathfindingContext, node: u32) {
    if ctx.is_open(node as usize) {
        decrease_key(ctx, node);
        return;
    }

    let slot = ctx.open_count;
    ctx.open_count += 1;
    ctx.open[slot] = node;
    sift_up(ctx, slot);
}

/// Removes and returns the open node with the smallest `f_cost`.
pub fn pop(ctx: &mut PathfindingContext) -> Option<u32> {
    if ctx.open_count == 0 {
        return None;
    }

    let top = ctx.open[0];
    ctx.open_count -= 1;
    ctx.heap_slot[top as usize] = NOT_IN_HEAP;

    if ctx.open_count > 0 {
        let last = ctx.open[ctx.open_count];
        place(ctx, 0, last);
        sift_down(ctx, 0);
    }

    Some(top)
}

/// Restores heap order after an open node's cost dropped.
pub fn decrease_key(ctx: &mut PathfindingContext, node: u32) {
    let slot = ctx.heap_slot[node as usize];
    if slot == NOT_IN_HEAP || slot as usize >= ctx.open_count {
        return;
    }
    sift_up(ctx, slot as usize);
}

#[inline(always)]
pub fn is_empty(ctx: &PathfindingContext) -> bool {
    ctx.open_count == 0
}
