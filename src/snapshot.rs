//! Compact per agent movement state for replication to clients.
use bevy::prelude::{Entity, World};

use crate::{
    components::{
        Facing, GridPosition, MovementProgress, NavAgent, NavIsMoving, NavigationMode,
        PathRequest, PathRequestFlags, PathState, PathStatus,
    },
    config::NavigationConfig,
    dir::Direction,
    grid::NavGrid,
    movement::{cells_per_tick, step_cost},
    path::PathBuffer,
};

/// What a client needs to interpolate an agent between two ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MovementSnapshot {
    pub entity_id: u64,
    pub current_x: i32,
    pub current_y: i32,
    /// Final cell of the current path, or the next cell of a directional move.
    pub target_x: i32,
    pub target_y: i32,
    pub is_moving: bool,
    pub direction: Direction,
    /// Estimated ticks until the target is reached.
    pub ticks_remaining: u32,
    /// Tick the snapshot was taken on.
    pub tick: u64,
}

/// Builds a snapshot of an agent's movement. `None` if the entity is not an agent.
pub fn movement_snapshot(world: &World, entity: Entity, current_tick: u64) -> Option<MovementSnapshot> {
    let entity_ref = world.get_entity(entity).ok()?;
    let position = entity_ref.get::<GridPosition>()?;
    let agent = entity_ref.get::<NavAgent>()?;
    let mode = entity_ref.get::<NavigationMode>().copied().unwrap_or_default();
    let facing = entity_ref.get::<Facing>().copied().unwrap_or_default();
    let progress = entity_ref
        .get::<MovementProgress>()
        .map_or(0.0, |progress| progress.progress);

    let default_config = NavigationConfig::default();
    let config = world
        .get_resource::<NavigationConfig>()
        .unwrap_or(&default_config);
    let per_tick = cells_per_tick(agent, config);

    let mut snapshot = MovementSnapshot {
        entity_id: entity.to_bits(),
        current_x: position.cell.x,
        current_y: position.cell.y,
        target_x: position.cell.x,
        target_y: position.cell.y,
        is_moving: entity_ref.contains::<NavIsMoving>(),
        direction: facing.0,
        ticks_remaining: 0,
        tick: current_tick,
    };

    let Some(grid) = world.get_resource::<NavGrid>() else {
        return Some(snapshot);
    };

    let remaining_cost = match mode {
        NavigationMode::Pathfinding => {
            let state = entity_ref.get::<PathState>()?;
            let buffer = entity_ref.get::<PathBuffer>()?;
            if !matches!(state.status, PathStatus::Ready | PathStatus::Following) {
                if let Some(request) = entity_ref.get::<PathRequest>() {
                    snapshot.target_x = request.target.x;
                    snapshot.target_y = request.target.y;
                }
                return Some(snapshot);
            }

            let flags = entity_ref
                .get::<PathRequest>()
                .map_or(PathRequestFlags::empty(), |request| request.flags);
            let ignore_dynamic = flags.contains(PathRequestFlags::IGNORE_DYNAMIC_OBSTACLES);

            let mut cost = 0.0;
            let mut from = position.cell;
            for &index in buffer.remaining_waypoints() {
                let to = grid.index_to_coord(index as usize);
                let Some(direction) = Direction::between(from, to) else {
                    break;
                };
                cost += step_cost(grid, from, direction, ignore_dynamic, config.allow_corner_cutting)
                    .unwrap_or(direction.cost());
                from = to;
            }

            if let Some(last) = buffer.last() {
                let target = grid.index_to_coord(last as usize);
                snapshot.target_x = target.x;
                snapshot.target_y = target.y;
            }
            if let Some(next) = buffer.current() {
                let next = grid.index_to_coord(next as usize);
                if let Some(direction) = Direction::between(position.cell, next) {
                    snapshot.direction = direction;
                }
            }
            cost
        }
        NavigationMode::Directional {
            direction, flags, ..
        } => {
            let target = position.cell + direction.vector();
            snapshot.target_x = target.x;
            snapshot.target_y = target.y;
            snapshot.direction = direction;
            step_cost(
                grid,
                position.cell,
                direction,
                flags.contains(PathRequestFlags::IGNORE_DYNAMIC_OBSTACLES),
                config.allow_corner_cutting,
            )
            .unwrap_or(0.0)
        }
        NavigationMode::Idle => 0.0,
    };

    let left = (remaining_cost - progress).max(0.0);
    if left > 0.0 && per_tick > 0.0 {
        snapshot.ticks_remaining = (left / per_tick).ceil() as u32;
    }

    Some(snapshot)
}
