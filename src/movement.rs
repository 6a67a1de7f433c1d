//! Per tick movement systems for path following and directional movement.
use bevy::{log, math::IVec2, prelude::*};

use crate::{
    components::{
        DirectionQueue, DirectionalMoveKind, Facing, GridPosition, MovementProgress, NavAgent,
        NavIsMoving, NavigationMode, PathRequest, PathRequestFlags, PathState, PathStatus,
    },
    config::NavigationConfig,
    dir::Direction,
    error::PathFailReason,
    grid::NavGrid,
    path::PathBuffer,
    plugin::{NavClock, PathCompleted, PathFailed},
};

/// Cost of stepping from `from` one cell in `direction`, `None` if the step is not
/// allowed. Diagonal steps past a blocked corner are refused unless `allow_corner_cutting`.
pub(crate) fn step_cost(
    grid: &NavGrid,
    from: IVec2,
    direction: Direction,
    ignore_dynamic: bool,
    allow_corner_cutting: bool,
) -> Option<f32> {
    let offset = direction.vector();
    let to = from + offset;
    let index = grid.pos_to_index(to)?;

    if !grid.is_index_walkable(index, ignore_dynamic) {
        return None;
    }

    if direction.is_diagonal() && !allow_corner_cutting {
        let horizontal = grid.pos_to_index(IVec2::new(from.x + offset.x, from.y))?;
        let vertical = grid.pos_to_index(IVec2::new(from.x, from.y + offset.y))?;
        if !grid.is_index_walkable(horizontal, ignore_dynamic)
            || !grid.is_index_walkable(vertical, ignore_dynamic)
        {
            return None;
        }
    }

    Some(direction.cost() * grid.index_movement_cost(index))
}

/// Cells an agent covers per tick.
#[inline(always)]
pub(crate) fn cells_per_tick(agent: &NavAgent, config: &NavigationConfig) -> f32 {
    let speed = if agent.speed > 0.0 {
        agent.speed
    } else {
        config.default_agent_speed
    };
    speed * config.tick_delta()
}

fn remaining_invalidated(grid: &NavGrid, buffer: &PathBuffer, ignore_dynamic: bool) -> bool {
    buffer
        .remaining_waypoints()
        .iter()
        .any(|&index| (index as usize) >= grid.len() || !grid.is_index_walkable(index as usize, ignore_dynamic))
}

type PathMovementQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static NavAgent,
        &'static PathRequest,
        &'static mut NavigationMode,
        &'static mut GridPosition,
        &'static mut Facing,
        &'static mut PathState,
        &'static mut PathBuffer,
        &'static mut MovementProgress,
        Has<NavIsMoving>,
    ),
>;

/// Walks agents along their stored paths.
pub(crate) fn path_movement(
    mut commands: Commands,
    clock: Res<NavClock>,
    config: Res<NavigationConfig>,
    mut grid: ResMut<NavGrid>,
    mut query: PathMovementQuery,
    mut completed: EventWriter<PathCompleted>,
    mut failed: EventWriter<PathFailed>,
) {
    let tick = clock.tick;

    for (
        entity,
        agent,
        request,
        mut mode,
        mut position,
        mut facing,
        mut state,
        mut buffer,
        mut progress,
        is_moving,
    ) in query.iter_mut()
    {
        if !mode.is_pathfinding()
            || !matches!(state.status, PathStatus::Ready | PathStatus::Following)
        {
            continue;
        }

        let ignore_dynamic = request
            .flags
            .contains(PathRequestFlags::IGNORE_DYNAMIC_OBSTACLES);
        let revalidate = request.flags.contains(PathRequestFlags::REVALIDATE);

        state.status = PathStatus::Following;
        progress.progress += cells_per_tick(agent, &config);

        let mut failure = None;
        while let Some(next_index) = buffer.current() {
            if revalidate && remaining_invalidated(&grid, &buffer, ignore_dynamic) {
                failure = Some(PathFailReason::PathInvalidated);
                break;
            }

            let next = grid.index_to_coord(next_index as usize);
            let Some(direction) = Direction::between(position.cell, next) else {
                log::warn!(
                    "Entity {:?} path is not contiguous at {:?} -> {:?}",
                    entity,
                    position.cell,
                    next
                );
                failure = Some(PathFailReason::PathInvalidated);
                break;
            };

            let Some(cost) = step_cost(
                &grid,
                position.cell,
                direction,
                ignore_dynamic,
                config.allow_corner_cutting,
            ) else {
                failure = Some(PathFailReason::MoveBlocked);
                break;
            };

            if progress.progress < cost {
                break;
            }

            if !grid.try_move_occupancy_with(position.cell, next, agent.occupant, ignore_dynamic) {
                failure = Some(PathFailReason::MoveBlocked);
                break;
            }

            progress.progress -= cost;
            progress.last_step_tick = tick;
            position.cell = next;
            facing.0 = direction;
            buffer.advance();
        }

        if let Some(reason) = failure {
            log::debug!("Entity {:?} path failed at {:?}: {}", entity, position.cell, reason);
            state.fail(reason, tick);
            buffer.clear();
            progress.reset();
            *mode = NavigationMode::Idle;
            if is_moving {
                commands.entity(entity).remove::<NavIsMoving>();
            }
            failed.write(PathFailed { entity, reason });
            continue;
        }

        if buffer.remaining() == 0 {
            log::debug!("Entity {:?} reached {:?}", entity, position.cell);
            state.finish(PathStatus::Completed, tick);
            progress.reset();
            *mode = NavigationMode::Idle;
            if is_moving {
                commands.entity(entity).remove::<NavIsMoving>();
            }
            completed.write(PathCompleted {
                entity,
                partial: state.partial,
            });
        } else if !is_moving {
            commands.entity(entity).insert(NavIsMoving);
        }
    }
}

type DirectionalQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static NavAgent,
        &'static mut NavigationMode,
        &'static mut GridPosition,
        &'static mut Facing,
        &'static mut MovementProgress,
        &'static mut DirectionQueue,
        Has<NavIsMoving>,
    ),
>;

/// Steps agents in directional mode one cell at a time.
pub(crate) fn directional_movement(
    mut commands: Commands,
    clock: Res<NavClock>,
    config: Res<NavigationConfig>,
    mut grid: ResMut<NavGrid>,
    mut query: DirectionalQuery,
) {
    let tick = clock.tick;

    for (entity, agent, mut mode, mut position, mut facing, mut progress, mut queue, is_moving) in
        query.iter_mut()
    {
        let NavigationMode::Directional {
            mut direction,
            kind,
            flags,
        } = *mode
        else {
            continue;
        };

        let ignore_dynamic = flags.contains(PathRequestFlags::IGNORE_DYNAMIC_OBSTACLES);
        progress.progress += cells_per_tick(agent, &config);

        let mut stopped = false;
        loop {
            let Some(cost) = step_cost(
                &grid,
                position.cell,
                direction,
                ignore_dynamic,
                config.allow_corner_cutting,
            ) else {
                log::debug!("Entity {:?} blocked moving {} from {:?}", entity, direction, position.cell);
                stopped = true;
                break;
            };

            if progress.progress < cost {
                break;
            }

            let next = position.cell + direction.vector();
            if !grid.try_move_occupancy_with(position.cell, next, agent.occupant, ignore_dynamic) {
                log::debug!("Entity {:?} could not enter {:?}", entity, next);
                stopped = true;
                break;
            }

            progress.progress -= cost;
            progress.last_step_tick = tick;
            position.cell = next;
            facing.0 = direction;

            // Cell boundary: queued turns take effect here.
            if let Some(queued) = queue.pop() {
                direction = queued;
            } else if kind == DirectionalMoveKind::Single {
                stopped = true;
                break;
            }
        }

        if stopped {
            *mode = NavigationMode::Idle;
            progress.reset();
            queue.clear();
            if is_moving {
                commands.entity(entity).remove::<NavIsMoving>();
            }
            continue;
        }

        *mode = NavigationMode::Directional {
            direction,
            kind,
            flags,
        };
        if !is_moving {
            commands.entity(entity).insert(NavIsMoving);
        }
    }
}
