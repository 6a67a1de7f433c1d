//! Navigation operations on entities.
//!
//! [`NavigationEntityExt`] is implemented for [`EntityWorldMut`], which applies the
//! operation immediately, and for [`EntityCommands`], which queues it.
use bevy::{ecs::system::EntityCommands, log, math::IVec2, prelude::*};

use crate::{
    components::{
        DirectionQueue, DirectionalMoveKind, Facing, GridPosition, MovementProgress, NavAgent,
        NavIsMoving, NavigationMode, PathRequest, PathRequestFlags, PathState, PathStatus,
    },
    dir::Direction,
    grid::NavGrid,
    path::PathBuffer,
    plugin::NavClock,
    OccupantId,
};

/// Occupancy id used for an entity's agent.
pub fn entity_occupant(entity: Entity) -> OccupantId {
    entity.index() as OccupantId
}

pub trait NavigationEntityExt {
    /// Makes the entity a navigation agent standing on `position` and claims its cell.
    /// A `speed` of `0.0` uses the configured default.
    fn add_navigation_components(&mut self, position: GridPosition, speed: f32) -> &mut Self;

    /// Releases the agent's cell and removes every navigation component.
    fn remove_navigation_components(&mut self) -> &mut Self;

    /// Asks for a path to `(x, y)`. Replaces any active path or directional move.
    fn request_pathfinding_move(
        &mut self,
        x: i32,
        y: i32,
        floor: u8,
        flags: PathRequestFlags,
    ) -> &mut Self;

    /// Like [`NavigationEntityExt::request_pathfinding_move`] with a fully specified
    /// request, including priority and node budget.
    fn request_path(&mut self, request: PathRequest) -> &mut Self;

    /// Drops the current request or path. Does nothing if none is active.
    fn cancel_pathfinding(&mut self) -> &mut Self;

    /// Starts moving in the direction of `vector`. A zero vector is ignored. While a step
    /// is in progress the new direction is queued until the next cell.
    fn request_directional_move(
        &mut self,
        vector: IVec2,
        kind: DirectionalMoveKind,
        flags: PathRequestFlags,
    ) -> &mut Self;

    fn stop_directional_movement(&mut self) -> &mut Self;

    /// Stops both path and directional movement.
    fn stop_movement(&mut self) -> &mut Self;
}

fn current_tick(world: &World) -> u64 {
    world.get_resource::<NavClock>().map_or(0, |clock| clock.tick)
}

impl NavigationEntityExt for EntityWorldMut<'_> {
    fn add_navigation_components(&mut self, position: GridPosition, speed: f32) -> &mut Self {
        let agent = NavAgent::new(entity_occupant(self.id())).with_speed(speed);

        let claimed = self.world_scope(|world| {
            world
                .get_resource_mut::<NavGrid>()
                .map(|mut grid| grid.try_occupy(position.cell, agent.occupant))
        });

        match claimed {
            Some(true) => {}
            Some(false) => log::warn!(
                "Entity {:?} could not claim cell {:?}",
                self.id(),
                position.cell
            ),
            None => log::warn!("Entity {:?} added without a NavGrid resource", self.id()),
        }

        self.insert((
            position,
            Facing::default(),
            agent,
            NavigationMode::default(),
            MovementProgress::default(),
            PathState::default(),
            PathBuffer::new(),
            DirectionQueue::default(),
        ))
    }

    fn remove_navigation_components(&mut self) -> &mut Self {
        // The NavAgent removal hook frees the cell.
        self.remove::<(
            GridPosition,
            Facing,
            NavAgent,
            NavigationMode,
            MovementProgress,
            PathState,
            PathBuffer,
            DirectionQueue,
            PathRequest,
            NavIsMoving,
        )>()
    }

    fn request_pathfinding_move(
        &mut self,
        x: i32,
        y: i32,
        floor: u8,
        flags: PathRequestFlags,
    ) -> &mut Self {
        self.request_path(PathRequest::new(IVec2::new(x, y)).floor(floor).flags(flags))
    }

    fn request_path(&mut self, mut request: PathRequest) -> &mut Self {
        if !self.contains::<PathState>() {
            log::warn!("Entity {:?} is not a navigation agent", self.id());
            return self;
        }

        let tick = current_tick(self.world());
        request.requested_tick = tick;

        if let Some(mut state) = self.get_mut::<PathState>() {
            state.pending(tick);
        }
        if let Some(mut buffer) = self.get_mut::<PathBuffer>() {
            buffer.clear();
        }
        if let Some(mut progress) = self.get_mut::<MovementProgress>() {
            progress.reset();
        }
        if let Some(mut queue) = self.get_mut::<DirectionQueue>() {
            queue.clear();
        }

        self.insert((request, NavigationMode::Pathfinding))
            .remove::<NavIsMoving>()
    }

    fn cancel_pathfinding(&mut self) -> &mut Self {
        let tick = current_tick(self.world());

        if let Some(mut state) = self.get_mut::<PathState>() {
            if state.status.is_active() {
                state.finish(PathStatus::Cancelled, tick);
            }
        }

        let was_pathfinding = self
            .get::<NavigationMode>()
            .is_some_and(|mode| mode.is_pathfinding());
        if was_pathfinding {
            self.insert(NavigationMode::Idle);
            if let Some(mut progress) = self.get_mut::<MovementProgress>() {
                progress.reset();
            }
            self.remove::<NavIsMoving>();
        }

        if let Some(mut buffer) = self.get_mut::<PathBuffer>() {
            buffer.clear();
        }

        self.remove::<PathRequest>()
    }

    fn request_directional_move(
        &mut self,
        vector: IVec2,
        kind: DirectionalMoveKind,
        flags: PathRequestFlags,
    ) -> &mut Self {
        let Some(direction) = Direction::from_vector(vector) else {
            return self;
        };

        let Some(mode) = self.get::<NavigationMode>().copied() else {
            log::warn!("Entity {:?} is not a navigation agent", self.id());
            return self;
        };

        if mode.is_pathfinding() {
            self.cancel_pathfinding();
        }

        let mid_step = self
            .get::<MovementProgress>()
            .is_some_and(|progress| progress.progress > 0.0);

        if let NavigationMode::Directional {
            direction: current, ..
        } = mode
        {
            if mid_step {
                if let Some(mut queue) = self.get_mut::<DirectionQueue>() {
                    if let Some(dropped) = queue.push(direction) {
                        log::debug!("Entity {:?} dropped queued direction {}", self.id(), dropped);
                    }
                }
                return self.insert(NavigationMode::Directional {
                    direction: current,
                    kind,
                    flags,
                });
            }
        }

        if let Some(mut queue) = self.get_mut::<DirectionQueue>() {
            queue.clear();
        }

        self.insert(NavigationMode::Directional {
            direction,
            kind,
            flags,
        })
    }

    fn stop_directional_movement(&mut self) -> &mut Self {
        let directional = self
            .get::<NavigationMode>()
            .is_some_and(|mode| mode.is_directional());
        if !directional {
            return self;
        }

        if let Some(mut progress) = self.get_mut::<MovementProgress>() {
            progress.reset();
        }
        if let Some(mut queue) = self.get_mut::<DirectionQueue>() {
            queue.clear();
        }

        self.insert(NavigationMode::Idle).remove::<NavIsMoving>()
    }

    fn stop_movement(&mut self) -> &mut Self {
        self.cancel_pathfinding();
        self.stop_directional_movement()
    }
}

impl NavigationEntityExt for EntityCommands<'_> {
    fn add_navigation_components(&mut self, position: GridPosition, speed: f32) -> &mut Self {
        self.queue(move |mut entity: EntityWorldMut| {
            entity.add_navigation_components(position, speed);
        })
    }

    fn remove_navigation_components(&mut self) -> &mut Self {
        self.queue(|mut entity: EntityWorldMut| {
            entity.remove_navigation_components();
        })
    }

    fn request_pathfinding_move(
        &mut self,
        x: i32,
        y: i32,
        floor: u8,
        flags: PathRequestFlags,
    ) -> &mut Self {
        self.queue(move |mut entity: EntityWorldMut| {
            entity.request_pathfinding_move(x, y, floor, flags);
        })
    }

    fn request_path(&mut self, request: PathRequest) -> &mut Self {
        self.queue(move |mut entity: EntityWorldMut| {
            entity.request_path(request);
        })
    }

    fn cancel_pathfinding(&mut self) -> &mut Self {
        self.queue(|mut entity: EntityWorldMut| {
            entity.cancel_pathfinding();
        })
    }

    fn request_directional_move(
        &mut self,
        vector: IVec2,
        kind: DirectionalMoveKind,
        flags: PathRequestFlags,
    ) -> &mut Self {
        self.queue(move |mut entity: EntityWorldMut| {
            entity.request_directional_move(vector, kind, flags);
        })
    }

    fn stop_directional_movement(&mut self) -> &mut Self {
        self.queue(|mut entity: EntityWorldMut| {
            entity.stop_directional_movement();
        })
    }

    fn stop_movement(&mut self) -> &mut Self {
        self.queue(|mut entity: EntityWorldMut| {
            entity.stop_movement();
        })
    }
}
