//! Components the navigation systems attach to agents.
use bevy::{
    ecs::{component::HookContext, world::DeferredWorld},
    math::IVec2,
    prelude::Component,
};
use bitflags::bitflags;

use crate::{dir::Direction, error::PathFailReason, grid::NavGrid, OccupantId};

bitflags! {
    /// Options for a path request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PathRequestFlags: u8 {
        /// Keep the leading part of a path that doesn't fit the waypoint buffer instead
        /// of failing with `BufferTooSmall`.
        const ALLOW_PARTIAL = 1 << 0;
        /// Plan and walk through dynamic obstacles.
        const IGNORE_DYNAMIC_OBSTACLES = 1 << 1;
        /// Only expand the four cardinal directions.
        const CARDINAL_ONLY = 1 << 2;
        /// Recheck the remaining waypoints on every step.
        const REVALIDATE = 1 << 3;
    }
}

/// A request to pathfind to a target cell. Inserting one puts the agent in
/// [`PathStatus::Pending`].
#[derive(Component, Debug, Clone, PartialEq)]
pub struct PathRequest {
    pub target: IVec2,
    pub floor: u8,
    pub flags: PathRequestFlags,
    /// Higher priorities are serviced first when the per tick budget is exceeded.
    pub priority: u8,
    /// Node budget for this search, `0` uses the configured default.
    pub max_search_nodes: u32,
    pub requested_tick: u64,
}

impl PathRequest {
    pub fn new(target: IVec2) -> Self {
        PathRequest {
            target,
            floor: 0,
            flags: PathRequestFlags::empty(),
            priority: 0,
            max_search_nodes: 0,
            requested_tick: 0,
        }
    }

    pub fn floor(mut self, floor: u8) -> Self {
        self.floor = floor;
        self
    }

    pub fn flags(mut self, flags: PathRequestFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_search_nodes(mut self, nodes: u32) -> Self {
        self.max_search_nodes = nodes;
        self
    }
}

/// Where an agent is in the request / movement lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathStatus {
    #[default]
    None,
    /// Waiting for the intake system.
    Pending,
    /// A search is running.
    Computing,
    /// A path is stored and movement has not started.
    Ready,
    /// The agent is walking the path.
    Following,
    Completed,
    Failed,
    Cancelled,
}

impl PathStatus {
    /// A request or path is in flight.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            PathStatus::Pending | PathStatus::Computing | PathStatus::Ready | PathStatus::Following
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PathStatus::Completed | PathStatus::Failed | PathStatus::Cancelled
        )
    }
}

/// Status of an agent's current or last path.
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct PathState {
    pub status: PathStatus,
    pub fail_reason: Option<PathFailReason>,
    pub requested_tick: u64,
    /// Tick the last search ran.
    pub started_tick: u64,
    /// Tick the path reached a terminal status.
    pub completed_tick: u64,
    /// Searches run for the current request.
    pub attempts: u32,
    /// The stored path was truncated and stops short of the target.
    pub partial: bool,
}

impl PathState {
    pub(crate) fn pending(&mut self, tick: u64) {
        self.status = PathStatus::Pending;
        self.fail_reason = None;
        self.requested_tick = tick;
        self.started_tick = 0;
        self.completed_tick = 0;
        self.attempts = 0;
        self.partial = false;
    }

    pub(crate) fn fail(&mut self, reason: PathFailReason, tick: u64) {
        self.status = PathStatus::Failed;
        self.fail_reason = Some(reason);
        self.completed_tick = tick;
    }

    pub(crate) fn finish(&mut self, status: PathStatus, tick: u64) {
        self.status = status;
        self.completed_tick = tick;
    }
}

/// The cell an agent occupies.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GridPosition {
    pub cell: IVec2,
    pub floor: u8,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        GridPosition {
            cell: IVec2::new(x, y),
            floor: 0,
        }
    }
}

/// The direction an agent last moved or was turned towards.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Facing(pub Direction);

/// Per agent movement settings.
///
/// Removing the component, directly or by despawning the entity, frees the cell the
/// agent holds.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
#[component(on_remove = release_agent_cell)]
pub struct NavAgent {
    /// Id written into the grid's occupancy layer.
    pub occupant: OccupantId,
    /// Cells per second. `0.0` uses the configured default.
    pub speed: f32,
}

impl NavAgent {
    pub fn new(occupant: OccupantId) -> Self {
        NavAgent {
            occupant,
            speed: 0.0,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }
}

fn release_agent_cell(mut world: DeferredWorld, context: HookContext) {
    let Some(occupant) = world.get::<NavAgent>(context.entity).map(|agent| agent.occupant) else {
        return;
    };
    let Some(cell) = world.get::<GridPosition>(context.entity).map(|position| position.cell) else {
        return;
    };

    if let Some(mut grid) = world.get_resource_mut::<NavGrid>() {
        grid.release(cell, occupant);
    }
}

/// How a directional move continues after the first step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DirectionalMoveKind {
    /// Move one cell, then stop.
    #[default]
    Single,
    /// Keep moving until stopped or blocked.
    Continuous,
}

/// Which movement driver owns the agent. Only one can be active, starting one replaces
/// the other.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub enum NavigationMode {
    #[default]
    Idle,
    Directional {
        direction: Direction,
        kind: DirectionalMoveKind,
        flags: PathRequestFlags,
    },
    Pathfinding,
}

impl NavigationMode {
    pub fn is_idle(&self) -> bool {
        matches!(self, NavigationMode::Idle)
    }

    pub fn is_directional(&self) -> bool {
        matches!(self, NavigationMode::Directional { .. })
    }

    pub fn is_pathfinding(&self) -> bool {
        matches!(self, NavigationMode::Pathfinding)
    }
}

/// Fraction of the current step already covered, in cost units.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementProgress {
    pub progress: f32,
    /// Tick of the last completed step.
    pub last_step_tick: u64,
}

impl MovementProgress {
    pub fn reset(&mut self) {
        self.progress = 0.0;
    }
}

/// Marker present while an agent is stepping between cells.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct NavIsMoving;

/// Number of pending direction changes kept per agent.
pub const DIRECTION_QUEUE_CAPACITY: usize = 4;

/// Direction changes requested while a step is in progress, applied at the next cell
/// boundary. When full, the oldest entry is discarded.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionQueue {
    items: [Direction; DIRECTION_QUEUE_CAPACITY],
    head: usize,
    len: usize,
}

impl DirectionQueue {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Queues a direction. Returns the discarded direction if the queue was full.
    pub fn push(&mut self, direction: Direction) -> Option<Direction> {
        let mut dropped = None;
        if self.len == DIRECTION_QUEUE_CAPACITY {
            dropped = self.pop();
        }

        let tail = (self.head + self.len) % DIRECTION_QUEUE_CAPACITY;
        self.items[tail] = direction;
        self.len += 1;
        dropped
    }

    pub fn pop(&mut self) -> Option<Direction> {
        if self.len == 0 {
            return None;
        }

        let direction = self.items[self.head];
        self.head = (self.head + 1) % DIRECTION_QUEUE_CAPACITY;
        self.len -= 1;
        Some(direction)
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
