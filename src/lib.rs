//! Server-authoritative grid navigation for Bevy.
//!
//! A [`grid::NavGrid`] resource holds walkability, movement costs, dynamic obstacles and
//! cell occupancy. Agents ask for paths with [`commands::NavigationEntityExt`], the
//! server advances everything once per simulation tick with [`plugin::tick`].
mod astar;
mod bits;
mod context;
mod heap;
mod macros;
mod movement;
mod node;

pub mod commands;
pub mod components;
pub mod config;
pub mod dir;
pub mod error;
pub mod grid;
pub mod nav;
pub mod path;
pub mod pathfind;
pub mod plugin;
pub mod pool;
pub mod snapshot;

pub use context::PathfindingContext;
pub use node::PathNode;

/// Id stored in the grid's occupancy layer.
pub type OccupantId = i32;

/// Occupancy value of a free cell.
pub const FREE_OCCUPANT: OccupantId = -1;

pub mod prelude {
    pub use crate::commands::{entity_occupant, NavigationEntityExt};
    pub use crate::components::{
        DirectionQueue, DirectionalMoveKind, Facing, GridPosition, MovementProgress, NavAgent,
        NavIsMoving, NavigationMode, PathRequest, PathRequestFlags, PathState, PathStatus,
    };
    pub use crate::config::NavigationConfig;
    pub use crate::dir::Direction;
    pub use crate::error::{NavError, PathFailReason};
    pub use crate::grid::{GridSettings, GridSettingsBuilder, NavGrid, NavSettings};
    pub use crate::nav::NavCell;
    pub use crate::path::PathBuffer;
    pub use crate::pathfind::{PathJob, Pathfinder};
    pub use crate::plugin::{
        tick, NavClock, NavigationPlugin, NavigationSet, NavigationTick, PathCompleted,
        PathFailed,
    };
    pub use crate::pool::PathfindingPool;
    pub use crate::snapshot::{movement_snapshot, MovementSnapshot};
    pub use crate::PathfindingContext;
}
