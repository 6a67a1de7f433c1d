//! Request validation and pooled search orchestration.
use bevy::{
    log,
    math::IVec2,
    prelude::{Entity, Resource},
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    astar::{astar_grid, write_path, SearchOptions},
    components::{PathRequest, PathRequestFlags},
    config::NavigationConfig,
    dir::octile_distance,
    error::PathFailReason,
    grid::NavGrid,
    path::{PathBuffer, PATH_BUFFER_CAPACITY},
    pool::PathfindingPool,
    OccupantId, FREE_OCCUPANT,
};

/// A search to run as part of a batch.
#[derive(Debug, Clone)]
pub struct PathJob {
    pub entity: Entity,
    pub start: IVec2,
    pub occupant: OccupantId,
    pub request: PathRequest,
}

/// Runs path searches against a [`NavGrid`], renting contexts from a shared pool.
///
/// ```
/// use bevy::math::IVec2;
/// use bevy_gridnav::prelude::*;
///
/// let grid = NavGrid::new(&GridSettingsBuilder::new(16, 16).build());
/// let config = NavigationConfig::default();
/// let pathfinder = Pathfinder::for_grid(&grid, &config);
///
/// let request = PathRequest::new(IVec2::new(10, 4));
/// let path = pathfinder.find_path(&grid, &config, IVec2::new(0, 0), 0, &request).unwrap();
/// assert_eq!(path.len(), 10);
/// ```
#[derive(Resource, Debug)]
pub struct Pathfinder {
    pool: PathfindingPool,
}

impl Pathfinder {
    pub fn new(pool: PathfindingPool) -> Self {
        Pathfinder { pool }
    }

    /// Creates a pathfinder with a pool sized for `grid` and pre-warmed with one context
    /// per configured worker.
    pub fn for_grid(grid: &NavGrid, config: &NavigationConfig) -> Self {
        Pathfinder::new(PathfindingPool::new(
            grid.len(),
            PATH_BUFFER_CAPACITY,
            config.parallel_workers.max(1),
        ))
    }

    pub fn pool(&self) -> &PathfindingPool {
        &self.pool
    }

    /// Finds a path from `start` to the request's target.
    ///
    /// `occupant` is the id of the agent asking, its own cell never blocks the goal.
    /// The returned buffer excludes the start cell. It is flagged partial when the path was
    /// truncated under [`PathRequestFlags::ALLOW_PARTIAL`].
    pub fn find_path(
        &self,
        grid: &NavGrid,
        config: &NavigationConfig,
        start: IVec2,
        occupant: OccupantId,
        request: &PathRequest,
    ) -> Result<PathBuffer, PathFailReason> {
        let goal = request.target;
        let ignore_dynamic = request
            .flags
            .contains(PathRequestFlags::IGNORE_DYNAMIC_OBSTACLES);

        let Some(start_index) = grid.pos_to_index(start) else {
            log::warn!("Pathfinding start is out of bounds: {:?}", start);
            return Err(PathFailReason::StartBlocked);
        };

        if !grid.is_index_walkable(start_index, ignore_dynamic) {
            return Err(PathFailReason::StartBlocked);
        }

        let Some(goal_index) = grid.pos_to_index(goal) else {
            log::warn!("Pathfinding goal is out of bounds: {:?}", goal);
            return Err(PathFailReason::InvalidTarget);
        };

        if !grid.is_index_walkable(goal_index, ignore_dynamic) {
            return Err(PathFailReason::GoalBlocked);
        }

        let goal_occupant = grid.index_occupant(goal_index);
        if goal_occupant != FREE_OCCUPANT && goal_occupant != occupant {
            return Err(PathFailReason::GoalBlocked);
        }

        if start == goal {
            return Err(PathFailReason::AlreadyAtGoal);
        }

        if octile_distance(start, goal) > config.max_path_length as f32 {
            return Err(PathFailReason::TooFarAway);
        }

        if self.pool.node_capacity() < grid.len() {
            log::warn!(
                "Pathfinding pool capacity {} is smaller than the grid ({} cells)",
                self.pool.node_capacity(),
                grid.len()
            );
            return Err(PathFailReason::InvalidTarget);
        }

        let max_nodes = match request.max_search_nodes {
            0 => config.default_max_search_nodes,
            n => n,
        };

        let options = SearchOptions {
            ignore_dynamic,
            cardinal_only: request.flags.contains(PathRequestFlags::CARDINAL_ONLY),
            allow_corner_cutting: config.allow_corner_cutting,
            max_nodes: max_nodes as usize,
        };

        let mut ctx = self.pool.rent();
        astar_grid(grid, &mut ctx, start, goal, &options)?;

        let mut buffer = PathBuffer::new();
        write_path(
            &ctx,
            &mut buffer,
            request.flags.contains(PathRequestFlags::ALLOW_PARTIAL),
        )?;

        Ok(buffer)
    }

    /// Runs a batch of searches, in parallel with the `parallel` feature. Each worker rents
    /// its own context. Results come back in job order.
    pub fn find_paths(
        &self,
        grid: &NavGrid,
        config: &NavigationConfig,
        jobs: &[PathJob],
    ) -> Vec<Result<PathBuffer, PathFailReason>> {
        let run = |job: &PathJob| self.find_path(grid, config, job.start, job.occupant, &job.request);

        #[cfg(feature = "parallel")]
        let results = jobs.par_iter().map(run).collect();

        #[cfg(not(feature = "parallel"))]
        let results = jobs.iter().map(run).collect();

        results
    }
}
