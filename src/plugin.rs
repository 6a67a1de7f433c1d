//! Bevy plugin, the per tick schedule and the request intake system.
use std::cmp::Reverse;

use bevy::{ecs::schedule::ScheduleLabel, log, prelude::*};
use smallvec::SmallVec;

use crate::{
    components::{
        GridPosition, MovementProgress, NavAgent, NavigationMode, PathRequest, PathState,
        PathStatus,
    },
    config::NavigationConfig,
    error::PathFailReason,
    grid::NavGrid,
    macros::timed,
    movement::{directional_movement, path_movement},
    path::PathBuffer,
    pathfind::{PathJob, Pathfinder},
};

/// Schedule run once per server tick by [`tick`].
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct NavigationTick;

/// Systems the plugin adds to [`NavigationTick`].
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct NavigationSet;

/// The server tick currently being simulated.
#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NavClock {
    pub tick: u64,
}

/// Sent when an agent reaches the end of its path.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathCompleted {
    pub entity: Entity,
    /// The path was cut to fit the waypoint buffer, so the agent stopped short of the
    /// requested target.
    pub partial: bool,
}

/// Sent when a request or an active path fails.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathFailed {
    pub entity: Entity,
    pub reason: PathFailReason,
}

/// Adds navigation to an app.
///
/// The plugin doesn't drive itself: the server calls [`tick`] once per simulation tick.
/// A [`NavGrid`] resource has to be inserted before the first tick.
#[derive(Default)]
pub struct NavigationPlugin {
    pub config: NavigationConfig,
}

impl NavigationPlugin {
    pub fn new(config: NavigationConfig) -> Self {
        NavigationPlugin { config }
    }
}

impl Plugin for NavigationPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone())
            .init_resource::<NavClock>()
            // Updated by `tick`, not by the app's frame.
            .init_resource::<Events<PathCompleted>>()
            .init_resource::<Events<PathFailed>>()
            .init_schedule(NavigationTick)
            .add_systems(
                NavigationTick,
                (process_path_requests, directional_movement, path_movement)
                    .chain()
                    .in_set(NavigationSet),
            );
    }
}

/// Runs one navigation tick: request intake, then directional movement, then path
/// movement.
///
/// Does nothing until a [`NavGrid`] resource exists.
pub fn tick(world: &mut World, server_tick: u64) {
    if !world.contains_resource::<NavGrid>() {
        log::warn!("Navigation tick {} skipped, no NavGrid resource", server_tick);
        return;
    }

    if !world.contains_resource::<NavigationConfig>() {
        world.insert_resource(NavigationConfig::default());
    }

    world.get_resource_or_insert_with(NavClock::default).tick = server_tick;
    sync_pathfinder(world);

    world.get_resource_or_insert_with(Events::<PathCompleted>::default).update();
    world.get_resource_or_insert_with(Events::<PathFailed>::default).update();

    if world.try_run_schedule(NavigationTick).is_err() {
        log::warn!("Navigation tick {} skipped, NavigationPlugin is not installed", server_tick);
    }
}

// Keeps the context pool sized for the current grid.
fn sync_pathfinder(world: &mut World) {
    let cells = world.resource::<NavGrid>().len();
    let stale = world
        .get_resource::<Pathfinder>()
        .is_none_or(|pathfinder| pathfinder.pool().node_capacity() < cells);

    if stale {
        let pathfinder = Pathfinder::for_grid(world.resource::<NavGrid>(), world.resource::<NavigationConfig>());
        log::info!(
            "Sized pathfinding pool for {} cells ({} contexts)",
            cells,
            pathfinder.pool().available()
        );
        world.insert_resource(pathfinder);
    }
}

/// Services pending path requests, up to the configured budget per tick.
pub(crate) fn process_path_requests(
    clock: Res<NavClock>,
    config: Res<NavigationConfig>,
    grid: Res<NavGrid>,
    pathfinder: Res<Pathfinder>,
    mut query: Query<(
        Entity,
        &GridPosition,
        &NavAgent,
        &PathRequest,
        &mut PathState,
        &mut PathBuffer,
        &mut MovementProgress,
        &mut NavigationMode,
    )>,
    mut failed: EventWriter<PathFailed>,
) {
    let tick = clock.tick;

    let mut pending: SmallVec<[(Reverse<u8>, u64, Entity); 64]> = query
        .iter()
        .filter(|(.., state, _, _, _)| state.status == PathStatus::Pending)
        .map(|(entity, _, _, request, ..)| (Reverse(request.priority), request.requested_tick, entity))
        .collect();

    if pending.is_empty() {
        return;
    }

    pending.sort_unstable();
    if pending.len() > config.max_requests_per_tick {
        log::debug!(
            "Deferring {} path requests past tick {}",
            pending.len() - config.max_requests_per_tick,
            tick
        );
        pending.truncate(config.max_requests_per_tick);
    }

    let mut jobs = Vec::with_capacity(pending.len());
    for (_, _, entity) in pending {
        let Ok((_, position, agent, request, mut state, mut buffer, _, mut mode)) = query.get_mut(entity)
        else {
            continue;
        };

        state.status = PathStatus::Computing;
        state.started_tick = tick;
        state.attempts += 1;

        // A single grid serves one floor.
        if request.floor != position.floor {
            log::warn!(
                "Entity {:?} requested floor {} from floor {}",
                entity,
                request.floor,
                position.floor
            );
            state.fail(PathFailReason::InvalidTarget, tick);
            buffer.clear();
            *mode = NavigationMode::Idle;
            failed.write(PathFailed {
                entity,
                reason: PathFailReason::InvalidTarget,
            });
            continue;
        }

        jobs.push(PathJob {
            entity,
            start: position.cell,
            occupant: agent.occupant,
            request: request.clone(),
        });
    }

    let results = timed!("Path request batch", {
        pathfinder.find_paths(&grid, &config, &jobs)
    });

    for (job, result) in jobs.iter().zip(results) {
        let Ok((.., mut state, mut buffer, mut progress, mut mode)) = query.get_mut(job.entity)
        else {
            continue;
        };

        match result {
            Ok(path) => {
                log::debug!(
                    "Entity {:?} path to {:?}: {} waypoints{}",
                    job.entity,
                    job.request.target,
                    path.len(),
                    if path.is_partial() { " (partial)" } else { "" }
                );
                state.status = PathStatus::Ready;
                state.partial = path.is_partial();
                *buffer = path;
                progress.reset();
            }
            Err(reason) => {
                log::debug!(
                    "Entity {:?} path to {:?} failed: {}",
                    job.entity,
                    job.request.target,
                    reason
                );
                state.fail(reason, tick);
                buffer.clear();
                *mode = NavigationMode::Idle;
                failed.write(PathFailed {
                    entity: job.entity,
                    reason,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        commands::NavigationEntityExt,
        components::{DirectionalMoveKind, Facing, NavIsMoving, PathRequestFlags},
        dir::Direction,
        grid::GridSettingsBuilder,
    };
    use bevy::math::IVec2;

    // One cell per tick.
    fn fast_config() -> NavigationConfig {
        NavigationConfig::default()
            .tick_rate(20)
            .default_agent_speed(20.0)
    }

    fn setup(width: u32, height: u32, config: NavigationConfig) -> App {
        let mut app = App::new();
        app.add_plugins(NavigationPlugin::new(config));
        app.insert_resource(NavGrid::new(&GridSettingsBuilder::new(width, height).build()));
        app
    }

    fn spawn_agent(app: &mut App, x: i32, y: i32) -> Entity {
        app.world_mut()
            .spawn_empty()
            .add_navigation_components(GridPosition::new(x, y), 0.0)
            .id()
    }

    fn status(app: &App, entity: Entity) -> PathStatus {
        app.world().get::<PathState>(entity).unwrap().status
    }

    fn cell(app: &App, entity: Entity) -> IVec2 {
        app.world().get::<GridPosition>(entity).unwrap().cell
    }

    fn completed_this_tick(app: &App, entity: Entity) -> bool {
        app.world()
            .resource::<Events<PathCompleted>>()
            .iter_current_update_events()
            .any(|event| event.entity == entity)
    }

    fn failed_this_tick(app: &App, entity: Entity) -> Option<PathFailReason> {
        app.world()
            .resource::<Events<PathFailed>>()
            .iter_current_update_events()
            .find(|event| event.entity == entity)
            .map(|event| event.reason)
    }

    // Ticks until the agent's path is no longer active, returning every cell it stood on.
    fn run_to_end(app: &mut App, entity: Entity, first_tick: u64) -> (Vec<IVec2>, u64) {
        let mut visited = vec![cell(app, entity)];
        let mut server_tick = first_tick;
        for _ in 0..500 {
            tick(app.world_mut(), server_tick);
            let pos = cell(app, entity);
            if visited.last() != Some(&pos) {
                visited.push(pos);
            }
            if status(app, entity).is_terminal() {
                break;
            }
            server_tick += 1;
        }
        (visited, server_tick)
    }

    #[test]
    fn test_walk_open_grid() {
        let mut app = setup(10, 10, fast_config());
        let agent = spawn_agent(&mut app, 0, 0);

        app.world_mut()
            .entity_mut(agent)
            .request_pathfinding_move(9, 9, 0, PathRequestFlags::empty());
        assert_eq!(status(&app, agent), PathStatus::Pending);

        let (visited, last_tick) = run_to_end(&mut app, agent, 1);

        assert_eq!(status(&app, agent), PathStatus::Completed);
        assert!(completed_this_tick(&app, agent));
        assert_eq!(visited.len(), 10);
        assert_eq!(cell(&app, agent), IVec2::new(9, 9));

        let state = app.world().get::<PathState>(agent).unwrap();
        assert_eq!(state.attempts, 1);
        assert_eq!(state.started_tick, 1);
        assert_eq!(state.completed_tick, last_tick);
        assert!(!state.partial);

        let grid = app.world().resource::<NavGrid>();
        let occupant = app.world().get::<NavAgent>(agent).unwrap().occupant;
        assert_eq!(grid.occupant(IVec2::new(9, 9)), Some(occupant));
        assert!(!grid.is_occupied(IVec2::new(0, 0)));
        assert_eq!(grid.occupied_count(), 1);

        assert!(app.world().get::<NavIsMoving>(agent).is_none());
        assert!(app.world().get::<NavigationMode>(agent).unwrap().is_idle());
        assert_eq!(app.world().get::<Facing>(agent), Some(&Facing(Direction::NorthEast)));
    }

    #[test]
    fn test_walk_around_blocked_cell() {
        let mut app = setup(10, 10, fast_config());
        app.world_mut()
            .resource_mut::<NavGrid>()
            .set_walkable(5, 5, false);
        let agent = spawn_agent(&mut app, 0, 0);

        app.world_mut()
            .entity_mut(agent)
            .request_pathfinding_move(9, 9, 0, PathRequestFlags::empty());
        let (visited, _) = run_to_end(&mut app, agent, 1);

        assert_eq!(status(&app, agent), PathStatus::Completed);
        assert!(!visited.contains(&IVec2::new(5, 5)));
        assert_eq!(visited.len(), 12);
        assert_eq!(cell(&app, agent), IVec2::new(9, 9));
    }

    fn assert_steps_are_cardinal(visited: &[IVec2]) {
        for pair in visited.windows(2) {
            let delta = (pair[1] - pair[0]).abs();
            assert_eq!(delta.x + delta.y, 1, "diagonal step {:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_walk_cardinal_only() {
        let mut app = setup(6, 6, fast_config());
        let agent = spawn_agent(&mut app, 0, 0);

        app.world_mut()
            .entity_mut(agent)
            .request_pathfinding_move(3, 3, 0, PathRequestFlags::CARDINAL_ONLY);
        let (visited, _) = run_to_end(&mut app, agent, 1);

        assert_eq!(status(&app, agent), PathStatus::Completed);
        assert_eq!(cell(&app, agent), IVec2::new(3, 3));
        assert_eq!(visited.len(), 7);
        assert_steps_are_cardinal(&visited);
    }

    #[test]
    fn test_walk_through_dynamic_obstacle() {
        let mut app = setup(5, 1, fast_config());
        app.world_mut()
            .resource_mut::<NavGrid>()
            .add_dynamic_obstacle(2, 0, 0);
        let agent = spawn_agent(&mut app, 0, 0);

        app.world_mut()
            .entity_mut(agent)
            .request_pathfinding_move(4, 0, 0, PathRequestFlags::empty());
        tick(app.world_mut(), 1);
        assert_eq!(status(&app, agent), PathStatus::Failed);
        assert_eq!(failed_this_tick(&app, agent), Some(PathFailReason::NoPathExists));

        app.world_mut().entity_mut(agent).request_pathfinding_move(
            4,
            0,
            0,
            PathRequestFlags::IGNORE_DYNAMIC_OBSTACLES,
        );
        let (visited, _) = run_to_end(&mut app, agent, 2);

        assert_eq!(status(&app, agent), PathStatus::Completed);
        assert!(visited.contains(&IVec2::new(2, 0)));
        assert_eq!(cell(&app, agent), IVec2::new(4, 0));
        // The obstacle stays on the dynamic layer after the agent walked through it.
        assert!(app.world().resource::<NavGrid>().is_dynamic_obstacle(2, 0));
    }

    #[test]
    fn test_partial_path_completion_is_flagged() {
        let mut app = setup(200, 1, fast_config());
        let agent = spawn_agent(&mut app, 0, 0);

        app.world_mut()
            .entity_mut(agent)
            .request_pathfinding_move(199, 0, 0, PathRequestFlags::ALLOW_PARTIAL);
        run_to_end(&mut app, agent, 1);

        assert_eq!(status(&app, agent), PathStatus::Completed);
        assert!(app.world().get::<PathState>(agent).unwrap().partial);
        assert_eq!(cell(&app, agent), IVec2::new(128, 0));

        let event = app
            .world()
            .resource::<Events<PathCompleted>>()
            .iter_current_update_events()
            .find(|event| event.entity == agent)
            .copied();
        assert_eq!(event, Some(PathCompleted { entity: agent, partial: true }));
    }

    #[test]
    fn test_moving_marker_while_following() {
        let mut app = setup(10, 1, fast_config());
        let agent = spawn_agent(&mut app, 0, 0);

        app.world_mut()
            .entity_mut(agent)
            .request_pathfinding_move(9, 0, 0, PathRequestFlags::empty());
        tick(app.world_mut(), 1);

        assert_eq!(status(&app, agent), PathStatus::Following);
        assert!(app.world().get::<NavIsMoving>(agent).is_some());
        assert_eq!(cell(&app, agent), IVec2::new(1, 0));
    }

    #[test]
    fn test_occupied_cell_fails_move() {
        let mut app = setup(5, 1, fast_config());
        let agent = spawn_agent(&mut app, 0, 0);

        app.world_mut()
            .entity_mut(agent)
            .request_pathfinding_move(4, 0, 0, PathRequestFlags::empty());
        tick(app.world_mut(), 1);
        assert_eq!(cell(&app, agent), IVec2::new(1, 0));

        let _blocker = spawn_agent(&mut app, 2, 0);
        tick(app.world_mut(), 2);

        let state = app.world().get::<PathState>(agent).unwrap();
        assert_eq!(state.status, PathStatus::Failed);
        assert_eq!(state.fail_reason, Some(PathFailReason::MoveBlocked));
        assert_eq!(failed_this_tick(&app, agent), Some(PathFailReason::MoveBlocked));
        assert_eq!(cell(&app, agent), IVec2::new(1, 0));
        assert!(app.world().get::<NavIsMoving>(agent).is_none());

        // No retry.
        tick(app.world_mut(), 3);
        assert_eq!(cell(&app, agent), IVec2::new(1, 0));
        assert_eq!(status(&app, agent), PathStatus::Failed);
    }

    #[test]
    fn test_revalidate_invalidates_path() {
        let mut app = setup(6, 1, fast_config());
        let agent = spawn_agent(&mut app, 0, 0);

        app.world_mut()
            .entity_mut(agent)
            .request_pathfinding_move(5, 0, 0, PathRequestFlags::REVALIDATE);
        tick(app.world_mut(), 1);

        app.world_mut()
            .resource_mut::<NavGrid>()
            .add_dynamic_obstacle(4, 0, 0);
        tick(app.world_mut(), 2);

        let state = app.world().get::<PathState>(agent).unwrap();
        assert_eq!(state.fail_reason, Some(PathFailReason::PathInvalidated));
        assert_eq!(cell(&app, agent), IVec2::new(1, 0));
    }

    #[test]
    fn test_stale_path_without_revalidate() {
        let mut app = setup(6, 1, fast_config());
        let agent = spawn_agent(&mut app, 0, 0);

        app.world_mut()
            .entity_mut(agent)
            .request_pathfinding_move(5, 0, 0, PathRequestFlags::empty());
        tick(app.world_mut(), 1);

        app.world_mut()
            .resource_mut::<NavGrid>()
            .add_dynamic_obstacle(4, 0, 0);
        let (_, _) = run_to_end(&mut app, agent, 2);

        let state = app.world().get::<PathState>(agent).unwrap();
        assert_eq!(state.fail_reason, Some(PathFailReason::MoveBlocked));
        assert_eq!(cell(&app, agent), IVec2::new(3, 0));
    }

    #[test]
    fn test_request_failures_are_reported() {
        let mut app = setup(8, 8, fast_config());
        let at_goal = spawn_agent(&mut app, 2, 2);
        let wrong_floor = spawn_agent(&mut app, 3, 3);
        let outside = spawn_agent(&mut app, 4, 4);

        app.world_mut()
            .entity_mut(at_goal)
            .request_pathfinding_move(2, 2, 0, PathRequestFlags::empty());
        app.world_mut()
            .entity_mut(wrong_floor)
            .request_pathfinding_move(5, 5, 1, PathRequestFlags::empty());
        app.world_mut()
            .entity_mut(outside)
            .request_pathfinding_move(20, 4, 0, PathRequestFlags::empty());
        tick(app.world_mut(), 1);

        let reason = |entity| app.world().get::<PathState>(entity).unwrap().fail_reason;
        assert_eq!(reason(at_goal), Some(PathFailReason::AlreadyAtGoal));
        assert_eq!(reason(wrong_floor), Some(PathFailReason::InvalidTarget));
        assert_eq!(reason(outside), Some(PathFailReason::InvalidTarget));
        assert_eq!(failed_this_tick(&app, wrong_floor), Some(PathFailReason::InvalidTarget));
    }

    #[test]
    fn test_requests_serviced_by_priority() {
        let mut app = setup(10, 10, fast_config().max_requests_per_tick(2));
        let agents: Vec<Entity> = (0..4).map(|i| spawn_agent(&mut app, 0, i * 2)).collect();

        for (i, priority) in [0u8, 5, 1, 5].into_iter().enumerate() {
            let target = IVec2::new(9, i as i32 * 2);
            app.world_mut()
                .entity_mut(agents[i])
                .request_path(PathRequest::new(target).priority(priority));
        }
        tick(app.world_mut(), 1);

        assert_eq!(status(&app, agents[0]), PathStatus::Pending);
        assert_eq!(status(&app, agents[1]), PathStatus::Following);
        assert_eq!(status(&app, agents[2]), PathStatus::Pending);
        assert_eq!(status(&app, agents[3]), PathStatus::Following);

        tick(app.world_mut(), 2);
        assert_eq!(status(&app, agents[0]), PathStatus::Following);
        assert_eq!(status(&app, agents[2]), PathStatus::Following);
        assert_eq!(app.world().get::<PathState>(agents[0]).unwrap().started_tick, 2);
    }

    #[test]
    fn test_cancel_mid_path() {
        let mut app = setup(10, 1, fast_config());
        let agent = spawn_agent(&mut app, 0, 0);

        app.world_mut()
            .entity_mut(agent)
            .request_pathfinding_move(9, 0, 0, PathRequestFlags::empty());
        tick(app.world_mut(), 1);
        tick(app.world_mut(), 2);
        assert_eq!(cell(&app, agent), IVec2::new(2, 0));

        app.world_mut().entity_mut(agent).cancel_pathfinding();
        assert_eq!(status(&app, agent), PathStatus::Cancelled);
        assert!(app.world().get::<NavIsMoving>(agent).is_none());
        assert!(app.world().get::<PathBuffer>(agent).unwrap().is_empty());

        tick(app.world_mut(), 3);
        assert_eq!(cell(&app, agent), IVec2::new(2, 0));
        assert_eq!(status(&app, agent), PathStatus::Cancelled);
    }

    #[test]
    fn test_directional_continuous_and_stop() {
        let mut app = setup(8, 8, fast_config());
        let agent = spawn_agent(&mut app, 2, 2);

        app.world_mut().entity_mut(agent).request_directional_move(
            IVec2::new(1, 0),
            DirectionalMoveKind::Continuous,
            PathRequestFlags::empty(),
        );
        for server_tick in 1..=3 {
            tick(app.world_mut(), server_tick);
        }
        assert_eq!(cell(&app, agent), IVec2::new(5, 2));
        assert!(app.world().get::<NavIsMoving>(agent).is_some());

        app.world_mut().entity_mut(agent).stop_directional_movement();
        tick(app.world_mut(), 4);
        assert_eq!(cell(&app, agent), IVec2::new(5, 2));
        assert!(app.world().get::<NavIsMoving>(agent).is_none());
    }

    #[test]
    fn test_directional_stops_at_edge() {
        let mut app = setup(4, 4, fast_config());
        let agent = spawn_agent(&mut app, 1, 1);

        app.world_mut().entity_mut(agent).request_directional_move(
            IVec2::new(0, 1),
            DirectionalMoveKind::Continuous,
            PathRequestFlags::empty(),
        );
        for server_tick in 1..=5 {
            tick(app.world_mut(), server_tick);
        }

        assert_eq!(cell(&app, agent), IVec2::new(1, 3));
        assert!(app.world().get::<NavigationMode>(agent).unwrap().is_idle());
        assert_eq!(app.world().get::<Facing>(agent), Some(&Facing(Direction::North)));
    }

    #[test]
    fn test_directional_single_step() {
        let mut app = setup(8, 8, fast_config());
        let agent = spawn_agent(&mut app, 4, 4);

        app.world_mut().entity_mut(agent).request_directional_move(
            IVec2::new(0, -1),
            DirectionalMoveKind::Single,
            PathRequestFlags::empty(),
        );
        for server_tick in 1..=3 {
            tick(app.world_mut(), server_tick);
        }

        assert_eq!(cell(&app, agent), IVec2::new(4, 3));
        assert!(app.world().get::<NavigationMode>(agent).unwrap().is_idle());
    }

    #[test]
    fn test_queued_turn_applies_at_cell_boundary() {
        // Half a cell per tick.
        let config = NavigationConfig::default().tick_rate(20).default_agent_speed(10.0);
        let mut app = setup(8, 8, config);
        let agent = spawn_agent(&mut app, 4, 4);

        app.world_mut().entity_mut(agent).request_directional_move(
            IVec2::new(0, 1),
            DirectionalMoveKind::Continuous,
            PathRequestFlags::empty(),
        );
        tick(app.world_mut(), 1);
        assert_eq!(cell(&app, agent), IVec2::new(4, 4));

        app.world_mut().entity_mut(agent).request_directional_move(
            IVec2::new(-1, 0),
            DirectionalMoveKind::Continuous,
            PathRequestFlags::empty(),
        );
        tick(app.world_mut(), 2);
        assert_eq!(cell(&app, agent), IVec2::new(4, 5));

        tick(app.world_mut(), 3);
        tick(app.world_mut(), 4);
        assert_eq!(cell(&app, agent), IVec2::new(3, 5));
    }

    #[test]
    fn test_tick_without_grid_is_skipped() {
        let mut app = App::new();
        app.add_plugins(NavigationPlugin::default());
        tick(app.world_mut(), 1);
        assert!(app.world().get_resource::<Pathfinder>().is_none());
    }

    #[test]
    fn test_pool_sized_for_grid() {
        let mut app = setup(12, 12, fast_config().parallel_workers(3));
        tick(app.world_mut(), 1);

        let pathfinder = app.world().resource::<Pathfinder>();
        assert_eq!(pathfinder.pool().node_capacity(), 144);
        assert_eq!(pathfinder.pool().total_allocated(), 3);
    }
}
