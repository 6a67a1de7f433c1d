//! Navigation settings shared by the plugin systems.
use bevy::prelude::Resource;

/// Settings for the navigation systems.
///
/// ```
/// use bevy_gridnav::prelude::*;
///
/// let config = NavigationConfig::default()
///     .max_requests_per_tick(16)
///     .parallel_workers(8)
///     .tick_rate(30);
///
/// assert_eq!(config.max_requests_per_tick, 16);
/// ```
#[derive(Resource, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NavigationConfig {
    /// Requests whose goal is farther than this (octile distance in cells) fail with
    /// [`crate::error::PathFailReason::TooFarAway`].
    pub max_path_length: u32,
    /// Expected number of concurrent search workers. Sizes the context pool pre-warm.
    pub parallel_workers: usize,
    /// Upper bound on path requests serviced per tick. Excess requests wait.
    pub max_requests_per_tick: usize,
    /// Node budget for requests that don't set their own.
    pub default_max_search_nodes: u32,
    /// Allow diagonal steps past a blocked corner.
    pub allow_corner_cutting: bool,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Cells per second for agents that don't override it.
    pub default_agent_speed: f32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            max_path_length: 256,
            parallel_workers: 4,
            max_requests_per_tick: 64,
            default_max_search_nodes: 8192,
            allow_corner_cutting: false,
            tick_rate: 20,
            default_agent_speed: 4.0,
        }
    }
}

impl NavigationConfig {
    pub fn max_path_length(mut self, length: u32) -> Self {
        self.max_path_length = length;
        self
    }

    pub fn parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers;
        self
    }

    pub fn max_requests_per_tick(mut self, requests: usize) -> Self {
        self.max_requests_per_tick = requests;
        self
    }

    pub fn default_max_search_nodes(mut self, nodes: u32) -> Self {
        self.default_max_search_nodes = nodes;
        self
    }

    pub fn allow_corner_cutting(mut self, allow: bool) -> Self {
        self.allow_corner_cutting = allow;
        self
    }

    /// Ticks per second. Clamped to at least 1.
    pub fn tick_rate(mut self, rate: u32) -> Self {
        self.tick_rate = rate.max(1);
        self
    }

    pub fn default_agent_speed(mut self, speed: f32) -> Self {
        self.default_agent_speed = speed;
        self
    }

    /// Seconds simulated by one tick.
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}
