//! This module defines the `PathBuffer` component.
use bevy::prelude::Component;

/// Number of waypoints a [`PathBuffer`] can hold.
pub const PATH_BUFFER_CAPACITY: usize = 128;

/// Fixed capacity waypoint buffer holding the result of a pathfinding operation.
///
/// Waypoints are grid cell indices in start to goal order, excluding the start cell.
/// The cursor points at the next waypoint to walk to. `cursor <= len <= capacity` always
/// holds; the buffer never grows.
#[derive(Clone, Component)]
pub struct PathBuffer {
    waypoints: [u32; PATH_BUFFER_CAPACITY],
    count: usize,
    cursor: usize,
    partial: bool,
}

impl PathBuffer {
    pub fn new() -> Self {
        PathBuffer {
            waypoints: [0; PATH_BUFFER_CAPACITY],
            count: 0,
            cursor: 0,
            partial: false,
        }
    }

    /// Create a buffer from a slice of cell indices. Anything past the capacity is dropped
    /// and the buffer is flagged as partial.
    pub fn from_slice(waypoints: &[u32]) -> Self {
        let mut buffer = PathBuffer::new();
        buffer.fill_from(waypoints);
        buffer
    }

    pub(crate) fn fill_from(&mut self, waypoints: &[u32]) {
        let count = waypoints.len().min(PATH_BUFFER_CAPACITY);
        self.waypoints[..count].copy_from_slice(&waypoints[..count]);
        self.count = count;
        self.cursor = 0;
        self.partial = waypoints.len() > count;
    }

    pub fn capacity(&self) -> usize {
        PATH_BUFFER_CAPACITY
    }

    /// Returns the number of waypoints stored.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the buffer holds no waypoints.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of waypoints not yet reached.
    pub fn remaining(&self) -> usize {
        self.count - self.cursor
    }

    /// True if the path was truncated to fit the buffer and stops short of the goal.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// All stored waypoints, including the ones already walked.
    pub fn waypoints(&self) -> &[u32] {
        &self.waypoints[..self.count]
    }

    /// Waypoints from the cursor onward.
    pub fn remaining_waypoints(&self) -> &[u32] {
        &self.waypoints[self.cursor..self.count]
    }

    /// Returns the next waypoint without advancing.
    pub fn current(&self) -> Option<u32> {
        (self.cursor < self.count).then(|| self.waypoints[self.cursor])
    }

    /// The final waypoint of the buffer.
    pub fn last(&self) -> Option<u32> {
        self.waypoints().last().copied()
    }

    /// Moves the cursor past the current waypoint.
    pub fn advance(&mut self) -> Option<u32> {
        let current = self.current()?;
        self.cursor += 1;
        Some(current)
    }

    /// Appends a waypoint. Returns `false` when the buffer is full.
    pub fn push(&mut self, waypoint: u32) -> bool {
        if self.count == PATH_BUFFER_CAPACITY {
            return false;
        }
        self.waypoints[self.count] = waypoint;
        self.count += 1;
        true
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.cursor = 0;
        self.partial = false;
    }

    /// Returns true if the buffer still has the given cell ahead of the cursor.
    pub fn is_index_ahead(&self, index: u32) -> bool {
        self.remaining_waypoints().contains(&index)
    }
}

impl Default for PathBuffer {
    fn default() -> Self {
        PathBuffer::new()
    }
}

impl std::fmt::Debug for PathBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathBuffer")
            .field("waypoints", &self.waypoints())
            .field("cursor", &self.cursor)
            .field("partial", &self.partial)
            .finish()
    }
}

impl PartialEq for PathBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.waypoints() == other.waypoints() && self.cursor == other.cursor
    }
}

impl Eq for PathBuffer {}
