//! Error and failure types.
use thiserror::Error;

/// Errors from building or loading a [`crate::grid::NavGrid`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("grid byte length mismatch: expected {expected} bytes, got {actual}")]
    GridSizeMismatch { expected: usize, actual: usize },
    #[error("grid dimensions must be non-zero, got {width}x{height}")]
    ZeroDimensions { width: u32, height: u32 },
}

/// Why a path request or an active path failed.
///
/// Reported through [`crate::components::PathState`], never raised as a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathFailReason {
    #[error("no path exists")]
    NoPathExists,
    #[error("start cell is blocked")]
    StartBlocked,
    #[error("goal cell is blocked")]
    GoalBlocked,
    #[error("search node budget exceeded")]
    Timeout,
    #[error("goal is farther than the maximum path length")]
    TooFarAway,
    #[error("agent is already at the goal")]
    AlreadyAtGoal,
    #[error("path does not fit the waypoint buffer")]
    BufferTooSmall,
    #[error("target is not a valid grid position")]
    InvalidTarget,
    #[error("next cell could not be entered")]
    MoveBlocked,
    #[error("a remaining waypoint became unwalkable")]
    PathInvalidated,
}
