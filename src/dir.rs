//! The eight grid directions and their movement costs.
//!
//! The same table drives neighbor expansion, the search heuristic and the movement
//! cost accumulation so diagonal pricing always agrees.
use std::f32::consts::SQRT_2;

use bevy::math::IVec2;
use strum::{Display, EnumCount, EnumIter, FromRepr};

/// Cost of a single cardinal step.
pub const CARDINAL_COST: f32 = 1.0;
/// Cost of a single diagonal step.
pub const DIAGONAL_COST: f32 = SQRT_2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, EnumCount, EnumIter, FromRepr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Direction {
    #[default]
    North = 0,
    NorthEast = 1,
    East = 2,
    SouthEast = 3,
    South = 4,
    SouthWest = 5,
    West = 6,
    NorthWest = 7,
}

pub use self::Direction::*;

/// A row of the direction table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionEntry {
    pub direction: Direction,
    pub offset: IVec2,
    pub cost: f32,
}

/// Fixed expansion order used by the search. Changing the order changes which of several
/// equal cost paths is returned, so tests depend on it.
pub const DIRECTION_TABLE: [DirectionEntry; Direction::COUNT] = [
    DirectionEntry { direction: North, offset: IVec2::new(0, 1), cost: CARDINAL_COST },
    DirectionEntry { direction: NorthEast, offset: IVec2::new(1, 1), cost: DIAGONAL_COST },
    DirectionEntry { direction: East, offset: IVec2::new(1, 0), cost: CARDINAL_COST },
    DirectionEntry { direction: SouthEast, offset: IVec2::new(1, -1), cost: DIAGONAL_COST },
    DirectionEntry { direction: South, offset: IVec2::new(0, -1), cost: CARDINAL_COST },
    DirectionEntry { direction: SouthWest, offset: IVec2::new(-1, -1), cost: DIAGONAL_COST },
    DirectionEntry { direction: West, offset: IVec2::new(-1, 0), cost: CARDINAL_COST },
    DirectionEntry { direction: NorthWest, offset: IVec2::new(-1, 1), cost: DIAGONAL_COST },
];

impl Direction {
    pub fn cardinal() -> std::iter::Copied<std::slice::Iter<'static, Direction>> {
        [North, East, South, West].iter().copied()
    }

    pub fn ordinal() -> std::iter::Copied<std::slice::Iter<'static, Direction>> {
        [NorthEast, SouthEast, SouthWest, NorthWest].iter().copied()
    }

    pub fn all() -> std::iter::Copied<std::slice::Iter<'static, Direction>> {
        [North, NorthEast, East, SouthEast, South, SouthWest, West, NorthWest]
            .iter()
            .copied()
    }

    /// Table row for this direction.
    #[inline(always)]
    pub fn entry(self) -> &'static DirectionEntry {
        &DIRECTION_TABLE[self as usize]
    }

    #[inline(always)]
    pub fn vector(self) -> IVec2 {
        self.entry().offset
    }

    #[inline(always)]
    pub fn cost(self) -> f32 {
        self.entry().cost
    }

    pub fn is_diagonal(self) -> bool {
        matches!(self, NorthEast | SouthEast | SouthWest | NorthWest)
    }

    pub fn opposite(self) -> Direction {
        match self {
            North => South,
            NorthEast => SouthWest,
            East => West,
            SouthEast => NorthWest,
            South => North,
            SouthWest => NorthEast,
            West => East,
            NorthWest => SouthEast,
        }
    }

    /// Direction of a vector, using only the sign of each axis.
    /// Returns `None` for the zero vector.
    pub fn from_vector(v: IVec2) -> Option<Direction> {
        let sign = v.signum();
        DIRECTION_TABLE
            .iter()
            .find(|entry| entry.offset == sign)
            .map(|entry| entry.direction)
    }

    /// Direction of a single step between two adjacent cells.
    pub fn between(from: IVec2, to: IVec2) -> Option<Direction> {
        let delta = to - from;
        if delta.x.abs() > 1 || delta.y.abs() > 1 {
            return None;
        }
        Direction::from_vector(delta)
    }
}

/// Octile distance using the table costs. Admissible for any cell cost of at least 1.0.
#[inline(always)]
pub fn octile_distance(from: IVec2, to: IVec2) -> f32 {
    let dx = (from.x - to.x).unsigned_abs() as f32;
    let dy = (from.y - to.y).unsigned_abs() as f32;
    let (min, max) = if dx < dy { (dx, dy) } else { (dy, dx) };
    DIAGONAL_COST * min + CARDINAL_COST * (max - min)
}

/// Manhattan distance, used when diagonal steps are disabled.
#[inline(always)]
pub fn manhattan_distance(from: IVec2, to: IVec2) -> f32 {
    ((from.x - to.x).unsigned_abs() + (from.y - to.y).unsigned_abs()) as f32 * CARDINAL_COST
}
