//! `NavCell` holds the static navigation data for a single grid cell.

/// Cost byte for a cell with normal movement cost.
pub const NORMAL_COST: u8 = 0;
/// Cost byte reserved for a blocked cell.
pub const BLOCKED_COST: u8 = 255;

/// Static walkability and movement cost for a position in the [`crate::grid::NavGrid`].
///
/// The cost byte is a slowdown factor: `0` moves at full speed, higher values are slower
/// and `255` can never be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NavCell {
    pub(crate) walkable: bool,
    pub(crate) cost: u8,
}

impl NavCell {
    pub fn new(walkable: bool, cost: u8) -> Self {
        Self { walkable, cost }
    }

    pub fn impassable() -> Self {
        Self {
            walkable: false,
            cost: NORMAL_COST,
        }
    }

    /// Is this cell passable on the static layer?
    #[inline(always)]
    pub fn is_walkable(&self) -> bool {
        self.walkable && self.cost != BLOCKED_COST
    }

    pub fn cost(&self) -> u8 {
        self.cost
    }

    /// Multiplier applied to a step entering this cell. `1.0` for a normal cell,
    /// `f32::INFINITY` when the cell is blocked.
    #[inline(always)]
    pub fn movement_cost(&self) -> f32 {
        if !self.is_walkable() {
            return f32::INFINITY;
        }
        255.0 / (255 - self.cost) as f32
    }

    /// Single byte form used by grid snapshots.
    pub(crate) fn to_byte(self) -> u8 {
        if self.walkable {
            self.cost
        } else {
            BLOCKED_COST
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Self {
        if byte == BLOCKED_COST {
            NavCell::impassable()
        } else {
            NavCell::new(true, byte)
        }
    }
}

impl Default for NavCell {
    fn default() -> Self {
        Self {
            walkable: true,
            cost: NORMAL_COST,
        }
    }
}
