//! This module contains the `NavGrid` resource, the authoritative walkability, cost
//! and occupancy store for one map.
use bevy::{log::warn, math::IVec2, prelude::Resource};
use ndarray::Array2;
use rustc_hash::FxHashMap;

use crate::{
    bits::BitMask,
    error::NavError,
    nav::{NavCell, NORMAL_COST},
    OccupantId, FREE_OCCUPANT,
};

/// Defaults for initializing the grid cells.
#[derive(Copy, Clone, Debug)]
pub struct NavSettings {
    /// The default cost byte for each cell in the grid.
    pub default_cost: u8,
    /// If true, the default cells will be solid and block movement.
    pub default_impassable: bool,
}

impl Default for NavSettings {
    fn default() -> Self {
        NavSettings {
            default_cost: NORMAL_COST,
            default_impassable: false,
        }
    }
}

/// Holder for grid settings, produced by [`GridSettingsBuilder`].
#[derive(Clone, Debug)]
pub struct GridSettings {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) nav_settings: NavSettings,
}

/// Builder for [`GridSettings`].
///
/// Example usage:
/// ```
/// use bevy_gridnav::prelude::*;
///
/// let settings = GridSettingsBuilder::new(64, 64)
///     .default_cost(0)
///     .build();
///
/// let grid = NavGrid::new(&settings);
/// assert_eq!(grid.len(), 64 * 64);
/// ```
#[derive(Clone, Debug)]
pub struct GridSettingsBuilder {
    width: u32,
    height: u32,
    nav_settings: NavSettings,
}

impl GridSettingsBuilder {
    /// Start a builder for a grid of the given width and height.
    pub fn new(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            panic!("Width and height must be at least 1");
        }

        GridSettingsBuilder {
            width,
            height,
            nav_settings: NavSettings::default(),
        }
    }

    /// Default cost byte for each cell in the grid.
    pub fn default_cost(mut self, cost: u8) -> Self {
        self.nav_settings.default_cost = cost;
        self
    }

    /// Sets the default cells in the grid to be impassable.
    pub fn default_impassable(mut self) -> Self {
        self.nav_settings.default_impassable = true;
        self
    }

    /// Pass in [`NavSettings`] directly instead of the individual setters.
    pub fn nav_settings(mut self, nav_settings: NavSettings) -> Self {
        self.nav_settings = nav_settings;
        self
    }

    pub fn build(self) -> GridSettings {
        GridSettings {
            width: self.width,
            height: self.height,
            nav_settings: self.nav_settings,
        }
    }
}

/// `NavGrid` is the main `Resource` of the crate.
///
/// Cells are addressed by `(x, y)` or by their cell-major index `y * width + x`.
/// Walkability is the combination of a static layer (authored map data) and a dynamic
/// obstacle layer that can be cleared independently. Occupancy is tracked separately:
/// a cell can be walkable and still be held by another agent.
#[derive(Resource, Debug, Clone)]
pub struct NavGrid {
    width: u32,
    height: u32,
    // Shape is (height, width) so row-major storage order matches the cell index.
    cells: Array2<NavCell>,
    dynamic: BitMask,
    occupants: Vec<OccupantId>,
    occupant_cells: FxHashMap<OccupantId, usize>,
}

impl NavGrid {
    /// Creates a new [`NavGrid`] with the given [`GridSettings`].
    pub fn new(settings: &GridSettings) -> Self {
        let GridSettings {
            width,
            height,
            nav_settings,
        } = *settings;

        let default_cell = if nav_settings.default_impassable {
            NavCell::impassable()
        } else {
            NavCell::new(true, nav_settings.default_cost)
        };

        let len = width as usize * height as usize;

        Self {
            width,
            height,
            cells: Array2::from_elem((height as usize, width as usize), default_cell),
            dynamic: BitMask::new(len),
            occupants: vec![FREE_OCCUPANT; len],
            occupant_cells: FxHashMap::default(),
        }
    }

    /// Builds a grid from a static layer snapshot, see [`NavGrid::to_bytes`].
    pub fn from_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, NavError> {
        if width == 0 || height == 0 {
            return Err(NavError::ZeroDimensions { width, height });
        }

        let mut grid = NavGrid::new(&GridSettingsBuilder::new(width, height).build());
        grid.load_from_bytes(bytes)?;
        Ok(grid)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells in the grid.
    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    /// Checks if a coordinate is within the bounds of the grid.
    #[inline(always)]
    pub fn is_valid_coord(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    #[inline(always)]
    pub fn in_bounds(&self, pos: IVec2) -> bool {
        self.is_valid_coord(pos.x, pos.y)
    }

    /// Cell index of an in-bounds coordinate. The result is meaningless for
    /// out-of-bounds input, check with [`NavGrid::is_valid_coord`] first.
    #[inline(always)]
    pub fn coord_to_index(&self, x: i32, y: i32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline(always)]
    pub fn index_to_coord(&self, index: usize) -> IVec2 {
        let width = self.width as usize;
        IVec2::new((index % width) as i32, (index / width) as i32)
    }

    #[inline(always)]
    pub(crate) fn pos_to_index(&self, pos: IVec2) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| self.coord_to_index(pos.x, pos.y))
    }

    #[inline(always)]
    fn cell(&self, index: usize) -> &NavCell {
        let width = self.width as usize;
        &self.cells[[index / width, index % width]]
    }

    #[inline(always)]
    fn cell_mut(&mut self, index: usize) -> &mut NavCell {
        let width = self.width as usize;
        &mut self.cells[[index / width, index % width]]
    }

    /// Gets the [`NavCell`] at a given position, `None` if out of bounds.
    pub fn nav_cell(&self, x: i32, y: i32) -> Option<NavCell> {
        self.is_valid_coord(x, y)
            .then(|| *self.cell(self.coord_to_index(x, y)))
    }

    /// Test if a cell is walkable on both the static and the dynamic layer.
    /// Out-of-bounds positions are never walkable.
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        if !self.is_valid_coord(x, y) {
            return false;
        }

        self.is_index_walkable(self.coord_to_index(x, y), false)
    }

    /// Test if a cell is walkable ignoring dynamic obstacles.
    pub fn is_walkable_static(&self, x: i32, y: i32) -> bool {
        if !self.is_valid_coord(x, y) {
            return false;
        }

        self.is_index_walkable(self.coord_to_index(x, y), true)
    }

    #[inline(always)]
    pub(crate) fn is_index_walkable(&self, index: usize, ignore_dynamic: bool) -> bool {
        self.cell(index).is_walkable() && (ignore_dynamic || !self.dynamic.get(index))
    }

    /// Set the static walkability of a cell. Out-of-bounds positions are ignored.
    pub fn set_walkable(&mut self, x: i32, y: i32, walkable: bool) {
        if !self.is_valid_coord(x, y) {
            warn!("Attempted to set walkable at out-of-bounds position ({}, {})", x, y);
            return;
        }

        let index = self.coord_to_index(x, y);
        self.cell_mut(index).walkable = walkable;
    }

    /// Set the cost byte of a cell. `255` blocks the cell.
    pub fn set_cost(&mut self, x: i32, y: i32, cost: u8) {
        if !self.is_valid_coord(x, y) {
            warn!("Attempted to set cost at out-of-bounds position ({}, {})", x, y);
            return;
        }

        let index = self.coord_to_index(x, y);
        self.cell_mut(index).cost = cost;
    }

    /// Movement cost multiplier for entering a cell: `1.0` for a normal cell,
    /// `f32::INFINITY` for blocked or out-of-bounds cells. Dynamic obstacles are not
    /// part of the cost.
    pub fn movement_cost(&self, x: i32, y: i32) -> f32 {
        if !self.is_valid_coord(x, y) {
            return f32::INFINITY;
        }

        self.cell(self.coord_to_index(x, y)).movement_cost()
    }

    #[inline(always)]
    pub(crate) fn index_movement_cost(&self, index: usize) -> f32 {
        self.cell(index).movement_cost()
    }

    /// Sets the static walkability of every cell in the inclusive rectangle `min..=max`,
    /// clipped to the grid.
    pub fn set_rectangle(&mut self, min: IVec2, max: IVec2, walkable: bool) {
        let indices: Vec<usize> = self.rectangle_indices(min, max).collect();
        for index in indices {
            self.cell_mut(index).walkable = walkable;
        }
    }

    /// Sets the static walkability of every cell within `radius` (Euclidean) of the center.
    pub fn set_circle(&mut self, cx: i32, cy: i32, radius: u32, walkable: bool) {
        let r = Self::clamp_radius(radius);
        let r2 = i64::from(r) * i64::from(r);
        let indices: Vec<usize> = self
            .rectangle_indices(
                IVec2::new(cx.saturating_sub(r), cy.saturating_sub(r)),
                IVec2::new(cx.saturating_add(r), cy.saturating_add(r)),
            )
            .collect();

        for index in indices {
            let pos = self.index_to_coord(index);
            let dx = i64::from(pos.x) - i64::from(cx);
            let dy = i64::from(pos.y) - i64::from(cy);
            if (dx * dx).saturating_add(dy * dy) <= r2 {
                self.cell_mut(index).walkable = walkable;
            }
        }
    }

    // Shape bounds saturate and are clipped to the grid, so only the cast needs a cap.
    fn clamp_radius(radius: u32) -> i32 {
        radius.min(i32::MAX as u32) as i32
    }

    fn rectangle_indices(&self, min: IVec2, max: IVec2) -> impl Iterator<Item = usize> + '_ {
        let lo = min.min(max).max(IVec2::ZERO);
        let hi = min
            .max(max)
            .min(IVec2::new(self.width as i32 - 1, self.height as i32 - 1));

        (lo.y..=hi.y).flat_map(move |y| (lo.x..=hi.x).map(move |x| self.coord_to_index(x, y)))
    }

    /// Blocks every cell within Chebyshev `radius` of `(x, y)` on the dynamic layer.
    /// A radius of zero blocks the single cell.
    pub fn add_dynamic_obstacle(&mut self, x: i32, y: i32, radius: u32) {
        self.set_dynamic_square(x, y, radius, true);
    }

    /// Clears the dynamic layer within Chebyshev `radius` of `(x, y)`.
    pub fn remove_dynamic_obstacle(&mut self, x: i32, y: i32, radius: u32) {
        self.set_dynamic_square(x, y, radius, false);
    }

    /// Clears the whole dynamic layer, leaving the static layer untouched.
    pub fn clear_dynamic_obstacles(&mut self) {
        self.dynamic.clear();
    }

    /// Test if a cell is blocked on the dynamic layer.
    pub fn is_dynamic_obstacle(&self, x: i32, y: i32) -> bool {
        self.is_valid_coord(x, y) && self.dynamic.get(self.coord_to_index(x, y))
    }

    /// Number of cells currently blocked on the dynamic layer.
    pub fn dynamic_obstacle_count(&self) -> usize {
        self.dynamic.count_ones()
    }

    fn set_dynamic_square(&mut self, x: i32, y: i32, radius: u32, blocked: bool) {
        let r = Self::clamp_radius(radius);
        let indices: Vec<usize> = self
            .rectangle_indices(
                IVec2::new(x.saturating_sub(r), y.saturating_sub(r)),
                IVec2::new(x.saturating_add(r), y.saturating_add(r)),
            )
            .collect();
        for index in indices {
            self.dynamic.set(index, blocked);
        }
    }

    /// The occupant of a cell, `None` if the cell is free or out of bounds.
    pub fn occupant(&self, pos: IVec2) -> Option<OccupantId> {
        let index = self.pos_to_index(pos)?;
        let id = self.occupants[index];
        (id != FREE_OCCUPANT).then_some(id)
    }

    pub fn is_occupied(&self, pos: IVec2) -> bool {
        self.occupant(pos).is_some()
    }

    #[inline(always)]
    pub(crate) fn index_occupant(&self, index: usize) -> OccupantId {
        self.occupants[index]
    }

    /// The cell currently held by an occupant.
    pub fn position_of(&self, id: OccupantId) -> Option<IVec2> {
        self.occupant_cells
            .get(&id)
            .map(|&index| self.index_to_coord(index))
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.occupant_cells.len()
    }

    /// Claims a cell for `id`.
    ///
    /// Fails if the cell is out of bounds, not walkable or held by a different id.
    /// Claiming a cell already held by the same id succeeds.
    pub fn try_occupy(&mut self, pos: IVec2, id: OccupantId) -> bool {
        if id == FREE_OCCUPANT {
            return false;
        }

        let Some(index) = self.pos_to_index(pos) else {
            return false;
        };

        let current = self.occupants[index];
        if current == id {
            return true;
        }

        if current != FREE_OCCUPANT || !self.is_index_walkable(index, false) {
            return false;
        }

        // An occupant holds exactly one cell.
        if let Some(previous) = self.occupant_cells.insert(id, index) {
            self.occupants[previous] = FREE_OCCUPANT;
        }
        self.occupants[index] = id;
        true
    }

    /// Frees a cell held by `id`. Fails if the cell is held by someone else or is free.
    pub fn release(&mut self, pos: IVec2, id: OccupantId) -> bool {
        let Some(index) = self.pos_to_index(pos) else {
            return false;
        };

        if id == FREE_OCCUPANT || self.occupants[index] != id {
            return false;
        }

        self.occupants[index] = FREE_OCCUPANT;
        self.occupant_cells.remove(&id);
        true
    }

    /// Moves `id` from `from` to `to` in one step.
    ///
    /// Either both cells change or neither does: the move fails if `from` is not held by
    /// `id`, or if `to` is out of bounds, not walkable or held by another id.
    pub fn try_move_occupancy(&mut self, from: IVec2, to: IVec2, id: OccupantId) -> bool {
        self.try_move_occupancy_with(from, to, id, false)
    }

    pub(crate) fn try_move_occupancy_with(
        &mut self,
        from: IVec2,
        to: IVec2,
        id: OccupantId,
        ignore_dynamic: bool,
    ) -> bool {
        let (Some(from_index), Some(to_index)) = (self.pos_to_index(from), self.pos_to_index(to))
        else {
            return false;
        };

        if id == FREE_OCCUPANT || self.occupants[from_index] != id {
            return false;
        }

        if from_index == to_index {
            return true;
        }

        if self.occupants[to_index] != FREE_OCCUPANT
            || !self.is_index_walkable(to_index, ignore_dynamic)
        {
            return false;
        }

        self.occupants[from_index] = FREE_OCCUPANT;
        self.occupants[to_index] = id;
        self.occupant_cells.insert(id, to_index);
        true
    }

    /// Snapshot of the static layer, one byte per cell in index order.
    /// `255` marks an unwalkable cell, any other value is the cost byte.
    /// Occupancy and dynamic obstacles are not included.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.cells.iter().map(|cell| cell.to_byte()).collect()
    }

    /// Replaces the static layer from a snapshot produced by [`NavGrid::to_bytes`].
    ///
    /// A length other than `width * height` means the persisted map is corrupt; the grid is
    /// left untouched and [`NavError::GridSizeMismatch`] is returned.
    pub fn load_from_bytes(&mut self, bytes: &[u8]) -> Result<(), NavError> {
        let expected = self.len();
        if bytes.len() != expected {
            return Err(NavError::GridSizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        for (cell, &byte) in self.cells.iter_mut().zip(bytes) {
            *cell = NavCell::from_byte(byte);
        }

        Ok(())
    }

    /// Number of statically walkable cells.
    pub fn walkable_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_walkable()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::BLOCKED_COST;

    fn grid(width: u32, height: u32) -> NavGrid {
        NavGrid::new(&GridSettingsBuilder::new(width, height).build())
    }

    #[test]
    fn test_new() {
        let grid = grid(12, 8);
        assert_eq!(grid.cells.shape(), [8, 12]);
        assert_eq!(grid.len(), 96);
        assert_eq!(grid.walkable_count(), 96);
    }

    #[test]
    fn test_default_impassable() {
        let grid = NavGrid::new(&GridSettingsBuilder::new(4, 4).default_impassable().build());
        assert_eq!(grid.walkable_count(), 0);
        assert!(!grid.is_walkable(1, 1));
    }

    #[test]
    fn test_coord_round_trip() {
        let grid = grid(13, 7);
        for y in 0..7 {
            for x in 0..13 {
                let index = grid.coord_to_index(x, y);
                assert_eq!(index, (y * 13 + x) as usize);
                assert_eq!(grid.index_to_coord(index), IVec2::new(x, y));
            }
        }
    }

    #[test]
    fn test_out_of_bounds_is_not_walkable() {
        let grid = grid(4, 4);
        assert!(!grid.is_walkable(-1, 0));
        assert!(!grid.is_walkable(0, -1));
        assert!(!grid.is_walkable(4, 0));
        assert!(!grid.is_walkable(0, 4));
        assert!(grid.movement_cost(9, 9).is_infinite());
        assert!(grid.nav_cell(4, 4).is_none());
    }

    #[test]
    fn test_set_cost() {
        let mut grid = grid(4, 4);
        assert_eq!(grid.movement_cost(1, 1), 1.0);

        grid.set_cost(1, 1, 170);
        assert_eq!(grid.movement_cost(1, 1), 3.0);
        assert!(grid.is_walkable(1, 1));

        grid.set_cost(1, 1, BLOCKED_COST);
        assert!(grid.movement_cost(1, 1).is_infinite());
        assert!(!grid.is_walkable(1, 1));
    }

    #[test]
    fn test_dynamic_layer_is_independent() {
        let mut grid = grid(10, 10);
        grid.set_walkable(5, 5, false);

        grid.add_dynamic_obstacle(2, 2, 1);
        assert_eq!(grid.dynamic_obstacle_count(), 9);
        assert!(!grid.is_walkable(1, 1));
        assert!(!grid.is_walkable(3, 3));
        assert!(grid.is_walkable(4, 4));
        assert!(grid.is_walkable_static(2, 2));

        grid.add_dynamic_obstacle(0, 0, 1);
        assert_eq!(grid.dynamic_obstacle_count(), 12);

        grid.remove_dynamic_obstacle(2, 2, 0);
        assert!(grid.is_walkable(2, 2));

        grid.clear_dynamic_obstacles();
        assert_eq!(grid.dynamic_obstacle_count(), 0);
        assert!(grid.is_walkable(1, 1));
        // Static geometry survives clearing the dynamic layer.
        assert!(!grid.is_walkable(5, 5));
    }

    #[test]
    fn test_bulk_helpers() {
        let mut grid = grid(10, 10);
        grid.set_rectangle(IVec2::new(8, 8), IVec2::new(12, 12), false);
        assert_eq!(grid.walkable_count(), 96);

        let mut grid = NavGrid::new(&GridSettingsBuilder::new(10, 10).build());
        grid.set_circle(5, 5, 1, false);
        assert_eq!(grid.walkable_count(), 95);
        assert!(!grid.is_walkable(5, 6));
        assert!(grid.is_walkable(6, 6));
    }

    #[test]
    fn test_bulk_helpers_huge_radius() {
        let mut grid = grid(10, 10);
        grid.set_circle(5, 5, 50_000, false);
        assert_eq!(grid.walkable_count(), 0);

        let mut grid = NavGrid::new(&GridSettingsBuilder::new(10, 10).build());
        grid.add_dynamic_obstacle(5, 5, u32::MAX);
        assert_eq!(grid.dynamic_obstacle_count(), 100);

        // Bounds saturate instead of wrapping around.
        grid.remove_dynamic_obstacle(i32::MAX, i32::MAX, u32::MAX);
        assert_eq!(grid.dynamic_obstacle_count(), 0);
        grid.add_dynamic_obstacle(i32::MAX, i32::MAX, 3);
        assert_eq!(grid.dynamic_obstacle_count(), 0);

        grid.set_circle(i32::MIN, i32::MIN, 3, false);
        assert_eq!(grid.walkable_count(), 100);

        // A huge radius reaches the grid from a center far outside it.
        grid.set_circle(-1000, 5, 50_000, false);
        assert_eq!(grid.walkable_count(), 0);
        grid.add_dynamic_obstacle(-1000, -1000, u32::MAX);
        assert_eq!(grid.dynamic_obstacle_count(), 100);
        // The nearest corner is about sqrt(2) * i32::MAX away, just out of reach.
        grid.set_circle(i32::MAX, i32::MAX, u32::MAX, true);
        assert_eq!(grid.walkable_count(), 0);
    }

    #[test]
    fn test_try_occupy() {
        let mut grid = grid(4, 4);
        let pos = IVec2::new(1, 1);

        assert!(grid.try_occupy(pos, 7));
        assert!(grid.try_occupy(pos, 7));
        assert!(!grid.try_occupy(pos, 8));
        assert_eq!(grid.occupant(pos), Some(7));
        assert_eq!(grid.position_of(7), Some(pos));

        assert!(!grid.try_occupy(IVec2::new(-1, 0), 8));
        grid.set_walkable(2, 2, false);
        assert!(!grid.try_occupy(IVec2::new(2, 2), 8));
        assert!(!grid.try_occupy(IVec2::new(0, 0), FREE_OCCUPANT));
    }

    #[test]
    fn test_occupant_holds_one_cell() {
        let mut grid = grid(4, 4);
        assert!(grid.try_occupy(IVec2::new(0, 0), 3));
        assert!(grid.try_occupy(IVec2::new(3, 3), 3));
        assert!(!grid.is_occupied(IVec2::new(0, 0)));
        assert_eq!(grid.occupied_count(), 1);
    }

    #[test]
    fn test_release_requires_owner() {
        let mut grid = grid(4, 4);
        let pos = IVec2::new(2, 1);
        assert!(grid.try_occupy(pos, 1));

        assert!(!grid.release(pos, 2));
        assert_eq!(grid.occupant(pos), Some(1));

        assert!(grid.release(pos, 1));
        assert_eq!(grid.occupant(pos), None);
        assert!(!grid.release(pos, 1));
    }

    #[test]
    fn test_move_occupancy_is_atomic() {
        let mut grid = grid(5, 5);
        let a = IVec2::new(0, 0);
        let b = IVec2::new(1, 0);
        let c = IVec2::new(2, 0);

        assert!(grid.try_occupy(a, 1));
        assert!(grid.try_occupy(c, 2));

        assert!(grid.try_move_occupancy(a, b, 1));
        assert_eq!(grid.occupant(a), None);
        assert_eq!(grid.occupant(b), Some(1));

        // Second mover into the same destination fails and changes nothing.
        assert!(!grid.try_move_occupancy(c, b, 2));
        assert_eq!(grid.occupant(b), Some(1));
        assert_eq!(grid.occupant(c), Some(2));

        // Unwalkable destination.
        grid.add_dynamic_obstacle(3, 0, 0);
        assert!(!grid.try_move_occupancy(c, IVec2::new(3, 0), 2));
        assert_eq!(grid.occupant(c), Some(2));
        assert!(grid.try_move_occupancy_with(c, IVec2::new(3, 0), 2, true));

        // A stale owner cannot move someone else's cell.
        assert!(!grid.try_move_occupancy(b, a, 9));
        assert_eq!(grid.occupant(b), Some(1));
        assert_eq!(grid.occupant(a), None);

        assert!(!grid.try_move_occupancy(b, IVec2::new(-1, 0), 1));
        assert_eq!(grid.occupant(b), Some(1));
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut grid = grid(6, 4);
        grid.set_walkable(0, 0, false);
        grid.set_walkable(5, 3, false);
        grid.set_cost(2, 2, 40);
        grid.add_dynamic_obstacle(3, 3, 0);
        grid.try_occupy(IVec2::new(1, 1), 4);

        let bytes = grid.to_bytes();
        assert_eq!(bytes.len(), 24);

        let mut loaded = NavGrid::new(&GridSettingsBuilder::new(6, 4).build());
        loaded.load_from_bytes(&bytes).unwrap();

        for y in 0..4 {
            for x in 0..6 {
                assert_eq!(loaded.is_walkable_static(x, y), grid.is_walkable_static(x, y));
                assert_eq!(loaded.movement_cost(x, y), grid.movement_cost(x, y));
            }
        }

        // Occupancy and dynamic obstacles are not part of the snapshot.
        assert_eq!(loaded.occupied_count(), 0);
        assert_eq!(loaded.dynamic_obstacle_count(), 0);

        let from_bytes = NavGrid::from_bytes(6, 4, &bytes).unwrap();
        assert_eq!(from_bytes.to_bytes(), bytes);
    }

    #[test]
    fn test_load_rejects_wrong_length() {
        let mut grid = grid(4, 4);
        grid.set_walkable(1, 1, false);

        let result = grid.load_from_bytes(&[0u8; 15]);
        assert_eq!(
            result,
            Err(NavError::GridSizeMismatch {
                expected: 16,
                actual: 15
            })
        );
        assert!(!grid.is_walkable(1, 1));

        assert!(NavGrid::from_bytes(4, 4, &[0u8; 17]).is_err());
        assert!(matches!(
            NavGrid::from_bytes(0, 4, &[]),
            Err(NavError::ZeroDimensions { .. })
        ));
    }
}
