//! Spatial occupancy grid for the arena.
//!
//! The arena is cut into square cells. Each cell is classified by a
//! [`CellType`], and the grid keeps the single authoritative mapping from
//! combatant to cell. Every occupancy change goes through
//! [`CombatGrid::register_entity`], [`CombatGrid::move_entity`] or
//! [`CombatGrid::remove_entity`], so the two views can never disagree.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::combatant::EntityId;
use crate::config::ArenaConfig;
use crate::math::{Fixed, Vec2Fixed, HALF, SQRT_2};

/// Row/column address of a cell. May be out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridCoord {
    /// Row index (y axis).
    pub row: i32,
    /// Column index (x axis).
    pub col: i32,
}

impl GridCoord {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Coordinate shifted by a row/column delta.
    #[must_use]
    pub const fn offset(self, d_row: i32, d_col: i32) -> Self {
        Self::new(self.row + d_row, self.col + d_col)
    }

    /// `max(|dr|, |dc|)`.
    #[must_use]
    pub const fn chebyshev(self, other: Self) -> u32 {
        let dr = self.row.abs_diff(other.row);
        let dc = self.col.abs_diff(other.col);
        if dr > dc {
            dr
        } else {
            dc
        }
    }

    /// `|dr| + |dc|`.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Classification of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Free floor.
    #[default]
    Empty,
    /// Holds exactly one combatant.
    Occupied,
    /// Wall or rock. Blocks movement and sight.
    Obstacle,
    /// Returned for coordinates outside the arena.
    OutOfBounds,
    /// Dangerous floor. Blocks movement.
    Hazard,
    /// Low barrier. Blocks movement, grants cover, does not block sight.
    Cover,
}

impl CellType {
    /// True for static terrain that nobody may step on or cut past.
    #[must_use]
    pub const fn is_terrain_blocker(self) -> bool {
        !matches!(self, Self::Empty | Self::Occupied)
    }

    /// True if the cell blocks line of sight.
    #[must_use]
    pub const fn blocks_sight(self) -> bool {
        matches!(self, Self::Obstacle | Self::OutOfBounds)
    }

    /// True if the cell shelters a neighbour.
    #[must_use]
    pub const fn provides_cover(self) -> bool {
        matches!(self, Self::Obstacle | Self::Cover)
    }
}

/// The eight neighbour offsets, clockwise from north.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, 0),  // North
    (-1, 1),  // Northeast
    (0, 1),   // East
    (1, 1),   // Southeast
    (1, 0),   // South
    (1, -1),  // Southwest
    (0, -1),  // West
    (-1, -1), // Northwest
];

/// Occupancy map of the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatGrid {
    rows: i32,
    cols: i32,
    #[serde(with = "crate::math::fixed_serde")]
    cell_size: Fixed,
    #[serde(with = "crate::math::fixed_serde")]
    width: Fixed,
    #[serde(with = "crate::math::fixed_serde")]
    height: Fixed,
    /// Row-major cell classification.
    cells: Vec<CellType>,
    entity_cells: HashMap<EntityId, GridCoord>,
    cell_entities: HashMap<GridCoord, EntityId>,
}

impl CombatGrid {
    /// Create an empty grid covering `width_px` × `height_px`.
    ///
    /// The number of columns and rows is rounded up so the whole arena
    /// is covered.
    ///
    /// # Panics
    ///
    /// Panics if any dimension is zero.
    #[must_use]
    pub fn new(width_px: u32, height_px: u32, cell_size_px: u32) -> Self {
        assert!(width_px > 0, "CombatGrid width must be positive");
        assert!(height_px > 0, "CombatGrid height must be positive");
        assert!(cell_size_px > 0, "CombatGrid cell size must be positive");

        let cols = width_px.div_ceil(cell_size_px) as i32;
        let rows = height_px.div_ceil(cell_size_px) as i32;
        Self {
            rows,
            cols,
            cell_size: Fixed::from_num(cell_size_px),
            width: Fixed::from_num(width_px),
            height: Fixed::from_num(height_px),
            cells: vec![CellType::Empty; (rows * cols) as usize],
            entity_cells: HashMap::new(),
            cell_entities: HashMap::new(),
        }
    }

    /// Create a grid from arena configuration.
    ///
    /// Out-of-range dimensions are clamped (see [`ArenaConfig::clamped`])
    /// rather than rejected.
    #[must_use]
    pub fn from_config(config: &ArenaConfig) -> Self {
        let arena = config.clamped();
        Self::new(arena.width_px, arena.height_px, arena.cell_size_px)
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> i32 {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> i32 {
        self.cols
    }

    /// Cell edge length in pixels.
    #[must_use]
    pub const fn cell_size(&self) -> Fixed {
        self.cell_size
    }

    /// Check if coordinates are within grid bounds.
    #[must_use]
    pub const fn in_bounds(&self, coord: GridCoord) -> bool {
        coord.row >= 0 && coord.row < self.rows && coord.col >= 0 && coord.col < self.cols
    }

    /// True if the pixel lies inside the arena rectangle.
    #[must_use]
    pub fn contains_pixel(&self, pos: Vec2Fixed) -> bool {
        pos.x >= Fixed::ZERO && pos.y >= Fixed::ZERO && pos.x < self.width && pos.y < self.height
    }

    #[inline]
    fn index(&self, coord: GridCoord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some((coord.row * self.cols + coord.col) as usize)
        } else {
            None
        }
    }

    /// Cell containing a pixel, clamped to the grid.
    #[must_use]
    pub fn cell_coords(&self, pos: Vec2Fixed) -> GridCoord {
        // to_num rounds towards negative infinity, so -0.5 lands in -1 and clamps to 0.
        let col = (pos.x / self.cell_size).to_num::<i32>();
        let row = (pos.y / self.cell_size).to_num::<i32>();
        GridCoord::new(row.clamp(0, self.rows - 1), col.clamp(0, self.cols - 1))
    }

    /// Pixel position of a cell's centre.
    #[must_use]
    pub fn pixel_center(&self, coord: GridCoord) -> Vec2Fixed {
        let half = self.cell_size * HALF;
        Vec2Fixed::new(
            Fixed::from_num(coord.col) * self.cell_size + half,
            Fixed::from_num(coord.row) * self.cell_size + half,
        )
    }

    /// Cell classification. Out-of-range coordinates report `OutOfBounds`.
    #[must_use]
    pub fn cell_type(&self, coord: GridCoord) -> CellType {
        self.index(coord)
            .map_or(CellType::OutOfBounds, |index| self.cells[index])
    }

    /// Set static terrain.
    ///
    /// Returns `false` for out-of-range coordinates, occupied cells, and
    /// attempts to write `Occupied` or `OutOfBounds` directly.
    pub fn set_cell_type(&mut self, coord: GridCoord, cell_type: CellType) -> bool {
        if matches!(cell_type, CellType::Occupied | CellType::OutOfBounds) {
            return false;
        }
        let Some(index) = self.index(coord) else {
            return false;
        };
        if self.cells[index] == CellType::Occupied {
            return false;
        }
        self.cells[index] = cell_type;
        true
    }

    /// In-bounds 8-connected neighbours of a cell that are `Empty`.
    #[must_use]
    pub fn neighbors(&self, coord: GridCoord) -> Vec<GridCoord> {
        NEIGHBOR_OFFSETS
            .iter()
            .map(|&(dr, dc)| coord.offset(dr, dc))
            .filter(|&next| self.cell_type(next) == CellType::Empty)
            .collect()
    }

    /// Cost of stepping between two adjacent cells.
    ///
    /// `1` orthogonally, `√2` diagonally, `Fixed::MAX` when the destination
    /// is not `Empty` or the cells are not adjacent.
    #[must_use]
    pub fn step_cost(&self, from: GridCoord, to: GridCoord) -> Fixed {
        if from.chebyshev(to) != 1 || self.cell_type(to) != CellType::Empty {
            return Fixed::MAX;
        }
        if from.row != to.row && from.col != to.col {
            SQRT_2
        } else {
            Fixed::ONE
        }
    }

    /// Put an entity on the grid at the cell containing `position`.
    ///
    /// Fails if the pixel is outside the arena or the cell is not `Empty`.
    /// On success `position` is snapped to the cell centre. An entity that
    /// is already registered is moved instead.
    pub fn register_entity(&mut self, entity: EntityId, position: &mut Vec2Fixed) -> bool {
        if self.entity_cells.contains_key(&entity) {
            return self.move_entity(entity, position);
        }
        if !self.contains_pixel(*position) {
            return false;
        }
        let coord = self.cell_coords(*position);
        if self.cell_type(coord) != CellType::Empty {
            return false;
        }

        self.occupy(entity, coord);
        *position = self.pixel_center(coord);
        true
    }

    /// Move a registered entity to the cell containing `position`.
    ///
    /// A no-op success when the cell is unchanged. Fails without touching
    /// any state when the destination is outside the arena or not `Empty`.
    /// Unknown entities are registered.
    pub fn move_entity(&mut self, entity: EntityId, position: &mut Vec2Fixed) -> bool {
        let Some(&current) = self.entity_cells.get(&entity) else {
            return self.register_entity(entity, position);
        };
        if !self.contains_pixel(*position) {
            return false;
        }
        let coord = self.cell_coords(*position);
        if coord == current {
            return true;
        }
        if self.cell_type(coord) != CellType::Empty {
            return false;
        }

        self.vacate(entity, current);
        self.occupy(entity, coord);
        *position = self.pixel_center(coord);
        true
    }

    /// Take an entity off the grid. Returns `false` if it was not on it.
    pub fn remove_entity(&mut self, entity: EntityId) -> bool {
        match self.entity_cells.get(&entity).copied() {
            Some(coord) => {
                self.vacate(entity, coord);
                true
            }
            None => false,
        }
    }

    fn occupy(&mut self, entity: EntityId, coord: GridCoord) {
        if let Some(index) = self.index(coord) {
            self.cells[index] = CellType::Occupied;
        }
        self.entity_cells.insert(entity, coord);
        self.cell_entities.insert(coord, entity);
    }

    fn vacate(&mut self, entity: EntityId, coord: GridCoord) {
        if let Some(index) = self.index(coord) {
            self.cells[index] = CellType::Empty;
        }
        self.entity_cells.remove(&entity);
        self.cell_entities.remove(&coord);
    }

    /// Cell currently held by an entity.
    #[must_use]
    pub fn cell_of(&self, entity: EntityId) -> Option<GridCoord> {
        self.entity_cells.get(&entity).copied()
    }

    /// Entity standing on a cell.
    #[must_use]
    pub fn entity_at(&self, coord: GridCoord) -> Option<EntityId> {
        self.cell_entities.get(&coord).copied()
    }

    /// Number of entities on the grid.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entity_cells.len()
    }

    /// True if the pixel is inside the arena and its cell is `Empty`.
    #[must_use]
    pub fn is_position_free(&self, pos: Vec2Fixed) -> bool {
        self.contains_pixel(pos) && self.cell_type(self.cell_coords(pos)) == CellType::Empty
    }

    /// Closest `Empty` cell to `origin`, searching Chebyshev rings out to
    /// `max_radius`. Within a ring, cells are scanned row by row.
    #[must_use]
    pub fn nearest_free_cell(&self, origin: GridCoord, max_radius: i32) -> Option<GridCoord> {
        (0..=max_radius).find_map(|radius| {
            ring(origin, radius).find(|&coord| self.cell_type(coord) == CellType::Empty)
        })
    }

    /// Centre of the closest `Empty` cell to a pixel.
    #[must_use]
    pub fn nearest_free_position(&self, pos: Vec2Fixed, max_radius: i32) -> Option<Vec2Fixed> {
        self.nearest_free_cell(self.cell_coords(pos), max_radius)
            .map(|coord| self.pixel_center(coord))
    }

    /// True if both entities are on the grid in touching cells.
    #[must_use]
    pub fn are_adjacent(&self, a: EntityId, b: EntityId) -> bool {
        match (self.cell_of(a), self.cell_of(b)) {
            (Some(ca), Some(cb)) => ca.chebyshev(cb) == 1,
            _ => false,
        }
    }

    /// Manhattan distance in cells between two registered entities.
    #[must_use]
    pub fn grid_distance(&self, a: EntityId, b: EntityId) -> Option<u32> {
        Some(self.cell_of(a)?.manhattan(self.cell_of(b)?))
    }

    /// Number of cover-giving cells around a cell, and the number of
    /// in-bounds neighbours checked.
    #[must_use]
    pub fn cover_around(&self, coord: GridCoord) -> (u32, u32) {
        NEIGHBOR_OFFSETS
            .iter()
            .map(|&(dr, dc)| coord.offset(dr, dc))
            .filter(|&next| self.in_bounds(next))
            .fold((0, 0), |(cover, total), next| {
                let covered = u32::from(self.cell_type(next).provides_cover());
                (cover + covered, total + 1)
            })
    }

    /// Bresenham walk between two cells.
    ///
    /// Endpoints are ignored; any intermediate cell that blocks sight
    /// breaks the line. Combatants never block sight.
    #[must_use]
    pub fn line_of_sight(&self, from: GridCoord, to: GridCoord) -> bool {
        let dx = (to.col - from.col).abs();
        let dy = -(to.row - from.row).abs();
        let sx = if from.col < to.col { 1 } else { -1 };
        let sy = if from.row < to.row { 1 } else { -1 };
        let mut err = dx + dy;
        let mut col = from.col;
        let mut row = from.row;

        loop {
            if (col, row) == (to.col, to.row) {
                return true;
            }
            let current = GridCoord::new(row, col);
            if current != from && self.cell_type(current).blocks_sight() {
                return false;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                col += sx;
            }
            if e2 <= dx {
                err += dx;
                row += sy;
            }
        }
    }

    /// Check that the entity→cell and cell→entity maps agree with the
    /// cell classification.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        if self.entity_cells.len() != self.cell_entities.len() {
            return false;
        }
        let mapped = self.entity_cells.iter().all(|(&entity, &coord)| {
            self.cell_type(coord) == CellType::Occupied
                && self.cell_entities.get(&coord) == Some(&entity)
        });
        let occupied = self
            .cells
            .iter()
            .filter(|&&cell| cell == CellType::Occupied)
            .count();
        mapped && occupied == self.entity_cells.len()
    }
}

/// Cells at exactly Chebyshev distance `radius` from `origin`, row-major.
fn ring(origin: GridCoord, radius: i32) -> impl Iterator<Item = GridCoord> {
    (-radius..=radius).flat_map(move |dr| {
        (-radius..=radius)
            .filter(move |&dc| dr.abs() == radius || dc.abs() == radius)
            .map(move |dc| origin.offset(dr, dc))
    })
}

/// Cells on the ring of the given radius, in scan order.
#[must_use]
pub fn ring_cells(origin: GridCoord, radius: i32) -> Vec<GridCoord> {
    ring(origin, radius).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    fn grid() -> CombatGrid {
        CombatGrid::new(400, 200, 40)
    }

    #[test]
    fn test_grid_dimensions_round_up() {
        let g = CombatGrid::new(410, 200, 40);
        assert_eq!(g.cols(), 11);
        assert_eq!(g.rows(), 5);
    }

    #[test]
    fn test_from_config_clamps_bad_dimensions() {
        let g = CombatGrid::from_config(&ArenaConfig {
            width_px: 0,
            height_px: 80,
            cell_size_px: 0,
        });
        assert_eq!(g.cols(), 1);
        assert_eq!(g.rows(), 80);
    }

    #[test]
    fn test_cell_coords_clamped() {
        let g = grid();
        assert_eq!(g.cell_coords(px(45, 85)), GridCoord::new(2, 1));
        assert_eq!(g.cell_coords(px(-30, -30)), GridCoord::new(0, 0));
        assert_eq!(g.cell_coords(px(5000, 5000)), GridCoord::new(4, 9));
    }

    #[test]
    fn test_pixel_center() {
        let g = grid();
        assert_eq!(g.pixel_center(GridCoord::new(0, 0)), px(20, 20));
        assert_eq!(g.pixel_center(GridCoord::new(2, 3)), px(140, 100));
    }

    #[test]
    fn test_out_of_bounds_cell_type() {
        let g = grid();
        assert_eq!(g.cell_type(GridCoord::new(-1, 0)), CellType::OutOfBounds);
        assert_eq!(g.cell_type(GridCoord::new(0, 10)), CellType::OutOfBounds);
        assert_eq!(g.cell_type(GridCoord::new(0, 0)), CellType::Empty);
    }

    #[test]
    fn test_register_snaps_to_center() {
        let mut g = grid();
        let mut pos = px(47, 51);
        assert!(g.register_entity(1, &mut pos));
        assert_eq!(pos, px(60, 60));
        assert_eq!(g.cell_of(1), Some(GridCoord::new(1, 1)));
        assert_eq!(g.cell_type(GridCoord::new(1, 1)), CellType::Occupied);
        assert!(g.is_consistent());
    }

    #[test]
    fn test_register_rejects_non_empty_cell() {
        let mut g = grid();
        g.set_cell_type(GridCoord::new(0, 0), CellType::Obstacle);
        let mut pos = px(10, 10);
        assert!(!g.register_entity(1, &mut pos));
        assert_eq!(pos, px(10, 10));

        let mut first = px(100, 100);
        assert!(g.register_entity(2, &mut first));
        let mut second = px(110, 110);
        assert!(!g.register_entity(3, &mut second));
        assert_eq!(g.entity_at(GridCoord::new(2, 2)), Some(2));
    }

    #[test]
    fn test_register_outside_arena_fails() {
        let mut g = grid();
        let mut pos = px(-5, 10);
        assert!(!g.register_entity(1, &mut pos));
        assert_eq!(g.entity_count(), 0);
    }

    #[test]
    fn test_move_same_cell_is_noop() {
        let mut g = grid();
        let mut pos = px(20, 20);
        assert!(g.register_entity(1, &mut pos));
        let mut nudged = px(25, 30);
        assert!(g.move_entity(1, &mut nudged));
        assert_eq!(nudged, px(25, 30));
        assert_eq!(g.cell_of(1), Some(GridCoord::new(0, 0)));
    }

    #[test]
    fn test_move_into_occupied_rejected() {
        let mut g = grid();
        let mut a = px(20, 20);
        let mut b = px(60, 20);
        assert!(g.register_entity(1, &mut a));
        assert!(g.register_entity(2, &mut b));

        let mut target = px(65, 25);
        assert!(!g.move_entity(1, &mut target));
        assert_eq!(target, px(65, 25));
        assert_eq!(g.cell_of(1), Some(GridCoord::new(0, 0)));
        assert_eq!(g.cell_of(2), Some(GridCoord::new(0, 1)));
        assert!(g.is_consistent());
    }

    #[test]
    fn test_move_frees_old_cell() {
        let mut g = grid();
        let mut pos = px(20, 20);
        assert!(g.register_entity(1, &mut pos));
        let mut next = px(100, 100);
        assert!(g.move_entity(1, &mut next));
        assert_eq!(g.cell_type(GridCoord::new(0, 0)), CellType::Empty);
        assert_eq!(g.entity_at(GridCoord::new(0, 0)), None);
        assert_eq!(g.entity_at(GridCoord::new(2, 2)), Some(1));
        assert!(g.is_consistent());
    }

    #[test]
    fn test_remove_entity() {
        let mut g = grid();
        let mut pos = px(20, 20);
        assert!(g.register_entity(1, &mut pos));
        assert!(g.remove_entity(1));
        assert!(!g.remove_entity(1));
        assert_eq!(g.cell_type(GridCoord::new(0, 0)), CellType::Empty);
        assert!(g.is_consistent());
    }

    #[test]
    fn test_set_cell_type_rules() {
        let mut g = grid();
        let mut pos = px(20, 20);
        assert!(g.register_entity(1, &mut pos));
        assert!(!g.set_cell_type(GridCoord::new(0, 0), CellType::Obstacle));
        assert!(!g.set_cell_type(GridCoord::new(1, 1), CellType::Occupied));
        assert!(!g.set_cell_type(GridCoord::new(-1, 1), CellType::Cover));
        assert!(g.set_cell_type(GridCoord::new(1, 1), CellType::Hazard));
    }

    #[test]
    fn test_neighbors_only_empty() {
        let mut g = grid();
        g.set_cell_type(GridCoord::new(1, 2), CellType::Obstacle);
        let mut pos = px(100, 20);
        assert!(g.register_entity(7, &mut pos));

        let around = g.neighbors(GridCoord::new(1, 1));
        assert_eq!(around.len(), 6);
        assert!(!around.contains(&GridCoord::new(1, 2)));
        assert!(!around.contains(&GridCoord::new(0, 2)));

        // Corner cell only has three in-bounds neighbours.
        assert_eq!(g.neighbors(GridCoord::new(0, 0)).len(), 3);
    }

    #[test]
    fn test_step_costs() {
        let mut g = grid();
        let origin = GridCoord::new(1, 1);
        assert_eq!(g.step_cost(origin, GridCoord::new(1, 2)), Fixed::ONE);
        assert_eq!(g.step_cost(origin, GridCoord::new(2, 2)), SQRT_2);
        assert_eq!(g.step_cost(origin, GridCoord::new(3, 3)), Fixed::MAX);
        g.set_cell_type(GridCoord::new(0, 1), CellType::Hazard);
        assert_eq!(g.step_cost(origin, GridCoord::new(0, 1)), Fixed::MAX);
        assert_eq!(g.step_cost(GridCoord::new(0, 0), GridCoord::new(-1, 0)), Fixed::MAX);
    }

    #[test]
    fn test_nearest_free_position() {
        let mut g = grid();
        let mut pos = px(100, 100);
        assert!(g.register_entity(1, &mut pos));
        let free = g.nearest_free_position(px(100, 100), 3).unwrap();
        assert_eq!(g.cell_coords(free).chebyshev(GridCoord::new(2, 2)), 1);
        assert_eq!(g.nearest_free_position(px(20, 20), 0), Some(px(20, 20)));
    }

    #[test]
    fn test_adjacency_and_distance() {
        let mut g = grid();
        let mut a = px(20, 20);
        let mut b = px(60, 60);
        let mut c = px(140, 20);
        assert!(g.register_entity(1, &mut a));
        assert!(g.register_entity(2, &mut b));
        assert!(g.register_entity(3, &mut c));
        assert!(g.are_adjacent(1, 2));
        assert!(!g.are_adjacent(1, 3));
        assert_eq!(g.grid_distance(1, 2), Some(2));
        assert_eq!(g.grid_distance(1, 3), Some(3));
        assert_eq!(g.grid_distance(1, 99), None);
    }

    #[test]
    fn test_cover_around() {
        let mut g = grid();
        g.set_cell_type(GridCoord::new(0, 1), CellType::Cover);
        g.set_cell_type(GridCoord::new(1, 0), CellType::Obstacle);
        g.set_cell_type(GridCoord::new(1, 1), CellType::Hazard);
        assert_eq!(g.cover_around(GridCoord::new(0, 0)), (2, 3));
        assert_eq!(g.cover_around(GridCoord::new(3, 5)), (0, 8));
    }

    #[test]
    fn test_line_of_sight() {
        let mut g = grid();
        let from = GridCoord::new(2, 0);
        let to = GridCoord::new(2, 6);
        assert!(g.line_of_sight(from, to));

        g.set_cell_type(GridCoord::new(2, 3), CellType::Cover);
        assert!(g.line_of_sight(from, to));

        g.set_cell_type(GridCoord::new(2, 3), CellType::Obstacle);
        assert!(!g.line_of_sight(from, to));
        assert!(!g.line_of_sight(to, from));

        // Blocked endpoints do not matter.
        assert!(g.line_of_sight(GridCoord::new(2, 2), GridCoord::new(2, 3)));
    }

    #[test]
    fn test_ring_cells() {
        assert_eq!(ring_cells(GridCoord::new(5, 5), 0), vec![GridCoord::new(5, 5)]);
        assert_eq!(ring_cells(GridCoord::new(5, 5), 1).len(), 8);
        assert_eq!(ring_cells(GridCoord::new(5, 5), 2).len(), 16);
    }
}
