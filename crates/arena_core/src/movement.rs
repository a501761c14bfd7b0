//! Per-combatant path following.
//!
//! The controller owns movement orders, not positions. Positions live in
//! a [`PositionStore`] (the battle's roster) and occupancy lives in the
//! [`CombatGrid`]; `update` writes both.
//!
//! Pixel positions are written every tick. Occupancy follows whenever the
//! mover enters a free cell and is settled on arrival, so the visual
//! position may sit one cell ahead of the logical one while another
//! combatant blocks the way.

use std::collections::HashMap;

use crate::combatant::EntityId;
use crate::grid::CombatGrid;
use crate::math::{Fixed, Vec2Fixed, HALF};
use crate::pathfinding::{advance_along, find_path, find_path_near, simplify_path, GOAL_SEARCH_RADIUS};

/// How far around an unreachable target the fallback looks for a free cell.
const FALLBACK_RADIUS: i32 = GOAL_SEARCH_RADIUS + 2;

/// Read/write access to combatant pixel positions.
pub trait PositionStore {
    /// Current position of `id`.
    fn position(&self, id: EntityId) -> Option<Vec2Fixed>;
    /// Overwrite the position of `id`. Unknown ids are ignored.
    fn set_position(&mut self, id: EntityId, position: Vec2Fixed);
}

impl PositionStore for HashMap<EntityId, Vec2Fixed> {
    fn position(&self, id: EntityId) -> Option<Vec2Fixed> {
        self.get(&id).copied()
    }

    fn set_position(&mut self, id: EntityId, position: Vec2Fixed) {
        if let Some(slot) = self.get_mut(&id) {
            *slot = position;
        }
    }
}

/// An active movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementOrder {
    /// Simplified waypoints.
    pub path: Vec<Vec2Fixed>,
    /// Position originally asked for.
    pub target: Vec2Fixed,
    /// Pixels per second.
    pub speed: Fixed,
    /// Index of the next waypoint not yet reached.
    pub next_waypoint: usize,
}

impl MovementOrder {
    /// Final waypoint.
    #[must_use]
    pub fn destination(&self) -> Option<Vec2Fixed> {
        self.path.last().copied()
    }
}

/// Moves combatants along simplified A* paths.
#[derive(Debug, Clone, Default)]
pub struct MovementController {
    orders: HashMap<EntityId, MovementOrder>,
    tolerance: Fixed,
}

impl MovementController {
    /// Controller that simplifies paths with the given tolerance in pixels.
    #[must_use]
    pub fn new(tolerance: Fixed) -> Self {
        Self {
            orders: HashMap::new(),
            tolerance,
        }
    }

    /// Path from `from` to `target` and start following it.
    ///
    /// An unreachable target is swapped for the nearest free cell around
    /// it before giving up. Returns `false` if no path exists; any
    /// previous order is kept in that case.
    pub fn start_movement(
        &mut self,
        grid: &CombatGrid,
        entity: EntityId,
        from: Vec2Fixed,
        target: Vec2Fixed,
        speed: Fixed,
    ) -> bool {
        let path = find_path(grid, from, target).or_else(|err| {
            let fallback = grid
                .nearest_free_position(target, FALLBACK_RADIUS)
                .ok_or(err)?;
            find_path(grid, from, fallback)
        });
        match path {
            Ok(path) => {
                self.install(entity, path, target, speed);
                true
            }
            Err(err) => {
                tracing::debug!(entity, %err, "movement rejected");
                false
            }
        }
    }

    /// Path to the free cell nearest the mover within `preferred_distance`
    /// pixels of `target_position`, instead of onto the target itself.
    pub fn move_towards_entity(
        &mut self,
        grid: &CombatGrid,
        mover: EntityId,
        from: Vec2Fixed,
        target_position: Vec2Fixed,
        preferred_distance: Fixed,
        speed: Fixed,
    ) -> bool {
        match find_path_near(grid, from, target_position, preferred_distance) {
            Ok(path) => {
                self.install(mover, path, target_position, speed);
                true
            }
            Err(err) => {
                tracing::debug!(entity = mover, %err, "approach rejected");
                false
            }
        }
    }

    fn install(&mut self, entity: EntityId, path: Vec<Vec2Fixed>, target: Vec2Fixed, speed: Fixed) {
        let path = simplify_path(&path, self.tolerance);
        tracing::trace!(entity, waypoints = path.len(), "movement started");
        self.orders.insert(
            entity,
            MovementOrder {
                path,
                target,
                speed,
                next_waypoint: 0,
            },
        );
    }

    /// Cancel movement in place. The mover is not snapped to a cell.
    pub fn stop_movement(&mut self, entity: EntityId) -> bool {
        self.orders.remove(&entity).is_some()
    }

    /// True while `entity` has an order.
    #[must_use]
    pub fn is_moving(&self, entity: EntityId) -> bool {
        self.orders.contains_key(&entity)
    }

    /// The active order of `entity`.
    #[must_use]
    pub fn order(&self, entity: EntityId) -> Option<&MovementOrder> {
        self.orders.get(&entity)
    }

    /// Number of active orders.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.orders.len()
    }

    /// Advance every mover by `speed · dt` along its path.
    ///
    /// Returns the movers that arrived this tick, in ascending id order.
    pub fn update<P: PositionStore>(
        &mut self,
        dt: Fixed,
        grid: &mut CombatGrid,
        positions: &mut P,
    ) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.orders.keys().copied().collect();
        ids.sort_unstable();

        let arrive_within = grid.cell_size() * HALF;
        let mut arrivals = Vec::new();

        for id in ids {
            let Some(current) = positions.position(id) else {
                self.orders.remove(&id);
                continue;
            };
            let Some(order) = self.orders.get_mut(&id) else {
                continue;
            };
            let Some(destination) = order.destination() else {
                self.orders.remove(&id);
                continue;
            };

            let (position, next) =
                advance_along(current, &order.path, order.next_waypoint, order.speed * dt);
            order.next_waypoint = next;
            positions.set_position(id, position);

            // Occupancy follows into free cells; the pixel position is
            // not snapped mid-walk.
            let mut walked = position;
            grid.move_entity(id, &mut walked);

            if position.distance(destination) <= arrive_within {
                let mut settled = destination;
                if grid.move_entity(id, &mut settled) {
                    positions.set_position(id, settled);
                } else if let Some(cell) = grid.cell_of(id) {
                    positions.set_position(id, grid.pixel_center(cell));
                }
                self.orders.remove(&id);
                tracing::trace!(entity = id, "movement completed");
                arrivals.push(id);
            }
        }

        arrivals
    }

    /// Drop every order.
    pub fn clear(&mut self) {
        self.orders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellType, GridCoord};

    fn px(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    fn setup() -> (CombatGrid, HashMap<EntityId, Vec2Fixed>) {
        let mut grid = CombatGrid::new(400, 400, 40);
        let mut positions = HashMap::new();
        let mut start = px(20, 20);
        assert!(grid.register_entity(1, &mut start));
        positions.insert(1, start);
        (grid, positions)
    }

    fn run_until_arrival(
        controller: &mut MovementController,
        grid: &mut CombatGrid,
        positions: &mut HashMap<EntityId, Vec2Fixed>,
    ) -> usize {
        for tick in 1..=500 {
            let arrivals = controller.update(Fixed::ONE / Fixed::from_num(10), grid, positions);
            if !arrivals.is_empty() {
                return tick;
            }
        }
        panic!("never arrived");
    }

    #[test]
    fn test_straight_move_arrives_and_snaps() {
        let (mut grid, mut positions) = setup();
        let mut controller = MovementController::new(Fixed::from_num(10));
        assert!(controller.start_movement(&grid, 1, positions[&1], px(300, 20), Fixed::from_num(100)));
        assert_eq!(controller.order(1).map(|o| o.path.len()), Some(2));

        run_until_arrival(&mut controller, &mut grid, &mut positions);

        assert_eq!(positions[&1], px(300, 20));
        assert_eq!(grid.cell_of(1), Some(GridCoord::new(0, 7)));
        assert!(!controller.is_moving(1));
        assert!(grid.is_consistent());
    }

    #[test]
    fn test_position_written_every_tick() {
        let (mut grid, mut positions) = setup();
        let mut controller = MovementController::new(Fixed::from_num(10));
        controller.start_movement(&grid, 1, positions[&1], px(300, 20), Fixed::from_num(100));

        let before = positions[&1];
        controller.update(Fixed::ONE / Fixed::from_num(10), &mut grid, &mut positions);
        let after = positions[&1];
        assert!(after.x > before.x);
        assert!(after.x < px(40, 0).x, "no snap mid-walk: {after:?}");
    }

    #[test]
    fn test_occupancy_follows_into_free_cells() {
        let (mut grid, mut positions) = setup();
        let mut controller = MovementController::new(Fixed::from_num(10));
        controller.start_movement(&grid, 1, positions[&1], px(300, 20), Fixed::from_num(100));

        for _ in 0..3 {
            controller.update(Fixed::ONE / Fixed::from_num(10), &mut grid, &mut positions);
        }
        // 30 px travelled from x = 20 puts the mover in column 1.
        assert_eq!(grid.cell_of(1), Some(GridCoord::new(0, 1)));
        assert_eq!(grid.cell_type(GridCoord::new(0, 0)), CellType::Empty);
        assert!(grid.is_consistent());
    }

    #[test]
    fn test_routes_around_wall() {
        let (mut grid, mut positions) = setup();
        for row in 0..8 {
            grid.set_cell_type(GridCoord::new(row, 3), CellType::Obstacle);
        }
        let mut controller = MovementController::new(Fixed::from_num(10));
        assert!(controller.start_movement(&grid, 1, positions[&1], px(300, 20), Fixed::from_num(200)));

        run_until_arrival(&mut controller, &mut grid, &mut positions);
        assert_eq!(grid.cell_of(1), Some(GridCoord::new(0, 7)));
    }

    #[test]
    fn test_unreachable_target_rejected() {
        let (grid, positions) = {
            let (mut grid, positions) = setup();
            for row in 0..10 {
                grid.set_cell_type(GridCoord::new(row, 3), CellType::Obstacle);
            }
            (grid, positions)
        };
        let mut controller = MovementController::new(Fixed::from_num(10));
        assert!(!controller.start_movement(&grid, 1, positions[&1], px(300, 20), Fixed::from_num(100)));
        assert!(!controller.is_moving(1));
    }

    #[test]
    fn test_occupied_target_falls_back_to_neighbour() {
        let (mut grid, mut positions) = setup();
        let mut blocker = px(300, 20);
        grid.register_entity(2, &mut blocker);
        positions.insert(2, blocker);

        let mut controller = MovementController::new(Fixed::from_num(10));
        assert!(controller.start_movement(&grid, 1, positions[&1], px(300, 20), Fixed::from_num(100)));
        run_until_arrival(&mut controller, &mut grid, &mut positions);

        let cell = grid.cell_of(1).expect("registered");
        assert_eq!(cell.chebyshev(GridCoord::new(0, 7)), 1);
        assert_eq!(grid.cell_of(2), Some(GridCoord::new(0, 7)));
    }

    #[test]
    fn test_move_towards_entity_stops_short() {
        let (mut grid, mut positions) = setup();
        let mut target = px(340, 340);
        grid.register_entity(2, &mut target);
        positions.insert(2, target);

        let mut controller = MovementController::new(Fixed::from_num(10));
        assert!(controller.move_towards_entity(
            &grid,
            1,
            positions[&1],
            target,
            Fixed::from_num(48),
            Fixed::from_num(150),
        ));
        run_until_arrival(&mut controller, &mut grid, &mut positions);

        assert!(positions[&1].distance(target) <= Fixed::from_num(48));
        assert!(grid.are_adjacent(1, 2));
    }

    #[test]
    fn test_stop_movement_keeps_position() {
        let (mut grid, mut positions) = setup();
        let mut controller = MovementController::new(Fixed::from_num(10));
        controller.start_movement(&grid, 1, positions[&1], px(300, 20), Fixed::from_num(100));
        controller.update(Fixed::ONE / Fixed::from_num(10), &mut grid, &mut positions);
        let mid = positions[&1];

        assert!(controller.stop_movement(1));
        assert!(!controller.stop_movement(1));
        controller.update(Fixed::ONE / Fixed::from_num(10), &mut grid, &mut positions);
        assert_eq!(positions[&1], mid);
    }
}
