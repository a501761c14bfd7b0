//! Grid-based pathfinding using the A* algorithm.
//!
//! Paths are produced as pixel-space waypoints at cell centres, from the
//! start cell through the goal cell inclusive. Callers simplify them with
//! [`simplify_path`] and walk them with [`advance_along`] or [`next_move`].
//!
//! All calculations use fixed-point math for deterministic results.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::{ArenaError, Result};
use crate::grid::{ring_cells, CellType, CombatGrid, GridCoord, NEIGHBOR_OFFSETS};
use crate::math::{Fixed, Vec2Fixed};

/// How far around a blocked goal to look for a free cell instead.
pub const GOAL_SEARCH_RADIUS: i32 = 3;

/// Upper bound on expanded nodes for one search.
pub const MAX_EXPANSIONS: usize = 4096;

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    coord: GridCoord,
    f_score: Fixed,
    /// Insertion order. Earlier pushes win ties, which keeps searches
    /// reproducible regardless of hash map layout.
    seq: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so we reverse the comparison for min-heap behavior.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Chebyshev distance heuristic, admissible for 8-directional movement.
#[inline]
fn chebyshev_heuristic(a: GridCoord, b: GridCoord) -> Fixed {
    Fixed::from_num(a.chebyshev(b))
}

/// Check if a diagonal move is valid (no corner cutting past terrain).
///
/// Combatants standing on the corner cells do not block the diagonal.
#[inline]
fn is_diagonal_valid(grid: &CombatGrid, from: GridCoord, to: GridCoord) -> bool {
    if from.row == to.row || from.col == to.col {
        return true;
    }
    let side_a = GridCoord::new(from.row, to.col);
    let side_b = GridCoord::new(to.row, from.col);
    !grid.cell_type(side_a).is_terrain_blocker() && !grid.cell_type(side_b).is_terrain_blocker()
}

/// Find a path between two pixel positions.
///
/// The start cell may hold the mover itself; any other non-`Empty`
/// classification fails immediately. A non-`Empty` goal is replaced by
/// the first free cell on the rings of radius 1 to
/// [`GOAL_SEARCH_RADIUS`] around it.
///
/// # Errors
///
/// - [`ArenaError::StartBlocked`] if the start cell is terrain.
/// - [`ArenaError::NoPath`] if no free goal cell or no route exists.
pub fn find_path(grid: &CombatGrid, start: Vec2Fixed, goal: Vec2Fixed) -> Result<Vec<Vec2Fixed>> {
    let start_cell = grid.cell_coords(start);
    let goal_cell = grid.cell_coords(goal);

    if grid.cell_type(start_cell).is_terrain_blocker() {
        return Err(ArenaError::StartBlocked(start_cell));
    }
    if start_cell == goal_cell {
        return Ok(vec![grid.pixel_center(start_cell)]);
    }

    let resolved_goal = resolve_goal(grid, start_cell, goal_cell).ok_or(ArenaError::NoPath {
        from: start_cell,
        to: goal_cell,
    })?;
    find_path_cells(grid, start_cell, resolved_goal)
}

/// Pick the goal cell actually searched for.
///
/// On each ring the free cell closest to the start (Manhattan, then
/// row-major) is taken. The start cell itself counts as free.
fn resolve_goal(grid: &CombatGrid, start: GridCoord, goal: GridCoord) -> Option<GridCoord> {
    if grid.cell_type(goal) == CellType::Empty {
        return Some(goal);
    }
    (1..=GOAL_SEARCH_RADIUS).find_map(|radius| {
        ring_cells(goal, radius)
            .into_iter()
            .filter(|&cell| cell == start || grid.cell_type(cell) == CellType::Empty)
            .min_by_key(|&cell| (cell.manhattan(start), cell))
    })
}

/// Path to the free cell closest to the mover among those whose centre
/// lies within `max_distance` pixels of `target`.
///
/// Returns a single-waypoint path when the mover's own cell already
/// qualifies.
///
/// # Errors
///
/// [`ArenaError::NoPath`] when no qualifying cell exists or none is
/// reachable, [`ArenaError::StartBlocked`] as for [`find_path`].
pub fn find_path_near(
    grid: &CombatGrid,
    start: Vec2Fixed,
    target: Vec2Fixed,
    max_distance: Fixed,
) -> Result<Vec<Vec2Fixed>> {
    let start_cell = grid.cell_coords(start);
    let target_cell = grid.cell_coords(target);
    let target_center = grid.pixel_center(target_cell);
    let max_sq = max_distance * max_distance;
    let start_center = grid.pixel_center(start_cell);

    if start_cell != target_cell && start_center.distance_squared(target_center) <= max_sq {
        return Ok(vec![start_center]);
    }

    let radius = (max_distance / grid.cell_size()).to_num::<i32>().max(1);
    let mut candidates: Vec<(Fixed, GridCoord)> = (1..=radius)
        .flat_map(|r| ring_cells(target_cell, r))
        .filter(|&cell| grid.cell_type(cell) == CellType::Empty)
        .map(|cell| (grid.pixel_center(cell), cell))
        .filter(|&(center, _)| center.distance_squared(target_center) <= max_sq)
        .map(|(center, cell)| (center.distance_squared(start_center), cell))
        .collect();
    candidates.sort();

    for (_, cell) in candidates {
        if let Ok(path) = find_path(grid, start, grid.pixel_center(cell)) {
            return Ok(path);
        }
    }
    Err(ArenaError::NoPath {
        from: start_cell,
        to: target_cell,
    })
}

/// A* over grid cells. Only `Empty` cells are entered.
fn find_path_cells(grid: &CombatGrid, start: GridCoord, goal: GridCoord) -> Result<Vec<Vec2Fixed>> {
    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<GridCoord, GridCoord> = HashMap::new();
    let mut g_score: HashMap<GridCoord, Fixed> = HashMap::new();
    let mut closed: HashSet<GridCoord> = HashSet::new();
    let mut seq: u64 = 0;

    g_score.insert(start, Fixed::ZERO);
    open_set.push(AStarNode {
        coord: start,
        f_score: chebyshev_heuristic(start, goal),
        seq,
    });

    while let Some(current) = open_set.pop() {
        if current.coord == goal {
            return Ok(reconstruct_path(grid, &came_from, goal));
        }
        if !closed.insert(current.coord) {
            continue;
        }
        if closed.len() > MAX_EXPANSIONS {
            break;
        }

        let current_g = g_score.get(&current.coord).copied().unwrap_or(Fixed::MAX);

        for &(dr, dc) in &NEIGHBOR_OFFSETS {
            let next = current.coord.offset(dr, dc);
            if closed.contains(&next) {
                continue;
            }
            let step = grid.step_cost(current.coord, next);
            if step == Fixed::MAX || !is_diagonal_valid(grid, current.coord, next) {
                continue;
            }

            let tentative_g = current_g + step;
            let neighbor_g = g_score.get(&next).copied().unwrap_or(Fixed::MAX);
            if tentative_g < neighbor_g {
                came_from.insert(next, current.coord);
                g_score.insert(next, tentative_g);
                seq += 1;
                open_set.push(AStarNode {
                    coord: next,
                    f_score: tentative_g + chebyshev_heuristic(next, goal),
                    seq,
                });
            }
        }
    }

    tracing::trace!(%start, %goal, expanded = closed.len(), "no path");
    Err(ArenaError::NoPath {
        from: start,
        to: goal,
    })
}

/// Reconstruct path from came_from map.
fn reconstruct_path(
    grid: &CombatGrid,
    came_from: &HashMap<GridCoord, GridCoord>,
    goal: GridCoord,
) -> Vec<Vec2Fixed> {
    let mut path = vec![grid.pixel_center(goal)];
    let mut current = goal;

    while let Some(&prev) = came_from.get(&current) {
        path.push(grid.pixel_center(prev));
        current = prev;
    }

    path.reverse();
    path
}

/// Distance from a point to the segment `a`–`b`.
#[must_use]
pub fn point_segment_distance(point: Vec2Fixed, a: Vec2Fixed, b: Vec2Fixed) -> Fixed {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq == Fixed::ZERO {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(Fixed::ZERO, Fixed::ONE);
    point.distance(a + ab.scale(t))
}

/// Drop waypoints that deviate from a straight run by at most `tolerance`.
///
/// Keeps the first point, then extends a segment from the last kept
/// point as far as every skipped point stays within tolerance of it.
/// The final waypoint is always kept.
#[must_use]
pub fn simplify_path(path: &[Vec2Fixed], tolerance: Fixed) -> Vec<Vec2Fixed> {
    if path.len() <= 2 {
        return path.to_vec();
    }

    let mut simplified = Vec::with_capacity(path.len());
    simplified.push(path[0]);
    let mut anchor = 0;

    while anchor < path.len() - 1 {
        let mut furthest = anchor + 1;
        for candidate in (anchor + 2)..path.len() {
            let fits = path[anchor + 1..candidate].iter().all(|&skipped| {
                point_segment_distance(skipped, path[anchor], path[candidate]) <= tolerance
            });
            if !fits {
                break;
            }
            furthest = candidate;
        }
        simplified.push(path[furthest]);
        anchor = furthest;
    }

    simplified
}

/// Walk from `current` along `path` starting at waypoint `next_index`,
/// spending at most `budget` pixels.
///
/// Leftover distance carries past reached waypoints within the same call.
/// Returns the new position and the index of the next unreached waypoint
/// (`path.len()` once the final waypoint is reached).
#[must_use]
pub fn advance_along(
    current: Vec2Fixed,
    path: &[Vec2Fixed],
    next_index: usize,
    budget: Fixed,
) -> (Vec2Fixed, usize) {
    let mut position = current;
    let mut index = next_index;
    let mut left = budget;

    while index < path.len() {
        let (reached, remaining) = position.step_towards(path[index], left);
        position = reached;
        if reached != path[index] {
            break;
        }
        index += 1;
        left = remaining;
        if left == Fixed::ZERO {
            break;
        }
    }

    (position, index)
}

/// Furthest point reachable from `current` within `max_step` along `path`,
/// clamped at the final waypoint.
///
/// Waypoints already behind the mover are skipped: it heads for waypoint
/// `i + 1` whenever that one is closer than waypoint `i`.
#[must_use]
pub fn next_move(current: Vec2Fixed, path: &[Vec2Fixed], max_step: Fixed) -> Vec2Fixed {
    let Some(&last) = path.last() else {
        return current;
    };
    if path.len() < 2 {
        return current.step_towards(last, max_step).0;
    }

    let mut index = 0;
    for i in 0..path.len() - 1 {
        if current.distance_squared(path[i + 1]) < current.distance_squared(path[i]) {
            index = i + 1;
        }
    }
    advance_along(current, path, index, max_step).0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    fn open_grid() -> CombatGrid {
        CombatGrid::new(400, 400, 40)
    }

    #[test]
    fn test_simple_path_endpoints() {
        let grid = open_grid();
        let path = find_path(&grid, vec2(20, 20), vec2(220, 220)).unwrap();
        assert_eq!(path.first(), Some(&vec2(20, 20)));
        assert_eq!(path.last(), Some(&vec2(220, 220)));
        // Pure diagonal: one waypoint per cell.
        assert_eq!(path.len(), 6);
    }

    #[test]
    fn test_path_to_same_cell() {
        let grid = open_grid();
        let path = find_path(&grid, vec2(25, 25), vec2(30, 35)).unwrap();
        assert_eq!(path, vec![vec2(20, 20)]);
    }

    #[test]
    fn test_path_around_obstacle() {
        let mut grid = open_grid();
        for row in 2..8 {
            grid.set_cell_type(GridCoord::new(row, 5), CellType::Obstacle);
        }

        let path = find_path(&grid, vec2(100, 220), vec2(340, 220)).unwrap();
        for point in &path {
            let cell = grid.cell_coords(*point);
            assert_ne!(grid.cell_type(cell), CellType::Obstacle, "path crosses {cell}");
        }
    }

    #[test]
    fn test_no_corner_cutting() {
        let mut grid = CombatGrid::new(120, 120, 40);
        grid.set_cell_type(GridCoord::new(0, 1), CellType::Obstacle);
        // (0,0) -> (1,1) must not squeeze past the wall at (0,1).
        let path = find_path(&grid, vec2(20, 20), vec2(100, 20));
        let path = path.unwrap();
        for pair in path.windows(2) {
            let a = grid.cell_coords(pair[0]);
            let b = grid.cell_coords(pair[1]);
            assert!(is_diagonal_valid(&grid, a, b));
        }
    }

    #[test]
    fn test_no_path_exists() {
        let mut grid = open_grid();
        for row in 0..10 {
            grid.set_cell_type(GridCoord::new(row, 5), CellType::Obstacle);
        }
        let result = find_path(&grid, vec2(100, 220), vec2(340, 220));
        assert!(matches!(result, Err(ArenaError::NoPath { .. })));
    }

    #[test]
    fn test_blocked_start() {
        let mut grid = open_grid();
        grid.set_cell_type(GridCoord::new(0, 0), CellType::Obstacle);
        let result = find_path(&grid, vec2(20, 20), vec2(220, 220));
        assert_eq!(result, Err(ArenaError::StartBlocked(GridCoord::new(0, 0))));
    }

    #[test]
    fn test_occupied_start_is_allowed() {
        let mut grid = open_grid();
        let mut pos = vec2(20, 20);
        assert!(grid.register_entity(1, &mut pos));
        assert!(find_path(&grid, pos, vec2(220, 20)).is_ok());
    }

    #[test]
    fn test_blocked_goal_retargets_nearby() {
        let mut grid = open_grid();
        let mut target = vec2(220, 220);
        assert!(grid.register_entity(9, &mut target));

        let path = find_path(&grid, vec2(20, 220), target).unwrap();
        let end = grid.cell_coords(*path.last().unwrap());
        assert_eq!(end, GridCoord::new(5, 4));
        assert_eq!(grid.cell_type(end), CellType::Empty);
    }

    #[test]
    fn test_goal_surrounded_fails() {
        let mut grid = open_grid();
        for radius in 0..=GOAL_SEARCH_RADIUS {
            for cell in ring_cells(GridCoord::new(5, 5), radius) {
                grid.set_cell_type(cell, CellType::Obstacle);
            }
        }
        let result = find_path(&grid, vec2(20, 20), vec2(220, 220));
        assert!(result.is_err());
    }

    #[test]
    fn test_find_path_near_stops_short() {
        let mut grid = open_grid();
        let mut target = vec2(220, 220);
        assert!(grid.register_entity(9, &mut target));

        let path = find_path_near(&grid, vec2(20, 220), target, fixed(48)).unwrap();
        let end = *path.last().unwrap();
        assert!(end.distance(target) <= fixed(48));
        assert_eq!(grid.cell_coords(end), GridCoord::new(5, 4));
    }

    #[test]
    fn test_find_path_near_already_there() {
        let grid = open_grid();
        let path = find_path_near(&grid, vec2(180, 220), vec2(220, 220), fixed(48)).unwrap();
        assert_eq!(path, vec![vec2(180, 220)]);
    }

    #[test]
    fn test_determinism() {
        let mut grid = CombatGrid::new(800, 800, 40);
        for row in 5..15 {
            grid.set_cell_type(GridCoord::new(row, 10), CellType::Obstacle);
        }
        let start = vec2(100, 420);
        let goal = vec2(620, 420);

        let path1 = find_path(&grid, start, goal).unwrap();
        let path2 = find_path(&grid, start, goal).unwrap();
        let path3 = find_path(&grid, start, goal).unwrap();
        assert_eq!(path1, path2);
        assert_eq!(path2, path3);
    }

    #[test]
    fn test_simplify_straight_line() {
        let path = vec![vec2(20, 20), vec2(60, 60), vec2(100, 100), vec2(140, 140)];
        let simplified = simplify_path(&path, fixed(10));
        assert_eq!(simplified, vec![vec2(20, 20), vec2(140, 140)]);
    }

    #[test]
    fn test_simplify_keeps_corners() {
        let path = vec![
            vec2(20, 20),
            vec2(60, 20),
            vec2(100, 20),
            vec2(100, 60),
            vec2(100, 100),
        ];
        let simplified = simplify_path(&path, fixed(10));
        assert_eq!(simplified, vec![vec2(20, 20), vec2(100, 20), vec2(100, 100)]);
    }

    #[test]
    fn test_simplify_short_paths_untouched() {
        let path = vec![vec2(0, 0), vec2(10, 10)];
        assert_eq!(simplify_path(&path, fixed(10)), path);
    }

    #[test]
    fn test_point_segment_distance() {
        let tolerance = Fixed::ONE / fixed(1000);
        let d = point_segment_distance(vec2(5, 5), vec2(0, 0), vec2(10, 0));
        assert!((d - fixed(5)).abs() < tolerance);
        let beyond = point_segment_distance(vec2(13, 4), vec2(0, 0), vec2(10, 0));
        assert!((beyond - fixed(5)).abs() < tolerance);
    }

    #[test]
    fn test_advance_along_carries_over_corner() {
        let path = vec![vec2(0, 0), vec2(10, 0), vec2(10, 10)];
        let (pos, index) = advance_along(vec2(0, 0), &path, 1, fixed(15));
        assert_eq!(index, 2);
        assert_eq!(pos.x, fixed(10));
        assert!((pos.y - fixed(5)).abs() < Fixed::ONE / fixed(1000));
    }

    #[test]
    fn test_advance_along_clamps_at_end() {
        let path = vec![vec2(0, 0), vec2(10, 0)];
        let (pos, index) = advance_along(vec2(0, 0), &path, 1, fixed(100));
        assert_eq!(pos, vec2(10, 0));
        assert_eq!(index, 2);
    }

    #[test]
    fn test_next_move_skips_passed_waypoints() {
        let path = vec![vec2(0, 0), vec2(10, 0), vec2(20, 0)];
        let pos = next_move(vec2(9, 0), &path, fixed(5));
        assert!((pos.x - fixed(14)).abs() < Fixed::ONE / fixed(1000));
        assert_eq!(next_move(vec2(19, 0), &path, fixed(50)), vec2(20, 0));
        assert_eq!(next_move(vec2(3, 3), &[], fixed(5)), vec2(3, 3));
    }

    #[test]
    fn test_chebyshev_heuristic() {
        let origin = GridCoord::new(0, 0);
        assert_eq!(chebyshev_heuristic(origin, GridCoord::new(5, 5)), fixed(5));
        assert_eq!(chebyshev_heuristic(origin, GridCoord::new(3, 7)), fixed(7));
        assert_eq!(chebyshev_heuristic(origin, origin), fixed(0));
    }
}
