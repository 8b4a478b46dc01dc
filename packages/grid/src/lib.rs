#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Offline safest-path search over a crime-weighted cost grid.
//!
//! A fixed bounding box is rasterized into a `width × height` grid where
//! every cell starts at traversal cost 1. Each incident stamps a radial
//! cost increase (linear falloff, scaled by severity) onto nearby cells;
//! overlapping stamps add up. A* then searches the 4-connected grid with a
//! Manhattan heuristic, paying the cost of each cell it enters.
//!
//! The open set is a binary heap. Ties are broken by lower f-score, then
//! lower heuristic (closer to the goal), then lower row-major cell index,
//! so equal-cost alternatives always resolve to the same path.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use saferoute_crime_models::{Incident, Point, SeverityWeights};
use serde::{Deserialize, Serialize};

/// Geographic extent of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridBounds {
    /// Southern latitude boundary.
    pub south: f64,
    /// Western longitude boundary.
    pub west: f64,
    /// Northern latitude boundary.
    pub north: f64,
    /// Eastern longitude boundary.
    pub east: f64,
}

impl GridBounds {
    /// Whether the point lies inside (edges included).
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }
}

impl Default for GridBounds {
    fn default() -> Self {
        Self {
            south: 33.40,
            west: 72.80,
            north: 33.80,
            east: 73.30,
        }
    }
}

/// Grid construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridTuning {
    /// Area covered by the grid.
    pub bounds: GridBounds,
    /// Columns.
    pub width: usize,
    /// Rows.
    pub height: usize,
    /// Stamp radius in cells.
    pub stamp_radius: usize,
    /// Multiplier on every stamp.
    pub stamp_scale: f64,
}

impl Default for GridTuning {
    fn default() -> Self {
        Self {
            bounds: GridBounds::default(),
            width: 100,
            height: 100,
            stamp_radius: 3,
            stamp_scale: 1.0,
        }
    }
}

/// A grid cell as `(x, y)`: column then row, row 0 at the southern edge.
pub type Cell = (usize, usize);

/// Per-cell traversal costs over a bounding box.
#[derive(Debug, Clone)]
pub struct CostGrid {
    bounds: GridBounds,
    width: usize,
    height: usize,
    costs: Vec<f64>,
}

impl CostGrid {
    /// A grid with every cell at base cost 1.
    #[must_use]
    pub fn new(bounds: GridBounds, width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            bounds,
            width,
            height,
            costs: vec![1.0; width * height],
        }
    }

    /// Builds the grid and stamps every incident inside the bounds.
    #[must_use]
    pub fn build(incidents: &[Incident], weights: &SeverityWeights, tuning: &GridTuning) -> Self {
        let mut grid = Self::new(tuning.bounds, tuning.width, tuning.height);
        let mut stamped = 0usize;

        for incident in incidents {
            if let Some(cell) = grid.cell_for(incident.position) {
                grid.stamp(
                    cell,
                    weights.weight(&incident.category),
                    tuning.stamp_radius,
                    tuning.stamp_scale,
                );
                stamped += 1;
            }
        }

        log::debug!(
            "Built {}x{} cost grid, stamped {stamped} of {} incident(s)",
            grid.width,
            grid.height,
            incidents.len()
        );

        grid
    }

    /// Columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Rows.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    const fn index(&self, (x, y): Cell) -> usize {
        y * self.width + x
    }

    const fn cell_at(&self, index: usize) -> Cell {
        (index % self.width, index / self.width)
    }

    /// Traversal cost of a cell.
    ///
    /// # Panics
    ///
    /// Panics if the cell is outside the grid.
    #[must_use]
    pub fn cost(&self, cell: Cell) -> f64 {
        self.costs[self.index(cell)]
    }

    /// Makes a cell impassable.
    pub fn block(&mut self, cell: Cell) {
        if cell.0 < self.width && cell.1 < self.height {
            let index = self.index(cell);
            self.costs[index] = f64::INFINITY;
        }
    }

    /// Adds a radial cost bump around `center`: cells at Euclidean cell
    /// distance `d ≤ radius` gain `weight · scale · (1 − d / (radius + 1))`.
    pub fn stamp(&mut self, center: Cell, weight: f64, radius: usize, scale: f64) {
        let r = i64::try_from(radius).unwrap_or(i64::MAX / 4);
        #[allow(clippy::cast_precision_loss)]
        let (reach, falloff) = (radius as f64, (radius + 1) as f64);
        let (cx, cy) = (
            i64::try_from(center.0).unwrap_or(i64::MAX),
            i64::try_from(center.1).unwrap_or(i64::MAX),
        );

        for dy in -r..=r {
            for dx in -r..=r {
                let (Ok(x), Ok(y)) = (usize::try_from(cx + dx), usize::try_from(cy + dy)) else {
                    continue;
                };
                if x >= self.width || y >= self.height {
                    continue;
                }
                #[allow(clippy::cast_precision_loss)]
                let d = ((dx * dx + dy * dy) as f64).sqrt();
                if d > reach {
                    continue;
                }
                let index = self.index((x, y));
                self.costs[index] += weight * scale * (1.0 - d / falloff);
            }
        }
    }

    /// The cell containing `point`, or `None` outside the bounds.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn cell_for(&self, point: Point) -> Option<Cell> {
        if !self.bounds.contains(point) {
            return None;
        }
        let fx = (point.longitude - self.bounds.west) / (self.bounds.east - self.bounds.west);
        let fy = (point.latitude - self.bounds.south) / (self.bounds.north - self.bounds.south);
        if !fx.is_finite() || !fy.is_finite() {
            return None;
        }
        let x = ((fx * self.width as f64).floor() as usize).min(self.width - 1);
        let y = ((fy * self.height as f64).floor() as usize).min(self.height - 1);
        Some((x, y))
    }

    /// Geographic centre of a cell.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cell_center(&self, (x, y): Cell) -> Point {
        let lng_step = (self.bounds.east - self.bounds.west) / self.width as f64;
        let lat_step = (self.bounds.north - self.bounds.south) / self.height as f64;
        Point::new(
            (y as f64 + 0.5).mul_add(lat_step, self.bounds.south),
            (x as f64 + 0.5).mul_add(lng_step, self.bounds.west),
        )
    }

    fn neighbors(&self, (x, y): Cell) -> impl Iterator<Item = Cell> + '_ {
        let candidates = [
            (x.checked_add(1), Some(y)),
            (x.checked_sub(1), Some(y)),
            (Some(x), y.checked_add(1)),
            (Some(x), y.checked_sub(1)),
        ];
        candidates.into_iter().filter_map(move |(nx, ny)| {
            let cell = (nx?, ny?);
            (cell.0 < self.width && cell.1 < self.height && self.cost(cell).is_finite())
                .then_some(cell)
        })
    }
}

/// Open-set entry. The heap is a max-heap, so ordering is reversed.
#[derive(Debug, Clone, Copy)]
struct Node {
    f: f64,
    h: f64,
    index: usize,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.index.cmp(&self.index))
    }
}

#[allow(clippy::cast_precision_loss)]
const fn manhattan(a: Cell, b: Cell) -> f64 {
    (a.0.abs_diff(b.0) + a.1.abs_diff(b.1)) as f64
}

/// A* from `start` to `goal` over grid cells.
///
/// Returns the cells from start to goal inclusive, or an empty vector when
/// either cell is outside the grid or impassable, or no path exists.
#[must_use]
pub fn find_cell_path(grid: &CostGrid, start: Cell, goal: Cell) -> Vec<Cell> {
    let in_grid = |c: Cell| c.0 < grid.width && c.1 < grid.height && grid.cost(c).is_finite();
    if !in_grid(start) || !in_grid(goal) {
        return Vec::new();
    }

    let size = grid.width * grid.height;
    let mut g_score = vec![f64::INFINITY; size];
    let mut parent: Vec<Option<usize>> = vec![None; size];
    let mut closed = vec![false; size];
    let mut open = BinaryHeap::new();

    let start_index = grid.index(start);
    let goal_index = grid.index(goal);
    let h0 = manhattan(start, goal);
    g_score[start_index] = 0.0;
    open.push(Node {
        f: h0,
        h: h0,
        index: start_index,
    });

    while let Some(Node { index, .. }) = open.pop() {
        if closed[index] {
            continue;
        }
        if index == goal_index {
            let mut path = vec![grid.cell_at(index)];
            let mut current = index;
            while let Some(prev) = parent[current] {
                path.push(grid.cell_at(prev));
                current = prev;
            }
            path.reverse();
            return path;
        }
        closed[index] = true;

        let cell = grid.cell_at(index);
        for next in grid.neighbors(cell) {
            let next_index = grid.index(next);
            if closed[next_index] {
                continue;
            }
            let tentative = g_score[index] + grid.cost(next);
            if tentative < g_score[next_index] {
                g_score[next_index] = tentative;
                parent[next_index] = Some(index);
                let h = manhattan(next, goal);
                open.push(Node {
                    f: tentative + h,
                    h,
                    index: next_index,
                });
            }
        }
    }

    Vec::new()
}

/// Finds a path between two coordinates on the grid.
///
/// Interior vertices are cell centres; the first and last vertices are the
/// exact `start` and `end`. Returns an empty vector when either point lies
/// outside the bounds or no path exists.
#[must_use]
pub fn find_path(grid: &CostGrid, start: Point, end: Point) -> Vec<Point> {
    let (Some(start_cell), Some(end_cell)) = (grid.cell_for(start), grid.cell_for(end)) else {
        log::debug!("Grid search endpoints {start} -> {end} fall outside the grid bounds");
        return Vec::new();
    };

    let cells = find_cell_path(grid, start_cell, end_cell);
    if cells.is_empty() {
        log::debug!("Grid search exhausted the open set for {start} -> {end}");
        return Vec::new();
    }

    if cells.len() == 1 {
        return vec![start, end];
    }

    let mut points: Vec<Point> = cells.iter().map(|c| grid.cell_center(*c)).collect();
    points[0] = start;
    if let Some(last) = points.last_mut() {
        *last = end;
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bounds() -> GridBounds {
        GridBounds {
            south: 0.0,
            west: 0.0,
            north: 1.0,
            east: 1.0,
        }
    }

    fn assert_connected(path: &[Cell]) {
        for pair in path.windows(2) {
            let step = pair[0].0.abs_diff(pair[1].0) + pair[0].1.abs_diff(pair[1].1);
            assert_eq!(step, 1, "{:?} -> {:?} is not a 4-neighbour step", pair[0], pair[1]);
        }
    }

    #[test]
    fn path_is_four_connected() {
        let incidents = vec![
            Incident::new(33.60, 73.05, "robbery"),
            Incident::new(33.61, 73.06, "assault"),
            Incident::new(33.55, 73.00, "theft"),
        ];
        let grid = CostGrid::build(&incidents, &SeverityWeights::default(), &GridTuning::default());
        let start = grid.cell_for(Point::new(33.45, 72.85)).unwrap();
        let end = grid.cell_for(Point::new(33.75, 73.25)).unwrap();
        let path = find_cell_path(&grid, start, end);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&end));
        assert_connected(&path);
    }

    #[test]
    fn endpoints_outside_bounds_yield_empty_path() {
        let grid = CostGrid::build(&[], &SeverityWeights::default(), &GridTuning::default());
        assert!(find_path(&grid, Point::new(10.0, 10.0), Point::new(33.6, 73.0)).is_empty());
        assert!(find_path(&grid, Point::new(33.6, 73.0), Point::new(34.5, 73.0)).is_empty());
    }

    #[test]
    fn coordinate_path_starts_and_ends_at_requested_points() {
        let grid = CostGrid::build(&[], &SeverityWeights::default(), &GridTuning::default());
        let start = Point::new(33.6, 73.0);
        let end = Point::new(33.62, 73.02);
        let path = find_path(&grid, start, end);
        assert!(path.len() >= 2);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&end));
    }

    #[test]
    fn same_cell_start_and_end() {
        let grid = CostGrid::new(unit_bounds(), 4, 4);
        assert_eq!(find_cell_path(&grid, (1, 1), (1, 1)), vec![(1, 1)]);
        let (start, end) = (Point::new(0.3, 0.3), Point::new(0.31, 0.31));
        assert_eq!(find_path(&grid, start, end), vec![start, end]);
    }

    #[test]
    fn tie_break_is_deterministic() {
        let grid = CostGrid::new(unit_bounds(), 3, 3);
        let path = find_cell_path(&grid, (0, 0), (2, 2));
        assert_eq!(path, vec![(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)]);
        assert_eq!(find_cell_path(&grid, (0, 0), (2, 2)), path);
    }

    #[test]
    fn path_detours_around_a_hotspot() {
        let mut grid = CostGrid::new(unit_bounds(), 11, 11);
        grid.stamp((5, 5), 100.0, 3, 1.0);
        let path = find_cell_path(&grid, (0, 5), (10, 5));
        assert_connected(&path);
        assert!(!path.contains(&(5, 5)), "path crossed the hotspot centre");
        assert!(path.len() > 11);
    }

    #[test]
    fn blocked_wall_exhausts_open_set() {
        let mut grid = CostGrid::new(unit_bounds(), 5, 5);
        for y in 0..5 {
            grid.block((2, y));
        }
        assert!(find_cell_path(&grid, (0, 0), (4, 4)).is_empty());
    }

    #[test]
    fn stamp_falls_off_linearly_and_accumulates() {
        let mut grid = CostGrid::new(unit_bounds(), 10, 10);
        grid.stamp((5, 5), 4.0, 3, 1.0);
        assert!((grid.cost((5, 5)) - 5.0).abs() < 1e-9);
        assert!((grid.cost((6, 5)) - 4.0).abs() < 1e-9);
        assert!((grid.cost((8, 5)) - 2.0).abs() < 1e-9);
        assert!((grid.cost((9, 5)) - 1.0).abs() < 1e-9);

        grid.stamp((5, 5), 4.0, 3, 1.0);
        assert!((grid.cost((5, 5)) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn stamp_near_edges_stays_in_grid() {
        let mut grid = CostGrid::new(unit_bounds(), 4, 4);
        grid.stamp((0, 0), 2.0, 3, 1.0);
        grid.stamp((3, 3), 2.0, 3, 1.0);
        assert!(grid.cost((0, 0)) > 1.0);
        assert!(grid.cost((3, 3)) > 1.0);
    }

    #[test]
    fn cell_mapping_clamps_the_far_edge() {
        let grid = CostGrid::new(unit_bounds(), 10, 10);
        assert_eq!(grid.cell_for(Point::new(0.0, 0.0)), Some((0, 0)));
        assert_eq!(grid.cell_for(Point::new(1.0, 1.0)), Some((9, 9)));
        assert_eq!(grid.cell_for(Point::new(0.55, 0.25)), Some((2, 5)));
        assert_eq!(grid.cell_for(Point::new(1.5, 0.5)), None);
    }
}
