//! Maze Map
//!
//! The arena is a `MAP_WIDTH` x `MAP_WIDTH` cell maze generated with
//! randomized Prim. Each remaining wall becomes a 2-point segment collider.
//! A coarse density grid (wall counts per 2x2 cell block) is what regular
//! clients receive instead of the full geometry, and two spawn sets are
//! derived at setup: one covering every cell (discovery), one ring of
//! subsquares at a fixed Dijkstra distance from the maze start (point rush).

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::consts::{CELL_WIDTH, MAP_WIDTH, NUM_SUBSQUARE, PLAYER_SIZE, SUBSQUARE_WIDTH};
use crate::core::codec::ByteWriter;
use crate::core::collider::Collider;
use crate::core::point::Point;

/// Cardinal neighbors as (row, col) deltas: north, south, east, west.
const DIRECTIONS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, 1), (0, -1)];

/// Graph distance from the maze start at which point-rush spawns sit.
const FOCUSED_RANGE: u32 = 40;

/// Minimum number of point-rush spawns a maze must yield.
const MIN_FOCUS_SPAWNS: usize = 40;

/// Maze regeneration budget before setup fails loud.
const MAX_SETUP_ATTEMPTS: u32 = 100;

/// Map generation errors.
#[derive(Debug, Error)]
pub enum MapError {
    /// No generated maze produced enough point-rush spawn points.
    #[error("maze generation exhausted {0} attempts without a viable spawn set")]
    SpawnGeneration(u32),
}

/// One maze cell as a 4-bit wall mask.
#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    n: bool,
    s: bool,
    e: bool,
    w: bool,
}

impl Cell {
    const CLOSED: Self = Self {
        n: true,
        s: true,
        e: true,
        w: true,
    };

    fn wall(&self, direction: usize) -> bool {
        match direction {
            0 => self.n,
            1 => self.s,
            2 => self.e,
            3 => self.w,
            _ => false,
        }
    }
}

/// The generated arena map.
#[derive(Debug, Clone, Default)]
pub struct ArenaMap {
    size: usize,
    grid: Vec<Vec<Cell>>,
    density: Vec<Vec<u8>>,
    start: Point,
    spawns: [Vec<Point>; 2],
    walls: Vec<Collider>,
}

impl ArenaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh maze, colliders, density grid and spawn sets.
    ///
    /// Regenerates until the point-rush spawn set holds at least
    /// `MIN_FOCUS_SPAWNS` points, bounded by `MAX_SETUP_ATTEMPTS`.
    pub fn setup(&mut self) -> Result<(), MapError> {
        let mut rng = rand::thread_rng();
        self.setup_with(&mut rng)
    }

    /// Seedable variant of [`setup`](Self::setup).
    pub fn setup_with<R: Rng>(&mut self, rng: &mut R) -> Result<(), MapError> {
        self.size = MAP_WIDTH;

        for attempt in 0..MAX_SETUP_ATTEMPTS {
            self.grid = vec![vec![Cell::CLOSED; MAP_WIDTH]; MAP_WIDTH];

            let start_row = rng.gen_range(0..self.size);
            let start_col = rng.gen_range(0..self.size);

            self.generate_maze(rng, start_row, start_col);
            self.generate_colliders();
            self.count_walls_in_subsquares(2);

            self.start = Point::new(
                start_col as f64 * CELL_WIDTH + CELL_WIDTH / 2.0,
                start_row as f64 * CELL_WIDTH + CELL_WIDTH / 2.0,
            );

            let subdivided = self.subdivide(NUM_SUBSQUARE);
            let distances = dijkstra(
                start_row * NUM_SUBSQUARE,
                start_col * NUM_SUBSQUARE,
                &subdivided,
            );
            self.collect_spawn_points(&distances);

            if self.spawns[1].len() >= MIN_FOCUS_SPAWNS {
                self.spawns[0].shuffle(rng);
                self.spawns[1].shuffle(rng);
                return Ok(());
            }

            debug!(
                attempt,
                focus_spawns = self.spawns[1].len(),
                "maze rejected, regenerating"
            );
        }

        Err(MapError::SpawnGeneration(MAX_SETUP_ATTEMPTS))
    }

    /// Pixel center of the maze's start cell.
    pub fn centroid(&self) -> Point {
        self.start
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.walls
    }

    /// Spawn set for the given phase (0 = discovery, 1 = point rush).
    pub fn spawns(&self, phase: usize) -> &[Point] {
        &self.spawns[phase]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The coarse wall-count grid broadcast to non-admin clients.
    pub fn discrete_map(&self) -> &[Vec<u8>] {
        &self.density
    }

    /// Encode the map-state body: density grid, then the wall list
    /// (count 0 unless the receiver may see full geometry).
    pub fn encode(&self, w: &mut ByteWriter, with_walls: bool) {
        w.write_i8(self.density.len() as i8);
        for row in &self.density {
            for cell in row {
                w.write_u8(*cell);
            }
        }

        if !with_walls {
            w.write_i32(0);
            return;
        }

        w.write_i32(self.walls.len() as i32);
        for wall in &self.walls {
            wall.encode(w);
        }
    }

    /// Randomized Prim from the given start cell: repeatedly pick a frontier
    /// wall at random and knock it down when it leads to an unvisited cell.
    fn generate_maze<R: Rng>(&mut self, rng: &mut R, start_row: usize, start_col: usize) {
        let mut visited = vec![vec![false; self.size]; self.size];
        visited[start_row][start_col] = true;

        // (neighbor_row, neighbor_col, direction, parent_row, parent_col)
        let mut frontier: Vec<(i32, i32, usize, usize, usize)> = Vec::new();
        for (dir, (dr, dc)) in DIRECTIONS.iter().enumerate() {
            frontier.push((
                start_row as i32 + dr,
                start_col as i32 + dc,
                dir,
                start_row,
                start_col,
            ));
        }

        while !frontier.is_empty() {
            let idx = rng.gen_range(0..frontier.len());
            let (nr, nc, dir, pr, pc) = frontier.swap_remove(idx);

            if nr < 0 || nr >= self.size as i32 || nc < 0 || nc >= self.size as i32 {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            if visited[nr][nc] {
                continue;
            }

            self.remove_wall(pr, pc, nr, nc, dir);
            visited[nr][nc] = true;

            for (dir, (dr, dc)) in DIRECTIONS.iter().enumerate() {
                frontier.push((nr as i32 + dr, nc as i32 + dc, dir, nr, nc));
            }
        }
    }

    fn remove_wall(&mut self, pr: usize, pc: usize, nr: usize, nc: usize, direction: usize) {
        match direction {
            0 => {
                self.grid[pr][pc].n = false;
                self.grid[nr][nc].s = false;
            }
            1 => {
                self.grid[pr][pc].s = false;
                self.grid[nr][nc].n = false;
            }
            2 => {
                self.grid[pr][pc].e = false;
                self.grid[nr][nc].w = false;
            }
            3 => {
                self.grid[pr][pc].w = false;
                self.grid[nr][nc].e = false;
            }
            _ => {}
        }
    }

    /// Emit one 2-point segment collider per still-raised wall bit.
    /// Shared edges between neighbors are emitted by both cells; collision
    /// queries are read-only so duplicates only cost time.
    fn generate_colliders(&mut self) {
        self.walls.clear();

        for (i, row) in self.grid.iter().enumerate() {
            let (top, bottom) = (i as f64 * CELL_WIDTH, (i + 1) as f64 * CELL_WIDTH);
            for (j, cell) in row.iter().enumerate() {
                let (left, right) = (j as f64 * CELL_WIDTH, (j + 1) as f64 * CELL_WIDTH);

                if cell.n {
                    self.walls.push(Collider::wall(vec![
                        Point::new(left, top),
                        Point::new(right, top),
                    ]));
                }
                if cell.s {
                    self.walls.push(Collider::wall(vec![
                        Point::new(left, bottom),
                        Point::new(right, bottom),
                    ]));
                }
                if cell.e {
                    self.walls.push(Collider::wall(vec![
                        Point::new(right, top),
                        Point::new(right, bottom),
                    ]));
                }
                if cell.w {
                    self.walls.push(Collider::wall(vec![
                        Point::new(left, top),
                        Point::new(left, bottom),
                    ]));
                }
            }
        }
    }

    /// Count boundary walls per n x n cell block. North walls count only on
    /// the block's top row and west walls only on its left column, so the
    /// interior shared edges are not double counted.
    fn count_walls_in_subsquares(&mut self, n: usize) {
        let blocks = MAP_WIDTH / n;
        self.density = vec![vec![0u8; blocks]; blocks];

        for bi in 0..blocks {
            for bj in 0..blocks {
                let (i0, j0) = (bi * n, bj * n);
                let mut count = 0u8;
                for i in i0..(i0 + n).min(MAP_WIDTH) {
                    for j in j0..(j0 + n).min(MAP_WIDTH) {
                        let cell = self.grid[i][j];
                        if cell.n && i == i0 {
                            count += 1;
                        }
                        if cell.s {
                            count += 1;
                        }
                        if cell.e {
                            count += 1;
                        }
                        if cell.w && j == j0 {
                            count += 1;
                        }
                    }
                }
                self.density[bi][bj] = count;
            }
        }
    }

    /// Expand each cell into n x n subcells carrying the parent's walls only
    /// on their outer edges.
    fn subdivide(&self, n: usize) -> Vec<Vec<Cell>> {
        let mut grid = vec![vec![Cell::default(); MAP_WIDTH * n]; MAP_WIDTH * n];

        for (i, row) in self.grid.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                for k in 0..n {
                    for l in 0..n {
                        grid[i * n + k][j * n + l] = Cell {
                            n: cell.n && k == 0,
                            s: cell.s && k == n - 1,
                            e: cell.e && l == n - 1,
                            w: cell.w && l == 0,
                        };
                    }
                }
            }
        }

        grid
    }

    /// Build both spawn sets.
    ///
    /// Phase 0: every cell center plus four cardinal offsets per cell.
    /// Phase 1: subsquare centers whose graph distance from the maze start
    /// sits around `FOCUSED_RANGE`, widening the band until at least
    /// `MIN_FOCUS_SPAWNS` points are gathered; subsquares on cell borders
    /// are excluded.
    fn collect_spawn_points(&mut self, distances: &[Vec<u32>]) {
        self.spawns[0].clear();
        for i in 0..MAP_WIDTH {
            for j in 0..MAP_WIDTH {
                let center = Point::new(
                    j as f64 * CELL_WIDTH + CELL_WIDTH / 2.0,
                    i as f64 * CELL_WIDTH + CELL_WIDTH / 2.0,
                );

                for (dr, dc) in DIRECTIONS {
                    self.spawns[0].push(Point::new(
                        center.x + dc as f64 * PLAYER_SIZE * 1.5,
                        center.y + dr as f64 * PLAYER_SIZE * 1.5,
                    ));
                }
                self.spawns[0].push(center);
            }
        }

        let is_limit = |n: usize| n % NUM_SUBSQUARE == 0 || n % NUM_SUBSQUARE == NUM_SUBSQUARE - 1;

        let mut by_distance: HashMap<u32, Vec<Point>> = HashMap::new();
        let mut max_distance = 0u32;
        for (i, row) in distances.iter().enumerate() {
            for (j, dist) in row.iter().enumerate() {
                if *dist == u32::MAX || is_limit(i) || is_limit(j) {
                    continue;
                }
                max_distance = max_distance.max(*dist);
                by_distance.entry(*dist).or_default().push(Point::new(
                    j as f64 * SUBSQUARE_WIDTH,
                    i as f64 * SUBSQUARE_WIDTH,
                ));
            }
        }

        let mut positions: Vec<Point> = Vec::with_capacity(MIN_FOCUS_SPAWNS);
        let mut dist = FOCUSED_RANGE.saturating_sub(1);
        while (dist <= FOCUSED_RANGE + 1 || positions.len() < MIN_FOCUS_SPAWNS)
            && dist <= max_distance
        {
            if let Some(points) = by_distance.get(&dist) {
                positions.extend_from_slice(points);
            }
            dist += 1;
        }

        self.spawns[1] = positions;
    }
}

/// Shortest path distances over the subdivided grid from the given subcell.
fn dijkstra(start_row: usize, start_col: usize, grid: &[Vec<Cell>]) -> Vec<Vec<u32>> {
    let height = grid.len();
    let width = grid[0].len();

    let mut dist = vec![vec![u32::MAX; width]; height];
    dist[start_row][start_col] = 0;

    // Min-heap of (distance, row, col). All edges cost 1 here, so this
    // degrades to BFS, but the heap keeps the shape of the general algorithm.
    let mut heap: BinaryHeap<Reverse<(u32, usize, usize)>> = BinaryHeap::new();
    heap.push(Reverse((0, start_row, start_col)));

    while let Some(Reverse((d, row, col))) = heap.pop() {
        if d > dist[row][col] {
            continue;
        }

        for (dir, (dr, dc)) in DIRECTIONS.iter().enumerate() {
            let (nr, nc) = (row as i32 + dr, col as i32 + dc);
            if nr < 0 || nr >= height as i32 || nc < 0 || nc >= width as i32 {
                continue;
            }
            if grid[row][col].wall(dir) {
                continue;
            }

            let (nr, nc) = (nr as usize, nc as usize);
            let next = d + 1;
            if next < dist[nr][nc] {
                dist[nr][nc] = next;
                heap.push(Reverse((next, nr, nc)));
            }
        }
    }

    dist
}

// =============================================================================
// TESTS
// =============================================================================
