//! The static obstacle grid.
//!
//! Cells are either free (`.`) or obstacle (`#`).  Dimensions are fixed at
//! construction; all queries are bounds-checked and O(1).  The grid is the
//! only world component shared read-only with the parallel planning phase,
//! so it is deliberately plain data with no interior mutability.

use std::collections::VecDeque;

use sg_core::Cell;

use crate::{WorldError, WorldResult};

/// A 2D obstacle map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: i32,
    height: i32,
    /// Row-major free/blocked flags; `true` = free.
    cells: Vec<bool>,
}

impl Grid {
    /// Build a grid from pre-validated ASCII rows.
    ///
    /// Rows must be non-empty, of equal width, and contain only `.` and `#`.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> WorldResult<Grid> {
        if rows.is_empty() {
            return Err(WorldError::InvalidMap("empty grid".into()));
        }
        let width = rows[0].as_ref().chars().count();
        if width == 0 {
            return Err(WorldError::InvalidMap("empty grid row".into()));
        }

        let mut cells = Vec::with_capacity(width * rows.len());
        for row in rows {
            let row = row.as_ref();
            let got = row.chars().count();
            if got != width {
                return Err(WorldError::RaggedGrid { expected: width, got });
            }
            for c in row.chars() {
                match c {
                    '.' => cells.push(true),
                    '#' => cells.push(false),
                    other => return Err(WorldError::InvalidChar(other)),
                }
            }
        }

        Ok(Grid {
            width: width as i32,
            height: rows.len() as i32,
            cells,
        })
    }

    /// Parse map text: blank lines and comment lines (starting with `/`) are
    /// skipped, surrounding whitespace is trimmed per line.
    pub fn parse(text: &str) -> WorldResult<Grid> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('/'))
            .collect();
        Grid::from_rows(&rows)
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Total cell count, free and blocked.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    #[inline]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.x < self.width && cell.y >= 0 && cell.y < self.height
    }

    /// `true` if `cell` is in bounds and not an obstacle.
    #[inline]
    pub fn is_free(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && self.cells[self.idx(cell)]
    }

    #[inline]
    fn idx(&self, cell: Cell) -> usize {
        (cell.y * self.width + cell.x) as usize
    }

    /// All free cells in row-major order (y outer, x inner).  The stable
    /// order matters: the world builder shuffles this list with a seeded RNG.
    pub fn free_cells(&self) -> Vec<Cell> {
        let mut free = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let cell = Cell::new(x, y);
                if self.is_free(cell) {
                    free.push(cell);
                }
            }
        }
        free
    }

    /// The free 4-neighbors of `cell`, in N, E, S, W order.
    pub fn neighbors4(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        cell.neighbors4().into_iter().filter(|&c| self.is_free(c))
    }

    /// BFS reachability between two cells over free cells only.
    pub fn is_reachable(&self, start: Cell, goal: Cell) -> bool {
        if !self.is_free(start) || !self.is_free(goal) {
            return false;
        }
        let mut visited = vec![false; self.cells.len()];
        let mut frontier = VecDeque::new();
        visited[self.idx(start)] = true;
        frontier.push_back(start);

        while let Some(current) = frontier.pop_front() {
            if current == goal {
                return true;
            }
            for next in self.neighbors4(current) {
                let i = self.idx(next);
                if !visited[i] {
                    visited[i] = true;
                    frontier.push_back(next);
                }
            }
        }
        false
    }
}
