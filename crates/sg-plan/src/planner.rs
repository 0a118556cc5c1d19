//! Cooperative A* over the (cell, tick) lattice.
//!
//! # Search space
//!
//! Nodes are `(cell, tick)` pairs.  From `(c, t)` the successors are the
//! free 4-neighbors of `c` plus `c` itself (a wait), all at `t + 1`, so a
//! plan can trade time for space — the essence of cooperative pathfinding.
//!
//! # Conflict model
//!
//! A successor `(c', t+1)` is rejected when:
//! - **vertex**: another agent holds `(c', t+1)` in the reservation table;
//! - **swap**: for a real move (`c' ≠ c`), some agent B holds both
//!   `(c', t)` and `(c, t+1)` — B is coming the other way through the same
//!   edge.
//!
//! # Termination
//!
//! Expansion stops at `start_tick + 2·width·height`.  On a finite grid that
//! horizon bounds the state space, so the search always terminates; a goal
//! not reachable within it yields the empty path and the caller treats the
//! tick as a wait.

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};

use sg_core::{AgentId, Cell, Path, Tick};
use sg_world::Grid;

use crate::ReservationTable;

/// Stateless space-time planner.  All inputs arrive per call, so one
/// instance serves every agent — including concurrently during the parallel
/// planning phase.
#[derive(Default)]
pub struct SpaceTimePlanner;

/// One expanded search node, kept in an arena so the heap can stay `Copy`.
struct Node {
    cell: Cell,
    tick: Tick,
    g: u32,
    parent: Option<usize>,
}

impl SpaceTimePlanner {
    pub fn new() -> Self {
        SpaceTimePlanner
    }

    /// Plan from `start` to `goal` beginning at `start_tick`.
    ///
    /// The returned path begins with `start`; index `i` is the cell held at
    /// `start_tick + i`.  Empty when no conflict-free path exists within the
    /// horizon, or when `start`/`goal` is not a free cell.
    pub fn plan(
        &self,
        grid: &Grid,
        start: Cell,
        goal: Cell,
        reservations: &ReservationTable,
        agent: AgentId,
        start_tick: Tick,
    ) -> Path {
        if !grid.is_free(start) || !grid.is_free(goal) {
            return Path::new();
        }

        let horizon = Tick(start_tick.0 + 2 * grid.area());

        let mut nodes: Vec<Node> = Vec::new();
        let mut g_score: HashMap<(Cell, Tick), u32> = HashMap::new();
        // Min-heap on (f, arena index); the monotonically growing index
        // breaks f-ties in insertion order.
        let mut open: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();

        nodes.push(Node { cell: start, tick: start_tick, g: 0, parent: None });
        g_score.insert((start, start_tick), 0);
        open.push(Reverse((start.manhattan(goal), 0)));

        while let Some(Reverse((_, idx))) = open.pop() {
            let (cell, tick, g) = {
                let n = &nodes[idx];
                (n.cell, n.tick, n.g)
            };

            // A better route to this (cell, tick) was expanded since this
            // entry was pushed.
            if g_score.get(&(cell, tick)).is_some_and(|&best| g > best) {
                continue;
            }

            if cell == goal {
                return reconstruct(&nodes, idx);
            }

            if tick >= horizon {
                continue;
            }

            let next_tick = tick + 1;
            let mut successors = cell.neighbors4().to_vec();
            successors.push(cell); // waiting in place is always a candidate

            for next_cell in successors {
                if !grid.is_free(next_cell) {
                    continue;
                }
                // Vertex conflict: the slot is already claimed by a peer.
                if reservations.is_reserved_by_other(next_cell, next_tick, agent) {
                    continue;
                }
                // Swap conflict: a peer crosses this edge in the opposite
                // direction between the same two ticks.
                if next_cell != cell {
                    if let Some(other) = reservations.owner(next_cell, tick) {
                        if other != agent && reservations.owner(cell, next_tick) == Some(other) {
                            continue;
                        }
                    }
                }

                let tentative = g + 1;
                match g_score.entry((next_cell, next_tick)) {
                    Entry::Occupied(mut e) => {
                        if tentative >= *e.get() {
                            continue;
                        }
                        e.insert(tentative);
                    }
                    Entry::Vacant(e) => {
                        e.insert(tentative);
                    }
                }

                let f = tentative + next_cell.manhattan(goal);
                nodes.push(Node {
                    cell: next_cell,
                    tick: next_tick,
                    g: tentative,
                    parent: Some(idx),
                });
                open.push(Reverse((f, nodes.len() - 1)));
            }
        }

        Path::new()
    }
}

fn reconstruct(nodes: &[Node], mut idx: usize) -> Path {
    let mut path = Vec::new();
    loop {
        path.push(nodes[idx].cell);
        match nodes[idx].parent {
            Some(p) => idx = p,
            None => break,
        }
    }
    path.reverse();
    path
}
