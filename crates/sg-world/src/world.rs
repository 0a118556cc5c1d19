//! The live world and its seeded builder.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use sg_core::{AgentId, Cell, SimRng, Tick};

use crate::{AgentState, Grid, WorldError, WorldResult};

// ── World ─────────────────────────────────────────────────────────────────────

/// The shared simulation state: the immutable grid, the agent vector, and
/// the current tick.
///
/// `World` enforces cell validity on every position write but deliberately
/// not single occupancy — the simulator applies all of a tick's moves
/// simultaneously and audits multi-occupancy afterwards.
#[derive(Clone, Debug)]
pub struct World {
    pub grid: Grid,
    pub agents: Vec<AgentState>,
    pub tick: Tick,
    pub seed: u64,
}

impl World {
    #[inline]
    pub fn advance_tick(&mut self) {
        self.tick = Tick(self.tick.0 + 1);
    }

    /// `true` if any agent other than `exclude` currently occupies `cell`.
    pub fn is_occupied(&self, cell: Cell, exclude: Option<AgentId>) -> bool {
        self.agents
            .iter()
            .any(|a| Some(a.id) != exclude && a.pos == cell)
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentState> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut AgentState> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    /// Move `id` to `new_pos` if the cell is valid and not an obstacle.
    ///
    /// Occupancy is intentionally not checked: all of a tick's moves land
    /// together and the collision audit sorts out the aftermath.  Latches
    /// `at_goal` on arrival.  Returns `false` (and leaves the agent in
    /// place) when the target cell is unusable.
    pub fn set_position(&mut self, id: AgentId, new_pos: Cell) -> bool {
        if !self.grid.is_free(new_pos) {
            return false;
        }
        let Some(agent) = self.agents.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        agent.pos = new_pos;
        if agent.pos == agent.goal {
            agent.at_goal = true;
        }
        true
    }

    pub fn all_at_goal(&self) -> bool {
        self.agents.iter().all(|a| a.at_goal)
    }

    /// Agents still working toward their goal.
    pub fn active_agents(&self) -> usize {
        self.agents.iter().filter(|a| a.is_active()).count()
    }

    /// Partition agents by cell and return every multi-occupied cell with
    /// its occupants, in deterministic cell order.  Occupant order follows
    /// the agent vector.
    pub fn detect_collisions(&self) -> BTreeMap<Cell, Vec<AgentId>> {
        let mut by_cell: BTreeMap<Cell, Vec<AgentId>> = BTreeMap::new();
        for agent in &self.agents {
            by_cell.entry(agent.pos).or_default().push(agent.id);
        }
        by_cell.retain(|_, ids| ids.len() > 1);
        by_cell
    }
}

// ── WorldBuilder ──────────────────────────────────────────────────────────────

/// Seeded builder for [`World`].
///
/// Explicit agents are validated for reachability; random agents are placed
/// on distinct shuffled free cells whose (start, goal) pairs are
/// BFS-connected.  The same seed always yields the same world, agent
/// identities included.
pub struct WorldBuilder {
    rng: SimRng,
    seed: u64,
    grid: Option<Grid>,
    agent_specs: Vec<(Cell, Cell)>,
    random_agents: usize,
}

impl WorldBuilder {
    pub fn new(seed: u64) -> Self {
        WorldBuilder {
            rng: SimRng::new(seed),
            seed,
            grid: None,
            agent_specs: Vec::new(),
            random_agents: 0,
        }
    }

    pub fn grid(mut self, grid: Grid) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Add one agent with an explicit start and goal.
    pub fn agent(mut self, start: Cell, goal: Cell) -> Self {
        self.agent_specs.push((start, goal));
        self
    }

    /// Add `n` agents on randomly drawn, mutually distinct free cells.
    pub fn random_agents(mut self, n: usize) -> Self {
        self.random_agents = n;
        self
    }

    pub fn build(mut self) -> WorldResult<World> {
        let grid = self
            .grid
            .take()
            .ok_or_else(|| WorldError::InvalidMap("no grid supplied".into()))?;

        let mut agents = Vec::new();

        // Explicit agents first, in declaration order.
        for &(start, goal) in &self.agent_specs {
            if !grid.is_free(start) {
                return Err(WorldError::BlockedCell(start));
            }
            if !grid.is_free(goal) {
                return Err(WorldError::BlockedCell(goal));
            }
            if !grid.is_reachable(start, goal) {
                return Err(WorldError::UnreachableAgent { start, goal });
            }
            let id = AgentId::generate(&mut self.rng);
            agents.push(AgentState::new(id, start, goal));
        }

        // Then random agents on shuffled free cells.
        if self.random_agents > 0 {
            let mut free = grid.free_cells();
            if free.len() < self.random_agents * 2 {
                return Err(WorldError::PlacementFailed {
                    requested: self.random_agents,
                });
            }
            self.rng.shuffle(&mut free);

            let mut used: HashSet<Cell> = HashSet::new();
            for agent in &agents {
                used.insert(agent.pos);
                used.insert(agent.goal);
            }

            let mut added = 0;
            'outer: for i in 0..free.len() {
                if added == self.random_agents {
                    break;
                }
                if used.contains(&free[i]) {
                    continue;
                }
                for j in (i + 1)..free.len() {
                    if !used.contains(&free[j]) && grid.is_reachable(free[i], free[j]) {
                        let id = AgentId::generate(&mut self.rng);
                        agents.push(AgentState::new(id, free[i], free[j]));
                        used.insert(free[i]);
                        used.insert(free[j]);
                        added += 1;
                        continue 'outer;
                    }
                }
            }

            if added < self.random_agents {
                return Err(WorldError::PlacementFailed {
                    requested: self.random_agents,
                });
            }
        }

        debug!(agents = agents.len(), seed = self.seed, "world built");

        Ok(World {
            grid,
            agents,
            tick: Tick::ZERO,
            seed: self.seed,
        })
    }
}
