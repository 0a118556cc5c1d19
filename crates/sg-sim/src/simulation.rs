//! The `Simulation` driver and its phase implementations.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, error, info, warn};

use sg_coord::{AgentController, MAX_WAIT, REDUNDANCY};
use sg_core::{AgentId, Cell, Tick, DISPLACE_OFFSETS};
use sg_metrics::{MetricsCollector, MetricsSnapshot, TickTrace};
use sg_net::Network;
use sg_plan::SpaceTimePlanner;
use sg_world::{Grid, World};

use crate::{SimError, SimObserver, SimResult};

// ── Configuration ─────────────────────────────────────────────────────────────

/// Driver-level knobs.  Transport behavior is configured on the network
/// adapter, not here.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Hard stop: the run never exceeds this many ticks.
    pub max_ticks: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig { max_ticks: 1000 }
    }
}

// ── Plan-phase snapshot ───────────────────────────────────────────────────────

/// Read-only per-agent world data captured before the planning phase, so
/// that phase touches nothing shared beyond the immutable grid.
struct PlanInput {
    pos: Cell,
    goal: Cell,
    at_goal: bool,
    collision_stopped: bool,
}

// ── Simulation ────────────────────────────────────────────────────────────────

/// The simulation driver: owns the world, the per-agent controllers, the
/// transport, and the metrics for one run.
pub struct Simulation<N: Network> {
    world: World,
    /// Pristine copy for [`reset`][Self::reset].
    initial_world: World,
    planner: SpaceTimePlanner,
    network: N,
    controllers: Vec<AgentController>,
    metrics: MetricsCollector,
    config: SimulationConfig,
    index_of: HashMap<AgentId, usize>,
}

impl<N: Network> Simulation<N> {
    /// Build a simulation over `world`, validating that every agent starts
    /// on its own free cell.
    pub fn new(world: World, network: N, config: SimulationConfig) -> SimResult<Self> {
        let mut seen: HashMap<Cell, AgentId> = HashMap::new();
        for agent in &world.agents {
            if !world.grid.is_free(agent.pos) {
                return Err(SimError::BlockedStart(agent.id));
            }
            if let Some(&other) = seen.get(&agent.pos) {
                return Err(SimError::OverlappingStarts(other, agent.id));
            }
            seen.insert(agent.pos, agent.id);
        }

        let controllers = make_controllers(&world);
        let index_of = world
            .agents
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id, i))
            .collect();

        Ok(Simulation {
            initial_world: world.clone(),
            world,
            planner: SpaceTimePlanner::new(),
            network,
            controllers,
            metrics: MetricsCollector::new(),
            config,
            index_of,
        })
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Run to completion and return the final metrics.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> MetricsSnapshot {
        info!(
            agents = self.world.agents.len(),
            max_ticks = self.config.max_ticks,
            seed = self.world.seed,
            "simulation starting"
        );
        self.metrics.start_timer();

        while !self.world.all_at_goal() {
            if self.world.tick.0 >= self.config.max_ticks {
                warn!(tick = %self.world.tick, "maximum tick limit reached");
                break;
            }
            let now = self.world.tick;
            observer.on_tick_start(now);
            let trace = self.step_internal();
            observer.on_tick_end(now, &trace);
            self.world.advance_tick();
        }

        self.metrics.stop_timer();
        self.metrics.set_makespan(self.world.tick);

        // Final safety audit: a run that ends with shared cells failed even
        // if every per-tick audit displaced its way out.
        if !self.world.detect_collisions().is_empty() {
            self.metrics.record_collision();
        }

        let snapshot = self.metrics.snapshot();
        observer.on_sim_end(self.world.tick, &snapshot);
        info!(
            makespan = snapshot.makespan,
            messages = snapshot.total_messages,
            replans = snapshot.total_replans,
            collision = snapshot.collision_detected,
            "simulation complete"
        );
        snapshot
    }

    /// Advance exactly one tick (no-op once complete).  For incremental
    /// drivers and tests.
    pub fn step(&mut self) {
        if self.is_complete() {
            return;
        }
        self.step_internal();
        self.world.advance_tick();
    }

    /// `true` when every agent is home or the tick budget is spent.
    pub fn is_complete(&self) -> bool {
        self.world.all_at_goal() || self.world.tick.0 >= self.config.max_ticks
    }

    /// Restore the initial world, fresh controllers, an empty bus, and
    /// zeroed metrics.
    pub fn reset(&mut self) {
        self.world = self.initial_world.clone();
        self.controllers = make_controllers(&self.world);
        self.metrics.reset();
        self.network.reset();
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn current_tick(&self) -> Tick {
        self.world.tick
    }

    // ── Tick body ─────────────────────────────────────────────────────────

    fn step_internal(&mut self) -> TickTrace {
        let now = self.world.tick;
        debug!(tick = %now, active = self.world.active_agents(), "tick");

        self.receive_and_rebuild(now);
        self.plan_agent_moves(now);
        let sent_this_tick = self.broadcast_intents(now);
        self.validate_intents(now);
        self.resolve_deadlocks(now);
        self.execute_moves(now);
        self.audit_collisions(now);

        let trace = TickTrace {
            tick: now,
            agent_positions: self.world.agents.iter().map(|a| (a.id, a.pos)).collect(),
            active_agents: self.world.active_agents(),
            messages_sent: sent_this_tick,
        };
        self.metrics.record_tick_trace(trace.clone());
        trace
    }

    /// Phase ①: drain the bus for every agent and rebuild its local view.
    /// A lookahead conflict against a peer's announcement marks the loser
    /// for replanning here.
    fn receive_and_rebuild(&mut self, now: Tick) {
        for ctrl in &mut self.controllers {
            let messages = self.network.receive(ctrl.id, now);
            let yields = ctrl.ingest(&messages, now);
            if yields > 0 {
                self.metrics.record_replans(yields as u64);
            }
        }
    }

    /// Phase ②: plan for every agent that needs it.  Controllers only touch
    /// their own state, so with the `parallel` feature the loop fans out;
    /// escalation counts are folded into metrics after the join to keep the
    /// counter deterministic.
    fn plan_agent_moves(&mut self, now: Tick) {
        let inputs = self.plan_inputs();
        let planner = &self.planner;
        let grid = &self.world.grid;

        #[cfg(not(feature = "parallel"))]
        let escalations: u64 = self
            .controllers
            .iter_mut()
            .zip(&inputs)
            .map(|(ctrl, input)| plan_one(planner, grid, ctrl, input, now, false))
            .sum();

        #[cfg(feature = "parallel")]
        let escalations: u64 = {
            use rayon::prelude::*;
            self.controllers
                .par_iter_mut()
                .zip(inputs.par_iter())
                .map(|(ctrl, input)| plan_one(planner, grid, ctrl, input, now, false))
                .sum()
        };

        if escalations > 0 {
            self.metrics.record_replans(escalations);
        }
        self.mirror_paths();
    }

    /// Phase ③: every agent announces, parked and stopped agents included;
    /// each logical message goes out [`REDUNDANCY`] times.  Returns the
    /// tick's send count from the transport's own counters.
    fn broadcast_intents(&mut self, now: Tick) -> u64 {
        let before = self.network.stats();
        for (ctrl, agent) in self.controllers.iter_mut().zip(&self.world.agents) {
            let messages = ctrl.make_broadcast(agent.pos, agent.at_goal, agent.collision_stopped, now);
            for message in messages {
                for _ in 0..REDUNDANCY {
                    self.network.send(message.clone());
                }
            }
        }
        let after = self.network.stats();
        self.metrics.record_messages_sent(after.sent - before.sent);
        self.metrics.record_messages_dropped(after.dropped - before.dropped);
        after.sent - before.sent
    }

    /// Phase ④: collect every active agent's intended next cell (a pathless
    /// agent intends to stay put).  Any cell wanted twice forces all takers
    /// into an immediate sequential replan.
    fn validate_intents(&mut self, now: Tick) {
        let mut targets: BTreeMap<Cell, Vec<usize>> = BTreeMap::new();
        for (i, agent) in self.world.agents.iter().enumerate() {
            if agent.at_goal {
                continue;
            }
            let next = if agent.collision_stopped {
                agent.pos
            } else {
                self.controllers[i].intended_next(agent.pos)
            };
            targets.entry(next).or_default().push(i);
        }

        let mut contested: Vec<usize> = targets
            .values()
            .filter(|takers| takers.len() > 1)
            .flatten()
            .copied()
            .collect();
        if contested.is_empty() {
            return;
        }
        contested.sort_unstable();

        debug!(tick = %now, agents = contested.len(), "pre-execution intent clash");
        self.metrics.record_replans(contested.len() as u64);

        let inputs = self.plan_inputs();
        for &i in &contested {
            self.controllers[i].needs_replan = true;
            let input = &inputs[i];
            if input.collision_stopped {
                continue; // only the resolver restarts stopped agents
            }
            let escalations =
                plan_one(&self.planner, &self.world.grid, &mut self.controllers[i], input, now, true);
            if escalations > 0 {
                self.metrics.record_replans(escalations);
            }
        }
        self.mirror_paths();
    }

    /// Phase ⑤: update stuckness, then reset the lower-priority half of the
    /// deadlocked set (ids ascending; the upper half of the sorted list),
    /// staggering their restarts.
    fn resolve_deadlocks(&mut self, now: Tick) {
        for (ctrl, agent) in self.controllers.iter_mut().zip(&self.world.agents) {
            if !agent.at_goal {
                ctrl.observe_position(agent.pos, now);
            }
        }

        let mut deadlocked: Vec<usize> = (0..self.controllers.len())
            .filter(|&i| {
                let agent = &self.world.agents[i];
                !agent.at_goal && self.controllers[i].is_deadlocked(agent.collision_stopped)
            })
            .collect();
        if deadlocked.is_empty() {
            return;
        }
        deadlocked.sort_by_key(|&i| self.controllers[i].id);

        let keep = deadlocked.len() / 2;
        for (rank, &i) in deadlocked.iter().enumerate().skip(keep) {
            let wait = 3 + (rank as u32 % MAX_WAIT);
            warn!(
                tick = %now,
                agent = %self.controllers[i].id.short(),
                wait,
                "deadlock resolver: clearing plan"
            );
            self.controllers[i].reset_for_replan(wait);
            let agent = &mut self.world.agents[i];
            agent.collision_stopped = false;
            agent.planned_path.clear();
            agent.path_index = 0;
        }
    }

    /// Phase ⑥: apply every pending move into the world.  All writes land
    /// together — occupancy is deliberately not consulted, the audit phase
    /// owns that — so move order cannot privilege any agent.
    fn execute_moves(&mut self, now: Tick) {
        for i in 0..self.controllers.len() {
            let (id, at_goal, stopped, goal) = {
                let a = &self.world.agents[i];
                (a.id, a.at_goal, a.collision_stopped, a.goal)
            };
            if at_goal || stopped || !self.controllers[i].has_pending_path() {
                continue;
            }

            let next = self.controllers[i].current_path[self.controllers[i].path_index];
            if self.world.set_position(id, next) {
                let ctrl = &mut self.controllers[i];
                ctrl.path_index += 1;
                ctrl.last_intent = next;
                self.world.agents[i].path_index = ctrl.path_index;
                if next == goal {
                    info!(tick = %now, agent = %id.short(), "agent reached goal");
                }
            } else {
                // The plan pointed at an unusable cell; treat as a failed
                // move and replan next tick.
                self.controllers[i].needs_replan = true;
                self.metrics.record_replan();
            }
        }
    }

    /// Phase ⑦: any cell holding two or more agents is a collision.  Try to
    /// displace each non-parked occupant to the first free, unoccupied
    /// E/W/S/N neighbor; whoever cannot be displaced is latched stopped.
    fn audit_collisions(&mut self, now: Tick) {
        let collisions = self.world.detect_collisions();
        if collisions.is_empty() {
            return;
        }
        self.metrics.record_collision();

        for (cell, occupants) in &collisions {
            error!(tick = %now, cell = %cell, agents = occupants.len(), "collision detected");
            for id in occupants {
                let i = self.index_of[id];
                // Goal latching outranks displacement: a parked agent keeps
                // its cell, intruders move or stop.
                if !self.world.agents[i].at_goal {
                    let mut displaced = false;
                    for offset in DISPLACE_OFFSETS {
                        let target = cell.offset(offset);
                        if self.world.grid.is_free(target)
                            && !self.world.is_occupied(target, Some(*id))
                        {
                            self.world.set_position(*id, target);
                            displaced = true;
                            break;
                        }
                    }
                    if displaced && self.world.agents[i].at_goal {
                        // Shoved onto its own goal: the leftover plan must
                        // not keep claiming cells it will never visit.
                        self.controllers[i].current_path.clear();
                        self.controllers[i].path_index = 0;
                        self.world.agents[i].planned_path.clear();
                        self.world.agents[i].path_index = 0;
                    }
                    if !displaced {
                        self.world.agents[i].collision_stopped = true;
                        warn!(agent = %id.short(), cell = %cell, "displacement failed, agent stopped");
                    }
                }
                self.controllers[i].needs_replan = true;
                self.metrics.record_replan();
            }
        }
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    fn plan_inputs(&self) -> Vec<PlanInput> {
        self.world
            .agents
            .iter()
            .map(|a| PlanInput {
                pos: a.pos,
                goal: a.goal,
                at_goal: a.at_goal,
                collision_stopped: a.collision_stopped,
            })
            .collect()
    }

    /// Mirror each controller's plan into the authoritative agent state.
    fn mirror_paths(&mut self) {
        for (agent, ctrl) in self.world.agents.iter_mut().zip(&self.controllers) {
            if agent.planned_path != ctrl.current_path {
                agent.planned_path = ctrl.current_path.clone();
            }
            agent.path_index = ctrl.path_index;
        }
    }
}

fn make_controllers(world: &World) -> Vec<AgentController> {
    world
        .agents
        .iter()
        .map(|a| AgentController::new(a.id, a.pos))
        .collect()
}

/// One agent's planning step.
///
/// A positive `wait_counter` means the agent is WAITING — either backing
/// off after planner misses or staggered by the deadlock resolver — and a
/// regular attempt is skipped while the counter burns down.  A `force`d
/// attempt (phase ④ emergency replan) ignores the wait.
///
/// A miss drops the stale plan (executing it is what the miss just proved
/// unsafe), re-raises the replan flag, and grows the back-off by one tick
/// up to [`MAX_WAIT`].  Returns 1 when the back-off saturates, which the
/// caller records as a replan escalation after any parallel fan-out.
fn plan_one(
    planner: &SpaceTimePlanner,
    grid: &Grid,
    ctrl: &mut AgentController,
    input: &PlanInput,
    now: Tick,
    force: bool,
) -> u64 {
    if input.at_goal || input.collision_stopped {
        return 0;
    }
    if !force {
        if ctrl.wait_counter > 0 {
            ctrl.wait_counter -= 1;
            return 0;
        }
        if !ctrl.needs_replan && ctrl.has_pending_path() {
            return 0;
        }
    }

    ctrl.local_reservations.erase_agent(ctrl.id);
    let path = planner.plan(
        grid,
        input.pos,
        input.goal,
        &ctrl.local_reservations,
        ctrl.id,
        now,
    );

    if path.is_empty() {
        ctrl.current_path.clear();
        ctrl.path_index = 0;
        ctrl.needs_replan = true;
        ctrl.wait_counter = (ctrl.wait_counter + 1).min(MAX_WAIT);
        u64::from(ctrl.wait_counter == MAX_WAIT)
    } else {
        debug!(agent = %ctrl.id.short(), len = path.len(), tick = %now, "path planned");
        ctrl.install_path(path, now);
        0
    }
}
