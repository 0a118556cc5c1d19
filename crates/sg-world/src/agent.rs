//! Per-agent world state.

use sg_core::{AgentId, Cell, Path};

/// The authoritative state of one agent as the simulator sees it.
///
/// Two flags latch:
/// - `at_goal` is set the moment `pos == goal` and never clears until a full
///   world reset.
/// - `collision_stopped` is set when the collision audit fails to displace
///   this agent out of a multi-occupied cell; only the deadlock resolver
///   clears it.
#[derive(Clone, Debug)]
pub struct AgentState {
    pub id: AgentId,
    pub pos: Cell,
    pub goal: Cell,
    /// The most recently installed plan, mirrored from the agent's
    /// controller for tracing and inspection.
    pub planned_path: Path,
    /// Cursor into `planned_path`: the next cell to step onto.
    pub path_index: usize,
    pub at_goal: bool,
    pub collision_stopped: bool,
}

impl AgentState {
    pub fn new(id: AgentId, pos: Cell, goal: Cell) -> Self {
        AgentState {
            id,
            pos,
            goal,
            planned_path: Path::new(),
            path_index: 0,
            at_goal: pos == goal,
            collision_stopped: false,
        }
    }

    /// `true` while this agent still has work to do.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.at_goal
    }
}
