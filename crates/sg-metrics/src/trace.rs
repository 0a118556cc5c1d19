//! Per-tick trace records.

use sg_core::{AgentId, Cell, Tick};

/// Everything recorded about one simulation tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickTrace {
    pub tick: Tick,
    /// Every agent's position at the end of the tick, in agent order.
    pub agent_positions: Vec<(AgentId, Cell)>,
    /// Agents not yet at their goal after this tick.
    pub active_agents: usize,
    /// Broadcast attempts made during this tick.
    pub messages_sent: u64,
}

/// One flattened CSV row: a `TickTrace` contributes one row per agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceRow {
    pub tick: u64,
    pub agent_id: AgentId,
    pub x: i32,
    pub y: i32,
    pub active_agents: usize,
    pub messages_sent: u64,
}

impl TickTrace {
    /// Flatten into CSV rows, one per agent.
    pub fn rows(&self) -> impl Iterator<Item = TraceRow> + '_ {
        self.agent_positions.iter().map(move |&(agent_id, pos)| TraceRow {
            tick: self.tick.0,
            agent_id,
            x: pos.x,
            y: pos.y,
            active_agents: self.active_agents,
            messages_sent: self.messages_sent,
        })
    }
}
