//! Coordination messages.
//!
//! Three kinds travel over the bus.  Announcements and goal notices carry a
//! remaining path; a state sync additionally carries a full reservation
//! table snapshot behind an `Arc`, because the same snapshot is referenced
//! by one queued delivery per recipient.

use std::sync::Arc;

use sg_core::{AgentId, Cell, Path, Tick, VectorClock};
use sg_plan::ReservationTable;

/// Tag for the three message variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// The sender's remaining planned path from its current position.
    PathAnnouncement,
    /// A full copy of the sender's local reservation table.
    StateSync,
    /// The sender is parked on its goal; the carried path is a long
    /// constant-cell hold on that square.
    GoalReached,
}

/// One broadcast from one agent.
#[derive(Clone, Debug)]
pub struct Message {
    pub from: AgentId,
    pub kind: MessageKind,
    /// The sender's immediate intent: the next cell it will occupy.
    pub next: Cell,
    /// The tick at which the message was sent; path entries are interpreted
    /// relative to this.
    pub timestamp: Tick,
    /// Remaining path from the sender's current position.  For parked or
    /// stopped senders this is their cell repeated many times over.
    pub planned_path: Path,
    /// Per-tick sequence number (equals the send tick); receivers use it to
    /// discard stale or duplicate state syncs.
    pub sequence_number: u64,
    /// Present only on [`MessageKind::StateSync`].
    pub full_state: Option<Arc<ReservationTable>>,
    /// The sender's causal clock at send time.
    pub vector_clock: VectorClock,
}

impl Message {
    /// Shorthand for an announcement-style message with no attached state.
    pub fn announcement(
        from: AgentId,
        kind: MessageKind,
        next: Cell,
        timestamp: Tick,
        planned_path: Path,
        vector_clock: VectorClock,
    ) -> Self {
        Message {
            from,
            kind,
            next,
            timestamp,
            planned_path,
            sequence_number: timestamp.0,
            full_state: None,
            vector_clock,
        }
    }

    /// A state sync carrying a shared snapshot of the sender's table.
    pub fn state_sync(
        from: AgentId,
        next: Cell,
        timestamp: Tick,
        state: Arc<ReservationTable>,
        vector_clock: VectorClock,
    ) -> Self {
        Message {
            from,
            kind: MessageKind::StateSync,
            next,
            timestamp,
            planned_path: Path::new(),
            sequence_number: timestamp.0,
            full_state: Some(state),
            vector_clock,
        }
    }
}
