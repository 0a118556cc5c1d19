//! The per-agent coordination controller.
//!
//! # Receive → plan → broadcast
//!
//! Each tick a controller rebuilds `local_reservations` from scratch out of
//! the messages that actually arrived, detects future conflicts against its
//! own remaining path, and then broadcasts its intent.  Everything here is
//! private to one agent; the simulator owns the controllers but never lets
//! them see each other.
//!
//! # Tie-breaks
//!
//! When two paths claim the same cell at the same future tick, exactly one
//! side yields: the agent that sees the sender's clock component ahead of
//! its own backs off, and equal components (including two clockless peers)
//! fall back to identifier order.  One winner per conflict is what lets two
//! perfectly symmetric agents ever get past each other.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use sg_core::{AgentId, Cell, Path, Tick, VectorClock};
use sg_net::{Message, MessageKind};
use sg_plan::ReservationTable;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Ceiling on the planning back-off: repeated planner misses grow the wait
/// one tick at a time up to this many ticks.
pub const MAX_WAIT: u32 = 5;

/// How many steps ahead announced peer paths are checked against our own.
pub const LOOKAHEAD: usize = 15;

/// Copies sent per logical message; drops are independent per copy.
pub const REDUNDANCY: usize = 3;

/// Length of the constant-cell padding announced by parked or stopped
/// agents — a long-lived claim on the square they sit on.
pub const STOPPED_PATH_LEN: usize = 200;

/// Ticks between periodic full-state broadcasts.
pub const STATE_BROADCAST_INTERVAL: u64 = 10;

/// A peer-state silence this long also triggers a full-state broadcast.
pub const STALE_STATE_THRESHOLD: u64 = 15;

/// Ticks without movement before an agent counts as deadlocked.
pub const DEADLOCK_THRESHOLD: u32 = 6;

/// Lower deadlock threshold for collision-stopped agents, which cannot free
/// themselves.
pub const STOPPED_DEADLOCK_THRESHOLD: u32 = 3;

// ── AgentController ───────────────────────────────────────────────────────────

/// Local coordination state for one agent.
///
/// Created when the world is initialized, reset with it, destroyed with the
/// simulator.  The simulator is the only caller; fields are public because
/// the tick loop steps the cursor and flags directly, exactly like the rest
/// of the world state.
pub struct AgentController {
    pub id: AgentId,
    /// The currently installed plan; index 0 is the cell held at the
    /// install tick.
    pub current_path: Path,
    /// Cursor: the next cell of `current_path` to step onto.
    pub path_index: usize,
    /// The last cell this agent successfully moved onto.
    pub last_intent: Cell,
    pub needs_replan: bool,
    /// Back-off countdown: while positive the agent is WAITING and regular
    /// plan attempts are skipped.  Armed by planner misses and by the
    /// deadlock resolver's stagger.
    pub wait_counter: u32,
    /// Last announced immediate intent per peer.
    pub known_intents: BTreeMap<AgentId, Cell>,
    /// This agent's private view of everyone's claims.
    pub local_reservations: ReservationTable,
    /// Highest state-sync sequence number accepted per peer.
    pub last_seen_sequence: BTreeMap<AgentId, u64>,
    pub last_state_broadcast: Tick,
    pub last_state_received: Tick,
    pub vector_clock: VectorClock,
    pub local_clock: u64,
    /// Ticks spent on the same cell.
    pub stuck_counter: u32,
    pub last_position: Cell,
    pub last_successful_move: Tick,
}

impl AgentController {
    pub fn new(id: AgentId, start: Cell) -> Self {
        AgentController {
            id,
            current_path: Path::new(),
            path_index: 0,
            last_intent: start,
            needs_replan: true,
            wait_counter: 0,
            known_intents: BTreeMap::new(),
            local_reservations: ReservationTable::new(),
            last_seen_sequence: BTreeMap::new(),
            last_state_broadcast: Tick::ZERO,
            last_state_received: Tick::ZERO,
            vector_clock: VectorClock::new(),
            local_clock: 0,
            stuck_counter: 0,
            last_position: start,
            last_successful_move: Tick::ZERO,
        }
    }

    // ── Path helpers ──────────────────────────────────────────────────────

    /// The not-yet-executed suffix of the current path.
    #[inline]
    pub fn remaining_path(&self) -> &[Cell] {
        let start = self.path_index.min(self.current_path.len());
        &self.current_path[start..]
    }

    /// `true` while there are path steps left to execute.
    #[inline]
    pub fn has_pending_path(&self) -> bool {
        self.path_index < self.current_path.len()
    }

    /// The cell this agent will step onto this tick — its own cell when it
    /// has nothing left to execute.
    #[inline]
    pub fn intended_next(&self, pos: Cell) -> Cell {
        self.remaining_path().first().copied().unwrap_or(pos)
    }

    /// Adopt a fresh plan starting at `now` and claim it locally.
    pub fn install_path(&mut self, path: Path, now: Tick) {
        self.local_reservations.commit(&path, self.id, now);
        self.current_path = path;
        self.path_index = 0;
        self.needs_replan = false;
        self.wait_counter = 0;
    }

    // ── Causal clock ──────────────────────────────────────────────────────

    /// Receive half of the clock protocol: merge, then advance past our own
    /// component.
    fn observe_clock(&mut self, incoming: &VectorClock) {
        self.vector_clock.merge(incoming);
        self.local_clock = self.local_clock.max(self.vector_clock.get(self.id)) + 1;
        self.vector_clock.set(self.id, self.local_clock);
    }

    /// Send half: bump our component and stamp a snapshot onto the message.
    fn stamp_clock(&mut self) -> VectorClock {
        self.local_clock += 1;
        self.vector_clock.set(self.id, self.local_clock);
        self.vector_clock.clone()
    }

    // ── Receive & rebuild ─────────────────────────────────────────────────

    /// Process one tick's worth of received messages.
    ///
    /// Clears and rebuilds `local_reservations` from the announcements and
    /// state syncs that arrived, then re-asserts this agent's own remaining
    /// claims (path entries are committed at each message's send tick, so
    /// delayed announcements land in the past where they block nothing).
    ///
    /// Returns how many messages forced this agent to yield its path; the
    /// flag side effect is `needs_replan`.
    pub fn ingest(&mut self, messages: &[Message], now: Tick) -> u32 {
        self.local_reservations.clear();
        let mut yields = 0;

        for msg in messages {
            // Decide yields against the clock state as it was when the
            // message arrived; observing first would inflate our own
            // component and let both sides of a symmetric conflict hold
            // their course.
            let yielded = matches!(
                msg.kind,
                MessageKind::PathAnnouncement | MessageKind::GoalReached
            ) && self.should_yield_to(msg, now);

            self.observe_clock(&msg.vector_clock);
            self.known_intents.insert(msg.from, msg.next);
            if yielded {
                trace!(agent = %self.id.short(), peer = %msg.from.short(), "yielding path");
                self.needs_replan = true;
                yields += 1;
            }

            match msg.kind {
                MessageKind::PathAnnouncement | MessageKind::GoalReached => {
                    if !msg.planned_path.is_empty() {
                        self.local_reservations
                            .commit(&msg.planned_path, msg.from, msg.timestamp);
                    }
                }
                MessageKind::StateSync => {
                    let last = self.last_seen_sequence.get(&msg.from).copied().unwrap_or(0);
                    if msg.sequence_number > last {
                        if let Some(state) = &msg.full_state {
                            self.merge_state(state, &msg.vector_clock);
                        }
                        self.last_seen_sequence.insert(msg.from, msg.sequence_number);
                        self.last_state_received = now;
                    }
                }
            }
        }

        // The rebuild wiped our own claims too; re-assert what is left of
        // the current plan so state syncs we emit carry it.
        let remaining: Path = self.remaining_path().to_vec();
        if !remaining.is_empty() {
            self.local_reservations.commit(&remaining, self.id, now);
        }

        yields
    }

    /// Lookahead comparison of our remaining path against an announced peer
    /// path: same cell at the same future tick within [`LOOKAHEAD`] steps is
    /// a future vertex conflict.  The announced path is indexed relative to
    /// its send tick, so entries are shifted by the message's age before
    /// comparing — without the shift a one-tick-old announcement hides
    /// every same-tick crossing.
    ///
    /// Returns `true` when the tie-break says this side yields: the sender's
    /// clock component strictly exceeds ours, or the components are equal
    /// (including both absent) and the sender has the smaller id.  Exactly
    /// one side of a symmetric conflict yields.
    fn should_yield_to(&self, msg: &Message, now: Tick) -> bool {
        if !self.has_pending_path() {
            return false;
        }
        let ours = self.remaining_path();
        let theirs = &msg.planned_path;
        let skew = now.since(msg.timestamp) as usize;
        let clash = (0..ours.len().min(LOOKAHEAD))
            .any(|i| theirs.get(i + skew) == Some(&ours[i]));
        if !clash {
            return false;
        }

        let their_component = msg.vector_clock.get(msg.from);
        let our_component = self.vector_clock.get(self.id);
        their_component > our_component
            || (their_component == our_component && msg.from < self.id)
    }

    /// Entry-by-entry merge of a peer's full table into ours.  Unknown keys
    /// are adopted; on a contested key the owner with the larger component
    /// in the *incoming* clock wins, smaller id on equality.
    fn merge_state(&mut self, incoming: &ReservationTable, clock: &VectorClock) {
        for entry in incoming.iter() {
            match self.local_reservations.get(&entry.key) {
                None => {
                    self.local_reservations.insert(entry.key, entry.agent_id);
                }
                Some(existing) if existing == entry.agent_id => {}
                Some(existing) => {
                    let incoming_c = clock.get(entry.agent_id);
                    let existing_c = clock.get(existing);
                    let replace = incoming_c > existing_c
                        || (incoming_c == existing_c && entry.agent_id < existing);
                    if replace {
                        self.local_reservations.remove(&entry.key);
                        self.local_reservations.insert(entry.key, entry.agent_id);
                    }
                }
            }
        }
    }

    // ── Broadcast ─────────────────────────────────────────────────────────

    /// Build this tick's outgoing messages (before redundancy fan-out).
    ///
    /// Always one announcement; parked and stopped agents claim their cell
    /// with a long constant padding instead of a real path.  Every
    /// [`STATE_BROADCAST_INTERVAL`] ticks — or sooner if no peer state has
    /// arrived for [`STALE_STATE_THRESHOLD`] ticks — a full-state sync is
    /// attached as well.
    pub fn make_broadcast(
        &mut self,
        pos: Cell,
        at_goal: bool,
        collision_stopped: bool,
        now: Tick,
    ) -> Vec<Message> {
        let (kind, path) = if at_goal {
            (MessageKind::GoalReached, vec![pos; STOPPED_PATH_LEN])
        } else if collision_stopped {
            (MessageKind::PathAnnouncement, vec![pos; STOPPED_PATH_LEN])
        } else {
            (MessageKind::PathAnnouncement, self.remaining_path().to_vec())
        };
        let next = path.first().copied().unwrap_or(pos);

        let mut out = Vec::with_capacity(2);
        let clock = self.stamp_clock();
        out.push(Message::announcement(self.id, kind, next, now, path, clock));

        let due = now.since(self.last_state_broadcast) >= STATE_BROADCAST_INTERVAL;
        let stale = now.since(self.last_state_received) >= STALE_STATE_THRESHOLD;
        if due || stale {
            let snapshot = Arc::new(self.local_reservations.clone());
            let clock = self.stamp_clock();
            out.push(Message::state_sync(self.id, next, now, snapshot, clock));
            self.last_state_broadcast = now;
        }
        out
    }

    // ── Stuckness ─────────────────────────────────────────────────────────

    /// Track movement between ticks for deadlock detection.
    pub fn observe_position(&mut self, pos: Cell, now: Tick) {
        if pos == self.last_position {
            self.stuck_counter += 1;
        } else {
            self.stuck_counter = 0;
            self.last_successful_move = now;
        }
        self.last_position = pos;
    }

    /// Deadlocked means pinned in place past the threshold; stopped agents
    /// qualify sooner because nothing else will ever clear them.
    pub fn is_deadlocked(&self, collision_stopped: bool) -> bool {
        let threshold = if collision_stopped {
            STOPPED_DEADLOCK_THRESHOLD
        } else {
            DEADLOCK_THRESHOLD
        };
        self.stuck_counter >= threshold
    }

    /// Applied by the deadlock resolver: drop the plan and all local
    /// claims, stagger the next attempt by `wait` ticks.
    pub fn reset_for_replan(&mut self, wait: u32) {
        self.current_path.clear();
        self.path_index = 0;
        self.needs_replan = true;
        self.stuck_counter = 0;
        self.wait_counter = wait;
        self.local_reservations.erase_agent(self.id);
    }
}
