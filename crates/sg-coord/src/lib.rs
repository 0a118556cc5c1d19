//! `sg-coord` — decentralized per-agent coordination.
//!
//! Every agent runs the same state machine over a purely local view: a
//! reservation table rebuilt each tick from whatever messages survived the
//! lossy bus, a vector clock for causal tie-breaks (identifier order on
//! ties), and counters tracking stuckness.  No controller ever reads
//! another controller's state — the only coupling is the message traffic.

pub mod controller;

#[cfg(test)]
mod tests;

pub use controller::{
    AgentController, DEADLOCK_THRESHOLD, LOOKAHEAD, MAX_WAIT, REDUNDANCY,
    STATE_BROADCAST_INTERVAL, STALE_STATE_THRESHOLD, STOPPED_DEADLOCK_THRESHOLD,
    STOPPED_PATH_LEN,
};
