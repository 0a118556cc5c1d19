//! `sg-net` — the coordination message model and the simulated broadcast bus.
//!
//! | Module      | Contents                                            |
//! |-------------|-----------------------------------------------------|
//! | [`message`] | `Message`, `MessageKind`                            |
//! | [`sim`]     | `SimNetwork` — lossy, delayed broadcast adapter     |
//!
//! The [`Network`] trait is the port through which the engine talks to any
//! transport.  Implementations are internally synchronized: every method
//! takes `&self` and may be called from the driver thread at any phase.

pub mod message;
pub mod sim;


use sg_core::{AgentId, Tick};

pub use message::{Message, MessageKind};
pub use sim::SimNetwork;

// ── Port ──────────────────────────────────────────────────────────────────────

/// Transport parameters for the simulated bus.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct NetworkParams {
    /// Probability that any single `send` attempt is lost, in [0, 1].
    pub drop_probability: f64,
    /// Mean one-way latency in milliseconds.  0 (with 0 jitter) means
    /// delivery on the next tick.
    pub mean_latency_ms: u32,
    /// Standard deviation of the latency, in milliseconds.
    pub jitter_ms: u32,
}

/// Cumulative transport counters since construction or the last `reset`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub sent: u64,
    pub dropped: u64,
}

/// The broadcast transport port.
///
/// Implementations must be `Send + Sync`; the simulator treats `send`,
/// `receive`, and `stats` as thread-safe.
pub trait Network: Send + Sync {
    /// Enqueue one broadcast attempt.  Each call may independently be lost.
    fn send(&self, msg: Message);

    /// All messages addressed to `agent` whose delivery tick is at or
    /// before `now`, in delivery order.  Never blocks; never returns the
    /// agent's own messages.
    fn receive(&self, agent: AgentId, now: Tick) -> Vec<Message>;

    /// Drop all queued traffic and zero the counters.
    fn reset(&self);

    fn stats(&self) -> NetworkStats;
}
