//! Observer hooks for progress reporting.

use sg_core::Tick;
use sg_metrics::{MetricsSnapshot, TickTrace};

/// Callbacks invoked by [`Simulation::run`][crate::Simulation::run] at tick
/// boundaries.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
pub trait SimObserver {
    /// Called before any phase of the tick runs.
    fn on_tick_start(&mut self, _tick: Tick) {}

    /// Called once the tick's trace is recorded, before the tick advances.
    fn on_tick_end(&mut self, _tick: Tick, _trace: &TickTrace) {}

    /// Called once after the loop stops, with the final metrics.
    fn on_sim_end(&mut self, _final_tick: Tick, _metrics: &MetricsSnapshot) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}

/// Logs a heartbeat line every `interval` ticks and a summary at the end.
pub struct ProgressObserver {
    pub interval: u64,
}

impl ProgressObserver {
    pub fn every(interval: u64) -> Self {
        ProgressObserver { interval: interval.max(1) }
    }
}

impl SimObserver for ProgressObserver {
    fn on_tick_end(&mut self, tick: Tick, trace: &TickTrace) {
        if tick.0 % self.interval == 0 {
            tracing::debug!(
                tick = %tick,
                active = trace.active_agents,
                sent = trace.messages_sent,
                "tick complete"
            );
        }
    }

    fn on_sim_end(&mut self, final_tick: Tick, metrics: &MetricsSnapshot) {
        tracing::debug!(
            final_tick = %final_tick,
            replans = metrics.total_replans,
            "run finished"
        );
    }
}
