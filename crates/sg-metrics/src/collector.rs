//! The run-wide metrics collector.
//!
//! Counters are atomics so any phase — including the parallel planning
//! fan-out — can increment through a shared reference.  Trace appends are
//! serialized by an internal mutex.  The makespan, timer, and reset are
//! `&mut self`: only the driver touches those, outside any parallel region.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use sg_core::Tick;

use crate::TickTrace;

/// Immutable summary of a finished (or in-flight) run.
///
/// Serializes to the metrics JSON document; field order here is the key
/// order in the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_messages: u64,
    pub dropped_messages: u64,
    pub total_replans: u64,
    pub makespan: u64,
    pub collision_detected: bool,
    pub wall_time_ms: u64,
    /// `dropped / total`, 0 when nothing was sent.
    pub drop_rate: f64,
}

/// Accumulates counters and per-tick traces over one run.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    total_messages: AtomicU64,
    dropped_messages: AtomicU64,
    total_replans: AtomicU64,
    collision_detected: AtomicBool,
    makespan: u64,
    timer_start: Option<Instant>,
    wall_time_ms: u64,
    traces: Mutex<Vec<TickTrace>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Counter updates (shared reference, any phase) ─────────────────────

    pub fn record_messages_sent(&self, n: u64) {
        self.total_messages.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_messages_dropped(&self, n: u64) {
        self.dropped_messages.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_replan(&self) {
        self.total_replans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replans(&self, n: u64) {
        self.total_replans.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_collision(&self) {
        self.collision_detected.store(true, Ordering::Relaxed);
    }

    pub fn record_tick_trace(&self, trace: TickTrace) {
        self.traces.lock().expect("trace lock poisoned").push(trace);
    }

    // ── Driver-only updates ───────────────────────────────────────────────

    pub fn set_makespan(&mut self, makespan: Tick) {
        self.makespan = makespan.0;
    }

    pub fn start_timer(&mut self) {
        self.timer_start = Some(Instant::now());
    }

    pub fn stop_timer(&mut self) {
        if let Some(start) = self.timer_start.take() {
            self.wall_time_ms = start.elapsed().as_millis() as u64;
        }
    }

    pub fn reset(&mut self) {
        self.total_messages.store(0, Ordering::Relaxed);
        self.dropped_messages.store(0, Ordering::Relaxed);
        self.total_replans.store(0, Ordering::Relaxed);
        self.collision_detected.store(false, Ordering::Relaxed);
        self.makespan = 0;
        self.timer_start = None;
        self.wall_time_ms = 0;
        self.traces.lock().expect("trace lock poisoned").clear();
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    pub fn collision_detected(&self) -> bool {
        self.collision_detected.load(Ordering::Relaxed)
    }

    pub fn total_replans(&self) -> u64 {
        self.total_replans.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_messages.load(Ordering::Relaxed);
        let dropped = self.dropped_messages.load(Ordering::Relaxed);
        MetricsSnapshot {
            total_messages: total,
            dropped_messages: dropped,
            total_replans: self.total_replans.load(Ordering::Relaxed),
            makespan: self.makespan,
            collision_detected: self.collision_detected.load(Ordering::Relaxed),
            wall_time_ms: self.wall_time_ms,
            drop_rate: if total > 0 { dropped as f64 / total as f64 } else { 0.0 },
        }
    }

    /// A copy of every recorded tick trace, in tick order.
    pub fn traces(&self) -> Vec<TickTrace> {
        self.traces.lock().expect("trace lock poisoned").clone()
    }
}
