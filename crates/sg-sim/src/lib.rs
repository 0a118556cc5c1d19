//! `sg-sim` — the simulator tick loop.
//!
//! # Phase order
//!
//! ```text
//! for each tick (until every agent is home or max_ticks):
//!   ① Receive   — drain the bus per agent, rebuild local reservations
//!   ② Plan      — space-time A* per agent needing a path
//!                 (parallel with the `parallel` feature)
//!   ③ Broadcast — announce intents, with redundancy, plus periodic syncs
//!   ④ Validate  — any cell targeted twice forces an emergency replan
//!   ⑤ Deadlock  — reset the lower-priority half of the stuck set
//!   ⑥ Execute   — apply all moves into the world simultaneously
//!   ⑦ Audit     — displace or stop agents sharing a cell
//!   ⑧ Trace     — record positions, activity, traffic
//!   ⑨ Advance   — bump the tick counter
//! ```
//!
//! Phases ② excepted, everything runs sequentially over the agent list so
//! world mutation, metrics, and the network queue mutate in one fixed
//! order — the root of run-to-run determinism.

pub mod error;
pub mod observer;
pub mod simulation;


pub use error::{SimError, SimResult};
pub use observer::{NoopObserver, ProgressObserver, SimObserver};
pub use simulation::{Simulation, SimulationConfig};
