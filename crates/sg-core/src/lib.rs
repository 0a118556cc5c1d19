//! `sg-core` — foundational types for the swarmgrid coordination engine.
//!
//! This crate is a dependency of every other `sg-*` crate.  It intentionally
//! has no `sg-*` dependencies and minimal external ones (`rand`, `serde`,
//! `uuid`).
//!
//! # What lives here
//!
//! | Module    | Contents                                          |
//! |-----------|---------------------------------------------------|
//! | [`cell`]  | `Cell`, `Path`, neighborhood offsets              |
//! | [`tick`]  | `Tick` — discrete simulation time                 |
//! | [`ids`]   | `AgentId` — 128-bit agent identity                |
//! | [`rng`]   | `SimRng` — deterministic seeded RNG wrapper       |
//! | [`clock`] | `VectorClock` — causal ordering of messages       |

pub mod cell;
pub mod clock;
pub mod ids;
pub mod rng;
pub mod tick;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use cell::{Cell, Path, DISPLACE_OFFSETS, STEP_OFFSETS};
pub use clock::VectorClock;
pub use ids::AgentId;
pub use rng::SimRng;
pub use tick::Tick;
