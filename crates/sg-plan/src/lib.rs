//! `sg-plan` — cooperative space-time pathfinding.
//!
//! | Module          | Contents                                            |
//! |-----------------|-----------------------------------------------------|
//! | [`reservation`] | `ReservationTable` — `(cell, tick) → agent` claims  |
//! | [`planner`]     | `SpaceTimePlanner` — A* over the (cell, tick) lattice |
//!
//! The planner searches the time-expanded grid against a reservation table:
//! a claim `(cell, t) → agent` means the agent intends to occupy that cell
//! at that tick.  Paths that would enter a claimed cell (vertex conflict) or
//! exchange cells with a claimant between consecutive ticks (swap conflict)
//! are never produced.

pub mod planner;
pub mod reservation;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use planner::SpaceTimePlanner;
pub use reservation::{ReservationEntry, ReservationKey, ReservationTable, GOAL_HOLD_TICKS};
