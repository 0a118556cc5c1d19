//! `sg-world` — the static obstacle grid and the live world state.
//!
//! | Module     | Contents                                                |
//! |------------|---------------------------------------------------------|
//! | [`grid`]   | `Grid` — obstacle map, cell validity, neighborhood      |
//! | [`agent`]  | `AgentState` — position, goal, latched flags            |
//! | [`world`]  | `World`, `WorldBuilder` — live state and construction   |
//! | [`loader`] | `MapLoader` port and the text-file adapter              |
//! | [`error`]  | `WorldError`, `WorldResult`                             |
//!
//! The grid is immutable after construction; every agent position is kept on
//! a valid free cell by the world's mutators.  Construction is seeded and
//! fully deterministic, including the generated agent identities.

pub mod agent;
pub mod error;
pub mod grid;
pub mod loader;
pub mod world;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use agent::AgentState;
pub use error::{WorldError, WorldResult};
pub use grid::Grid;
pub use loader::{FileMapLoader, MapLoader};
pub use world::{World, WorldBuilder};
