//! World construction and map loading errors.

use sg_core::Cell;
use thiserror::Error;

/// Everything that can go wrong while reading a map or building a world.
/// All variants are input-validation failures; once a `World` exists, its
/// invariants hold for the lifetime of the run.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("map file not found: {0}")]
    MapNotFound(String),

    #[error("invalid map: {0}")]
    InvalidMap(String),

    #[error("grid rows have unequal widths: expected {expected}, got {got}")]
    RaggedGrid { expected: usize, got: usize },

    #[error("invalid map character {0:?} (expected '.' or '#')")]
    InvalidChar(char),

    #[error("map needs at least 2 free cells, found {0}")]
    TooFewFreeCells(usize),

    #[error("agent cell {0} is blocked or out of bounds")]
    BlockedCell(Cell),

    #[error("no route between start {start} and goal {goal}")]
    UnreachableAgent { start: Cell, goal: Cell },

    #[error("cannot place {requested} agents on this map")]
    PlacementFailed { requested: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for world construction.
pub type WorldResult<T> = Result<T, WorldError>;
