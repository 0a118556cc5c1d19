//! Map loading port and the text-file adapter.
//!
//! Map files are plain ASCII: `.` free, `#` obstacle.  Blank lines and lines
//! beginning with `/` are comments.  All remaining lines must have equal
//! length.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::{Grid, World, WorldBuilder, WorldError, WorldResult};

/// Port through which the simulator obtains a world from a map source.
pub trait MapLoader {
    /// Load a grid from `path` and populate it with `n_agents` randomly
    /// placed agents.  Deterministic for a given `seed`.
    fn load(&self, path: &Path, n_agents: usize, seed: u64) -> WorldResult<World>;
}

/// Reads grid text files from the filesystem.
pub struct FileMapLoader;

impl MapLoader for FileMapLoader {
    fn load(&self, path: &Path, n_agents: usize, seed: u64) -> WorldResult<World> {
        if !path.exists() {
            return Err(WorldError::MapNotFound(path.display().to_string()));
        }
        let text = fs::read_to_string(path)?;
        let grid = Grid::parse(&text)?;

        let free = grid.free_cells().len();
        if free < 2 {
            return Err(WorldError::TooFewFreeCells(free));
        }

        info!(
            width = grid.width(),
            height = grid.height(),
            free,
            path = %path.display(),
            "map loaded"
        );

        let world = WorldBuilder::new(seed)
            .grid(grid)
            .random_agents(n_agents)
            .build()?;

        info!(agents = world.agents.len(), "world created");
        Ok(world)
    }
}
