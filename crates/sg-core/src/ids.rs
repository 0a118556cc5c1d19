//! Agent identity.
//!
//! Agents are identified by a 128-bit UUID rather than a dense index: the
//! coordination protocol has no central authority, and priority tie-breaks
//! (`AgentId` ordering) must not encode creation order on any one machine.
//! IDs are generated from the world builder's seeded RNG, so a fixed seed
//! reproduces the same identities run after run.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SimRng;

/// Stable 128-bit agent identifier with a total order.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Generate a v4-format ID from deterministic random bytes.
    pub fn generate(rng: &mut SimRng) -> Self {
        AgentId(uuid::Builder::from_random_bytes(rng.bytes16()).into_uuid())
    }

    /// First 8 hex digits — enough to tell agents apart in log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_owned()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
