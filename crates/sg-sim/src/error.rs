use sg_core::AgentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("agent {0} starts on a blocked or out-of-bounds cell")]
    BlockedStart(AgentId),

    #[error("agents {0} and {1} share a starting cell")]
    OverlappingStarts(AgentId, AgentId),
}

pub type SimResult<T> = Result<T, SimError>;
