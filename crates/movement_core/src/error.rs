//! Top-level failure surface for the public movement API. Per-tick
//! recoverable conditions (wrong floor, edge hazard) are handled inside the
//! tick loop and surface only as events, never as this error type.

use thiserror::Error;

use crate::agent::AgentId;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum MovementError {
  #[error("agent {0:?} is not registered")]
  AgentUnknown(AgentId),
  #[error("target could not be reached from the agent's current position")]
  TargetUnreachable,
  #[error("a path was found but is not traversable and could not be repaired")]
  PathUntraversable,
  #[error("replanning failed and the movement session was terminated")]
  ReplanExhausted,
}
