//! The five user-facing events the tick loop reports. Modeled as a
//! per-tick outgoing buffer the caller drains, rather than observer
//! callbacks, so the controller never holds a reference back out into
//! caller-owned state.

use glam::Vec3;

use crate::agent::AgentId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovementEvent {
  MovementStarted { agent: AgentId, start: Vec3, end: Vec3 },
  DestinationReached { agent: AgentId, position: Vec3 },
  PathReplanned { agent: AgentId },
  PathBlocked { agent: AgentId },
  /// `progress` is the fraction of waypoints consumed, in `[0, 1]`.
  MovementProgress { agent: AgentId, progress: f32 },
}
