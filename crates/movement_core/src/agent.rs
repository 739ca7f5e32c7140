//! The registered-agent table: per-agent shape/limits and the opaque handle
//! into the physics world. Locomotion state and in-flight movement sessions
//! are tracked separately, keyed by the same id (see [`crate::movement_controller`]).

use slotmap::new_key_type;

use crate::config::AgentConfig;
use crate::physics::RigidBodyHandle;

new_key_type! {
  /// Stable identity for a registered agent, handed out by
  /// [`crate::movement_controller::MovementController::register_agent`].
  pub struct AgentId;
}

/// A registered character: its capsule shape/limits and its physics
/// handle. Mutable physics state (position, velocity) lives in the physics
/// world itself, reached through `handle`.
#[derive(Debug, Clone, Copy)]
pub struct Agent {
  /// Stable integer identity, assigned at registration. Used (not the
  /// opaque slot-map key) wherever ordering matters: deterministic tick
  /// iteration and the detour protocol's "lower id yields" tie-break.
  pub id: u64,
  pub config: AgentConfig,
  pub handle: RigidBodyHandle,
  /// The upward-facing contact normal currently supporting this agent, if
  /// any. Updated from ground-contact callbacks; `None` while airborne.
  pub support_normal: Option<glam::Vec3>,
}

impl Agent {
  pub fn new(config: AgentConfig, handle: RigidBodyHandle) -> Self {
    Self { id: 0, config, handle, support_normal: None }
  }
}
