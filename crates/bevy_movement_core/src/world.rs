use std::collections::HashMap;

use bevy_ecs::prelude::{Entity, Resource};
use movement_core::navmesh::NavMeshProvider;
use movement_core::physics::PhysicsWorld;
use movement_core::{AgentId, MovementConfig, MovementController};

/// The movement core's tick loop, agent registry and in-flight sessions,
/// owned by the ECS as a resource, plus the Entity-to-AgentId map used to
/// translate between the two id spaces. There is exactly one of these per
/// app, mirroring the core's own single-writer design (see the core's own
/// design notes on "avoid any global shared mutable registry").
#[derive(Resource)]
pub struct MovementWorld {
  pub controller: MovementController,
  agents: HashMap<Entity, AgentId>,
}

impl MovementWorld {
  pub fn new(config: MovementConfig) -> Self {
    Self { controller: MovementController::new(config), agents: HashMap::new() }
  }

  pub fn agent_id(&self, entity: Entity) -> Option<AgentId> {
    self.agents.get(&entity).copied()
  }

  pub(crate) fn insert(&mut self, entity: Entity, agent_id: AgentId) {
    self.agents.insert(entity, agent_id);
  }

  /// Drops entries whose entity no longer satisfies `keep`. Mirrors the
  /// teacher's own existence-sync pattern of rebuilding the live set each
  /// tick rather than tracking removals via a separate hook.
  pub(crate) fn retain(&mut self, mut keep: impl FnMut(Entity) -> bool) {
    self.agents.retain(|&entity, _| keep(entity));
  }
}

/// A navmesh resource, generic over whatever concrete mesh representation
/// the app's navmesh generator produces. Kept outside `MovementWorld` itself
/// since the core treats the navmesh as a read-only, externally owned
/// collaborator (section 5: "NavQuery is a read-only view of an immutable
/// navmesh; safe to share across agents within the tick").
#[derive(Resource)]
pub struct MovementNavMesh<N: NavMeshProvider + Send + Sync + 'static>(pub N);

/// The rigid-body engine, generic over whatever crate implements
/// [`PhysicsWorld`] for the app. Boxed behind the trait at the call sites the
/// core needs (`update`, `jump`, `knockback`, `push`), never behind a
/// trait object at rest, so the concrete engine's own API stays usable
/// outside the plugin's systems.
#[derive(Resource)]
pub struct MovementPhysics<P: PhysicsWorld + Send + Sync + 'static>(pub P);
