use std::collections::HashSet;

use bevy_ecs::prelude::{Bundle, Component, Entity, EventWriter, Message, Query, Res, ResMut, With};
use bevy_ecs::query::Changed;
use bevy_math::Vec3;
use bevy_time::Time;
use bevy_transform::components::Transform;
use movement_core::navmesh::NavMeshProvider;
use movement_core::physics::PhysicsWorld;
use movement_core::{ControllerKind, MovementEvent};

use crate::world::{MovementNavMesh, MovementPhysics, MovementWorld};

/// A bundle to create agents. `Transform` is expected to already be present
/// (commonly added by another bundle), so it is not included here.
#[derive(Bundle)]
pub struct MovementAgentBundle {
  pub agent: MovementAgent,
  pub settings: MovementAgentSettings,
}

/// A marker component: the entity should have a capsule registered with the
/// movement core. Requires [`MovementAgentSettings`] and [`MovementAgentTarget`].
#[derive(Component, Default)]
#[require(MovementAgentSettings, MovementAgentTarget)]
pub struct MovementAgent;

/// The settings used the one time the agent is registered with the core.
/// Changing these after registration has no effect; remove and re-add the
/// entity's [`MovementAgent`] to re-register with new settings.
#[derive(Component, Debug, Clone, Copy)]
pub struct MovementAgentSettings {
  pub radius: f32,
  pub height: f32,
  pub max_speed: f32,
  pub controller_kind: ControllerKind,
}

impl Default for MovementAgentSettings {
  fn default() -> Self {
    Self { radius: 0.4, height: 1.8, max_speed: 4.0, controller_kind: ControllerKind::Velocity }
  }
}

/// The agent's current move target. Setting this to a new value requests a
/// new path; setting it to `None` stops the agent (mirrors
/// [`movement_core::MovementController::stop`]).
#[derive(Component, Default, Debug, Clone, Copy, PartialEq)]
pub struct MovementAgentTarget(pub Option<Vec3>);

/// The locomotion state and movement progress written back by the core
/// after each tick. Read-only from the user's side; only the plugin's
/// output systems write to it.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct MovementAgentState {
  pub locomotion: movement_core::character_controller::LocomotionState,
  pub is_moving: bool,
}

impl Default for MovementAgentState {
  fn default() -> Self {
    Self { locomotion: movement_core::character_controller::LocomotionState::Grounded, is_moving: false }
  }
}

/// Registers every [`MovementAgent`] entity not yet known to the core, and
/// drops bookkeeping for entities whose [`MovementAgent`] has since been
/// removed or despawned. Rebuilds the live set from the query each tick
/// rather than tracking removals separately, the same shape the teacher
/// uses for its own agent/island/character existence sync.
pub fn sync_agent_existence<P: PhysicsWorld + Send + Sync + 'static>(
  mut world: ResMut<MovementWorld>,
  mut physics: ResMut<MovementPhysics<P>>,
  agents: Query<(Entity, &MovementAgentSettings, &Transform), With<MovementAgent>>,
) {
  let live: HashSet<Entity> = agents.iter().map(|(entity, ..)| entity).collect();
  world.retain(|entity| live.contains(&entity));

  for (entity, settings, transform) in agents.iter() {
    if world.agent_id(entity).is_some() {
      continue;
    }
    let agent_config = movement_core::AgentConfig {
      radius: settings.radius,
      height: settings.height,
      max_speed: settings.max_speed,
      ..Default::default()
    };
    let agent_id = world.controller.register_agent(
      &mut physics.0,
      agent_config,
      transform.translation,
      settings.controller_kind,
    );
    world.insert(entity, agent_id);
  }
}

/// Forwards [`MovementAgentTarget`] changes into `request_movement`/`stop`
/// calls. Runs before [`crate::MovementSystemSet::Update`] so the new
/// session exists by the time the core ticks this frame.
pub fn sync_agent_targets<N: NavMeshProvider + Send + Sync + 'static, P: PhysicsWorld + Send + Sync + 'static>(
  mut world: ResMut<MovementWorld>,
  navmesh: Res<MovementNavMesh<N>>,
  mut physics: ResMut<MovementPhysics<P>>,
  targets: Query<(Entity, &MovementAgentTarget), Changed<MovementAgentTarget>>,
) {
  for (entity, target) in targets.iter() {
    let Some(agent_id) = world.agent_id(entity) else { continue };
    match target.0 {
      Some(destination) => {
        if let Err(err) = world.controller.request_movement(agent_id, destination, &navmesh.0, &mut physics.0) {
          bevy_log::warn!("movement request for {entity} to {destination} failed: {err}");
        }
      }
      None => world.controller.stop(agent_id),
    }
  }
}

/// Advances the movement core by one frame's `dt`. The only system in
/// [`crate::MovementSystemSet::Update`].
pub fn update_movement_world<N: NavMeshProvider + Send + Sync + 'static, P: PhysicsWorld + Send + Sync + 'static>(
  time: Res<Time>,
  mut world: ResMut<MovementWorld>,
  navmesh: Res<MovementNavMesh<N>>,
  mut physics: ResMut<MovementPhysics<P>>,
) {
  let dt = time.delta_secs();
  if dt <= 0.0 {
    return;
  }
  world.controller.update(dt, &navmesh.0, &mut physics.0);
}

/// Copies the post-tick locomotion state and position back onto each
/// agent's `Transform`/[`MovementAgentState`]. Reading movement data before
/// this system has run observes last frame's result, per the core's own
/// ordering guarantees (section 5: "Event emissions happen after all
/// motion writes").
pub fn sync_agent_output<P: PhysicsWorld + Send + Sync + 'static>(
  world: Res<MovementWorld>,
  physics: Res<MovementPhysics<P>>,
  mut agents: Query<(Entity, &mut Transform, Option<&mut MovementAgentState>)>,
) {
  for (entity, mut transform, state) in agents.iter_mut() {
    let Some(agent_id) = world.agent_id(entity) else { continue };
    let Some(handle) = world.controller.agent_handle(agent_id) else { continue };
    transform.translation = physics.0.position(handle);

    if let Some(mut state) = state {
      let locomotion = world.controller.locomotion_state(agent_id).unwrap_or(state.locomotion);
      let is_moving = world.controller.is_moving(agent_id);
      *state = MovementAgentState { locomotion, is_moving };
    }
  }
}

/// Drains the core's per-tick event buffer into a Bevy event, so user
/// systems can react with `EventReader<MovementCoreEvent>` instead of
/// reaching into the resource directly.
#[derive(Message, Debug, Clone)]
pub struct MovementCoreEvent(pub MovementEvent);

pub fn forward_movement_events(mut world: ResMut<MovementWorld>, mut writer: EventWriter<MovementCoreEvent>) {
  for event in world.controller.drain_events() {
    writer.write(MovementCoreEvent(event));
  }
}
