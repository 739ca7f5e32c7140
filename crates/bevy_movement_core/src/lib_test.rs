use bevy::prelude::*;
use movement_core::navmesh::NavigationMesh;
use movement_core::physics::InMemoryPhysicsWorld;
use movement_core::MovementConfig;

use crate::{
  MovementAgentBundle, MovementAgentSettings, MovementAgentTarget, MovementCorePlugin, MovementNavMesh,
  MovementPhysics, MovementWorld,
};

fn flat_square_mesh() -> NavigationMesh {
  NavigationMesh {
    vertices: vec![
      Vec3::new(0.0, 0.0, 0.0),
      Vec3::new(10.0, 0.0, 0.0),
      Vec3::new(10.0, 0.0, 10.0),
      Vec3::new(0.0, 0.0, 10.0),
    ],
    polygons: vec![vec![0, 1, 2, 3]],
  }
}

fn test_app() -> App {
  let mut app = App::new();

  let nav_mesh = flat_square_mesh().validate().expect("mesh is valid");
  let physics = InMemoryPhysicsWorld::new(Vec3::new(0.0, -9.8, 0.0));

  app
    .add_plugins(MinimalPlugins)
    .add_plugins(TransformPlugin)
    .insert_resource(MovementNavMesh(nav_mesh))
    .insert_resource(MovementPhysics(physics))
    .add_plugins(MovementCorePlugin::<movement_core::navmesh::ValidNavigationMesh, InMemoryPhysicsWorld>::new(
      MovementConfig::default(),
    ));
  app
}

#[test]
fn registers_agent_and_starts_a_session_for_its_target() {
  let mut app = test_app();

  let agent_entity = app
    .world_mut()
    .spawn(Transform::from_translation(Vec3::new(1.0, 0.0, 1.0)))
    .insert(MovementAgentBundle { agent: Default::default(), settings: MovementAgentSettings::default() })
    .insert(MovementAgentTarget(Some(Vec3::new(8.0, 0.0, 8.0))))
    .id();

  // First update registers the agent; the second observes its target.
  app.update();
  app.update();

  let world = app.world().resource::<MovementWorld>();
  let agent_id = world.agent_id(agent_entity).expect("agent was registered");
  assert!(world.controller.is_moving(agent_id), "agent should have an active session toward its target");
}

#[test]
fn clearing_target_stops_the_agent() {
  let mut app = test_app();

  let agent_entity = app
    .world_mut()
    .spawn(Transform::from_translation(Vec3::new(1.0, 0.0, 1.0)))
    .insert(MovementAgentBundle { agent: Default::default(), settings: MovementAgentSettings::default() })
    .insert(MovementAgentTarget(Some(Vec3::new(8.0, 0.0, 8.0))))
    .id();

  app.update();
  app.update();

  let mut target = app.world_mut().get_mut::<MovementAgentTarget>(agent_entity).expect("target exists");
  *target = MovementAgentTarget(None);
  app.update();

  let world = app.world().resource::<MovementWorld>();
  let agent_id = world.agent_id(agent_entity).expect("agent was registered");
  assert!(!world.controller.is_moving(agent_id), "clearing the target should stop the agent's session");
}

#[test]
fn despawning_agent_drops_its_bookkeeping() {
  let mut app = test_app();

  let agent_entity = app
    .world_mut()
    .spawn(Transform::from_translation(Vec3::new(1.0, 0.0, 1.0)))
    .insert(MovementAgentBundle { agent: Default::default(), settings: MovementAgentSettings::default() })
    .id();

  app.update();
  assert!(app.world().resource::<MovementWorld>().agent_id(agent_entity).is_some());

  app.world_mut().despawn(agent_entity);
  app.update();

  assert!(app.world().resource::<MovementWorld>().agent_id(agent_entity).is_none());
}
