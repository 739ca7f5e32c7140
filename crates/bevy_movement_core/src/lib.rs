//! A thin Bevy plugin exposing [`movement_core`] as ECS components,
//! resources and systems, the same way the teacher's own Bevy integration
//! wraps its pathfinding library: one system set ordering existence sync,
//! value sync, the core tick, and output, with the core itself owned by a
//! single resource and a per-entity id map bridging the two worlds.

use std::marker::PhantomData;

use bevy_app::{App, Plugin, Update};
use bevy_ecs::schedule::{IntoScheduleConfigs, SystemSet};
use movement_core::navmesh::NavMeshProvider;
use movement_core::physics::PhysicsWorld;
use movement_core::MovementConfig;

mod agent;
mod world;

pub use agent::{
  forward_movement_events, MovementAgent, MovementAgentBundle, MovementAgentSettings, MovementAgentState,
  MovementAgentTarget, MovementCoreEvent,
};
pub use world::{MovementNavMesh, MovementPhysics, MovementWorld};

/// System set for `movement_core` systems, registered on [`Update`].
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum MovementSystemSet {
  /// Registers new agent entities and drops bookkeeping for removed ones.
  /// Agent entities must exist (with [`MovementAgent`]) before this point.
  SyncExistence,
  /// Forwards [`MovementAgentTarget`] changes into the core as
  /// `request_movement`/`stop` calls.
  SyncValues,
  /// The core's own per-tick update.
  Update,
  /// Copies the core's post-tick state back onto `Transform` and
  /// [`MovementAgentState`], and drains lifecycle events. Avoid
  /// reading/mutating movement data before this point.
  Output,
}

/// Adds the movement core to a Bevy app. `N` is the concrete navmesh type
/// the app supplies via [`MovementNavMesh`]; `P` is the concrete physics
/// world the app supplies via [`MovementPhysics`]. Both resources must be
/// inserted by the app before this plugin's systems run.
pub struct MovementCorePlugin<N, P> {
  config: MovementConfig,
  _marker: PhantomData<fn() -> (N, P)>,
}

impl<N, P> MovementCorePlugin<N, P> {
  pub fn new(config: MovementConfig) -> Self {
    Self { config, _marker: PhantomData }
  }
}

impl<N, P> Default for MovementCorePlugin<N, P> {
  fn default() -> Self {
    Self::new(MovementConfig::default())
  }
}

impl<N: NavMeshProvider + Send + Sync + 'static, P: PhysicsWorld + Send + Sync + 'static> Plugin
  for MovementCorePlugin<N, P>
{
  fn build(&self, app: &mut App) {
    app.insert_resource(MovementWorld::new(self.config));
    app.add_message::<MovementCoreEvent>();

    app.configure_sets(
      Update,
      (
        MovementSystemSet::SyncExistence.before(MovementSystemSet::SyncValues),
        MovementSystemSet::SyncValues.before(MovementSystemSet::Update),
        MovementSystemSet::Update.before(MovementSystemSet::Output),
      ),
    );

    app.add_systems(
      Update,
      agent::sync_agent_existence::<P>.in_set(MovementSystemSet::SyncExistence),
    );
    app.add_systems(
      Update,
      agent::sync_agent_targets::<N, P>.in_set(MovementSystemSet::SyncValues),
    );
    app.add_systems(Update, agent::update_movement_world::<N, P>.in_set(MovementSystemSet::Update));
    app.add_systems(
      Update,
      (agent::sync_agent_output::<P>, agent::forward_movement_events).in_set(MovementSystemSet::Output),
    );
  }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod test;
