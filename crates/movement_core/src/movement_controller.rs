//! Component F: the per-tick control loop. Owns the registered-agent
//! table, the per-agent locomotion state and the in-flight movement
//! sessions, and drives all of them forward one `dt` at a time.

use std::collections::HashMap;

use glam::{Vec3, Vec3Swizzles};
use slotmap::SlotMap;

use crate::agent::{Agent, AgentId};
use crate::avoidance::{AvoidanceNeighbor, LocalAvoidance};
use crate::character_controller::{
  CharacterController, LocomotionController, LocomotionState, MotorController, VelocityController,
};
use crate::config::{AgentConfig, MovementConfig};
use crate::error::MovementError;
use crate::events::MovementEvent;
use crate::nav_query::{NavQuery, PointSampleExtents};
use crate::navmesh::NavMeshProvider;
use crate::pathfinding_service::PathfindingService;
use crate::physics::{PhysicsWorld, RigidBodyHandle};
use crate::session::MovementSession;

/// Selects which of the two control laws a newly registered agent uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerKind {
  Velocity,
  Motor { motor_strength: f32, max_vertical_correction: f32 },
}

/// Horizontal distance beyond which a spawn point is considered off-mesh
/// and the agent is teleported onto the nearest valid surface before any
/// path is planned for it.
const SPAWN_SNAP_DISTANCE: f32 = 2.0;

/// Time horizon used by collision prediction to decide whether an approach
/// is imminent enough to act on. Not a recognized configuration key: the
/// spec's config table only exposes `separation_radius` as the distance
/// gate, so this is a fixed companion constant for the time gate.
const CRITICAL_COLLISION_TIME_HORIZON: f32 = 2.0;

/// A detour waypoint is offset from the other agent's position by this
/// distance along the perpendicular to the line between the two agents.
const DETOUR_OFFSET: f32 = 3.0;

/// The tick loop's agent registry, locomotion state and in-flight
/// sessions. A single instance drives every registered agent through
/// `update`.
pub struct MovementController {
  agents: SlotMap<AgentId, Agent>,
  controllers: slotmap::SecondaryMap<AgentId, CharacterController>,
  sessions: slotmap::SecondaryMap<AgentId, MovementSession>,
  config: MovementConfig,
  events: Vec<MovementEvent>,
  next_stable_id: u64,
  handle_to_agent: HashMap<RigidBodyHandle, AgentId>,
  id_to_agent: HashMap<u64, AgentId>,
}

impl MovementController {
  pub fn new(config: MovementConfig) -> Self {
    Self {
      agents: SlotMap::with_key(),
      controllers: slotmap::SecondaryMap::new(),
      sessions: slotmap::SecondaryMap::new(),
      config,
      events: Vec::new(),
      next_stable_id: 0,
      handle_to_agent: HashMap::new(),
      id_to_agent: HashMap::new(),
    }
  }

  /// Registers a capsule with the physics world and adds it to the tick
  /// loop. Returns the opaque id used for every other public operation.
  pub fn register_agent(
    &mut self,
    physics: &mut dyn PhysicsWorld,
    agent_config: AgentConfig,
    spawn_position: Vec3,
    controller_kind: ControllerKind,
  ) -> AgentId {
    let handle = physics.register_capsule(
      spawn_position,
      agent_config.radius,
      agent_config.height,
      1.0,
      false,
    );
    let mut agent = Agent::new(agent_config, handle);
    agent.id = self.next_stable_id;
    self.next_stable_id += 1;

    let controller = match controller_kind {
      ControllerKind::Velocity => {
        CharacterController::Velocity(VelocityController::new(agent_config.stability_threshold))
      }
      ControllerKind::Motor { motor_strength, max_vertical_correction } => {
        CharacterController::Motor(MotorController::new(
          agent_config.stability_threshold,
          motor_strength,
          max_vertical_correction,
          agent_config.height_tolerance_flat,
        ))
      }
    };

    let agent_id = self.agents.insert(agent);
    self.controllers.insert(agent_id, controller);
    self.handle_to_agent.insert(handle, agent_id);
    self.id_to_agent.insert(agent.id, agent_id);
    agent_id
  }

  pub fn drain_events(&mut self) -> Vec<MovementEvent> {
    std::mem::take(&mut self.events)
  }

  /// Current locomotion state for a registered agent, for callers that only
  /// need to observe it (e.g. driving an animation state machine).
  pub fn locomotion_state(&self, agent_id: AgentId) -> Option<LocomotionState> {
    self.controllers.get(agent_id).map(|controller| controller.state())
  }

  /// Whether `agent_id` currently has an active, uncompleted movement
  /// session.
  pub fn is_moving(&self, agent_id: AgentId) -> bool {
    self.sessions.get(agent_id).is_some_and(|session| !session.completed)
  }

  /// The physics handle backing a registered agent, for callers that need
  /// to read the agent's transform directly from the physics world.
  pub fn agent_handle(&self, agent_id: AgentId) -> Option<RigidBodyHandle> {
    self.agents.get(agent_id).map(|agent| agent.handle)
  }

  fn column_extents(&self) -> PointSampleExtents {
    PointSampleExtents {
      horizontal: self.config.horizontal_search_extent,
      vertical: self.config.vertical_search_extent,
    }
  }

  /// Requests a move for `agent_id` to `target`. Projects the target onto
  /// the navmesh and runs the planner; creates a new session only on
  /// success. If the agent's own spawn point is too far from the navmesh,
  /// it is snapped onto the nearest valid surface first.
  pub fn request_movement(
    &mut self,
    agent_id: AgentId,
    target: Vec3,
    navmesh: &dyn NavMeshProvider,
    physics: &mut dyn PhysicsWorld,
  ) -> Result<(), MovementError> {
    let agent = *self.agents.get(agent_id).ok_or(MovementError::AgentUnknown(agent_id))?;
    let extents = self.column_extents();

    let current_position = physics.position(agent.handle);
    if let Some(projected) = NavQuery::find_nearest_valid_position(navmesh, current_position, extents) {
      let horizontal_offset = (projected.xz() - current_position.xz()).length();
      if horizontal_offset > SPAWN_SNAP_DISTANCE {
        physics.set_position(
          agent.handle,
          Vec3::new(projected.x, projected.y + agent.config.half_height(), projected.z),
        );
      }
    }

    let start_position = physics.position(agent.handle);
    let projected_target = NavQuery::find_nearest_valid_position(navmesh, target, extents)
      .ok_or(MovementError::TargetUnreachable)?;

    let result = PathfindingService::find_path(
      navmesh,
      &agent.config,
      &self.config,
      start_position,
      projected_target,
      None,
    )
    .map_err(|_| MovementError::PathUntraversable)?;

    self.events.push(MovementEvent::MovementStarted {
      agent: agent_id,
      start: start_position,
      end: projected_target,
    });
    self.sessions.insert(agent_id, MovementSession::new(projected_target, result.waypoints));
    Ok(())
  }

  /// Cancels any in-flight session for `agent_id`. A no-op if the agent has
  /// none.
  pub fn stop(&mut self, agent_id: AgentId) {
    self.sessions.remove(agent_id);
  }

  /// Applies an upward impulse and forces AIRBORNE. A no-op while the agent
  /// is not GROUNDED, since a jump only makes sense from solid footing.
  pub fn jump(&mut self, agent_id: AgentId, physics: &mut dyn PhysicsWorld, impulse: f32) {
    let Some(agent) = self.agents.get(agent_id) else { return };
    let Some(controller) = self.controllers.get_mut(agent_id) else { return };
    if !controller.is_grounded() {
      return;
    }
    physics.apply_impulse(agent.handle, Vec3::new(0.0, impulse, 0.0));
    controller.set_airborne();
  }

  /// Applies an impulse along `dir` and forces AIRBORNE, regardless of
  /// current state.
  pub fn knockback(&mut self, agent_id: AgentId, physics: &mut dyn PhysicsWorld, dir: Vec3, force: f32) {
    let Some(agent) = self.agents.get(agent_id) else { return };
    let Some(controller) = self.controllers.get_mut(agent_id) else { return };
    if dir.length_squared() > 1e-8 {
      physics.apply_impulse(agent.handle, dir.normalize() * force);
    }
    controller.set_airborne();
  }

  /// Applies an impulse along `dir` and, if `make_pushable` is set, flips
  /// the rigid body's pushable flag. The flag is not automatically cleared
  /// after `duration`; callers that need the flag to expire must track and
  /// clear it themselves.
  pub fn push(
    &mut self,
    agent_id: AgentId,
    physics: &mut dyn PhysicsWorld,
    dir: Vec3,
    force: f32,
    make_pushable: bool,
    _duration: f32,
  ) {
    let Some(agent) = self.agents.get(agent_id) else { return };
    if dir.length_squared() > 1e-8 {
      physics.apply_impulse(agent.handle, dir.normalize() * force);
    }
    if make_pushable {
      physics.set_pushable(agent.handle, true);
    }
  }

  /// Advances every registered agent by `dt`.
  pub fn update(&mut self, dt: f32, navmesh: &dyn NavMeshProvider, physics: &mut dyn PhysicsWorld) {
    self.route_contact_events(physics);

    let avoidance_entities: Vec<AvoidanceNeighbor> = self
      .agents
      .iter()
      .map(|(_, agent)| AvoidanceNeighbor {
        id: agent.id,
        position: physics.position(agent.handle),
        velocity: physics.velocity(agent.handle),
        radius: agent.config.radius,
      })
      .collect();
    let avoidance_index = LocalAvoidance::build(&avoidance_entities);

    let mut order: Vec<AgentId> = self.agents.keys().collect();
    order.sort_by_key(|&agent_id| self.agents[agent_id].id);

    for agent_id in order {
      self.tick_agent(agent_id, dt, navmesh, physics, &avoidance_index);
    }
  }

  fn route_contact_events(&mut self, physics: &mut dyn PhysicsWorld) {
    use crate::physics::{ContactEvent, GROUND_NORMAL_Y_THRESHOLD};

    for event in physics.drain_contact_events() {
      match event {
        ContactEvent::Entered { dynamic, static_id, normal } => {
          let Some(&agent_id) = self.handle_to_agent.get(&dynamic) else { continue };
          if normal.y <= GROUND_NORMAL_Y_THRESHOLD {
            continue;
          }
          if let Some(agent) = self.agents.get_mut(agent_id) {
            agent.support_normal = Some(normal);
          }
          if let Some(controller) = self.controllers.get_mut(agent_id) {
            controller.notify_ground_contact(static_id);
          }
        }
        ContactEvent::Removed { dynamic, static_id } => {
          let Some(&agent_id) = self.handle_to_agent.get(&dynamic) else { continue };
          let vertical_velocity = physics.velocity(dynamic).y;
          if let Some(agent) = self.agents.get_mut(agent_id) {
            agent.support_normal = None;
          }
          if let Some(controller) = self.controllers.get_mut(agent_id) {
            controller.notify_ground_contact_removed_with_velocity(static_id, vertical_velocity);
          }
        }
      }
    }
  }

  fn tick_agent(
    &mut self,
    agent_id: AgentId,
    dt: f32,
    navmesh: &dyn NavMeshProvider,
    physics: &mut dyn PhysicsWorld,
    avoidance_index: &LocalAvoidance,
  ) {
    let agent = self.agents[agent_id];
    let half_height = agent.config.half_height();

    // Step 1: state refresh. A RECOVERING agent that just crossed the
    // stability threshold distrusts whatever path it had queued (it may
    // have landed somewhere a stale plan never accounted for) and replans
    // from where it actually ended up.
    let was_recovering = self.controllers[agent_id].is_recovering();
    self.controllers.get_mut(agent_id).unwrap().update_state(dt);
    let just_stabilized = was_recovering && self.controllers[agent_id].is_grounded();
    if just_stabilized && self.sessions.contains_key(agent_id) {
      self.replan(agent_id, navmesh, physics);
    }

    // Step 2: idle agents.
    if !self.sessions.contains_key(agent_id) {
      let position = physics.position(agent.handle);
      let target_y = self.ground_target_y(navmesh, position, half_height);
      let controller = self.controllers.get_mut(agent_id).unwrap();
      controller.apply_idle_grounding(physics, agent.handle, target_y, half_height);
      return;
    }

    // Step 3: completed sessions.
    if self.sessions[agent_id].completed {
      let velocity = physics.velocity(agent.handle);
      physics.set_velocity(agent.handle, Vec3::new(0.0, velocity.y, 0.0));
      return;
    }

    // Step 4: path exhausted.
    if self.sessions[agent_id].current_waypoint_idx >= self.sessions[agent_id].waypoints.len() {
      self.complete_session(agent_id, physics);
      return;
    }

    // Step 5: throttled path validation (stubbed per design notes: the
    // dynamic re-validation step has no concrete check in this spec).
    {
      let session = self.sessions.get_mut(agent_id).unwrap();
      session.last_validation_elapsed += dt;
      session.last_replan_time += dt;
      if session.last_validation_elapsed >= self.config.path_validation_interval {
        session.last_validation_elapsed = 0.0;
      }
    }

    // Step 6: wrong-floor detection.
    let position = physics.position(agent.handle);
    let current_ground_y = position.y - half_height;
    let current_waypoint = self.sessions[agent_id].current_waypoint().unwrap();
    let target_ground_y = current_waypoint.y;
    let horizontal_dist = (position.xz() - current_waypoint.xz()).length();
    let is_on_slope =
      (target_ground_y - current_ground_y).abs() > 0.5 && horizontal_dist > 0.1;
    let floor_tolerance =
      self.config.floor_level_tolerance * if is_on_slope { 2.0 } else { 1.0 };
    if (current_ground_y - target_ground_y).abs() > floor_tolerance {
      self.try_replan(agent_id, navmesh, physics);
      return;
    }

    // Step 7: collision prediction and the detour protocol.
    let mut critical_collision_this_tick = false;
    self.sessions.get_mut(agent_id).unwrap().avoiding_collision = false;
    if self.controllers[agent_id].is_grounded() && self.config.enable_local_avoidance {
      let velocity = physics.velocity(agent.handle);
      let neighbors = avoidance_index.neighbors(
        position,
        agent.id,
        self.config.max_avoidance_neighbors,
        self.config.local_avoidance_radius,
      );
      let predictions = LocalAvoidance::predict_collisions(
        position,
        velocity,
        &neighbors,
        CRITICAL_COLLISION_TIME_HORIZON,
        self.config.separation_radius,
      );

      if let Some(critical) = predictions.iter().find(|p| p.should_replan) {
        critical_collision_this_tick = true;
        if let (Some(&other_agent_id), Some(other_neighbor)) = (
          self.id_to_agent.get(&critical.neighbor_id),
          neighbors.iter().find(|n| n.id == critical.neighbor_id),
        ) {
          let other_stable_id = self.agents[other_agent_id].id;
          if agent.id < other_stable_id {
            self.insert_detour(agent_id, position, other_neighbor.position, current_waypoint);
          } else {
            self.sessions.get_mut(agent_id).unwrap().avoiding_collision = true;
          }
        }
      } else if !LocalAvoidance::can_avoid_locally(
        position,
        current_waypoint,
        &neighbors,
        self.config.separation_radius,
      ) {
        // A real logjam: local steering cannot resolve this, replan
        // wholesale instead of trying a single-waypoint detour.
        self.try_replan(agent_id, navmesh, physics);
        return;
      }
    }

    // Step 8: waypoint advance.
    {
      let session = self.sessions.get_mut(agent_id).unwrap();
      if session.detour_inserted && session.current_waypoint_idx > 0 {
        session.detour_inserted = false;
      }
      let waypoint = session.current_waypoint().unwrap();
      let threshold = if session.is_on_final_waypoint() {
        self.config.destination_reached_threshold
      } else {
        self.config.waypoint_reached_threshold
      };
      if (position.xz() - waypoint.xz()).length() < threshold {
        loop {
          session.current_waypoint_idx += 1;
          if session.current_waypoint_idx >= session.waypoints.len() {
            break;
          }
          let next = session.waypoints[session.current_waypoint_idx];
          if (position.xz() - next.xz()).length() > 0.1 {
            break;
          }
        }
        let progress =
          session.current_waypoint_idx as f32 / session.waypoints.len().max(1) as f32;
        self.events.push(MovementEvent::MovementProgress { agent: agent_id, progress });
        if session.current_waypoint_idx >= session.waypoints.len() {
          drop(session);
          self.complete_session(agent_id, physics);
          return;
        }
      }
    }

    // Steps 9-11: motion, dispatched by locomotion state.
    match self.controllers[agent_id].state() {
      LocomotionState::Grounded => {
        self.motion_grounded(agent_id, navmesh, physics, avoidance_index, critical_collision_this_tick);
      }
      LocomotionState::Recovering => {
        self.motion_recovering(agent_id, navmesh, physics);
      }
      LocomotionState::Airborne => {
        // Physics owns the trajectory; nothing to do.
      }
    }
  }

  fn ground_target_y(&self, navmesh: &dyn NavMeshProvider, position: Vec3, half_height: f32) -> f32 {
    NavQuery::find_nearest_valid_position(navmesh, position, self.column_extents())
      .map(|surface| surface.y + half_height)
      .unwrap_or(position.y)
  }

  fn insert_detour(&mut self, agent_id: AgentId, position: Vec3, other_position: Vec3, current_waypoint: Vec3) {
    let session = self.sessions.get_mut(agent_id).unwrap();
    if session.detour_inserted {
      return;
    }
    let to_other = (other_position.xz() - position.xz()).normalize_or_zero();
    // Rotate the direction to the other agent by -90 degrees about Y to get
    // the right-hand perpendicular.
    let right_xz = glam::Vec2::new(to_other.y, -to_other.x);
    let detour_xz = other_position.xz() + right_xz * DETOUR_OFFSET;
    let detour = Vec3::new(detour_xz.x, current_waypoint.y, detour_xz.y);
    let original_final = *session.waypoints.last().unwrap();
    session.replace_waypoints(vec![detour, original_final]);
    session.detour_inserted = true;
  }

  fn motion_grounded(
    &mut self,
    agent_id: AgentId,
    navmesh: &dyn NavMeshProvider,
    physics: &mut dyn PhysicsWorld,
    avoidance_index: &LocalAvoidance,
    critical_collision_this_tick: bool,
  ) {
    let agent = self.agents[agent_id];
    let half_height = agent.config.half_height();
    let position = physics.position(agent.handle);
    let waypoint = self.sessions[agent_id].current_waypoint().unwrap();

    let to_waypoint = waypoint.xz() - position.xz();
    let effective_speed = if self.sessions[agent_id].avoiding_collision {
      agent.config.max_speed * 0.75
    } else {
      agent.config.max_speed
    };
    let desired_xz = if to_waypoint.length() > 1e-4 {
      to_waypoint.normalize() * effective_speed
    } else {
      glam::Vec2::ZERO
    };
    let mut desired = Vec3::new(desired_xz.x, 0.0, desired_xz.y);

    if !critical_collision_this_tick && self.config.enable_local_avoidance {
      let neighbors = avoidance_index.neighbors(
        position,
        agent.id,
        self.config.max_avoidance_neighbors,
        self.config.local_avoidance_radius,
      );
      desired = LocalAvoidance::avoidance_velocity(
        position,
        desired,
        &neighbors,
        self.config.separation_radius,
        self.config.avoidance_strength,
      );
    }

    let session = self.sessions.get_mut(agent_id).unwrap();
    session.ticks_since_start += 1;
    let tick_count = session.ticks_since_start;

    if tick_count % 10 == 0 && desired.length() > 1e-4 {
      let probe = position + desired.normalize() * agent.config.radius * self.config.edge_check_distance_multiplier;
      let probe_surface = NavQuery::find_nearest_valid_position(navmesh, probe, self.column_extents());
      let current_surface_y = position.y - half_height;
      let edge_hazard = match probe_surface {
        None => true,
        Some(surface) => current_surface_y - surface.y > self.config.max_safe_drop_distance,
      };
      if edge_hazard {
        let segment_drop = (waypoint.y - current_surface_y).abs();
        let remaining_drop: f32 = {
          let session = &self.sessions[agent_id];
          session.waypoints[session.current_waypoint_idx..]
            .windows(2)
            .map(|pair| (pair[1].y - pair[0].y).abs())
            .sum()
        };
        let legitimate_drop = segment_drop < 2.0 && remaining_drop < 3.0;
        if !legitimate_drop {
          desired = Vec3::ZERO;
          self.try_replan(agent_id, navmesh, physics);
        }
      }
    }

    let current_velocity = physics.velocity(agent.handle);
    physics.set_velocity(agent.handle, Vec3::new(desired.x, current_velocity.y, desired.z));

    let delta_y = waypoint.y - (position.y - half_height);
    let horizontal_dist = to_waypoint.length();
    let is_on_slope = delta_y.abs() > 0.5 && horizontal_dist > 0.1;
    let should_correct = if is_on_slope { tick_count % 5 == 0 } else { true };
    if !should_correct {
      return;
    }

    let tolerance = if is_on_slope {
      agent.config.height_tolerance_slope
    } else {
      agent.config.height_tolerance_flat
    };
    let target_y = match NavQuery::find_nearest_valid_position(navmesh, position, self.column_extents()) {
      Some(surface) => surface.y + half_height,
      None => self.interpolated_fallback_target_y(agent_id, position, half_height),
    };
    if (position.y - target_y).abs() < tolerance {
      return;
    }
    self.controllers.get_mut(agent_id).unwrap().apply_grounding_force(
      physics,
      agent.handle,
      desired,
      target_y,
      half_height,
    );
  }

  fn motion_recovering(&mut self, agent_id: AgentId, navmesh: &dyn NavMeshProvider, physics: &mut dyn PhysicsWorld) {
    let agent = self.agents[agent_id];
    let half_height = agent.config.half_height();
    let position = physics.position(agent.handle);

    let tolerance = agent.config.height_tolerance_flat;
    let target_y = match NavQuery::find_nearest_valid_position(navmesh, position, self.column_extents()) {
      Some(surface) => surface.y + half_height,
      None => self.interpolated_fallback_target_y(agent_id, position, half_height),
    };
    if (position.y - target_y).abs() < tolerance {
      return;
    }
    self.controllers.get_mut(agent_id).unwrap().apply_idle_grounding(
      physics,
      agent.handle,
      target_y,
      half_height,
    );
  }

  /// Interpolates between the previous and current waypoint Y by the
  /// xz-progress fraction along that segment, for when no navmesh surface
  /// can be found directly beneath the agent (e.g. mid-air over a gap the
  /// plan intentionally crosses).
  fn interpolated_fallback_target_y(&self, agent_id: AgentId, position: Vec3, half_height: f32) -> f32 {
    let session = &self.sessions[agent_id];
    let idx = session.current_waypoint_idx;
    let current = session.waypoints[idx];
    if idx == 0 {
      return current.y + half_height;
    }
    let previous = session.waypoints[idx - 1];
    let segment_len = (current.xz() - previous.xz()).length();
    let fraction = if segment_len > 1e-4 {
      ((position.xz() - previous.xz()).length() / segment_len).clamp(0.0, 1.0)
    } else {
      1.0
    };
    previous.y + (current.y - previous.y) * fraction + half_height
  }

  fn complete_session(&mut self, agent_id: AgentId, physics: &mut dyn PhysicsWorld) {
    let position = physics.position(self.agents[agent_id].handle);
    if let Some(session) = self.sessions.get_mut(agent_id) {
      session.completed = true;
    }
    self.events.push(MovementEvent::DestinationReached { agent: agent_id, position });
  }

  /// Re-runs the planner from the agent's current position to its session
  /// target, gated by `replan_cooldown`.
  fn try_replan(&mut self, agent_id: AgentId, navmesh: &dyn NavMeshProvider, physics: &mut dyn PhysicsWorld) {
    let cooldown_elapsed = self.sessions[agent_id].last_replan_time >= self.config.replan_cooldown;
    if !cooldown_elapsed {
      return;
    }
    self.replan(agent_id, navmesh, physics);
  }

  fn replan(&mut self, agent_id: AgentId, navmesh: &dyn NavMeshProvider, physics: &mut dyn PhysicsWorld) {
    let agent = self.agents[agent_id];
    let target = self.sessions[agent_id].target_position;
    let current_position = physics.position(agent.handle);

    match PathfindingService::find_path(navmesh, &agent.config, &self.config, current_position, target, None) {
      Ok(result) => {
        let session = self.sessions.get_mut(agent_id).unwrap();
        session.replace_waypoints(result.waypoints);
        session.detour_inserted = false;
        session.last_replan_time = 0.0;
        self.events.push(MovementEvent::PathReplanned { agent: agent_id });
      }
      Err(_) => {
        self.sessions.remove(agent_id);
        self.events.push(MovementEvent::PathBlocked { agent: agent_id });
      }
    }
  }
}

#[cfg(test)]
#[path = "movement_controller_test.rs"]
mod test;
