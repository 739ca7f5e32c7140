//! Component E: the capsule character controller. A shared locomotion
//! state machine (GROUNDED/AIRBORNE/RECOVERING) backs two interchangeable
//! control laws, selected per agent.

use glam::Vec3;

use crate::physics::{PhysicsWorld, RigidBodyHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocomotionState {
  Grounded,
  Airborne,
  Recovering,
}

/// A ground contact reported to the state machine stops mattering the
/// instant the agent's vertical velocity exceeds this while the contact set
/// empties; below it, losing contact is treated as a real fall rather than
/// jitter from the controller's own corrections.
const AIRBORNE_VY_THRESHOLD: f32 = 0.05;

/// The GROUNDED/AIRBORNE/RECOVERING automaton, shared by both control laws.
/// Kept as a plain value type embedded in each controller rather than a
/// shared global registry: the `MovementController` is the only writer, one
/// instance per agent.
#[derive(Debug, Clone)]
pub struct LocomotionStateMachine {
  state: LocomotionState,
  ground_contacts: Vec<u64>,
  recovery_elapsed: f32,
  stability_threshold: f32,
}

impl LocomotionStateMachine {
  pub fn new(stability_threshold: f32) -> Self {
    Self {
      state: LocomotionState::Grounded,
      ground_contacts: Vec::new(),
      recovery_elapsed: 0.0,
      stability_threshold,
    }
  }

  pub fn state(&self) -> LocomotionState {
    self.state
  }

  pub fn notify_ground_contact(&mut self, static_id: u64) {
    if !self.ground_contacts.contains(&static_id) {
      self.ground_contacts.push(static_id);
    }
    if matches!(self.state, LocomotionState::Airborne) {
      self.state = LocomotionState::Recovering;
      self.recovery_elapsed = 0.0;
    }
  }

  pub fn notify_ground_contact_removed(&mut self, static_id: u64, vertical_velocity: f32) {
    self.ground_contacts.retain(|&id| id != static_id);
    if !self.ground_contacts.is_empty() {
      return;
    }
    match self.state {
      LocomotionState::Grounded if vertical_velocity > AIRBORNE_VY_THRESHOLD => {
        self.state = LocomotionState::Airborne;
      }
      LocomotionState::Recovering => {
        self.state = LocomotionState::Airborne;
        self.recovery_elapsed = 0.0;
      }
      _ => {}
    }
  }

  pub fn update_state(&mut self, dt: f32) {
    if self.state == LocomotionState::Recovering {
      if self.ground_contacts.is_empty() {
        self.state = LocomotionState::Airborne;
        self.recovery_elapsed = 0.0;
        return;
      }
      self.recovery_elapsed += dt;
      if self.recovery_elapsed >= self.stability_threshold {
        self.state = LocomotionState::Grounded;
      }
    }
  }

  pub fn set_grounded(&mut self) {
    self.state = LocomotionState::Grounded;
    self.recovery_elapsed = 0.0;
  }

  pub fn set_airborne(&mut self) {
    self.state = LocomotionState::Airborne;
    self.recovery_elapsed = 0.0;
  }
}

/// The shared interface both control laws satisfy. `MovementController`
/// interacts with whichever one an agent was configured with through a
/// small enum dispatch ([`CharacterController`]) rather than a trait
/// object per call site.
pub trait LocomotionController {
  fn state(&self) -> LocomotionState;

  fn is_grounded(&self) -> bool {
    self.state() == LocomotionState::Grounded
  }
  fn is_airborne(&self) -> bool {
    self.state() == LocomotionState::Airborne
  }
  fn is_recovering(&self) -> bool {
    self.state() == LocomotionState::Recovering
  }
  /// Stable means settled on the ground; RECOVERING agents are not yet
  /// stable even though they have a ground contact.
  fn is_stable(&self) -> bool {
    self.is_grounded()
  }

  fn update_state(&mut self, dt: f32);

  /// Drives the capsule toward `target_y` at `half_height` above it while
  /// moving horizontally along `move_dir`. A no-op while AIRBORNE, per the
  /// invariant that physics alone owns aerial motion.
  fn apply_grounding_force(
    &mut self,
    physics: &mut dyn PhysicsWorld,
    handle: RigidBodyHandle,
    move_dir: Vec3,
    target_y: f32,
    half_height: f32,
  );

  /// Same as `apply_grounding_force` with zero horizontal motion; keeps a
  /// stationary agent pinned to the surface.
  fn apply_idle_grounding(
    &mut self,
    physics: &mut dyn PhysicsWorld,
    handle: RigidBodyHandle,
    target_y: f32,
    half_height: f32,
  ) {
    self.apply_grounding_force(physics, handle, Vec3::ZERO, target_y, half_height);
  }

  fn notify_ground_contact(&mut self, static_id: u64);
  fn notify_ground_contact_removed(&mut self, physics: &dyn PhysicsWorld, handle: RigidBodyHandle, static_id: u64) {
    let vertical_velocity = physics.velocity(handle).y;
    self.notify_ground_contact_removed_with_velocity(static_id, vertical_velocity);
  }
  fn notify_ground_contact_removed_with_velocity(&mut self, static_id: u64, vertical_velocity: f32);

  fn set_grounded(&mut self);
  fn set_airborne(&mut self);
}

/// E.1: sets linear velocity components directly. Appropriate for gentle
/// terrain, where snapping the residual height error away is imperceptible.
#[derive(Debug, Clone)]
pub struct VelocityController {
  locomotion: LocomotionStateMachine,
}

/// Any upward vertical velocity beyond this, while GROUNDED, is numerical
/// noise from the controller's own corrections and is zeroed.
const GROUNDED_UPWARD_VELOCITY_NOISE: f32 = 0.01;
/// Downward vertical velocity is allowed up to this cap while GROUNDED, so
/// the agent can still settle onto a slightly lower surface.
const GROUNDED_DOWNWARD_VELOCITY_CAP: f32 = -0.5;

impl VelocityController {
  pub fn new(stability_threshold: f32) -> Self {
    Self { locomotion: LocomotionStateMachine::new(stability_threshold) }
  }
}

impl LocomotionController for VelocityController {
  fn state(&self) -> LocomotionState {
    self.locomotion.state()
  }

  fn update_state(&mut self, dt: f32) {
    self.locomotion.update_state(dt);
  }

  fn apply_grounding_force(
    &mut self,
    physics: &mut dyn PhysicsWorld,
    handle: RigidBodyHandle,
    move_dir: Vec3,
    target_y: f32,
    _half_height: f32,
  ) {
    if self.is_airborne() {
      return;
    }

    let current_velocity = physics.velocity(handle);
    let mut vertical = current_velocity.y;
    if vertical > GROUNDED_UPWARD_VELOCITY_NOISE {
      vertical = 0.0;
    }
    vertical = vertical.max(GROUNDED_DOWNWARD_VELOCITY_CAP);

    physics.set_velocity(handle, Vec3::new(move_dir.x, vertical, move_dir.z));

    // The velocity law has no proportional height term, so the residual
    // error is corrected by a direct position snap: acceptable for the
    // gentle terrain this controller targets.
    let position = physics.position(handle);
    physics.set_position(handle, Vec3::new(position.x, target_y, position.z));
  }

  fn notify_ground_contact(&mut self, static_id: u64) {
    self.locomotion.notify_ground_contact(static_id);
  }

  fn notify_ground_contact_removed_with_velocity(&mut self, static_id: u64, vertical_velocity: f32) {
    self.locomotion.notify_ground_contact_removed(static_id, vertical_velocity);
  }

  fn set_grounded(&mut self) {
    self.locomotion.set_grounded();
  }

  fn set_airborne(&mut self) {
    self.locomotion.set_airborne();
  }
}

/// E.2: applies velocity deltas toward a velocity goal, scaled by
/// `motor_strength` per tick. Preferred on steep slopes since it avoids the
/// step-function velocity changes that can launch an agent.
#[derive(Debug, Clone)]
pub struct MotorController {
  locomotion: LocomotionStateMachine,
  /// Fraction of the velocity error corrected per tick, in `(0, 1]`.
  motor_strength: f32,
  max_vertical_correction: f32,
  height_tolerance: f32,
}

impl MotorController {
  pub fn new(
    stability_threshold: f32,
    motor_strength: f32,
    max_vertical_correction: f32,
    height_tolerance: f32,
  ) -> Self {
    Self {
      locomotion: LocomotionStateMachine::new(stability_threshold),
      motor_strength: motor_strength.clamp(f32::EPSILON, 1.0),
      max_vertical_correction,
      height_tolerance,
    }
  }
}

/// Vertical error correction factor applied once the error is already
/// inside tolerance, in place of the usual `motor_strength`: damps out
/// residual bob instead of converging slowly at the configured rate.
const TOLERANCE_DAMPING_FACTOR: f32 = 0.8;
/// Proportional gain from height error to a vertical velocity goal.
const HEIGHT_ERROR_GAIN: f32 = 4.0;

impl LocomotionController for MotorController {
  fn state(&self) -> LocomotionState {
    self.locomotion.state()
  }

  fn update_state(&mut self, dt: f32) {
    self.locomotion.update_state(dt);
  }

  fn apply_grounding_force(
    &mut self,
    physics: &mut dyn PhysicsWorld,
    handle: RigidBodyHandle,
    move_dir: Vec3,
    target_y: f32,
    _half_height: f32,
  ) {
    if self.is_airborne() {
      return;
    }

    let current_velocity = physics.velocity(handle);
    let current_position = physics.position(handle);
    let y_error = target_y - current_position.y;

    let (vertical_goal, blend) = if y_error.abs() < self.height_tolerance {
      (0.0, TOLERANCE_DAMPING_FACTOR)
    } else {
      let goal = (y_error * HEIGHT_ERROR_GAIN)
        .clamp(-self.max_vertical_correction, self.max_vertical_correction);
      (goal, self.motor_strength)
    };

    let velocity_goal = Vec3::new(move_dir.x, vertical_goal, move_dir.z);
    let new_velocity = current_velocity + (velocity_goal - current_velocity) * blend;
    physics.set_velocity(handle, new_velocity);
  }

  fn notify_ground_contact(&mut self, static_id: u64) {
    self.locomotion.notify_ground_contact(static_id);
  }

  fn notify_ground_contact_removed_with_velocity(&mut self, static_id: u64, vertical_velocity: f32) {
    self.locomotion.notify_ground_contact_removed(static_id, vertical_velocity);
  }

  fn set_grounded(&mut self) {
    self.locomotion.set_grounded();
  }

  fn set_airborne(&mut self) {
    self.locomotion.set_airborne();
  }
}

/// A sum type over the two control laws, so `MovementController` holds one
/// value per agent without a trait object.
#[derive(Debug, Clone)]
pub enum CharacterController {
  Velocity(VelocityController),
  Motor(MotorController),
}

impl LocomotionController for CharacterController {
  fn state(&self) -> LocomotionState {
    match self {
      Self::Velocity(controller) => controller.state(),
      Self::Motor(controller) => controller.state(),
    }
  }

  fn update_state(&mut self, dt: f32) {
    match self {
      Self::Velocity(controller) => controller.update_state(dt),
      Self::Motor(controller) => controller.update_state(dt),
    }
  }

  fn apply_grounding_force(
    &mut self,
    physics: &mut dyn PhysicsWorld,
    handle: RigidBodyHandle,
    move_dir: Vec3,
    target_y: f32,
    half_height: f32,
  ) {
    match self {
      Self::Velocity(controller) => {
        controller.apply_grounding_force(physics, handle, move_dir, target_y, half_height)
      }
      Self::Motor(controller) => {
        controller.apply_grounding_force(physics, handle, move_dir, target_y, half_height)
      }
    }
  }

  fn notify_ground_contact(&mut self, static_id: u64) {
    match self {
      Self::Velocity(controller) => controller.notify_ground_contact(static_id),
      Self::Motor(controller) => controller.notify_ground_contact(static_id),
    }
  }

  fn notify_ground_contact_removed_with_velocity(&mut self, static_id: u64, vertical_velocity: f32) {
    match self {
      Self::Velocity(controller) => {
        controller.notify_ground_contact_removed_with_velocity(static_id, vertical_velocity)
      }
      Self::Motor(controller) => {
        controller.notify_ground_contact_removed_with_velocity(static_id, vertical_velocity)
      }
    }
  }

  fn set_grounded(&mut self) {
    match self {
      Self::Velocity(controller) => controller.set_grounded(),
      Self::Motor(controller) => controller.set_grounded(),
    }
  }

  fn set_airborne(&mut self) {
    match self {
      Self::Velocity(controller) => controller.set_airborne(),
      Self::Motor(controller) => controller.set_airborne(),
    }
  }
}

#[cfg(test)]
#[path = "character_controller_test.rs"]
mod test;
