use glam::Vec3;

use crate::physics::InMemoryPhysicsWorld;

use super::*;

#[test]
fn velocity_controller_starts_grounded() {
  let controller = VelocityController::new(0.3);
  assert!(controller.is_grounded());
  assert!(!controller.is_airborne());
  assert!(controller.is_stable());
}

#[test]
fn losing_all_contacts_while_falling_goes_airborne() {
  let mut machine = LocomotionStateMachine::new(0.3);
  machine.notify_ground_contact(1);
  assert_eq!(machine.state(), LocomotionState::Grounded);

  machine.notify_ground_contact_removed(1, -2.0);
  assert_eq!(machine.state(), LocomotionState::Airborne);
}

#[test]
fn losing_contact_with_upward_velocity_noise_stays_grounded() {
  let mut machine = LocomotionStateMachine::new(0.3);
  machine.notify_ground_contact(1);
  // Residual upward velocity from the controller's own correction, not a
  // real departure from the surface.
  machine.notify_ground_contact_removed(1, 0.01);
  assert_eq!(machine.state(), LocomotionState::Grounded);
}

#[test]
fn losing_contact_with_real_upward_velocity_goes_airborne() {
  let mut machine = LocomotionStateMachine::new(0.3);
  machine.notify_ground_contact(1);
  // A jump or knockback launch, well above the noise threshold.
  machine.notify_ground_contact_removed(1, 3.0);
  assert_eq!(machine.state(), LocomotionState::Airborne);
}

#[test]
fn regaining_contact_while_airborne_enters_recovering_then_grounded() {
  let mut machine = LocomotionStateMachine::new(0.2);
  machine.set_airborne();
  machine.notify_ground_contact(7);
  assert_eq!(machine.state(), LocomotionState::Recovering);

  machine.update_state(0.1);
  assert_eq!(machine.state(), LocomotionState::Recovering);

  machine.update_state(0.2);
  assert_eq!(machine.state(), LocomotionState::Grounded);
}

#[test]
fn recovering_reverts_to_airborne_if_contact_is_lost_again() {
  let mut machine = LocomotionStateMachine::new(0.5);
  machine.set_airborne();
  machine.notify_ground_contact(7);
  assert_eq!(machine.state(), LocomotionState::Recovering);

  machine.notify_ground_contact_removed(7, -1.0);
  assert_eq!(machine.state(), LocomotionState::Airborne);
}

#[test]
fn airborne_controller_does_not_touch_velocity() {
  let mut world = InMemoryPhysicsWorld::new(Vec3::new(0.0, -9.8, 0.0));
  let handle = world.register_capsule(Vec3::new(0.0, 5.0, 0.0), 0.5, 1.8, 1.0, false);
  world.set_velocity(handle, Vec3::new(1.0, -3.0, 0.0));

  let mut controller = VelocityController::new(0.3);
  controller.set_airborne();
  controller.apply_grounding_force(&mut world, handle, Vec3::new(2.0, 0.0, 0.0), 0.0, 1.4);

  assert_eq!(world.velocity(handle), Vec3::new(1.0, -3.0, 0.0));
}

#[test]
fn velocity_controller_snaps_height_and_clamps_vertical_velocity() {
  let mut world = InMemoryPhysicsWorld::new(Vec3::ZERO);
  let handle = world.register_capsule(Vec3::new(0.0, 1.6, 0.0), 0.5, 1.8, 1.0, false);
  world.set_velocity(handle, Vec3::new(0.0, 2.0, 0.0));

  let mut controller = VelocityController::new(0.3);
  controller.apply_grounding_force(&mut world, handle, Vec3::new(1.0, 0.0, 0.0), 1.4, 1.4);

  assert_eq!(world.position(handle).y, 1.4);
  let velocity = world.velocity(handle);
  assert_eq!(velocity.x, 1.0);
  assert_eq!(velocity.y, 0.0);
}

#[test]
fn motor_controller_drives_velocity_toward_height_goal_gradually() {
  let mut world = InMemoryPhysicsWorld::new(Vec3::ZERO);
  let handle = world.register_capsule(Vec3::new(0.0, 1.0, 0.0), 0.5, 1.8, 1.0, false);

  let mut controller = MotorController::new(0.3, 0.5, 3.0, 0.05);
  controller.apply_grounding_force(&mut world, handle, Vec3::ZERO, 2.0, 1.4);

  let velocity = world.velocity(handle);
  // Error is 1.0m upward; gain * error would exceed the cap, so expect the
  // clamped goal blended in at half strength.
  assert!(velocity.y > 0.0);
  assert!(velocity.y < 3.0);
}

#[test]
fn motor_controller_damps_strongly_once_within_tolerance() {
  let mut world = InMemoryPhysicsWorld::new(Vec3::ZERO);
  let handle = world.register_capsule(Vec3::new(0.0, 1.41, 0.0), 0.5, 1.8, 1.0, false);
  world.set_velocity(handle, Vec3::new(0.0, 0.5, 0.0));

  let mut controller = MotorController::new(0.3, 0.2, 3.0, 0.05);
  controller.apply_grounding_force(&mut world, handle, Vec3::ZERO, 1.4, 1.4);

  // Within tolerance, so damping blend (0.8) dominates over motor_strength
  // (0.2): velocity should fall sharply toward zero rather than crawl.
  let velocity = world.velocity(handle);
  assert!(velocity.y.abs() < 0.15);
}

#[test]
fn recovering_state_still_allows_grounding_force_with_zero_move_dir() {
  let mut world = InMemoryPhysicsWorld::new(Vec3::ZERO);
  let handle = world.register_capsule(Vec3::new(0.0, 1.0, 0.0), 0.5, 1.8, 1.0, false);

  let mut controller = CharacterController::Velocity(VelocityController::new(0.3));
  controller.set_airborne();
  controller.notify_ground_contact(1);
  assert!(controller.is_recovering());

  controller.apply_idle_grounding(&mut world, handle, 1.4, 1.4);
  assert_eq!(world.position(handle).y, 1.4);
}
