//! An in-flight movement request: the waypoint list being pursued and the
//! cooldown/one-shot bookkeeping the tick loop needs to drive it.

use glam::Vec3;

/// Created by `request_movement`, destroyed on completion, cancellation or
/// agent removal. Owned exclusively by the `MovementController`, keyed by
/// agent id.
#[derive(Debug, Clone)]
pub struct MovementSession {
  pub target_position: Vec3,
  pub waypoints: Vec<Vec3>,
  /// Index of the waypoint currently being pursued. Monotonic
  /// non-decreasing except when a detour or replan replaces the list.
  pub current_waypoint_idx: usize,
  pub last_validation_elapsed: f32,
  pub last_replan_time: f32,
  /// Guards single-insertion of a detour waypoint for the current conflict.
  pub detour_inserted: bool,
  /// Terminal flag: once set, the session keeps applying idle grounding
  /// but no horizontal motion.
  pub completed: bool,
  /// Soft flag set by the detour protocol's yielding side: cuts effective
  /// speed to 75% for the tick it is set on.
  pub avoiding_collision: bool,
  /// Calls to the per-tick motion step since session creation; drives the
  /// every-10th-tick edge check and every-5th-tick slope grounding cadence.
  pub ticks_since_start: u32,
}

impl MovementSession {
  pub fn new(target_position: Vec3, waypoints: Vec<Vec3>) -> Self {
    Self {
      target_position,
      waypoints,
      current_waypoint_idx: 0,
      last_validation_elapsed: 0.0,
      last_replan_time: 0.0,
      detour_inserted: false,
      completed: false,
      avoiding_collision: false,
      ticks_since_start: 0,
    }
  }

  pub fn current_waypoint(&self) -> Option<Vec3> {
    self.waypoints.get(self.current_waypoint_idx).copied()
  }

  pub fn is_on_final_waypoint(&self) -> bool {
    self.current_waypoint_idx + 1 >= self.waypoints.len()
  }

  /// Replaces the waypoint list (detour insertion or replan) and resets the
  /// pursuit index back to its start.
  pub fn replace_waypoints(&mut self, waypoints: Vec<Vec3>) {
    self.waypoints = waypoints;
    self.current_waypoint_idx = 0;
  }
}
