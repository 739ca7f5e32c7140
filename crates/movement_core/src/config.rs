//! Configuration: the single source of truth for navmesh/pathing/runtime
//! limits ([`AgentConfig`]), and the full set of tunables for the tick loop
//! and its collaborators ([`MovementConfig`]).

/// Per-agent capsule shape and the limits the navmesh was built against.
/// This is the canonical source for climb/slope limits: [`MovementConfig`]
/// carries its own copies for pathfinding and validation, and any
/// divergence from `AgentConfig` is a configuration-drift warning, not an
/// error, with `AgentConfig` always taking precedence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentConfig {
  /// Maximum per-segment vertical step, in meters.
  pub max_climb: f32,
  /// Maximum walkable slope, in degrees.
  pub max_slope_deg: f32,
  pub radius: f32,
  pub height: f32,
  pub max_speed: f32,
  /// How long a ground contact must persist before RECOVERING is promoted
  /// to GROUNDED.
  pub stability_threshold: f32,
  pub height_tolerance_flat: f32,
  pub height_tolerance_slope: f32,
}

impl AgentConfig {
  /// `length/2 + radius`: the offset between the capsule center and the
  /// navmesh surface Y it should rest on.
  pub fn half_height(&self) -> f32 {
    self.height / 2.0 + self.radius
  }
}

impl Default for AgentConfig {
  fn default() -> Self {
    Self {
      max_climb: 0.5,
      max_slope_deg: 45.0,
      radius: 0.5,
      height: 1.8,
      max_speed: 4.0,
      stability_threshold: 0.2,
      height_tolerance_flat: 0.05,
      height_tolerance_slope: 0.15,
    }
  }
}

/// The full configuration table for the tick loop, local avoidance and
/// pathfinding. See `AgentConfig` for the climb/slope source of truth this
/// struct's own `max_path_segment_*` fields are checked against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementConfig {
  pub path_validation_interval: f32,
  pub local_avoidance_radius: f32,
  pub replan_cooldown: f32,
  pub max_avoidance_neighbors: usize,
  pub waypoint_reached_threshold: f32,
  pub destination_reached_threshold: f32,
  pub enable_local_avoidance: bool,
  pub enable_automatic_replanning: bool,
  pub avoidance_strength: f32,
  pub separation_radius: f32,
  pub pathfinding_search_extents_horizontal: f32,
  pub pathfinding_search_extents_vertical: f32,
  pub vertical_search_extent: f32,
  pub horizontal_search_extent: f32,
  pub edge_check_distance_multiplier: f32,
  pub max_safe_drop_distance: f32,
  pub floor_level_tolerance: f32,
  pub max_path_segment_climb: f32,
  pub max_path_segment_slope_deg: f32,
  pub enable_path_validation: bool,
  pub enable_path_auto_fix: bool,
}

impl Default for MovementConfig {
  fn default() -> Self {
    Self {
      path_validation_interval: 0.5,
      local_avoidance_radius: 5.0,
      replan_cooldown: 1.0,
      max_avoidance_neighbors: 5,
      waypoint_reached_threshold: 0.5,
      destination_reached_threshold: 0.3,
      enable_local_avoidance: true,
      enable_automatic_replanning: true,
      avoidance_strength: 2.0,
      separation_radius: 2.0,
      pathfinding_search_extents_horizontal: 5.0,
      pathfinding_search_extents_vertical: 10.0,
      vertical_search_extent: 5.0,
      horizontal_search_extent: 2.0,
      edge_check_distance_multiplier: 2.5,
      max_safe_drop_distance: 2.0,
      floor_level_tolerance: 3.0,
      max_path_segment_climb: 0.5,
      max_path_segment_slope_deg: 45.0,
      enable_path_validation: true,
      enable_path_auto_fix: true,
    }
  }
}

impl MovementConfig {
  /// Warns (via `tracing`) if this configuration's own climb/slope limits
  /// have drifted from `agent_config`'s, which always wins in practice.
  pub fn check_drift_against(&self, agent_config: &AgentConfig) {
    if (self.max_path_segment_climb - agent_config.max_climb).abs() > 1e-6 {
      tracing::warn!(
        movement_config = self.max_path_segment_climb,
        agent_config = agent_config.max_climb,
        "max_path_segment_climb has drifted from AgentConfig.max_climb; AgentConfig wins"
      );
    }
    if (self.max_path_segment_slope_deg - agent_config.max_slope_deg).abs() > 1e-6 {
      tracing::warn!(
        movement_config = self.max_path_segment_slope_deg,
        agent_config = agent_config.max_slope_deg,
        "max_path_segment_slope_deg has drifted from AgentConfig.max_slope_deg; AgentConfig wins"
      );
    }
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod test;
