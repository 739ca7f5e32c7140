use super::*;

#[test]
fn half_height_combines_radius_and_half_length() {
  let config = AgentConfig { radius: 0.5, height: 1.8, ..AgentConfig::default() };
  assert!((config.half_height() - 1.4).abs() < 1e-6);
}

#[test]
fn defaults_match_the_documented_table() {
  let config = MovementConfig::default();
  assert_eq!(config.replan_cooldown, 1.0);
  assert_eq!(config.max_avoidance_neighbors, 5);
  assert!(config.enable_local_avoidance);
  assert!(config.enable_path_auto_fix);
}

#[test]
fn check_drift_against_does_not_panic_when_aligned_or_drifted() {
  let agent_config = AgentConfig::default();
  let aligned = MovementConfig::default();
  aligned.check_drift_against(&agent_config);

  let drifted =
    MovementConfig { max_path_segment_climb: 10.0, ..MovementConfig::default() };
  drifted.check_drift_against(&agent_config);
}
