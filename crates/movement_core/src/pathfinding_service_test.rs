use glam::{Vec3, Vec3Swizzles};

use crate::navmesh::NavigationMesh;

use super::*;

/// Builds a 20x20 ground plane at Y=0 with a rectangular hole cut out for a
/// wall footprint (x in [-0.5, 0.5], z in [-4, 4]), leaving routes around
/// the front (z > 4) and back (z < -4).
fn ground_with_wall_hole() -> crate::navmesh::ValidNavigationMesh {
  let xs = [-10.0, -0.5, 0.5, 10.0];
  let zs = [-10.0, -4.0, 4.0, 10.0];

  let mut vertices = Vec::new();
  for &z in &zs {
    for &x in &xs {
      vertices.push(Vec3::new(x, 0.0, z));
    }
  }
  let index = |xi: usize, zi: usize| zi * xs.len() + xi;

  let mut polygons = Vec::new();
  for zi in 0..zs.len() - 1 {
    for xi in 0..xs.len() - 1 {
      // Skip the middle column's middle row: that is the wall footprint.
      if xi == 1 && zi == 1 {
        continue;
      }
      polygons.push(vec![
        index(xi, zi),
        index(xi + 1, zi),
        index(xi + 1, zi + 1),
        index(xi, zi + 1),
      ]);
    }
  }

  NavigationMesh { vertices, polygons }.validate().unwrap()
}

fn inside_wall_footprint(p: Vec3) -> bool {
  (-0.5..=0.5).contains(&p.x) && (-4.0..=4.0).contains(&p.z)
}

// Scenario 3: around-a-wall path.
#[test]
fn find_path_routes_around_a_wall_hole() {
  let mesh = ground_with_wall_hole();
  let agent_config = AgentConfig::default();
  let movement_config = MovementConfig::default();

  let result = PathfindingService::find_path(
    &mesh,
    &agent_config,
    &movement_config,
    Vec3::new(-5.0, 1.0, 0.0),
    Vec3::new(6.0, 1.0, 0.0),
    None,
  )
  .expect("a route should exist around the wall");

  assert!(result.waypoints.len() >= 2);
  for waypoint in &result.waypoints {
    assert!(!inside_wall_footprint(*waypoint));
  }
  assert!((result.waypoints.first().unwrap().xz() - Vec3::new(-5.0, 0.0, 0.0).xz()).length() < 1.0);
  assert!((result.waypoints.last().unwrap().xz() - Vec3::new(6.0, 0.0, 0.0).xz()).length() < 1.0);
}

#[test]
fn find_path_fails_when_target_is_off_the_navmesh() {
  let mesh = ground_with_wall_hole();
  let agent_config = AgentConfig::default();
  let movement_config = MovementConfig::default();

  let tiny_extents = PointSampleExtents { horizontal: 0.01, vertical: 0.01 };
  let result = PathfindingService::find_path(
    &mesh,
    &agent_config,
    &movement_config,
    Vec3::new(-5.0, 0.0, 0.0),
    Vec3::new(1000.0, 0.0, 1000.0),
    Some(tiny_extents),
  );

  assert_eq!(result.unwrap_err(), PathfindingError::TargetNotOnNavmesh);
}

#[test]
fn is_valid_delegates_to_nav_query() {
  let mesh = ground_with_wall_hole();
  let movement_config = MovementConfig::default();
  assert!(PathfindingService::is_valid(&mesh, &movement_config, Vec3::new(-5.0, 0.0, 0.0)));
  assert!(!PathfindingService::is_valid(&mesh, &movement_config, Vec3::new(0.0, 0.0, 0.0)));
}
