use glam::Vec3;

use crate::navmesh::NavigationMesh;

use super::*;

fn flat_quad(min: (f32, f32), max: (f32, f32), y: f32) -> (Vec<Vec3>, Vec<usize>) {
  let vertices = vec![
    Vec3::new(min.0, y, min.1),
    Vec3::new(max.0, y, min.1),
    Vec3::new(max.0, y, max.1),
    Vec3::new(min.0, y, max.1),
  ];
  (vertices, vec![0, 1, 2, 3])
}

fn bridge_over_ground_mesh() -> crate::navmesh::ValidNavigationMesh {
  let (ground_vertices, ground_polygon) = flat_quad((0.0, 0.0), (20.0, 20.0), 0.0);
  let (bridge_vertices, bridge_polygon) = flat_quad((0.0, 0.0), (20.0, 20.0), 5.0);
  let offset = ground_vertices.len();
  let mut vertices = ground_vertices;
  vertices.extend(bridge_vertices);
  let bridge_polygon: Vec<usize> =
    bridge_polygon.into_iter().map(|i| i + offset).collect();
  NavigationMesh { vertices, polygons: vec![ground_polygon, bridge_polygon] }
    .validate()
    .unwrap()
}

// Scenario 6 from the design: bridge-over-ground at xz=(10, 10).
#[test]
fn downward_priority_picks_the_surface_below_the_hint() {
  let mesh = bridge_over_ground_mesh();
  let extents = PointSampleExtents { horizontal: 2.0, vertical: 5.0 };

  let below_bridge = NavQuery::find_nearest_valid_position(
    &mesh,
    Vec3::new(10.0, 3.0, 10.0),
    extents,
  )
  .unwrap();
  assert!((below_bridge.y - 0.0).abs() < 1e-3);

  let above_bridge = NavQuery::find_nearest_valid_position(
    &mesh,
    Vec3::new(10.0, 6.0, 10.0),
    extents,
  )
  .unwrap();
  assert!((above_bridge.y - 5.0).abs() < 1e-3);
}

#[test]
fn upward_fallback_used_when_hint_is_below_every_surface() {
  let mesh = bridge_over_ground_mesh();
  let extents = PointSampleExtents { horizontal: 2.0, vertical: 5.0 };

  let below_everything = NavQuery::find_nearest_valid_position(
    &mesh,
    Vec3::new(10.0, -2.0, 10.0),
    extents,
  )
  .unwrap();
  assert!((below_everything.y - 0.0).abs() < 1e-3);
}

#[test]
fn is_valid_is_false_off_the_mesh() {
  let (vertices, polygon) = flat_quad((0.0, 0.0), (10.0, 10.0), 0.0);
  let mesh = NavigationMesh { vertices, polygons: vec![polygon] }.validate().unwrap();
  let extents = PointSampleExtents { horizontal: 1.0, vertical: 1.0 };

  assert!(NavQuery::is_valid(&mesh, Vec3::new(5.0, 0.0, 5.0), extents));
  assert!(!NavQuery::is_valid(&mesh, Vec3::new(500.0, 0.0, 500.0), extents));
}
