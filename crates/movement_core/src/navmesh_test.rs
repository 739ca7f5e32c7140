use glam::Vec3;

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

#[test]
fn rejects_empty_mesh() {
  let mesh = NavigationMesh { vertices: Vec::new(), polygons: Vec::new() };
  assert_eq!(mesh.validate().unwrap_err(), ValidationError::NoVertices);
}

#[test]
fn rejects_degenerate_polygon() {
  let mesh = NavigationMesh {
    vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Z],
    polygons: vec![vec![0, 1]],
  };
  assert_eq!(mesh.validate().unwrap_err(), ValidationError::DegeneratePolygon(0));
}

#[test]
fn two_adjacent_quads_connect_and_share_a_region() {
  // Two quads sharing the edge x=10.
  let vertices = vec![
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(10.0, 0.0, 0.0),
    Vec3::new(10.0, 0.0, 10.0),
    Vec3::new(0.0, 0.0, 10.0),
    Vec3::new(20.0, 0.0, 0.0),
    Vec3::new(20.0, 0.0, 10.0),
  ];
  let polygons = vec![vec![0, 1, 2, 3], vec![1, 4, 5, 2]];
  let mesh = NavigationMesh { vertices, polygons }.validate().unwrap();

  assert_eq!(mesh.polygons[0].region, mesh.polygons[1].region);
  assert!(mesh.polygons[0].neighbors.iter().any(|n| *n == Some(1)));
  assert!(mesh.polygons[1].neighbors.iter().any(|n| *n == Some(0)));
}

#[test]
fn disconnected_quads_get_different_regions() {
  let (mut vertices, polygon_a) = flat_quad((-10.0, -10.0), (-2.0, 10.0), 0.0);
  let (far_vertices, polygon_b) = flat_quad((2.0, -10.0), (10.0, 10.0), 0.0);
  let offset = vertices.len();
  vertices.extend(far_vertices);
  let polygon_b: Vec<usize> = polygon_b.into_iter().map(|i| i + offset).collect();

  let mesh =
    NavigationMesh { vertices, polygons: vec![polygon_a, polygon_b] }.validate().unwrap();

  assert_ne!(mesh.polygons[0].region, mesh.polygons[1].region);
}

#[test]
fn find_nearest_poly_prefers_surface_below_hint() {
  // Bridge-over-ground: two disconnected surfaces at the same (x, z), one
  // at y=0 and one at y=5.
  let (ground_vertices, ground_polygon) = flat_quad((0.0, 0.0), (20.0, 20.0), 0.0);
  let (bridge_vertices, bridge_polygon) = flat_quad((0.0, 0.0), (20.0, 20.0), 5.0);
  let offset = ground_vertices.len();
  let mut vertices = ground_vertices;
  vertices.extend(bridge_vertices);
  let bridge_polygon: Vec<usize> =
    bridge_polygon.into_iter().map(|i| i + offset).collect();

  let mesh = NavigationMesh {
    vertices,
    polygons: vec![ground_polygon, bridge_polygon],
  }
  .validate()
  .unwrap();

  let hint_below_bridge = Vec3::new(10.0, 3.0, 10.0);
  let (polygon_index, point) =
    mesh.find_nearest_poly(hint_below_bridge, Vec3::new(2.0, 5.0, 2.0)).unwrap();
  assert_eq!(polygon_index, 0);
  assert!((point.y - 0.0).abs() < 1e-4);

  let hint_above_bridge = Vec3::new(10.0, 6.0, 10.0);
  let (polygon_index, point) =
    mesh.find_nearest_poly(hint_above_bridge, Vec3::new(2.0, 5.0, 2.0)).unwrap();
  assert_eq!(polygon_index, 1);
  assert!((point.y - 5.0).abs() < 1e-4);
}

#[test]
fn find_path_straightens_corridor_around_a_corner() {
  // An L-shaped corridor: quad A from x=[0,10] z=[0,10], quad B from
  // x=[10,20] z=[0,10]. A straight line from (1,1) to (19,1) has no
  // obstacles so the straightened path should just be the two endpoints.
  let vertices = vec![
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(10.0, 0.0, 0.0),
    Vec3::new(10.0, 0.0, 10.0),
    Vec3::new(0.0, 0.0, 10.0),
    Vec3::new(20.0, 0.0, 0.0),
    Vec3::new(20.0, 0.0, 10.0),
  ];
  let polygons = vec![vec![0, 1, 2, 3], vec![1, 4, 5, 2]];
  let mesh = NavigationMesh { vertices, polygons }.validate().unwrap();

  let start = Vec3::new(1.0, 0.0, 1.0);
  let end = Vec3::new(19.0, 0.0, 1.0);
  let waypoints = mesh.find_path(0, 1, start, end).unwrap();

  assert_eq!(waypoints.first(), Some(&start));
  assert_eq!(waypoints.last(), Some(&end));
  assert!(waypoints.len() >= 2);
}

#[test]
fn find_path_returns_none_across_disconnected_regions() {
  let (mut vertices, polygon_a) = flat_quad((-10.0, -10.0), (-2.0, 10.0), 0.0);
  let (far_vertices, polygon_b) = flat_quad((2.0, -10.0), (10.0, 10.0), 0.0);
  let offset = vertices.len();
  vertices.extend(far_vertices);
  let polygon_b: Vec<usize> = polygon_b.into_iter().map(|i| i + offset).collect();
  let mesh =
    NavigationMesh { vertices, polygons: vec![polygon_a, polygon_b] }.validate().unwrap();

  let result =
    mesh.find_path(0, 1, Vec3::new(-5.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0));
  assert!(result.is_none());
}

#[test]
fn straighten_path_with_no_portals_is_a_straight_line() {
  let start = Vec3::new(0.0, 0.0, 0.0);
  let end = Vec3::new(5.0, 0.0, 5.0);
  assert_eq!(straighten_path(start, end, &[]), vec![start, end]);
}
