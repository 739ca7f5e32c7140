//! A validated polygon navmesh: the one concrete [`NavMeshProvider`]
//! shipped with this crate. Mesh *generation* (voxelization, contour
//! extraction) is not part of this module; callers build a
//! [`NavigationMesh`] from whatever source they like and validate it once.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use glam::{Vec3, Vec3Swizzles};
use thiserror::Error;

use crate::util::BoundingBox;

/// An index into [`ValidNavigationMesh::polygons`].
pub type PolygonRef = usize;

/// An unvalidated navmesh: a polygon soup over walkable surfaces.
#[derive(Debug, Clone)]
pub struct NavigationMesh {
  /// Every vertex referenced by `polygons`.
  pub vertices: Vec<Vec3>,
  /// Each polygon is an ordered, counter-clockwise (viewed from +Y) list of
  /// indices into `vertices`. Must be convex.
  pub polygons: Vec<Vec<usize>>,
}

/// Failure reasons for [`NavigationMesh::validate`].
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
  #[error("navmesh has no vertices")]
  NoVertices,
  #[error("navmesh has no polygons")]
  NoPolygons,
  #[error("polygon {0} has fewer than 3 vertices")]
  DegeneratePolygon(usize),
  #[error("polygon {0} references vertex {1}, which is out of range")]
  VertexIndexOutOfRange(usize, usize),
  #[error("polygon {0} is not convex")]
  ConcavePolygon(usize),
  #[error("edge ({0}, {1}) is shared by more than two polygons")]
  OverConnectedEdge(usize, usize),
}

/// One polygon of a [`ValidNavigationMesh`].
#[derive(Debug, Clone)]
pub struct ValidPolygon {
  /// Indices into [`ValidNavigationMesh::vertices`], CCW.
  pub vertices: Vec<usize>,
  /// Per-edge neighbor: `neighbors[i]` is the polygon sharing the edge
  /// `(vertices[i], vertices[i + 1])`, if any.
  pub neighbors: Vec<Option<PolygonRef>>,
  pub bounds: BoundingBox,
  pub center: Vec3,
  /// Connected-component id. Two polygons with different regions cannot be
  /// reached from one another by walking the mesh, even if they occupy the
  /// same (x, z) column at different heights (e.g. a bridge over ground).
  pub region: usize,
}

/// A navmesh that has passed [`NavigationMesh::validate`]. Immutable once
/// built.
#[derive(Debug, Clone)]
pub struct ValidNavigationMesh {
  pub vertices: Vec<Vec3>,
  pub polygons: Vec<ValidPolygon>,
  pub mesh_bounds: BoundingBox,
}

impl NavigationMesh {
  /// Validates the mesh, computing per-polygon bounds, neighbor
  /// connectivity and connected-component regions.
  pub fn validate(self) -> Result<ValidNavigationMesh, ValidationError> {
    if self.vertices.is_empty() {
      return Err(ValidationError::NoVertices);
    }
    if self.polygons.is_empty() {
      return Err(ValidationError::NoPolygons);
    }

    for (polygon_index, polygon) in self.polygons.iter().enumerate() {
      if polygon.len() < 3 {
        return Err(ValidationError::DegeneratePolygon(polygon_index));
      }
      for &vertex_index in polygon {
        if vertex_index >= self.vertices.len() {
          return Err(ValidationError::VertexIndexOutOfRange(
            polygon_index,
            vertex_index,
          ));
        }
      }
      if !is_convex_ccw(&self.vertices, polygon) {
        return Err(ValidationError::ConcavePolygon(polygon_index));
      }
    }

    let mut neighbors: Vec<Vec<Option<PolygonRef>>> =
      self.polygons.iter().map(|polygon| vec![None; polygon.len()]).collect();

    // Two polygons are neighbors if they share an edge, regardless of which
    // direction each one traverses it in.
    let mut edge_owner: HashMap<(usize, usize), (usize, usize)> =
      HashMap::new();
    for (polygon_index, polygon) in self.polygons.iter().enumerate() {
      for edge_index in 0..polygon.len() {
        let a = polygon[edge_index];
        let b = polygon[(edge_index + 1) % polygon.len()];
        let key = if a < b { (a, b) } else { (b, a) };
        match edge_owner.get(&key) {
          None => {
            edge_owner.insert(key, (polygon_index, edge_index));
          }
          Some(&(other_polygon, other_edge)) => {
            if neighbors[other_polygon][other_edge].is_some() {
              return Err(ValidationError::OverConnectedEdge(a, b));
            }
            neighbors[polygon_index][edge_index] = Some(other_polygon);
            neighbors[other_polygon][other_edge] = Some(polygon_index);
          }
        }
      }
    }

    let regions = compute_regions(&neighbors);

    let mut mesh_bounds = BoundingBox::Empty;
    let polygons = self
      .polygons
      .iter()
      .enumerate()
      .map(|(polygon_index, polygon)| {
        let mut bounds = BoundingBox::Empty;
        for &vertex_index in polygon {
          bounds = bounds.expand_to_point(self.vertices[vertex_index]);
        }
        mesh_bounds = mesh_bounds.expand_to_bounds(&bounds);
        let center = polygon
          .iter()
          .fold(Vec3::ZERO, |sum, &vertex_index| sum + self.vertices[vertex_index])
          / polygon.len() as f32;
        ValidPolygon {
          vertices: polygon.clone(),
          neighbors: std::mem::take(&mut neighbors[polygon_index]),
          bounds,
          center,
          region: regions[polygon_index],
        }
      })
      .collect();

    Ok(ValidNavigationMesh { vertices: self.vertices, polygons, mesh_bounds })
  }
}

fn is_convex_ccw(vertices: &[Vec3], polygon: &[usize]) -> bool {
  let n = polygon.len();
  let mut saw_positive = false;
  let mut saw_negative = false;
  for i in 0..n {
    let a = vertices[polygon[i]];
    let b = vertices[polygon[(i + 1) % n]];
    let c = vertices[polygon[(i + 2) % n]];
    let cross = (b - a).xz().perp_dot((c - b).xz());
    if cross > 1e-6 {
      saw_positive = true;
    } else if cross < -1e-6 {
      saw_negative = true;
    }
  }
  // CCW and convex: every turn is a left turn (or collinear).
  saw_positive && !saw_negative
}

/// Union-find over polygon adjacency, using the `neighbors` table built
/// during validation (before it is moved into the final `ValidPolygon`s).
fn compute_regions(neighbors: &[Vec<Option<PolygonRef>>]) -> Vec<usize> {
  let mut region_sets = disjoint::DisjointSet::with_len(neighbors.len());

  for (polygon_index, edges) in neighbors.iter().enumerate() {
    for neighbor in edges.iter().flatten() {
      region_sets.join(polygon_index, *neighbor);
    }
  }

  (0..neighbors.len()).map(|i| region_sets.root_of(i)).collect()
}

/// The external navmesh query surface the movement core consumes (section 6
/// of the design: "Navmesh (consumed)"). Kept as a trait so the core never
/// depends on a concrete mesh representation or generator.
pub trait NavMeshProvider {
  /// Finds the polygon nearest to `point`, restricted to polygons whose
  /// bounds (expanded by `extents`) could plausibly contain it. Returns the
  /// polygon and the closest point to `point` that lies on it.
  fn find_nearest_poly(
    &self,
    point: Vec3,
    extents: Vec3,
  ) -> Option<(PolygonRef, Vec3)>;

  /// Finds a corridor of polygons from `start_poly` to `end_poly` and
  /// straightens it into a waypoint list from `start_point` to `end_point`.
  /// Returns `None` if no corridor connects the two polygons.
  fn find_path(
    &self,
    start_poly: PolygonRef,
    end_poly: PolygonRef,
    start_point: Vec3,
    end_point: Vec3,
  ) -> Option<Vec<Vec3>>;
}

impl ValidNavigationMesh {
  fn polygon_vertices(&self, polygon: &ValidPolygon) -> Vec<Vec3> {
    polygon.vertices.iter().map(|&index| self.vertices[index]).collect()
  }
}

impl NavMeshProvider for ValidNavigationMesh {
  fn find_nearest_poly(
    &self,
    point: Vec3,
    extents: Vec3,
  ) -> Option<(PolygonRef, Vec3)> {
    let query_bounds = BoundingBox::new_box(point - extents, point + extents);

    let mut best: Option<(PolygonRef, Vec3, f32)> = None;
    for (polygon_index, polygon) in self.polygons.iter().enumerate() {
      if !query_bounds.intersects_bounds(&polygon.bounds) {
        continue;
      }
      let vertices = self.polygon_vertices(polygon);
      let closest = closest_point_on_polygon(point, &vertices);
      let horizontal = (closest.xz() - point.xz()).length();
      let vertical = (closest.y - point.y).abs();
      if horizontal > extents.x.max(extents.z) || vertical > extents.y {
        continue;
      }
      // Weight vertical distance more heavily: a point directly above or
      // below a surface should prefer that surface over one that is merely
      // nearby laterally.
      let score = horizontal + vertical * 2.0;
      let is_better =
        best.as_ref().map_or(true, |&(_, _, best_score)| score < best_score);
      if is_better {
        best = Some((polygon_index, closest, score));
      }
    }
    best.map(|(polygon_index, point, _)| (polygon_index, point))
  }

  fn find_path(
    &self,
    start_poly: PolygonRef,
    end_poly: PolygonRef,
    start_point: Vec3,
    end_point: Vec3,
  ) -> Option<Vec<Vec3>> {
    if start_poly == end_poly {
      return Some(vec![start_point, end_point]);
    }

    let steps = self.find_polygon_corridor(start_poly, end_poly)?;

    let mut corridor = vec![start_poly];
    corridor.extend(steps.iter().map(|step| step.next_polygon));

    let portals: Vec<(Vec3, Vec3)> = corridor
      .iter()
      .zip(steps.iter())
      .map(|(&polygon_index, step)| {
        let polygon = &self.polygons[polygon_index];
        let n = polygon.vertices.len();
        let right = self.vertices[polygon.vertices[step.edge_index]];
        let left = self.vertices[polygon.vertices[(step.edge_index + 1) % n]];
        (right, left)
      })
      .collect();

    Some(straighten_path(start_point, end_point, &portals))
  }
}

impl ValidNavigationMesh {
  /// A* search over the polygon adjacency graph from `start_poly` to
  /// `end_poly`, using inter-center distance as both edge cost and
  /// heuristic. `None` if the two polygons are in different regions.
  fn find_polygon_corridor(
    &self,
    start_poly: PolygonRef,
    end_poly: PolygonRef,
  ) -> Option<Vec<PolygonPathStep>> {
    let heuristic = |polygon: PolygonRef| {
      self.polygons[polygon].center.distance(self.polygons[end_poly].center)
    };

    // Ordered by total estimated cost, smallest first via `Reverse` in a
    // max-heap. Ties break on the lower accumulated cost so an equally
    // promising but already-cheaper frontier node is explored first.
    struct Frontier {
      estimate: f32,
      cost: f32,
      polygon: PolygonRef,
    }
    impl PartialEq for Frontier {
      fn eq(&self, other: &Self) -> bool {
        self.estimate == other.estimate
      }
    }
    impl Eq for Frontier {}
    #[allow(clippy::non_canonical_partial_ord_impl)]
    impl PartialOrd for Frontier {
      fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match self.estimate.partial_cmp(&other.estimate) {
          Some(std::cmp::Ordering::Equal) => Reverse(self.cost).partial_cmp(&Reverse(other.cost)),
          ord => ord,
        }
      }
    }
    impl Ord for Frontier {
      fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.partial_cmp(other).unwrap()
      }
    }

    let mut best_cost = HashMap::new();
    let mut came_from: HashMap<PolygonRef, (PolygonRef, PolygonPathStep)> = HashMap::new();
    let mut open = BinaryHeap::new();

    best_cost.insert(start_poly, 0.0f32);
    open.push(Reverse(Frontier { estimate: heuristic(start_poly), cost: 0.0, polygon: start_poly }));

    while let Some(Reverse(current)) = open.pop() {
      if best_cost.get(&current.polygon).is_some_and(|&cost| cost < current.cost) {
        // A cheaper route to this polygon was already found and expanded.
        continue;
      }
      if current.polygon == end_poly {
        let mut steps = Vec::new();
        let mut polygon = end_poly;
        while let Some(&(previous, ref step)) = came_from.get(&polygon) {
          steps.push(step.clone());
          polygon = previous;
        }
        steps.reverse();
        return Some(steps);
      }

      let polygon_data = &self.polygons[current.polygon];
      for (edge_index, neighbor) in
        polygon_data.neighbors.iter().enumerate().filter_map(|(i, n)| n.map(|n| (i, n)))
      {
        let cost = current.cost + polygon_data.center.distance(self.polygons[neighbor].center);
        if best_cost.get(&neighbor).is_none_or(|&best| cost < best) {
          best_cost.insert(neighbor, cost);
          came_from.insert(neighbor, (current.polygon, PolygonPathStep { next_polygon: neighbor, edge_index }));
          open.push(Reverse(Frontier { estimate: cost + heuristic(neighbor), cost, polygon: neighbor }));
        }
      }
    }

    None
  }
}

/// One step of a polygon-corridor path: move to `next_polygon` by crossing
/// the edge `edge_index` of the polygon being left.
#[derive(Debug, Clone, PartialEq)]
struct PolygonPathStep {
  next_polygon: PolygonRef,
  edge_index: usize,
}

/// Finds the closest point on the boundary or interior of a convex polygon
/// to `point`, by fan-triangulating around the first vertex.
fn closest_point_on_polygon(point: Vec3, vertices: &[Vec3]) -> Vec3 {
  let mut best = closest_point_on_triangle(
    point,
    vertices[0],
    vertices[1],
    vertices[2],
  );
  let mut best_distance = point.distance_squared(best);
  for i in 2..vertices.len() - 1 {
    let candidate =
      closest_point_on_triangle(point, vertices[0], vertices[i], vertices[i + 1]);
    let distance = point.distance_squared(candidate);
    if distance < best_distance {
      best = candidate;
      best_distance = distance;
    }
  }
  best
}

/// Closest point on triangle `abc` to `p`. Standard region-test algorithm
/// (Ericson, "Real-Time Collision Detection", section 5.1.5).
fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
  let ab = b - a;
  let ac = c - a;
  let ap = p - a;
  let d1 = ab.dot(ap);
  let d2 = ac.dot(ap);
  if d1 <= 0.0 && d2 <= 0.0 {
    return a;
  }

  let bp = p - b;
  let d3 = ab.dot(bp);
  let d4 = ac.dot(bp);
  if d3 >= 0.0 && d4 <= d3 {
    return b;
  }

  let vc = d1 * d4 - d3 * d2;
  if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
    let v = d1 / (d1 - d3);
    return a + ab * v;
  }

  let cp = p - c;
  let d5 = ab.dot(cp);
  let d6 = ac.dot(cp);
  if d6 >= 0.0 && d5 <= d6 {
    return c;
  }

  let vb = d5 * d2 - d1 * d6;
  if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
    let w = d2 / (d2 - d6);
    return a + ac * w;
  }

  let va = d3 * d6 - d5 * d4;
  if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
    let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
    return b + (c - b) * w;
  }

  let denom = 1.0 / (va + vb + vc);
  let v = vb * denom;
  let w = vc * denom;
  a + ab * v + ac * w
}

fn triangle_area_2(a: Vec3, b: Vec3, c: Vec3) -> f32 {
  (b - a).xz().perp_dot((c - a).xz())
}

/// Straightens a polygon corridor into a waypoint list using the Simple
/// Stupid Funnel Algorithm. `portals` holds one `(right, left)` vertex pair
/// per corridor edge crossed, in travel order.
pub fn straighten_path(
  start: Vec3,
  end: Vec3,
  portals: &[(Vec3, Vec3)],
) -> Vec<Vec3> {
  if portals.is_empty() {
    return vec![start, end];
  }

  let mut rights: Vec<Vec3> = portals.iter().map(|&(right, _)| right).collect();
  let mut lefts: Vec<Vec3> = portals.iter().map(|&(_, left)| left).collect();
  rights.push(end);
  lefts.push(end);

  let mut path = vec![start];
  let mut apex = start;
  let mut apex_index = 0usize;
  let mut left_index = 0usize;
  let mut right_index = 0usize;
  let mut portal_left = lefts[0];
  let mut portal_right = rights[0];

  let mut i = 1;
  while i < lefts.len() {
    let new_left = lefts[i];
    let new_right = rights[i];

    if triangle_area_2(apex, portal_right, new_right) <= 0.0 {
      if apex == portal_right
        || triangle_area_2(apex, portal_left, new_right) > 0.0
      {
        portal_right = new_right;
        right_index = i;
      } else {
        path.push(portal_left);
        apex = portal_left;
        apex_index = left_index;
        portal_left = apex;
        portal_right = apex;
        left_index = apex_index;
        right_index = apex_index;
        i = apex_index + 1;
        continue;
      }
    }

    if triangle_area_2(apex, portal_left, new_left) >= 0.0 {
      if apex == portal_left
        || triangle_area_2(apex, portal_right, new_left) < 0.0
      {
        portal_left = new_left;
        left_index = i;
      } else {
        path.push(portal_right);
        apex = portal_right;
        apex_index = right_index;
        portal_left = apex;
        portal_right = apex;
        left_index = apex_index;
        right_index = apex_index;
        i = apex_index + 1;
        continue;
      }
    }

    i += 1;
  }

  if path.last() != Some(&end) {
    path.push(end);
  }
  path
}

#[cfg(test)]
#[path = "navmesh_test.rs"]
mod test;
