//! Component A: projects arbitrary 3D points onto navmesh surfaces using a
//! downward-priority multi-level column search.

use glam::Vec3;

use crate::navmesh::NavMeshProvider;

/// How far to search, and along what lateral/vertical radius, when
/// projecting a point onto the navmesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSampleExtents {
  pub horizontal: f32,
  pub vertical: f32,
}

impl Default for PointSampleExtents {
  fn default() -> Self {
    Self { horizontal: 2.0, vertical: 5.0 }
  }
}

/// Sampling step along Y for the column search. Not exposed as a tunable
/// configuration key: the 10-tick/5-tick per-agent throttles in the tick
/// loop are the intended guardrail against query flooding, not this
/// constant.
const SAMPLE_STEP: f32 = 0.5;

/// Two projected surface points are the same surface if their Y values are
/// within this distance of each other.
const SAME_SURFACE_EPSILON: f32 = 0.1;

/// Projects arbitrary 3D points onto navmesh surfaces. Stateless: every
/// call takes the navmesh as a parameter, so the exact same logic backs
/// spawn validation, move-target projection and per-frame ground height
/// lookups alike.
pub struct NavQuery;

impl NavQuery {
  /// Finds the navmesh surface Y an agent hinting at `p.y` should occupy at
  /// the column `(p.x, p.z)`.
  ///
  /// Samples downward from `p.y` to `p.y - extents.vertical` first; if any
  /// surfaces are found at or below the hint, the highest one is returned
  /// (closest below, gravity-aligned). Otherwise samples upward from
  /// `p.y + step` to `p.y + extents.vertical` and returns the first surface
  /// found.
  pub fn find_nearest_valid_position(
    navmesh: &dyn NavMeshProvider,
    p: Vec3,
    extents: PointSampleExtents,
  ) -> Option<Vec3> {
    let query_extent = Vec3::new(extents.horizontal, SAMPLE_STEP, extents.horizontal);

    let mut surfaces_below: Vec<Vec3> = Vec::new();
    let mut y = p.y;
    let min_y = p.y - extents.vertical;
    while y >= min_y {
      if let Some((_, point)) =
        navmesh.find_nearest_poly(Vec3::new(p.x, y, p.z), query_extent)
      {
        let already_found = surfaces_below
          .iter()
          .any(|surface| (surface.y - point.y).abs() < SAME_SURFACE_EPSILON);
        if !already_found {
          surfaces_below.push(point);
        }
      }
      y -= SAMPLE_STEP;
    }

    if let Some(&closest_below) = surfaces_below
      .iter()
      .filter(|surface| surface.y <= p.y + SAME_SURFACE_EPSILON)
      .max_by(|a, b| a.y.partial_cmp(&b.y).unwrap())
    {
      return Some(closest_below);
    }

    let max_y = p.y + extents.vertical;
    let mut y = p.y + SAMPLE_STEP;
    while y <= max_y {
      if let Some((_, point)) =
        navmesh.find_nearest_poly(Vec3::new(p.x, y, p.z), query_extent)
      {
        return Some(point);
      }
      y += SAMPLE_STEP;
    }

    None
  }

  /// Thin wrapper over [`Self::find_nearest_valid_position`].
  pub fn is_valid(
    navmesh: &dyn NavMeshProvider,
    p: Vec3,
    extents: PointSampleExtents,
  ) -> bool {
    Self::find_nearest_valid_position(navmesh, p, extents).is_some()
  }
}

#[cfg(test)]
#[path = "nav_query_test.rs"]
mod test;
