//! Component B: checks whether a sequence of waypoints is physically
//! traversable given per-segment climb/slope limits, and can attempt to
//! repair violations by inserting intermediate, navmesh-projected points.

use glam::{Vec3, Vec3Swizzles};

use crate::nav_query::{NavQuery, PointSampleExtents};
use crate::navmesh::NavMeshProvider;

/// Per-segment geometry used by both validation and statistics.
struct SegmentStats {
  climb: f32,
  slope_deg: f32,
}

fn segment_stats(a: Vec3, b: Vec3, radius: f32) -> SegmentStats {
  let climb = (b.y - a.y).abs();
  let horizontal_dist = (b.xz() - a.xz()).length();
  // A direction reversal inside one capsule radius is effectively a
  // vertical pivot: there is no meaningful horizontal run to measure a
  // slope angle over.
  let slope_deg = if horizontal_dist < radius.max(1e-3) {
    90.0
  } else {
    climb.atan2(horizontal_dist).to_degrees()
  };
  SegmentStats { climb, slope_deg }
}

/// Aggregate statistics over an entire waypoint list, regardless of whether
/// it is valid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathStatistics {
  pub total_length: f32,
  pub total_delta_y: f32,
  pub max_segment_climb: f32,
  pub max_segment_slope_deg: f32,
  pub segment_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
  pub is_valid: bool,
  /// Index of the first segment (i.e. the pair `(waypoints[i],
  /// waypoints[i + 1])`) that violates a limit.
  pub violating_segment_idx: Option<usize>,
  pub statistics: PathStatistics,
}

pub struct PathValidator;

impl PathValidator {
  /// Checks every segment of `waypoints` against `max_climb`/`max_slope_deg`.
  /// Statistics are always computed over the full path, independent of
  /// where the first violation occurs.
  pub fn validate(
    waypoints: &[Vec3],
    max_climb: f32,
    max_slope_deg: f32,
    radius: f32,
  ) -> ValidationResult {
    let mut statistics = PathStatistics::default();
    let mut violating_segment_idx = None;

    for i in 0..waypoints.len().saturating_sub(1) {
      let a = waypoints[i];
      let b = waypoints[i + 1];
      let stats = segment_stats(a, b, radius);

      statistics.segment_count += 1;
      statistics.total_length += a.distance(b);
      statistics.total_delta_y += stats.climb;
      statistics.max_segment_climb = statistics.max_segment_climb.max(stats.climb);
      statistics.max_segment_slope_deg =
        statistics.max_segment_slope_deg.max(stats.slope_deg);

      if violating_segment_idx.is_none()
        && (stats.climb > max_climb || stats.slope_deg > max_slope_deg)
      {
        violating_segment_idx = Some(i);
      }
    }

    ValidationResult {
      is_valid: violating_segment_idx.is_none(),
      violating_segment_idx,
      statistics,
    }
  }

  /// Attempts to repair every violating segment by inserting evenly-spaced
  /// intermediate points, each projected onto the navmesh via [`NavQuery`]
  /// (the same projection function used everywhere else). Because the
  /// intermediate points follow the real surface rather than a straight 3D
  /// interpolation, this can fix both climb and slope violations where the
  /// planner's straight segment cut across terrain the real surface does
  /// not. Fails (returns `None`) if any intermediate point cannot be
  /// projected, or if the repaired path still does not validate.
  pub fn try_fix(
    navmesh: &dyn NavMeshProvider,
    waypoints: &[Vec3],
    max_climb: f32,
    max_slope_deg: f32,
    extents: PointSampleExtents,
  ) -> Option<Vec<Vec3>> {
    if waypoints.len() < 2 {
      return Some(waypoints.to_vec());
    }

    let mut fixed = vec![waypoints[0]];
    for i in 0..waypoints.len() - 1 {
      let a = waypoints[i];
      let b = waypoints[i + 1];
      let stats = segment_stats(a, b, 0.0);

      if stats.climb <= max_climb && stats.slope_deg <= max_slope_deg {
        fixed.push(b);
        continue;
      }

      let climb_subdivisions = if max_climb > 1e-3 {
        (stats.climb / max_climb).ceil() as usize
      } else {
        1
      };
      let slope_subdivisions = if max_slope_deg > 1e-3 {
        (stats.slope_deg / max_slope_deg).ceil() as usize
      } else {
        1
      };
      let subdivisions = climb_subdivisions.max(slope_subdivisions).max(2);

      for step in 1..subdivisions {
        let t = step as f32 / subdivisions as f32;
        let interpolated = a.lerp(b, t);
        let projected =
          NavQuery::find_nearest_valid_position(navmesh, interpolated, extents)?;
        fixed.push(projected);
      }
      fixed.push(b);
    }

    let result = Self::validate(&fixed, max_climb, max_slope_deg, 0.0);
    if result.is_valid {
      Some(fixed)
    } else {
      None
    }
  }
}

#[cfg(test)]
#[path = "path_validator_test.rs"]
mod test;
