//! Component C: the raw navmesh planner wrapped with endpoint projection,
//! path validation and best-effort auto-fix.

use glam::Vec3;
use thiserror::Error;

use crate::config::{AgentConfig, MovementConfig};
use crate::nav_query::{NavQuery, PointSampleExtents};
use crate::navmesh::{NavMeshProvider, PolygonRef};
use crate::path_validator::PathValidator;

#[derive(Debug, Error, PartialEq)]
pub enum PathfindingError {
  #[error("start position could not be projected onto the navmesh")]
  StartNotOnNavmesh,
  #[error("target position could not be projected onto the navmesh")]
  TargetNotOnNavmesh,
  #[error("no path connects the start and target polygons")]
  NoPathFound,
  #[error("a path was found but is not traversable and could not be repaired")]
  PathUntraversable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
  pub waypoints: Vec<Vec3>,
  pub total_length: f32,
}

pub struct PathfindingService;

impl PathfindingService {
  /// Finds a path from `start` to `end`, projecting both endpoints onto the
  /// navmesh first. `extents` overrides the default planner search extents
  /// from `movement_config` when the caller wants a tighter or looser
  /// projection window.
  pub fn find_path(
    navmesh: &dyn NavMeshProvider,
    agent_config: &AgentConfig,
    movement_config: &MovementConfig,
    start: Vec3,
    end: Vec3,
    extents: Option<PointSampleExtents>,
  ) -> Result<PathResult, PathfindingError> {
    movement_config.check_drift_against(agent_config);

    let extents = extents.unwrap_or(PointSampleExtents {
      horizontal: movement_config.pathfinding_search_extents_horizontal,
      vertical: movement_config.pathfinding_search_extents_vertical,
    });

    let (start_poly, start_point) =
      project(navmesh, start, extents).ok_or(PathfindingError::StartNotOnNavmesh)?;
    let (end_poly, end_point) =
      project(navmesh, end, extents).ok_or(PathfindingError::TargetNotOnNavmesh)?;

    let waypoints = navmesh
      .find_path(start_poly, end_poly, start_point, end_point)
      .ok_or(PathfindingError::NoPathFound)?;

    let waypoints = if movement_config.enable_path_validation {
      let validation = PathValidator::validate(
        &waypoints,
        agent_config.max_climb,
        agent_config.max_slope_deg,
        agent_config.radius,
      );
      if validation.is_valid {
        waypoints
      } else if movement_config.enable_path_auto_fix {
        PathValidator::try_fix(
          navmesh,
          &waypoints,
          agent_config.max_climb,
          agent_config.max_slope_deg,
          extents,
        )
        .ok_or(PathfindingError::PathUntraversable)?
      } else {
        return Err(PathfindingError::PathUntraversable);
      }
    } else {
      waypoints
    };

    let total_length = waypoints
      .windows(2)
      .map(|pair| pair[0].distance(pair[1]))
      .sum();

    Ok(PathResult { waypoints, total_length })
  }

  /// Delegates to [`NavQuery::is_valid`] using `movement_config`'s default
  /// search extents.
  pub fn is_valid(
    navmesh: &dyn NavMeshProvider,
    movement_config: &MovementConfig,
    point: Vec3,
  ) -> bool {
    NavQuery::is_valid(
      navmesh,
      point,
      PointSampleExtents {
        horizontal: movement_config.horizontal_search_extent,
        vertical: movement_config.vertical_search_extent,
      },
    )
  }
}

fn project(
  navmesh: &dyn NavMeshProvider,
  point: Vec3,
  extents: PointSampleExtents,
) -> Option<(PolygonRef, Vec3)> {
  let projected = NavQuery::find_nearest_valid_position(navmesh, point, extents)?;
  navmesh.find_nearest_poly(projected, Vec3::splat(0.25))
}

#[cfg(test)]
#[path = "pathfinding_service_test.rs"]
mod test;
