//! Component D: short-horizon local collision avoidance. Finds nearby
//! dynamic entities, computes a separation steering force and predicts
//! imminent collisions between constant-velocity trajectories.

use glam::Vec3;
use kdtree::distance::squared_euclidean;
use kdtree::KdTree;

/// A dynamic entity visible to local avoidance. Deliberately independent of
/// [`crate::agent::Agent`] so avoidance can run over any moving body the
/// caller chooses to include (e.g. non-agent obstacles).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvoidanceNeighbor {
  pub id: u64,
  pub position: Vec3,
  pub velocity: Vec3,
  pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionPrediction {
  pub neighbor_id: u64,
  pub time_to_closest_approach: f32,
  pub closest_separation: f32,
  pub should_replan: bool,
}

/// A per-tick spatial index over dynamic entities, rebuilt from scratch
/// each tick (entities move every tick, so there is nothing worth
/// incrementally updating).
pub struct LocalAvoidance {
  index: KdTree<f32, AvoidanceNeighbor, [f32; 3]>,
}

impl LocalAvoidance {
  pub fn build(entities: &[AvoidanceNeighbor]) -> Self {
    let mut index = KdTree::new(3);
    for &entity in entities {
      let point = [entity.position.x, entity.position.y, entity.position.z];
      // Points are cheap (Copy) structs; duplicate insertion on add failure
      // (e.g. NaN input) is treated as "this entity has no neighbors" rather
      // than a hard error, since avoidance is a best-effort service.
      let _ = index.add(point, entity);
    }
    Self { index }
  }

  /// Up to `max_k` nearest entities to `position` within `radius`,
  /// excluding `exclude_id`, ordered nearest-first.
  pub fn neighbors(
    &self,
    position: Vec3,
    exclude_id: u64,
    max_k: usize,
    radius: f32,
  ) -> Vec<AvoidanceNeighbor> {
    if max_k == 0 {
      return Vec::new();
    }
    let point = [position.x, position.y, position.z];
    let radius_squared = radius * radius;
    let mut found = self
      .index
      .within(&point, radius_squared, &squared_euclidean)
      .unwrap_or_default();
    found.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    found
      .into_iter()
      .map(|(_, neighbor)| *neighbor)
      .filter(|neighbor| neighbor.id != exclude_id)
      .take(max_k)
      .collect()
  }

  /// Blends `desired_velocity` with an inverse-square separation force over
  /// `neighbors` within `separation_radius`, then renormalizes to preserve
  /// the magnitude of `desired_velocity` so avoidance alters direction, not
  /// speed.
  pub fn avoidance_velocity(
    position: Vec3,
    desired_velocity: Vec3,
    neighbors: &[AvoidanceNeighbor],
    separation_radius: f32,
    avoidance_strength: f32,
  ) -> Vec3 {
    let mut separation_force = Vec3::ZERO;
    for neighbor in neighbors {
      let offset = position - neighbor.position;
      let distance = offset.length();
      if distance < 1e-4 || distance >= separation_radius {
        continue;
      }
      separation_force += offset.normalize() * (avoidance_strength / (distance * distance));
    }

    let blended = desired_velocity + separation_force;
    let desired_speed = desired_velocity.length();
    if desired_speed < 1e-4 || blended.length() < 1e-4 {
      return blended;
    }
    blended.normalize() * desired_speed
  }

  /// For each neighbor, computes the time and distance of closest approach
  /// assuming both bodies keep their current velocity, and flags
  /// `should_replan` when the approach is imminent and close.
  pub fn predict_collisions(
    position: Vec3,
    velocity: Vec3,
    neighbors: &[AvoidanceNeighbor],
    critical_time: f32,
    separation_radius: f32,
  ) -> Vec<CollisionPrediction> {
    neighbors
      .iter()
      .map(|neighbor| {
        let relative_position = neighbor.position - position;
        let relative_velocity = neighbor.velocity - velocity;
        let relative_speed_squared = relative_velocity.length_squared();

        let time_to_closest_approach = if relative_speed_squared < 1e-6 {
          // Not approaching or receding; already as close as it gets.
          0.0
        } else {
          (-relative_position.dot(relative_velocity) / relative_speed_squared).max(0.0)
        };

        let closest_position = relative_position + relative_velocity * time_to_closest_approach;
        let closest_separation = closest_position.length();

        CollisionPrediction {
          neighbor_id: neighbor.id,
          time_to_closest_approach,
          closest_separation,
          should_replan: time_to_closest_approach < critical_time
            && closest_separation < separation_radius,
        }
      })
      .collect()
  }

  /// Returns `false` when at least 3 neighbors lie within a +/-45 degree
  /// cone of the direction to `target` and inside `separation_radius`: a
  /// real logjam that local steering cannot resolve, so the caller should
  /// replan instead.
  pub fn can_avoid_locally(
    position: Vec3,
    target: Vec3,
    neighbors: &[AvoidanceNeighbor],
    separation_radius: f32,
  ) -> bool {
    let to_target = target - position;
    if to_target.length_squared() < 1e-6 {
      return true;
    }
    let to_target_dir = to_target.normalize();

    let blockers = neighbors
      .iter()
      .filter(|neighbor| {
        let offset = neighbor.position - position;
        let distance = offset.length();
        if distance < 1e-4 || distance >= separation_radius {
          return false;
        }
        let cos_angle = offset.normalize().dot(to_target_dir);
        // cos(45 degrees) ~= 0.7071.
        cos_angle >= std::f32::consts::FRAC_1_SQRT_2
      })
      .count();

    blockers < 3
  }
}

#[cfg(test)]
#[path = "avoidance_test.rs"]
mod test;
