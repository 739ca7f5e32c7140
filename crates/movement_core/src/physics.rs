//! Component G: the integration contract with the underlying rigid-body
//! engine. The engine itself (broadphase, narrowphase, constraint solver)
//! is out of scope; this module defines the trait the movement core
//! consumes, plus a minimal in-memory reference implementation used by this
//! crate's own tests.

use std::collections::{HashMap, HashSet};

use glam::Vec3;
use slotmap::{new_key_type, SlotMap};

use crate::util::BoundingBox;

new_key_type! {
  /// An opaque handle to a rigid body, as returned by
  /// [`PhysicsWorld::register_capsule`].
  pub struct RigidBodyHandle;
}

/// A contact's normal Y component must exceed this for the character
/// controller to treat it as a ground contact; steeper contacts are walls
/// or ceilings and are ignored by the locomotion state machine.
pub const GROUND_NORMAL_Y_THRESHOLD: f32 = 0.7;

/// A ground-contact notification from the physics engine's contact
/// resolution phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContactEvent {
  Entered { dynamic: RigidBodyHandle, static_id: u64, normal: Vec3 },
  Removed { dynamic: RigidBodyHandle, static_id: u64 },
}

/// The operations the movement core invokes on the physics engine, and the
/// contact events it consumes from it. Implementations must either pin
/// physics and movement to the same thread or queue contact events into a
/// per-tick buffer drained at the start of `movement.update` — this trait
/// models the latter via `drain_contact_events`.
pub trait PhysicsWorld {
  fn register_capsule(
    &mut self,
    position: Vec3,
    radius: f32,
    height: f32,
    mass: f32,
    is_static: bool,
  ) -> RigidBodyHandle;

  fn position(&self, handle: RigidBodyHandle) -> Vec3;
  fn velocity(&self, handle: RigidBodyHandle) -> Vec3;
  fn set_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec3);
  fn set_position(&mut self, handle: RigidBodyHandle, position: Vec3);
  fn apply_impulse(&mut self, handle: RigidBodyHandle, impulse: Vec3);
  fn set_pushable(&mut self, handle: RigidBodyHandle, pushable: bool);

  fn entities_in_radius(&self, center: Vec3, radius: f32) -> Vec<RigidBodyHandle>;

  /// Advances the simulation by `dt`, queuing any contact transitions
  /// observed during the step.
  fn step(&mut self, dt: f32);

  /// Drains contact events queued since the last call. The movement core
  /// calls this once at the start of its own tick, before reading any
  /// ground-contact state.
  fn drain_contact_events(&mut self) -> Vec<ContactEvent>;
}

struct Body {
  position: Vec3,
  velocity: Vec3,
  half_height: f32,
  is_static: bool,
  pushable: bool,
}

/// A static, axis-aligned walkable surface. Not a general collider: this is
/// a reference implementation for the crate's own tests, not a
/// narrowphase/broadphase solver.
struct StaticSurface {
  id: u64,
  footprint: BoundingBox,
  top_y: f32,
  normal: Vec3,
}

/// A minimal physics world: free-falling capsules under gravity, with
/// ground contact detected against a small set of registered static
/// surfaces. Deliberately does not resolve collisions (no push-out, no
/// sliding) — the movement core's character controller is responsible for
/// keeping grounded agents on the surface.
pub struct InMemoryPhysicsWorld {
  bodies: SlotMap<RigidBodyHandle, Body>,
  statics: Vec<StaticSurface>,
  next_static_id: u64,
  gravity: Vec3,
  contacts: HashMap<RigidBodyHandle, HashSet<u64>>,
  pending_events: Vec<ContactEvent>,
}

/// Ground contact is reported once a capsule's bottom comes within this
/// distance of a static surface's top.
const CONTACT_SKIN: f32 = 0.05;

impl InMemoryPhysicsWorld {
  pub fn new(gravity: Vec3) -> Self {
    Self {
      bodies: SlotMap::with_key(),
      statics: Vec::new(),
      next_static_id: 0,
      gravity,
      contacts: HashMap::new(),
      pending_events: Vec::new(),
    }
  }

  /// Registers a static, axis-aligned walkable surface. `footprint` is the
  /// surface's (x, z) extent at the given Y; `normal` is its upward
  /// direction (usually [`Vec3::Y`] for flat ground, tilted for ramps).
  pub fn add_static_surface(&mut self, footprint: BoundingBox, top_y: f32, normal: Vec3) -> u64 {
    let id = self.next_static_id;
    self.next_static_id += 1;
    self.statics.push(StaticSurface { id, footprint, top_y, normal: normal.normalize() });
    id
  }
}

impl PhysicsWorld for InMemoryPhysicsWorld {
  fn register_capsule(
    &mut self,
    position: Vec3,
    radius: f32,
    height: f32,
    _mass: f32,
    is_static: bool,
  ) -> RigidBodyHandle {
    self.bodies.insert(Body {
      position,
      velocity: Vec3::ZERO,
      half_height: height / 2.0 + radius,
      is_static,
      pushable: false,
    })
  }

  fn position(&self, handle: RigidBodyHandle) -> Vec3 {
    self.bodies[handle].position
  }

  fn velocity(&self, handle: RigidBodyHandle) -> Vec3 {
    self.bodies[handle].velocity
  }

  fn set_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec3) {
    self.bodies[handle].velocity = velocity;
  }

  fn set_position(&mut self, handle: RigidBodyHandle, position: Vec3) {
    self.bodies[handle].position = position;
  }

  fn apply_impulse(&mut self, handle: RigidBodyHandle, impulse: Vec3) {
    let body = &mut self.bodies[handle];
    body.velocity += impulse;
  }

  fn set_pushable(&mut self, handle: RigidBodyHandle, pushable: bool) {
    self.bodies[handle].pushable = pushable;
  }

  fn entities_in_radius(&self, center: Vec3, radius: f32) -> Vec<RigidBodyHandle> {
    let radius_squared = radius * radius;
    self
      .bodies
      .iter()
      .filter(|(_, body)| !body.is_static && body.position.distance_squared(center) <= radius_squared)
      .map(|(handle, _)| handle)
      .collect()
  }

  fn step(&mut self, dt: f32) {
    let handles: Vec<RigidBodyHandle> = self.bodies.keys().collect();
    for handle in handles {
      let is_static = self.bodies[handle].is_static;
      if is_static {
        continue;
      }
      {
        let body = &mut self.bodies[handle];
        body.velocity += self.gravity * dt;
        body.position += body.velocity * dt;
      }

      let body_bottom = self.bodies[handle].position.y - self.bodies[handle].half_height;
      let body_xz = self.bodies[handle].position;
      let body_vy = self.bodies[handle].velocity.y;

      let touching: HashSet<u64> = self
        .statics
        .iter()
        .filter(|surface| {
          surface.normal.y > GROUND_NORMAL_Y_THRESHOLD
            && surface.footprint.contains_point(Vec3::new(body_xz.x, surface.top_y, body_xz.z))
            && (body_bottom - surface.top_y).abs() <= CONTACT_SKIN
            && body_vy <= 0.1
        })
        .map(|surface| surface.id)
        .collect();

      let previously_touching =
        self.contacts.entry(handle).or_default().clone();

      for &id in touching.difference(&previously_touching) {
        let normal = self.statics.iter().find(|s| s.id == id).unwrap().normal;
        self.pending_events.push(ContactEvent::Entered { dynamic: handle, static_id: id, normal });
      }
      for &id in previously_touching.difference(&touching) {
        self.pending_events.push(ContactEvent::Removed { dynamic: handle, static_id: id });
      }

      self.contacts.insert(handle, touching);
    }
  }

  fn drain_contact_events(&mut self) -> Vec<ContactEvent> {
    std::mem::take(&mut self.pending_events)
  }
}

#[cfg(test)]
#[path = "physics_test.rs"]
mod test;
