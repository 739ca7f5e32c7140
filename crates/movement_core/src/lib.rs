//! Navmesh pathfinding, path validation, local avoidance and a capsule
//! character controller, wired together into a single per-tick movement
//! loop. The underlying rigid-body engine and the navmesh generator are
//! both external collaborators: this crate only specifies and consumes
//! their contracts ([`physics::PhysicsWorld`], [`navmesh::NavMeshProvider`]).

pub mod agent;
pub mod avoidance;
pub mod character_controller;
pub mod config;
pub mod error;
pub mod events;
pub mod movement_controller;
pub mod nav_query;
pub mod navmesh;
pub mod path_validator;
pub mod pathfinding_service;
pub mod physics;
pub mod session;
mod util;

pub use agent::{Agent, AgentId};
pub use config::{AgentConfig, MovementConfig};
pub use error::MovementError;
pub use events::MovementEvent;
pub use movement_controller::{ControllerKind, MovementController};
