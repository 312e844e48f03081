//! # Cue Core
//!
//! A deterministic, single-threaded rigid-body engine for ball-and-table
//! games: dynamic spheres, immobile walls and pocket openings.
//!
//! ## Architecture
//!
//! - `types`: Core math (Vec3, Quat, constants)
//! - `geometry`: Planes, pocket triangles and the geometry enum
//! - `integrator`: Four-stage (RK4) integration
//! - `body`: Per-body state and self-integration
//! - `forces`: Springs between bodies
//! - `collision`: Contact pool, swept detection, impulse resolution
//! - `events`: Event sinks and the callback registry
//! - `config`: YAML-based world configuration loader
//! - `world`: Registries and the frame / sub-step loop
//!
//! ## Example
//!
//! ```no_run
//! use cue_core::{BodyVector, PhysicsWorld, Plane, Vec3, WorldConfig};
//!
//! let mut world = PhysicsWorld::new(WorldConfig::default());
//! world.add_plane(Plane::new(Vec3::new(0.0, 0.0, 1.0), 0.0));
//! let ball = world.add_sphere(0.028575);
//! world.set_vector(ball, BodyVector::Position, Vec3::new(0.0, 0.0, 0.028575));
//! world.set_vector(ball, BodyVector::Velocity, Vec3::new(2.0, 0.0, 0.0));
//!
//! let tracked = world.dynamic_body_ids();
//! while !world.at_rest() {
//!     world.update(1.0 / 60.0, 2, &tracked);
//! }
//! ```

pub mod body;
pub mod collision;
pub mod config;
pub mod events;
pub mod forces;
pub mod geometry;
pub mod integrator;
pub mod types;
pub mod world;

pub use body::{Body, BodyId, BodyState, MotionLimits};
pub use collision::{Contact, ContactKind, Restitution};
pub use config::{ConfigError, ConfigLoader, WorldConfig};
pub use events::{CallbackRegistry, Commands, EventKind, EventLog, EventSink, PhysicsEvent};
pub use forces::{Anchor, Spring, SpringId, SpringParams};
pub use geometry::{Geometry, Plane, Triangle};
pub use types::{Quat, Vec3};
pub use world::{BodyFlag, BodyScalar, BodyVector, PhysicsWorld, StepStats, MAX_SUBSTEPS};
