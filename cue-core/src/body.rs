//! Rigid bodies and their self-integration.
//!
//! A body keeps two samples of its state: `t0` at the start of the current
//! sub-step and `t1` at its end. Collision detection compares the two to
//! sweep motion across the sub-step; resolution edits `t1` in place.
//!
//! Per sub-step a body goes through:
//!
//! ```text
//! reset_for_next_step   t0 <- t1, damping / braking, spin-down torque
//! integrate1            four-stage drift of t1 from t0 with the accumulator
//! (springs add forces)
//! integrate2            fold late forces + gravity into t1, clamp
//! ```

use log::warn;
use slotmap::new_key_type;

use crate::geometry::{Geometry, Plane, Triangle};
use crate::integrator::{ConstantAcceleration, FourStage, Kinematics};
use crate::types::{constants, Quat, Vec3};

new_key_type! {
    /// Generation-checked handle to a body owned by a `PhysicsWorld`.
    pub struct BodyId;
}

/// Fraction of velocity removed on the sub-step after a collision.
pub const COLLISION_BRAKING: f64 = 0.002;

/// Default mass of a sphere (kg).
pub const DEFAULT_SPHERE_MASS: f64 = 1.0;

/// Default per-sub-step linear damping for spheres.
pub const DEFAULT_LINEAR_DAMPING: f64 = 0.001;

/// Default spin-down rate for spheres (1/s).
pub const DEFAULT_ANGULAR_DAMPING: f64 = 0.8;

/// One time-sample of a body's kinematic state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    pub position: Vec3,
    pub orientation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub angular_momentum: Vec3,
}

impl BodyState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Velocity, spin and momentum ceilings applied at the end of `integrate2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionLimits {
    pub max_linear_velocity: f64,
    pub max_angular_velocity: f64,
    pub max_angular_momentum: f64,
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self {
            max_linear_velocity: f64::INFINITY,
            max_angular_velocity: f64::INFINITY,
            max_angular_momentum: f64::INFINITY,
        }
    }
}

/// A simulated body: a dynamic sphere or an immobile (bounded) plane.
#[derive(Debug, Clone)]
pub struct Body {
    id: BodyId,
    pub(crate) t0: BodyState,
    pub(crate) t1: BodyState,

    force: Vec3,
    torque: Vec3,

    mass: f64,
    inv_mass: f64,
    /// Diagonal of the inverse inertia tensor.
    inv_inertia: Vec3,

    pub linear_damping: f64,
    pub angular_damping: f64,

    pub active: bool,
    pub spinnable: bool,
    pub translatable: bool,
    pub collidable: bool,
    pub gravity_affected: bool,
    pub(crate) collided: bool,

    geometry: Geometry,
}

impl Body {
    fn with_geometry(id: BodyId, geometry: Geometry, position: Vec3) -> Self {
        let mut body = Self {
            id,
            t0: BodyState::at(position),
            t1: BodyState::at(position),
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
            mass: DEFAULT_SPHERE_MASS,
            inv_mass: 1.0 / DEFAULT_SPHERE_MASS,
            inv_inertia: Vec3::ZERO,
            linear_damping: 0.0,
            angular_damping: 0.0,
            active: true,
            spinnable: false,
            translatable: false,
            collidable: true,
            gravity_affected: false,
            collided: false,
            geometry,
        };
        body.update_inertia();
        body
    }

    /// A free, spinning, gravity-affected sphere at the origin.
    pub fn sphere(id: BodyId, radius: f64) -> Self {
        let mut body = Self::with_geometry(id, Geometry::Sphere { radius }, Vec3::ZERO);
        body.linear_damping = DEFAULT_LINEAR_DAMPING;
        body.angular_damping = DEFAULT_ANGULAR_DAMPING;
        body.spinnable = true;
        body.translatable = true;
        body.gravity_affected = true;
        body
    }

    /// An immobile infinite plane.
    pub fn plane(id: BodyId, plane: Plane) -> Self {
        Self::with_geometry(id, Geometry::Plane(plane), plane.origin())
    }

    /// An immobile triangular pocket opening.
    pub fn bounded_plane(id: BodyId, triangle: Triangle) -> Self {
        Self::with_geometry(id, Geometry::bounded(triangle), triangle.centroid())
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// State at the start of the current sub-step.
    pub fn start_state(&self) -> &BodyState {
        &self.t0
    }

    /// State at the end of the current sub-step (the current state between frames).
    pub fn state(&self) -> &BodyState {
        &self.t1
    }

    pub fn position(&self) -> Vec3 {
        self.t1.position
    }

    pub fn velocity(&self) -> Vec3 {
        self.t1.velocity
    }

    pub fn speed(&self) -> f64 {
        self.t1.velocity.magnitude()
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn inv_mass(&self) -> f64 {
        self.inv_mass
    }

    pub fn inv_inertia(&self) -> Vec3 {
        self.inv_inertia
    }

    /// Inverse mass as seen by collision response; zero when not translatable.
    pub fn effective_inv_mass(&self) -> f64 {
        if self.translatable {
            self.inv_mass
        } else {
            0.0
        }
    }

    /// Inverse inertia as seen by collision response; zero when not spinnable.
    pub fn effective_inv_inertia(&self) -> Vec3 {
        if self.spinnable {
            self.inv_inertia
        } else {
            Vec3::ZERO
        }
    }

    pub fn force(&self) -> Vec3 {
        self.force
    }

    pub fn torque(&self) -> Vec3 {
        self.torque
    }

    pub fn collided(&self) -> bool {
        self.collided
    }

    /// Neither translates nor spins; skipped by both integration passes.
    pub fn is_immobile(&self) -> bool {
        !self.translatable && !self.spinnable
    }

    /// Whether the body's position changed over the current sub-step.
    pub fn moved(&self) -> bool {
        self.translatable && self.t0.position != self.t1.position
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Set the mass, clamped to [`constants::MIN_MASS`]. Inertia follows.
    pub fn set_mass(&mut self, mass: f64) {
        let mass = if mass.is_finite() && mass >= constants::MIN_MASS {
            mass
        } else {
            warn!("mass {} below floor, clamping to {}", mass, constants::MIN_MASS);
            constants::MIN_MASS
        };
        self.mass = mass;
        self.inv_mass = 1.0 / mass;
        self.update_inertia();
    }

    /// Resize the geometry. Spheres take the largest component as their radius;
    /// planes have no size and ignore the call.
    pub fn set_extent(&mut self, extent: Vec3) {
        if let Geometry::Sphere { radius } = &mut self.geometry {
            let r = extent.x.max(extent.y).max(extent.z);
            if r > 0.0 && r.is_finite() {
                *radius = r;
            }
        }
        self.update_inertia();
    }

    /// Teleport the body. Planar geometry is translated along with it.
    pub fn set_position(&mut self, position: Vec3) {
        let delta = position - self.t1.position;
        match &mut self.geometry {
            Geometry::Plane(plane) => {
                *plane = Plane::from_point_normal(plane.origin() + delta, plane.normal);
            }
            Geometry::BoundedPlane { plane, triangle } => {
                for v in triangle.vertices.iter_mut() {
                    *v += delta;
                }
                *plane = triangle.plane();
            }
            Geometry::Sphere { .. } => {}
        }
        self.t0.position = position;
        self.t1.position = position;
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.t0.velocity = velocity;
        self.t1.velocity = velocity;
    }

    pub fn set_angular_velocity(&mut self, omega: Vec3) {
        self.t0.angular_velocity = omega;
        self.t1.angular_velocity = omega;
        self.t1.angular_momentum = self.momentum_from_spin(omega);
        self.t0.angular_momentum = self.t1.angular_momentum;
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        let q = orientation.normalized();
        self.t0.orientation = q;
        self.t1.orientation = q;
    }

    pub fn apply_force(&mut self, force: Vec3) {
        self.force += force;
    }

    pub fn apply_torque(&mut self, torque: Vec3) {
        self.torque += torque;
    }

    /// Instantaneous velocity change of `impulse * inv_mass`.
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.translatable {
            self.t1.velocity += impulse * self.inv_mass;
        }
    }

    /// Instantaneous spin change from an angular impulse.
    pub fn apply_angular_impulse(&mut self, impulse: Vec3) {
        if self.spinnable {
            self.t1.angular_momentum += impulse;
            self.t1.angular_velocity = self.inv_inertia.component_mul(&self.t1.angular_momentum);
        }
    }

    pub(crate) fn mark_collided(&mut self) {
        self.collided = true;
    }

    // -------------------------------------------------------------------------
    // Stepping
    // -------------------------------------------------------------------------

    /// Start a new sub-step: `t0 <- t1`, then damping or braking and spin-down.
    ///
    /// Returns `true` when the body's speed is below the sleep threshold.
    pub fn reset_for_next_step(&mut self) -> bool {
        self.t0 = self.t1;

        if self.translatable {
            if self.collided {
                let braking = self.t0.velocity * (-COLLISION_BRAKING * self.mass);
                self.t0.velocity += braking * self.inv_mass;
            } else if self.force.magnitude_squared()
                < constants::FORCE_EPSILON * constants::FORCE_EPSILON
            {
                self.t0.velocity = self.t0.velocity * (1.0 - self.linear_damping);
            }
        }

        if self.spinnable {
            let omega = self.t0.angular_velocity;
            let spin_down = Vec3::new(
                Self::inertia_component(self.inv_inertia.x) * -omega.x,
                Self::inertia_component(self.inv_inertia.y) * -omega.y,
                Self::inertia_component(self.inv_inertia.z) * -omega.z,
            );
            self.torque += spin_down * self.angular_damping;
        }

        self.t1 = self.t0;
        self.collided = false;

        self.t1.velocity.magnitude() < constants::SLEEP_FACTOR * constants::GRAVITY
    }

    /// First integration pass: advance `t1` from `t0` under the accumulated
    /// force and torque, held constant across all four stages.
    ///
    /// The accumulator is consumed; forces added afterwards are folded in by
    /// [`Body::integrate2`].
    pub fn integrate1(&mut self, dt: f64) {
        if self.is_immobile() {
            return;
        }

        if self.translatable {
            let start = Kinematics::new(self.t0.position, self.t0.velocity);
            let accel = ConstantAcceleration(self.force * self.inv_mass);
            let result = FourStage::step(&start, &accel, dt);
            self.t1.position = result.state.position;
            self.t1.velocity = result.state.velocity;
        }

        if self.spinnable {
            let start = Kinematics::new(Vec3::ZERO, self.t0.angular_velocity);
            let alpha = ConstantAcceleration(self.inv_inertia.component_mul(&self.torque));
            let result = FourStage::step(&start, &alpha, dt);
            self.t1.angular_velocity = result.state.velocity;
            self.t1.orientation = self.t0.orientation.integrate(result.mean_velocity, dt);
            self.t1.angular_momentum = self.momentum_from_spin(self.t1.angular_velocity);
        }

        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    /// Second integration pass: fold forces accumulated since `integrate1`
    /// (plus gravity when enabled) into `t1`, then clamp to `limits`.
    pub fn integrate2(&mut self, dt: f64, gravity: Vec3, limits: &MotionLimits) {
        if self.is_immobile() {
            self.force = Vec3::ZERO;
            self.torque = Vec3::ZERO;
            return;
        }

        if self.translatable {
            let mut accel = self.force * self.inv_mass;
            if self.gravity_affected {
                accel += gravity;
            }
            self.t1.velocity += accel * dt;
            self.t1.position += accel * (0.5 * dt * dt);
            self.t1.velocity = self.t1.velocity.clamped(limits.max_linear_velocity);
        }

        if self.spinnable {
            let momentum =
                (self.t1.angular_momentum + self.torque * dt).clamped(limits.max_angular_momentum);
            let omega = self
                .inv_inertia
                .component_mul(&momentum)
                .clamped(limits.max_angular_velocity);
            self.t1.angular_velocity = omega;
            self.t1.angular_momentum = self.momentum_from_spin(omega);
        }

        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }

    /// End-of-sub-step cleanup: renormalize orientation, flush denormal
    /// velocities, and roll back a state that went non-finite.
    pub fn correct_drift(&mut self) {
        if !self.t1.position.is_finite() || !self.t1.velocity.is_finite() {
            warn!("body {:?} produced a non-finite state, rolling back", self.id);
            self.t1 = self.t0;
            self.t1.velocity = Vec3::ZERO;
            self.t1.angular_velocity = Vec3::ZERO;
            self.t1.angular_momentum = Vec3::ZERO;
        }
        self.t1.orientation = self.t1.orientation.normalized();
        if self.t1.velocity.magnitude_squared() < constants::EPSILON * constants::EPSILON {
            self.t1.velocity = Vec3::ZERO;
        }
        if self.t1.angular_velocity.magnitude_squared() < constants::EPSILON * constants::EPSILON {
            self.t1.angular_velocity = Vec3::ZERO;
            self.t1.angular_momentum = Vec3::ZERO;
        }
    }

    /// Axis-aligned bounds of the sphere swept from `t0` to `t1`.
    pub fn swept_bounds(&self) -> Option<(Vec3, Vec3)> {
        let radius = self.geometry.radius()?;
        let (a, b) = (self.t0.position, self.t1.position);
        let min = Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)) - Vec3::splat(radius);
        let max = Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)) + Vec3::splat(radius);
        Some((min, max))
    }

    fn inertia_component(inv: f64) -> f64 {
        if inv > 0.0 {
            1.0 / inv
        } else {
            0.0
        }
    }

    fn momentum_from_spin(&self, omega: Vec3) -> Vec3 {
        Vec3::new(
            Self::inertia_component(self.inv_inertia.x) * omega.x,
            Self::inertia_component(self.inv_inertia.y) * omega.y,
            Self::inertia_component(self.inv_inertia.z) * omega.z,
        )
    }

    /// Solid-sphere inertia `2/5 m r²`; planes use a unit radius so the
    /// tensor stays invertible if they are ever made spinnable.
    fn update_inertia(&mut self) {
        let radius = self.geometry.radius().unwrap_or(1.0);
        let inertia = 0.4 * self.mass * radius * radius;
        self.inv_inertia = if inertia > 0.0 {
            Vec3::splat(1.0 / inertia)
        } else {
            Vec3::ZERO
        };
    }
}

// =============================================================================
// Tests
// =============================================================================
