//! Spring connectors between two bodies.
//!
//! A spring pulls its two attach points toward each other with
//!
//! ```text
//! |F| = k · (length - rest) + c · (length - previous_length) / dt
//! ```
//!
//! where `previous_length` is the length measured on the previous sub-step.
//! Springs only push back when compressed if they are marked compressible;
//! otherwise a slack spring exerts nothing.

use slotmap::new_key_type;

use crate::body::{Body, BodyId};
use crate::types::{constants, Vec3};

new_key_type! {
    /// Generation-checked handle to a spring owned by a `PhysicsWorld`.
    pub struct SpringId;
}

/// Where a spring end is attached to its body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchor {
    /// The body's center.
    Center,
    /// An offset in body-local coordinates, rotated with the body.
    Offset(Vec3),
}

impl Anchor {
    /// World-space attach point on `body` at its current state.
    pub fn world_point(&self, body: &Body) -> Vec3 {
        match self {
            Anchor::Center => body.position(),
            Anchor::Offset(local) => body.position() + body.state().orientation.rotate(*local),
        }
    }
}

/// Construction parameters for a spring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringParams {
    pub stiffness: f64,
    pub damping: f64,
    pub rest_length: f64,
    pub anchor_a: Anchor,
    pub anchor_b: Anchor,
    pub compressible: bool,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            stiffness: 10.0,
            damping: 0.0,
            rest_length: 1.0,
            anchor_a: Anchor::Center,
            anchor_b: Anchor::Center,
            compressible: false,
        }
    }
}

/// A damped spring between two bodies.
#[derive(Debug, Clone)]
pub struct Spring {
    body_a: BodyId,
    body_b: BodyId,
    pub params: SpringParams,
    previous_length: f64,
}

impl Spring {
    /// `initial_length` seeds the damping term so a spring created at rest
    /// exerts no damping force on its first sub-step.
    pub fn new(body_a: BodyId, body_b: BodyId, params: SpringParams, initial_length: f64) -> Self {
        Self {
            body_a,
            body_b,
            params,
            previous_length: initial_length,
        }
    }

    pub fn bodies(&self) -> (BodyId, BodyId) {
        (self.body_a, self.body_b)
    }

    pub fn references(&self, id: BodyId) -> bool {
        self.body_a == id || self.body_b == id
    }

    pub fn previous_length(&self) -> f64 {
        self.previous_length
    }

    /// Force on the A end given both attach points, or `None` when the spring
    /// is slack. Always records the current length for the next damping term.
    pub fn force_between(&mut self, point_a: Vec3, point_b: Vec3, dt: f64) -> Option<Vec3> {
        let delta = point_b - point_a;
        let length = delta.magnitude();
        let rate = if dt > 0.0 {
            (length - self.previous_length) / dt
        } else {
            0.0
        };
        self.previous_length = length;

        if length < constants::EPSILON {
            return None;
        }
        if length <= self.params.rest_length && !self.params.compressible {
            return None;
        }

        let magnitude =
            self.params.stiffness * (length - self.params.rest_length) + self.params.damping * rate;
        Some(delta * (magnitude / length))
    }

    /// Accumulate equal and opposite forces (and torques at offset anchors)
    /// on the two bodies.
    pub fn apply(&mut self, a: &mut Body, b: &mut Body, dt: f64) {
        let point_a = self.params.anchor_a.world_point(a);
        let point_b = self.params.anchor_b.world_point(b);

        let Some(force) = self.force_between(point_a, point_b, dt) else {
            return;
        };

        a.apply_force(force);
        b.apply_force(-force);
        if let Anchor::Offset(_) = self.params.anchor_a {
            a.apply_torque((point_a - a.position()).cross(&force));
        }
        if let Anchor::Offset(_) = self.params.anchor_b {
            b.apply_torque((point_b - b.position()).cross(&(-force)));
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn two_spheres(distance: f64) -> (Body, Body) {
        let mut ids: SlotMap<BodyId, ()> = SlotMap::with_key();
        let mut a = Body::sphere(ids.insert(()), 0.5);
        let mut b = Body::sphere(ids.insert(()), 0.5);
        a.set_position(Vec3::ZERO);
        b.set_position(Vec3::new(distance, 0.0, 0.0));
        (a, b)
    }

    fn params(stiffness: f64, damping: f64, rest_length: f64) -> SpringParams {
        SpringParams {
            stiffness,
            damping,
            rest_length,
            ..SpringParams::default()
        }
    }

    #[test]
    fn test_stretched_spring_pulls_together() {
        let (mut a, mut b) = two_spheres(15.0);
        let mut spring = Spring::new(a.id(), b.id(), params(4.0, 0.0, 10.0), 15.0);

        spring.apply(&mut a, &mut b, 0.01);

        // k * (15 - 10) = 20, toward each other
        assert!((a.force().x - 20.0).abs() < 1e-12);
        assert!((b.force().x + 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_damping_uses_previous_length() {
        let (a, b) = two_spheres(15.0);
        let mut spring = Spring::new(a.id(), b.id(), params(4.0, 0.5, 10.0), 14.0);

        let force = spring
            .force_between(a.position(), b.position(), 0.1)
            .expect("stretched spring exerts force");

        // 4 * 5 + 0.5 * (15 - 14) / 0.1 = 25
        assert!((force.magnitude() - 25.0).abs() < 1e-9);
        assert!(force.x > 0.0);
        assert!((spring.previous_length() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_slack_spring_is_skipped() {
        let (mut a, mut b) = two_spheres(5.0);
        let mut spring = Spring::new(a.id(), b.id(), params(4.0, 0.0, 10.0), 5.0);

        spring.apply(&mut a, &mut b, 0.01);

        assert_eq!(a.force(), Vec3::ZERO);
        assert_eq!(b.force(), Vec3::ZERO);
    }

    #[test]
    fn test_compressible_spring_pushes_apart() {
        let (mut a, mut b) = two_spheres(5.0);
        let mut p = params(4.0, 0.0, 10.0);
        p.compressible = true;
        let mut spring = Spring::new(a.id(), b.id(), p, 5.0);

        spring.apply(&mut a, &mut b, 0.01);

        // 4 * (5 - 10) = -20 along A→B, so A is pushed toward -X
        assert!((a.force().x + 20.0).abs() < 1e-12);
        assert!((b.force().x - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_offset_anchor_produces_torque() {
        let (mut a, mut b) = two_spheres(15.0);
        let mut p = params(1.0, 0.0, 10.0);
        p.anchor_a = Anchor::Offset(Vec3::new(0.0, 1.0, 0.0));
        let mut spring = Spring::new(a.id(), b.id(), p, 15.0);

        spring.apply(&mut a, &mut b, 0.01);

        assert!(a.torque().magnitude() > 0.0);
        assert_eq!(b.torque(), Vec3::ZERO);
    }

    #[test]
    fn test_references() {
        let (a, b) = two_spheres(1.0);
        let spring = Spring::new(a.id(), b.id(), SpringParams::default(), 1.0);
        assert!(spring.references(a.id()));
        assert!(spring.references(b.id()));
        assert_eq!(spring.bodies(), (a.id(), b.id()));
    }
}
