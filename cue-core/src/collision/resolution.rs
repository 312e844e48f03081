//! Impulse-based collision response.
//!
//! Contacts are resolved one at a time, in ascending time-of-impact order,
//! by editing the end-of-step state (`t1`) of the bodies involved.
//!
//! ## Sphere against wall
//!
//! ```text
//!        ● v            j = -(1 + e) · v_n / (1/m + angular term)
//!         \
//!          \  n ↑       v' = v + j·n/m
//! ══════════╳═════════  center snapped to contact + n·r
//! ```
//!
//! The contact-point velocity includes the surface speed `ω × r` of a
//! spinning ball, so spin feeds into whether the ball is approaching.
//!
//! ## Sphere against sphere
//!
//! A symmetric normal impulse with restitution 0.8, plus a small tangential
//! impulse that trades spin between the balls. Overlap remaining at the end
//! of the step is split between the two by inverse mass.
//!
//! Pocket contacts carry no impulse; they only signal that a ball crossed the
//! opening.

use log::trace;
use serde::{Deserialize, Serialize};

use super::contact::{Contact, ContactKind};
use crate::body::Body;
use crate::types::{constants, Vec3};

/// Default restitution between a ball and a wall or table bed.
pub const SPHERE_PLANE_RESTITUTION: f64 = 0.6;

/// Default restitution between two balls.
pub const SPHERE_SPHERE_RESTITUTION: f64 = 0.8;

/// Fraction of the normal impulse available to exchange spin between balls.
pub const SPIN_TRANSFER: f64 = 0.05;

/// Coefficients of restitution per contact kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Restitution {
    pub sphere_plane: f64,
    pub sphere_sphere: f64,
}

impl Default for Restitution {
    fn default() -> Self {
        Self {
            sphere_plane: SPHERE_PLANE_RESTITUTION,
            sphere_sphere: SPHERE_SPHERE_RESTITUTION,
        }
    }
}

/// Collision resolver for balls, walls and pockets.
#[derive(Debug, Clone, Default)]
pub struct CollisionResolver {
    pub restitution: Restitution,
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_restitution(restitution: Restitution) -> Self {
        Self { restitution }
    }

    /// Resolve one contact between `a` (the contact's `body_a`) and `b`.
    ///
    /// # Returns
    /// The approach speed along the normal when an impulse was applied, or
    /// `None` when the bodies were already separating, the contact is a
    /// pocket trigger, or the pair has nothing to resolve.
    pub fn resolve(&self, contact: &Contact, a: &mut Body, b: &mut Body) -> Option<f64> {
        match contact.kind {
            ContactKind::SpherePlane => self.resolve_sphere_plane(contact, a),
            ContactKind::SphereSphere => self.resolve_sphere_sphere(contact, a, b),
            ContactKind::SpherePocket => None,
        }
    }

    fn resolve_sphere_plane(&self, contact: &Contact, sphere: &mut Body) -> Option<f64> {
        let radius = sphere.geometry().radius()?;
        let normal = contact.normal;
        let arm = normal * (-radius);

        let inv_mass = sphere.effective_inv_mass();
        let inv_inertia = sphere.effective_inv_inertia();
        let vn = contact_velocity(sphere, arm).dot(&normal);

        sphere.mark_collided();

        let mut approach = None;
        if vn < 0.0 {
            let denom = inv_mass + angular_term(inv_inertia, arm, normal);
            if denom > constants::EPSILON {
                let j = -(1.0 + self.restitution.sphere_plane) * vn / denom;
                let impulse = normal * j;
                sphere.apply_impulse(impulse);
                sphere.apply_angular_impulse(arm.cross(&impulse));
                trace!("wall impulse {:.4} on {:?}", j, sphere.id());
                approach = Some(-vn);
            }
        }

        if sphere.translatable {
            snap_out_of_plane(sphere, contact, radius);
        }

        approach
    }

    fn resolve_sphere_sphere(&self, contact: &Contact, a: &mut Body, b: &mut Body) -> Option<f64> {
        let ra = a.geometry().radius()?;
        let rb = b.geometry().radius()?;
        let normal = contact.normal;

        // The contact point sits on the line of centers at impact, so each
        // arm is a radius along the normal regardless of where `t1` ended.
        let arm_a = normal * (-ra);
        let arm_b = normal * rb;
        let relative = contact_velocity(a, arm_a) - contact_velocity(b, arm_b);
        let vn = relative.dot(&normal);

        a.mark_collided();
        b.mark_collided();

        let inv_ma = a.effective_inv_mass();
        let inv_mb = b.effective_inv_mass();
        let denom = inv_ma
            + inv_mb
            + angular_term(a.effective_inv_inertia(), arm_a, normal)
            + angular_term(b.effective_inv_inertia(), arm_b, normal);

        let mut approach = None;
        if vn < 0.0 && denom > constants::EPSILON {
            let j = -(1.0 + self.restitution.sphere_sphere) * vn / denom;
            let impulse = normal * j;
            a.apply_impulse(impulse);
            b.apply_impulse(-impulse);

            let slip = relative - normal * vn;
            let slip_speed = slip.magnitude();
            if slip_speed > constants::EPSILON {
                let linear = inv_ma + inv_mb;
                let cap = if linear > constants::EPSILON {
                    slip_speed / linear
                } else {
                    f64::INFINITY
                };
                let friction = slip * (-(SPIN_TRANSFER * j).min(cap) / slip_speed);
                a.apply_angular_impulse(arm_a.cross(&friction));
                b.apply_angular_impulse(arm_b.cross(&(-friction)));
            }

            trace!("ball impulse {:.4} between {:?} and {:?}", j, a.id(), b.id());
            approach = Some(-vn);
        }

        separate(a, ra, b, rb, normal);
        approach
    }
}

/// Velocity of the surface point at `arm` from the body's center.
fn contact_velocity(body: &Body, arm: Vec3) -> Vec3 {
    if body.spinnable {
        body.t1.velocity + body.t1.angular_velocity.cross(&arm)
    } else {
        body.t1.velocity
    }
}

/// `n · ((I⁻¹ (r × n)) × r)`, the rotational share of the impulse denominator.
fn angular_term(inv_inertia: Vec3, arm: Vec3, normal: Vec3) -> f64 {
    inv_inertia
        .component_mul(&arm.cross(&normal))
        .cross(&arm)
        .dot(&normal)
}

/// Put a ball that ends the step inside a plane back on its surface, then
/// carry it along its post-impulse direction by the depth it had sunk.
fn snap_out_of_plane(sphere: &mut Body, contact: &Contact, radius: f64) {
    let normal = contact.normal;
    let depth = radius - normal.dot(&(sphere.t1.position - contact.position));
    if depth <= 0.0 {
        return;
    }

    let surface = sphere.t1.position + normal * depth;
    let mut center = surface + sphere.t1.velocity.normalized() * depth;
    let gap = normal.dot(&(center - contact.position)) - radius;
    if gap < 0.0 {
        center += normal * (-gap);
    }
    sphere.t1.position = center;
}

/// Push two overlapping balls apart, each by its share of inverse mass.
fn separate(a: &mut Body, ra: f64, b: &mut Body, rb: f64, fallback: Vec3) {
    let offset = a.t1.position - b.t1.position;
    let distance = offset.magnitude();
    let overlap = ra + rb - distance;
    if overlap <= 0.0 {
        return;
    }

    let inv_ma = a.effective_inv_mass();
    let inv_mb = b.effective_inv_mass();
    let total = inv_ma + inv_mb;
    if total < constants::EPSILON {
        return;
    }

    let dir = if distance > constants::EPSILON {
        offset / distance
    } else {
        fallback
    };
    a.t1.position += dir * (overlap * inv_ma / total);
    b.t1.position -= dir * (overlap * inv_mb / total);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyId;
    use crate::collision::CollisionDetector;
    use crate::geometry::Plane;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use slotmap::SlotMap;

    fn floor(ids: &mut SlotMap<BodyId, ()>) -> Body {
        Body::plane(ids.insert(()), Plane::new(Vec3::new(0.0, 0.0, 1.0), 0.0))
    }

    fn ball(ids: &mut SlotMap<BodyId, ()>, radius: f64, from: Vec3, to: Vec3, vel: Vec3) -> Body {
        let mut body = Body::sphere(ids.insert(()), radius);
        body.set_position(from);
        body.set_velocity(vel);
        body.t1.position = to;
        body
    }

    #[test]
    fn test_floor_bounce_reflects_normal_velocity() {
        let mut ids = SlotMap::with_key();
        let mut plane = floor(&mut ids);
        let mut sphere = ball(
            &mut ids,
            0.5,
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 0.3),
            Vec3::new(0.0, 0.0, -10.0),
        );
        let mut detector = CollisionDetector::new();
        let contact = detector.test_collision(&sphere, &plane).expect("ball hits floor");

        let approach = CollisionResolver::new().resolve(&contact, &mut sphere, &mut plane);

        assert_eq!(approach, Some(10.0));
        assert!((sphere.velocity().z - 6.0).abs() < 1e-9, "vz = {}", sphere.velocity().z);
        assert!(sphere.collided());
        // Snapped above the floor
        assert!(sphere.position().z >= 0.5 - 1e-12);
    }

    #[test]
    fn test_separating_sphere_gets_no_impulse() {
        let mut ids = SlotMap::with_key();
        let mut plane = floor(&mut ids);
        let mut sphere = ball(
            &mut ids,
            0.5,
            Vec3::new(0.0, 0.0, 0.5),
            Vec3::new(0.0, 0.0, 0.6),
            Vec3::new(0.0, 0.0, 2.0),
        );
        let mut detector = CollisionDetector::new();
        let contact = detector.test_collision(&sphere, &plane).expect("touching at start");

        let approach = CollisionResolver::new().resolve(&contact, &mut sphere, &mut plane);

        assert_eq!(approach, None);
        assert_eq!(sphere.velocity().z, 2.0);
        assert_eq!(sphere.position().z, 0.6);
    }

    #[test]
    fn test_pocket_contact_is_trigger_only() {
        let mut ids = SlotMap::with_key();
        let mut plane = floor(&mut ids);
        let mut sphere = ball(
            &mut ids,
            0.5,
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 0.3),
            Vec3::new(0.0, 0.0, -10.0),
        );
        let contact = Contact {
            kind: ContactKind::SpherePocket,
            body_a: sphere.id(),
            body_b: plane.id(),
            normal: Vec3::new(0.0, 0.0, 1.0),
            ..Contact::default()
        };

        let approach = CollisionResolver::new().resolve(&contact, &mut sphere, &mut plane);

        assert_eq!(approach, None);
        assert_eq!(sphere.velocity().z, -10.0);
        assert!(!sphere.collided());
    }

    #[test]
    fn test_equal_balls_head_on() {
        let mut ids = SlotMap::with_key();
        let mut a = ball(
            &mut ids,
            0.5,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let mut b = ball(
            &mut ids,
            0.5,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::ZERO,
        );
        let mut detector = CollisionDetector::new();
        let contact = detector.test_collision(&a, &b).expect("touching");

        CollisionResolver::new().resolve(&contact, &mut a, &mut b);

        // e = 0.8, equal masses: va = 0.1, vb = 0.9
        assert!((a.velocity().x - 0.1).abs() < 1e-9, "va = {}", a.velocity().x);
        assert!((b.velocity().x - 0.9).abs() < 1e-9, "vb = {}", b.velocity().x);
        assert!(a.collided() && b.collided());
    }

    #[test]
    fn test_overlap_is_split_by_inverse_mass() {
        let mut ids = SlotMap::with_key();
        let mut a = ball(&mut ids, 0.5, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
        let mut b = ball(
            &mut ids,
            0.5,
            Vec3::new(0.6, 0.0, 0.0),
            Vec3::new(0.6, 0.0, 0.0),
            Vec3::ZERO,
        );
        b.translatable = false;
        let mut detector = CollisionDetector::new();
        let contact = detector.test_collision(&a, &b).expect("overlapping");

        CollisionResolver::new().resolve(&contact, &mut a, &mut b);

        // b cannot move, so a takes the whole 0.4 correction
        assert!((a.position().x + 0.4).abs() < 1e-12);
        assert!((b.position().x - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_oblique_swept_hit_uses_impact_normal() {
        let mut ids = SlotMap::with_key();
        let mut a = ball(
            &mut ids,
            0.5,
            Vec3::ZERO,
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
        );
        let mut b = ball(
            &mut ids,
            0.5,
            Vec3::new(2.0, 0.8, 0.0),
            Vec3::new(2.0, 0.8, 0.0),
            Vec3::ZERO,
        );
        let mut detector = CollisionDetector::new();
        let contact = detector.test_collision(&a, &b).expect("grazing hit");
        assert!((contact.normal.x + 0.6).abs() < 1e-9);
        assert!((contact.normal.y + 0.8).abs() < 1e-9);

        let speed = CollisionResolver::new()
            .resolve(&contact, &mut a, &mut b)
            .expect("impulse applied");

        // vn = 2.4, e = 0.8, equal masses: b leaves along -n at 2.16
        assert!((speed - 2.4).abs() < 1e-9);
        let vb = b.velocity();
        assert!((vb.magnitude() - 2.16).abs() < 1e-9, "vb = {:?}", vb);
        assert!((vb.x - 1.296).abs() < 1e-9 && (vb.y - 1.728).abs() < 1e-9);
        let va = a.velocity();
        assert!((va.x - (4.0 - 1.296)).abs() < 1e-9 && (va.y + 1.728).abs() < 1e-9);
    }

    #[test]
    fn test_random_ball_impacts_never_gain_normal_speed() {
        let mut rng = StdRng::seed_from_u64(7);
        let resolver = CollisionResolver::new();

        for _ in 0..200 {
            let mut ids = SlotMap::with_key();
            let mut a = ball(&mut ids, 0.5, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
            let mut b = ball(&mut ids, 0.5, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
            a.set_mass(rng.gen_range(0.1..5.0));
            b.set_mass(rng.gen_range(0.1..5.0));

            let dir = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0);
            let dir = if dir.magnitude() < 1e-3 {
                Vec3::new(1.0, 0.0, 0.0)
            } else {
                dir.normalized()
            };
            b.set_position(dir);
            a.set_velocity(dir * rng.gen_range(0.1..10.0));
            b.set_velocity(Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                0.0,
            ));

            let contact = Contact {
                position: dir * 0.5,
                normal: -dir,
                time: 0.0,
                body_a: a.id(),
                body_b: b.id(),
                kind: ContactKind::SphereSphere,
            };
            let before = (a.velocity() - b.velocity()).dot(&contact.normal);

            resolver.resolve(&contact, &mut a, &mut b);

            let after = (a.velocity() - b.velocity()).dot(&contact.normal);
            assert!(
                after.abs() <= before.abs() + 1e-9,
                "normal speed grew from {} to {}",
                before,
                after
            );
            if before < 0.0 {
                assert!(after >= -1e-9, "balls still approaching after impulse");
            }
        }
    }
}
