//! Swept collision detection between pairs of bodies.
//!
//! Every test compares a body's start-of-step state (`t0`) against its
//! end-of-step state (`t1`), so contacts are found even when a fast ball
//! would tunnel through a wall or another ball within one sub-step.

use log::trace;

use super::contact::{Contact, ContactKind, ContactPool};
use crate::body::Body;
use crate::geometry::{Geometry, Plane, Triangle};
use crate::types::{constants, Vec3};

/// Pair tester that records contacts in a fixed-capacity pool.
#[derive(Debug, Clone, Default)]
pub struct CollisionDetector {
    pool: ContactPool,
}

impl CollisionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: ContactPool::with_capacity(capacity),
        }
    }

    /// Ensure room for `capacity` simultaneous contacts.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.pool.set_capacity(capacity);
    }

    pub fn pool(&self) -> &ContactPool {
        &self.pool
    }

    /// Contacts found since the last [`CollisionDetector::end`].
    pub fn contacts(&self) -> &[Contact] {
        self.pool.active()
    }

    /// Mark the start of a detection pass.
    ///
    /// The active set is always empty here; contacts are drained by `end`.
    pub fn begin(&mut self) {
        debug_assert_eq!(self.pool.active_len(), 0, "begin() without end()");
    }

    /// Order the active contacts by ascending time of impact.
    pub fn sort_contacts(&mut self) {
        self.pool.sort_active();
    }

    /// Return all active contacts to the pool.
    pub fn end(&mut self) {
        self.pool.drain_active();
    }

    /// Test one pair of bodies and record a contact if they touch during the
    /// current sub-step.
    ///
    /// # Arguments
    /// * `a`, `b` - Bodies in either order; plane–sphere pairs are mirrored
    ///   so the sphere is always `body_a` of the contact.
    ///
    /// # Returns
    /// A copy of the recorded contact, or `None`. Plane–plane pairs never
    /// collide.
    ///
    /// # Panics
    /// When the contact pool is exhausted.
    pub fn test_collision(&mut self, a: &Body, b: &Body) -> Option<Contact> {
        let mut contact = self.pool.acquire();

        let hit = match (a.geometry(), b.geometry()) {
            (Geometry::Sphere { radius: ra }, Geometry::Sphere { radius: rb }) => {
                sphere_vs_sphere(a, *ra, b, *rb, &mut contact)
            }
            (Geometry::Sphere { radius }, Geometry::Plane(plane)) => {
                sphere_vs_plane(a, *radius, b, plane, None, &mut contact)
            }
            (Geometry::Plane(plane), Geometry::Sphere { radius }) => {
                sphere_vs_plane(b, *radius, a, plane, None, &mut contact)
            }
            (Geometry::Sphere { radius }, Geometry::BoundedPlane { plane, triangle }) => {
                sphere_vs_plane(a, *radius, b, plane, Some(triangle), &mut contact)
            }
            (Geometry::BoundedPlane { plane, triangle }, Geometry::Sphere { radius }) => {
                sphere_vs_plane(b, *radius, a, plane, Some(triangle), &mut contact)
            }
            (
                Geometry::Plane(_) | Geometry::BoundedPlane { .. },
                Geometry::Plane(_) | Geometry::BoundedPlane { .. },
            ) => false,
        };

        if hit {
            trace!(
                "contact {:?} {:?}/{:?} at t={:.4}",
                contact.kind,
                contact.body_a,
                contact.body_b,
                contact.time
            );
            self.pool.commit(contact);
            Some(contact)
        } else {
            self.pool.release(contact);
            None
        }
    }
}

/// Swept sphere–sphere test.
///
/// With `p` the start separation and `d` the relative displacement over the
/// sub-step, the spheres touch at the smallest `u` in `[0, 1]` solving
/// `|p + d·u| = ra + rb`. Spheres already overlapping at `t0` get `u = 0`.
fn sphere_vs_sphere(a: &Body, ra: f64, b: &Body, rb: f64, contact: &mut Contact) -> bool {
    let reach = ra + rb;
    let p = a.t0.position - b.t0.position;
    let d = (a.t1.position - a.t0.position) - (b.t1.position - b.t0.position);

    let (time, normal) = if p.magnitude_squared() <= reach * reach {
        let end = a.t1.position - b.t1.position;
        let normal = if end.magnitude() > constants::EPSILON {
            end.normalized()
        } else if p.magnitude() > constants::EPSILON {
            p.normalized()
        } else {
            Vec3::new(0.0, 0.0, 1.0)
        };
        (0.0, normal)
    } else {
        let approach = p.dot(&d);
        if approach >= 0.0 {
            return false;
        }

        let qa = d.dot(&d);
        let qb = 2.0 * approach;
        let qc = p.dot(&p) - reach * reach;
        let disc = qb * qb - 4.0 * qa * qc;
        if disc < 0.0 {
            return false;
        }

        let u = (-qb - disc.sqrt()) / (2.0 * qa);
        if !(0.0..=1.0).contains(&u) {
            return false;
        }

        let pa = a.t0.position.lerp(&a.t1.position, u);
        let pb = b.t0.position.lerp(&b.t1.position, u);
        (u, (pa - pb).normalized())
    };

    let center_b = b.t0.position.lerp(&b.t1.position, time);
    contact.position = center_b + normal * rb;
    contact.normal = normal;
    contact.time = time;
    contact.body_a = a.id();
    contact.body_b = b.id();
    contact.kind = ContactKind::SphereSphere;
    true
}

/// Swept sphere–plane test, also used for bounded planes.
///
/// The sphere starts on one side of the plane; it touches when the gap
/// `|distance| - radius` is within [`constants::CONTACT_EPSILON`] at `t0`,
/// and crosses when the gap drops strictly below zero by `t1`. A sphere that
/// ends the step exactly touching produces no contact until the next step.
fn sphere_vs_plane(
    sphere: &Body,
    radius: f64,
    surface: &Body,
    plane: &Plane,
    triangle: Option<&Triangle>,
    contact: &mut Contact,
) -> bool {
    let c0 = sphere.t0.position;
    let c1 = sphere.t1.position;
    let s0 = plane.signed_distance(c0);
    let s1 = plane.signed_distance(c1);

    let side = if s0 >= 0.0 { 1.0 } else { -1.0 };
    let gap0 = side * s0 - radius;
    let gap1 = side * s1 - radius;

    let (time, point) = if gap0 <= constants::CONTACT_EPSILON {
        (0.0, plane.project(c1))
    } else if gap1 < 0.0 {
        let u = gap0 / (gap0 - gap1);
        (u, plane.project(c0.lerp(&c1, u)))
    } else {
        return false;
    };

    if let Some(triangle) = triangle {
        if !triangle.contains(point) {
            return false;
        }
    }

    contact.position = point;
    contact.normal = plane.normal * side;
    contact.time = time;
    contact.body_a = sphere.id();
    contact.body_b = surface.id();
    contact.kind = if triangle.is_some() {
        ContactKind::SpherePocket
    } else {
        ContactKind::SpherePlane
    };
    true
}

// =============================================================================
// Tests
// =============================================================================
