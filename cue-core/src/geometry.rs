//! Collision geometry attached to bodies.
//!
//! Every body carries exactly one [`Geometry`]. Detection and resolution both
//! dispatch on the ordered pair of geometry variants with an exhaustive match.

use serde::{Deserialize, Serialize};

use crate::types::{constants, Vec3};

/// An infinite plane `normal · p + offset = 0` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f64,
}

impl Plane {
    /// Build a plane from a normal and offset. The normal is normalized and the
    /// offset rescaled so distances stay in world units.
    pub fn new(normal: Vec3, offset: f64) -> Self {
        let mag = normal.magnitude();
        if mag < constants::EPSILON {
            return Self {
                normal: Vec3::new(0.0, 0.0, 1.0),
                offset,
            };
        }
        Self {
            normal: normal / mag,
            offset: offset / mag,
        }
    }

    /// Plane through `point` facing `normal`.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let n = normal.normalized();
        Self::new(n, -n.dot(&point))
    }

    /// Signed distance from `point`; positive on the side the normal faces.
    pub fn signed_distance(&self, point: Vec3) -> f64 {
        self.normal.dot(&point) + self.offset
    }

    /// Orthogonal projection of `point` onto the plane.
    pub fn project(&self, point: Vec3) -> Vec3 {
        point - self.normal * self.signed_distance(point)
    }

    /// A point lying on the plane.
    pub fn origin(&self) -> Vec3 {
        self.normal * (-self.offset)
    }
}

/// A triangle bounding a pocket opening.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub vertices: [Vec3; 3],
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    /// Supporting plane, facing along `(b - a) × (c - a)`.
    pub fn plane(&self) -> Plane {
        let [a, b, c] = self.vertices;
        Plane::from_point_normal(a, (b - a).cross(&(c - a)))
    }

    pub fn centroid(&self) -> Vec3 {
        let [a, b, c] = self.vertices;
        (a + b + c) / 3.0
    }

    /// Half-size of the triangle's axis-aligned bounding box.
    pub fn half_extents(&self) -> Vec3 {
        let [a, b, c] = self.vertices;
        let min = Vec3::new(a.x.min(b.x).min(c.x), a.y.min(b.y).min(c.y), a.z.min(b.z).min(c.z));
        let max = Vec3::new(a.x.max(b.x).max(c.x), a.y.max(b.y).max(c.y), a.z.max(b.z).max(c.z));
        (max - min) * 0.5
    }

    /// Whether `point`, assumed to lie on the supporting plane, is inside the
    /// triangle (edges count as inside). A degenerate triangle contains
    /// nothing.
    pub fn contains(&self, point: Vec3) -> bool {
        let [a, b, c] = self.vertices;
        let n = (b - a).cross(&(c - a));
        if n.magnitude_squared() < constants::EPSILON {
            return false;
        }
        let tol = -constants::CONTACT_EPSILON * n.magnitude();
        let e0 = (b - a).cross(&(point - a)).dot(&n);
        let e1 = (c - b).cross(&(point - b)).dot(&n);
        let e2 = (a - c).cross(&(point - c)).dot(&n);
        e0 >= tol && e1 >= tol && e2 >= tol
    }
}

/// Collision geometry variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry {
    /// Infinite wall or table bed.
    Plane(Plane),
    /// Finite triangular plane; crossing it means entering a pocket.
    BoundedPlane { plane: Plane, triangle: Triangle },
    Sphere { radius: f64 },
}

impl Geometry {
    pub fn bounded(triangle: Triangle) -> Self {
        Geometry::BoundedPlane {
            plane: triangle.plane(),
            triangle,
        }
    }

    /// Supporting plane for planar geometry.
    pub fn plane(&self) -> Option<&Plane> {
        match self {
            Geometry::Plane(plane) | Geometry::BoundedPlane { plane, .. } => Some(plane),
            Geometry::Sphere { .. } => None,
        }
    }

    pub fn radius(&self) -> Option<f64> {
        match self {
            Geometry::Sphere { radius } => Some(*radius),
            _ => None,
        }
    }

    /// Half-size along each axis. Infinite planes report zero.
    pub fn extent(&self) -> Vec3 {
        match self {
            Geometry::Sphere { radius } => Vec3::splat(*radius),
            Geometry::BoundedPlane { triangle, .. } => triangle.half_extents(),
            Geometry::Plane(_) => Vec3::ZERO,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
