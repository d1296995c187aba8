#![warn(missing_docs)]

//! Math types for the sculpt Bezier surface core.
//!
//! Thin wrappers around nalgebra. The host application owns the "real"
//! geometry primitives; this crate only needs points, vectors, a 4x4
//! affine transform the host hands us, and tolerance checks used by
//! tessellation and edge merging.

use nalgebra::{Matrix4, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A 4x4 affine transformation matrix.
///
/// Opaque as far as the surface core is concerned: it is applied to
/// control points before evaluation, composed, and inverted.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Compose: `self` then `other` (self * other).
    ///
    /// Applying the result to a point applies `other` first.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Midpoint of two points.
pub fn midpoint(a: &Point3, b: &Point3) -> Point3 {
    nalgebra::center(a, b)
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in model units.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default tolerances (1e-6 linear, 1e-9 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-6,
        angular: 1e-9,
    };

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }

    /// Check if two directions point the same way within the angular tolerance.
    ///
    /// Zero-length vectors never match.
    pub fn same_direction(&self, a: &Vec3, b: &Vec3) -> bool {
        let (la, lb) = (a.norm(), b.norm());
        if self.is_zero(la) || self.is_zero(lb) {
            return false;
        }
        let cos = (a.dot(b) / (la * lb)).clamp(-1.0, 1.0);
        cos.acos() <= self.angular
    }

    /// Check if four points lie in a common plane.
    ///
    /// Measures the distance of `d` from the plane through `a`, `b`, `c`.
    /// When those three are collinear the quad is degenerate and counts as
    /// planar.
    pub fn coplanar(&self, a: &Point3, b: &Point3, c: &Point3, d: &Point3) -> bool {
        let normal = (b - a).cross(&(c - a));
        let len = normal.norm();
        if self.is_zero(len) {
            // Fall back to the other diagonal before giving up.
            let alt = (c - a).cross(&(d - a));
            let alt_len = alt.norm();
            if self.is_zero(alt_len) {
                return true;
            }
            return self.is_zero(alt.dot(&(b - a)) / alt_len);
        }
        self.is_zero(normal.dot(&(d - a)) / len)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(t.apply_point(&p), p);
        assert_eq!(Transform::default(), t);
    }

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(t.apply_point(&p), Point3::new(11.0, 22.0, 33.0));
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let translate = Transform::translation(1.0, 0.0, 0.0);
        let scale = Transform {
            matrix: Matrix4::new_scaling(2.0),
        };
        // (scale * translate)(origin) = scale(1, 0, 0) = (2, 0, 0)
        let composed = scale.then(&translate);
        assert_relative_eq!(composed.apply_point(&Point3::origin()).x, 2.0);
    }

    #[test]
    fn test_inverse_round_trip() {
        let scale = Transform {
            matrix: Matrix4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 0.5)),
        };
        let t = Transform::translation(1.0, 2.0, 3.0).then(&scale);
        let inv = t.inverse().unwrap();
        let p = Point3::new(5.0, 6.0, 7.0);
        assert_relative_eq!(inv.apply_point(&t.apply_point(&p)), p, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_transform_has_no_inverse() {
        let flat = Transform {
            matrix: Matrix4::new_nonuniform_scaling(&Vec3::new(1.0, 0.0, 1.0)),
        };
        assert!(flat.inverse().is_none());
    }

    #[test]
    fn test_coplanar() {
        let tol = Tolerance::DEFAULT;
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(1.0, 1.0, 0.0);
        let d = Point3::new(0.0, 1.0, 0.0);
        assert!(tol.coplanar(&a, &b, &c, &d));
        assert!(!tol.coplanar(&a, &b, &c, &Point3::new(0.0, 1.0, 0.1)));
        // a, b, c collinear: decided by the other diagonal
        let c2 = Point3::new(2.0, 0.0, 0.0);
        assert!(tol.coplanar(&a, &b, &c2, &d));
    }

    #[test]
    fn test_same_direction() {
        let tol = Tolerance {
            linear: 1e-9,
            angular: 1e-3,
        };
        assert!(tol.same_direction(&Vec3::x(), &Vec3::new(5.0, 0.0, 0.0)));
        assert!(!tol.same_direction(&Vec3::x(), &Vec3::y()));
        assert!(!tol.same_direction(&Vec3::x(), &Vec3::zeros()));
    }

    #[test]
    fn test_midpoint() {
        let m = midpoint(&Point3::new(0.0, 0.0, 0.0), &Point3::new(2.0, 4.0, 6.0));
        assert_relative_eq!(m, Point3::new(1.0, 2.0, 3.0));
    }
}
