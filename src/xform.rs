//-
// Copyright (c) 2017 Jason Lingle
//
// Permission to  use, copy,  modify, and/or distribute  this software  for any
// purpose  with or  without fee  is hereby  granted, provided  that the  above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE  IS PROVIDED "AS  IS" AND  THE AUTHOR DISCLAIMS  ALL WARRANTIES
// WITH  REGARD   TO  THIS  SOFTWARE   INCLUDING  ALL  IMPLIED   WARRANTIES  OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT  SHALL THE AUTHOR BE LIABLE FOR ANY
// SPECIAL,  DIRECT,   INDIRECT,  OR  CONSEQUENTIAL  DAMAGES   OR  ANY  DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN ACTION
// OF  CONTRACT, NEGLIGENCE  OR OTHER  TORTIOUS ACTION,  ARISING OUT  OF OR  IN
// CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.

/*! 3D affine transforms.

A `Transform` is a 3x3 basis plus a translation, both in double precision. The
basis is usually a pure rotation, but nothing here requires that; validation
only rejects bases which are non-finite, singular, or absurdly scaled.

Transforms compose right-to-left like matrices: `(a * b).xform(p)` equals
`a.xform(b.xform(p))`. A locality's local transform maps points in the
locality's own frame into its superior's frame.

Floating-point drift accumulates when many rotations are multiplied together,
so callers composing long chains should `orthonormalized()` the result. This
uses Gram-Schmidt on the basis columns in X, Y, Z order, so the X axis of the
result points the same way as the X axis of the input.
*/

use std::fmt;
use std::ops;

use cgmath::{InnerSpace, Matrix3, Quaternion, SquareMatrix, Vector3};

use defs::*;
use error::{HierarchyError, Result};

/// A basis (rotation/scale) followed by a translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub basis: Matrix3<f64>,
    pub origin: Vector3<f64>,
}

impl Default for Transform {
    fn default() -> Transform {
        Transform::identity()
    }
}

impl Transform {
    #[inline]
    pub fn new(basis: Matrix3<f64>, origin: Vector3<f64>) -> Self {
        Transform { basis: basis, origin: origin }
    }

    #[inline]
    pub fn identity() -> Self {
        Transform::new(Matrix3::identity(), Vector3::new(0.0, 0.0, 0.0))
    }

    #[inline]
    pub fn from_translation(origin: Vector3<f64>) -> Self {
        Transform::new(Matrix3::identity(), origin)
    }

    #[inline]
    pub fn from_rotation(rotation: Quaternion<f64>) -> Self {
        Transform::new(Matrix3::from(rotation), Vector3::new(0.0, 0.0, 0.0))
    }

    /// Returns the transform which first rotates by `rotation` and then
    /// moves to `origin`.
    #[inline]
    pub fn from_rotation_translation(rotation: Quaternion<f64>,
                                     origin: Vector3<f64>) -> Self {
        Transform::new(Matrix3::from(rotation), origin)
    }

    /// Maps a point from this transform's frame into the outer frame.
    #[inline]
    pub fn xform(&self, point: Vector3<f64>) -> Vector3<f64> {
        self.basis * point + self.origin
    }

    /// Returns a copy of this transform moved by `offset`, expressed in the
    /// outer frame. The basis is untouched.
    #[inline]
    pub fn translated(&self, offset: Vector3<f64>) -> Self {
        Transform::new(self.basis, self.origin + offset)
    }

    /// Returns the inverse of this transform, or `None` if the basis is
    /// singular.
    pub fn inverse(&self) -> Option<Self> {
        let basis = self.basis.invert()?;
        Some(Transform::new(basis, -(basis * self.origin)))
    }

    /// Like `inverse()`, but fails with `NumericalInvalidity`.
    pub fn try_inverse(&self) -> Result<Self> {
        self.inverse().ok_or_else(|| HierarchyError::numerical(
            format!("cannot invert singular basis {:?}", self.basis)))
    }

    /// Returns this transform with its basis re-orthonormalised.
    ///
    /// If the basis is degenerate, the result contains NaNs, which
    /// `is_finite()` will catch.
    pub fn orthonormalized(&self) -> Self {
        let x = self.basis.x.normalize();
        let y = (self.basis.y - x * x.dot(self.basis.y)).normalize();
        let z = (self.basis.z
                 - x * x.dot(self.basis.z)
                 - y * y.dot(self.basis.z)).normalize();
        Transform::new(Matrix3::from_cols(x, y, z), self.origin)
    }

    /// Returns the rotation part of the basis as a quaternion.
    ///
    /// Only meaningful if the basis is orthonormal.
    pub fn rotation(&self) -> Quaternion<f64> {
        Quaternion::from(self.basis)
    }

    pub fn is_finite(&self) -> bool {
        is_finite_vec(self.basis.x) && is_finite_vec(self.basis.y) &&
            is_finite_vec(self.basis.z) && is_finite_vec(self.origin)
    }

    /// Checks that this transform can be safely stored in a locality.
    ///
    /// `what` names the transform in the error message.
    pub fn validate(&self, what: &str) -> Result<()> {
        if !self.is_finite() {
            return Err(HierarchyError::numerical(
                format!("{} has non-finite components: {}", what, self)));
        }

        let det = self.basis.determinant();
        if !det.is_finite() || det.abs() < MIN_BASIS_DETERMINANT {
            return Err(HierarchyError::numerical(
                format!("{} has a singular basis (det = {})", what, det)));
        }

        for col in &[self.basis.x, self.basis.y, self.basis.z] {
            if col.magnitude() > MAX_BASIS_SCALE {
                return Err(HierarchyError::numerical(
                    format!("{} has an insane basis scale {}",
                            what, col.magnitude())));
            }
        }

        Ok(())
    }

    /// Returns whether every component of `self` is within `fuzz` of the
    /// corresponding component of `other`.
    pub fn approx_eq(&self, other: &Transform, fuzz: f64) -> bool {
        fn close(a: Vector3<f64>, b: Vector3<f64>, fuzz: f64) -> bool {
            (a.x - b.x).abs() <= fuzz &&
                (a.y - b.y).abs() <= fuzz &&
                (a.z - b.z).abs() <= fuzz
        }

        close(self.basis.x, other.basis.x, fuzz) &&
            close(self.basis.y, other.basis.y, fuzz) &&
            close(self.basis.z, other.basis.z, fuzz) &&
            close(self.origin, other.origin, fuzz)
    }
}

#[inline]
pub fn is_finite_vec(v: Vector3<f64>) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

impl ops::Mul<Transform> for Transform {
    type Output = Transform;

    #[inline]
    fn mul(self, rhs: Transform) -> Transform {
        Transform::new(self.basis * rhs.basis,
                       self.basis * rhs.origin + self.origin)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Rows, not columns, so it reads like the matrix on paper.
        let b = &self.basis;
        write!(f, "[{} {} {} | {}; {} {} {} | {}; {} {} {} | {}]",
               b.x.x, b.y.x, b.z.x, self.origin.x,
               b.x.y, b.y.y, b.z.y, self.origin.y,
               b.x.z, b.y.z, b.z.z, self.origin.z)
    }
}

#[cfg(test)]
mod test {
    use std::f64::consts::FRAC_PI_2;

    use cgmath::{Rad, Rotation3};
    use proptest::prelude::*;

    use super::*;

    fn rot_z(theta: f64) -> Quaternion<f64> {
        Quaternion::from_angle_z(Rad(theta))
    }

    #[test]
    fn composition_applies_right_hand_side_first() {
        let turn = Transform::from_rotation(rot_z(FRAC_PI_2));
        let step = Transform::from_translation(Vector3::new(1.0, 0.0, 0.0));

        let p = (turn * step).xform(Vector3::new(0.0, 0.0, 0.0));
        assert_approx!(1e-12, 0.0, p.x);
        assert_approx!(1e-12, 1.0, p.y);

        let p = (step * turn).xform(Vector3::new(1.0, 0.0, 0.0));
        assert_approx!(1e-12, 1.0, p.x);
        assert_approx!(1e-12, 1.0, p.y);
    }

    #[test]
    fn translated_moves_origin_only() {
        let t = Transform::from_rotation_translation(
            rot_z(1.0), Vector3::new(1.0, 2.0, 3.0));
        let moved = t.translated(Vector3::new(10.0, 0.0, -3.0));
        assert_eq!(t.basis, moved.basis);
        assert_eq!(Vector3::new(11.0, 2.0, 0.0), moved.origin);
    }

    #[test]
    fn singular_basis_has_no_inverse() {
        let flat = Transform::new(
            Matrix3::from_cols(Vector3::new(1.0, 0.0, 0.0),
                               Vector3::new(0.0, 1.0, 0.0),
                               Vector3::new(0.0, 0.0, 0.0)),
            Vector3::new(0.0, 0.0, 0.0));
        assert!(flat.inverse().is_none());
        assert!(flat.try_inverse().is_err());
        assert!(flat.validate("flat").is_err());
    }

    #[test]
    fn validate_rejects_nan_and_huge_scale() {
        let mut t = Transform::identity();
        t.origin.y = ::std::f64::NAN;
        assert!(t.validate("t").is_err());

        let huge = Transform::new(Matrix3::from_diagonal(
            Vector3::new(1e7, 1.0, 1e-7)), Vector3::new(0.0, 0.0, 0.0));
        assert!(huge.validate("huge").is_err());

        assert!(Transform::identity().validate("identity").is_ok());
    }

    #[test]
    fn orthonormalize_removes_skew_and_scale() {
        let skewed = Transform::new(
            Matrix3::from_cols(Vector3::new(2.0, 0.0, 0.0),
                               Vector3::new(0.1, 3.0, 0.0),
                               Vector3::new(0.0, 0.2, 0.5)),
            Vector3::new(4.0, 5.0, 6.0));
        let fixed = skewed.orthonormalized();
        assert!(fixed.approx_eq(
            &Transform::from_translation(Vector3::new(4.0, 5.0, 6.0)), 1e-12),
                "{}", fixed);
    }

    #[test]
    fn degenerate_orthonormalize_is_caught_by_is_finite() {
        let flat = Transform::new(
            Matrix3::from_cols(Vector3::new(1.0, 0.0, 0.0),
                               Vector3::new(2.0, 0.0, 0.0),
                               Vector3::new(0.0, 0.0, 1.0)),
            Vector3::new(0.0, 0.0, 0.0));
        assert!(!flat.orthonormalized().is_finite());
    }

    fn arb_transform() -> BoxedStrategy<Transform> {
        (-10.0f64..10.0, -1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0,
         -1e3f64..1e3, -1e3f64..1e3, -1e3f64..1e3)
            .prop_map(|(angle, ax, ay, az, x, y, z)| {
                let axis = Vector3::new(ax, ay, az + 2.0).normalize();
                Transform::from_rotation_translation(
                    Quaternion::from_axis_angle(axis, Rad(angle)),
                    Vector3::new(x, y, z))
            }).boxed()
    }

    proptest! {
        #[test]
        fn inverse_composes_to_identity(t in arb_transform()) {
            let inv = t.inverse().unwrap();
            let id = Transform::identity();
            prop_assert!((inv * t).approx_eq(&id, 1e-9), "{}", inv * t);
            prop_assert!((t * inv).approx_eq(&id, 1e-9), "{}", t * inv);
        }

        #[test]
        fn composition_matches_sequential_xform(
            a in arb_transform(), b in arb_transform(),
            px in -1e3f64..1e3, py in -1e3f64..1e3, pz in -1e3f64..1e3
        ) {
            let p = Vector3::new(px, py, pz);
            let lhs = (a * b).xform(p);
            let rhs = a.xform(b.xform(p));
            prop_assert!((lhs - rhs).magnitude() < 1e-8);
        }
    }
}
