// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Infinite planes for coplanarity and touching tests.

use nalgebra::{Point3, Unit, Vector3};

use crate::tolerance::Tolerance;

/// A plane in Hessian normal form: `normal · p + d = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Unit<Vector3<f64>>,
    pub d: f64,
}

impl Plane {
    /// Builds the plane through `point` with the given unit normal.
    pub fn from_point_normal(point: &Point3<f64>, normal: Unit<Vector3<f64>>) -> Self {
        Self {
            normal,
            d: -normal.dot(&point.coords),
        }
    }

    /// Signed distance from a point to the plane (positive on the normal side).
    #[inline]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) + self.d
    }

    /// Tests whether a point lies on the plane within tolerance.
    pub fn contains_point(&self, p: &Point3<f64>, tol: &Tolerance) -> bool {
        tol.approx_zero(self.signed_distance(p))
    }

    /// Tests whether two planes occupy the same locus within tolerance.
    ///
    /// Handles both same-direction and opposite-direction normals; any other
    /// normal relationship is not coplanar.
    pub fn is_coincident_with(&self, other: &Plane, tol: &Tolerance) -> bool {
        if tol.vectors_equal(&self.normal, &other.normal) {
            tol.approx_eq(self.d, other.d)
        } else if tol.antiparallel(&self.normal, &other.normal) {
            tol.approx_eq(self.d, -other.d)
        } else {
            false
        }
    }

    /// Projects a point onto the plane.
    pub fn project_point(&self, p: &Point3<f64>) -> Point3<f64> {
        p - self.normal.into_inner() * self.signed_distance(p)
    }
}
