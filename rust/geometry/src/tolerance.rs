// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Explicit tolerance configuration for all geometric comparisons.
//!
//! Every tolerance-sensitive operation takes a [`Tolerance`] value instead of
//! reading ambient global state, so concurrent element tasks can never observe
//! each other's settings. Merging uses a [`Tolerance::tightened`] copy.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Absolute tolerance plus fixed decimal rounding precision.
///
/// `eps` governs approximate equality of scalars, points and normals.
/// `precision` is the number of decimal places used when quantizing vertex
/// coordinates onto the integer lattice that keys adjacency maps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Absolute comparison tolerance in model length units.
    pub eps: f64,
    /// Decimal places for coordinate rounding/quantization.
    pub precision: u32,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            eps: 1e-6,
            precision: 9,
        }
    }
}

impl Tolerance {
    /// Creates a tolerance with the given epsilon and rounding precision.
    pub fn new(eps: f64, precision: u32) -> Self {
        Self { eps, precision }
    }

    /// Returns the stricter tolerance used while splicing face boundaries.
    ///
    /// Edge coincidence during merging must not be looser than vertex
    /// identity, otherwise distinct lattice points could be spliced together.
    pub fn tightened(&self) -> Self {
        Self {
            eps: self.eps * 1e-2,
            precision: self.precision,
        }
    }

    /// Approximate scalar equality within `eps`.
    #[inline]
    pub fn approx_eq(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.eps
    }

    /// Approximate zero test within `eps`.
    #[inline]
    pub fn approx_zero(&self, a: f64) -> bool {
        a.abs() <= self.eps
    }

    /// Rounds a scalar to `precision` decimal places.
    #[inline]
    pub fn round(&self, v: f64) -> f64 {
        let scale = 10f64.powi(self.precision as i32);
        (v * scale).round() / scale
    }

    /// Quantizes a point onto the integer lattice at `precision` decimals.
    ///
    /// Two points within rounding distance of each other map to the same
    /// lattice key, which is how vertex identity is established in the
    /// consolidation adjacency maps.
    #[inline]
    pub fn quantize(&self, p: &Point3<f64>) -> [i64; 3] {
        let scale = 10f64.powi(self.precision as i32);
        [
            (p.x * scale).round() as i64,
            (p.y * scale).round() as i64,
            (p.z * scale).round() as i64,
        ]
    }

    /// Point equality within `eps` (Euclidean distance).
    #[inline]
    pub fn points_equal(&self, a: &Point3<f64>, b: &Point3<f64>) -> bool {
        (a - b).norm() <= self.eps
    }

    /// Vector equality within `eps` (Euclidean distance of components).
    #[inline]
    pub fn vectors_equal(&self, a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
        (a - b).norm() <= self.eps
    }

    /// Tests whether two unit vectors point in exactly opposite directions.
    #[inline]
    pub fn antiparallel(&self, a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
        self.vectors_equal(a, &-b)
    }
}
