// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Principal-component analysis and oriented bounding boxes.
//!
//! Computes an element's centroid, principal axes (ordered by descending
//! variance) and the 8-corner oriented bounding box in the principal frame.
//! A secondary "projected" variant flattens the least-variance axis to give
//! thin, sheet-like elements a box that follows their footprint.

use nalgebra::{Matrix2, Matrix3, Point3, SymmetricEigen, Unit, Vector2, Vector3};

use crate::error::{Error, Result};

/// Centroid and orthonormal principal axes of a vertex cloud.
///
/// Axes are ordered by descending variance and form a right-handed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalAxes {
    pub centroid: Point3<f64>,
    pub axes: [Unit<Vector3<f64>>; 3],
    pub variances: [f64; 3],
}

/// An oriented bounding box described by its frame and 8 world-space corners.
///
/// Corner order: for corner `i`, bit 0/1/2 selects the max extent along
/// axis 0/1/2 respectively.
#[derive(Debug, Clone, PartialEq)]
pub struct Obb {
    pub center: Point3<f64>,
    pub axes: [Unit<Vector3<f64>>; 3],
    pub half_extents: [f64; 3],
    pub corners: [Point3<f64>; 8],
}

impl Obb {
    /// Box volume from the half extents.
    pub fn volume(&self) -> f64 {
        8.0 * self.half_extents[0] * self.half_extents[1] * self.half_extents[2]
    }
}

/// Computes the principal axes of a vertex cloud.
pub fn principal_axes(points: &[Point3<f64>]) -> Result<PrincipalAxes> {
    if points.is_empty() {
        return Err(Error::EmptyGeometry);
    }

    let mut sum = Vector3::zeros();
    for p in points {
        sum += p.coords;
    }
    let centroid = Point3::from(sum / points.len() as f64);

    let mut cov = Matrix3::zeros();
    for p in points {
        let d = p - centroid;
        cov += d * d.transpose();
    }
    cov /= points.len() as f64;

    let eigen = SymmetricEigen::try_new(cov, 1e-12, 256).ok_or(Error::EigenFailure)?;

    // Sort eigenpairs by descending eigenvalue.
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let first = Unit::new_normalize(eigen.eigenvectors.column(order[0]).into_owned());
    let second = Unit::new_normalize(eigen.eigenvectors.column(order[1]).into_owned());
    // Force a right-handed frame.
    let third = Unit::new_normalize(first.cross(&second));

    Ok(PrincipalAxes {
        centroid,
        axes: [first, second, third],
        variances: [
            eigen.eigenvalues[order[0]],
            eigen.eigenvalues[order[1]],
            eigen.eigenvalues[order[2]],
        ],
    })
}

/// Computes the oriented bounding box of a vertex cloud in its principal
/// frame.
pub fn oriented_bbox(points: &[Point3<f64>]) -> Result<Obb> {
    let pa = principal_axes(points)?;
    Ok(box_from_frame(points, &pa.centroid, &pa.axes))
}

/// Computes the projected OBB variant for thin, sheet-like elements.
///
/// The least-variance axis is flattened: the footprint axes come from a 2D
/// PCA of the vertices projected into the remaining plane, and the box depth
/// along the flattened axis is the projected extent of the cloud.
pub fn projected_bbox(points: &[Point3<f64>]) -> Result<Obb> {
    let pa = principal_axes(points)?;
    let flat = pa.axes[2];
    let u = pa.axes[0];
    let v = pa.axes[1];

    // 2D covariance in the (u, v) footprint plane.
    let coords: Vec<Vector2<f64>> = points
        .iter()
        .map(|p| {
            let d = p - pa.centroid;
            Vector2::new(d.dot(&u), d.dot(&v))
        })
        .collect();
    let mut cov = Matrix2::zeros();
    for c in &coords {
        cov += c * c.transpose();
    }
    cov /= coords.len() as f64;

    let eigen = SymmetricEigen::try_new(cov, 1e-12, 256).ok_or(Error::EigenFailure)?;
    let (e0, e1) = if eigen.eigenvalues[0] >= eigen.eigenvalues[1] {
        (0, 1)
    } else {
        (1, 0)
    };
    let to_world = |col: Vector2<f64>| -> Vector3<f64> {
        u.into_inner() * col.x + v.into_inner() * col.y
    };
    let first = Unit::new_normalize(to_world(eigen.eigenvectors.column(e0).into_owned()));
    let mut second = Unit::new_normalize(to_world(eigen.eigenvectors.column(e1).into_owned()));
    // Keep the frame right-handed with the flattened axis third.
    if first.cross(&second).dot(&flat) < 0.0 {
        second = Unit::new_normalize(-second.into_inner());
    }

    Ok(box_from_frame(points, &pa.centroid, &[first, second, flat]))
}

fn box_from_frame(
    points: &[Point3<f64>],
    origin: &Point3<f64>,
    axes: &[Unit<Vector3<f64>>; 3],
) -> Obb {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for p in points {
        let d = p - origin;
        for (k, axis) in axes.iter().enumerate() {
            let t = d.dot(axis);
            min[k] = min[k].min(t);
            max[k] = max[k].max(t);
        }
    }

    let mid = [
        (min[0] + max[0]) * 0.5,
        (min[1] + max[1]) * 0.5,
        (min[2] + max[2]) * 0.5,
    ];
    let center = origin
        + axes[0].into_inner() * mid[0]
        + axes[1].into_inner() * mid[1]
        + axes[2].into_inner() * mid[2];
    let half_extents = [
        (max[0] - min[0]) * 0.5,
        (max[1] - min[1]) * 0.5,
        (max[2] - min[2]) * 0.5,
    ];

    let mut corners = [Point3::origin(); 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let mut c = center;
        for k in 0..3 {
            let sign = if i & (1 << k) != 0 { 1.0 } else { -1.0 };
            c += axes[k].into_inner() * (sign * half_extents[k]);
        }
        *corner = c;
    }

    Obb {
        center,
        axes: *axes,
        half_extents,
        corners,
    }
}
