// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge and wire (loop) primitives.
//!
//! A [`Wire`] is an ordered chain of directed edges; a closed wire bounds a
//! face loop. Coincidence of an edge with the reverse of another is the
//! coedge relationship used to find the face on the other side of a boundary
//! edge during consolidation.

use nalgebra::{Point3, Vector3};

use crate::tolerance::Tolerance;

/// A directed line segment between two vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
}

impl Edge {
    /// Creates a directed edge.
    pub fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        Self { start, end }
    }

    /// Returns the same segment traversed in the opposite direction.
    pub fn reversed(&self) -> Edge {
        Edge {
            start: self.end,
            end: self.start,
        }
    }

    /// Euclidean length of the segment.
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Direction vector (not normalized).
    pub fn direction(&self) -> Vector3<f64> {
        self.end - self.start
    }

    /// Zero-length within tolerance.
    pub fn is_degenerate(&self, tol: &Tolerance) -> bool {
        tol.points_equal(&self.start, &self.end)
    }

    /// Tests whether `other` is this edge traversed backwards.
    pub fn is_reverse_of(&self, other: &Edge, tol: &Tolerance) -> bool {
        tol.points_equal(&self.start, &other.end) && tol.points_equal(&self.end, &other.start)
    }

    /// Tests whether the two edges occupy the same segment in either direction.
    pub fn is_coincident_with(&self, other: &Edge, tol: &Tolerance) -> bool {
        (tol.points_equal(&self.start, &other.start) && tol.points_equal(&self.end, &other.end))
            || self.is_reverse_of(other, tol)
    }
}

/// An ordered chain of directed edges forming a loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    edges: Vec<Edge>,
}

impl Wire {
    /// Creates a wire from an edge chain.
    pub fn new(edges: Vec<Edge>) -> Self {
        Self { edges }
    }

    /// Builds a closed wire through the given points, in order.
    ///
    /// The final edge connects the last point back to the first.
    pub fn from_points(points: &[Point3<f64>]) -> Self {
        let edges = points
            .iter()
            .enumerate()
            .map(|(i, p)| Edge::new(*p, points[(i + 1) % points.len()]))
            .collect();
        Self { edges }
    }

    /// The edges of the wire in traversal order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the wire has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// One vertex per edge, in traversal order (edge start points).
    pub fn vertices(&self) -> Vec<Point3<f64>> {
        self.edges.iter().map(|e| e.start).collect()
    }

    /// Sum of edge lengths.
    pub fn perimeter(&self) -> f64 {
        self.edges.iter().map(Edge::length).sum()
    }

    /// Every edge's end meets the next edge's start, wrapping around.
    pub fn is_closed(&self, tol: &Tolerance) -> bool {
        if self.edges.len() < 3 {
            return false;
        }
        self.edges.iter().enumerate().all(|(i, e)| {
            let next = &self.edges[(i + 1) % self.edges.len()];
            tol.points_equal(&e.end, &next.start)
        })
    }

    /// The wire traversed in the opposite direction.
    pub fn reversed(&self) -> Wire {
        Wire {
            edges: self.edges.iter().rev().map(Edge::reversed).collect(),
        }
    }

    /// Polygon normal by Newell's method, not normalized.
    ///
    /// The direction follows the right-hand rule relative to the winding
    /// order; the magnitude is twice the enclosed area.
    pub fn newell_normal(&self) -> Vector3<f64> {
        let mut normal = Vector3::zeros();
        for e in &self.edges {
            let (c, n) = (&e.start, &e.end);
            normal.x += (c.y - n.y) * (c.z + n.z);
            normal.y += (c.z - n.z) * (c.x + n.x);
            normal.z += (c.x - n.x) * (c.y + n.y);
        }
        normal
    }

    /// Enclosed planar area (unsigned).
    pub fn area(&self) -> f64 {
        self.newell_normal().norm() / 2.0
    }

    /// Average of the wire's vertices.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.edges.is_empty() {
            return None;
        }
        let mut sum = Vector3::zeros();
        for e in &self.edges {
            sum += e.start.coords;
        }
        Some(Point3::from(sum / self.edges.len() as f64))
    }

    /// True if every vertex lies on one line (the wire encloses no area).
    pub fn is_collinear(&self, tol: &Tolerance) -> bool {
        self.newell_normal().norm() <= tol.eps
    }

    /// Tests the wire for self-intersection after projecting onto the
    /// dominant plane of its normal.
    ///
    /// Non-adjacent edge pairs must not cross; adjacent edges share a vertex
    /// by construction and are skipped.
    pub fn is_simple(&self, tol: &Tolerance) -> bool {
        let n = self.edges.len();
        if n < 4 {
            return true;
        }
        let (u, v) = dominant_plane_axes(&self.newell_normal());
        let project = |p: &Point3<f64>| -> (f64, f64) {
            let c = [p.x, p.y, p.z];
            (c[u], c[v])
        };

        for i in 0..n {
            for j in i + 1..n {
                // Skip adjacent pairs (including the wrap-around pair).
                if j == i + 1 || (i == 0 && j == n - 1) {
                    continue;
                }
                let a = &self.edges[i];
                let b = &self.edges[j];
                if segments_cross_2d(
                    project(&a.start),
                    project(&a.end),
                    project(&b.start),
                    project(&b.end),
                    tol.eps,
                ) {
                    return false;
                }
            }
        }
        true
    }
}

/// Picks the two axes spanning the plane most perpendicular to `normal`.
///
/// Returns component indices `(u, v)` such that dropping the dominant normal
/// axis gives the least-distorting 2D projection.
pub(crate) fn dominant_plane_axes(normal: &Vector3<f64>) -> (usize, usize) {
    let abs = normal.abs();
    if abs.z >= abs.x && abs.z >= abs.y {
        (0, 1)
    } else if abs.y >= abs.x {
        (0, 2)
    } else {
        (1, 2)
    }
}

/// Proper intersection test for two 2D segments.
///
/// Touching at shared endpoints does not count as a crossing.
fn segments_cross_2d(
    a0: (f64, f64),
    a1: (f64, f64),
    b0: (f64, f64),
    b1: (f64, f64),
    eps: f64,
) -> bool {
    let orient = |p: (f64, f64), q: (f64, f64), r: (f64, f64)| -> f64 {
        (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
    };
    let d1 = orient(b0, b1, a0);
    let d2 = orient(b0, b1, a1);
    let d3 = orient(a0, a1, b0);
    let d4 = orient(a0, a1, b1);

    d1 * d2 < -eps * eps && d3 * d4 < -eps * eps
}
