// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar faces with holes and the polyhedron shell type.

use nalgebra::{Point3, Unit, Vector3};

use crate::bbox::Aabb;
use crate::plane::Plane;
use crate::primitives::{dominant_plane_axes, Wire};
use crate::tolerance::Tolerance;

/// A planar polygon bounded by one outer loop and zero or more hole loops.
///
/// The outer loop is the loop with the largest perimeter; hole loops wind in
/// the opposite direction. The face normal follows the right-hand rule from
/// the outer-loop winding.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub outer: Wire,
    pub holes: Vec<Wire>,
}

impl Face {
    /// Creates a face from an outer loop with no holes.
    pub fn new(outer: Wire) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    /// Creates a face from an outer loop and hole loops.
    pub fn with_holes(outer: Wire, holes: Vec<Wire>) -> Self {
        Self { outer, holes }
    }

    /// Builds a hole-free face through the given points, in order.
    pub fn from_points(points: &[Point3<f64>]) -> Self {
        Self::new(Wire::from_points(points))
    }

    /// Unit normal from the outer-loop winding, or `None` when degenerate.
    pub fn normal(&self) -> Option<Unit<Vector3<f64>>> {
        let n = self.outer.newell_normal();
        if !n.iter().all(|c| c.is_finite()) {
            return None;
        }
        Unit::try_new(n, 1e-12)
    }

    /// Planar area: outer-loop area minus hole areas.
    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(Wire::area).sum();
        (self.outer.area() - holes).abs()
    }

    /// Centroid of the outer-loop vertices.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        self.outer.centroid()
    }

    /// Axis-aligned bounding box over all loops.
    pub fn bbox(&self) -> Option<Aabb> {
        let verts = self.vertices();
        Aabb::from_points(verts.iter())
    }

    /// The supporting plane of the face.
    pub fn plane(&self) -> Option<Plane> {
        let normal = self.normal()?;
        let anchor = self.outer.edges().first()?.start;
        Some(Plane::from_point_normal(&anchor, normal))
    }

    /// All vertices across outer loop and holes.
    pub fn vertices(&self) -> Vec<Point3<f64>> {
        let mut out = self.outer.vertices();
        for hole in &self.holes {
            out.extend(hole.vertices());
        }
        out
    }

    /// Validates closure, a finite non-zero normal, and self-intersection
    /// freedom on every loop.
    pub fn is_valid(&self, tol: &Tolerance) -> bool {
        if !self.outer.is_closed(tol) || self.normal().is_none() {
            return false;
        }
        if !self.outer.is_simple(tol) {
            return false;
        }
        self.holes
            .iter()
            .all(|h| h.is_closed(tol) && h.is_simple(tol))
    }

    /// Tests whether a point lies inside the face (outer loop minus holes).
    ///
    /// The point is projected onto the dominant plane of the face normal and
    /// tested with the crossing-number rule; it must also lie on the face
    /// plane within tolerance.
    pub fn contains_point(&self, p: &Point3<f64>, tol: &Tolerance) -> bool {
        let Some(plane) = self.plane() else {
            return false;
        };
        if !plane.contains_point(p, tol) {
            return false;
        }
        let (u, v) = dominant_plane_axes(&self.outer.newell_normal());
        let pt = project_2d(p, u, v);

        if !point_in_loop_2d(pt, &self.outer, u, v) {
            return false;
        }
        !self.holes.iter().any(|h| point_in_loop_2d(pt, h, u, v))
    }
}

/// A collection of faces forming one (near-)watertight shell.
///
/// Represents one element's geometry, or one disconnected lump of a
/// multi-lump element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polyhedron {
    pub faces: Vec<Face>,
}

impl Polyhedron {
    /// Creates a polyhedron from a face list.
    pub fn new(faces: Vec<Face>) -> Self {
        Self { faces }
    }

    /// Number of faces in the shell.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Whether the shell has no faces.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Sum of all face areas.
    pub fn surface_area(&self) -> f64 {
        self.faces.iter().map(Face::area).sum()
    }

    /// Bounding box over all face vertices, or `None` when empty.
    pub fn bbox(&self) -> Option<Aabb> {
        let mut bbox: Option<Aabb> = None;
        for face in &self.faces {
            if let Some(fb) = face.bbox() {
                bbox = Some(match bbox {
                    Some(b) => b.merged(&fb),
                    None => fb,
                });
            }
        }
        bbox
    }

    /// The full vertex cloud of the shell (duplicates preserved).
    pub fn vertices(&self) -> Vec<Point3<f64>> {
        self.faces.iter().flat_map(|f| f.vertices()).collect()
    }

    /// Scales all coordinates by a unit-conversion factor.
    pub fn scaled(&self, factor: f64) -> Polyhedron {
        let scale = |p: &Point3<f64>| Point3::from(p.coords * factor);
        let scale_wire = |w: &Wire| {
            Wire::new(
                w.edges()
                    .iter()
                    .map(|e| crate::primitives::Edge::new(scale(&e.start), scale(&e.end)))
                    .collect(),
            )
        };
        Polyhedron {
            faces: self
                .faces
                .iter()
                .map(|f| Face::with_holes(scale_wire(&f.outer), f.holes.iter().map(scale_wire).collect()))
                .collect(),
        }
    }
}

fn project_2d(p: &Point3<f64>, u: usize, v: usize) -> (f64, f64) {
    let c = [p.x, p.y, p.z];
    (c[u], c[v])
}

/// Crossing-number point-in-polygon test on a projected loop.
fn point_in_loop_2d(pt: (f64, f64), wire: &Wire, u: usize, v: usize) -> bool {
    let mut inside = false;
    for e in wire.edges() {
        let (x0, y0) = project_2d(&e.start, u, v);
        let (x1, y1) = project_2d(&e.end, u, v);
        if (y0 > pt.1) != (y1 > pt.1) {
            let x_cross = x0 + (pt.1 - y0) / (y1 - y0) * (x1 - x0);
            if pt.0 < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}
