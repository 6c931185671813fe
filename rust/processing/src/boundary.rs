// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Space-boundary pairing over persisted faces.
//!
//! Runs as a separate pass after all elements are processed and flushed: for
//! each space element the octree shortlist supplies candidate neighbors, and
//! face pairs are matched by antiparallel normals on a shared plane. This
//! never touches raw model geometry, only persisted face records; rows of
//! the bounding-box-derived categories are excluded.

use nalgebra::{Point3, Unit, Vector3};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Result;
use crate::model::{ElementCategory, ElementId};
use crate::records::{BoundaryPair, FaceRecord};
use crate::store::GeometryStore;
use shellform_geometry::{Aabb, Plane, Tolerance};

/// Finds all boundary pairs between a space element's faces and the faces
/// of its boundary-eligible octree neighbors.
///
/// Each unordered (space face, boundary face) combination is recorded once;
/// neighbors are visited in id order so the output is deterministic.
pub fn pair_boundaries(
    space: ElementId,
    categories: &FxHashMap<ElementId, ElementCategory>,
    eligible: &[ElementCategory],
    store: &dyn GeometryStore,
    tol: &Tolerance,
) -> Result<Vec<BoundaryPair>> {
    let space_faces: Vec<FaceRecord> = store
        .faces_of(space)?
        .into_iter()
        .filter(|r| !r.category.is_derived())
        .collect();
    if space_faces.is_empty() {
        return Ok(Vec::new());
    }

    let mut neighbors = store.neighbors_of(space)?;
    neighbors.sort();

    let mut pairs = Vec::new();
    let mut seen: FxHashSet<(ElementId, i64, i64)> = FxHashSet::default();

    for neighbor in neighbors {
        let is_eligible = categories
            .get(&neighbor)
            .is_some_and(|c| eligible.contains(c));
        if !is_eligible {
            continue;
        }

        for candidate in store.faces_of(neighbor)? {
            if candidate.category.is_derived() {
                continue;
            }
            for space_face in &space_faces {
                if let Some(pair) =
                    match_faces(space, space_face, neighbor, &candidate, tol)
                {
                    if seen.insert((neighbor, space_face.face_id, candidate.face_id)) {
                        pairs.push(pair);
                    }
                }
            }
        }
    }

    Ok(pairs)
}

/// Tests one (space face, candidate face) pair for boundary contact.
fn match_faces(
    space: ElementId,
    space_face: &FaceRecord,
    boundary: ElementId,
    boundary_face: &FaceRecord,
    tol: &Tolerance,
) -> Option<BoundaryPair> {
    let sn = Vector3::from(space_face.normal);
    let bn = Vector3::from(boundary_face.normal);
    if !tol.antiparallel(&sn, &bn) {
        return None;
    }

    let s_centroid = Point3::from(space_face.centroid);
    let b_centroid = Point3::from(boundary_face.centroid);

    if let Some(axis) = aligned_axis(&sn, tol) {
        // Axis-perpendicular planes: same coordinate on the aligned axis.
        if !tol.approx_eq(s_centroid[axis], b_centroid[axis]) {
            return None;
        }
    } else {
        let s_plane = Plane::from_point_normal(&s_centroid, Unit::new_normalize(sn));
        let b_plane = Plane::from_point_normal(&b_centroid, Unit::new_normalize(bn));
        if !s_plane.is_coincident_with(&b_plane, tol) {
            return None;
        }
    }

    // Touching requires the face extents to overlap on the shared plane.
    let s_box = space_face.face.bbox()?;
    let b_box = boundary_face.face.bbox()?;
    if !boxes_touch(&s_box, &b_box, tol) {
        return None;
    }

    let s_in_b = boundary_face.face.contains_point(&s_centroid, tol);
    let b_in_s = space_face.face.contains_point(&b_centroid, tol);

    let common_point = match (s_in_b, b_in_s) {
        (true, true) => Some(boundary_face.centroid),
        (true, false) => Some(space_face.centroid),
        (false, true) => Some(boundary_face.centroid),
        (false, false) => None,
    };

    Some(BoundaryPair {
        space,
        space_face: space_face.face_id,
        boundary,
        boundary_face: boundary_face.face_id,
        common_point,
    })
}

/// The axis a unit normal is aligned with, if any.
fn aligned_axis(n: &Vector3<f64>, tol: &Tolerance) -> Option<usize> {
    (0..3).find(|&k| tol.approx_eq(n[k].abs(), 1.0))
}

fn boxes_touch(a: &Aabb, b: &Aabb, tol: &Tolerance) -> bool {
    let grown = Aabb::new(
        Point3::new(a.min.x - tol.eps, a.min.y - tol.eps, a.min.z - tol.eps),
        Point3::new(a.max.x + tol.eps, a.max.y + tol.eps, a.max.z + tol.eps),
    );
    grown.intersects(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::angle_from_north;
    use crate::records::GeometryCategory;
    use crate::store::MemoryStore;
    use shellform_geometry::Face;

    fn face_record(
        element: i64,
        face_id: i64,
        points: &[Point3<f64>],
    ) -> FaceRecord {
        let face = Face::from_points(points);
        let normal = face.normal().unwrap();
        let centroid = face.centroid().unwrap();
        FaceRecord {
            element: ElementId(element),
            face_id,
            category: GeometryCategory::Body,
            orientation: None,
            attribute: None,
            normal: [normal.x, normal.y, normal.z],
            centroid: [centroid.x, centroid.y, centroid.z],
            area: face.area(),
            angle_from_north: angle_from_north(&normal, &Vector3::y()),
            face,
        }
    }

    fn shared_cell_entries(store: &MemoryStore, elements: &[i64]) {
        use crate::records::CellEntry;
        use shellform_index::CellId;
        let cell = CellId::new(0, 0, 0, 1).unwrap();
        let (min, max) = cell.lattice_bounds();
        for &e in elements {
            store
                .put_cells(vec![CellEntry {
                    element: ElementId(e),
                    cell,
                    min,
                    max,
                    depth: 1,
                }])
                .unwrap();
        }
    }

    fn categories(entries: &[(i64, ElementCategory)]) -> FxHashMap<ElementId, ElementCategory> {
        entries.iter().map(|&(id, c)| (ElementId(id), c)).collect()
    }

    // Space face at x=2 facing +X, wall face at x=2 facing -X.
    fn touching_pair(store: &MemoryStore) {
        let space_face = face_record(
            1,
            0,
            &[
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(2.0, 4.0, 0.0),
                Point3::new(2.0, 4.0, 3.0),
                Point3::new(2.0, 0.0, 3.0),
            ],
        );
        let wall_face = face_record(
            2,
            0,
            &[
                Point3::new(2.0, 1.0, 0.5),
                Point3::new(2.0, 1.0, 2.5),
                Point3::new(2.0, 3.0, 2.5),
                Point3::new(2.0, 3.0, 0.5),
            ],
        );
        store.put_face(space_face).unwrap();
        store.put_face(wall_face).unwrap();
        shared_cell_entries(store, &[1, 2]);
        store.flush().unwrap();
    }

    #[test]
    fn coplanar_antiparallel_faces_pair_once() {
        let store = MemoryStore::new(1);
        touching_pair(&store);
        let cats = categories(&[(1, ElementCategory::Space), (2, ElementCategory::Wall)]);

        let pairs = pair_boundaries(
            ElementId(1),
            &cats,
            &[ElementCategory::Wall],
            &store,
            &Tolerance::default(),
        )
        .unwrap();

        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.space, ElementId(1));
        assert_eq!(pair.boundary, ElementId(2));
        // The wall face sits fully inside the space face: its centroid is
        // the common point.
        assert_eq!(pair.common_point, Some([2.0, 2.0, 1.5]));
    }

    #[test]
    fn derived_box_faces_do_not_pair() {
        let store = MemoryStore::new(1);
        let space_face = face_record(
            1,
            0,
            &[
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(2.0, 4.0, 0.0),
                Point3::new(2.0, 4.0, 3.0),
                Point3::new(2.0, 0.0, 3.0),
            ],
        );
        // Perfectly touching, but the candidate row comes from an OBB face.
        let mut obb_face = face_record(
            2,
            0,
            &[
                Point3::new(2.0, 1.0, 0.5),
                Point3::new(2.0, 1.0, 2.5),
                Point3::new(2.0, 3.0, 2.5),
                Point3::new(2.0, 3.0, 0.5),
            ],
        );
        obb_face.category = GeometryCategory::Obb;
        store.put_face(space_face).unwrap();
        store.put_face(obb_face).unwrap();
        shared_cell_entries(&store, &[1, 2]);
        store.flush().unwrap();

        let cats = categories(&[(1, ElementCategory::Space), (2, ElementCategory::Wall)]);
        let pairs = pair_boundaries(
            ElementId(1),
            &cats,
            &[ElementCategory::Wall],
            &store,
            &Tolerance::default(),
        )
        .unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn ineligible_category_is_skipped() {
        let store = MemoryStore::new(1);
        touching_pair(&store);
        let cats = categories(&[
            (1, ElementCategory::Space),
            (2, ElementCategory::Furniture),
        ]);

        let pairs = pair_boundaries(
            ElementId(1),
            &cats,
            &[ElementCategory::Wall],
            &store,
            &Tolerance::default(),
        )
        .unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn parallel_normals_do_not_pair() {
        let store = MemoryStore::new(1);
        // Both faces wind the same way: normals parallel, not antiparallel.
        let quad = [
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 4.0, 0.0),
            Point3::new(2.0, 4.0, 3.0),
            Point3::new(2.0, 0.0, 3.0),
        ];
        store.put_face(face_record(1, 0, &quad)).unwrap();
        store.put_face(face_record(2, 0, &quad)).unwrap();
        shared_cell_entries(&store, &[1, 2]);
        store.flush().unwrap();

        let cats = categories(&[(1, ElementCategory::Space), (2, ElementCategory::Wall)]);
        let pairs = pair_boundaries(
            ElementId(1),
            &cats,
            &[ElementCategory::Wall],
            &store,
            &Tolerance::default(),
        )
        .unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn offset_planes_do_not_pair() {
        let store = MemoryStore::new(1);
        let space_face = face_record(
            1,
            0,
            &[
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(2.0, 4.0, 0.0),
                Point3::new(2.0, 4.0, 3.0),
                Point3::new(2.0, 0.0, 3.0),
            ],
        );
        // Wall face 10 cm further out on x.
        let wall_face = face_record(
            2,
            0,
            &[
                Point3::new(2.1, 1.0, 0.5),
                Point3::new(2.1, 1.0, 2.5),
                Point3::new(2.1, 3.0, 2.5),
                Point3::new(2.1, 3.0, 0.5),
            ],
        );
        store.put_face(space_face).unwrap();
        store.put_face(wall_face).unwrap();
        shared_cell_entries(&store, &[1, 2]);
        store.flush().unwrap();

        let cats = categories(&[(1, ElementCategory::Space), (2, ElementCategory::Wall)]);
        let pairs = pair_boundaries(
            ElementId(1),
            &cats,
            &[ElementCategory::Wall],
            &store,
            &Tolerance::default(),
        )
        .unwrap();
        assert!(pairs.is_empty());
    }
}
