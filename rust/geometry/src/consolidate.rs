// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coplanar face consolidation over a triangulated shell.
//!
//! Merges the coplanar faces of one element's shell into minimal polygons
//! with holes. Faces live in a slot map with stable generational keys, and
//! every adjacency set stores keys rather than raw positions, so removing or
//! replacing a face can never leave a stale index behind.
//!
//! The merge walks each accumulator face's boundary looking for the coedge
//! (reverse-direction twin) of every edge among the remaining candidates.
//! When a partner is found the two loops are spliced by dropping all
//! coincident edge pairs, the result is re-chained into sub-loops, and the
//! largest-perimeter sub-loop becomes the new outer boundary (first-in-list
//! wins on ties). An invalid splice is rolled back without touching the
//! accumulator.

use nalgebra::Vector3;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::face::{Face, Polyhedron};
use crate::primitives::{Edge, Wire};
use crate::tolerance::Tolerance;

new_key_type! {
    /// Stable generational key for a face in the consolidation arena.
    pub struct FaceKey;
}

/// A directed edge on the quantized vertex lattice.
type LatticeEdge = ([i64; 3], [i64; 3]);

/// Recoverable per-face problems encountered during consolidation.
///
/// Indices refer to the face's position in the input shell.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsolidationWarning {
    #[error("input face {0} collapsed to a line and was dropped")]
    CollinearFace(usize),
    #[error("merging faces {0} and {1} produced an invalid loop; merge rolled back")]
    MergeRolledBack(usize, usize),
}

/// The merged face set of one shell plus accumulated recoverable warnings.
#[derive(Debug, Clone)]
pub struct ConsolidationOutcome {
    pub faces: Vec<Face>,
    pub warnings: Vec<ConsolidationWarning>,
}

/// Consolidates the coplanar faces of one shell into minimal polygons.
///
/// Running the operation on its own output is a no-op: once every
/// vertex-normal group holds a single face, no further merge is possible.
pub fn consolidate(shell: &Polyhedron, tol: &Tolerance) -> ConsolidationOutcome {
    let mut engine = Consolidator::new(*tol);
    for (i, face) in shell.faces.iter().enumerate() {
        engine.insert(i, face.clone());
    }
    engine.run();
    engine.finish()
}

struct Consolidator {
    tol: Tolerance,
    /// Stricter tolerance used to validate spliced loops.
    merge_tol: Tolerance,
    faces: SlotMap<FaceKey, Face>,
    source: SecondaryMap<FaceKey, usize>,
    vertex_faces: FxHashMap<[i64; 3], FxHashSet<FaceKey>>,
    warned: FxHashSet<(usize, usize)>,
    warnings: Vec<ConsolidationWarning>,
}

impl Consolidator {
    fn new(tol: Tolerance) -> Self {
        Self {
            tol,
            merge_tol: tol.tightened(),
            faces: SlotMap::with_key(),
            source: SecondaryMap::new(),
            vertex_faces: FxHashMap::default(),
            warned: FxHashSet::default(),
            warnings: Vec::new(),
        }
    }

    fn insert(&mut self, index: usize, face: Face) {
        let key = self.faces.insert(face);
        self.source.insert(key, index);
        self.register_vertices(key);
    }

    fn register_vertices(&mut self, key: FaceKey) {
        let lattice: Vec<[i64; 3]> = self.faces[key]
            .vertices()
            .iter()
            .map(|p| self.tol.quantize(p))
            .collect();
        for q in lattice {
            self.vertex_faces.entry(q).or_default().insert(key);
        }
    }

    /// Visits every lattice vertex, partitions its incident faces into
    /// normal-equivalence groups, and merges each group of size > 1.
    fn run(&mut self) {
        let mut lattice: Vec<[i64; 3]> = self.vertex_faces.keys().copied().collect();
        lattice.sort_unstable();

        for q in lattice {
            let Some(set) = self.vertex_faces.get(&q) else {
                continue;
            };
            let mut keys: Vec<FaceKey> = set
                .iter()
                .copied()
                .filter(|k| self.faces.contains_key(*k))
                .collect();
            keys.sort_unstable();

            let mut groups: Vec<(Vector3<f64>, Vec<FaceKey>)> = Vec::new();
            let mut degenerate: Vec<FaceKey> = Vec::new();
            for key in keys {
                match self.faces[key].normal() {
                    Some(n) => {
                        let n = n.into_inner();
                        match groups
                            .iter_mut()
                            .find(|(gn, _)| self.tol.vectors_equal(gn, &n))
                        {
                            Some((_, members)) => members.push(key),
                            None => groups.push((n, vec![key])),
                        }
                    }
                    // A degenerate face may still be the right next hop while
                    // edge-walking, so it joins every group as a candidate.
                    None => degenerate.push(key),
                }
            }

            for (_, mut group) in groups {
                if group.len() < 2 {
                    continue;
                }
                group.extend(degenerate.iter().copied());
                self.merge_group(group);
            }
        }
    }

    /// Iterative pairwise merging of one normal-equivalence group.
    fn merge_group(&mut self, mut candidates: Vec<FaceKey>) {
        candidates.retain(|k| self.faces.contains_key(*k));
        if candidates.len() < 2 {
            return;
        }
        let acc = candidates.remove(0);

        loop {
            let index = self.build_edge_index(&candidates);
            let boundary = self.face_edges(acc);
            let mut merged = false;

            for edge in &boundary {
                let coedge = (
                    self.tol.quantize(&edge.end),
                    self.tol.quantize(&edge.start),
                );
                let Some(&partner) = index.get(&coedge) else {
                    continue;
                };
                if partner == acc || !self.faces.contains_key(partner) {
                    continue;
                }
                match self.splice(acc, partner) {
                    Some(face) => {
                        self.faces[acc] = face;
                        self.consume(partner, acc);
                        candidates.retain(|k| *k != partner);
                        self.register_vertices(acc);
                        merged = true;
                        break;
                    }
                    None => {
                        let pair = (self.source[acc], self.source[partner]);
                        if self.warned.insert(pair) {
                            self.warnings
                                .push(ConsolidationWarning::MergeRolledBack(pair.0, pair.1));
                        }
                    }
                }
            }

            if !merged || candidates.is_empty() {
                break;
            }
        }
    }

    /// Builds the directed edge → face index over the candidate pool.
    ///
    /// If a face's edges collide with an existing forward-direction entry the
    /// face's winding disagrees with the pool; it is reversed in place and
    /// indexed again.
    fn build_edge_index(&mut self, candidates: &[FaceKey]) -> FxHashMap<LatticeEdge, FaceKey> {
        let mut index: FxHashMap<LatticeEdge, FaceKey> = FxHashMap::default();
        for &key in candidates {
            if !self.faces.contains_key(key) {
                continue;
            }
            let conflicts = self
                .face_edges(key)
                .iter()
                .any(|e| matches!(index.get(&self.lattice_edge(e)), Some(k) if *k != key));
            if conflicts {
                let flipped = reverse_face(&self.faces[key]);
                self.faces[key] = flipped;
            }
            for e in self.face_edges(key) {
                index.entry(self.lattice_edge(&e)).or_insert(key);
            }
        }
        index
    }

    /// Splices two faces into one by removing every coincident edge pair and
    /// re-chaining the remaining edges into loops.
    ///
    /// Returns `None` when the result fails validation; the caller keeps the
    /// accumulator unchanged in that case.
    fn splice(&self, a_key: FaceKey, b_key: FaceKey) -> Option<Face> {
        let a_edges = self.face_edges(a_key);
        let b_edges = self.face_edges(b_key);

        let mut b_index: FxHashMap<LatticeEdge, Vec<usize>> = FxHashMap::default();
        for (j, e) in b_edges.iter().enumerate() {
            b_index.entry(self.lattice_edge(e)).or_default().push(j);
        }

        // Remove all coincident pairs, not just the first: two faces may
        // already share several edges, e.g. around a hole.
        let mut shared_a = vec![false; a_edges.len()];
        let mut shared_b = vec![false; b_edges.len()];
        for (i, e) in a_edges.iter().enumerate() {
            let coedge = (
                self.tol.quantize(&e.end),
                self.tol.quantize(&e.start),
            );
            if let Some(list) = b_index.get_mut(&coedge) {
                if let Some(j) = list.pop() {
                    shared_a[i] = true;
                    shared_b[j] = true;
                }
            }
        }
        if !shared_a.iter().any(|s| *s) {
            return None;
        }

        let mut remaining: Vec<Edge> = Vec::new();
        for (i, e) in a_edges.iter().enumerate() {
            if !shared_a[i] && !e.is_degenerate(&self.merge_tol) {
                remaining.push(*e);
            }
        }
        for (j, e) in b_edges.iter().enumerate() {
            if !shared_b[j] && !e.is_degenerate(&self.merge_tol) {
                remaining.push(*e);
            }
        }

        let mut loops = chain_loops(&remaining, &self.tol)?;
        // Every edge cancelled: the faces were exact mirrors of each other.
        if loops.is_empty() {
            return None;
        }

        // Largest perimeter becomes the outer loop; on equal perimeters the
        // first loop in list order wins.
        let mut outer_idx = 0;
        let mut best = f64::NEG_INFINITY;
        for (i, w) in loops.iter().enumerate() {
            let p = w.perimeter();
            if p > best {
                best = p;
                outer_idx = i;
            }
        }
        let outer = loops.remove(outer_idx);
        let face = Face::with_holes(outer, loops);

        if face.is_valid(&self.merge_tol) {
            Some(face)
        } else {
            None
        }
    }

    /// Removes a consumed face and redirects every adjacency reference to the
    /// face that absorbed it.
    fn consume(&mut self, partner: FaceKey, acc: FaceKey) {
        self.faces.remove(partner);
        self.source.remove(partner);
        for set in self.vertex_faces.values_mut() {
            if set.remove(&partner) {
                set.insert(acc);
            }
        }
    }

    /// All directed edges of a face, outer loop first, then holes.
    fn face_edges(&self, key: FaceKey) -> Vec<Edge> {
        let face = &self.faces[key];
        let mut edges: Vec<Edge> = face.outer.edges().to_vec();
        for hole in &face.holes {
            edges.extend_from_slice(hole.edges());
        }
        edges
    }

    fn lattice_edge(&self, e: &Edge) -> LatticeEdge {
        (self.tol.quantize(&e.start), self.tol.quantize(&e.end))
    }

    fn finish(mut self) -> ConsolidationOutcome {
        let mut keyed: Vec<(FaceKey, Face)> = self.faces.drain().collect();
        keyed.sort_by_key(|(k, _)| *k);

        let mut faces = Vec::new();
        for (key, face) in keyed {
            if face.outer.is_collinear(&self.tol) {
                let idx = self.source.get(key).copied().unwrap_or(0);
                self.warnings.push(ConsolidationWarning::CollinearFace(idx));
                continue;
            }
            faces.push(face);
        }
        ConsolidationOutcome {
            faces,
            warnings: self.warnings,
        }
    }
}

fn reverse_face(face: &Face) -> Face {
    Face::with_holes(
        face.outer.reversed(),
        face.holes.iter().map(Wire::reversed).collect(),
    )
}

/// Chains a spliced edge soup into closed loops by quantized endpoint
/// matching.
///
/// Returns `None` if any chain dead-ends before closing or a chain closes
/// with fewer than three edges; both mean the splice was discontinuous.
fn chain_loops(edges: &[Edge], tol: &Tolerance) -> Option<Vec<Wire>> {
    let mut by_start: FxHashMap<[i64; 3], Vec<usize>> = FxHashMap::default();
    for (i, e) in edges.iter().enumerate() {
        by_start.entry(tol.quantize(&e.start)).or_default().push(i);
    }
    // pop() must yield candidates in list order
    for list in by_start.values_mut() {
        list.reverse();
    }

    let mut used = vec![false; edges.len()];
    let mut loops = Vec::new();

    for i in 0..edges.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut chain = vec![edges[i]];
        let start = tol.quantize(&edges[i].start);

        loop {
            let tail = tol.quantize(&chain.last().unwrap().end);
            if tail == start {
                break;
            }
            let list = by_start.get_mut(&tail)?;
            let mut next = None;
            while let Some(j) = list.pop() {
                if !used[j] {
                    next = Some(j);
                    break;
                }
            }
            let j = next?;
            used[j] = true;
            chain.push(edges[j]);
        }

        if chain.len() < 3 {
            return None;
        }
        loops.push(Wire::new(chain));
    }

    Some(loops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    fn tri(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Face {
        Face::from_points(&[a, b, c])
    }

    /// A unit cube as 12 triangles (2 per side), wound outward.
    fn triangulated_cube() -> Polyhedron {
        let v = [
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.0),
            p(0.0, 0.0, 1.0),
            p(1.0, 0.0, 1.0),
            p(1.0, 1.0, 1.0),
            p(0.0, 1.0, 1.0),
        ];
        Polyhedron::new(vec![
            // bottom (-Z)
            tri(v[0], v[2], v[1]),
            tri(v[0], v[3], v[2]),
            // top (+Z)
            tri(v[4], v[5], v[6]),
            tri(v[4], v[6], v[7]),
            // front (-Y)
            tri(v[0], v[1], v[5]),
            tri(v[0], v[5], v[4]),
            // back (+Y)
            tri(v[2], v[3], v[7]),
            tri(v[2], v[7], v[6]),
            // left (-X)
            tri(v[0], v[4], v[7]),
            tri(v[0], v[7], v[3]),
            // right (+X)
            tri(v[1], v[2], v[6]),
            tri(v[1], v[6], v[5]),
        ])
    }

    /// A 4x4 square with a 2x2 hole, triangulated as an 8-triangle ring.
    fn punched_square() -> Polyhedron {
        let o = [
            p(0.0, 0.0, 0.0),
            p(4.0, 0.0, 0.0),
            p(4.0, 4.0, 0.0),
            p(0.0, 4.0, 0.0),
        ];
        let i = [
            p(1.0, 1.0, 0.0),
            p(3.0, 1.0, 0.0),
            p(3.0, 3.0, 0.0),
            p(1.0, 3.0, 0.0),
        ];
        Polyhedron::new(vec![
            tri(o[0], o[1], i[1]),
            tri(o[0], i[1], i[0]),
            tri(o[1], o[2], i[2]),
            tri(o[1], i[2], i[1]),
            tri(o[2], o[3], i[3]),
            tri(o[2], i[3], i[2]),
            tri(o[3], o[0], i[0]),
            tri(o[3], i[0], i[3]),
        ])
    }

    #[test]
    fn cube_consolidates_to_six_quads() {
        let tol = Tolerance::default();
        let out = consolidate(&triangulated_cube(), &tol);

        assert_eq!(out.faces.len(), 6);
        assert!(out.warnings.is_empty());

        let mut axis_hits = [0usize; 6];
        for face in &out.faces {
            assert_eq!(face.outer.len(), 4);
            assert!(face.holes.is_empty());
            assert_relative_eq!(face.area(), 1.0, epsilon = 1e-9);

            let n = face.normal().unwrap();
            let dirs = [
                Vector3::x(),
                -Vector3::x(),
                Vector3::y(),
                -Vector3::y(),
                Vector3::z(),
                -Vector3::z(),
            ];
            let hit = dirs
                .iter()
                .position(|d| tol.vectors_equal(&n, d))
                .expect("cube face normal must be axis-aligned");
            axis_hits[hit] += 1;
        }
        assert_eq!(axis_hits, [1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn consolidation_is_idempotent() {
        let tol = Tolerance::default();
        let once = consolidate(&triangulated_cube(), &tol);
        let twice = consolidate(&Polyhedron::new(once.faces.clone()), &tol);

        assert_eq!(twice.faces.len(), once.faces.len());
        for (a, b) in once.faces.iter().zip(&twice.faces) {
            assert_relative_eq!(a.area(), b.area(), epsilon = 1e-9);
        }
    }

    #[test]
    fn hole_is_preserved_with_opposite_winding() {
        let tol = Tolerance::default();
        let out = consolidate(&punched_square(), &tol);

        assert_eq!(out.faces.len(), 1);
        let face = &out.faces[0];
        assert_eq!(face.holes.len(), 1);
        assert_relative_eq!(face.area(), 12.0, epsilon = 1e-9);

        let outer_z = face.outer.newell_normal().z;
        let hole_z = face.holes[0].newell_normal().z;
        assert!(outer_z * hole_z < 0.0, "hole must wind opposite to outer");
    }

    #[test]
    fn two_triangles_merge_to_square() {
        let tol = Tolerance::default();
        let shell = Polyhedron::new(vec![
            tri(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0)),
            tri(p(0.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)),
        ]);
        let out = consolidate(&shell, &tol);
        assert_eq!(out.faces.len(), 1);
        assert_eq!(out.faces[0].outer.len(), 4);
        assert_relative_eq!(out.faces[0].area(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_sliver_does_not_block_merging() {
        let tol = Tolerance::default();
        // Two mergeable triangles plus a zero-area sliver along one edge.
        let shell = Polyhedron::new(vec![
            tri(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0)),
            tri(p(0.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)),
            tri(p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(1.0, 0.5, 0.0)),
        ]);
        let out = consolidate(&shell, &tol);

        // The square still forms; the sliver is dropped as collinear.
        assert_eq!(out.faces.len(), 1);
        assert_relative_eq!(out.faces[0].area(), 1.0, epsilon = 1e-9);
        assert!(out
            .warnings
            .iter()
            .any(|w| matches!(w, ConsolidationWarning::CollinearFace(2))));
    }

    #[test]
    fn collinear_face_is_dropped_with_warning() {
        let tol = Tolerance::default();
        let shell = Polyhedron::new(vec![
            tri(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0)),
            tri(p(5.0, 0.0, 0.0), p(6.0, 0.0, 0.0), p(7.0, 0.0, 0.0)),
        ]);
        let out = consolidate(&shell, &tol);

        assert_eq!(out.faces.len(), 1);
        assert!(out
            .warnings
            .iter()
            .any(|w| matches!(w, ConsolidationWarning::CollinearFace(1))));
    }

    #[test]
    fn splice_of_mirrored_faces_is_rejected() {
        // Two opposite-winding copies of one triangle cancel every edge; the
        // splice must report failure instead of producing an empty face.
        let tol = Tolerance::default();
        let mut engine = Consolidator::new(tol);
        let face = tri(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0));
        let mirror = Face::new(face.outer.reversed());
        engine.insert(0, face);
        engine.insert(1, mirror);

        let keys: Vec<FaceKey> = engine.faces.keys().collect();
        assert!(engine.splice(keys[0], keys[1]).is_none());
    }

    #[test]
    fn unrelated_faces_pass_through() {
        let tol = Tolerance::default();
        let shell = Polyhedron::new(vec![
            tri(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)),
            tri(p(10.0, 0.0, 5.0), p(11.0, 0.0, 5.0), p(10.0, 1.0, 5.0)),
        ]);
        let out = consolidate(&shell, &tol);
        assert_eq!(out.faces.len(), 2);
        assert!(out.warnings.is_empty());
    }
}
