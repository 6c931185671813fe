// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end pipeline tests over in-memory models and stores.

use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::Point3;

use shellform_geometry::{Face, FaceOrientation, Polyhedron, Wire};
use shellform_processing::{
    Element, ElementCategory, ElementId, GeometryCategory, GeometryStore, MemoryModel,
    MemoryStore, Phase, Pipeline, PipelineConfig, ProjectInfo,
};

/// An axis-aligned box as 12 outward-wound triangles.
fn triangulated_box(min: Point3<f64>, size: [f64; 3]) -> Polyhedron {
    let v: Vec<Point3<f64>> = (0..8)
        .map(|i| {
            Point3::new(
                min.x + size[0] * ((i & 1) as f64),
                min.y + size[1] * (((i >> 1) & 1) as f64),
                min.z + size[2] * (((i >> 2) & 1) as f64),
            )
        })
        .collect();
    let quads: [[usize; 4]; 6] = [
        [0, 2, 3, 1], // bottom, -Z
        [4, 5, 7, 6], // top, +Z
        [0, 1, 5, 4], // -Y
        [2, 6, 7, 3], // +Y
        [0, 4, 6, 2], // -X
        [1, 3, 7, 5], // +X
    ];
    let mut faces = Vec::new();
    for q in quads {
        faces.push(Face::new(Wire::from_points(&[v[q[0]], v[q[1]], v[q[2]]])));
        faces.push(Face::new(Wire::from_points(&[v[q[0]], v[q[2]], v[q[3]]])));
    }
    Polyhedron::new(faces)
}

fn element(id: i64, category: ElementCategory, lump: Polyhedron) -> Element {
    Element {
        id: ElementId(id),
        name: format!("element {id}"),
        category,
        panel_count: 0,
        lumps: vec![lump],
    }
}

fn small_world_config() -> PipelineConfig {
    PipelineConfig {
        world_min: [-16.0; 3],
        world_max: [16.0; 3],
        max_depth: 4,
        ..PipelineConfig::default()
    }
}

#[test]
fn cube_round_trip() {
    let mut model = MemoryModel::new(ProjectInfo::default());
    model.push(element(
        1,
        ElementCategory::Wall,
        triangulated_box(Point3::new(0.0, 0.0, 0.0), [1.0, 1.0, 1.0]),
    ));

    let store = Arc::new(MemoryStore::new(8));
    let pipeline = Pipeline::new(small_world_config()).unwrap();
    let report = pipeline.run(&model, store.clone()).unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 0);
    assert!(report.issues.is_empty());

    let faces = store.faces_of(ElementId(1)).unwrap();
    let body: Vec<_> = faces
        .iter()
        .filter(|r| r.category == GeometryCategory::Body)
        .collect();
    assert_eq!(body.len(), 6);
    for record in &body {
        assert_relative_eq!(record.area, 1.0, epsilon = 1e-9);
        // Every consolidated face normal is a signed unit axis.
        let axis_components = record
            .normal
            .iter()
            .filter(|c| c.abs() > 1.0 - 1e-9)
            .count();
        assert_eq!(axis_components, 1);
    }

    let tops = body
        .iter()
        .filter(|r| r.orientation == Some(FaceOrientation::Top))
        .count();
    let bottoms = body
        .iter()
        .filter(|r| r.orientation == Some(FaceOrientation::Bottom))
        .count();
    let sides = body
        .iter()
        .filter(|r| r.orientation == Some(FaceOrientation::Side))
        .count();
    assert_eq!((tops, bottoms, sides), (1, 1, 4));

    // OBB faces persisted alongside the body.
    let obb = faces
        .iter()
        .filter(|r| r.category == GeometryCategory::Obb)
        .count();
    assert_eq!(obb, 6);

    let metrics = store.metrics_of(ElementId(1)).unwrap();
    assert_relative_eq!(metrics.surface_area, 6.0, epsilon = 1e-9);
    assert_relative_eq!(metrics.centroid[0], 0.5, epsilon = 1e-9);

    assert!(!store.cells_of(ElementId(1)).is_empty());
}

#[test]
fn pooled_and_sequential_runs_match() {
    let mut model = MemoryModel::new(ProjectInfo::default());
    for i in 0..12 {
        let x = (i % 4) as f64 * 3.0 - 6.0;
        let y = (i / 4) as f64 * 3.0 - 3.0;
        model.push(element(
            i,
            ElementCategory::Wall,
            triangulated_box(Point3::new(x, y, 0.0), [2.0, 2.0, 2.5]),
        ));
    }

    let mut config = small_world_config();
    config.phases.boundaries = false;

    let pooled = Arc::new(MemoryStore::new(4));
    let sequential = Arc::new(MemoryStore::new(4));
    let pipeline = Pipeline::new(config).unwrap();
    pipeline.run(&model, pooled.clone()).unwrap();
    pipeline.run_sequential(&model, sequential.clone()).unwrap();

    let snapshot = |store: &MemoryStore, id: i64| -> Vec<(i64, &'static str, i64)> {
        let mut rows: Vec<_> = store
            .faces_of(ElementId(id))
            .unwrap()
            .iter()
            .map(|r| {
                (
                    r.face_id,
                    r.category.as_str(),
                    (r.area * 1e6).round() as i64,
                )
            })
            .collect();
        rows.sort();
        rows
    };

    for i in 0..12 {
        assert_eq!(snapshot(&pooled, i), snapshot(&sequential, i));
        assert!(!snapshot(&pooled, i).is_empty());
    }
}

#[test]
fn adjacency_is_symmetric() {
    let mut model = MemoryModel::new(ProjectInfo::default());
    model.push(element(
        1,
        ElementCategory::Space,
        triangulated_box(Point3::new(0.0, 0.0, 0.0), [4.0, 4.0, 3.0]),
    ));
    model.push(element(
        2,
        ElementCategory::Wall,
        triangulated_box(Point3::new(4.0, 0.0, 0.0), [0.2, 4.0, 3.0]),
    ));
    model.push(element(
        3,
        ElementCategory::Furniture,
        triangulated_box(Point3::new(-14.0, -14.0, -14.0), [1.0, 1.0, 1.0]),
    ));

    let store = Arc::new(MemoryStore::new(8));
    let pipeline = Pipeline::new(small_world_config()).unwrap();
    pipeline.run(&model, store.clone()).unwrap();

    let n1 = store.neighbors_of(ElementId(1)).unwrap();
    let n2 = store.neighbors_of(ElementId(2)).unwrap();
    assert!(n1.contains(&ElementId(2)));
    assert!(n2.contains(&ElementId(1)));
    // The far-away element shares no leaf cell with the touching pair,
    // even though ancestor rows up to the root are persisted for everyone.
    assert!(!n1.contains(&ElementId(3)));
    assert!(store.neighbors_of(ElementId(3)).unwrap().is_empty());
    assert!(store
        .cells_of(ElementId(3))
        .iter()
        .any(|entry| entry.depth == 0));
}

#[test]
fn opposite_corners_share_only_ancestors() {
    // Two 1-unit boxes in opposite corners of the world: both persist the
    // depth-0 root row, neither may appear in the other's shortlist.
    let mut model = MemoryModel::new(ProjectInfo::default());
    model.push(element(
        1,
        ElementCategory::Wall,
        triangulated_box(Point3::new(-15.0, -15.0, -15.0), [1.0, 1.0, 1.0]),
    ));
    model.push(element(
        2,
        ElementCategory::Wall,
        triangulated_box(Point3::new(14.0, 14.0, 14.0), [1.0, 1.0, 1.0]),
    ));

    let store = Arc::new(MemoryStore::new(8));
    let pipeline = Pipeline::new(small_world_config()).unwrap();
    pipeline.run(&model, store.clone()).unwrap();

    for id in [1, 2] {
        assert!(store
            .cells_of(ElementId(id))
            .iter()
            .any(|entry| entry.depth == 0));
        assert!(store.neighbors_of(ElementId(id)).unwrap().is_empty());
    }
}

#[test]
fn boundary_pass_pairs_space_with_wall() {
    let mut model = MemoryModel::new(ProjectInfo::default());
    model.push(element(
        1,
        ElementCategory::Space,
        triangulated_box(Point3::new(0.0, 0.0, 0.0), [4.0, 4.0, 3.0]),
    ));
    model.push(element(
        2,
        ElementCategory::Wall,
        triangulated_box(Point3::new(4.0, 0.0, 0.0), [0.2, 4.0, 3.0]),
    ));

    let store = Arc::new(MemoryStore::new(8));
    let pipeline = Pipeline::new(small_world_config()).unwrap();
    let report = pipeline.run(&model, store.clone()).unwrap();
    assert!(report.issues.is_empty());

    let pairs = store.boundary_pairs();
    assert_eq!(pairs.len(), 1);
    let pair = &pairs[0];
    assert_eq!(pair.space, ElementId(1));
    assert_eq!(pair.boundary, ElementId(2));
    // Both face centroids coincide on the shared plane at x = 4.
    let common = pair.common_point.unwrap();
    assert_relative_eq!(common[0], 4.0, epsilon = 1e-9);
    assert_relative_eq!(common[1], 2.0, epsilon = 1e-9);
    assert_relative_eq!(common[2], 1.5, epsilon = 1e-9);
}

#[test]
fn geometry_outside_world_is_recoverable() {
    let mut model = MemoryModel::new(ProjectInfo::default());
    model.push(element(
        1,
        ElementCategory::Wall,
        triangulated_box(Point3::new(100.0, 100.0, 100.0), [1.0, 1.0, 1.0]),
    ));

    let store = Arc::new(MemoryStore::new(8));
    let pipeline = Pipeline::new(small_world_config()).unwrap();
    let report = pipeline.run(&model, store.clone()).unwrap();

    // Faces are still persisted; only the index registration is skipped.
    assert_eq!(report.processed, 1);
    assert!(report
        .issues
        .iter()
        .any(|i| i.phase == Phase::SpatialIndex && i.element == ElementId(1)));
    assert!(!store.faces_of(ElementId(1)).unwrap().is_empty());
    assert!(store.cells_of(ElementId(1)).is_empty());
}

#[test]
fn rejected_writes_do_not_block_siblings() {
    let mut model = MemoryModel::new(ProjectInfo::default());
    model.push(element(
        1,
        ElementCategory::Wall,
        triangulated_box(Point3::new(0.0, 0.0, 0.0), [1.0, 1.0, 1.0]),
    ));
    model.push(element(
        2,
        ElementCategory::Wall,
        triangulated_box(Point3::new(3.0, 0.0, 0.0), [1.0, 1.0, 1.0]),
    ));

    let store = Arc::new(MemoryStore::rejecting(8, &[ElementId(2)]));
    let pipeline = Pipeline::new(small_world_config()).unwrap();
    let report = pipeline.run(&model, store.clone()).unwrap();

    assert!(!report.issues.is_empty());
    assert!(report.issues.iter().all(|i| i.element == ElementId(2)));
    assert!(!store.faces_of(ElementId(1)).unwrap().is_empty());
    assert!(store.faces_of(ElementId(2)).unwrap().is_empty());
}

#[test]
fn disabled_phases_are_skipped() {
    let mut model = MemoryModel::new(ProjectInfo::default());
    model.push(element(
        1,
        ElementCategory::Space,
        triangulated_box(Point3::new(0.0, 0.0, 0.0), [4.0, 4.0, 3.0]),
    ));
    model.push(element(
        2,
        ElementCategory::Wall,
        triangulated_box(Point3::new(4.0, 0.0, 0.0), [0.2, 4.0, 3.0]),
    ));

    let mut config = small_world_config();
    config.phases.spatial_index = false;
    config.phases.boundaries = false;

    let store = Arc::new(MemoryStore::new(8));
    let pipeline = Pipeline::new(config).unwrap();
    pipeline.run(&model, store.clone()).unwrap();

    assert!(store.cells_of(ElementId(1)).is_empty());
    assert!(store.boundary_pairs().is_empty());
}

#[test]
fn unit_scale_applied_once() {
    // Millimeter model: a 1000-unit cube becomes a 1 m cube.
    let info = ProjectInfo {
        unit_scale: 0.001,
        ..ProjectInfo::default()
    };
    let mut model = MemoryModel::new(info);
    model.push(element(
        1,
        ElementCategory::Wall,
        triangulated_box(Point3::new(0.0, 0.0, 0.0), [1000.0, 1000.0, 1000.0]),
    ));

    let store = Arc::new(MemoryStore::new(8));
    let pipeline = Pipeline::new(small_world_config()).unwrap();
    let report = pipeline.run(&model, store.clone()).unwrap();
    assert_eq!(report.processed, 1);

    let metrics = store.metrics_of(ElementId(1)).unwrap();
    assert_relative_eq!(metrics.surface_area, 6.0, epsilon = 1e-6);
}
