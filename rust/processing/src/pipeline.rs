// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The element processing pipeline.
//!
//! One task per element runs on a shared rayon pool: consolidate each lump,
//! classify face orientation, derive principal-axis metrics, register octree
//! cells, and persist everything through the store. Submission is throttled
//! by a bounded window of completion signals to cap peak memory and write
//! concurrency; the pool itself is not otherwise limited. Elements share no
//! mutable state except the store, so no cross-element ordering exists.
//!
//! Boundary pairing always runs as a separate later pass over persisted
//! data, after every element task has completed and flushed.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Arc;

use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use tracing::{info, info_span, warn};

use crate::boundary::pair_boundaries;
use crate::config::PipelineConfig;
use crate::error::{Error, RunFailure};
use crate::model::{angle_from_north, Element, ElementCategory, ElementId, ModelAccess, ProjectInfo};
use crate::records::{CellEntry, ElementMetrics, FaceRecord, GeometryCategory};
use crate::store::GeometryStore;
use shellform_geometry::{
    classify_faces, consolidate, oriented_bbox, principal_axes, projected_bbox, Aabb,
    ClassifiedFace, Face, Obb, Wire,
};
use shellform_index::Octree;

/// Pipeline phase a run issue occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Consolidation,
    Classification,
    Metrics,
    SpatialIndex,
    Boundaries,
    Persist,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Consolidation => "consolidation",
            Phase::Classification => "classification",
            Phase::Metrics => "metrics",
            Phase::SpatialIndex => "spatial-index",
            Phase::Boundaries => "boundaries",
            Phase::Persist => "persist",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recoverable problem, tied to the element and phase it occurred in.
#[derive(Debug, Clone)]
pub struct RunIssue {
    pub element: ElementId,
    pub phase: Phase,
    pub detail: String,
}

impl std::fmt::Display for RunIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.element, self.phase, self.detail)
    }
}

/// Outcome of a run: counts plus the ordered recoverable issues.
#[derive(Debug, Default)]
pub struct RunReport {
    pub processed: usize,
    pub skipped: usize,
    pub issues: Vec<RunIssue>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.issues.is_empty()
    }
}

struct TaskSummary {
    issues: Vec<RunIssue>,
    skipped: bool,
}

struct TaskOutcome {
    element: ElementId,
    result: Result<TaskSummary, Error>,
}

/// The processing pipeline, configured once per run.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validates the configuration and builds a pipeline.
    pub fn new(config: PipelineConfig) -> Result<Pipeline, Error> {
        config.validate()?;
        Ok(Pipeline { config })
    }

    /// Processes every element of the model on a worker pool.
    ///
    /// Recoverable problems are collected into the returned [`RunReport`];
    /// a fatal error aborts with the issues accumulated so far attached to
    /// the [`RunFailure`].
    pub fn run(
        &self,
        model: &dyn ModelAccess,
        store: Arc<dyn GeometryStore>,
    ) -> Result<RunReport, RunFailure> {
        let octree = match self.octree() {
            Ok(octree) => octree,
            Err(cause) => return Err(fail(cause, RunReport::default())),
        };
        let pool = match rayon::ThreadPoolBuilder::new().build() {
            Ok(pool) => pool,
            Err(e) => return Err(fail(Error::Pool(e.to_string()), RunReport::default())),
        };

        let info = model.project_info();
        let elements = model.elements();
        let categories = category_map(&elements);
        let spaces = space_ids(&elements);
        info!(elements = elements.len(), "pipeline run started");

        let mut window: VecDeque<mpsc::Receiver<TaskOutcome>> = VecDeque::new();
        let mut outcomes = Vec::with_capacity(elements.len());

        for element in elements {
            // Throttle: wait on the oldest completion signal when the
            // submission window is full.
            if window.len() >= self.config.submission_window {
                if let Some(oldest) = window.pop_front() {
                    match oldest.recv() {
                        Ok(outcome) => outcomes.push(outcome),
                        Err(_) => {
                            return Err(fail(
                                Error::Pool("element task dropped its signal".into()),
                                collect(outcomes).0,
                            ))
                        }
                    }
                }
            }

            let (tx, rx) = mpsc::channel();
            let config = self.config.clone();
            let info = info.clone();
            let octree = octree.clone();
            let store = Arc::clone(&store);
            pool.spawn(move || {
                let outcome = process_element(element, &info, &config, &octree, store.as_ref());
                let _ = tx.send(outcome);
            });
            window.push_back(rx);
        }

        for rx in window {
            match rx.recv() {
                Ok(outcome) => outcomes.push(outcome),
                Err(_) => {
                    return Err(fail(
                        Error::Pool("element task dropped its signal".into()),
                        collect(outcomes).0,
                    ))
                }
            }
        }

        let (report, fatal) = collect(outcomes);
        if let Some(cause) = fatal {
            return Err(fail(cause, report));
        }
        self.finish(store, &categories, &spaces, report)
    }

    /// Single-threaded variant of [`Pipeline::run`] with identical results.
    pub fn run_sequential(
        &self,
        model: &dyn ModelAccess,
        store: Arc<dyn GeometryStore>,
    ) -> Result<RunReport, RunFailure> {
        let octree = match self.octree() {
            Ok(octree) => octree,
            Err(cause) => return Err(fail(cause, RunReport::default())),
        };

        let info = model.project_info();
        let elements = model.elements();
        let categories = category_map(&elements);
        let spaces = space_ids(&elements);

        let outcomes: Vec<TaskOutcome> = elements
            .into_iter()
            .map(|element| {
                process_element(element, &info, &self.config, &octree, store.as_ref())
            })
            .collect();

        let (report, fatal) = collect(outcomes);
        if let Some(cause) = fatal {
            return Err(fail(cause, report));
        }
        self.finish(store, &categories, &spaces, report)
    }

    fn octree(&self) -> Result<Octree, Error> {
        Ok(Octree::new(self.config.world(), self.config.max_depth)?)
    }

    /// Flushes element results and runs the boundary pass over them.
    fn finish(
        &self,
        store: Arc<dyn GeometryStore>,
        categories: &FxHashMap<ElementId, ElementCategory>,
        spaces: &[ElementId],
        mut report: RunReport,
    ) -> Result<RunReport, RunFailure> {
        if let Err(cause) = store.flush() {
            return Err(fail(cause, report));
        }

        if self.config.phases.boundaries {
            let span = info_span!("boundaries", spaces = spaces.len());
            let _enter = span.enter();
            for &space in spaces {
                let pairs = match pair_boundaries(
                    space,
                    categories,
                    &self.config.boundary_categories,
                    store.as_ref(),
                    &self.config.tolerance,
                ) {
                    Ok(pairs) => pairs,
                    Err(cause) if cause.is_recoverable() => {
                        warn!(%space, error = %cause, "boundary pairing skipped");
                        report.issues.push(RunIssue {
                            element: space,
                            phase: Phase::Boundaries,
                            detail: cause.to_string(),
                        });
                        continue;
                    }
                    Err(cause) => return Err(fail(cause, report)),
                };
                for pair in pairs {
                    match store.put_boundary(pair) {
                        Ok(()) => {}
                        Err(cause) if cause.is_recoverable() => {
                            warn!(%space, error = %cause, "boundary record skipped");
                            report.issues.push(RunIssue {
                                element: space,
                                phase: Phase::Boundaries,
                                detail: cause.to_string(),
                            });
                        }
                        Err(cause) => return Err(fail(cause, report)),
                    }
                }
            }
            if let Err(cause) = store.flush() {
                return Err(fail(cause, report));
            }
        }

        info!(
            processed = report.processed,
            skipped = report.skipped,
            issues = report.issues.len(),
            "pipeline run finished"
        );
        Ok(report)
    }
}

fn fail(cause: Error, report: RunReport) -> RunFailure {
    RunFailure { cause, report }
}

/// Merges task outcomes into a report, ordered by element id. The first
/// fatal error, if any, is returned alongside the partial report.
fn collect(mut outcomes: Vec<TaskOutcome>) -> (RunReport, Option<Error>) {
    outcomes.sort_by_key(|o| o.element);
    let mut report = RunReport::default();
    let mut fatal = None;
    for outcome in outcomes {
        match outcome.result {
            Ok(summary) => {
                if summary.skipped {
                    report.skipped += 1;
                } else {
                    report.processed += 1;
                }
                report.issues.extend(summary.issues);
            }
            Err(cause) => {
                report.skipped += 1;
                if fatal.is_none() {
                    fatal = Some(cause);
                }
            }
        }
    }
    (report, fatal)
}

fn category_map(elements: &[Element]) -> FxHashMap<ElementId, ElementCategory> {
    elements.iter().map(|e| (e.id, e.category)).collect()
}

fn space_ids(elements: &[Element]) -> Vec<ElementId> {
    let mut spaces: Vec<ElementId> = elements
        .iter()
        .filter(|e| e.category.is_space())
        .map(|e| e.id)
        .collect();
    spaces.sort();
    spaces
}

/// Processes one element end to end; never panics, never blocks siblings.
fn process_element(
    element: Element,
    info: &ProjectInfo,
    config: &PipelineConfig,
    octree: &Octree,
    store: &dyn GeometryStore,
) -> TaskOutcome {
    let span = info_span!("element", id = %element.id);
    let _enter = span.enter();

    let id = element.id;
    let result = process_element_inner(element, info, config, octree, store);
    TaskOutcome { element: id, result }
}

fn process_element_inner(
    element: Element,
    info: &ProjectInfo,
    config: &PipelineConfig,
    octree: &Octree,
    store: &dyn GeometryStore,
) -> Result<TaskSummary, Error> {
    let tol = &config.tolerance;
    let mut issues = Vec::new();
    // Face ids restart at zero for every element batch, so re-processing an
    // element replaces its rows instead of growing them.
    let mut next_face_id = 0i64;

    let mut body: Vec<(Face, Option<ClassifiedFace>)> = Vec::new();
    let mut bounds: Option<Aabb> = None;

    for (lump_index, lump) in element.lumps.iter().enumerate() {
        // Unit normalization happens exactly once, on ingest.
        let lump = if (info.unit_scale - 1.0).abs() > f64::EPSILON {
            lump.scaled(info.unit_scale)
        } else {
            lump.clone()
        };
        if lump.is_empty() {
            issues.push(RunIssue {
                element: element.id,
                phase: Phase::Consolidation,
                detail: format!("lump {lump_index} has no faces"),
            });
            continue;
        }
        if let Some(b) = lump.bbox() {
            bounds = Some(match bounds {
                Some(acc) => acc.merged(&b),
                None => b,
            });
        }

        let faces = if config.phases.consolidation {
            let outcome = consolidate(&lump, tol);
            for warning in outcome.warnings {
                warn!(element = %element.id, lump = lump_index, %warning, "face dropped");
                issues.push(RunIssue {
                    element: element.id,
                    phase: Phase::Consolidation,
                    detail: format!("lump {lump_index}: {warning}"),
                });
            }
            outcome.faces
        } else {
            lump.faces.clone()
        };
        if faces.is_empty() {
            issues.push(RunIssue {
                element: element.id,
                phase: Phase::Consolidation,
                detail: format!("lump {lump_index} consolidated to nothing"),
            });
            continue;
        }

        let panel_count = if element.category.is_panel_bearing() {
            element.panel_count
        } else {
            0
        };
        let classified = classify_faces(&faces, panel_count, tol);
        for (face, class) in faces.into_iter().zip(classified) {
            body.push((face, Some(class)));
        }
    }

    if body.is_empty() {
        return Ok(TaskSummary {
            issues,
            skipped: true,
        });
    }

    // Persist body faces and their hole loops.
    let north = &info.true_north;
    let mut surface_area = 0.0;
    let mut vertices: Vec<Point3<f64>> = Vec::new();
    for (face, class) in &body {
        surface_area += face.area();
        vertices.extend(face.vertices());

        let record = match build_record(
            element.id,
            &mut next_face_id,
            GeometryCategory::Body,
            face.clone(),
            *class,
            north,
        ) {
            Some(record) => record,
            None => {
                issues.push(RunIssue {
                    element: element.id,
                    phase: Phase::Classification,
                    detail: "face has a degenerate normal".into(),
                });
                continue;
            }
        };
        put_face(store, record, &mut issues)?;

        for hole in &face.holes {
            let hole_face = Face::new(hole.clone());
            if let Some(record) = build_record(
                element.id,
                &mut next_face_id,
                GeometryCategory::Hole,
                hole_face,
                None,
                north,
            ) {
                put_face(store, record, &mut issues)?;
            }
        }
    }

    // Derived metrics: principal axes and both oriented boxes.
    let frame = principal_axes(&vertices)
        .and_then(|axes| oriented_bbox(&vertices).map(|obb| (axes, obb)));
    match frame {
        Ok((axes, obb)) => {
            let projected = projected_bbox(&vertices).ok();

            for record in box_records(element.id, &mut next_face_id, &obb, GeometryCategory::Obb, north)
            {
                put_face(store, record, &mut issues)?;
            }
            if let Some(ref projected) = projected {
                for record in box_records(
                    element.id,
                    &mut next_face_id,
                    projected,
                    GeometryCategory::ProjObb,
                    north,
                ) {
                    put_face(store, record, &mut issues)?;
                }
            }

            let metrics = ElementMetrics {
                element: element.id,
                centroid: point_array(&axes.centroid),
                axes: [
                    vector_array(&axes.axes[0]),
                    vector_array(&axes.axes[1]),
                    vector_array(&axes.axes[2]),
                ],
                obb_corners: corner_arrays(&obb),
                projected_corners: projected.as_ref().map(corner_arrays),
                surface_area,
            };
            match store.put_metrics(metrics) {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(element = %element.id, error = %e, "metrics record skipped");
                    issues.push(RunIssue {
                        element: element.id,
                        phase: Phase::Persist,
                        detail: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Err(e) => {
            warn!(element = %element.id, error = %e, "metrics skipped");
            issues.push(RunIssue {
                element: element.id,
                phase: Phase::Metrics,
                detail: e.to_string(),
            });
        }
    }

    // Spatial index registration.
    if config.phases.spatial_index {
        if let Some(bounds) = bounds {
            match octree.cells_for(&bounds) {
                Ok(cells) => {
                    let entries: Vec<CellEntry> = cells
                        .into_iter()
                        .map(|cell| {
                            let (min, max) = cell.lattice_bounds();
                            CellEntry {
                                element: element.id,
                                cell,
                                min,
                                max,
                                depth: cell.depth(),
                            }
                        })
                        .collect();
                    match store.put_cells(entries) {
                        Ok(()) => {}
                        Err(e) if e.is_recoverable() => {
                            warn!(element = %element.id, error = %e, "cell rows skipped");
                            issues.push(RunIssue {
                                element: element.id,
                                phase: Phase::Persist,
                                detail: e.to_string(),
                            });
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => {
                    // Geometry outside the world box: the element's bbox was
                    // mis-estimated upstream. Skip indexing, keep the faces.
                    warn!(element = %element.id, error = %e, "octree registration skipped");
                    issues.push(RunIssue {
                        element: element.id,
                        phase: Phase::SpatialIndex,
                        detail: e.to_string(),
                    });
                }
            }
        }
    }

    Ok(TaskSummary {
        issues,
        skipped: false,
    })
}

/// Persists one face record, downgrading per-record failures to issues.
fn put_face(
    store: &dyn GeometryStore,
    record: FaceRecord,
    issues: &mut Vec<RunIssue>,
) -> Result<(), Error> {
    let element = record.element;
    let face_id = record.face_id;
    match store.put_face(record) {
        Ok(()) => Ok(()),
        Err(e) if e.is_recoverable() => {
            warn!(%element, face_id, error = %e, "face record skipped");
            issues.push(RunIssue {
                element,
                phase: Phase::Persist,
                detail: format!("face {face_id}: {e}"),
            });
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Builds a face record, or `None` when the face is too degenerate to
/// describe.
fn build_record(
    element: ElementId,
    next_face_id: &mut i64,
    category: GeometryCategory,
    face: Face,
    class: Option<ClassifiedFace>,
    north: &Vector3<f64>,
) -> Option<FaceRecord> {
    let normal = face.normal()?;
    let centroid = face.centroid()?;
    let record = FaceRecord {
        element,
        face_id: *next_face_id,
        category,
        orientation: class.and_then(|c| c.orientation),
        attribute: class.and_then(|c| c.attribute),
        normal: vector_array(&normal),
        centroid: point_array(&centroid),
        area: face.area(),
        angle_from_north: angle_from_north(&normal, north),
        face,
    };
    *next_face_id += 1;
    Some(record)
}

// Corner indices of the 6 quads of an 8-corner box, in the bit order
// produced by the OBB builder (bit k of a corner index selects the max
// extent along axis k).
const BOX_FACES: [[usize; 4]; 6] = [
    [0, 2, 6, 4],
    [1, 3, 7, 5],
    [0, 1, 5, 4],
    [2, 3, 7, 6],
    [0, 1, 3, 2],
    [4, 5, 7, 6],
];

/// Face records for the 6 sides of an oriented box.
fn box_records(
    element: ElementId,
    next_face_id: &mut i64,
    obb: &Obb,
    category: GeometryCategory,
    north: &Vector3<f64>,
) -> Vec<FaceRecord> {
    BOX_FACES
        .iter()
        .filter_map(|quad| {
            let points: Vec<Point3<f64>> =
                quad.iter().map(|&i| obb.corners[i]).collect();
            let face = Face::new(Wire::from_points(&points));
            build_record(element, next_face_id, category, face, None, north)
        })
        .collect()
}

fn point_array(p: &Point3<f64>) -> [f64; 3] {
    [p.x, p.y, p.z]
}

fn vector_array(v: &Vector3<f64>) -> [f64; 3] {
    [v.x, v.y, v.z]
}

fn corner_arrays(obb: &Obb) -> [[f64; 3]; 8] {
    let mut out = [[0.0; 3]; 8];
    for (slot, corner) in out.iter_mut().zip(&obb.corners) {
        *slot = point_array(corner);
    }
    out
}
