// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed records exchanged with the persistence collaborator.

use serde::{Deserialize, Serialize};

use crate::model::ElementId;
use shellform_geometry::{Face, FaceOrientation, PanelAttribute};
use shellform_index::CellId;

/// What a persisted face geometry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryCategory {
    /// A consolidated face of the element's boundary representation.
    Body,
    /// A face of the principal-axis oriented bounding box.
    Obb,
    /// A face of the projected (flattened) oriented bounding box.
    ProjObb,
    /// A hole loop punched through a body face.
    Hole,
}

impl GeometryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryCategory::Body => "BODY",
            GeometryCategory::Obb => "OBB",
            GeometryCategory::ProjObb => "PROJOBB",
            GeometryCategory::Hole => "HOLE",
        }
    }

    /// Bounding-box-derived categories are excluded from boundary pairing.
    pub fn is_derived(&self) -> bool {
        matches!(self, GeometryCategory::Obb | GeometryCategory::ProjObb)
    }
}

impl std::fmt::Display for GeometryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted face of an element.
///
/// `face_id` is unique within the element and allocated afresh for every
/// batch, so re-processing an element replaces its face rows wholesale.
#[derive(Debug, Clone)]
pub struct FaceRecord {
    pub element: ElementId,
    pub face_id: i64,
    pub category: GeometryCategory,
    pub orientation: Option<FaceOrientation>,
    pub attribute: Option<PanelAttribute>,
    pub normal: [f64; 3],
    pub centroid: [f64; 3],
    pub area: f64,
    /// Clockwise bearing of the normal from true north, degrees.
    pub angle_from_north: f64,
    pub face: Face,
}

/// Derived per-element metrics.
#[derive(Debug, Clone)]
pub struct ElementMetrics {
    pub element: ElementId,
    pub centroid: [f64; 3],
    /// Principal axes ordered by descending variance.
    pub axes: [[f64; 3]; 3],
    /// The 8 OBB corners in world space.
    pub obb_corners: [[f64; 3]; 8],
    /// Projected-OBB corners, absent when the footprint is degenerate.
    pub projected_corners: Option<[[f64; 3]; 8]>,
    pub surface_area: f64,
}

/// One spatial-index row: an element's membership in one octree cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEntry {
    pub element: ElementId,
    pub cell: CellId,
    /// Inclusive integer bounds of the cell on the finest lattice.
    pub min: [i64; 3],
    pub max: [i64; 3],
    pub depth: u8,
}

/// A space-boundary pair between a space face and a bounding element face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryPair {
    pub space: ElementId,
    pub space_face: i64,
    pub boundary: ElementId,
    pub boundary_face: i64,
    /// Shared point on the contact plane, when either centroid lies inside
    /// the other face.
    pub common_point: Option<[f64; 3]>,
}
