// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model-access contract.
//!
//! The pipeline never reads a source file itself: a [`ModelAccess`]
//! implementation hands it elements with their geometric lumps already
//! expressed as polyhedra of planar faces, plus the project-level constants
//! (true-north direction and length-unit scale). Coordinates are scaled into
//! model units exactly once, on ingest.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use shellform_geometry::Polyhedron;

/// Stable numeric element handle used on the persistence side.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ElementId(pub i64);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Coarse element category, used for panel detection and boundary
/// eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementCategory {
    Wall,
    Slab,
    Roof,
    Column,
    Beam,
    Door,
    Window,
    Stair,
    Railing,
    Furniture,
    Space,
    Opening,
    Other,
}

impl ElementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementCategory::Wall => "WALL",
            ElementCategory::Slab => "SLAB",
            ElementCategory::Roof => "ROOF",
            ElementCategory::Column => "COLUMN",
            ElementCategory::Beam => "BEAM",
            ElementCategory::Door => "DOOR",
            ElementCategory::Window => "WINDOW",
            ElementCategory::Stair => "STAIR",
            ElementCategory::Railing => "RAILING",
            ElementCategory::Furniture => "FURNITURE",
            ElementCategory::Space => "SPACE",
            ElementCategory::Opening => "OPENING",
            ElementCategory::Other => "OTHER",
        }
    }

    /// Space-like elements are the anchors of boundary pairing.
    pub fn is_space(&self) -> bool {
        matches!(self, ElementCategory::Space)
    }

    /// Panel-bearing types get PANEL - FRONT / PANEL - BACK attributes on
    /// their largest opposite side faces.
    pub fn is_panel_bearing(&self) -> bool {
        matches!(self, ElementCategory::Door | ElementCategory::Window)
    }
}

impl std::fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One model element: identity, category and its geometric lumps.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: ElementId,
    pub name: String,
    pub category: ElementCategory,
    /// Declared number of leaves/sashes; zero disables panel pairing.
    pub panel_count: usize,
    pub lumps: Vec<Polyhedron>,
}

/// Project-level constants supplied by the model.
#[derive(Debug, Clone)]
pub struct ProjectInfo {
    /// True-north direction in the model's XY plane.
    pub true_north: Vector3<f64>,
    /// Factor converting source coordinates into model length units.
    pub unit_scale: f64,
}

impl Default for ProjectInfo {
    fn default() -> Self {
        Self {
            true_north: Vector3::y(),
            unit_scale: 1.0,
        }
    }
}

/// Read access to a loaded building model.
pub trait ModelAccess {
    fn project_info(&self) -> ProjectInfo;
    fn elements(&self) -> Vec<Element>;
}

/// In-memory model for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryModel {
    info: ProjectInfo,
    elements: Vec<Element>,
}

impl MemoryModel {
    pub fn new(info: ProjectInfo) -> Self {
        Self {
            info,
            elements: Vec::new(),
        }
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }
}

impl ModelAccess for MemoryModel {
    fn project_info(&self) -> ProjectInfo {
        self.info.clone()
    }

    fn elements(&self) -> Vec<Element> {
        self.elements.clone()
    }
}

/// Angle in degrees, in `[0, 360)`, between a face normal and true north,
/// measured clockwise in the XY plane. Vertical normals yield 0.
pub fn angle_from_north(normal: &Vector3<f64>, north: &Vector3<f64>) -> f64 {
    let n = Vector3::new(normal.x, normal.y, 0.0);
    let tn = Vector3::new(north.x, north.y, 0.0);
    if n.norm() < 1e-12 || tn.norm() < 1e-12 {
        return 0.0;
    }
    let cross = tn.x * n.y - tn.y * n.x;
    let dot = tn.x * n.x + tn.y * n.y;
    let deg = (-cross).atan2(dot).to_degrees();
    if deg < 0.0 {
        deg + 360.0
    } else {
        deg
    }
}
