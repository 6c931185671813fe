// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Semantic face orientation labelling.
//!
//! Classifies an element's consolidated faces as TOP/BOTTOM/SIDE (with
//! TOPSIDE/UNDERSIDE fallbacks for sloped elements) and derives panel
//! front/back attributes for thin panel-bearing elements such as doors and
//! windows. Each category removes its matches before the next test runs.

use serde::{Deserialize, Serialize};

use crate::face::Face;
use crate::tolerance::Tolerance;

/// Semantic orientation of a consolidated face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceOrientation {
    Top,
    Bottom,
    Side,
    Topside,
    Underside,
}

impl FaceOrientation {
    /// Persistence label for this orientation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceOrientation::Top => "TOP",
            FaceOrientation::Bottom => "BOTTOM",
            FaceOrientation::Side => "SIDE",
            FaceOrientation::Topside => "TOPSIDE",
            FaceOrientation::Underside => "UNDERSIDE",
        }
    }
}

impl std::fmt::Display for FaceOrientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Panel attribute for the largest opposite-normal SIDE face pairs of
/// panel-bearing elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PanelAttribute {
    Front,
    Back,
}

impl PanelAttribute {
    /// Persistence label for this attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelAttribute::Front => "PANEL - FRONT",
            PanelAttribute::Back => "PANEL - BACK",
        }
    }
}

impl std::fmt::Display for PanelAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result for one face, indexed into the input slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedFace {
    pub face_index: usize,
    pub orientation: Option<FaceOrientation>,
    pub attribute: Option<PanelAttribute>,
}

/// Labels each face of an element with its semantic orientation.
///
/// `panel_count` is the element's declared number of leaves/sashes; zero
/// disables panel pairing.
pub fn classify_faces(
    faces: &[Face],
    panel_count: usize,
    tol: &Tolerance,
) -> Vec<ClassifiedFace> {
    let mut result: Vec<ClassifiedFace> = (0..faces.len())
        .map(|i| ClassifiedFace {
            face_index: i,
            orientation: None,
            attribute: None,
        })
        .collect();

    // Per-face vertical data: normal z component, highest and lowest vertex.
    struct Vertical {
        nz: f64,
        high: f64,
        low: f64,
    }
    let vertical: Vec<Option<Vertical>> = faces
        .iter()
        .map(|f| {
            let nz = f.normal()?.z;
            let zs: Vec<f64> = f.vertices().iter().map(|p| p.z).collect();
            let high = zs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let low = zs.iter().cloned().fold(f64::INFINITY, f64::min);
            Some(Vertical { nz, high, low })
        })
        .collect();

    let unlabeled = |result: &[ClassifiedFace], i: usize| result[i].orientation.is_none();

    // TOP: vertical normal, preferring the highest face(s); equal-extent ties
    // are all labelled.
    let top_candidates: Vec<usize> = (0..faces.len())
        .filter(|&i| {
            vertical[i]
                .as_ref()
                .is_some_and(|v| tol.approx_eq(v.nz, 1.0))
        })
        .collect();
    if !top_candidates.is_empty() {
        let best = top_candidates
            .iter()
            .map(|&i| vertical[i].as_ref().unwrap().high)
            .fold(f64::NEG_INFINITY, f64::max);
        for &i in &top_candidates {
            if tol.approx_eq(vertical[i].as_ref().unwrap().high, best) {
                result[i].orientation = Some(FaceOrientation::Top);
            }
        }
    } else {
        // TOPSIDE fallback: the single most upward-facing, highest face.
        let best = (0..faces.len())
            .filter(|&i| vertical[i].as_ref().is_some_and(|v| v.nz > 0.5))
            .max_by(|&a, &b| {
                let (va, vb) = (vertical[a].as_ref().unwrap(), vertical[b].as_ref().unwrap());
                va.high.partial_cmp(&vb.high).unwrap_or(std::cmp::Ordering::Equal)
            });
        if let Some(i) = best {
            result[i].orientation = Some(FaceOrientation::Topside);
        }
    }

    // BOTTOM / UNDERSIDE: symmetric on the lowest vertex.
    let bottom_candidates: Vec<usize> = (0..faces.len())
        .filter(|&i| {
            unlabeled(&result, i)
                && vertical[i]
                    .as_ref()
                    .is_some_and(|v| tol.approx_eq(v.nz, -1.0))
        })
        .collect();
    if !bottom_candidates.is_empty() {
        let best = bottom_candidates
            .iter()
            .map(|&i| vertical[i].as_ref().unwrap().low)
            .fold(f64::INFINITY, f64::min);
        for &i in &bottom_candidates {
            if tol.approx_eq(vertical[i].as_ref().unwrap().low, best) {
                result[i].orientation = Some(FaceOrientation::Bottom);
            }
        }
    } else {
        let best = (0..faces.len())
            .filter(|&i| {
                unlabeled(&result, i) && vertical[i].as_ref().is_some_and(|v| v.nz < -0.5)
            })
            .min_by(|&a, &b| {
                let (va, vb) = (vertical[a].as_ref().unwrap(), vertical[b].as_ref().unwrap());
                va.low.partial_cmp(&vb.low).unwrap_or(std::cmp::Ordering::Equal)
            });
        if let Some(i) = best {
            result[i].orientation = Some(FaceOrientation::Underside);
        }
    }

    // SIDE: remaining faces with a horizontal normal.
    for i in 0..faces.len() {
        if unlabeled(&result, i)
            && vertical[i].as_ref().is_some_and(|v| tol.approx_zero(v.nz))
        {
            result[i].orientation = Some(FaceOrientation::Side);
        }
    }

    if panel_count > 0 {
        assign_panels(faces, panel_count, tol, &mut result);
    }

    result
}

/// Pairs the largest-area opposite-normal SIDE faces as panel front/back,
/// one pair per declared panel. The larger face of each pair is FRONT.
fn assign_panels(
    faces: &[Face],
    panel_count: usize,
    tol: &Tolerance,
    result: &mut [ClassifiedFace],
) {
    let mut sides: Vec<usize> = result
        .iter()
        .filter(|c| c.orientation == Some(FaceOrientation::Side))
        .map(|c| c.face_index)
        .collect();
    sides.sort_by(|&a, &b| {
        faces[b]
            .area()
            .partial_cmp(&faces[a].area())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut paired = vec![false; faces.len()];
    let mut pairs = 0;

    for pos in 0..sides.len() {
        if pairs >= panel_count {
            break;
        }
        let front = sides[pos];
        if paired[front] {
            continue;
        }
        let Some(front_n) = faces[front].normal() else {
            continue;
        };
        let partner = sides[pos + 1..].iter().copied().find(|&j| {
            !paired[j]
                && faces[j]
                    .normal()
                    .is_some_and(|n| tol.antiparallel(&front_n, &n))
        });
        if let Some(back) = partner {
            paired[front] = true;
            paired[back] = true;
            result[front].attribute = Some(PanelAttribute::Front);
            result[back].attribute = Some(PanelAttribute::Back);
            pairs += 1;
        }
    }
}
