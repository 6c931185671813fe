// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Shellform Geometry
//!
//! Geometry simplification for triangulated building-model shells.
//!
//! Given one element's boundary representation as a soup of planar facets,
//! this crate consolidates coplanar faces into minimal polygons with holes,
//! classifies face orientation (TOP/BOTTOM/SIDE and panel front/back), and
//! derives the element's principal axes and oriented bounding boxes. All
//! tolerance-sensitive operations take an explicit [`Tolerance`] value, so
//! the crate is safely reentrant under concurrent per-element processing.

pub mod bbox;
pub mod consolidate;
pub mod error;
pub mod face;
pub mod orientation;
pub mod pca;
pub mod plane;
pub mod primitives;
pub mod tolerance;

pub use bbox::Aabb;
pub use consolidate::{consolidate, ConsolidationOutcome, ConsolidationWarning, FaceKey};
pub use error::{Error, Result};
pub use face::{Face, Polyhedron};
pub use orientation::{classify_faces, ClassifiedFace, FaceOrientation, PanelAttribute};
pub use pca::{oriented_bbox, principal_axes, projected_bbox, Obb, PrincipalAxes};
pub use plane::Plane;
pub use primitives::{Edge, Wire};
pub use tolerance::Tolerance;
