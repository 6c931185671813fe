// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Shellform Processing
//!
//! Drives the geometry crates over a whole building model: per-element
//! worker-pool tasks consolidate faces, classify orientation, derive
//! principal-axis metrics and register octree cells, persisting results
//! through the [`GeometryStore`] contract. A separate boundary pass pairs
//! space faces with the faces of their spatially adjacent neighbors.
//!
//! The crate owns no file format or wire protocol; models arrive through
//! [`ModelAccess`] and results leave through [`GeometryStore`].

pub mod boundary;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod records;
pub mod store;

pub use boundary::pair_boundaries;
pub use config::{PhaseSet, PipelineConfig};
pub use error::{Error, Result, RunFailure};
pub use model::{
    angle_from_north, Element, ElementCategory, ElementId, MemoryModel, ModelAccess,
    ProjectInfo,
};
pub use pipeline::{Phase, Pipeline, RunIssue, RunReport};
pub use records::{BoundaryPair, CellEntry, ElementMetrics, FaceRecord, GeometryCategory};
pub use store::{GeometryStore, MemoryStore};
