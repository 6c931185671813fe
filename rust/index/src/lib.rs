// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Shellform Index
//!
//! Octree spatial index over a fixed world volume.
//!
//! Elements register the leaf (and ancestor) cells their geometry occupies;
//! spatially adjacent elements are then shortlisted by shared cell
//! membership instead of pairwise bounding-box scans. Cell identity is a
//! single packed 64-bit key, so persisted index rows are self-describing.

pub mod cell;
pub mod error;
pub mod octree;

pub use cell::{CellId, COORD_BITS, MAX_DEPTH};
pub use error::{Error, Result};
pub use octree::Octree;
