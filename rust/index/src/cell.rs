// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Packed 64-bit octree cell identifiers.
//!
//! A cell is a cubic sub-volume of the fixed world bounding box, addressed
//! by its integer coordinates at its own subdivision depth. The packed key
//! encodes coordinates and depth together, so no external table is needed to
//! interpret a persisted cell id: the integer coordinate range a cell spans
//! on the finest lattice follows directly from its coordinates and depth.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use shellform_geometry::Aabb;
use nalgebra::Point3;

/// Bits per axis coordinate in the packed key.
pub const COORD_BITS: u32 = 19;

/// Deepest subdivision level a [`CellId`] can express.
pub const MAX_DEPTH: u8 = COORD_BITS as u8;

const COORD_MASK: u64 = (1 << COORD_BITS) - 1;

/// Packed octree cell key.
///
/// Layout, least-significant first: x (19 bits), y (19 bits), z (19 bits),
/// depth (5 bits). Depth 0 is the whole world; at depth `d` each axis holds
/// `2^d` cells.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellId(u64);

impl CellId {
    /// Creates a cell key, validating depth and coordinate ranges.
    pub fn new(x: u32, y: u32, z: u32, depth: u8) -> Result<CellId> {
        if depth > MAX_DEPTH {
            return Err(Error::DepthTooDeep(depth));
        }
        let limit = 1u32 << depth;
        for &c in &[x, y, z] {
            if c >= limit {
                return Err(Error::CoordOutOfRange(c, depth));
            }
        }
        Ok(CellId(
            (x as u64)
                | ((y as u64) << COORD_BITS)
                | ((z as u64) << (2 * COORD_BITS))
                | ((depth as u64) << (3 * COORD_BITS)),
        ))
    }

    /// The whole-world cell at depth 0.
    pub fn root() -> CellId {
        CellId(0)
    }

    /// Reconstructs a key from its packed form.
    pub fn from_raw(raw: u64) -> Result<CellId> {
        let cell = CellId(raw);
        // Re-pack through the validating constructor.
        CellId::new(cell.x(), cell.y(), cell.z(), cell.depth())
            .map_err(|_| Error::InvalidCellId(raw))
    }

    /// The packed 64-bit key.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// X coordinate at this cell's depth.
    pub fn x(&self) -> u32 {
        (self.0 & COORD_MASK) as u32
    }

    /// Y coordinate at this cell's depth.
    pub fn y(&self) -> u32 {
        ((self.0 >> COORD_BITS) & COORD_MASK) as u32
    }

    /// Z coordinate at this cell's depth.
    pub fn z(&self) -> u32 {
        ((self.0 >> (2 * COORD_BITS)) & COORD_MASK) as u32
    }

    /// Subdivision depth of this cell.
    pub fn depth(&self) -> u8 {
        (self.0 >> (3 * COORD_BITS)) as u8
    }

    /// Child cell for the given octant (0..8).
    ///
    /// Octant bit 0 selects the upper x half, bit 1 the upper y half and
    /// bit 2 the upper z half. Children exactly partition the parent.
    pub fn child(&self, octant: u8) -> Result<CellId> {
        debug_assert!(octant < 8);
        CellId::new(
            self.x() * 2 + (octant & 1) as u32,
            self.y() * 2 + ((octant >> 1) & 1) as u32,
            self.z() * 2 + ((octant >> 2) & 1) as u32,
            self.depth() + 1,
        )
    }

    /// All 8 children of this cell, in octant order.
    pub fn children(&self) -> Result<[CellId; 8]> {
        let mut out = [CellId::root(); 8];
        for (octant, slot) in out.iter_mut().enumerate() {
            *slot = self.child(octant as u8)?;
        }
        Ok(out)
    }

    /// Inclusive integer bounds this cell spans on the finest lattice
    /// (`2^COORD_BITS` cells per axis).
    pub fn lattice_bounds(&self) -> ([i64; 3], [i64; 3]) {
        let shift = COORD_BITS - self.depth() as u32;
        let min = [
            (self.x() as i64) << shift,
            (self.y() as i64) << shift,
            (self.z() as i64) << shift,
        ];
        let span = (1i64 << shift) - 1;
        let max = [min[0] + span, min[1] + span, min[2] + span];
        (min, max)
    }

    /// World-space bounds of this cell within the given world box.
    pub fn world_bounds(&self, world: &Aabb) -> Aabb {
        let cells = (1u64 << self.depth()) as f64;
        let size = world.size() / cells;
        let min = Point3::new(
            world.min.x + size.x * self.x() as f64,
            world.min.y + size.y * self.y() as f64,
            world.min.z + size.z * self.z() as f64,
        );
        Aabb::new(min, min + size)
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {})@{}",
            self.x(),
            self.y(),
            self.z(),
            self.depth()
        )
    }
}
