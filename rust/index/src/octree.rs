// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Octree subdivision of a fixed world volume.
//!
//! The octree is not materialized as a linked structure: cells exist only as
//! packed [`CellId`] keys, and membership is computed by recursively
//! descending into the octants a geometry's bounding volume intersects.
//! Membership is recorded at every depth level visited, not only the
//! deepest, so coarse queries can stop early.

use nalgebra::Point3;

use crate::cell::{CellId, COORD_BITS, MAX_DEPTH};
use crate::error::{Error, Result};
use shellform_geometry::Aabb;

/// Octree over a fixed world bounding box, configured once per model.
#[derive(Debug, Clone)]
pub struct Octree {
    world: Aabb,
    max_depth: u8,
}

impl Octree {
    /// Creates an octree over the given world volume.
    pub fn new(world: Aabb, max_depth: u8) -> Result<Octree> {
        if !world.is_valid() {
            return Err(Error::InvalidWorld);
        }
        if max_depth > MAX_DEPTH {
            return Err(Error::DepthTooDeep(max_depth));
        }
        Ok(Octree { world, max_depth })
    }

    /// The fixed world bounding box.
    pub fn world(&self) -> &Aabb {
        &self.world
    }

    /// The configured maximum subdivision depth.
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    /// Computes every cell the given bounding volume occupies, at every
    /// depth from the root down to `max_depth`.
    ///
    /// Returns [`Error::OutsideWorld`] when the volume does not intersect
    /// the world box at all; the caller treats this as a recoverable
    /// condition (the geometry's world box was mis-estimated upstream).
    pub fn cells_for(&self, bounds: &Aabb) -> Result<Vec<CellId>> {
        if !self.world.intersects(bounds) {
            return Err(Error::OutsideWorld);
        }
        let mut cells = Vec::new();
        self.descend(CellId::root(), bounds, &mut cells)?;
        Ok(cells)
    }

    fn descend(&self, cell: CellId, target: &Aabb, out: &mut Vec<CellId>) -> Result<()> {
        out.push(cell);
        if cell.depth() >= self.max_depth {
            return Ok(());
        }
        for child in cell.children()? {
            if child.world_bounds(&self.world).intersects(target) {
                self.descend(child, target, out)?;
            }
        }
        Ok(())
    }

    /// The cell containing a point at the given depth.
    pub fn cell_at(&self, p: &Point3<f64>, depth: u8) -> Result<CellId> {
        if depth > self.max_depth {
            return Err(Error::DepthTooDeep(depth));
        }
        if !self.world.contains_point(p) {
            return Err(Error::OutsideWorld);
        }
        let cells = (1u64 << depth) as f64;
        let size = self.world.size() / cells;
        let clamp = |c: f64| (c.max(0.0) as u64).min((1u64 << depth) - 1) as u32;
        CellId::new(
            clamp(((p.x - self.world.min.x) / size.x).floor()),
            clamp(((p.y - self.world.min.y) / size.y).floor()),
            clamp(((p.z - self.world.min.z) / size.z).floor()),
            depth,
        )
    }

    /// Maps a world point onto the finest integer lattice, or `None` when
    /// outside the world box.
    pub fn lattice_point(&self, p: &Point3<f64>) -> Option<[i64; 3]> {
        if !self.world.contains_point(p) {
            return None;
        }
        let cells = (1u64 << COORD_BITS) as f64;
        let size = self.world.size() / cells;
        let clamp = |c: f64| (c.max(0.0) as i64).min((1i64 << COORD_BITS) - 1);
        Some([
            clamp(((p.x - self.world.min.x) / size.x).floor()),
            clamp(((p.y - self.world.min.y) / size.y).floor()),
            clamp(((p.z - self.world.min.z) / size.z).floor()),
        ])
    }
}
