// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence contract and in-memory reference store.
//!
//! The store is the only resource shared between element tasks, so the
//! contract requires implementations to isolate concurrent writes: a failed
//! put affects that record only, and buffered records become visible
//! atomically when a batch flushes. Partial batches are "not yet visible"
//! state, never corrupted state.

use std::sync::Mutex;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::model::ElementId;
use crate::records::{BoundaryPair, CellEntry, ElementMetrics, FaceRecord};
use shellform_index::CellId;

/// Typed upserts plus the queries needed by the boundary pass.
pub trait GeometryStore: Send + Sync {
    fn put_face(&self, record: FaceRecord) -> Result<()>;
    fn put_metrics(&self, metrics: ElementMetrics) -> Result<()>;
    fn put_cells(&self, entries: Vec<CellEntry>) -> Result<()>;
    fn put_boundary(&self, pair: BoundaryPair) -> Result<()>;

    /// Makes all buffered records visible.
    fn flush(&self) -> Result<()>;

    /// Flushed face records of one element, in face-id order.
    fn faces_of(&self, element: ElementId) -> Result<Vec<FaceRecord>>;

    /// Elements sharing at least one deepest-depth octree cell with the
    /// given element, sorted and deduplicated, excluding the element itself.
    ///
    /// Ancestor rows (up to the depth-0 root) are persisted for coarse
    /// queries but carry no adjacency information: every indexed element
    /// shares the root, so only leaf cells are compared.
    fn neighbors_of(&self, element: ElementId) -> Result<Vec<ElementId>>;
}

#[derive(Default)]
struct StoreInner {
    pending_faces: Vec<FaceRecord>,
    pending_metrics: Vec<ElementMetrics>,
    pending_cells: Vec<CellEntry>,
    pending_pairs: Vec<BoundaryPair>,
    faces: FxHashMap<ElementId, Vec<FaceRecord>>,
    metrics: FxHashMap<ElementId, ElementMetrics>,
    cell_members: FxHashMap<CellId, FxHashSet<ElementId>>,
    element_cells: FxHashMap<ElementId, Vec<CellEntry>>,
    pairs: Vec<BoundaryPair>,
}

impl StoreInner {
    fn pending_len(&self) -> usize {
        self.pending_faces.len()
            + self.pending_metrics.len()
            + self.pending_cells.len()
            + self.pending_pairs.len()
    }

    fn apply_pending(&mut self) {
        for record in self.pending_faces.drain(..) {
            self.faces.entry(record.element).or_default().push(record);
        }
        for metrics in self.pending_metrics.drain(..) {
            self.metrics.insert(metrics.element, metrics);
        }
        for entry in self.pending_cells.drain(..) {
            self.cell_members
                .entry(entry.cell)
                .or_default()
                .insert(entry.element);
            self.element_cells.entry(entry.element).or_default().push(entry);
        }
        self.pairs.extend(self.pending_pairs.drain(..));
        for faces in self.faces.values_mut() {
            faces.sort_by_key(|r| r.face_id);
        }
    }
}

/// Reference [`GeometryStore`] backed by hash maps.
///
/// Batches records until the flush threshold is reached, then applies the
/// whole batch at once. A configurable reject list simulates per-record
/// write failures in tests.
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
    flush_threshold: usize,
    rejected: FxHashSet<ElementId>,
}

impl MemoryStore {
    pub fn new(flush_threshold: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            flush_threshold: flush_threshold.max(1),
            rejected: FxHashSet::default(),
        }
    }

    /// A store that rejects every write for the given elements.
    pub fn rejecting(flush_threshold: usize, elements: &[ElementId]) -> Self {
        let mut store = Self::new(flush_threshold);
        store.rejected = elements.iter().copied().collect();
        store
    }

    /// All flushed boundary pairs.
    pub fn boundary_pairs(&self) -> Vec<BoundaryPair> {
        self.lock().pairs.clone()
    }

    /// Flushed metrics of one element.
    pub fn metrics_of(&self, element: ElementId) -> Option<ElementMetrics> {
        self.lock().metrics.get(&element).cloned()
    }

    /// Flushed spatial-index rows of one element.
    pub fn cells_of(&self, element: ElementId) -> Vec<CellEntry> {
        self.lock()
            .element_cells
            .get(&element)
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        // A poisoned mutex means a panicking writer; the data it guards is
        // append-only batches, still safe to read.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self, element: ElementId) -> Result<()> {
        if self.rejected.contains(&element) {
            return Err(Error::WriteRejected(format!(
                "element {element} rejected"
            )));
        }
        Ok(())
    }

    fn maybe_flush(&self, inner: &mut StoreInner) {
        if inner.pending_len() >= self.flush_threshold {
            inner.apply_pending();
        }
    }
}

impl GeometryStore for MemoryStore {
    fn put_face(&self, record: FaceRecord) -> Result<()> {
        self.check(record.element)?;
        let mut inner = self.lock();
        inner.pending_faces.push(record);
        self.maybe_flush(&mut inner);
        Ok(())
    }

    fn put_metrics(&self, metrics: ElementMetrics) -> Result<()> {
        self.check(metrics.element)?;
        let mut inner = self.lock();
        inner.pending_metrics.push(metrics);
        self.maybe_flush(&mut inner);
        Ok(())
    }

    fn put_cells(&self, entries: Vec<CellEntry>) -> Result<()> {
        if let Some(first) = entries.first() {
            self.check(first.element)?;
        }
        let mut inner = self.lock();
        inner.pending_cells.extend(entries);
        self.maybe_flush(&mut inner);
        Ok(())
    }

    fn put_boundary(&self, pair: BoundaryPair) -> Result<()> {
        self.check(pair.space)?;
        let mut inner = self.lock();
        inner.pending_pairs.push(pair);
        self.maybe_flush(&mut inner);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.lock().apply_pending();
        Ok(())
    }

    fn faces_of(&self, element: ElementId) -> Result<Vec<FaceRecord>> {
        Ok(self.lock().faces.get(&element).cloned().unwrap_or_default())
    }

    fn neighbors_of(&self, element: ElementId) -> Result<Vec<ElementId>> {
        let inner = self.lock();
        let entries = match inner.element_cells.get(&element) {
            Some(entries) => entries,
            None => return Ok(Vec::new()),
        };
        let leaf_depth = entries.iter().map(|e| e.depth).max().unwrap_or(0);
        let mut neighbors: Vec<ElementId> = entries
            .iter()
            .filter(|e| e.depth == leaf_depth)
            .filter_map(|entry| inner.cell_members.get(&entry.cell))
            .flatten()
            .copied()
            .filter(|&other| other != element)
            .collect();
        neighbors.sort();
        neighbors.dedup();
        Ok(neighbors)
    }
}
