// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::ElementCategory;
use shellform_geometry::{Aabb, Tolerance};
use shellform_index::MAX_DEPTH;

/// Which pipeline phases to run. Thin-driver concern kept as configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseSet {
    pub consolidation: bool,
    pub spatial_index: bool,
    pub boundaries: bool,
}

impl Default for PhaseSet {
    fn default() -> Self {
        Self {
            consolidation: true,
            spatial_index: true,
            boundaries: true,
        }
    }
}

/// Full pipeline configuration, deserializable from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tolerance: Tolerance,
    pub world_min: [f64; 3],
    pub world_max: [f64; 3],
    pub max_depth: u8,
    /// Store batch size before records become visible.
    pub flush_threshold: usize,
    /// Maximum in-flight element tasks before submission waits.
    pub submission_window: usize,
    pub phases: PhaseSet,
    /// Categories eligible to bound a space.
    pub boundary_categories: Vec<ElementCategory>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            world_min: [-1000.0; 3],
            world_max: [1000.0; 3],
            max_depth: 8,
            flush_threshold: 256,
            submission_window: 32,
            phases: PhaseSet::default(),
            boundary_categories: vec![
                ElementCategory::Wall,
                ElementCategory::Slab,
                ElementCategory::Roof,
                ElementCategory::Column,
                ElementCategory::Door,
                ElementCategory::Window,
            ],
        }
    }
}

impl PipelineConfig {
    /// Parses a configuration from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The configured world bounding box.
    pub fn world(&self) -> Aabb {
        Aabb::new(
            Point3::new(self.world_min[0], self.world_min[1], self.world_min[2]),
            Point3::new(self.world_max[0], self.world_max[1], self.world_max[2]),
        )
    }

    pub fn validate(&self) -> Result<()> {
        let world = self.world();
        if !world.is_valid() || world.size().iter().any(|&s| s <= 0.0) {
            return Err(Error::Config(
                "world bounding box must be finite with min < max".into(),
            ));
        }
        if self.max_depth > MAX_DEPTH {
            return Err(Error::Config(format!(
                "max_depth {} exceeds supported maximum {MAX_DEPTH}",
                self.max_depth
            )));
        }
        if self.submission_window == 0 {
            return Err(Error::Config("submission_window must be at least 1".into()));
        }
        if self.tolerance.eps <= 0.0 {
            return Err(Error::Config("tolerance eps must be positive".into()));
        }
        Ok(())
    }
}
