//! On-disk calibration cache.
//!
//! The cache stores detected correspondences, never a solved camera, so a
//! profile for any frame size can be re-solved without re-running detection.

use crate::calibrate::CalibrationCorrespondences;
use crate::error::CacheError;
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCache {
    pub pattern: [usize; 2],
    /// Identity of the calibration image set the points were detected in.
    pub image_set_key: String,
    pub object_points: Vec<Vec<[f64; 3]>>,
    pub image_points: Vec<Vec<[f32; 2]>>,
}

impl CalibrationCache {
    pub fn from_correspondences(corr: &CalibrationCorrespondences, image_set_key: impl Into<String>) -> Self {
        Self {
            pattern: corr.pattern,
            image_set_key: image_set_key.into(),
            object_points: corr
                .object_points
                .iter()
                .map(|view| view.iter().map(|p| [p.x, p.y, p.z]).collect())
                .collect(),
            image_points: corr
                .image_points
                .iter()
                .map(|view| view.iter().map(|p| [p.x, p.y]).collect())
                .collect(),
        }
    }

    pub fn to_correspondences(&self) -> CalibrationCorrespondences {
        CalibrationCorrespondences {
            pattern: self.pattern,
            object_points: self
                .object_points
                .iter()
                .map(|view| view.iter().map(|&[x, y, z]| Point3::new(x, y, z)).collect())
                .collect(),
            image_points: self
                .image_points
                .iter()
                .map(|view| view.iter().map(|&[x, y]| Point2::new(x, y)).collect())
                .collect(),
        }
    }

    /// Whether this cache was built for `pattern` from the image set `key`.
    pub fn matches(&self, pattern: [usize; 2], key: &str) -> bool {
        self.pattern == pattern && self.image_set_key == key
    }

    /// Load a cache record from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this cache record to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
