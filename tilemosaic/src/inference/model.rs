//! In-process model described by a JSON model dictionary.

use std::path::Path;
use std::time::Duration;

use ndarray::{s, Array4};
use serde::{Deserialize, Serialize};

use super::InferenceBridge;
use crate::error::{MosaicError, Result};

/// Model dictionary.
///
/// ```json
/// {
///     "model_file": "test.hdf5",
///     "model_description": "Passthrough Model",
///     "model_version": "0.1",
///     "model_speed": 20
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub model_file: String,
    #[serde(default)]
    pub model_description: String,
    #[serde(default)]
    pub model_version: String,
    /// Seconds per super tile.
    pub model_speed: f64,
}

impl ModelDescriptor {
    /// Parses a model dictionary from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let descriptor: Self = serde_json::from_str(json)
            .map_err(|e| MosaicError::Config(format!("invalid model dictionary: {}", e)))?;
        if !descriptor.model_speed.is_finite() || descriptor.model_speed < 0.0 {
            return Err(MosaicError::Config(format!(
                "model_speed must be a non-negative number, got {}",
                descriptor.model_speed
            )));
        }
        Ok(descriptor)
    }

    /// Reads and parses a model dictionary file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Model that returns the first channel of each super tile.
///
/// Stands in for a real single-channel segmentation model.
#[derive(Debug, Clone)]
pub struct FirstBandModel {
    descriptor: ModelDescriptor,
}

impl FirstBandModel {
    /// Creates the model from its dictionary.
    pub fn new(descriptor: ModelDescriptor) -> Self {
        Self { descriptor }
    }

    /// Creates the model from a JSON model dictionary.
    pub fn from_json(json: &str) -> Result<Self> {
        ModelDescriptor::from_json(json).map(Self::new)
    }

    /// The model dictionary.
    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }
}

impl InferenceBridge for FirstBandModel {
    fn predict_batch(&self, batch: Array4<f32>) -> Result<Array4<f32>> {
        if batch.dim().1 == 0 {
            return Err(MosaicError::Inference(
                "input batch has no channels".to_string(),
            ));
        }
        Ok(batch.slice(s![.., 0..1, .., ..]).to_owned())
    }

    fn output_channels(&self) -> Option<usize> {
        Some(1)
    }

    fn estimate_time(&self, tiles: usize) -> Duration {
        Duration::from_secs_f64(self.descriptor.model_speed * tiles as f64)
    }

    fn name(&self) -> &str {
        if self.descriptor.model_description.is_empty() {
            &self.descriptor.model_file
        } else {
            &self.descriptor.model_description
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DICTIONARY: &str = r#"{
        "model_file": "test.hdf5",
        "model_description": "Passthrough Model",
        "model_version": "0.1",
        "model_speed": 20
    }"#;

    #[test]
    fn test_parse_dictionary() {
        let descriptor = ModelDescriptor::from_json(DICTIONARY).unwrap();
        assert_eq!(descriptor.model_file, "test.hdf5");
        assert_eq!(descriptor.model_version, "0.1");
        assert_eq!(descriptor.model_speed, 20.0);
    }

    #[test]
    fn test_invalid_dictionary() {
        assert!(ModelDescriptor::from_json("{}").is_err());
        assert!(ModelDescriptor::from_json(r#"{"model_file":"a","model_speed":-1}"#).is_err());
    }

    #[test]
    fn test_first_band_output() {
        let model = FirstBandModel::from_json(DICTIONARY).unwrap();
        let batch = Array4::from_shape_fn((2, 3, 8, 8), |(n, c, _, _)| (n * 10 + c) as f32);

        let out = model.predict_batch(batch).unwrap();
        assert_eq!(out.dim(), (2, 1, 8, 8));
        assert_eq!(out[[0, 0, 3, 3]], 0.0);
        assert_eq!(out[[1, 0, 3, 3]], 10.0);
        assert_eq!(model.output_channels(), Some(1));
    }

    #[test]
    fn test_estimate_time() {
        let model = FirstBandModel::from_json(DICTIONARY).unwrap();
        assert_eq!(model.estimate_time(3), Duration::from_secs(60));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, DICTIONARY).unwrap();
        let descriptor = ModelDescriptor::from_file(&path).unwrap();
        assert_eq!(descriptor.model_description, "Passthrough Model");
    }

    #[test]
    fn test_name_falls_back_to_model_file() {
        let described = FirstBandModel::from_json(DICTIONARY).unwrap();
        assert_eq!(described.name(), "Passthrough Model");
        assert_eq!(described.descriptor().model_version, "0.1");

        let bare = FirstBandModel::from_json(r#"{"model_file":"roads.onnx","model_speed":1}"#).unwrap();
        assert!(bare.descriptor().model_description.is_empty());
        assert_eq!(bare.name(), "roads.onnx");
    }
}
