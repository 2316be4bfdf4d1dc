//! The persisted winner of a training run.
//!
//! A [`TrainedModel`] bundles the fitted model with the metadata needed to
//! use it safely later: the candidate name, the feature width it expects,
//! its test metrics and its hyperparameters.
//!
//! # Example
//!
//! ```rust,ignore
//! use scorecast_learning::TrainedModel;
//!
//! let model = TrainedModel::load("artifacts/model.json")?;
//! println!("{} expects {} features", model.name, model.feature_count);
//! let predictions = model.predict(features.view())?;
//! ```

use crate::metrics::RegressionMetrics;
use crate::models::{FittedModel, Predictor};
use ndarray::{Array1, ArrayView2};
use scorecast_processing::{ArtifactKind, PipelineError, Result, load_object, save_object};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub name: String,
    pub feature_count: usize,
    pub metrics: RegressionMetrics,
    pub hyperparameters: serde_json::Value,
    pub model: FittedModel,
}

impl TrainedModel {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_object(path, ArtifactKind::Model, self)
    }

    /// Load a model written by [`save()`](Self::save).
    ///
    /// # Errors
    ///
    /// - [`PipelineError::ArtifactNotFound`] if the file does not exist
    /// - [`PipelineError::Artifact`] if it holds another artifact kind, or
    ///   its recorded width disagrees with the fitted model
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let model: TrainedModel = load_object(path, ArtifactKind::Model)?;
        if model.feature_count != model.model.n_features() {
            return Err(PipelineError::Artifact {
                path: path.display().to_string(),
                reason: format!(
                    "declares {} features but the fitted model uses {}",
                    model.feature_count,
                    model.model.n_features()
                ),
            });
        }
        Ok(model)
    }

    /// Predict every row of a preprocessed feature array.
    pub fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.model.predict(features)
    }
}
