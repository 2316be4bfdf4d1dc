//! Inference with persisted artifacts.
//!
//! [`PredictionPipeline`] reloads the fitted preprocessor and the trained
//! model written by a training run and applies them, transform-only, to new
//! rows.

use crate::model::TrainedModel;
use polars::prelude::DataFrame;
use scorecast_processing::{FittedPipeline, PipelineError, Result, ResultExt, Stage, load_preprocessor};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PredictionPipeline {
    preprocessor: FittedPipeline,
    model: TrainedModel,
}

impl PredictionPipeline {
    /// Pair an in-memory preprocessor with a model.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Transformation`] if the preprocessor's output
    /// width differs from the width the model was trained on.
    pub fn new(preprocessor: FittedPipeline, model: TrainedModel) -> Result<Self> {
        if preprocessor.n_features_out() != model.feature_count {
            return Err(PipelineError::transformation(
                "features",
                format!(
                    "preprocessor produces {} features but model '{}' expects {}",
                    preprocessor.n_features_out(),
                    model.name,
                    model.feature_count
                ),
            ));
        }
        Ok(Self { preprocessor, model })
    }

    /// Reload both artifacts from disk.
    pub fn load(preprocessor_path: impl AsRef<Path>, model_path: impl AsRef<Path>) -> Result<Self> {
        let preprocessor = load_preprocessor(preprocessor_path).stage(Stage::Prediction, "load preprocessor")?;
        let model = TrainedModel::load(model_path).stage(Stage::Prediction, "load model")?;
        info!("Loaded {} ({} features)", model.name, model.feature_count);
        Self::new(preprocessor, model).stage(Stage::Prediction, "check artifact compatibility")
    }

    pub fn preprocessor(&self) -> &FittedPipeline {
        &self.preprocessor
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Predict the target for every row of `features`.
    ///
    /// Only the columns the preprocessor was fitted on are read, so a table
    /// that still carries the target column is accepted.
    pub fn predict(&self, features: &DataFrame) -> Result<Vec<f64>> {
        let x = self
            .preprocessor
            .transform(features)
            .stage(Stage::Prediction, "apply preprocessor")?;
        let predictions = self
            .model
            .predict(x.view())
            .stage(Stage::Prediction, "predict")?;
        debug!("Predicted {} rows", predictions.len());
        Ok(predictions.to_vec())
    }
}
