//! End-to-end training pipeline.
//!
//! [`TrainingPipeline`] chains the three stages of a run:
//!
//! 1. **Ingestion** - load the source table, write raw/train/test copies
//! 2. **Transformation** - fit the preprocessor on train, transform both partitions
//! 3. **Training** - evaluate the candidates and select the best model
//!
//! Each stage runs to completion before the next one starts. The preprocessor
//! and the model are persisted together after selection, so a failed run
//! writes neither. Ingestion writes its partitions eagerly.
//!
//! # Example
//!
//! ```rust,ignore
//! use scorecast_learning::{TrainerConfig, TrainingPipeline};
//! use scorecast_processing::PipelineConfig;
//!
//! let config = PipelineConfig::builder()
//!     .source("data/students.csv")
//!     .artifacts_dir("artifacts")
//!     .build()?;
//!
//! let report = TrainingPipeline::builder()
//!     .config(config)
//!     .trainer_config(TrainerConfig::builder().min_score(0.7).build()?)
//!     .build()?
//!     .run()?;
//!
//! println!("{}: R² {:.4}", report.training.best_model_name, report.training.test_score);
//! ```

use crate::config::TrainerConfig;
use crate::trainer::ModelTrainer;
use crate::types::TrainingReport;
use scorecast_processing::{
    DataIngestion, DataTransformation, IngestionOutput, PipelineConfig, Result, Stage,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Everything a pipeline run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct PipelineReport {
    /// `None` when the run started from existing partitions.
    pub ingestion: Option<IngestionOutput>,
    pub preprocessor_path: PathBuf,
    pub feature_names: Vec<String>,
    pub training: TrainingReport,
    pub total_time_seconds: f64,
}

impl PipelineReport {
    /// The final score of the run: the selected model's test R².
    pub fn score(&self) -> f64 {
        self.training.test_score
    }
}

#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: PipelineConfig,
    trainer_config: TrainerConfig,
}

impl TrainingPipeline {
    pub fn builder() -> TrainingPipelineBuilder {
        TrainingPipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn trainer_config(&self) -> &TrainerConfig {
        &self.trainer_config
    }

    /// Run ingestion, transformation and training.
    pub fn run(&self) -> Result<PipelineReport> {
        let start = Instant::now();
        info!("Starting training pipeline");

        let ingestion = DataIngestion::new(
            self.config.schema.clone(),
            self.config.ingestion.clone(),
            self.config.artifacts.clone(),
        )
        .run()?;

        let mut report = self.train_partitions(&ingestion.train_path, &ingestion.test_path)?;
        report.ingestion = Some(ingestion);
        report.total_time_seconds = start.elapsed().as_secs_f64();
        Ok(report)
    }

    /// Run transformation and training on partitions that already exist.
    ///
    /// The preprocessor and the model are written only once a model has been
    /// accepted, preprocessor first. If the model cannot be written the new
    /// preprocessor is removed again.
    pub fn train_partitions(&self, train_path: impl AsRef<Path>, test_path: impl AsRef<Path>) -> Result<PipelineReport> {
        let start = Instant::now();

        let transformation = DataTransformation::from_config(&self.config);
        let frames = transformation.transform_partitions(train_path, test_path)?;

        let trainer = ModelTrainer::new(self.trainer_config.clone(), self.config.artifacts.model_path());
        let (model, training) = trainer.select_model(&frames.train, &frames.test)?;

        transformation.save_preprocessor(&frames.preprocessor)?;
        if let Err(e) = model.save(trainer.model_path()) {
            if let Err(cleanup) = fs::remove_file(transformation.preprocessor_path()) {
                warn!("Could not remove preprocessor after failed model save: {cleanup}");
            }
            return Err(e.in_stage(Stage::Persistence, "save model"));
        }
        info!("Saved model to {}", trainer.model_path().display());

        info!(
            "Pipeline finished: {} with test R² {:.4}",
            training.best_model_name, training.test_score
        );

        Ok(PipelineReport {
            ingestion: None,
            preprocessor_path: transformation.preprocessor_path().to_path_buf(),
            feature_names: frames.preprocessor.feature_names(),
            training,
            total_time_seconds: start.elapsed().as_secs_f64(),
        })
    }
}

/// Builder for [`TrainingPipeline`].
#[derive(Debug, Default)]
pub struct TrainingPipelineBuilder {
    config: Option<PipelineConfig>,
    trainer_config: Option<TrainerConfig>,
}

impl TrainingPipelineBuilder {
    /// Set the data and artifact configuration (default: [`PipelineConfig::default()`]).
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the trainer configuration (default: [`TrainerConfig::default()`]).
    #[must_use]
    pub fn trainer_config(mut self, config: TrainerConfig) -> Self {
        self.trainer_config = Some(config);
        self
    }

    /// Build the pipeline, validating both configurations.
    pub fn build(self) -> Result<TrainingPipeline> {
        let config = self.config.unwrap_or_default();
        let trainer_config = self.trainer_config.unwrap_or_default();
        config.validate()?;
        trainer_config.validate()?;
        Ok(TrainingPipeline {
            config,
            trainer_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let pipeline = TrainingPipeline::builder().build().unwrap();
        assert_eq!(pipeline.config(), &PipelineConfig::default());
        assert_eq!(pipeline.trainer_config(), &TrainerConfig::default());
    }

    #[test]
    fn test_builder_rejects_invalid_trainer_config() {
        let trainer_config = TrainerConfig {
            cv_folds: 0,
            ..TrainerConfig::default()
        };
        let err = TrainingPipeline::builder()
            .trainer_config(trainer_config)
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
