//! Model selection and inference for the student score pipeline.
//!
//! This crate takes the arrays produced by `scorecast-processing`, evaluates
//! a catalogue of regression models, persists the best one and serves
//! predictions with the saved artifacts.
//!
//! # Features
//!
//! - **Model catalogue**: linear, regularized, neighbors, tree and ensemble
//!   regressors implemented over `ndarray`
//! - **Selection**: deterministic, first-declared-wins on ties, with a
//!   minimum acceptable R²
//! - **Cross-validation**: seeded k-fold scores reported per candidate
//! - **Prediction**: reload the preprocessor and model, transform, predict
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use scorecast_learning::{TrainerConfig, TrainingPipeline};
//! use scorecast_processing::PipelineConfig;
//!
//! let report = TrainingPipeline::builder()
//!     .config(PipelineConfig::builder().source("data/stud.csv").build()?)
//!     .trainer_config(TrainerConfig::default())
//!     .build()?
//!     .run()?;
//!
//! println!("Best model: {}", report.training.best_model_name);
//! println!("Test R²: {:.4}", report.score());
//! ```
//!
//! # Architecture
//!
//! ```text
//! DataIngestion ──► DataTransformation ──► ModelTrainer ──► TrainedModel
//!   train.csv         preprocessor.json                     model.json
//!   test.csv                                                    │
//!                                                               ▼
//!                                                      PredictionPipeline
//! ```
//!
//! # Errors
//!
//! Every operation returns [`scorecast_processing::PipelineError`]. When no
//! candidate reaches the threshold the run fails with
//! [`PipelineError::NoAcceptableModel`](scorecast_processing::PipelineError::NoAcceptableModel)
//! and no model file is written.

pub mod config;
mod linalg;
pub mod metrics;
pub mod model;
pub mod models;
pub mod pipeline;
pub mod predict;
pub mod trainer;
pub mod types;

// Re-exports for convenient access
pub use config::{DEFAULT_MIN_SCORE, SelectionMetric, TrainerConfig, TrainerConfigBuilder};
pub use metrics::RegressionMetrics;
pub use model::TrainedModel;
pub use models::{Candidate, Estimator, FittedModel, ModelSpec, Predictor};
pub use pipeline::{PipelineReport, TrainingPipeline, TrainingPipelineBuilder};
pub use predict::PredictionPipeline;
pub use trainer::ModelTrainer;
pub use types::{ModelComparison, TrainingReport};
