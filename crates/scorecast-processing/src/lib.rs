//! Data processing for the student score pipeline.
//!
//! # Overview
//!
//! This crate covers everything between a raw CSV and model-ready arrays:
//!
//! - **Configuration**: declared table schema, artifact layout, split settings
//! - **Ingestion**: seeded train/test split of the source table
//! - **Preprocessing**: per-group imputation, one-hot encoding and scaling,
//!   fitted once on training data and applied unchanged everywhere else
//! - **Transformation stage**: fit on train, apply to train and test, append
//!   the target, persist the fitted preprocessor
//! - **Artifacts**: atomic JSON persistence of fitted objects
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use scorecast_processing::{DataTransformation, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .artifacts_dir("artifacts")
//!     .build()?;
//!
//! let output = DataTransformation::from_config(&config)
//!     .run("artifacts/train.csv", "artifacts/test.csv")?;
//!
//! println!("train array: {:?}", output.train.dim());
//! println!("preprocessor saved to {}", output.preprocessor_path.display());
//! ```
//!
//! # Errors
//!
//! Every operation returns [`PipelineError`]. Stage boundaries wrap the
//! originating cause with the stage, the operation and the call site:
//!
//! ```rust,ignore
//! match DataTransformation::from_config(&config).run(train, test) {
//!     Ok(output) => println!("{} features", output.feature_names.len()),
//!     Err(e) if e.is_transformation() => eprintln!("bad data: {e}"),
//!     Err(e) => eprintln!("[{}] {e}", e.error_code()),
//! }
//! ```

pub mod artifacts;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod io;
pub mod preprocessing;
pub mod transformation;
pub mod utils;

// Re-exports for convenient access
pub use artifacts::{ArtifactKind, ArtifactStore, FORMAT_VERSION, load_object, save_object};
pub use config::{
    ArtifactConfig, IngestionConfig, PipelineConfig, PipelineConfigBuilder, SchemaConfig,
    UnknownCategoryPolicy,
};
pub use error::{PipelineError, Result, ResultExt, Stage};
pub use ingestion::{DataIngestion, IngestionOutput};
pub use io::{load_features, load_table, split_target, write_table};
pub use preprocessing::{
    FeatureGroup, FittedPipeline, ImputeStrategy, PreprocessorBuilder, TransformStep,
    UnfittedPipeline,
};
pub use transformation::{DataTransformation, TransformationOutput, TransformedFrames, load_preprocessor};
