//! Data transformation stage.
//!
//! Loads the train and test partitions, fits the preprocessor on the training
//! features only, applies it to both partitions and appends the target as the
//! last column. [`DataTransformation::run`] persists the fitted preprocessor
//! after every in-memory step has succeeded; callers that must defer the write
//! use [`DataTransformation::transform_partitions`] and
//! [`DataTransformation::save_preprocessor`].

use crate::artifacts::{ArtifactKind, load_object, save_object};
use crate::config::{ArtifactConfig, PipelineConfig, SchemaConfig, UnknownCategoryPolicy};
use crate::error::{Result, ResultExt, Stage};
use crate::io::{load_table, split_target};
use crate::preprocessing::{FittedPipeline, PreprocessorBuilder};
use ndarray::{Array1, Array2, Axis, concatenate};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Arrays produced by the transformation stage.
///
/// Each array holds the preprocessed features followed by the target in its
/// last column, row-aligned with the source table.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformationOutput {
    pub train: Array2<f64>,
    pub test: Array2<f64>,
    pub preprocessor_path: PathBuf,
    pub feature_names: Vec<String>,
}

/// In-memory result of fitting and applying the preprocessor.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedFrames {
    pub preprocessor: FittedPipeline,
    pub train: Array2<f64>,
    pub test: Array2<f64>,
}

#[derive(Debug, Clone)]
pub struct DataTransformation {
    schema: SchemaConfig,
    unknown_categories: UnknownCategoryPolicy,
    preprocessor_path: PathBuf,
}

impl DataTransformation {
    pub fn new(
        schema: SchemaConfig,
        unknown_categories: UnknownCategoryPolicy,
        artifacts: &ArtifactConfig,
    ) -> Self {
        Self {
            schema,
            unknown_categories,
            preprocessor_path: artifacts.preprocessor_path(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.schema.clone(),
            config.unknown_categories,
            &config.artifacts,
        )
    }

    pub fn preprocessor_path(&self) -> &Path {
        &self.preprocessor_path
    }

    /// Run the stage on the partitions at `train_path` and `test_path`.
    pub fn run(&self, train_path: impl AsRef<Path>, test_path: impl AsRef<Path>) -> Result<TransformationOutput> {
        let frames = self.transform_partitions(train_path, test_path)?;
        self.save_preprocessor(&frames.preprocessor)?;

        Ok(TransformationOutput {
            feature_names: frames.preprocessor.feature_names(),
            train: frames.train,
            test: frames.test,
            preprocessor_path: self.preprocessor_path.clone(),
        })
    }

    /// Load both partitions and transform them; nothing is written.
    pub fn transform_partitions(
        &self,
        train_path: impl AsRef<Path>,
        test_path: impl AsRef<Path>,
    ) -> Result<TransformedFrames> {
        let train_df = load_table(train_path, &self.schema)
            .stage(Stage::Transformation, "load train table")?;
        let test_df = load_table(test_path, &self.schema)
            .stage(Stage::Transformation, "load test table")?;

        self.transform_frames(&train_df, &test_df)
    }

    /// Write a fitted preprocessor to the configured path.
    pub fn save_preprocessor(&self, preprocessor: &FittedPipeline) -> Result<()> {
        save_object(&self.preprocessor_path, ArtifactKind::Preprocessor, preprocessor)
            .stage(Stage::Persistence, "save preprocessor")?;
        info!("Saved preprocessor to {}", self.preprocessor_path.display());
        Ok(())
    }

    /// Fit on `train` and transform both tables without touching the filesystem.
    pub fn transform_frames(&self, train: &DataFrame, test: &DataFrame) -> Result<TransformedFrames> {
        let target = &self.schema.target_column;
        let (train_features, train_target) =
            split_target(train, target).stage(Stage::Transformation, "split train target")?;
        let (test_features, test_target) =
            split_target(test, target).stage(Stage::Transformation, "split test target")?;

        let pipeline = PreprocessorBuilder::new(&self.schema)
            .unknown_categories(self.unknown_categories)
            .build()
            .stage(Stage::Transformation, "build preprocessor")?;

        info!("Fitting preprocessor on training features");
        let (preprocessor, train_x) = pipeline
            .fit_transform(&train_features)
            .stage(Stage::Transformation, "fit preprocessor on train features")?;
        let test_x = preprocessor
            .transform(&test_features)
            .stage(Stage::Transformation, "apply preprocessor to test features")?;

        let train = append_target(train_x, train_target)
            .stage(Stage::Transformation, "append train target")?;
        let test = append_target(test_x, test_target)
            .stage(Stage::Transformation, "append test target")?;

        debug!(
            "Transformed arrays: train {:?}, test {:?}",
            train.dim(),
            test.dim()
        );

        Ok(TransformedFrames {
            preprocessor,
            train,
            test,
        })
    }
}

/// Reload a preprocessor written by [`DataTransformation::run`].
pub fn load_preprocessor(path: impl AsRef<Path>) -> Result<FittedPipeline> {
    load_object(path, ArtifactKind::Preprocessor)
}

fn append_target(features: Array2<f64>, target: Vec<f64>) -> Result<Array2<f64>> {
    let target = Array1::from(target).insert_axis(Axis(1));
    Ok(concatenate(Axis(1), &[features.view(), target.view()])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn schema() -> SchemaConfig {
        SchemaConfig::new(["reading_score"], ["gender"], "math_score")
    }

    fn stage(dir: &Path, policy: UnknownCategoryPolicy) -> DataTransformation {
        DataTransformation::new(schema(), policy, &ArtifactConfig::in_dir(dir))
    }

    fn train() -> DataFrame {
        df![
            "reading_score" => [72.0, 90.0, 47.0, 76.0],
            "gender" => ["female", "female", "male", "male"],
            "math_score" => [72i64, 69, 47, 76],
        ]
        .unwrap()
    }

    #[test]
    fn test_target_is_last_column() {
        let dir = tempfile::tempdir().unwrap();
        let frames = stage(dir.path(), UnknownCategoryPolicy::Error)
            .transform_frames(&train(), &train())
            .unwrap();

        assert_eq!(frames.train.ncols(), 1 + 2 + 1);
        assert_eq!(
            frames.train.column(3).to_vec(),
            vec![72.0, 69.0, 47.0, 76.0]
        );
    }

    #[test]
    fn test_missing_target_in_test_table() {
        let dir = tempfile::tempdir().unwrap();
        let test = train().drop("math_score").unwrap();
        let err = stage(dir.path(), UnknownCategoryPolicy::Error)
            .transform_frames(&train(), &test)
            .unwrap_err();
        assert!(err.is_data_load());
        assert_eq!(err.stage(), Some(Stage::Transformation));
    }

    #[test]
    fn test_failure_writes_no_preprocessor() {
        let dir = tempfile::tempdir().unwrap();
        let train_path = dir.path().join("train.csv");
        let test_path = dir.path().join("test.csv");
        std::fs::write(&train_path, "reading_score,gender,math_score\n72,female,72\n47,male,47\n").unwrap();
        std::fs::write(&test_path, "reading_score,gender,math_score\n80,other,80\n").unwrap();

        let stage = stage(dir.path(), UnknownCategoryPolicy::Error);
        let err = stage.run(&train_path, &test_path).unwrap_err();
        assert!(err.is_transformation());
        assert!(!stage.preprocessor_path().exists());
    }

    #[test]
    fn test_transform_partitions_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let train_path = dir.path().join("train.csv");
        std::fs::write(&train_path, "reading_score,gender,math_score\n72,female,72\n47,male,47\n").unwrap();

        let stage = stage(dir.path(), UnknownCategoryPolicy::Error);
        let frames = stage.transform_partitions(&train_path, &train_path).unwrap();
        assert_eq!(frames.train.dim(), (2, 4));
        assert!(!stage.preprocessor_path().exists());

        stage.save_preprocessor(&frames.preprocessor).unwrap();
        let reloaded = load_preprocessor(stage.preprocessor_path()).unwrap();
        assert_eq!(reloaded, frames.preprocessor);
    }

    #[test]
    fn test_missing_markers_are_imputed() {
        let dir = tempfile::tempdir().unwrap();
        let train_path = dir.path().join("train.csv");
        std::fs::write(
            &train_path,
            "reading_score,gender,math_score\n72,female,72\nNA,male,47\n90,NA,69\n47,female,50\n",
        )
        .unwrap();

        let frames = stage(dir.path(), UnknownCategoryPolicy::Error)
            .transform_partitions(&train_path, &train_path)
            .unwrap();

        assert_eq!(
            frames.preprocessor.feature_names(),
            vec!["reading_score", "gender_female", "gender_male"]
        );
        assert!(frames.train.iter().all(|v| v.is_finite()));
        // The missing gender takes the mode, so row 2 is encoded like "female"
        assert_eq!(frames.train.row(2)[1], frames.train.row(0)[1]);
        assert_eq!(frames.train.row(2)[2], frames.train.row(0)[2]);
    }

    #[test]
    fn test_run_persists_preprocessor() {
        let dir = tempfile::tempdir().unwrap();
        let train_path = dir.path().join("train.csv");
        std::fs::write(&train_path, "reading_score,gender,math_score\n72,female,72\n47,male,47\n").unwrap();

        let output = stage(dir.path(), UnknownCategoryPolicy::Error)
            .run(&train_path, &train_path)
            .unwrap();
        assert_eq!(output.feature_names, vec!["reading_score", "gender_female", "gender_male"]);

        let reloaded = load_preprocessor(&output.preprocessor_path).unwrap();
        assert_eq!(reloaded.n_features_out(), 3);
    }
}
