//! Configuration types for the training pipeline.
//!
//! The table schema is declared here, never inferred from data. Configuration
//! is validated when it is built; a schema that names the same column twice or
//! leaves a declared column without a feature group is rejected before any
//! data is read.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Numeric feature columns of the student performance dataset.
pub const DEFAULT_NUMERIC_COLUMNS: [&str; 2] = ["reading_score", "writing_score"];

/// Categorical feature columns of the student performance dataset.
pub const DEFAULT_CATEGORICAL_COLUMNS: [&str; 5] = [
    "gender",
    "race_ethnicity",
    "parental_level_of_education",
    "lunch",
    "test_preparation_course",
];

/// Target column of the student performance dataset.
pub const DEFAULT_TARGET_COLUMN: &str = "math_score";

/// How the one-hot encoder treats a category that was not seen during fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UnknownCategoryPolicy {
    /// Fail with a transformation error
    #[default]
    Error,
    /// Encode the value as all-zero indicators
    Ignore,
}

/// Declared schema of the raw tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Every column the raw tables must contain, in file order.
    pub columns: Vec<String>,

    /// Continuous feature columns (median imputation, standardization).
    pub numeric_columns: Vec<String>,

    /// Nominal feature columns (mode imputation, one-hot, unit-variance scaling).
    pub categorical_columns: Vec<String>,

    /// Column holding the regression target.
    pub target_column: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        let numeric_columns: Vec<String> =
            DEFAULT_NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect();
        let categorical_columns: Vec<String> = DEFAULT_CATEGORICAL_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();

        // File order of the source dataset
        let mut columns = categorical_columns.clone();
        columns.push(DEFAULT_TARGET_COLUMN.to_string());
        columns.extend(numeric_columns.iter().cloned());

        Self {
            columns,
            numeric_columns,
            categorical_columns,
            target_column: DEFAULT_TARGET_COLUMN.to_string(),
        }
    }
}

impl SchemaConfig {
    /// Build a schema whose declared columns are exactly the groups plus the target.
    pub fn new(
        numeric_columns: impl IntoIterator<Item = impl Into<String>>,
        categorical_columns: impl IntoIterator<Item = impl Into<String>>,
        target_column: impl Into<String>,
    ) -> Self {
        let numeric_columns: Vec<String> = numeric_columns.into_iter().map(Into::into).collect();
        let categorical_columns: Vec<String> =
            categorical_columns.into_iter().map(Into::into).collect();
        let target_column = target_column.into();

        let mut columns = numeric_columns.clone();
        columns.extend(categorical_columns.iter().cloned());
        columns.push(target_column.clone());

        Self {
            columns,
            numeric_columns,
            categorical_columns,
            target_column,
        }
    }

    /// Feature columns in group order: numeric first, then categorical.
    pub fn feature_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .map(String::as_str)
    }

    /// Check that the feature groups and the target partition the declared columns.
    pub fn validate(&self) -> Result<()> {
        let mut declared = HashSet::new();
        for column in &self.columns {
            if column.is_empty() {
                return Err(PipelineError::Configuration(
                    "declared column names must not be empty".to_string(),
                ));
            }
            if !declared.insert(column.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "column '{column}' is declared more than once"
                )));
            }
        }

        if self.numeric_columns.is_empty() && self.categorical_columns.is_empty() {
            return Err(PipelineError::Configuration(
                "at least one feature column is required".to_string(),
            ));
        }

        if !declared.contains(self.target_column.as_str()) {
            return Err(PipelineError::Configuration(format!(
                "target column '{}' is not in the declared schema",
                self.target_column
            )));
        }

        let mut grouped = HashSet::new();
        let groups = [
            ("numeric", &self.numeric_columns),
            ("categorical", &self.categorical_columns),
        ];
        for (group, columns) in groups {
            for column in columns {
                if !declared.contains(column.as_str()) {
                    return Err(PipelineError::Configuration(format!(
                        "{group} column '{column}' is not in the declared schema"
                    )));
                }
                if *column == self.target_column {
                    return Err(PipelineError::Configuration(format!(
                        "target column '{column}' cannot also be a {group} feature"
                    )));
                }
                if !grouped.insert(column.as_str()) {
                    return Err(PipelineError::Configuration(format!(
                        "column '{column}' belongs to more than one feature group"
                    )));
                }
            }
        }

        if let Some(orphan) = self
            .columns
            .iter()
            .find(|c| **c != self.target_column && !grouped.contains(c.as_str()))
        {
            return Err(PipelineError::Configuration(format!(
                "declared column '{orphan}' is neither a feature nor the target"
            )));
        }

        Ok(())
    }
}

/// Locations of the files written to the artifacts directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Directory holding every artifact of a run.
    /// Default: "artifacts"
    pub dir: PathBuf,

    /// Fitted preprocessor file name.
    pub preprocessor_file: String,

    /// Trained model file name.
    pub model_file: String,

    /// Training partition written by ingestion.
    pub train_file: String,

    /// Test partition written by ingestion.
    pub test_file: String,

    /// Raw copy of the source table written by ingestion.
    pub raw_file: String,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            preprocessor_file: "preprocessor.json".to_string(),
            model_file: "model.json".to_string(),
            train_file: "train.csv".to_string(),
            test_file: "test.csv".to_string(),
            raw_file: "data.csv".to_string(),
        }
    }
}

impl ArtifactConfig {
    /// Artifact layout rooted at `dir` with default file names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn preprocessor_path(&self) -> PathBuf {
        self.dir.join(&self.preprocessor_file)
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    pub fn train_path(&self) -> PathBuf {
        self.dir.join(&self.train_file)
    }

    pub fn test_path(&self) -> PathBuf {
        self.dir.join(&self.test_file)
    }

    pub fn raw_path(&self) -> PathBuf {
        self.dir.join(&self.raw_file)
    }
}

/// Settings for splitting the source table into train and test partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Source CSV file.
    /// Default: "notebook/data/stud.csv"
    pub source: PathBuf,

    /// Fraction of rows held out for testing, in (0.0, 1.0).
    /// Default: 0.2
    pub test_size: f64,

    /// Seed for the row shuffle.
    /// Default: 42
    pub random_seed: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("notebook/data/stud.csv"),
            test_size: 0.2,
            random_seed: 42,
        }
    }
}

/// Configuration for the processing side of the pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a validated configuration.
///
/// # Example
///
/// ```rust,ignore
/// use scorecast_processing::config::{PipelineConfig, UnknownCategoryPolicy};
///
/// let config = PipelineConfig::builder()
///     .artifacts_dir("runs/latest")
///     .unknown_categories(UnknownCategoryPolicy::Ignore)
///     .test_size(0.25)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    pub schema: SchemaConfig,

    /// Policy for categories unseen during fit.
    /// Default: Error
    #[serde(default)]
    pub unknown_categories: UnknownCategoryPolicy,

    #[serde(default)]
    pub artifacts: ArtifactConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Read and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("cannot read '{}': {e}", path.display()))
        })?;
        let config: PipelineConfig = serde_json::from_str(&content).map_err(|e| {
            PipelineError::Configuration(format!("cannot parse '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;

        let test_size = self.ingestion.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(PipelineError::Configuration(format!(
                "test_size must be between 0.0 and 1.0 (exclusive), got {test_size}"
            )));
        }

        let names = [
            &self.artifacts.preprocessor_file,
            &self.artifacts.model_file,
            &self.artifacts.train_file,
            &self.artifacts.test_file,
            &self.artifacts.raw_file,
        ];
        let mut seen = HashSet::new();
        for name in names {
            if name.is_empty() {
                return Err(PipelineError::Configuration(
                    "artifact file names must not be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "artifact file name '{name}' is used twice"
                )));
            }
        }

        Ok(())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    schema: Option<SchemaConfig>,
    unknown_categories: Option<UnknownCategoryPolicy>,
    artifacts_dir: Option<PathBuf>,
    source: Option<PathBuf>,
    test_size: Option<f64>,
    random_seed: Option<u64>,
}

impl PipelineConfigBuilder {
    /// Set the declared table schema.
    pub fn schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Set the policy for categories unseen during fit.
    pub fn unknown_categories(mut self, policy: UnknownCategoryPolicy) -> Self {
        self.unknown_categories = Some(policy);
        self
    }

    /// Set the artifacts directory.
    pub fn artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(dir.into());
        self
    }

    /// Set the source CSV consumed by ingestion.
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Set the held-out fraction.
    ///
    /// # Arguments
    /// * `size` - Value strictly between 0.0 and 1.0 (e.g., 0.2 = 20%)
    pub fn test_size(mut self, size: f64) -> Self {
        self.test_size = Some(size);
        self
    }

    /// Set the seed for the train/test shuffle.
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or a configuration error.
    pub fn build(self) -> Result<PipelineConfig> {
        let defaults = IngestionConfig::default();
        let config = PipelineConfig {
            schema: self.schema.unwrap_or_default(),
            unknown_categories: self.unknown_categories.unwrap_or_default(),
            artifacts: self
                .artifacts_dir
                .map(ArtifactConfig::in_dir)
                .unwrap_or_default(),
            ingestion: IngestionConfig {
                source: self.source.unwrap_or(defaults.source),
                test_size: self.test_size.unwrap_or(defaults.test_size),
                random_seed: self.random_seed.unwrap_or(defaults.random_seed),
            },
        };

        config.validate()?;
        Ok(config)
    }
}
