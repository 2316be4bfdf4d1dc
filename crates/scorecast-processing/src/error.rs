//! Error types shared by every stage of the training pipeline.
//!
//! All fallible operations return [`PipelineError`]. Stage boundaries wrap
//! the originating cause in [`PipelineError::StageFailure`], recording which
//! stage and operation failed and the source location of the call site.
//!
//! Errors are serializable so the CLI can emit them as JSON.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Ingestion,
    Transformation,
    Training,
    Prediction,
    Persistence,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingestion => "ingestion",
            Stage::Transformation => "transformation",
            Stage::Training => "training",
            Stage::Prediction => "prediction",
            Stage::Persistence => "persistence",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A source table is missing, unreadable, or does not match the declared schema.
    #[error("Failed to load '{source_name}': {reason}")]
    DataLoad { source_name: String, reason: String },

    /// Declared feature groups are inconsistent with the schema.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Fitting or applying the preprocessor failed.
    #[error("Failed to transform column '{column}': {reason}")]
    Transformation { column: String, reason: String },

    /// No candidate model reached the minimum acceptable score.
    #[error(
        "No acceptable model: best was {} with score {} (threshold {threshold})",
        .best_model.as_deref().unwrap_or("<none>"),
        .best_score.map(|s| format!("{s:.4}")).unwrap_or_else(|| "undefined".to_string())
    )]
    NoAcceptableModel {
        best_model: Option<String>,
        best_score: Option<f64>,
        threshold: f64,
    },

    /// A candidate model could not be fitted.
    #[error("Training failed for '{model}': {reason}")]
    Training { model: String, reason: String },

    /// An artifact file does not exist.
    #[error("Artifact not found: {path}")]
    ArtifactNotFound { path: String },

    /// An artifact exists but holds the wrong kind or an unsupported format.
    #[error("Invalid artifact '{path}': {reason}")]
    Artifact { path: String, reason: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Array shape mismatch.
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// A failure wrapped at a stage boundary.
    #[error("[{stage}] {operation} failed at {location}: {source}")]
    StageFailure {
        stage: Stage,
        operation: String,
        location: &'static Location<'static>,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Wrap this error with the stage and operation it surfaced from.
    ///
    /// The recorded location is the caller's.
    #[track_caller]
    pub fn in_stage(self, stage: Stage, operation: impl Into<String>) -> Self {
        self.at(stage, operation, Location::caller())
    }

    fn at(
        self,
        stage: Stage,
        operation: impl Into<String>,
        location: &'static Location<'static>,
    ) -> Self {
        PipelineError::StageFailure {
            stage,
            operation: operation.into(),
            location,
            source: Box::new(self),
        }
    }

    pub fn data_load(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::DataLoad {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn transformation(column: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Transformation {
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub fn training(model: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Training {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// The innermost error, skipping stage wrappers.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            Self::StageFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Get error code for callers that branch on failure kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DataLoad { .. } => "DATA_LOAD_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Transformation { .. } => "TRANSFORMATION_ERROR",
            Self::NoAcceptableModel { .. } => "NO_ACCEPTABLE_MODEL",
            Self::Training { .. } => "TRAINING_FAILED",
            Self::ArtifactNotFound { .. } => "ARTIFACT_NOT_FOUND",
            Self::Artifact { .. } => "INVALID_ARTIFACT",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Shape(_) => "SHAPE_ERROR",
            Self::StageFailure { source, .. } => source.error_code(),
        }
    }

    /// Stage of the outermost wrapper, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailure { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_data_load(&self) -> bool {
        matches!(self.root_cause(), Self::DataLoad { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self.root_cause(), Self::Configuration(_))
    }

    pub fn is_transformation(&self) -> bool {
        matches!(self.root_cause(), Self::Transformation { .. })
    }

    pub fn is_no_acceptable_model(&self) -> bool {
        matches!(self.root_cause(), Self::NoAcceptableModel { .. })
    }
}

/// Errors are serialized as a struct with `code`, `stage` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 3)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("stage", &self.stage())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for wrapping errors at a stage boundary.
pub trait ResultExt<T> {
    /// Wrap an error result with the stage and operation, recording the caller's location.
    fn stage(self, stage: Stage, operation: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<PipelineError>,
{
    #[track_caller]
    fn stage(self, stage: Stage, operation: impl Into<String>) -> Result<T> {
        let location = Location::caller();
        self.map_err(|e| e.into().at(stage, operation, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            PipelineError::Configuration("x".to_string()).error_code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(
            PipelineError::data_load("train.csv", "missing").error_code(),
            "DATA_LOAD_ERROR"
        );
    }

    #[test]
    fn test_in_stage_preserves_code_and_cause() {
        let error = PipelineError::transformation("gender", "unknown category 'other'")
            .in_stage(Stage::Transformation, "apply preprocessor to test features");

        assert_eq!(error.error_code(), "TRANSFORMATION_ERROR");
        assert!(error.is_transformation());
        assert_eq!(error.stage(), Some(Stage::Transformation));

        let message = error.to_string();
        assert!(message.contains("[transformation]"));
        assert!(message.contains("apply preprocessor to test features"));
        assert!(message.contains("gender"));
        assert!(message.contains(file!()));
    }

    #[test]
    fn test_stage_records_call_site() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        let line = line!() + 1;
        let error = result.stage(Stage::Ingestion, "read source").unwrap_err();

        match &error {
            PipelineError::StageFailure { location, .. } => {
                assert_eq!(location.file(), file!());
                assert_eq!(location.line(), line);
            }
            other => panic!("expected stage failure, got {other:?}"),
        }
        assert_eq!(error.error_code(), "IO_ERROR");
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let error = PipelineError::Configuration("bad".to_string())
            .in_stage(Stage::Transformation, "build preprocessor");
        let source = error.source().expect("wrapped cause");
        assert_eq!(source.to_string(), "Invalid configuration: bad");
    }

    #[test]
    fn test_no_acceptable_model_message() {
        let error = PipelineError::NoAcceptableModel {
            best_model: Some("Ridge".to_string()),
            best_score: Some(0.12345),
            threshold: 0.6,
        };
        let message = error.to_string();
        assert!(message.contains("Ridge"));
        assert!(message.contains("0.1235"));
        assert!(message.contains("0.6"));

        let undefined = PipelineError::NoAcceptableModel {
            best_model: None,
            best_score: None,
            threshold: 0.6,
        };
        assert!(undefined.to_string().contains("undefined"));
    }

    #[test]
    fn test_error_serialization() {
        let error = PipelineError::data_load("test.csv", "missing column 'math_score'")
            .in_stage(Stage::Transformation, "load test table");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("DATA_LOAD_ERROR"));
        assert!(json.contains("Transformation"));
        assert!(json.contains("math_score"));
    }
}
