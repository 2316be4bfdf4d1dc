//! Result types returned by the trainer.
//!
//! - [`TrainingReport`]: complete result of [`ModelTrainer::train()`](crate::ModelTrainer::train)
//! - [`ModelComparison`]: scores of one evaluated candidate

use crate::metrics::RegressionMetrics;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TrainingReport {
    /// Name of the selected candidate.
    pub best_model_name: String,

    /// Test R² of the selected candidate. This is the pipeline's final score.
    pub test_score: f64,

    /// Test-set metrics of the selected candidate.
    pub metrics: RegressionMetrics,

    /// Every evaluated candidate, in declaration order.
    pub model_comparison: Vec<ModelComparison>,

    /// Where the selected model was persisted.
    pub model_path: PathBuf,

    /// Wall-clock time of the whole run.
    pub training_time_seconds: f64,
}

/// Comparison data for a single candidate.
///
/// # Overfitting Risk
///
/// Computed from the gap between train and test R²:
/// - `"low"`: gap < 5%
/// - `"medium"`: gap 5-15%
/// - `"high"`: gap > 15%, or either score undefined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ModelComparison {
    pub name: String,

    /// R² on the held-out test partition.
    pub test_score: f64,

    /// R² on the training partition.
    pub train_score: f64,

    /// Mean k-fold R² on the training partition.
    ///
    /// `None` when cross-validation is disabled, the partition is too small,
    /// or a fold produced an undefined score.
    pub cv_score: Option<f64>,

    /// Time taken to cross-validate, fit and score this candidate.
    pub training_time_seconds: f64,

    pub hyperparameters: serde_json::Value,

    /// `"low"`, `"medium"` or `"high"`.
    pub overfitting_risk: String,
}

impl ModelComparison {
    pub(crate) fn new(
        name: impl Into<String>,
        test_score: f64,
        train_score: f64,
        cv_score: Option<f64>,
        training_time_seconds: f64,
        hyperparameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            test_score,
            train_score,
            cv_score,
            training_time_seconds,
            hyperparameters,
            overfitting_risk: overfitting_risk(train_score, test_score).to_string(),
        }
    }
}

/// Label the train/test gap of a candidate.
pub fn overfitting_risk(train_score: f64, test_score: f64) -> &'static str {
    let gap = train_score - test_score;
    if gap.is_nan() {
        "high"
    } else if gap < 0.05 {
        "low"
    } else if gap <= 0.15 {
        "medium"
    } else {
        "high"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overfitting_risk_bands() {
        assert_eq!(overfitting_risk(0.90, 0.88), "low");
        assert_eq!(overfitting_risk(0.80, 0.85), "low");
        assert_eq!(overfitting_risk(0.90, 0.80), "medium");
        assert_eq!(overfitting_risk(1.0, 0.7), "high");
        assert_eq!(overfitting_risk(1.0, f64::NAN), "high");
    }

    #[test]
    fn test_comparison_serializes_missing_cv_as_null() {
        let comparison = ModelComparison::new(
            "Ridge",
            0.8,
            0.82,
            None,
            0.01,
            serde_json::json!({"alpha": 1.0}),
        );
        let json = serde_json::to_value(&comparison).unwrap();
        assert_eq!(json["cv_score"], serde_json::Value::Null);
        assert_eq!(json["overfitting_risk"], "low");
        assert_eq!(json["hyperparameters"]["alpha"], 1.0);
    }
}
