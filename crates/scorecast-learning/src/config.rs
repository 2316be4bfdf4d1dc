//! Configuration for the model trainer.
//!
//! # Example
//!
//! ```
//! use scorecast_learning::{SelectionMetric, TrainerConfig};
//!
//! let config = TrainerConfig::builder()
//!     .min_score(0.7)
//!     .cv_folds(10)
//!     .selection(SelectionMetric::CrossValidation)
//!     .build()
//!     .expect("valid config");
//! ```

use crate::models::Candidate;
use scorecast_processing::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Minimum test R² a selected model must reach.
pub const DEFAULT_MIN_SCORE: f64 = 0.6;

/// Score that ranks candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMetric {
    /// R² on the held-out test partition.
    #[default]
    TestScore,
    /// Mean k-fold R² on the training partition.
    CrossValidation,
}

/// Configuration for [`ModelTrainer`](crate::ModelTrainer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Minimum test R² for the winner (default: 0.6).
    ///
    /// A winner scoring below this fails the run instead of being persisted.
    pub min_score: f64,

    /// Number of cross-validation folds (default: 5). Must be at least 2.
    pub cv_folds: usize,

    /// Whether to compute cross-validation scores (default: true).
    ///
    /// Required when `selection` is [`SelectionMetric::CrossValidation`].
    pub cross_validate: bool,

    /// Score used to pick the winner (default: test score).
    pub selection: SelectionMetric,

    /// Seed for fold assignment and seeded models (default: 42).
    pub random_seed: u64,

    /// Candidates in declaration order; earlier entries win ties.
    pub candidates: Vec<Candidate>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            cv_folds: 5,
            cross_validate: true,
            selection: SelectionMetric::default(),
            random_seed: 42,
            candidates: Candidate::catalogue(42),
        }
    }
}

impl TrainerConfig {
    #[must_use]
    pub fn builder() -> TrainerConfigBuilder {
        TrainerConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_score.is_finite() {
            return Err(PipelineError::Configuration(
                "min_score must be a finite number".to_string(),
            ));
        }

        if self.cv_folds < 2 {
            return Err(PipelineError::Configuration(
                "cv_folds must be at least 2".to_string(),
            ));
        }

        if self.selection == SelectionMetric::CrossValidation && !self.cross_validate {
            return Err(PipelineError::Configuration(
                "cross-validation selection requires cross_validate".to_string(),
            ));
        }

        if self.candidates.is_empty() {
            return Err(PipelineError::Configuration(
                "at least one candidate model is required".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for candidate in &self.candidates {
            if !names.insert(candidate.name.as_str()) {
                return Err(PipelineError::Configuration(format!(
                    "candidate '{}' is declared more than once",
                    candidate.name
                )));
            }
        }

        Ok(())
    }
}

/// Builder for [`TrainerConfig`].
#[derive(Debug, Clone, Default)]
pub struct TrainerConfigBuilder {
    config: TrainerConfig,
    candidates: Option<Vec<Candidate>>,
}

impl TrainerConfigBuilder {
    /// Set the minimum acceptable test R² (default: 0.6).
    #[must_use]
    pub fn min_score(mut self, score: f64) -> Self {
        self.config.min_score = score;
        self
    }

    /// Set the number of cross-validation folds (default: 5).
    ///
    /// [`build()`](Self::build) returns an error if `folds < 2`.
    #[must_use]
    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    /// Enable or disable cross-validation (default: true).
    #[must_use]
    pub fn cross_validate(mut self, enabled: bool) -> Self {
        self.config.cross_validate = enabled;
        self
    }

    #[must_use]
    pub fn selection(mut self, metric: SelectionMetric) -> Self {
        self.config.selection = metric;
        self
    }

    /// Set the random seed (default: 42).
    ///
    /// Also seeds the default catalogue's random forest.
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Replace the default catalogue.
    #[must_use]
    pub fn candidates(mut self, candidates: Vec<Candidate>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] if:
    /// - `min_score` is not finite
    /// - `cv_folds` is less than 2
    /// - cross-validation selection is requested with cross-validation disabled
    /// - the candidate list is empty or repeats a name
    pub fn build(self) -> Result<TrainerConfig> {
        let mut config = self.config;
        config.candidates = self
            .candidates
            .unwrap_or_else(|| Candidate::catalogue(config.random_seed));
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelSpec, RandomForest, Ridge};

    #[test]
    fn test_default_config() {
        let config = TrainerConfig::builder().build().unwrap();
        assert_eq!(config.min_score, 0.6);
        assert_eq!(config.cv_folds, 5);
        assert!(config.cross_validate);
        assert_eq!(config.selection, SelectionMetric::TestScore);
        assert_eq!(config.candidates.len(), 7);
        assert_eq!(config, TrainerConfig::default());
    }

    #[test]
    fn test_seed_reaches_forest() {
        let config = TrainerConfig::builder().random_seed(9).build().unwrap();
        let forest = config
            .candidates
            .iter()
            .find_map(|c| match &c.spec {
                ModelSpec::RandomForest(f) => Some(f.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            forest,
            RandomForest {
                seed: 9,
                ..RandomForest::default()
            }
        );
    }

    #[test]
    fn test_invalid_cv_folds() {
        let err = TrainerConfig::builder().cv_folds(1).build().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("cv_folds"));
    }

    #[test]
    fn test_cv_selection_needs_cv() {
        let result = TrainerConfig::builder()
            .selection(SelectionMetric::CrossValidation)
            .cross_validate(false)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_and_duplicate_candidates() {
        assert!(TrainerConfig::builder().candidates(vec![]).build().is_err());

        let ridge = Candidate::new("Ridge", ModelSpec::Ridge(Ridge::default()));
        let err = TrainerConfig::builder()
            .candidates(vec![ridge.clone(), ridge])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_non_finite_min_score() {
        assert!(TrainerConfig::builder().min_score(f64::NAN).build().is_err());
    }
}
