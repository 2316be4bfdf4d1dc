//! Model selection over the candidate catalogue.
//!
//! The trainer receives the arrays produced by the transformation stage
//! (features followed by the target in the last column), evaluates every
//! candidate in declaration order and picks the best one.
//! [`ModelTrainer::train`] also persists the winner;
//! [`ModelTrainer::select_model`] leaves persistence to the caller.
//!
//! # Selection
//!
//! Candidates are ranked by the configured [`SelectionMetric`]. Only finite
//! scores compete; a later candidate replaces the current best only when it
//! scores strictly higher, so ties go to the first declared candidate. The
//! winner must then reach `min_score` on the test partition, otherwise the
//! run fails with [`PipelineError::NoAcceptableModel`] and nothing is written.

use crate::config::{SelectionMetric, TrainerConfig};
use crate::metrics::{RegressionMetrics, r2_score};
use crate::model::TrainedModel;
use crate::models::{Candidate, FittedModel, Predictor};
use crate::types::{ModelComparison, TrainingReport};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use scorecast_processing::{PipelineError, Result, ResultExt, Stage};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Fits, compares and persists regression candidates.
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainerConfig,
    model_path: PathBuf,
}

/// A fitted candidate and its scores.
struct Evaluation {
    comparison: ModelComparison,
    metrics: RegressionMetrics,
    model: FittedModel,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig, model_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            model_path: model_path.into(),
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Train, select and persist; returns the winner's test R².
    pub fn run(&self, train: &Array2<f64>, test: &Array2<f64>) -> Result<f64> {
        Ok(self.train(train, test)?.test_score)
    }

    /// Train every candidate and persist the best one.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Configuration`] if the trainer config is invalid
    /// - [`PipelineError::Transformation`] if the arrays are malformed
    /// - [`PipelineError::Training`] if a candidate cannot be fitted
    /// - [`PipelineError::NoAcceptableModel`] if the winner misses `min_score`
    pub fn train(&self, train: &Array2<f64>, test: &Array2<f64>) -> Result<TrainingReport> {
        let (trained, report) = self.select_model(train, test)?;
        trained
            .save(&self.model_path)
            .stage(Stage::Persistence, "save model")?;
        info!("Saved model to {}", self.model_path.display());
        Ok(report)
    }

    /// Train every candidate and return the winner without writing it.
    ///
    /// The report's `model_path` is where [`train`](Self::train) would save
    /// the model. Fails with the same errors as `train`.
    pub fn select_model(
        &self,
        train: &Array2<f64>,
        test: &Array2<f64>,
    ) -> Result<(TrainedModel, TrainingReport)> {
        let start = Instant::now();
        self.config.validate()?;

        let (x_train, y_train) = split_xy(train, "train array").stage(Stage::Training, "check train array")?;
        let (x_test, y_test) = split_xy(test, "test array").stage(Stage::Training, "check test array")?;
        if x_train.ncols() != x_test.ncols() {
            return Err(PipelineError::transformation(
                "test array",
                format!(
                    "{} feature columns, train array has {}",
                    x_test.ncols(),
                    x_train.ncols()
                ),
            )
            .in_stage(Stage::Training, "check test array"));
        }

        info!(
            "Evaluating {} candidates on {} train rows and {} test rows ({} features)",
            self.config.candidates.len(),
            x_train.nrows(),
            x_test.nrows(),
            x_train.ncols()
        );

        let mut evaluations = Vec::with_capacity(self.config.candidates.len());
        for candidate in &self.config.candidates {
            let evaluation = self
                .evaluate(candidate, x_train, y_train, x_test, y_test)
                .stage(Stage::Training, format!("evaluate {}", candidate.name))?;
            evaluations.push(evaluation);
        }

        let winner = self
            .select(&evaluations)
            .map_err(|e| e.in_stage(Stage::Training, "select best model"))?;
        let model_comparison: Vec<ModelComparison> =
            evaluations.iter().map(|e| e.comparison.clone()).collect();
        let Evaluation {
            comparison,
            metrics,
            model,
        } = evaluations.swap_remove(winner);

        info!(
            "Selected {} with test R² {:.4}",
            comparison.name, metrics.r2
        );

        let trained = TrainedModel {
            name: comparison.name.clone(),
            feature_count: x_train.ncols(),
            metrics,
            hyperparameters: comparison.hyperparameters.clone(),
            model,
        };
        let report = TrainingReport {
            best_model_name: comparison.name,
            test_score: metrics.r2,
            metrics,
            model_comparison,
            model_path: self.model_path.clone(),
            training_time_seconds: start.elapsed().as_secs_f64(),
        };
        Ok((trained, report))
    }

    fn evaluate(
        &self,
        candidate: &Candidate,
        x_train: ArrayView2<f64>,
        y_train: ArrayView1<f64>,
        x_test: ArrayView2<f64>,
        y_test: ArrayView1<f64>,
    ) -> Result<Evaluation> {
        let start = Instant::now();

        let cv_score = if self.config.cross_validate {
            cross_val_score(
                candidate,
                x_train,
                y_train,
                self.config.cv_folds,
                self.config.random_seed,
            )?
        } else {
            None
        };

        let model = candidate.fit(x_train, y_train)?;
        let train_score = r2_score(y_train, model.predict(x_train)?.view());
        let metrics = RegressionMetrics::compute(y_test, model.predict(x_test)?.view());

        let comparison = ModelComparison::new(
            &candidate.name,
            metrics.r2,
            train_score,
            cv_score,
            start.elapsed().as_secs_f64(),
            candidate.spec.hyperparameters(),
        );
        debug!(
            "{}: test R² {:.4}, train R² {:.4}, cv R² {:?}, overfitting risk {}",
            comparison.name,
            comparison.test_score,
            comparison.train_score,
            comparison.cv_score,
            comparison.overfitting_risk
        );

        Ok(Evaluation {
            comparison,
            metrics,
            model,
        })
    }

    fn select(&self, evaluations: &[Evaluation]) -> Result<usize> {
        let scores: Vec<f64> = evaluations
            .iter()
            .map(|e| match self.config.selection {
                SelectionMetric::TestScore => e.comparison.test_score,
                SelectionMetric::CrossValidation => e.comparison.cv_score.unwrap_or(f64::NAN),
            })
            .collect();

        let Some(best) = select_best(&scores) else {
            return Err(PipelineError::NoAcceptableModel {
                best_model: None,
                best_score: None,
                threshold: self.config.min_score,
            });
        };

        let winner = &evaluations[best].comparison;
        if !winner.test_score.is_finite() || winner.test_score < self.config.min_score {
            return Err(PipelineError::NoAcceptableModel {
                best_model: Some(winner.name.clone()),
                best_score: Some(winner.test_score).filter(|s| s.is_finite()),
                threshold: self.config.min_score,
            });
        }
        Ok(best)
    }
}

/// Index of the highest finite score; the first one wins ties.
pub fn select_best(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if !score.is_finite() {
            continue;
        }
        if best.is_none_or(|(_, b)| score > b) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// Mean k-fold R² over a seeded shuffle of the rows.
///
/// Uses `min(folds, n)` folds. Returns `None` when there are fewer than two
/// rows or any fold's score is undefined.
pub fn cross_val_score(
    candidate: &Candidate,
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    folds: usize,
    seed: u64,
) -> Result<Option<f64>> {
    let n = x.nrows();
    if n < 2 || folds < 2 {
        return Ok(None);
    }
    let k = folds.min(n);

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut total = 0.0;
    let mut start = 0;
    for fold in 0..k {
        let size = n / k + usize::from(fold < n % k);
        let held = &order[start..start + size];
        let kept: Vec<usize> = order[..start]
            .iter()
            .chain(&order[start + size..])
            .copied()
            .collect();
        start += size;

        let model = candidate.fit(x.select(Axis(0), &kept).view(), y.select(Axis(0), &kept).view())?;
        let predictions = model.predict(x.select(Axis(0), held).view())?;
        let score = r2_score(y.select(Axis(0), held).view(), predictions.view());
        if !score.is_finite() {
            return Ok(None);
        }
        total += score;
    }

    Ok(Some(total / k as f64))
}

/// Split a transformed array into features and the target in its last column.
fn split_xy<'a>(array: &'a Array2<f64>, name: &str) -> Result<(ArrayView2<'a, f64>, ArrayView1<'a, f64>)> {
    let (rows, cols) = array.dim();
    if cols < 2 {
        return Err(PipelineError::transformation(
            name,
            format!("expected feature columns followed by the target, got {cols} column(s)"),
        ));
    }
    if rows == 0 {
        return Err(PipelineError::transformation(name, "no rows"));
    }
    if array.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::transformation(name, "contains non-finite values"));
    }
    Ok((array.slice(s![.., ..cols - 1]), array.column(cols - 1)))
}
