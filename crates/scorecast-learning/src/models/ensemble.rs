//! Tree ensembles: bagged forests and gradient boosting.

use super::tree::{DecisionTree, TreeModel};
use super::{Estimator, Predictor, check_fit_input};
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scorecast_processing::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Average of trees grown on bootstrap samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub tree: DecisionTree,
    pub seed: u64,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            tree: DecisionTree::default(),
            seed: 42,
        }
    }
}

impl Estimator for RandomForest {
    type Fitted = ForestModel;

    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<ForestModel> {
        check_fit_input("Random Forest Regressor", x, y)?;
        if self.n_estimators == 0 {
            return Err(PipelineError::training(
                "Random Forest Regressor",
                "n_estimators must be at least 1",
            ));
        }
        self.tree.validate()?;

        let n = x.nrows();
        let y = y.to_vec();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let trees = (0..self.n_estimators)
            .map(|_| {
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                self.tree.grow(x, &y, rows)
            })
            .collect();

        debug!("Grew {} bootstrap trees", self.n_estimators);
        Ok(ForestModel {
            n_features: x.ncols(),
            trees,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    n_features: usize,
    trees: Vec<TreeModel>,
}

impl ForestModel {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Predictor for ForestModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / self.trees.len() as f64
    }
}

/// Least-squares gradient boosting: each shallow tree fits the current residuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub tree: DecisionTree,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            tree: DecisionTree::with_max_depth(3),
        }
    }
}

impl Estimator for GradientBoosting {
    type Fitted = BoostingModel;

    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<BoostingModel> {
        check_fit_input("Gradient Boosting", x, y)?;
        if !(self.learning_rate > 0.0) {
            return Err(PipelineError::training(
                "Gradient Boosting",
                "learning_rate must be positive",
            ));
        }
        self.tree.validate()?;

        let n = x.nrows();
        let init = y.sum() / n as f64;
        let mut current = vec![init; n];
        let mut trees = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&current).map(|(t, c)| t - c).collect();
            let tree = self.tree.grow(x, &residuals, (0..n).collect());
            for (i, row) in x.rows().into_iter().enumerate() {
                current[i] += self.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);
        }

        Ok(BoostingModel {
            n_features: x.ncols(),
            init,
            learning_rate: self.learning_rate,
            trees,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingModel {
    n_features: usize,
    init: f64,
    learning_rate: f64,
    trees: Vec<TreeModel>,
}

impl Predictor for BoostingModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.init
            + self.learning_rate * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }
}
