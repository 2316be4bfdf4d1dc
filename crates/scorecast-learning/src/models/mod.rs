//! Regression model catalogue.
//!
//! Every model has an unfitted parameter type implementing [`Estimator`] and a
//! fitted type implementing [`Predictor`]. The trainer works with the closed
//! [`ModelSpec`] / [`FittedModel`] enums so fitted models of any family can be
//! compared, persisted and reloaded uniformly.

mod ensemble;
mod linear;
mod neighbors;
mod tree;

pub use ensemble::{BoostingModel, ForestModel, GradientBoosting, RandomForest};
pub use linear::{Lasso, LinearModel, LinearRegression, Ridge};
pub use neighbors::{KNeighbors, KNeighborsModel};
pub use tree::{DecisionTree, Node, TreeModel};

use ndarray::{Array1, ArrayView1, ArrayView2};
use scorecast_processing::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// An unfitted learning algorithm.
pub trait Estimator {
    type Fitted: Predictor;

    /// Fit on features `x` (one row per sample) and target `y`.
    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<Self::Fitted>;
}

/// A fitted model.
pub trait Predictor {
    /// Feature width the model was fitted on.
    fn n_features(&self) -> usize;

    fn predict_row(&self, row: ArrayView1<f64>) -> f64;

    /// Predict every row of `x`.
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features() {
            return Err(PipelineError::transformation(
                "features",
                format!(
                    "model expects {} features, got {}",
                    self.n_features(),
                    x.ncols()
                ),
            ));
        }
        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }
}

/// Reject inputs no estimator can fit.
pub(crate) fn check_fit_input(model: &str, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(PipelineError::training(model, "no training rows"));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::training(
            model,
            format!("{} feature rows but {} targets", x.nrows(), y.len()),
        ));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(PipelineError::training(model, "inputs contain non-finite values"));
    }
    Ok(())
}

/// Parameters of one catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelSpec {
    LinearRegression(LinearRegression),
    Ridge(Ridge),
    Lasso(Lasso),
    KNeighbors(KNeighbors),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl ModelSpec {
    /// Hyperparameters as a JSON object.
    pub fn hyperparameters(&self) -> serde_json::Value {
        let value = match self {
            ModelSpec::LinearRegression(m) => serde_json::to_value(m),
            ModelSpec::Ridge(m) => serde_json::to_value(m),
            ModelSpec::Lasso(m) => serde_json::to_value(m),
            ModelSpec::KNeighbors(m) => serde_json::to_value(m),
            ModelSpec::DecisionTree(m) => serde_json::to_value(m),
            ModelSpec::RandomForest(m) => serde_json::to_value(m),
            ModelSpec::GradientBoosting(m) => serde_json::to_value(m),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    pub fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<FittedModel> {
        Ok(match self {
            ModelSpec::LinearRegression(m) => FittedModel::Linear(m.fit(x, y)?),
            ModelSpec::Ridge(m) => FittedModel::Linear(m.fit(x, y)?),
            ModelSpec::Lasso(m) => FittedModel::Linear(m.fit(x, y)?),
            ModelSpec::KNeighbors(m) => FittedModel::KNeighbors(m.fit(x, y)?),
            ModelSpec::DecisionTree(m) => FittedModel::Tree(m.fit(x, y)?),
            ModelSpec::RandomForest(m) => FittedModel::Forest(m.fit(x, y)?),
            ModelSpec::GradientBoosting(m) => FittedModel::Boosting(m.fit(x, y)?),
        })
    }
}

/// A named catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub spec: ModelSpec,
}

impl Candidate {
    pub fn new(name: impl Into<String>, spec: ModelSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    /// The default catalogue, in declaration order.
    ///
    /// Order matters: when two candidates score the same, the earlier one wins.
    pub fn catalogue(seed: u64) -> Vec<Candidate> {
        vec![
            Candidate::new("Linear Regression", ModelSpec::LinearRegression(LinearRegression::default())),
            Candidate::new("Ridge", ModelSpec::Ridge(Ridge::default())),
            Candidate::new("Lasso", ModelSpec::Lasso(Lasso::default())),
            Candidate::new("K-Neighbors Regressor", ModelSpec::KNeighbors(KNeighbors::default())),
            Candidate::new("Decision Tree", ModelSpec::DecisionTree(DecisionTree::default())),
            Candidate::new(
                "Random Forest Regressor",
                ModelSpec::RandomForest(RandomForest {
                    seed,
                    ..RandomForest::default()
                }),
            ),
            Candidate::new(
                "Gradient Boosting",
                ModelSpec::GradientBoosting(GradientBoosting::default()),
            ),
        ]
    }

    /// Fit this candidate, tagging failures with its name.
    pub fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<FittedModel> {
        self.spec.fit(x, y).map_err(|e| match e {
            PipelineError::Training { reason, .. } => PipelineError::training(&self.name, reason),
            other => other,
        })
    }
}

/// Any fitted model from the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedModel {
    Linear(LinearModel),
    KNeighbors(KNeighborsModel),
    Tree(TreeModel),
    Forest(ForestModel),
    Boosting(BoostingModel),
}

impl Predictor for FittedModel {
    fn n_features(&self) -> usize {
        match self {
            FittedModel::Linear(m) => m.n_features(),
            FittedModel::KNeighbors(m) => m.n_features(),
            FittedModel::Tree(m) => m.n_features(),
            FittedModel::Forest(m) => m.n_features(),
            FittedModel::Boosting(m) => m.n_features(),
        }
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        match self {
            FittedModel::Linear(m) => m.predict_row(row),
            FittedModel::KNeighbors(m) => m.predict_row(row),
            FittedModel::Tree(m) => m.predict_row(row),
            FittedModel::Forest(m) => m.predict_row(row),
            FittedModel::Boosting(m) => m.predict_row(row),
        }
    }
}

static_assertions::assert_impl_all!(FittedModel: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y = x.rows().into_iter().map(|r| 3.0 * r[0] - 2.0 * r[1] + 5.0).collect();
        (x, y)
    }

    #[test]
    fn test_catalogue_names_are_unique_and_ordered() {
        let names: Vec<String> = Candidate::catalogue(42).into_iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![
                "Linear Regression",
                "Ridge",
                "Lasso",
                "K-Neighbors Regressor",
                "Decision Tree",
                "Random Forest Regressor",
                "Gradient Boosting",
            ]
        );
    }

    #[test]
    fn test_every_candidate_fits_and_predicts() {
        let (x, y) = linear_data();
        for candidate in Candidate::catalogue(42) {
            let fitted = candidate.fit(x.view(), y.view()).unwrap();
            let predictions = fitted.predict(x.view()).unwrap();
            assert_eq!(predictions.len(), 30, "{}", candidate.name);
            assert!(predictions.iter().all(|p| p.is_finite()), "{}", candidate.name);
        }
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let (x, y) = linear_data();
        let fitted = ModelSpec::LinearRegression(LinearRegression::default())
            .fit(x.view(), y.view())
            .unwrap();
        let err = fitted.predict(array![[1.0, 2.0, 3.0]].view()).unwrap_err();
        assert!(err.is_transformation());
    }

    #[test]
    fn test_fit_errors_carry_candidate_name() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        let candidate = Candidate::new("Custom Ridge", ModelSpec::Ridge(Ridge::default()));
        let err = candidate.fit(x.view(), y.view()).unwrap_err();
        assert!(err.to_string().contains("Custom Ridge"));
    }

    #[test]
    fn test_hyperparameters_are_json_objects() {
        let params = ModelSpec::Ridge(Ridge { alpha: 2.5 }).hyperparameters();
        assert_eq!(params["alpha"], 2.5);
    }
}
