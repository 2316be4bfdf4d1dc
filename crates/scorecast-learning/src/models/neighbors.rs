use super::{Estimator, Predictor, check_fit_input};
use ndarray::{ArrayView1, ArrayView2};
use scorecast_processing::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// k-nearest-neighbors regression with uniform weights and Euclidean distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNeighbors {
    pub n_neighbors: usize,
}

impl Default for KNeighbors {
    fn default() -> Self {
        Self { n_neighbors: 5 }
    }
}

impl Estimator for KNeighbors {
    type Fitted = KNeighborsModel;

    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<KNeighborsModel> {
        check_fit_input("K-Neighbors Regressor", x, y)?;
        if self.n_neighbors == 0 {
            return Err(PipelineError::training(
                "K-Neighbors Regressor",
                "n_neighbors must be at least 1",
            ));
        }

        Ok(KNeighborsModel {
            n_neighbors: self.n_neighbors.min(x.nrows()),
            n_features: x.ncols(),
            points: x.rows().into_iter().map(|r| r.to_vec()).collect(),
            targets: y.to_vec(),
        })
    }
}

/// Stored training set of a k-NN regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNeighborsModel {
    n_neighbors: usize,
    n_features: usize,
    points: Vec<Vec<f64>>,
    targets: Vec<f64>,
}

impl Predictor for KNeighborsModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut distances: Vec<(f64, usize)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let d: f64 = point.iter().zip(row.iter()).map(|(a, b)| (a - b).powi(2)).sum();
                (d, i)
            })
            .collect();
        // Equal distances keep training order
        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let k = self.n_neighbors.max(1);
        distances
            .iter()
            .take(k)
            .map(|&(_, i)| self.targets[i])
            .sum::<f64>()
            / k as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_average_of_nearest() {
        let x = array![[0.0], [1.0], [2.0], [10.0], [11.0]];
        let y = array![0.0, 1.0, 2.0, 10.0, 11.0];
        let model = KNeighbors { n_neighbors: 2 }.fit(x.view(), y.view()).unwrap();
        assert_eq!(model.predict_row(array![10.4].view()), 10.5);
        assert_eq!(model.predict_row(array![0.2].view()), 0.5);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let x = array![[0.0], [2.0]];
        let y = array![1.0, 3.0];
        let model = KNeighbors::default().fit(x.view(), y.view()).unwrap();
        assert_eq!(model.predict_row(array![100.0].view()), 2.0);
    }

    #[test]
    fn test_zero_neighbors_rejected() {
        let x = array![[0.0]];
        let y = array![1.0];
        assert!(KNeighbors { n_neighbors: 0 }.fit(x.view(), y.view()).is_err());
    }
}
