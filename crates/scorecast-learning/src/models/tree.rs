//! CART regression trees.

use super::{Estimator, Predictor, check_fit_input};
use ndarray::{ArrayView1, ArrayView2};
use scorecast_processing::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Regression tree grown greedily on squared error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl DecisionTree {
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth),
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.min_samples_split < 2 {
            return Err(PipelineError::training(
                "Decision Tree",
                "min_samples_split must be at least 2",
            ));
        }
        if self.min_samples_leaf < 1 {
            return Err(PipelineError::training(
                "Decision Tree",
                "min_samples_leaf must be at least 1",
            ));
        }
        Ok(())
    }

    /// Grow a tree on the rows listed in `rows`; duplicates act as sample weights.
    pub(crate) fn grow(&self, x: ArrayView2<f64>, y: &[f64], rows: Vec<usize>) -> TreeModel {
        let mut grower = Grower {
            x,
            y,
            params: self,
            nodes: Vec::new(),
        };
        grower.build(rows, 0);
        TreeModel {
            n_features: x.ncols(),
            nodes: grower.nodes,
        }
    }
}

impl Estimator for DecisionTree {
    type Fitted = TreeModel;

    fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<TreeModel> {
        check_fit_input("Decision Tree", x, y)?;
        self.validate()?;
        let y = y.to_vec();
        Ok(self.grow(x, &y, (0..x.nrows()).collect()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree stored as a flat node array; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeModel {
    n_features: usize,
    nodes: Vec<Node>,
}

impl TreeModel {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], at: usize) -> usize {
            match nodes.get(at) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

impl Predictor for TreeModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut at = 0;
        loop {
            match self.nodes.get(at) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    at = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return f64::NAN,
            }
        }
    }
}

struct Grower<'a, 'x> {
    x: ArrayView2<'x, f64>,
    y: &'a [f64],
    params: &'a DecisionTree,
    nodes: Vec<Node>,
}

struct Split {
    feature: usize,
    threshold: f64,
}

impl Grower<'_, '_> {
    fn build(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        let value = rows.iter().map(|&i| self.y[i]).sum::<f64>() / rows.len() as f64;
        self.nodes.push(Node::Leaf { value });

        let at_max_depth = self.params.max_depth.is_some_and(|d| depth >= d);
        if at_max_depth
            || rows.len() < self.params.min_samples_split
            || rows.len() < 2 * self.params.min_samples_leaf
            || self.is_pure(&rows)
        {
            return id;
        }

        let Some(split) = self.best_split(&rows) else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| self.x[[i, split.feature]] <= split.threshold);

        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn is_pure(&self, rows: &[usize]) -> bool {
        let first = self.y[rows[0]];
        rows.iter().all(|&i| self.y[i] == first)
    }

    /// Split maximizing `sum_l^2 / n_l + sum_r^2 / n_r`, which minimizes child SSE.
    fn best_split(&self, rows: &[usize]) -> Option<Split> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf;
        let total: f64 = rows.iter().map(|&i| self.y[i]).sum();

        let mut best: Option<(f64, Split)> = None;
        let mut sorted = rows.to_vec();

        for feature in 0..self.x.ncols() {
            sorted.sort_by(|&a, &b| {
                self.x[[a, feature]]
                    .total_cmp(&self.x[[b, feature]])
                    .then(a.cmp(&b))
            });

            let mut left_sum = 0.0;
            for pos in 1..n {
                left_sum += self.y[sorted[pos - 1]];
                if pos < min_leaf || n - pos < min_leaf {
                    continue;
                }
                let lo = self.x[[sorted[pos - 1], feature]];
                let hi = self.x[[sorted[pos], feature]];
                if lo == hi {
                    continue;
                }

                let right_sum = total - left_sum;
                let score = left_sum * left_sum / pos as f64 + right_sum * right_sum / (n - pos) as f64;
                if best.as_ref().is_none_or(|(s, _)| score > *s) {
                    let mid = lo + (hi - lo) / 2.0;
                    let threshold = if mid < hi { mid } else { lo };
                    best = Some((score, Split { feature, threshold }));
                }
            }
        }

        best.map(|(_, split)| split)
    }
}
