//! Transform steps and their fitted counterparts.
//!
//! A [`TransformStep`] is a recipe: it learns nothing until [`TransformStep::fit`]
//! turns it into a [`FittedStep`] holding the statistics of the fitting data.
//! Only fitted steps can be applied.

use crate::config::UnknownCategoryPolicy;
use crate::error::{PipelineError, Result};
use crate::utils::{mean_and_std, median, numeric_mode, string_mode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Scales below this are treated as zero and replaced by 1.0.
const MIN_SCALE: f64 = 10.0 * f64::EPSILON;

/// Value representation flowing between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Text,
    Numeric,
}

/// Column-major data of one feature group between two steps.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BlockData {
    Text(Vec<Vec<Option<String>>>),
    Numeric(Vec<Vec<Option<f64>>>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Block {
    pub names: Vec<String>,
    pub rows: usize,
    pub data: BlockData,
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self.data {
            BlockData::Text(_) => BlockKind::Text,
            BlockData::Numeric(_) => BlockKind::Numeric,
        }
    }
}

/// Static view of a block used to check step chains at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChainState {
    pub kind: BlockKind,
    pub imputed: bool,
}

/// Statistic used to fill missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    Median,
    MostFrequent,
}

/// One step of a feature group's recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformStep {
    /// Replace missing values with a statistic of the fitting data.
    Impute(ImputeStrategy),
    /// Expand each column into one indicator per category seen during fit.
    OneHotEncode { handle_unknown: UnknownCategoryPolicy },
    /// Divide by the fitted standard deviation, subtracting the mean first if `with_mean`.
    Standardize { with_mean: bool },
}

impl TransformStep {
    /// Step name as it appears in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            TransformStep::Impute(_) => "imputer",
            TransformStep::OneHotEncode { .. } => "onehot",
            TransformStep::Standardize { .. } => "std_scaler",
        }
    }

    /// State after this step, or a description of why the step cannot follow `input`.
    pub(crate) fn check(&self, input: ChainState) -> std::result::Result<ChainState, String> {
        match self {
            TransformStep::Impute(ImputeStrategy::Median) => {
                if input.kind != BlockKind::Numeric {
                    return Err("median imputation needs numeric input".to_string());
                }
                Ok(ChainState {
                    kind: BlockKind::Numeric,
                    imputed: true,
                })
            }
            TransformStep::Impute(ImputeStrategy::MostFrequent) => Ok(ChainState {
                kind: input.kind,
                imputed: true,
            }),
            TransformStep::OneHotEncode { .. } => {
                if input.kind != BlockKind::Text {
                    return Err("one-hot encoding needs categorical input".to_string());
                }
                if !input.imputed {
                    return Err("one-hot encoding must follow an imputer".to_string());
                }
                Ok(ChainState {
                    kind: BlockKind::Numeric,
                    imputed: true,
                })
            }
            TransformStep::Standardize { .. } => {
                if input.kind != BlockKind::Numeric {
                    return Err("scaling needs numeric input".to_string());
                }
                if !input.imputed {
                    return Err("scaling must follow an imputer".to_string());
                }
                Ok(input)
            }
        }
    }

    /// Learn this step's statistics from `block`.
    pub(crate) fn fit(&self, block: &Block) -> Result<FittedStep> {
        if block.rows == 0 {
            let column = block.names.first().cloned().unwrap_or_default();
            return Err(PipelineError::transformation(
                column,
                format!("cannot fit {} on an empty table", self.name()),
            ));
        }

        match (self, &block.data) {
            (TransformStep::Impute(strategy), BlockData::Numeric(columns)) => {
                let fill = columns
                    .iter()
                    .zip(&block.names)
                    .map(|(values, name)| {
                        let value = match strategy {
                            ImputeStrategy::Median => median(values),
                            ImputeStrategy::MostFrequent => numeric_mode(values),
                        };
                        value.map(FillValue::Number).ok_or_else(|| no_values(name))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(FittedStep::Impute {
                    strategy: *strategy,
                    fill,
                })
            }
            (TransformStep::Impute(ImputeStrategy::MostFrequent), BlockData::Text(columns)) => {
                let fill = columns
                    .iter()
                    .zip(&block.names)
                    .map(|(values, name)| {
                        string_mode(values)
                            .map(FillValue::Text)
                            .ok_or_else(|| no_values(name))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(FittedStep::Impute {
                    strategy: ImputeStrategy::MostFrequent,
                    fill,
                })
            }
            (TransformStep::OneHotEncode { handle_unknown }, BlockData::Text(columns)) => {
                let categories = columns
                    .iter()
                    .zip(&block.names)
                    .map(|(values, name)| {
                        let mut seen = BTreeSet::new();
                        for value in values {
                            let value = value.as_ref().ok_or_else(|| {
                                PipelineError::transformation(name, "missing value reached the encoder")
                            })?;
                            seen.insert(value.clone());
                        }
                        debug!("'{}' has {} categories", name, seen.len());
                        Ok(seen.into_iter().collect())
                    })
                    .collect::<Result<Vec<Vec<String>>>>()?;
                Ok(FittedStep::OneHotEncode {
                    categories,
                    handle_unknown: *handle_unknown,
                })
            }
            (TransformStep::Standardize { with_mean }, BlockData::Numeric(columns)) => {
                let mut means = Vec::with_capacity(columns.len());
                let mut scales = Vec::with_capacity(columns.len());
                for (values, name) in columns.iter().zip(&block.names) {
                    let dense = dense(values, name)?;
                    let (mean, std) = mean_and_std(&dense).ok_or_else(|| no_values(name))?;
                    let scale = if std < MIN_SCALE {
                        warn!("'{}' is constant in the fitting data; leaving it unscaled", name);
                        1.0
                    } else {
                        std
                    };
                    means.push(mean);
                    scales.push(scale);
                }
                Ok(FittedStep::Standardize {
                    with_mean: *with_mean,
                    means,
                    scales,
                })
            }
            (step, _) => Err(mismatch(step.name(), block)),
        }
    }
}

/// Value learned by an imputer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

/// A step with its learned statistics, ready to be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedStep {
    Impute {
        strategy: ImputeStrategy,
        fill: Vec<FillValue>,
    },
    OneHotEncode {
        categories: Vec<Vec<String>>,
        handle_unknown: UnknownCategoryPolicy,
    },
    Standardize {
        with_mean: bool,
        means: Vec<f64>,
        scales: Vec<f64>,
    },
}

impl FittedStep {
    pub fn name(&self) -> &'static str {
        match self {
            FittedStep::Impute { .. } => "imputer",
            FittedStep::OneHotEncode { .. } => "onehot",
            FittedStep::Standardize { .. } => "std_scaler",
        }
    }

    fn width(&self) -> usize {
        match self {
            FittedStep::Impute { fill, .. } => fill.len(),
            FittedStep::OneHotEncode { categories, .. } => categories.len(),
            FittedStep::Standardize { scales, .. } => scales.len(),
        }
    }

    /// Apply the learned transformation to `block`.
    pub(crate) fn apply(&self, block: Block) -> Result<Block> {
        if block.names.len() != self.width() {
            let column = block.names.first().cloned().unwrap_or_default();
            return Err(PipelineError::transformation(
                column,
                format!(
                    "{} was fitted on {} columns but received {}",
                    self.name(),
                    self.width(),
                    block.names.len()
                ),
            ));
        }

        let Block { names, rows, data } = block;
        match (self, data) {
            (FittedStep::Impute { fill, .. }, BlockData::Numeric(columns)) => {
                let columns = columns
                    .into_iter()
                    .zip(fill)
                    .zip(&names)
                    .map(|((values, fill), name)| match fill {
                        FillValue::Number(fill) => {
                            Ok(values.into_iter().map(|v| Some(v.unwrap_or(*fill))).collect())
                        }
                        FillValue::Text(_) => Err(PipelineError::transformation(
                            name,
                            "imputer was fitted on categorical values",
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Block {
                    names,
                    rows,
                    data: BlockData::Numeric(columns),
                })
            }
            (FittedStep::Impute { fill, .. }, BlockData::Text(columns)) => {
                let columns = columns
                    .into_iter()
                    .zip(fill)
                    .zip(&names)
                    .map(|((values, fill), name)| match fill {
                        FillValue::Text(fill) => Ok(values
                            .into_iter()
                            .map(|v| Some(v.unwrap_or_else(|| fill.clone())))
                            .collect()),
                        FillValue::Number(_) => Err(PipelineError::transformation(
                            name,
                            "imputer was fitted on numeric values",
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Block {
                    names,
                    rows,
                    data: BlockData::Text(columns),
                })
            }
            (
                FittedStep::OneHotEncode {
                    categories,
                    handle_unknown,
                },
                BlockData::Text(columns),
            ) => {
                let width = categories.iter().map(Vec::len).sum();
                let mut out_names = Vec::with_capacity(width);
                let mut out = Vec::with_capacity(width);

                for ((values, known), name) in columns.iter().zip(categories).zip(&names) {
                    let mut indicators = vec![vec![Some(0.0); rows]; known.len()];
                    let mut ignored = 0usize;
                    for (row, value) in values.iter().enumerate() {
                        let value = value.as_ref().ok_or_else(|| {
                            PipelineError::transformation(name, "missing value reached the encoder")
                        })?;
                        match known.binary_search(value) {
                            Ok(idx) => indicators[idx][row] = Some(1.0),
                            Err(_) => match handle_unknown {
                                UnknownCategoryPolicy::Error => {
                                    return Err(PipelineError::transformation(
                                        name,
                                        format!("unknown category '{value}' not seen during fit"),
                                    ));
                                }
                                UnknownCategoryPolicy::Ignore => ignored += 1,
                            },
                        }
                    }
                    if ignored > 0 {
                        debug!("'{}': encoded {} unknown values as all zeros", name, ignored);
                    }
                    out_names.extend(known.iter().map(|c| format!("{name}_{c}")));
                    out.extend(indicators);
                }

                Ok(Block {
                    names: out_names,
                    rows,
                    data: BlockData::Numeric(out),
                })
            }
            (
                FittedStep::Standardize {
                    with_mean,
                    means,
                    scales,
                },
                BlockData::Numeric(columns),
            ) => {
                let columns = columns
                    .into_iter()
                    .zip(means.iter().zip(scales))
                    .zip(&names)
                    .map(|((values, (mean, scale)), name)| {
                        let center = if *with_mean { *mean } else { 0.0 };
                        Ok(dense(&values, name)?
                            .into_iter()
                            .map(|v| Some((v - center) / scale))
                            .collect())
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Block {
                    names,
                    rows,
                    data: BlockData::Numeric(columns),
                })
            }
            (step, data) => Err(mismatch(step.name(), &Block { names, rows, data })),
        }
    }
}

fn dense(values: &[Option<f64>], name: &str) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.ok_or_else(|| PipelineError::transformation(name, "missing value reached the scaler"))
        })
        .collect()
}

fn no_values(name: &str) -> PipelineError {
    PipelineError::transformation(name, "no non-missing values to learn from")
}

fn mismatch(step: &str, block: &Block) -> PipelineError {
    let column = block.names.first().cloned().unwrap_or_default();
    let kind = match block.kind() {
        BlockKind::Text => "categorical",
        BlockKind::Numeric => "numeric",
    };
    PipelineError::transformation(column, format!("{step} cannot process {kind} values"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(names: &[&str], columns: Vec<Vec<Option<f64>>>) -> Block {
        Block {
            names: names.iter().map(|n| n.to_string()).collect(),
            rows: columns.first().map(Vec::len).unwrap_or(0),
            data: BlockData::Numeric(columns),
        }
    }

    fn text(names: &[&str], columns: Vec<Vec<Option<&str>>>) -> Block {
        Block {
            names: names.iter().map(|n| n.to_string()).collect(),
            rows: columns.first().map(Vec::len).unwrap_or(0),
            data: BlockData::Text(
                columns
                    .into_iter()
                    .map(|c| c.into_iter().map(|v| v.map(str::to_string)).collect())
                    .collect(),
            ),
        }
    }

    fn numeric_data(block: &Block) -> &Vec<Vec<Option<f64>>> {
        match &block.data {
            BlockData::Numeric(columns) => columns,
            BlockData::Text(_) => panic!("expected numeric block"),
        }
    }

    #[test]
    fn test_median_imputer_fills_from_fit_data_only() {
        let step = TransformStep::Impute(ImputeStrategy::Median);
        let fitted = step
            .fit(&numeric(&["reading_score"], vec![vec![Some(1.0), None, Some(3.0), Some(10.0)]]))
            .unwrap();

        let applied = fitted
            .apply(numeric(&["reading_score"], vec![vec![None, Some(100.0)]]))
            .unwrap();
        assert_eq!(numeric_data(&applied)[0], vec![Some(3.0), Some(100.0)]);
    }

    #[test]
    fn test_mode_imputer_on_text() {
        let step = TransformStep::Impute(ImputeStrategy::MostFrequent);
        let fitted = step
            .fit(&text(&["lunch"], vec![vec![Some("standard"), Some("free/reduced"), Some("standard"), None]]))
            .unwrap();
        assert_eq!(
            fitted,
            FittedStep::Impute {
                strategy: ImputeStrategy::MostFrequent,
                fill: vec![FillValue::Text("standard".to_string())],
            }
        );
    }

    #[test]
    fn test_imputer_all_missing_column() {
        let step = TransformStep::Impute(ImputeStrategy::Median);
        let err = step.fit(&numeric(&["writing_score"], vec![vec![None, None]])).unwrap_err();
        assert!(err.is_transformation());
        assert!(err.to_string().contains("writing_score"));
    }

    #[test]
    fn test_fit_on_empty_block() {
        let step = TransformStep::Standardize { with_mean: true };
        let err = step.fit(&numeric(&["x"], vec![vec![]])).unwrap_err();
        assert!(err.to_string().contains("empty table"));
    }

    #[test]
    fn test_one_hot_sorted_categories_and_names() {
        let step = TransformStep::OneHotEncode {
            handle_unknown: UnknownCategoryPolicy::Error,
        };
        let block = text(&["gender"], vec![vec![Some("male"), Some("female"), Some("male")]]);
        let fitted = step.fit(&block).unwrap();
        let applied = fitted.apply(block).unwrap();

        assert_eq!(applied.names, vec!["gender_female", "gender_male"]);
        assert_eq!(
            numeric_data(&applied),
            &vec![
                vec![Some(0.0), Some(1.0), Some(0.0)],
                vec![Some(1.0), Some(0.0), Some(1.0)],
            ]
        );
    }

    #[test]
    fn test_one_hot_unknown_category_error() {
        let step = TransformStep::OneHotEncode {
            handle_unknown: UnknownCategoryPolicy::Error,
        };
        let fitted = step
            .fit(&text(&["gender"], vec![vec![Some("male"), Some("female")]]))
            .unwrap();

        let err = fitted
            .apply(text(&["gender"], vec![vec![Some("nonbinary")]]))
            .unwrap_err();
        assert!(err.is_transformation());
        assert!(err.to_string().contains("nonbinary"));
    }

    #[test]
    fn test_one_hot_unknown_category_ignored() {
        let step = TransformStep::OneHotEncode {
            handle_unknown: UnknownCategoryPolicy::Ignore,
        };
        let fitted = step
            .fit(&text(&["gender"], vec![vec![Some("male"), Some("female")]]))
            .unwrap();

        let applied = fitted
            .apply(text(&["gender"], vec![vec![Some("nonbinary"), Some("male")]]))
            .unwrap();
        assert_eq!(
            numeric_data(&applied),
            &vec![vec![Some(0.0), Some(0.0)], vec![Some(0.0), Some(1.0)]]
        );
    }

    #[test]
    fn test_standardize_with_and_without_mean() {
        let block = numeric(&["x"], vec![vec![Some(2.0), Some(4.0), Some(6.0), Some(8.0)]]);
        let std = (5.0f64).sqrt();

        let centered = TransformStep::Standardize { with_mean: true }
            .fit(&block)
            .unwrap()
            .apply(block.clone())
            .unwrap();
        let centered = &numeric_data(&centered)[0];
        assert!((centered[0].unwrap() - (-3.0 / std)).abs() < 1e-12);
        assert!((centered[3].unwrap() - (3.0 / std)).abs() < 1e-12);

        let uncentered = TransformStep::Standardize { with_mean: false }
            .fit(&block)
            .unwrap()
            .apply(block)
            .unwrap();
        let uncentered = &numeric_data(&uncentered)[0];
        assert!((uncentered[0].unwrap() - 2.0 / std).abs() < 1e-12);
    }

    #[test]
    fn test_standardize_constant_column_is_left_unscaled() {
        let block = numeric(&["x"], vec![vec![Some(1.0), Some(1.0)]]);
        let fitted = TransformStep::Standardize { with_mean: false }.fit(&block).unwrap();
        match &fitted {
            FittedStep::Standardize { scales, .. } => assert_eq!(scales, &vec![1.0]),
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn test_apply_width_mismatch() {
        let fitted = TransformStep::Standardize { with_mean: true }
            .fit(&numeric(&["x"], vec![vec![Some(1.0), Some(2.0)]]))
            .unwrap();
        let err = fitted
            .apply(numeric(&["x", "y"], vec![vec![Some(1.0)], vec![Some(2.0)]]))
            .unwrap_err();
        assert!(err.to_string().contains("fitted on 1 columns"));
    }

    #[test]
    fn test_chain_checks() {
        let raw_text = ChainState {
            kind: BlockKind::Text,
            imputed: false,
        };
        assert!(TransformStep::Impute(ImputeStrategy::Median).check(raw_text).is_err());
        assert!(
            TransformStep::OneHotEncode {
                handle_unknown: UnknownCategoryPolicy::Error
            }
            .check(raw_text)
            .is_err()
        );

        let imputed = TransformStep::Impute(ImputeStrategy::MostFrequent)
            .check(raw_text)
            .unwrap();
        let encoded = TransformStep::OneHotEncode {
            handle_unknown: UnknownCategoryPolicy::Error,
        }
        .check(imputed)
        .unwrap();
        assert_eq!(encoded.kind, BlockKind::Numeric);
        assert!(TransformStep::Standardize { with_mean: false }.check(encoded).is_ok());
    }
}
