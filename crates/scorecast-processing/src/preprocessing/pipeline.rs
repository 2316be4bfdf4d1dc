//! Column-wise preprocessing pipeline.
//!
//! An [`UnfittedPipeline`] holds only recipes and can only be fitted. Fitting
//! consumes it and yields a [`FittedPipeline`], which can only transform. The
//! fitted pipeline is what gets persisted and reloaded for prediction.

use super::steps::{Block, BlockData, BlockKind, ChainState, FittedStep, ImputeStrategy, TransformStep};
use crate::config::UnknownCategoryPolicy;
use crate::error::{PipelineError, Result};
use crate::utils::{is_numeric_dtype, numeric_values, string_values};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A set of columns sharing one transformation recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureGroup {
    /// Continuous columns, read as floats.
    Numeric {
        columns: Vec<String>,
        steps: Vec<TransformStep>,
    },
    /// Nominal columns, read as text.
    Categorical {
        columns: Vec<String>,
        steps: Vec<TransformStep>,
    },
}

impl FeatureGroup {
    /// Numeric group with the standard recipe: median imputation, then standardization.
    pub fn numeric(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        FeatureGroup::Numeric {
            columns: columns.into_iter().map(Into::into).collect(),
            steps: vec![
                TransformStep::Impute(ImputeStrategy::Median),
                TransformStep::Standardize { with_mean: true },
            ],
        }
    }

    /// Categorical group with the standard recipe: mode imputation, one-hot
    /// encoding, then scaling without centering.
    pub fn categorical(
        columns: impl IntoIterator<Item = impl Into<String>>,
        handle_unknown: UnknownCategoryPolicy,
    ) -> Self {
        FeatureGroup::Categorical {
            columns: columns.into_iter().map(Into::into).collect(),
            steps: vec![
                TransformStep::Impute(ImputeStrategy::MostFrequent),
                TransformStep::OneHotEncode { handle_unknown },
                TransformStep::Standardize { with_mean: false },
            ],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FeatureGroup::Numeric { .. } => "num",
            FeatureGroup::Categorical { .. } => "cat",
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            FeatureGroup::Numeric { columns, .. } | FeatureGroup::Categorical { columns, .. } => {
                columns
            }
        }
    }

    pub fn steps(&self) -> &[TransformStep] {
        match self {
            FeatureGroup::Numeric { steps, .. } | FeatureGroup::Categorical { steps, .. } => steps,
        }
    }

    fn input_kind(&self) -> BlockKind {
        match self {
            FeatureGroup::Numeric { .. } => BlockKind::Numeric,
            FeatureGroup::Categorical { .. } => BlockKind::Text,
        }
    }

    /// Walk the step chain without data and reject recipes that cannot run.
    pub(crate) fn check_chain(&self) -> Result<()> {
        let mut state = ChainState {
            kind: self.input_kind(),
            imputed: false,
        };
        for step in self.steps() {
            state = step.check(state).map_err(|reason| {
                PipelineError::Configuration(format!(
                    "{} group, step '{}': {reason}",
                    self.name(),
                    step.name()
                ))
            })?;
        }
        if state.kind != BlockKind::Numeric {
            return Err(PipelineError::Configuration(format!(
                "{} group must end with numeric output; add an encoder",
                self.name()
            )));
        }
        Ok(())
    }
}

/// A feature group with fitted steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedGroup {
    name: String,
    input: BlockKind,
    columns: Vec<String>,
    steps: Vec<FittedStep>,
    output_names: Vec<String>,
}

impl FittedGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn steps(&self) -> &[FittedStep] {
        &self.steps
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn transform(&self, df: &DataFrame) -> Result<Block> {
        let mut block = read_block(df, self.input, &self.columns)?;
        for step in &self.steps {
            block = step.apply(block)?;
        }
        Ok(block)
    }
}

/// Preprocessing recipe that has not seen any data.
///
/// Created by [`PreprocessorBuilder`](super::PreprocessorBuilder); the only
/// thing it can do is fit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnfittedPipeline {
    groups: Vec<FeatureGroup>,
}

impl UnfittedPipeline {
    pub(crate) fn new(groups: Vec<FeatureGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[FeatureGroup] {
        &self.groups
    }

    /// Learn every step's statistics from `features`.
    pub fn fit(self, features: &DataFrame) -> Result<FittedPipeline> {
        self.fit_transform(features).map(|(fitted, _)| fitted)
    }

    /// Fit on `features` and return the transformed features alongside the fitted pipeline.
    pub fn fit_transform(self, features: &DataFrame) -> Result<(FittedPipeline, Array2<f64>)> {
        if features.height() == 0 {
            return Err(PipelineError::transformation(
                self.groups
                    .first()
                    .and_then(|g| g.columns().first())
                    .cloned()
                    .unwrap_or_default(),
                "cannot fit the preprocessor on an empty table",
            ));
        }

        let mut fitted_groups = Vec::with_capacity(self.groups.len());
        let mut blocks = Vec::with_capacity(self.groups.len());

        for group in self.groups {
            let input = group.input_kind();
            let name = group.name().to_string();
            let (columns, steps) = match group {
                FeatureGroup::Numeric { columns, steps }
                | FeatureGroup::Categorical { columns, steps } => (columns, steps),
            };

            let mut block = read_block(features, input, &columns)?;
            let mut fitted_steps = Vec::with_capacity(steps.len());
            for step in &steps {
                let fitted = step.fit(&block)?;
                block = fitted.apply(block)?;
                fitted_steps.push(fitted);
            }

            debug!(
                "Fitted '{}' group: {} columns -> {} features",
                name,
                columns.len(),
                block.names.len()
            );

            fitted_groups.push(FittedGroup {
                name,
                input,
                columns,
                steps: fitted_steps,
                output_names: block.names.clone(),
            });
            blocks.push(block);
        }

        let fitted = FittedPipeline {
            groups: fitted_groups,
        };
        info!(
            "Fitted preprocessor on {} rows ({} output features)",
            features.height(),
            fitted.n_features_out()
        );

        let array = assemble(features.height(), &blocks)?;
        Ok((fitted, array))
    }
}

/// Preprocessor fitted on training features.
///
/// Holds every learned statistic; applying it never changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    groups: Vec<FittedGroup>,
}

impl FittedPipeline {
    pub fn groups(&self) -> &[FittedGroup] {
        &self.groups
    }

    /// Raw feature columns consumed, in group order.
    pub fn input_columns(&self) -> Vec<&str> {
        self.groups
            .iter()
            .flat_map(|g| g.columns.iter().map(String::as_str))
            .collect()
    }

    /// Output column names, in output order.
    pub fn feature_names(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|g| g.output_names.iter().cloned())
            .collect()
    }

    pub fn n_features_out(&self) -> usize {
        self.groups.iter().map(|g| g.output_names.len()).sum()
    }

    /// Apply the fitted transformation to `features`.
    pub fn transform(&self, features: &DataFrame) -> Result<Array2<f64>> {
        let blocks = self
            .groups
            .iter()
            .map(|group| group.transform(features))
            .collect::<Result<Vec<_>>>()?;

        let array = assemble(features.height(), &blocks)?;
        if array.ncols() != self.n_features_out() {
            return Err(PipelineError::transformation(
                self.input_columns().first().copied().unwrap_or_default(),
                format!(
                    "transformed width {} does not match fitted width {}",
                    array.ncols(),
                    self.n_features_out()
                ),
            ));
        }
        Ok(array)
    }
}

static_assertions::assert_impl_all!(FittedPipeline: Send, Sync);

fn read_block(df: &DataFrame, kind: BlockKind, columns: &[String]) -> Result<Block> {
    let data = match kind {
        BlockKind::Numeric => BlockData::Numeric(
            columns
                .iter()
                .map(|name| {
                    check_numeric(df, name)?;
                    numeric_values(df, name)
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        BlockKind::Text => BlockData::Text(
            columns
                .iter()
                .map(|name| string_values(df, name))
                .collect::<Result<Vec<_>>>()?,
        ),
    };

    Ok(Block {
        names: columns.to_vec(),
        rows: df.height(),
        data,
    })
}

/// Text in a numeric column is a schema mismatch, not a missing value.
fn check_numeric(df: &DataFrame, name: &str) -> Result<()> {
    let Ok(column) = df.column(name) else {
        return Err(PipelineError::transformation(name, "column missing from input table"));
    };
    let dtype = column.dtype();
    // An all-empty column carries no type information
    if is_numeric_dtype(dtype) || column.null_count() == column.len() {
        return Ok(());
    }
    Err(PipelineError::transformation(
        name,
        format!("expected a numeric column, found {dtype}"),
    ))
}

fn assemble(rows: usize, blocks: &[Block]) -> Result<Array2<f64>> {
    let width: usize = blocks.iter().map(|b| b.names.len()).sum();
    let mut array = Array2::<f64>::zeros((rows, width));

    let mut offset = 0;
    for block in blocks {
        let BlockData::Numeric(columns) = &block.data else {
            return Err(PipelineError::transformation(
                block.names.first().cloned().unwrap_or_default(),
                "group did not produce numeric output",
            ));
        };
        for (j, (values, name)) in columns.iter().zip(&block.names).enumerate() {
            if values.len() != rows {
                return Err(PipelineError::transformation(
                    name,
                    format!("expected {rows} rows, found {}", values.len()),
                ));
            }
            for (i, value) in values.iter().enumerate() {
                array[[i, offset + j]] = value.ok_or_else(|| {
                    PipelineError::transformation(name, "missing value in transformed output")
                })?;
            }
        }
        offset += columns.len();
    }

    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pipeline() -> UnfittedPipeline {
        UnfittedPipeline::new(vec![
            FeatureGroup::numeric(["reading_score"]),
            FeatureGroup::categorical(["lunch"], UnknownCategoryPolicy::Error),
        ])
    }

    fn train() -> DataFrame {
        df![
            "reading_score" => [Some(60.0), None, Some(80.0), Some(70.0)],
            "lunch" => [Some("standard"), Some("free/reduced"), None, Some("standard")],
        ]
        .unwrap()
    }

    #[test]
    fn test_feature_names_numeric_first() {
        let fitted = pipeline().fit(&train()).unwrap();
        assert_eq!(
            fitted.feature_names(),
            vec!["reading_score", "lunch_free/reduced", "lunch_standard"]
        );
        assert_eq!(fitted.n_features_out(), 3);
        assert_eq!(fitted.input_columns(), vec!["reading_score", "lunch"]);
    }

    #[test]
    fn test_fit_transform_matches_transform() {
        let (fitted, array) = pipeline().fit_transform(&train()).unwrap();
        assert_eq!(fitted.transform(&train()).unwrap(), array);
        assert_eq!(array.dim(), (4, 3));
    }

    #[test]
    fn test_numeric_group_is_centered() {
        let fitted = pipeline().fit(&train()).unwrap();
        let array = fitted.transform(&train()).unwrap();
        let mean = array.column(0).sum() / 4.0;
        assert!(mean.abs() < 1e-12);
    }

    #[test]
    fn test_indicators_are_not_centered() {
        let fitted = pipeline().fit(&train()).unwrap();
        let test = df![
            "reading_score" => [70.0],
            "lunch" => ["free/reduced"],
        ]
        .unwrap();
        let array = fitted.transform(&test).unwrap();
        // Absent category stays exactly zero after scaling without centering
        assert_eq!(array[[0, 2]], 0.0);
        assert!(array[[0, 1]] > 0.0);
    }

    #[test]
    fn test_empty_table() {
        let empty = train().head(Some(0));
        let err = pipeline().fit(&empty).unwrap_err();
        assert!(err.is_transformation());
    }

    #[test]
    fn test_text_in_numeric_column() {
        let bad = df![
            "reading_score" => ["sixty", "seventy"],
            "lunch" => ["standard", "standard"],
        ]
        .unwrap();
        let err = pipeline().fit(&bad).unwrap_err();
        assert!(err.to_string().contains("expected a numeric column"));
    }

    #[test]
    fn test_missing_column_on_transform() {
        let fitted = pipeline().fit(&train()).unwrap();
        let test = df!["reading_score" => [70.0]].unwrap();
        let err = fitted.transform(&test).unwrap_err();
        assert!(err.is_transformation());
        assert!(err.to_string().contains("lunch"));
    }

    #[test]
    fn test_chain_must_end_numeric() {
        let group = FeatureGroup::Categorical {
            columns: vec!["lunch".to_string()],
            steps: vec![TransformStep::Impute(ImputeStrategy::MostFrequent)],
        };
        let err = group.check_chain().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("numeric output"));
    }

    #[test]
    fn test_scaling_before_imputation_is_rejected() {
        let group = FeatureGroup::Numeric {
            columns: vec!["reading_score".to_string()],
            steps: vec![TransformStep::Standardize { with_mean: true }],
        };
        let err = group.check_chain().unwrap_err();
        assert!(err.to_string().contains("std_scaler"));
    }

    #[test]
    fn test_serde_round_trip() {
        let fitted = pipeline().fit(&train()).unwrap();
        let json = serde_json::to_string(&fitted).unwrap();
        let restored: FittedPipeline = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, fitted);
    }
}
