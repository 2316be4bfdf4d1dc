use super::pipeline::{FeatureGroup, UnfittedPipeline};
use crate::config::{SchemaConfig, UnknownCategoryPolicy};
use crate::error::{PipelineError, Result};
use std::collections::HashSet;
use tracing::debug;

/// Builds the unfitted preprocessing pipeline from the declared schema.
///
/// Construction is pure: it reads only the configuration, never data. Every
/// inconsistency between the feature groups and the schema is reported here
/// as a configuration error rather than deferred to fit time.
///
/// # Example
///
/// ```rust,ignore
/// use scorecast_processing::{PreprocessorBuilder, SchemaConfig};
///
/// let pipeline = PreprocessorBuilder::new(&SchemaConfig::default()).build()?;
/// let fitted = pipeline.fit(&train_features)?;
/// ```
#[derive(Debug, Clone)]
pub struct PreprocessorBuilder {
    schema: SchemaConfig,
    unknown_categories: UnknownCategoryPolicy,
    groups: Option<Vec<FeatureGroup>>,
}

impl PreprocessorBuilder {
    pub fn new(schema: &SchemaConfig) -> Self {
        Self {
            schema: schema.clone(),
            unknown_categories: UnknownCategoryPolicy::default(),
            groups: None,
        }
    }

    /// Policy for categories that were not seen during fit.
    pub fn unknown_categories(mut self, policy: UnknownCategoryPolicy) -> Self {
        self.unknown_categories = policy;
        self
    }

    /// Replace the standard recipes with custom feature groups.
    ///
    /// The groups must still cover exactly the schema's feature columns.
    pub fn groups(mut self, groups: Vec<FeatureGroup>) -> Self {
        self.groups = Some(groups);
        self
    }

    pub fn build(self) -> Result<UnfittedPipeline> {
        self.schema.validate()?;

        let groups = match self.groups {
            Some(groups) => groups,
            None => self.standard_groups(),
        };

        let declared: HashSet<&str> = self.schema.feature_columns().collect();
        let mut covered = HashSet::new();
        for group in &groups {
            if group.columns().is_empty() {
                return Err(PipelineError::Configuration(format!(
                    "{} group has no columns",
                    group.name()
                )));
            }
            if group.steps().is_empty() {
                return Err(PipelineError::Configuration(format!(
                    "{} group has no steps",
                    group.name()
                )));
            }
            for column in group.columns() {
                if !declared.contains(column.as_str()) {
                    return Err(PipelineError::Configuration(format!(
                        "{} group references '{column}', which is not a declared feature column",
                        group.name()
                    )));
                }
                if !covered.insert(column.as_str()) {
                    return Err(PipelineError::Configuration(format!(
                        "column '{column}' is assigned to more than one group"
                    )));
                }
            }
            group.check_chain()?;
        }

        if let Some(missing) = self
            .schema
            .feature_columns()
            .find(|c| !covered.contains(c))
        {
            return Err(PipelineError::Configuration(format!(
                "feature column '{missing}' is not assigned to any group"
            )));
        }

        for group in &groups {
            debug!(
                "{} group: {:?} -> [{}]",
                group.name(),
                group.columns(),
                group
                    .steps()
                    .iter()
                    .map(|s| s.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(UnfittedPipeline::new(groups))
    }

    fn standard_groups(&self) -> Vec<FeatureGroup> {
        let mut groups = Vec::with_capacity(2);
        if !self.schema.numeric_columns.is_empty() {
            groups.push(FeatureGroup::numeric(self.schema.numeric_columns.iter().cloned()));
        }
        if !self.schema.categorical_columns.is_empty() {
            groups.push(FeatureGroup::categorical(
                self.schema.categorical_columns.iter().cloned(),
                self.unknown_categories,
            ));
        }
        groups
    }
}
