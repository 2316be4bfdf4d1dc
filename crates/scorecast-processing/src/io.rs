//! CSV table loading and writing.

use crate::artifacts::write_atomic;
use crate::config::SchemaConfig;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

/// Cell contents read as missing, in addition to empty fields.
pub const MISSING_MARKERS: [&str; 4] = ["NA", "N/A", "NaN", "null"];

/// Load a headered CSV and check it against the declared schema.
///
/// The returned frame holds exactly the declared columns, in declared order.
/// Undeclared columns are dropped. Empty fields and [`MISSING_MARKERS`] load
/// as nulls.
pub fn load_table(path: impl AsRef<Path>, schema: &SchemaConfig) -> Result<DataFrame> {
    let columns: Vec<&str> = schema.columns.iter().map(String::as_str).collect();
    load_columns(path.as_ref(), &columns)
}

/// Load only the feature columns of a table, for prediction inputs.
///
/// The target column may be absent; if present it is dropped.
pub fn load_features(path: impl AsRef<Path>, schema: &SchemaConfig) -> Result<DataFrame> {
    let columns: Vec<&str> = schema.feature_columns().collect();
    load_columns(path.as_ref(), &columns)
}

fn load_columns(path: &Path, columns: &[&str]) -> Result<DataFrame> {
    let source_name = path.display().to_string();
    if !path.is_file() {
        return Err(PipelineError::data_load(source_name, "file not found"));
    }

    let df = CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_null_values(Some(NullValues::AllColumns(
                    MISSING_MARKERS.iter().map(|m| (*m).into()).collect(),
                ))),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| PipelineError::data_load(&source_name, e.to_string()))?;

    for column in columns {
        if df.get_column_index(column).is_none() {
            return Err(PipelineError::data_load(
                &source_name,
                format!("missing declared column '{column}'"),
            ));
        }
    }

    let extra: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| !columns.contains(&name.as_str()))
        .map(|name| name.to_string())
        .collect();
    if !extra.is_empty() {
        warn!("Ignoring undeclared columns in {}: {:?}", source_name, extra);
    }

    let df = df.select(columns.iter().copied())?;
    debug!("Loaded {} ({} rows x {} columns)", source_name, df.height(), df.width());
    Ok(df)
}

/// Write `df` as a headered CSV, replacing `path` atomically.
pub fn write_table(path: impl AsRef<Path>, df: &mut DataFrame) -> Result<()> {
    let path = path.as_ref();
    write_atomic(path, |writer| {
        CsvWriter::new(writer)
            .include_header(true)
            .with_separator(b',')
            .finish(df)?;
        Ok(())
    })?;
    debug!("Wrote {} ({} rows)", path.display(), df.height());
    Ok(())
}

/// Split off the target column, returning `(features, target)`.
pub fn split_target(df: &DataFrame, target_column: &str) -> Result<(DataFrame, Vec<f64>)> {
    let target = crate::utils::target_values(df, target_column)?;
    let features = df.drop(target_column)?;
    Ok((features, target))
}
