//! Shared helpers for reading columns and computing fit statistics.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::cmp::Ordering;

// =============================================================================
// Column Extraction
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| PipelineError::transformation(name, "column missing from input table"))
}

/// Read a column as optional floats.
///
/// Nulls and non-finite values come back as `None`. Callers reject text
/// columns before reading them as numbers.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = series(df, name)?;
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Read a column as optional strings.
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = series(df, name)?;
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Read the regression target; every entry must be present and numeric.
pub fn target_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::data_load(name, "target column is missing"))?;
    let series = column.as_materialized_series();
    if !is_numeric_dtype(series.dtype()) {
        return Err(PipelineError::data_load(
            name,
            format!("target column must be numeric, found {}", series.dtype()),
        ));
    }

    numeric_values(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| {
                PipelineError::data_load(name, format!("target value missing at row {row}"))
            })
        })
        .collect()
}

// =============================================================================
// Fit Statistics
// =============================================================================

/// Median of the present values; the mean of the two middle values for even counts.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(f64::total_cmp);

    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}

/// Most frequent present value; ties go to the smallest value.
pub fn mode_by<T, F>(values: &[Option<T>], cmp: F) -> Option<T>
where
    T: Clone,
    F: Fn(&T, &T) -> Ordering,
{
    let mut present: Vec<&T> = values.iter().flatten().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| cmp(a, b));

    let mut best = present[0];
    let mut best_count = 0;
    let mut run_start = 0;
    for i in 1..=present.len() {
        if i == present.len() || cmp(present[i], present[run_start]) != Ordering::Equal {
            let count = i - run_start;
            // Strictly greater keeps the smallest value on ties
            if count > best_count {
                best = present[run_start];
                best_count = count;
            }
            run_start = i;
        }
    }

    Some(best.clone())
}

/// Most frequent string; ties go to the lexicographically smallest.
pub fn string_mode(values: &[Option<String>]) -> Option<String> {
    mode_by(values, |a, b| a.cmp(b))
}

/// Most frequent number; ties go to the smallest.
pub fn numeric_mode(values: &[Option<f64>]) -> Option<f64> {
    mode_by(values, |a, b| a.total_cmp(b))
}

/// Population mean and standard deviation (ddof = 0).
pub fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[Some(3.0), Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[Some(4.0), None, Some(1.0), Some(2.0), Some(3.0)]), Some(2.5));
        assert_eq!(median(&[None, None]), None);
    }

    #[test]
    fn test_string_mode() {
        let values: Vec<Option<String>> = ["a", "b", "a", "c", "a"]
            .iter()
            .map(|s| Some(s.to_string()))
            .collect();
        assert_eq!(string_mode(&values), Some("a".to_string()));
    }

    #[test]
    fn test_string_mode_tie_takes_smallest() {
        let values = vec![
            Some("male".to_string()),
            Some("female".to_string()),
            None,
            Some("male".to_string()),
            Some("female".to_string()),
        ];
        assert_eq!(string_mode(&values), Some("female".to_string()));
    }

    #[test]
    fn test_numeric_mode() {
        assert_eq!(numeric_mode(&[Some(2.0), Some(1.0), Some(2.0), None]), Some(2.0));
        assert_eq!(numeric_mode(&[Some(5.0), Some(1.0)]), Some(1.0));
        assert_eq!(numeric_mode(&[None]), None);
    }

    #[test]
    fn test_mean_and_std_population() {
        let (mean, std) = mean_and_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
    }

    #[test]
    fn test_numeric_values_casts_integers_and_keeps_nulls() {
        let df = df!["score" => [Some(72i64), None, Some(90)]].unwrap();
        assert_eq!(
            numeric_values(&df, "score").unwrap(),
            vec![Some(72.0), None, Some(90.0)]
        );
    }

    #[test]
    fn test_string_values_missing_column() {
        let df = df!["score" => [1.0]].unwrap();
        let err = string_values(&df, "gender").unwrap_err();
        assert!(err.is_transformation());
    }

    #[test]
    fn test_target_values_rejects_nulls_and_text() {
        let with_null = df!["math_score" => [Some(1.0), None]].unwrap();
        assert!(target_values(&with_null, "math_score").unwrap_err().is_data_load());

        let text = df!["math_score" => ["high", "low"]].unwrap();
        assert!(target_values(&text, "math_score").unwrap_err().is_data_load());

        let ok = df!["math_score" => [72i64, 69]].unwrap();
        assert_eq!(target_values(&ok, "math_score").unwrap(), vec![72.0, 69.0]);
    }
}
