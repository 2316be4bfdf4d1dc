//! Data ingestion: read the source table and split it into train/test partitions.

use crate::config::{ArtifactConfig, IngestionConfig, SchemaConfig};
use crate::error::{PipelineError, Result, ResultExt, Stage};
use crate::io::{load_table, write_table};
use polars::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Files written by [`DataIngestion::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionOutput {
    pub raw_path: PathBuf,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Reads the source CSV, keeps a raw copy and writes a seeded train/test split.
#[derive(Debug, Clone)]
pub struct DataIngestion {
    schema: SchemaConfig,
    ingestion: IngestionConfig,
    artifacts: ArtifactConfig,
}

impl DataIngestion {
    pub fn new(schema: SchemaConfig, ingestion: IngestionConfig, artifacts: ArtifactConfig) -> Self {
        Self {
            schema,
            ingestion,
            artifacts,
        }
    }

    pub fn run(&self) -> Result<IngestionOutput> {
        info!("Ingesting {}", self.ingestion.source.display());

        let mut raw = load_table(&self.ingestion.source, &self.schema)
            .stage(Stage::Ingestion, "load source table")?;

        let (mut train, mut test) = split_rows(&raw, self.ingestion.test_size, self.ingestion.random_seed)
            .stage(Stage::Ingestion, "split train and test")?;

        let raw_path = self.artifacts.raw_path();
        let train_path = self.artifacts.train_path();
        let test_path = self.artifacts.test_path();

        write_table(&raw_path, &mut raw).stage(Stage::Persistence, "write raw copy")?;
        write_table(&train_path, &mut train).stage(Stage::Persistence, "write train partition")?;
        write_table(&test_path, &mut test).stage(Stage::Persistence, "write test partition")?;

        info!(
            "Ingestion complete: {} train rows, {} test rows",
            train.height(),
            test.height()
        );

        Ok(IngestionOutput {
            raw_path,
            train_path,
            test_path,
            train_rows: train.height(),
            test_rows: test.height(),
        })
    }
}

/// Number of held-out rows: `ceil(test_size * n)`, keeping at least one row on each side.
pub fn test_row_count(n: usize, test_size: f64) -> usize {
    let count = (test_size * n as f64).ceil() as usize;
    count.clamp(1, n.saturating_sub(1).max(1))
}

/// Shuffle rows with a seeded RNG and split them into `(train, test)`.
pub fn split_rows(df: &DataFrame, test_size: f64, seed: u64) -> Result<(DataFrame, DataFrame)> {
    let n = df.height();
    if n < 2 {
        return Err(PipelineError::data_load(
            "source table",
            format!("need at least 2 rows to split, found {n}"),
        ));
    }

    let mut indices: Vec<IdxSize> = (0..n as IdxSize).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_count = test_row_count(n, test_size);
    let train_idx = IdxCa::from_vec("idx".into(), indices[test_count..].to_vec());
    let test_idx = IdxCa::from_vec("idx".into(), indices[..test_count].to_vec());

    Ok((df.take(&train_idx)?, df.take(&test_idx)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(n: usize) -> DataFrame {
        let ids: Vec<i64> = (0..n as i64).collect();
        df!["id" => ids].unwrap()
    }

    fn ids(df: &DataFrame) -> Vec<i64> {
        df.column("id")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn test_row_counts() {
        assert_eq!(test_row_count(1000, 0.2), 200);
        assert_eq!(test_row_count(11, 0.2), 3);
        assert_eq!(test_row_count(2, 0.01), 1);
        assert_eq!(test_row_count(2, 0.99), 1);
    }

    #[test]
    fn test_split_is_a_partition() {
        let (train, test) = split_rows(&table(50), 0.2, 42).unwrap();
        assert_eq!(train.height(), 40);
        assert_eq!(test.height(), 10);

        let mut all = ids(&train);
        all.extend(ids(&test));
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        let (a, _) = split_rows(&table(30), 0.2, 7).unwrap();
        let (b, _) = split_rows(&table(30), 0.2, 7).unwrap();
        let (c, _) = split_rows(&table(30), 0.2, 8).unwrap();
        assert_eq!(ids(&a), ids(&b));
        assert_ne!(ids(&a), ids(&c));
    }

    #[test]
    fn test_split_too_small() {
        let err = split_rows(&table(1), 0.2, 42).unwrap_err();
        assert!(err.is_data_load());
    }

    #[test]
    fn test_run_writes_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("stud.csv");
        let mut rows = String::from("hours,school,grade\n");
        for i in 0..10 {
            rows.push_str(&format!("{i},GP,{}\n", 10 + i));
        }
        std::fs::write(&source, rows).unwrap();

        let ingestion = DataIngestion::new(
            SchemaConfig::new(["hours"], ["school"], "grade"),
            IngestionConfig {
                source,
                test_size: 0.2,
                random_seed: 42,
            },
            ArtifactConfig::in_dir(dir.path().join("artifacts")),
        );

        let output = ingestion.run().unwrap();
        assert_eq!(output.train_rows, 8);
        assert_eq!(output.test_rows, 2);
        assert!(output.raw_path.exists());
        assert!(output.train_path.exists());
        assert!(output.test_path.exists());
    }

    #[test]
    fn test_run_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let ingestion = DataIngestion::new(
            SchemaConfig::default(),
            IngestionConfig {
                source: dir.path().join("missing.csv"),
                ..IngestionConfig::default()
            },
            ArtifactConfig::in_dir(dir.path()),
        );

        let err = ingestion.run().unwrap_err();
        assert!(err.is_data_load());
        assert_eq!(err.stage(), Some(Stage::Ingestion));
    }
}
