//! CLI entry point for training and prediction.

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use scorecast_learning::{PipelineReport, PredictionPipeline, TrainerConfig, TrainingPipeline};
use scorecast_processing::{PipelineConfig, PipelineError, load_features};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Train and serve a student math score regressor",
    long_about = "Splits a student performance table, fits the preprocessing pipeline on the \
                  training partition, selects the best regression model and persists both.\n\n\
                  EXAMPLES:\n  \
                  # Train with defaults\n  \
                  scorecast train --input data/stud.csv\n\n  \
                  # Stricter acceptance threshold, JSON report\n  \
                  scorecast train --input data/stud.csv --min-score 0.8 --json\n\n  \
                  # Predict with the saved artifacts\n  \
                  scorecast predict --input new_students.csv"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run ingestion, transformation and model selection
    Train(TrainArgs),
    /// Predict math scores with previously saved artifacts
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Source CSV to split into train and test partitions
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory for the partitions, the preprocessor and the model
    #[arg(short, long)]
    artifacts: Option<PathBuf>,

    /// Minimum test R² the selected model must reach
    #[arg(long)]
    min_score: Option<f64>,

    /// Fraction of rows held out for testing
    #[arg(long)]
    test_size: Option<f64>,

    /// Seed for the split, the folds and seeded models
    #[arg(long)]
    seed: Option<u64>,

    /// JSON file with a pipeline configuration; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the full report as JSON instead of the score
    ///
    /// Disables all logs so stdout holds only JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// CSV with the feature columns; a target column is ignored
    #[arg(short, long)]
    input: PathBuf,

    /// Directory holding the saved preprocessor and model
    #[arg(short, long)]
    artifacts: Option<PathBuf>,

    /// JSON file with the pipeline configuration used for training
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print predictions as a JSON array
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence over `level`. With `json_output` no
/// subscriber is installed.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let json = match &cli.command {
        Command::Train(args) => args.json,
        Command::Predict(args) => args.json,
    };
    init_logging(&cli.log_level, cli.quiet, json);

    let outcome = match cli.command {
        Command::Train(args) => train(args),
        Command::Predict(args) => predict(args),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(e) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&e)?);
            } else {
                error!("{e}");
            }
            Err(anyhow!(e))
        }
    }
}

fn train(args: TrainArgs) -> Result<(), PipelineError> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(input) = args.input {
        config.ingestion.source = input;
    }
    if let Some(dir) = args.artifacts {
        config.artifacts.dir = dir;
    }
    if let Some(test_size) = args.test_size {
        config.ingestion.test_size = test_size;
    }
    if let Some(seed) = args.seed {
        config.ingestion.random_seed = seed;
    }

    let mut trainer_config = TrainerConfig::builder();
    if let Some(min_score) = args.min_score {
        trainer_config = trainer_config.min_score(min_score);
    }
    if let Some(seed) = args.seed {
        trainer_config = trainer_config.random_seed(seed);
    }

    let report = TrainingPipeline::builder()
        .config(config)
        .trainer_config(trainer_config.build()?)
        .build()?
        .run()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn predict(args: PredictArgs) -> Result<(), PipelineError> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = args.artifacts {
        config.artifacts.dir = dir;
    }

    let pipeline = PredictionPipeline::load(
        config.artifacts.preprocessor_path(),
        config.artifacts.model_path(),
    )?;
    let features = load_features(&args.input, &config.schema)?;
    let predictions = pipeline.predict(&features)?;
    info!("Predicted {} rows with {}", predictions.len(), pipeline.model().name);

    if args.json {
        println!("{}", serde_json::to_string(&predictions)?);
    } else {
        for value in predictions {
            println!("{value}");
        }
    }
    Ok(())
}

/// Print the model comparison table followed by the final score.
///
/// Uses `println!` on purpose: this is the command's output, not a log.
fn print_summary(report: &PipelineReport) {
    let training = &report.training;

    println!();
    println!(
        "{:<26} {:>9} {:>9} {:>9} {:>8}",
        "Model", "Test R²", "Train R²", "CV R²", "Risk"
    );
    println!("{}", "-".repeat(65));
    for row in &training.model_comparison {
        let cv = row
            .cv_score
            .map(|s| format!("{s:.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<26} {:>9.4} {:>9.4} {:>9} {:>8}",
            row.name, row.test_score, row.train_score, cv, row.overfitting_risk
        );
    }
    println!();
    println!("Best model: {}", training.best_model_name);
    println!("Model saved to {}", training.model_path.display());
    println!("{}", report.score());
}

