// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands and all their configurable flags:
//
//   transform  raw shards → statistics + transformed shards
//   train      transformed shards → new model version
//   tune       random search over the hyperparameter grid
//   predict    score one set of form fields
//   health     report what the prediction service has loaded
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::{bail, Result};
use clap::{Args, Subcommand};

use crate::application::{
    train_use_case::TrainConfig,
    transform_use_case::TransformConfig,
    tune_use_case::TuneConfig,
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit the feature transform and write transformed shards
    Transform(TransformArgs),

    /// Train a model on the latest transformed shards
    Train(TrainArgs),

    /// Search hyperparameters with random search
    Tune(TuneArgs),

    /// Predict placement for one student profile
    Predict(PredictArgs),

    /// Load the latest model and report service health
    Health(ServeArgs),
}

// ─── transform ────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Raw training shards: .jsonl / .jsonl.gz files or directories
    #[arg(long = "train-data", required = true, num_args = 1..)]
    pub train_data: Vec<String>,

    /// Raw evaluation shards; when omitted the training data is split
    #[arg(long = "eval-data", num_args = 1..)]
    pub eval_data: Vec<String>,

    /// Where transform_graph/ and transformed_examples/ are written
    #[arg(long, default_value = "output/transform")]
    pub output_dir: String,

    /// Share of a single corpus used for training
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output shards per split
    #[arg(long, default_value_t = 1)]
    pub num_shards: usize,
}

impl From<TransformArgs> for TransformConfig {
    fn from(a: TransformArgs) -> Self {
        TransformConfig {
            train_data:     a.train_data,
            eval_data:      a.eval_data,
            output_dir:     a.output_dir,
            train_fraction: a.train_fraction,
            seed:           a.seed,
            num_shards:     a.num_shards,
        }
    }
}

// ─── shared loop flags ────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct LoopArgs {
    /// Maximum number of full passes through the training data
    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Epochs without val_loss improvement before stopping
    #[arg(long, default_value_t = 5)]
    pub patience: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// Training batches per epoch (cycles the data when larger)
    #[arg(long)]
    pub train_steps: Option<usize>,

    /// Validation batches per epoch
    #[arg(long)]
    pub eval_steps: Option<usize>,
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Output directory of the transform command
    #[arg(long, default_value = "output/transform")]
    pub transform_dir: String,

    /// Root under which timestamped model versions are written
    #[arg(long, default_value = "output/serving_model")]
    pub serving_model_dir: String,

    /// best_hyperparameters.json written by the tune command
    #[arg(long)]
    pub hyperparameters: Option<String>,

    /// Root for per-run metrics CSVs
    #[arg(long, default_value = "output/logs")]
    pub log_dir: String,

    #[command(flatten)]
    pub loop_args: LoopArgs,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            transform_dir:        a.transform_dir,
            serving_model_dir:    a.serving_model_dir,
            hyperparameters_file: a.hyperparameters,
            log_dir:              a.log_dir,
            epochs:               a.loop_args.epochs,
            batch_size:           a.loop_args.batch_size,
            patience:             a.loop_args.patience,
            seed:                 a.loop_args.seed,
            num_workers:          a.loop_args.num_workers,
            train_steps:          a.loop_args.train_steps,
            eval_steps:           a.loop_args.eval_steps,
        }
    }
}

// ─── tune ─────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TuneArgs {
    #[arg(long, default_value = "output/transform")]
    pub transform_dir: String,

    #[arg(long, default_value = "output/tuner")]
    pub working_dir: String,

    #[arg(long, default_value = "placement_tuning")]
    pub project_name: String,

    #[arg(long, default_value_t = 10)]
    pub max_trials: usize,

    #[command(flatten)]
    pub loop_args: LoopArgs,
}

impl From<TuneArgs> for TuneConfig {
    fn from(a: TuneArgs) -> Self {
        TuneConfig {
            transform_dir: a.transform_dir,
            working_dir:   a.working_dir,
            project_name:  a.project_name,
            max_trials:    a.max_trials,
            epochs:        a.loop_args.epochs,
            batch_size:    a.loop_args.batch_size,
            patience:      a.loop_args.patience,
            seed:          a.loop_args.seed,
            num_workers:   a.loop_args.num_workers,
            train_steps:   a.loop_args.train_steps,
            eval_steps:    a.loop_args.eval_steps,
            ..TuneConfig::default()
        }
    }
}

// ─── predict / health ─────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Root holding timestamped model versions; the latest is used
    #[arg(long, default_value = "output/serving_model")]
    pub model_dir: String,

    /// Transform output (or statistics directory) to use instead of
    /// the statistics stored with the model
    #[arg(long)]
    pub transform_dir: Option<String>,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[command(flatten)]
    pub serve: ServeArgs,

    /// Form field as key=value, e.g. --field gender=M (repeatable)
    #[arg(long = "field", value_parser = parse_key_val)]
    pub fields: Vec<(String, String)>,
}

fn parse_key_val(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => bail!("expected key=value, got '{s}'"),
    }
}
