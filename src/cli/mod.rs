// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// Every command converts its arguments into an application
// config and delegates to Layer 2; results are printed here.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{bail, Result};
use clap::Parser;
use std::{collections::BTreeMap, path::Path};

use commands::{Commands, PredictArgs, ServeArgs, TrainArgs, TransformArgs, TuneArgs};

#[derive(Parser, Debug)]
#[command(
    name = "placement-dnn",
    version = "0.1.0",
    about = "Transform placement records, train and tune an embedding DNN, and predict placement."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Transform(args) => run_transform(args),
            Commands::Train(args)     => run_train(args),
            Commands::Tune(args)      => run_tune(args),
            Commands::Predict(args)   => run_predict(args),
            Commands::Health(args)    => run_health(args),
        }
    }
}

fn run_transform(args: TransformArgs) -> Result<()> {
    use crate::application::transform_use_case::TransformUseCase;

    let outcome = TransformUseCase::new(args.into()).execute()?;
    println!(
        "Transform version {}: {} train / {} eval records. Statistics: {}",
        outcome.version,
        outcome.train_count,
        outcome.eval_count,
        outcome.stats_path.display(),
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on transform output in: {}", args.transform_dir);
    let report = TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Model version {} saved.", report.model_version);
    if let Some(m) = report.final_metrics {
        println!(
            "Final epoch {}: val_loss={:.4} val_binary_accuracy={:.4}",
            m.epoch, m.val_loss, m.val_acc
        );
    }
    Ok(())
}

fn run_tune(args: TuneArgs) -> Result<()> {
    use crate::application::tune_use_case::TuneUseCase;

    let result = TuneUseCase::new(args.into()).execute()?;
    println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    Ok(())
}

fn load_service(args: &ServeArgs) -> crate::application::predict_use_case::PredictionService {
    use crate::application::predict_use_case::PredictionService;

    let service = PredictionService::new();
    let transform_dir = args.transform_dir.as_deref().map(Path::new);
    if let Err(e) = service.load(Path::new(&args.model_dir), transform_dir) {
        tracing::error!("Error loading model/transform: {e:#}");
    }
    service
}

fn run_predict(args: PredictArgs) -> Result<()> {
    let service = load_service(&args.serve);
    let form: BTreeMap<String, String> = args.fields.into_iter().collect();

    match service.predict(&form) {
        Ok(prediction) => {
            println!("{}", serde_json::to_string_pretty(&prediction)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_json())?);
            bail!("prediction failed with status {}", e.status_code())
        }
    }
}

fn run_health(args: ServeArgs) -> Result<()> {
    let service = load_service(&args);
    println!("{}", serde_json::to_string_pretty(&service.health())?);
    Ok(())
}
