// ============================================================
// Layer 2 — TuneUseCase
// ============================================================
// Random search over the hyperparameter grid. Every trial trains
// a fresh model with the same loop as `train`; nothing is saved
// except the trial records:
//
//   <working_dir>/<project_name>/
//     tune_config.json
//     trial_01.json
//     trial_02.json
//     ...
//     best_hyperparameters.json   ← read back by `train`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs, path::{Path, PathBuf}};

use crate::application::{save_json, train_use_case::TransformedSplits};
use crate::data::dataset::PlacementDataset;
use crate::domain::hyperparams::{HyperParameters, SearchSpace};
use crate::ml::{
    trainer::{run_training, TrainSettings},
    tuner::{RandomSearch, SearchResult},
};

pub const BEST_FILE: &str = "best_hyperparameters.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuneConfig {
    pub transform_dir: String,
    pub working_dir:   String,
    pub project_name:  String,
    pub max_trials:    usize,
    pub space:         SearchSpace,
    pub epochs:        usize,
    pub batch_size:    usize,
    pub patience:      usize,
    pub seed:          u64,
    pub num_workers:   usize,
    pub train_steps:   Option<usize>,
    pub eval_steps:    Option<usize>,
}

impl Default for TuneConfig {
    fn default() -> Self {
        let loop_defaults = TrainSettings::default();
        Self {
            transform_dir: "output/transform".to_string(),
            working_dir:   "output/tuner".to_string(),
            project_name:  "placement_tuning".to_string(),
            max_trials:    10,
            space:         SearchSpace::default(),
            epochs:        loop_defaults.epochs,
            batch_size:    loop_defaults.batch_size,
            patience:      loop_defaults.patience,
            seed:          loop_defaults.seed,
            num_workers:   loop_defaults.num_workers,
            train_steps:   None,
            eval_steps:    None,
        }
    }
}

impl TuneConfig {
    pub fn settings(&self) -> TrainSettings {
        TrainSettings {
            epochs:      self.epochs,
            batch_size:  self.batch_size,
            patience:    self.patience,
            seed:        self.seed,
            num_workers: self.num_workers,
            train_steps: self.train_steps,
            eval_steps:  self.eval_steps,
        }
    }

    pub fn project_dir(&self) -> PathBuf {
        Path::new(&self.working_dir).join(&self.project_name)
    }
}

pub struct TuneUseCase {
    config: TuneConfig,
}

impl TuneUseCase {
    pub fn new(config: TuneConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<SearchResult> {
        let cfg = &self.config;

        let splits = TransformedSplits::load(&cfg.transform_dir)?;

        let project_dir = cfg.project_dir();
        fs::create_dir_all(&project_dir)
            .with_context(|| format!("Cannot create '{}'", project_dir.display()))?;
        save_json(&project_dir.join("tune_config.json"), cfg)?;

        let settings = cfg.settings();
        let search   = RandomSearch::new(cfg.space.clone(), cfg.max_trials, cfg.seed);

        let result = search.run(
            |_, hp| {
                let outcome = run_training(
                    &settings,
                    hp,
                    PlacementDataset::new(splits.train.clone()),
                    PlacementDataset::new(splits.eval.clone()),
                    None,
                )?;
                Ok(outcome.best_val_accuracy())
            },
            |trial| save_json(&project_dir.join(format!("trial_{:02}.json", trial.number)), &trial.to_json()),
        )?;

        let best_path = project_dir.join(BEST_FILE);
        save_json(&best_path, &result.to_json())?;
        tracing::info!("Best hyperparameters written to '{}'", best_path.display());

        Ok(result)
    }
}

/// Read the `values` mapping of a tuning result file.
pub fn load_best_hyperparameters(path: impl AsRef<Path>) -> Result<HyperParameters> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read hyperparameters from '{}'", path.display()))?;
    let doc: Value = serde_json::from_str(&json)
        .with_context(|| format!("Malformed hyperparameters file '{}'", path.display()))?;

    let values = doc
        .get("values")
        .and_then(Value::as_object)
        .with_context(|| format!("'{}' has no \"values\" object", path.display()))?;

    Ok(HyperParameters::from_values(values)?)
}
