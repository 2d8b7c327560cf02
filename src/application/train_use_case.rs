// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load transform statistics      (Layer 6 - infra)
//   Step 2: Read transformed shards        (Layer 4 - data)
//   Step 3: Pick hyperparameters           (tuner file or defaults)
//   Step 4: Run training loop              (Layer 5 - ml)
//   Step 5: Save a new model version with
//           statistics + config alongside  (Layer 6 - infra)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::{save_json, tune_use_case::load_best_hyperparameters};
use crate::data::{dataset::{PlacementDataset, PlacementItem}, shards::ShardReader, transform::TransformStats};
use crate::domain::{
    hyperparams::HyperParameters,
    record::TransformedRecord,
    schema::FeatureSchema,
    traits::RecordSource,
};
use crate::infra::{
    checkpoint::ModelStore,
    metrics::{EpochMetrics, MetricsLogger},
    transform_store::TransformStore,
    versions,
};
use crate::ml::trainer::{run_training, TrainSettings};

// ─── Training Configuration ──────────────────────────────────────────────────
// Serialisable so it is saved next to the model version it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Output directory of the transform stage
    pub transform_dir:        String,
    pub serving_model_dir:    String,
    /// `best_hyperparameters.json` from a tuning run
    pub hyperparameters_file: Option<String>,
    /// Per-run metrics CSVs are written below this directory
    pub log_dir:              String,
    pub epochs:               usize,
    pub batch_size:           usize,
    pub patience:             usize,
    pub seed:                 u64,
    pub num_workers:          usize,
    pub train_steps:          Option<usize>,
    pub eval_steps:           Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        let loop_defaults = TrainSettings::default();
        Self {
            transform_dir:        "output/transform".to_string(),
            serving_model_dir:    "output/serving_model".to_string(),
            hyperparameters_file: None,
            log_dir:              "output/logs".to_string(),
            epochs:               loop_defaults.epochs,
            batch_size:           loop_defaults.batch_size,
            patience:             loop_defaults.patience,
            seed:                 loop_defaults.seed,
            num_workers:          loop_defaults.num_workers,
            train_steps:          None,
            eval_steps:           None,
        }
    }
}

impl TrainConfig {
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
}

// ─── Transformed splits ──────────────────────────────────────────────────────
/// Both splits of the latest transform version, ready for batching.
pub struct TransformedSplits {
    pub version: String,
    pub stats:   TransformStats,
    pub train:   Vec<PlacementItem>,
    pub eval:    Vec<PlacementItem>,
}

impl TransformedSplits {
    pub fn load(transform_dir: &str) -> Result<Self> {
        let store   = TransformStore::new(transform_dir);
        let version = store.latest_version()?;
        let stats   = store.load_stats(&version)?;
        tracing::info!("Using transform version '{}'", version);

        let train = read_items(store.examples_dir(&version, "train"))?;
        let eval  = read_items(store.examples_dir(&version, "eval"))?;
        if train.is_empty() {
            bail!("training split of transform version '{version}' is empty");
        }
        if eval.is_empty() {
            bail!("evaluation split of transform version '{version}' is empty");
        }
        tracing::info!("Loaded {} train / {} eval records", train.len(), eval.len());

        Ok(Self { version, stats, train, eval })
    }
}

fn read_items(dir: PathBuf) -> Result<Vec<PlacementItem>> {
    let schema  = FeatureSchema::placement();
    let reader  = ShardReader::new(&[dir]);
    let records = <ShardReader as RecordSource<TransformedRecord>>::load_all(&reader)?;
    records
        .iter()
        .map(|r| PlacementItem::from_record(r, &schema))
        .collect()
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
/// What one training run produced.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub model_version:   String,
    pub hyperparameters: HyperParameters,
    pub final_metrics:   Option<EpochMetrics>,
    pub epochs_run:      usize,
    pub stopped_early:   bool,
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Steps 1 + 2: Statistics and transformed shards ────────────────────
        let splits = TransformedSplits::load(&cfg.transform_dir)?;

        // ── Step 3: Hyperparameters ───────────────────────────────────────────
        let hyperparameters = match &cfg.hyperparameters_file {
            Some(path) => {
                tracing::info!("Using tuned hyperparameters from '{}'", path);
                load_best_hyperparameters(path)?
            }
            None => {
                tracing::info!("No tuning result given; using default hyperparameters");
                HyperParameters::default()
            }
        };
        hyperparameters.validate()?;

        // ── Step 4: Train ─────────────────────────────────────────────────────
        let (_, log_dir) = versions::create_version_dir(&PathBuf::from(&cfg.log_dir))?;
        let metrics = MetricsLogger::new(&log_dir)?;

        let outcome = run_training(
            &cfg.settings(),
            &hyperparameters,
            PlacementDataset::new(splits.train),
            PlacementDataset::new(splits.eval),
            Some(&metrics),
        )?;

        // ── Step 5: Persist the model version ─────────────────────────────────
        let store   = ModelStore::new(&cfg.serving_model_dir);
        let version = store.save(&outcome.model, &outcome.config, Some(&splits.stats))?;
        save_json(&store.version_dir(&version).join("train_config.json"), cfg)?;

        tracing::info!(
            "Training complete: model version '{}' ({} epochs{}), metrics in '{}'",
            version,
            outcome.history.len(),
            if outcome.stopped_early { ", stopped early" } else { "" },
            metrics.csv_path().display(),
        );

        Ok(TrainReport {
            model_version:   version,
            hyperparameters,
            final_metrics:   outcome.final_metrics().cloned(),
            epochs_run:      outcome.history.len(),
            stopped_early:   outcome.stopped_early,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{
        test_support::write_raw_corpus,
        transform_use_case::{TransformConfig, TransformUseCase},
    };

    fn transformed(dir: &std::path::Path) -> String {
        let raw = write_raw_corpus(dir, 40);
        let out = dir.join("transform");
        TransformUseCase::new(TransformConfig {
            train_data: vec![raw.to_string_lossy().into_owned()],
            output_dir: out.to_string_lossy().into_owned(),
            ..Default::default()
        })
        .execute()
        .unwrap();
        out.to_string_lossy().into_owned()
    }

    fn quick_config(dir: &std::path::Path, transform_dir: String) -> TrainConfig {
        TrainConfig {
            transform_dir,
            serving_model_dir: dir.join("serving_model").to_string_lossy().into_owned(),
            log_dir:           dir.join("logs").to_string_lossy().into_owned(),
            epochs:            2,
            batch_size:        8,
            ..Default::default()
        }
    }

    #[test]
    fn test_train_saves_version_with_stats_and_config() {
        let dir    = tempfile::tempdir().unwrap();
        let config = quick_config(dir.path(), transformed(dir.path()));
        let report = TrainUseCase::new(config.clone()).execute().unwrap();

        assert_eq!(report.epochs_run, 2);
        assert_eq!(report.hyperparameters, HyperParameters::default());

        let store = ModelStore::new(&config.serving_model_dir);
        assert_eq!(store.latest_version().unwrap(), report.model_version);
        let version_dir = store.version_dir(&report.model_version);
        assert!(version_dir.join("train_config.json").is_file());
        assert!(store.load_stats(&report.model_version).unwrap().is_some());
    }

    #[test]
    fn test_tuned_hyperparameters_are_used() {
        let dir    = tempfile::tempdir().unwrap();
        let hp_file = dir.path().join("best_hyperparameters.json");
        std::fs::write(
            &hp_file,
            r#"{"values": {"embedding_dim": 4, "unit_1": 256}, "score": 0.9, "trials": []}"#,
        )
        .unwrap();

        let mut config = quick_config(dir.path(), transformed(dir.path()));
        config.epochs = 1;
        config.hyperparameters_file = Some(hp_file.to_string_lossy().into_owned());

        let report = TrainUseCase::new(config).execute().unwrap();
        assert_eq!(report.hyperparameters.embedding_dim, 4);
        assert_eq!(report.hyperparameters.unit_1, 256);
        assert_eq!(report.hyperparameters.unit_2, 64);
    }

    #[test]
    fn test_missing_transform_output_is_fatal() {
        let dir    = tempfile::tempdir().unwrap();
        let config = quick_config(dir.path(), dir.path().join("none").to_string_lossy().into_owned());
        assert!(TrainUseCase::new(config).execute().is_err());
    }
}
