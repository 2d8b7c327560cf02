// ============================================================
// Layer 6 — Model Store
// ============================================================
// Saves and restores trained model versions.
//
// What gets saved per version:
//   1. Model weights (.mpk.gz file) — learned parameters only,
//      no optimiser state
//   2. model_config.json            — hyperparameters + input names
//   3. transform_stats.json         — the statistics the model was
//                                     trained against
//
// The config is needed to rebuild the exact architecture before
// the weights can be loaded into it. It is written last, so only
// versions holding a model_config.json count as saved.
//
// Layout:
//   serving_model/
//     20240501093012/
//       model.mpk.gz
//       model_config.json
//       transform_stats.json
//     20240502110000/
//       ...
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::data::transform::TransformStats;
use crate::infra::{transform_store, versions};
use crate::ml::model::{PlacementModel, PlacementModelConfig};

const WEIGHTS_STEM:  &str = "model";
const CONFIG_FILE:   &str = "model_config.json";

/// Versioned model directories under one serving root.
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }

    /// Persist a model as a brand-new version and return its name.
    ///
    /// Uses Burn's CompactRecorder, which writes the record as
    /// gzip-compressed MessagePack to `<version>/model.mpk.gz`.
    pub fn save<B: Backend>(
        &self,
        model:  &PlacementModel<B>,
        config: &PlacementModelConfig,
        stats:  Option<&TransformStats>,
    ) -> Result<String> {
        let (version, dir) = versions::create_version_dir(&self.root)?;

        if let Err(e) = write_version(&dir, model, config, stats) {
            versions::discard(&dir);
            return Err(e);
        }

        tracing::info!("Saved model version '{}' to '{}'", version, dir.display());
        Ok(version)
    }

    /// Name of the lexicographically greatest version.
    pub fn latest_version(&self) -> Result<String> {
        match versions::latest_version(&self.root, CONFIG_FILE)? {
            Some(v) => Ok(v),
            None => bail!(
                "No model versions found in '{}'. Have you run 'train' first?",
                self.root.display()
            ),
        }
    }

    pub fn load_config(&self, version: &str) -> Result<PlacementModelConfig> {
        let path = self.version_dir(version).join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed model config '{}'", path.display()))
    }

    /// Rebuild the architecture from the saved config, then load weights.
    pub fn load_model<B: Backend>(
        &self,
        version: &str,
        device:  &B::Device,
    ) -> Result<(PlacementModelConfig, PlacementModel<B>)> {
        let config = self.load_config(version)?;
        let path   = self.version_dir(version).join(WEIGHTS_STEM);

        tracing::info!("Loading model version '{}'", version);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load model weights '{}'", path.display()))?;

        let model: PlacementModel<B> = config.init(device);
        Ok((config, model.load_record(record)))
    }

    /// The statistics stored alongside a version, if any.
    pub fn load_stats(&self, version: &str) -> Result<Option<TransformStats>> {
        let dir = self.version_dir(version);
        if !transform_store::stats_path(&dir).exists() {
            return Ok(None);
        }
        transform_store::read_stats(&dir).map(Some)
    }
}

fn write_version<B: Backend>(
    dir:    &Path,
    model:  &PlacementModel<B>,
    config: &PlacementModelConfig,
    stats:  Option<&TransformStats>,
) -> Result<()> {
    let weights = dir.join(WEIGHTS_STEM);
    CompactRecorder::new()
        .record(model.clone().into_record(), weights.clone())
        .with_context(|| format!("Failed to save model to '{}'", weights.display()))?;

    if let Some(stats) = stats {
        transform_store::write_stats(dir, stats)?;
    }

    let config_path = dir.join(CONFIG_FILE);
    fs::write(&config_path, serde_json::to_string_pretty(config)?)
        .with_context(|| format!("Cannot write '{}'", config_path.display()))?;
    Ok(())
}
