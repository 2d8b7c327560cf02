// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Wraps one loaded model version and scores transformed records.
// Burn modules are Send but not Sync, so the model sits behind a
// Mutex to be shared by a service.
use anyhow::{anyhow, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use std::sync::Mutex;

use crate::data::{batcher::PlacementBatcher, dataset::PlacementItem};
use crate::domain::{record::TransformedRecord, schema::FeatureSchema, traits::PlacementClassifier};
use crate::infra::checkpoint::ModelStore;
use crate::ml::model::{PlacementModel, PlacementModelConfig};
use crate::ml::InferBackend;

pub struct Inferencer {
    model:   Mutex<PlacementModel<InferBackend>>,
    schema:  FeatureSchema,
    version: String,
    device:  <InferBackend as Backend>::Device,
}

impl Inferencer {
    /// Load the latest version in `store`.
    pub fn from_store(store: &ModelStore) -> Result<Self> {
        let version = store.latest_version()?;
        Self::from_version(store, &version)
    }

    pub fn from_version(store: &ModelStore, version: &str) -> Result<Self> {
        let device = <InferBackend as Backend>::Device::default();
        let (config, model) = store.load_model::<InferBackend>(version, &device)?;
        let inferencer = Self::from_model(model, config, version)?;
        tracing::info!("Model version '{}' ready for inference", version);
        Ok(inferencer)
    }

    pub fn from_model(
        model:   PlacementModel<InferBackend>,
        config:  PlacementModelConfig,
        version: impl Into<String>,
    ) -> Result<Self> {
        let schema = FeatureSchema::placement();
        config.check_inputs(&schema)?;
        Ok(Self {
            model: Mutex::new(model),
            schema,
            version: version.into(),
            device: Default::default(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// One probability per record, in input order.
    pub fn predict_batch(&self, records: &[TransformedRecord]) -> Result<Vec<f32>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let items = records
            .iter()
            .map(|r| PlacementItem::from_record(r, &self.schema))
            .collect::<Result<Vec<_>>>()?;

        let batch = PlacementBatcher::<InferBackend>::new(self.device.clone()).batch(items);

        let model = self.model.lock().map_err(|_| anyhow!("model lock poisoned"))?;
        let probs = model.forward(batch.numeric, batch.categorical);
        drop(model);

        probs
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Cannot read model output: {e:?}"))
    }
}

impl PlacementClassifier for Inferencer {
    fn predict_proba(&self, record: &TransformedRecord) -> Result<f32> {
        self.predict_batch(std::slice::from_ref(record))?
            .first()
            .copied()
            .ok_or_else(|| anyhow!("model returned no output"))
    }
}
