// ============================================================
// Layer 2 — Prediction Service
// ============================================================
// Answers one form submission at a time:
//
//   form fields ─► required-field check ─► RawRecord
//               ─► fitted statistics (or fallback preprocessing)
//               ─► classifier ─► Prediction
//
// The loaded model and statistics live in one immutable
// LoadedPipeline behind an Arc. A reload builds a new pipeline
// and swaps the handle; requests already running keep the old one.
//
// Errors carry the status code a serving shell should answer with.

use anyhow::Result;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};
use thiserror::Error;

use crate::data::transform::{FallbackPreprocessor, TransformError, TransformStats};
use crate::domain::{
    record::{RawRecord, TransformedRecord},
    schema::{required_input_fields, POSITIVE_LABEL},
    traits::PlacementClassifier,
};
use crate::infra::{checkpoint::ModelStore, transform_store::TransformStore};
use crate::ml::inferencer::Inferencer;

pub const NEGATIVE_LABEL: &str = "Not Placed";

// ─── Errors ───────────────────────────────────────────────────────────────────
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Model not loaded. Please check server logs.")]
    Unavailable,

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Inference(String),
}

impl ServeError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServeError::Unavailable        => 503,
            ServeError::MissingFields(_)   => 400,
            ServeError::InvalidInput(_)    => 400,
            ServeError::Inference(_)       => 500,
        }
    }

    /// Response body for this error
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "status": "error", "message": self.to_string() })
    }
}

// ─── Responses ────────────────────────────────────────────────────────────────
/// Which preprocessing produced the model inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Preprocessing {
    /// The fitted transform statistics
    Fitted,
    /// Hard-coded x/100 and literal tables; results may differ
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub status:        &'static str,
    pub prediction:    &'static str,
    pub probability:   f64,
    pub confidence:    f64,
    pub preprocessing: Preprocessing,
}

impl Prediction {
    pub fn from_probability(p: f32, preprocessing: Preprocessing) -> Self {
        let p = f64::from(p);
        Self {
            status:      "success",
            prediction:  if p > 0.5 { POSITIVE_LABEL } else { NEGATIVE_LABEL },
            probability: round4(p),
            confidence:  round4((p - 0.5).abs() * 2.0),
            preprocessing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status:           &'static str,
    pub model_loaded:     bool,
    pub transform_loaded: bool,
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

// ─── Loaded pipeline ──────────────────────────────────────────────────────────
pub struct LoadedPipeline {
    classifier:    Box<dyn PlacementClassifier>,
    stats:         Option<TransformStats>,
    model_version: String,
}

impl LoadedPipeline {
    pub fn new(
        classifier:    Box<dyn PlacementClassifier>,
        stats:         Option<TransformStats>,
        model_version: impl Into<String>,
    ) -> Self {
        Self { classifier, stats, model_version: model_version.into() }
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    fn preprocess(&self, record: &RawRecord) -> Result<(TransformedRecord, Preprocessing)> {
        match &self.stats {
            Some(stats) => Ok((stats.apply(record)?, Preprocessing::Fitted)),
            None => {
                tracing::warn!("Transform statistics not loaded, using fallback preprocessing");
                Ok((FallbackPreprocessor.apply(record)?, Preprocessing::Fallback))
            }
        }
    }
}

// ─── Service ──────────────────────────────────────────────────────────────────
#[derive(Default)]
pub struct PredictionService {
    pipeline: RwLock<Option<Arc<LoadedPipeline>>>,
}

impl PredictionService {
    /// A service with nothing loaded; every prediction is Unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the latest model version under `model_dir`.
    ///
    /// Statistics come from, in order: `transform_dir` when given,
    /// the copy stored with the model version, or nowhere (fallback
    /// preprocessing).
    pub fn load(&self, model_dir: &Path, transform_dir: Option<&Path>) -> Result<()> {
        let store      = ModelStore::new(model_dir);
        let inferencer = Inferencer::from_store(&store)?;
        let version    = inferencer.version().to_string();

        let mut stats = None;
        if let Some(dir) = transform_dir {
            match TransformStore::resolve(dir) {
                Ok(s) => {
                    tracing::info!("Transform statistics '{}' loaded from '{}'", s.version, dir.display());
                    stats = Some(s);
                }
                Err(e) => tracing::warn!("Cannot load transform statistics from '{}': {e:#}", dir.display()),
            }
        }
        if stats.is_none() {
            stats = store.load_stats(&version)?;
            if stats.is_some() {
                tracing::info!("Using transform statistics stored with model version '{}'", version);
            }
        }
        if stats.is_none() {
            tracing::warn!("Transform statistics not found, using simplified preprocessing");
        }

        self.install(LoadedPipeline::new(Box::new(inferencer), stats, version));
        Ok(())
    }

    /// Swap in a new pipeline.
    pub fn install(&self, pipeline: LoadedPipeline) {
        let mut slot = self.pipeline.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(pipeline));
    }

    pub fn current(&self) -> Option<Arc<LoadedPipeline>> {
        self.pipeline.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn predict(&self, form: &BTreeMap<String, String>) -> Result<Prediction, ServeError> {
        let pipeline = self.current().ok_or(ServeError::Unavailable)?;

        let missing: Vec<String> = required_input_fields()
            .into_iter()
            .filter(|f| !form.contains_key(*f))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ServeError::MissingFields(missing));
        }

        let record = RawRecord::from_strings(form.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let (inputs, preprocessing) = pipeline.preprocess(&record).map_err(|e| {
            match e.downcast_ref::<TransformError>() {
                Some(invalid) => ServeError::InvalidInput(invalid.to_string()),
                None => ServeError::Inference(format!("{e:#}")),
            }
        })?;

        let p = pipeline.classifier.predict_proba(&inputs).map_err(|e| {
            tracing::error!("Prediction error: {e:#}");
            ServeError::Inference(format!("{e:#}"))
        })?;
        if !p.is_finite() {
            return Err(ServeError::Inference(format!("model produced a non-finite probability ({p})")));
        }

        let prediction = Prediction::from_probability(p, preprocessing);
        tracing::debug!(
            "Predicted {} (p={:.4}) with model version '{}'",
            prediction.prediction,
            prediction.probability,
            pipeline.model_version(),
        );
        Ok(prediction)
    }

    pub fn health(&self) -> HealthStatus {
        let pipeline = self.current();
        HealthStatus {
            status:           "healthy",
            model_loaded:     pipeline.is_some(),
            transform_loaded: pipeline.as_ref().is_some_and(|p| p.stats.is_some()),
        }
    }
}
