// ============================================================
// Layer 3 — Core Traits
// ============================================================
// Seams between the layers:
//
//   RecordSource<T>      anything that yields a whole corpus of
//                        records (raw or transformed)
//                        impl: data::shards::ShardReader
//
//   PlacementClassifier  anything that turns one transformed
//                        record into a placement probability
//                        impl: ml::inferencer::Inferencer
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::record::TransformedRecord;

// ─── RecordSource ─────────────────────────────────────────────────────────────
/// A corpus that can be read in full.
/// Any read or decode failure is returned, never skipped.
pub trait RecordSource<T> {
    fn load_all(&self) -> Result<Vec<T>>;
}

// ─── PlacementClassifier ──────────────────────────────────────────────────────
/// Scores transformed records.
pub trait PlacementClassifier: Send + Sync {
    /// Probability of "Placed" for one record, in [0, 1].
    fn predict_proba(&self, record: &TransformedRecord) -> Result<f32>;
}
