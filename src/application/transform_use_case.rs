// ============================================================
// Layer 2 — TransformUseCase
// ============================================================
// Runs the feature transform stage in order:
//
//   Step 1: Read raw shards                (Layer 4 - data)
//   Step 2: Split train/eval if needed     (Layer 4 - data)
//   Step 3: Fit statistics on train only   (Layer 4 - data)
//   Step 4: Transform both splits          (Layer 4 - data)
//   Step 5: Write shards, then statistics  (Layer 6 - infra)
//
// Nothing is written until every record has transformed, and a
// version whose writes fail is removed again.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::application::save_json;
use crate::data::{
    shards::{ShardReader, ShardWriter},
    splitter::split_train_eval,
    transform::TransformStats,
};
use crate::domain::{record::RawRecord, schema::FeatureSchema, traits::RecordSource};
use crate::infra::{transform_store::TransformStore, versions};

// ─── Transform Configuration ─────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Raw training shards (files or directories)
    pub train_data:     Vec<String>,
    /// Raw evaluation shards; empty means split `train_data`
    pub eval_data:      Vec<String>,
    pub output_dir:     String,
    /// Share of a single corpus kept for training
    pub train_fraction: f64,
    pub seed:           u64,
    /// Output shards per split
    pub num_shards:     usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            train_data:     vec!["data".to_string()],
            eval_data:      Vec::new(),
            output_dir:     "output/transform".to_string(),
            train_fraction: 0.8,
            seed:           42,
            num_shards:     1,
        }
    }
}

/// What one transform run produced.
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub version:     String,
    pub stats_path:  PathBuf,
    pub train_files: Vec<PathBuf>,
    pub eval_files:  Vec<PathBuf>,
    pub train_count: usize,
    pub eval_count:  usize,
}

pub struct TransformUseCase {
    config: TransformConfig,
}

impl TransformUseCase {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TransformOutcome> {
        let cfg = &self.config;

        // ── Step 1: Read raw shards ───────────────────────────────────────────
        tracing::info!("Reading raw records from {:?}", cfg.train_data);
        let train_raw = read_raw(&cfg.train_data)?;

        // ── Step 2: Train / eval split ────────────────────────────────────────
        let (train_raw, eval_raw) = if cfg.eval_data.is_empty() {
            tracing::info!(
                "No evaluation shards given; splitting {} records {:.0}/{:.0}",
                train_raw.len(),
                cfg.train_fraction * 100.0,
                (1.0 - cfg.train_fraction) * 100.0,
            );
            split_train_eval(train_raw, cfg.train_fraction, cfg.seed)
        } else {
            (train_raw, read_raw(&cfg.eval_data)?)
        };
        if train_raw.is_empty() {
            bail!("training split is empty");
        }
        if eval_raw.is_empty() {
            bail!("evaluation split is empty");
        }

        // ── Step 3: Fit on the training split only ────────────────────────────
        let mut stats = TransformStats::fit(&train_raw, versions::timestamp())?;

        // ── Step 4: Transform both splits before anything is written ──────────
        let schema = FeatureSchema::placement();
        let encode = |records: &[RawRecord]| -> Result<Vec<Value>> {
            Ok(stats.apply_batch(records)?.iter().map(|r| r.to_json(&schema)).collect())
        };
        let train_values = encode(&train_raw)?;
        let eval_values  = encode(&eval_raw)?;

        // ── Step 5: Reserve a version and write it ────────────────────────────
        let store   = TransformStore::new(&cfg.output_dir);
        let version = store.create_version()?;
        stats.version = version.clone();

        let written = write_version(&store, &stats, cfg, &train_values, &eval_values);
        let (stats_path, train_files, eval_files) = match written {
            Ok(paths) => paths,
            Err(e) => {
                store.discard_version(&version);
                return Err(e);
            }
        };

        tracing::info!("Transform version '{}' complete", version);
        Ok(TransformOutcome {
            version,
            stats_path,
            train_files,
            eval_files,
            train_count: train_raw.len(),
            eval_count:  eval_raw.len(),
        })
    }
}

/// Shards first, statistics last: the statistics file marks the
/// version as complete.
fn write_version(
    store:  &TransformStore,
    stats:  &TransformStats,
    cfg:    &TransformConfig,
    train:  &[Value],
    eval:   &[Value],
) -> Result<(PathBuf, Vec<PathBuf>, Vec<PathBuf>)> {
    let mut written = Vec::with_capacity(2);
    for (split, values) in [("train", train), ("eval", eval)] {
        let files = ShardWriter::new(store.examples_dir(&stats.version, split), cfg.num_shards)
            .write_all(values)?;
        tracing::info!("Wrote {} transformed {} records in {} shards", values.len(), split, files.len());
        written.push(files);
    }
    let eval_files  = written.pop().unwrap_or_default();
    let train_files = written.pop().unwrap_or_default();

    let graph = store.graph_dir().join(&stats.version);
    save_json(&graph.join("transform_config.json"), cfg)?;
    let stats_path = store.save_stats(stats)?;
    Ok((stats_path, train_files, eval_files))
}

fn read_raw(locations: &[String]) -> Result<Vec<RawRecord>> {
    let reader  = ShardReader::new(locations);
    let records = <ShardReader as RecordSource<RawRecord>>::load_all(&reader)?;
    tracing::debug!("Loaded {} raw records", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::write_raw_corpus;
    use crate::domain::record::TransformedRecord;

    #[test]
    fn test_transform_writes_stats_and_both_splits() {
        let dir = tempfile::tempdir().unwrap();
        let raw = write_raw_corpus(dir.path(), 10);
        let out = dir.path().join("out");

        let outcome = TransformUseCase::new(TransformConfig {
            train_data: vec![raw.to_string_lossy().into_owned()],
            output_dir: out.to_string_lossy().into_owned(),
            ..Default::default()
        })
        .execute()
        .unwrap();

        assert_eq!(outcome.train_count, 8);
        assert_eq!(outcome.eval_count, 2);
        assert!(outcome.stats_path.is_file());
        assert!(outcome.stats_path.with_file_name("transform_config.json").is_file());

        let store = TransformStore::new(&out);
        let stats = store.load_stats(&outcome.version).unwrap();
        assert_eq!(stats.record_count, 8);

        let reader = ShardReader::new(&[store.examples_dir(&outcome.version, "train")]);
        let train  = <ShardReader as RecordSource<TransformedRecord>>::load_all(&reader).unwrap();
        assert_eq!(train.len(), 8);
        for r in &train {
            assert!(r.numeric.values().all(|x| (0.0..=1.0).contains(x)));
            assert!(r.categorical.values().all(|&i| i >= 0 && i < 101));
            assert!(r.label == 0.0 || r.label == 1.0);
        }
    }

    #[test]
    fn test_explicit_eval_shards_are_not_split() {
        let dir = tempfile::tempdir().unwrap();
        let raw = write_raw_corpus(dir.path(), 10).to_string_lossy().into_owned();
        let out = dir.path().join("out");

        let outcome = TransformUseCase::new(TransformConfig {
            train_data: vec![raw.clone()],
            eval_data:  vec![raw],
            output_dir: out.to_string_lossy().into_owned(),
            num_shards: 3,
            ..Default::default()
        })
        .execute()
        .unwrap();

        assert_eq!(outcome.train_count, 10);
        assert_eq!(outcome.eval_count, 10);
        assert_eq!(outcome.train_files.len(), 3);
    }

    #[test]
    fn test_failed_run_leaves_previous_version_latest() {
        let dir = tempfile::tempdir().unwrap();
        let raw = write_raw_corpus(dir.path(), 10).to_string_lossy().into_owned();
        let out = dir.path().join("out").to_string_lossy().into_owned();

        let good = TransformUseCase::new(TransformConfig {
            train_data: vec![raw],
            output_dir: out.clone(),
            ..Default::default()
        })
        .execute()
        .unwrap();

        let bad_raw = dir.path().join("bad.jsonl");
        std::fs::write(&bad_raw, r#"{"ssc_p": "sixty", "status": "Placed"}"#).unwrap();
        let failed = TransformUseCase::new(TransformConfig {
            train_data: vec![bad_raw.to_string_lossy().into_owned()],
            eval_data:  vec![bad_raw.to_string_lossy().into_owned()],
            output_dir: out.clone(),
            ..Default::default()
        })
        .execute();
        assert!(failed.is_err());

        let store = TransformStore::new(&out);
        assert_eq!(store.latest_version().unwrap(), good.version);
        assert_eq!(versions::list_versions(&store.graph_dir()).unwrap(), vec![good.version.clone()]);

        let splits = crate::application::train_use_case::TransformedSplits::load(&out).unwrap();
        assert_eq!(splits.version, good.version);
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = TransformUseCase::new(TransformConfig {
            train_data: vec![dir.path().join("nope").to_string_lossy().into_owned()],
            output_dir: dir.path().join("out").to_string_lossy().into_owned(),
            ..Default::default()
        })
        .execute();
        assert!(result.is_err());
    }
}
