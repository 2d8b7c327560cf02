// ============================================================
// Layer 4 — Feature Transform
// ============================================================
// Two phases:
//
//   fit    one pass over the training corpus
//          numeric      → observed (min, max)
//          categorical  → vocabulary ordered by frequency
//
//   apply  pure mapping raw record → transformed record
//          numeric      → (x - min) / (max - min), no clipping
//          categorical  → vocabulary index, unseen → 0
//          label        → 1.0 iff exactly "Placed", else 0.0
//
// Vocabulary layout for one feature (VOCAB_SIZE = 101):
//
//   index 0        out-of-vocabulary bucket
//   index 1..=100  fitted values, most frequent first,
//                  ties broken by byte order
//
// Indices are stable only within one fitted TransformStats.
//
// Absent raw fields are permissive: numeric → 0.0,
// categorical / label → "" (each one logged as a warning).
// A numeric field holding a non-numeric string is an error.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::domain::record::{RawRecord, TransformedRecord};
use crate::domain::schema::{
    transformed_name, CATEGORICAL_FEATURES, LABEL_KEY, NUMERICAL_FEATURES, OOV_INDEX,
    POSITIVE_LABEL, VOCAB_SIZE,
};

#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("field '{field}' is not numeric: {value}")]
    InvalidNumeric { field: String, value: String },

    #[error("cannot fit transform statistics on an empty corpus")]
    EmptyCorpus,
}

// ─── MinMax ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    fn observe(&mut self, x: f64) {
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    /// Linear rescale with the fitted range.
    ///
    /// A degenerate range (max == min) maps through
    /// sigmoid(x - min): 0.5 at the observed value, monotonic.
    pub fn scale(&self, x: f64) -> f64 {
        let range = self.max - self.min;
        if range > 0.0 {
            (x - self.min) / range
        } else {
            1.0 / (1.0 + (-(x - self.min)).exp())
        }
    }
}

// ─── Vocabulary ───────────────────────────────────────────────────────────────
/// Serialised as the plain list of fitted values; the lookup
/// table is rebuilt on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    /// Fitted values in index order; `values[i]` has index `i + 1`.
    values: Vec<String>,
    index:  HashMap<String, i64>,
}

impl Vocabulary {
    /// Build from value counts, most frequent first, capped at
    /// `max_size` entries (the OOV slot is not counted).
    pub fn from_counts(counts: HashMap<String, usize>, max_size: usize) -> Self {
        let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(max_size);
        Self::from_values(entries.into_iter().map(|(v, _)| v).collect())
    }

    fn from_values(values: Vec<String>) -> Self {
        let index = values
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i as i64 + 1))
            .collect();
        Self { values, index }
    }

    pub fn lookup(&self, value: &str) -> i64 {
        self.index.get(value).copied().unwrap_or(OOV_INDEX)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(values: Vec<String>) -> Self {
        Self::from_values(values)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.values
    }
}

// ─── TransformStats ───────────────────────────────────────────────────────────
/// Fitted statistics, produced once per pipeline run and read-only
/// for every downstream stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStats {
    pub version:      String,
    pub record_count: usize,
    /// raw numeric field → fitted range
    pub numeric:      BTreeMap<String, MinMax>,
    /// raw categorical field → fitted vocabulary
    pub vocabularies: BTreeMap<String, Vocabulary>,
}

impl TransformStats {
    /// Analyse the training corpus.
    pub fn fit(records: &[RawRecord], version: impl Into<String>) -> Result<Self> {
        if records.is_empty() {
            return Err(TransformError::EmptyCorpus.into());
        }

        let mut numeric: BTreeMap<String, MinMax> = NUMERICAL_FEATURES
            .iter()
            .map(|f| (f.to_string(), MinMax { min: f64::INFINITY, max: f64::NEG_INFINITY }))
            .collect();
        let mut counts: BTreeMap<&str, HashMap<String, usize>> = CATEGORICAL_FEATURES
            .iter()
            .map(|f| (*f, HashMap::new()))
            .collect();

        for record in records {
            for feature in NUMERICAL_FEATURES {
                let x = read_numeric(record, feature)?;
                if let Some(range) = numeric.get_mut(feature) {
                    range.observe(x);
                }
            }
            for feature in CATEGORICAL_FEATURES {
                let value = read_categorical(record, feature);
                if let Some(c) = counts.get_mut(feature) {
                    *c.entry(value).or_insert(0) += 1;
                }
            }
        }

        let vocabularies = counts
            .into_iter()
            .map(|(f, c)| (f.to_string(), Vocabulary::from_counts(c, VOCAB_SIZE - 1)))
            .collect();

        let stats = Self {
            version: version.into(),
            record_count: records.len(),
            numeric,
            vocabularies,
        };
        tracing::info!(
            "Fitted transform on {} records ({} numeric, {} categorical features)",
            stats.record_count,
            stats.numeric.len(),
            stats.vocabularies.len()
        );
        Ok(stats)
    }

    /// Map one raw record. Same input, same output, for the
    /// lifetime of these statistics.
    pub fn apply(&self, record: &RawRecord) -> Result<TransformedRecord> {
        let mut out = TransformedRecord::default();

        for (feature, range) in &self.numeric {
            let x = read_numeric(record, feature)?;
            out.numeric.insert(transformed_name(feature), range.scale(x) as f32);
        }
        for (feature, vocab) in &self.vocabularies {
            let value = read_categorical(record, feature);
            out.categorical.insert(transformed_name(feature), vocab.lookup(&value));
        }
        out.label = label_value(record);
        Ok(out)
    }

    pub fn apply_batch(&self, records: &[RawRecord]) -> Result<Vec<TransformedRecord>> {
        records.iter().map(|r| self.apply(r)).collect()
    }
}

/// Explicit cast of a numeric field to f64.
/// JSON numbers and numeric strings are accepted; absent → 0.0.
/// NaN and infinities are rejected like any other non-number.
pub fn read_numeric(record: &RawRecord, field: &str) -> Result<f64> {
    let parsed = match record.get(field) {
        None | Some(Value::Null) => {
            tracing::warn!("Missing numeric field '{}', defaulting to 0.0", field);
            return Ok(0.0);
        }
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| invalid(field, &n.to_string()))?,
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| invalid(field, s))?,
        Some(other) => return Err(invalid(field, &other.to_string())),
    };
    if !parsed.is_finite() {
        return Err(invalid(field, &parsed.to_string()));
    }
    Ok(parsed)
}

fn read_categorical(record: &RawRecord, field: &str) -> String {
    record.get_str(field).unwrap_or_else(|| {
        tracing::warn!("Missing categorical field '{}', defaulting to \"\"", field);
        String::new()
    })
}

/// 1.0 iff the raw label is exactly "Placed"
pub fn label_value(record: &RawRecord) -> f32 {
    match record.get_str(LABEL_KEY) {
        Some(label) if label == POSITIVE_LABEL => 1.0,
        Some(_) => 0.0,
        None => {
            tracing::warn!("Missing label field '{}', treating as negative", LABEL_KEY);
            0.0
        }
    }
}

fn invalid(field: &str, value: &str) -> anyhow::Error {
    TransformError::InvalidNumeric { field: field.to_string(), value: value.to_string() }.into()
}

// ─── Fallback Preprocessing ───────────────────────────────────────────────────
// Hard-coded stand-in used only when no fitted statistics can be
// found at prediction time: x / 100 for percentages and a literal
// table per categorical field. It does NOT reproduce the fitted
// vocabulary order, so every use is flagged to the caller.
pub struct FallbackPreprocessor;

impl FallbackPreprocessor {
    fn table(feature: &str) -> &'static [(&'static str, i64)] {
        match feature {
            "gender"         => &[("M", 0), ("F", 1)],
            "ssc_b"          => &[("Central", 0), ("Others", 1)],
            "hsc_b"          => &[("Central", 0), ("Others", 1)],
            "hsc_s"          => &[("Commerce", 0), ("Science", 1), ("Arts", 2)],
            "degree_t"       => &[("Comm&Mgmt", 0), ("Sci&Tech", 1), ("Others", 2)],
            "workex"         => &[("No", 0), ("Yes", 1)],
            "specialisation" => &[("Mkt&Fin", 0), ("Mkt&HR", 1)],
            _                => &[],
        }
    }

    pub fn apply(&self, record: &RawRecord) -> Result<TransformedRecord> {
        let mut out = TransformedRecord::default();
        for feature in NUMERICAL_FEATURES {
            let x = read_numeric(record, feature)?;
            out.numeric.insert(transformed_name(feature), (x / 100.0) as f32);
        }
        for feature in CATEGORICAL_FEATURES {
            let value = read_categorical(record, feature);
            let index = Self::table(feature)
                .iter()
                .find(|(v, _)| *v == value)
                .map(|(_, i)| *i)
                .unwrap_or(0);
            out.categorical.insert(transformed_name(feature), index);
        }
        out.label = label_value(record);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> RawRecord {
        RawRecord::from_json_object(v.as_object().cloned().unwrap())
    }

    fn scenario() -> RawRecord {
        record(json!({
            "ssc_p": 80, "hsc_p": 75, "degree_p": 70, "etest_p": 65, "mba_p": 60,
            "gender": "M", "ssc_b": "Central", "hsc_b": "Central", "hsc_s": "Science",
            "degree_t": "Sci&Tech", "workex": "Yes", "specialisation": "Mkt&Fin",
            "status": "Placed"
        }))
    }

    fn corpus() -> Vec<RawRecord> {
        vec![
            scenario(),
            record(json!({
                "sl_no": 2, "ssc_p": "55.0", "hsc_p": 50, "degree_p": 58, "etest_p": 90, "mba_p": 52,
                "gender": "F", "ssc_b": "Others", "hsc_b": "Others", "hsc_s": "Commerce",
                "degree_t": "Comm&Mgmt", "workex": "No", "specialisation": "Mkt&HR",
                "status": "Not Placed", "salary": null
            })),
            record(json!({
                "ssc_p": 91, "hsc_p": 88, "degree_p": 84, "etest_p": 50, "mba_p": 76,
                "gender": "M", "ssc_b": "Central", "hsc_b": "Others", "hsc_s": "Commerce",
                "degree_t": "Comm&Mgmt", "workex": "No", "specialisation": "Mkt&Fin",
                "status": "Placed"
            })),
        ]
    }

    #[test]
    fn test_fit_observes_min_max() {
        let stats = TransformStats::fit(&corpus(), "v1").unwrap();
        assert_eq!(stats.numeric["ssc_p"], MinMax { min: 55.0, max: 91.0 });
        assert_eq!(stats.numeric["etest_p"], MinMax { min: 50.0, max: 90.0 });
        assert_eq!(stats.record_count, 3);
    }

    #[test]
    fn test_vocabulary_orders_by_frequency_then_value() {
        let stats = TransformStats::fit(&corpus(), "v1").unwrap();
        // Commerce ×2, Science ×1
        assert_eq!(stats.vocabularies["hsc_s"].values(), &["Commerce", "Science"]);
        // Central ×1, Others ×2 for hsc_b
        assert_eq!(stats.vocabularies["hsc_b"].lookup("Others"), 1);
        assert_eq!(stats.vocabularies["hsc_b"].lookup("Central"), 2);
        // gender: M ×2, F ×1
        assert_eq!(stats.vocabularies["gender"].lookup("M"), 1);
        assert_eq!(stats.vocabularies["gender"].lookup("F"), 2);
    }

    #[test]
    fn test_vocabulary_is_capped() {
        let counts: HashMap<String, usize> =
            (0..300).map(|i| (format!("v{i:03}"), 300 - i)).collect();
        let vocab = Vocabulary::from_counts(counts, VOCAB_SIZE - 1);
        assert_eq!(vocab.len(), 100);
        assert_eq!(vocab.lookup("v000"), 1);
        assert_eq!(vocab.lookup("v099"), 100);
        assert_eq!(vocab.lookup("v100"), OOV_INDEX);
    }

    #[test]
    fn test_unseen_value_maps_to_oov() {
        let stats = TransformStats::fit(&corpus(), "v1").unwrap();
        let mut r = scenario();
        r.set("hsc_s", "Arts");
        let t = stats.apply(&r).unwrap();
        assert_eq!(t.categorical["hsc_s_xf"], OOV_INDEX);
    }

    #[test]
    fn test_scaling_in_range_and_monotonic() {
        let stats = TransformStats::fit(&corpus(), "v1").unwrap();
        let range = stats.numeric["mba_p"];
        let mut last = f64::NEG_INFINITY;
        let mut x = range.min;
        while x <= range.max {
            let y = range.scale(x);
            assert!((0.0..=1.0).contains(&y));
            assert!(y >= last);
            last = y;
            x += 0.5;
        }
    }

    #[test]
    fn test_no_clipping_outside_fitted_range() {
        let range = MinMax { min: 50.0, max: 90.0 };
        assert!(range.scale(100.0) > 1.0);
        assert!(range.scale(40.0) < 0.0);
    }

    #[test]
    fn test_degenerate_range_is_finite() {
        let range = MinMax { min: 60.0, max: 60.0 };
        assert_eq!(range.scale(60.0), 0.5);
        assert!(range.scale(61.0) > range.scale(59.0));
    }

    #[test]
    fn test_label_is_exact_match() {
        let mut r = scenario();
        assert_eq!(label_value(&r), 1.0);
        r.set("status", "placed");
        assert_eq!(label_value(&r), 0.0);
        r.set("status", "Not Placed");
        assert_eq!(label_value(&r), 0.0);
    }

    #[test]
    fn test_scenario_record_transform() {
        let stats = TransformStats::fit(&corpus(), "v1").unwrap();
        let t = stats.apply(&scenario()).unwrap();
        assert_eq!(t.label, 1.0);
        assert_eq!(t.numeric.len(), 5);
        assert!(t.numeric.values().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(t.categorical.len(), 7);
        assert!(t.categorical.values().all(|v| (0..VOCAB_SIZE as i64).contains(v)));
    }

    #[test]
    fn test_apply_is_deterministic() {
        let stats = TransformStats::fit(&corpus(), "v1").unwrap();
        assert_eq!(stats.apply(&scenario()).unwrap(), stats.apply(&scenario()).unwrap());
    }

    #[test]
    fn test_missing_fields_default() {
        let stats = TransformStats::fit(&corpus(), "v1").unwrap();
        let t = stats.apply(&RawRecord::new()).unwrap();
        assert_eq!(t.label, 0.0);
        assert_eq!(t.categorical["gender_xf"], OOV_INDEX);
        // 0.0 lies below every fitted minimum
        assert!(t.numeric["ssc_p_xf"] < 0.0);
    }

    #[test]
    fn test_non_numeric_string_is_rejected() {
        let stats = TransformStats::fit(&corpus(), "v1").unwrap();
        let mut r = scenario();
        r.set("mba_p", "sixty");
        let err = stats.apply(&r).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransformError>(),
            Some(&TransformError::InvalidNumeric { field: "mba_p".into(), value: "sixty".into() })
        );
    }

    #[test]
    fn test_non_finite_strings_are_rejected() {
        let stats = TransformStats::fit(&corpus(), "v1").unwrap();
        for bad in ["NaN", "inf", "-infinity"] {
            let mut r = scenario();
            r.set("ssc_p", bad);
            let err = stats.apply(&r).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<TransformError>(),
                Some(TransformError::InvalidNumeric { field, .. }) if field == "ssc_p"
            ));
            assert!(FallbackPreprocessor.apply(&r).is_err());
        }
    }

    #[test]
    fn test_fit_rejects_non_finite_values() {
        let mut records = corpus();
        records[0].set("mba_p", "inf");
        assert!(TransformStats::fit(&records, "v1").is_err());

        let mut records = corpus();
        records[1].set("ssc_p", "NaN");
        let err = TransformStats::fit(&records, "v1").unwrap_err();
        assert!(err.downcast_ref::<TransformError>().is_some());
    }

    #[test]
    fn test_empty_corpus_is_rejected() {
        assert!(TransformStats::fit(&[], "v1").is_err());
    }

    #[test]
    fn test_vocabulary_lookup_works_after_reload() {
        let stats = TransformStats::fit(&corpus(), "v1").unwrap();
        let json  = serde_json::to_string(&stats).unwrap();
        let back: TransformStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
        assert_eq!(back.apply(&scenario()).unwrap(), stats.apply(&scenario()).unwrap());
    }

    #[test]
    fn test_fallback_uses_fixed_tables() {
        let t = FallbackPreprocessor.apply(&scenario()).unwrap();
        assert!((t.numeric["ssc_p_xf"] - 0.8).abs() < 1e-6);
        assert_eq!(t.categorical["gender_xf"], 0);
        assert_eq!(t.categorical["hsc_s_xf"], 1);
        assert_eq!(t.categorical["workex_xf"], 1);
    }
}
