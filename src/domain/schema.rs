// ============================================================
// Layer 3 — Feature Schema
// ============================================================
// The fixed raw schema of a placement record and the naming
// convention used for every transformed feature.
//
//   raw field        transformed field
//   ─────────        ─────────────────
//   ssc_p       →    ssc_p_xf          (f32 in [0,1] for fitted range)
//   gender      →    gender_xf         (i64 vocabulary index)
//   status      →    status_xf         (f32 label, 0.0 or 1.0)
//
// Transformed names always end in "_xf", so they can never
// collide with a raw field name.

/// Percentage fields, rescaled with fitted min/max.
pub const NUMERICAL_FEATURES: [&str; 5] = [
    "ssc_p",
    "hsc_p",
    "degree_p",
    "etest_p",
    "mba_p",
];

/// String fields, replaced by a vocabulary index.
pub const CATEGORICAL_FEATURES: [&str; 7] = [
    "gender",
    "ssc_b",
    "hsc_b",
    "hsc_s",
    "degree_t",
    "workex",
    "specialisation",
];

/// Raw label field
pub const LABEL_KEY: &str = "status";

/// The only label value that maps to 1.0 (exact, case-sensitive)
pub const POSITIVE_LABEL: &str = "Placed";

/// Present in the source data but leak the label or carry no signal.
pub const FEATURES_TO_DROP: [&str; 2] = ["sl_no", "salary"];

/// Rows in every categorical embedding table.
pub const VOCAB_SIZE: usize = 101;

/// Index reserved for values not seen while fitting
pub const OOV_INDEX: i64 = 0;

pub const TRANSFORMED_SUFFIX: &str = "_xf";

pub fn transformed_name(key: &str) -> String {
    format!("{key}{TRANSFORMED_SUFFIX}")
}

/// Every raw input field a prediction request must carry
/// (numerics first, then categoricals; label excluded).
pub fn required_input_fields() -> Vec<&'static str> {
    NUMERICAL_FEATURES
        .iter()
        .chain(CATEGORICAL_FEATURES.iter())
        .copied()
        .collect()
}

/// Kind of value stored under a transformed feature name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Scaled numeric, float32 rank-2 model input
    Float,
    /// Vocabulary index, int64 rank-2 model input
    Int,
    /// Binary label, never a model input
    Label,
}

/// Ordered transformed feature names with their kinds.
///
/// The same order is used to decode transformed shards, to
/// stack batch tensors and to name the model inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    pub numeric:     Vec<String>,
    pub categorical: Vec<String>,
    pub label:       String,
}

impl FeatureSchema {
    pub fn placement() -> Self {
        Self {
            numeric:     NUMERICAL_FEATURES.iter().map(|k| transformed_name(k)).collect(),
            categorical: CATEGORICAL_FEATURES.iter().map(|k| transformed_name(k)).collect(),
            label:       transformed_name(LABEL_KEY),
        }
    }

    /// (name, kind) pairs: numerics, categoricals, then the label
    pub fn transformed_features(&self) -> Vec<(String, FeatureKind)> {
        let mut features: Vec<(String, FeatureKind)> = self
            .numeric
            .iter()
            .map(|n| (n.clone(), FeatureKind::Float))
            .collect();
        features.extend(self.categorical.iter().map(|n| (n.clone(), FeatureKind::Int)));
        features.push((self.label.clone(), FeatureKind::Label));
        features
    }

    /// Names of the model inputs in order (label excluded)
    pub fn input_names(&self) -> Vec<String> {
        self.numeric.iter().chain(self.categorical.iter()).cloned().collect()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::placement()
    }
}
