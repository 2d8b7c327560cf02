// ============================================================
// Layer 3 — Record Types
// ============================================================
// RawRecord          one candidate's profile as read from the
//                    corpus (JSON numbers or strings per field)
// TransformedRecord  the same candidate after the fitted
//                    transform: scaled floats, vocabulary
//                    indices and a 0/1 label
//
// A TransformedRecord serialises to a flat JSON object whose
// keys are exactly the transformed feature names, e.g.
//   {"ssc_p_xf":0.61,...,"gender_xf":1,...,"status_xf":1.0}
//
// Reference: Rust Book §8 (Hash Maps), serde_json docs

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::domain::schema::{FeatureKind, FeatureSchema, FEATURES_TO_DROP};

/// One raw placement record.
///
/// Values are kept as JSON so that a percentage stored as the
/// string "67.5" and one stored as the number 67.5 are both
/// accepted and cast explicitly by the transform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object, dropping the leaky fields.
    pub fn from_json_object(object: Map<String, Value>) -> Self {
        let mut record = Self { fields: object.into_iter().collect() };
        record.drop_leaky_fields();
        record
    }

    /// Build a record from string pairs (e.g. a submitted form).
    pub fn from_strings<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut record = Self::new();
        for (key, value) in pairs {
            record.set(key, Value::String(value.to_string()));
        }
        record.drop_leaky_fields();
        record
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Remove `sl_no` and `salary` if present.
    pub fn drop_leaky_fields(&mut self) {
        for key in FEATURES_TO_DROP {
            self.fields.remove(key);
        }
    }

    /// Read a field as a string.
    /// Numbers are rendered with their JSON representation.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// A record after the fitted transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformedRecord {
    /// transformed name → scaled value
    pub numeric: BTreeMap<String, f32>,
    /// transformed name → vocabulary index
    pub categorical: BTreeMap<String, i64>,
    /// 1.0 iff the raw label was exactly "Placed"
    pub label: f32,
}

impl TransformedRecord {
    /// Flat JSON object keyed by transformed feature names.
    pub fn to_json(&self, schema: &FeatureSchema) -> Value {
        let mut object = Map::new();
        for (name, value) in &self.numeric {
            object.insert(name.clone(), Value::from(f64::from(*value)));
        }
        for (name, value) in &self.categorical {
            object.insert(name.clone(), Value::from(*value));
        }
        object.insert(schema.label.clone(), Value::from(f64::from(self.label)));
        Value::Object(object)
    }

    /// Decode a transformed record according to the schema.
    /// Every transformed feature must be present with the right type.
    pub fn from_json(value: &Value, schema: &FeatureSchema) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| anyhow!("transformed record is not a JSON object"))?;

        let mut record = TransformedRecord::default();
        for (name, kind) in schema.transformed_features() {
            let field = object
                .get(&name)
                .ok_or_else(|| anyhow!("transformed record is missing '{name}'"))?;
            match kind {
                FeatureKind::Float => {
                    let v = field
                        .as_f64()
                        .ok_or_else(|| anyhow!("'{name}' is not a float: {field}"))?;
                    record.numeric.insert(name, v as f32);
                }
                FeatureKind::Int => {
                    let v = field
                        .as_i64()
                        .ok_or_else(|| anyhow!("'{name}' is not an integer: {field}"))?;
                    record.categorical.insert(name, v);
                }
                FeatureKind::Label => {
                    let v = field
                        .as_f64()
                        .ok_or_else(|| anyhow!("'{name}' is not a float label: {field}"))?;
                    if v != 0.0 && v != 1.0 {
                        bail!("label '{name}' must be 0.0 or 1.0, got {v}");
                    }
                    record.label = v as f32;
                }
            }
        }
        Ok(record)
    }

    /// Model input values in schema order.
    /// Fails if any named input is absent — the model cannot be
    /// invoked with a partial or differently named feature set.
    pub fn ordered_inputs(&self, schema: &FeatureSchema) -> Result<(Vec<f32>, Vec<i64>)> {
        if self.numeric.len() != schema.numeric.len()
            || self.categorical.len() != schema.categorical.len()
        {
            bail!(
                "expected {} numeric and {} categorical inputs, got {} and {}",
                schema.numeric.len(),
                schema.categorical.len(),
                self.numeric.len(),
                self.categorical.len()
            );
        }
        let numeric = schema
            .numeric
            .iter()
            .map(|n| {
                self.numeric
                    .get(n)
                    .copied()
                    .ok_or_else(|| anyhow!("missing numeric input '{n}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        let categorical = schema
            .categorical
            .iter()
            .map(|n| {
                self.categorical
                    .get(n)
                    .copied()
                    .ok_or_else(|| anyhow!("missing categorical input '{n}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((numeric, categorical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_transformed() -> TransformedRecord {
        let schema = FeatureSchema::placement();
        let mut r = TransformedRecord { label: 1.0, ..Default::default() };
        for (i, n) in schema.numeric.iter().enumerate() {
            r.numeric.insert(n.clone(), i as f32 / 10.0);
        }
        for (i, n) in schema.categorical.iter().enumerate() {
            r.categorical.insert(n.clone(), i as i64);
        }
        r
    }

    #[test]
    fn test_leaky_fields_are_dropped() {
        let obj = json!({"sl_no": 1, "salary": 270000, "ssc_p": 67.0})
            .as_object()
            .cloned()
            .unwrap();
        let r = RawRecord::from_json_object(obj);
        assert!(!r.contains("sl_no"));
        assert!(!r.contains("salary"));
        assert!(r.contains("ssc_p"));
    }

    #[test]
    fn test_get_str_renders_numbers() {
        let mut r = RawRecord::new();
        r.set("workex", "Yes");
        r.set("ssc_p", 67.5);
        assert_eq!(r.get_str("workex").as_deref(), Some("Yes"));
        assert_eq!(r.get_str("ssc_p").as_deref(), Some("67.5"));
        assert_eq!(r.get_str("absent"), None);
    }

    #[test]
    fn test_transformed_json_uses_transformed_names() {
        let schema = FeatureSchema::placement();
        let value  = sample_transformed().to_json(&schema);
        let obj    = value.as_object().unwrap();
        assert_eq!(obj.len(), 13);
        assert!(obj.keys().all(|k| k.ends_with("_xf")));
        assert_eq!(obj["status_xf"], json!(1.0));
    }

    #[test]
    fn test_decode_rejects_missing_feature() {
        let schema = FeatureSchema::placement();
        let mut value = sample_transformed().to_json(&schema);
        value.as_object_mut().unwrap().remove("mba_p_xf");
        let err = TransformedRecord::from_json(&value, &schema).unwrap_err();
        assert!(err.to_string().contains("mba_p_xf"));
    }

    #[test]
    fn test_decode_rejects_float_categorical() {
        let schema = FeatureSchema::placement();
        let mut value = sample_transformed().to_json(&schema);
        value["gender_xf"] = json!(1.5);
        assert!(TransformedRecord::from_json(&value, &schema).is_err());
    }

    #[test]
    fn test_ordered_inputs_follow_schema() {
        let schema = FeatureSchema::placement();
        let (num, cat) = sample_transformed().ordered_inputs(&schema).unwrap();
        assert_eq!(num, vec![0.0, 0.1, 0.2, 0.3, 0.4]);
        assert_eq!(cat, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_ordered_inputs_reject_renamed_feature() {
        let schema = FeatureSchema::placement();
        let mut r  = sample_transformed();
        let v      = r.numeric.remove("ssc_p_xf").unwrap();
        r.numeric.insert("ssc_p".to_string(), v);
        assert!(r.ordered_inputs(&schema).is_err());
    }
}
