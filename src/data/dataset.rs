use anyhow::{bail, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::domain::record::TransformedRecord;
use crate::domain::schema::{FeatureSchema, VOCAB_SIZE};

/// One transformed record flattened into schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementItem {
    pub numeric:     Vec<f32>,
    pub categorical: Vec<i64>,
    pub label:       f32,
}

impl PlacementItem {
    pub fn from_record(record: &TransformedRecord, schema: &FeatureSchema) -> Result<Self> {
        let (numeric, categorical) = record.ordered_inputs(schema)?;
        if let Some(bad) = categorical.iter().find(|&&i| i < 0 || i >= VOCAB_SIZE as i64) {
            bail!("categorical index {bad} outside embedding range 0..{VOCAB_SIZE}");
        }
        Ok(Self { numeric, categorical, label: record.label })
    }
}

pub struct PlacementDataset {
    items: Vec<PlacementItem>,
}

impl PlacementDataset {
    pub fn new(items: Vec<PlacementItem>) -> Self { Self { items } }

    pub fn from_records(records: &[TransformedRecord], schema: &FeatureSchema) -> Result<Self> {
        let items = records
            .iter()
            .map(|r| PlacementItem::from_record(r, schema))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(items))
    }
}

impl Dataset<PlacementItem> for PlacementDataset {
    fn get(&self, index: usize) -> Option<PlacementItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gender: i64, label: f32) -> TransformedRecord {
        let schema = FeatureSchema::placement();
        let mut r = TransformedRecord { label, ..Default::default() };
        for n in &schema.numeric {
            r.numeric.insert(n.clone(), 0.5);
        }
        for n in &schema.categorical {
            r.categorical.insert(n.clone(), 1);
        }
        r.categorical.insert("gender_xf".into(), gender);
        r
    }

    #[test]
    fn test_dataset_from_records() {
        let schema = FeatureSchema::placement();
        let ds = PlacementDataset::from_records(&[record(1, 1.0), record(2, 0.0)], &schema).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(0).unwrap().categorical[0], 1);
        assert_eq!(ds.get(1).unwrap().label, 0.0);
        assert!(ds.get(2).is_none());
    }

    #[test]
    fn test_index_outside_embedding_is_rejected() {
        let schema = FeatureSchema::placement();
        assert!(PlacementItem::from_record(&record(101, 1.0), &schema).is_err());
        assert!(PlacementItem::from_record(&record(-1, 1.0), &schema).is_err());
    }
}
