// ============================================================
// Layer 4 — Placement Batcher
// ============================================================
// Implements Burn's Batcher trait: a Vec<PlacementItem> becomes
// one PlacementBatch of tensors.
//
//   Input:  N items, each 5 floats + 7 indices + 1 label
//   Output: numeric      [N, 5]  float
//           categorical  [N, 7]  int
//           labels       [N]     int (0 / 1)
//
// The label is split off from the feature tensors here so the
// model's forward pass only ever sees features.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::PlacementItem;

#[derive(Debug, Clone)]
pub struct PlacementBatch<B: Backend> {
    /// Scaled numerics — shape: [batch_size, 5]
    pub numeric: Tensor<B, 2>,

    /// Vocabulary indices — shape: [batch_size, 7]
    pub categorical: Tensor<B, 2, Int>,

    /// 0 / 1 labels — shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct PlacementBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> PlacementBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<PlacementItem, PlacementBatch<B>> for PlacementBatcher<B> {
    fn batch(&self, items: Vec<PlacementItem>) -> PlacementBatch<B> {
        let batch_size  = items.len();
        let num_numeric = items.first().map(|i| i.numeric.len()).unwrap_or(0);
        let num_cat     = items.first().map(|i| i.categorical.len()).unwrap_or(0);

        let numeric_flat: Vec<f32> = items
            .iter()
            .flat_map(|i| i.numeric.iter().copied())
            .collect();

        let categorical_flat: Vec<i64> = items
            .iter()
            .flat_map(|i| i.categorical.iter().copied())
            .collect();

        let labels: Vec<i64> = items
            .iter()
            .map(|i| if i.label >= 0.5 { 1 } else { 0 })
            .collect();

        let numeric = Tensor::<B, 2>::from_data(
            TensorData::new(numeric_flat, [batch_size, num_numeric]),
            &self.device,
        );
        let categorical = Tensor::<B, 2, Int>::from_data(
            TensorData::new(categorical_flat, [batch_size, num_cat]),
            &self.device,
        );
        let labels = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]),
            &self.device,
        );

        PlacementBatch { numeric, categorical, labels }
    }
}
