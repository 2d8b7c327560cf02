// ============================================================
// Layer 5 — Placement DNN (Burn)
// ============================================================
//
//   numeric [b,5] ──────────────────────────────┐
//                                               ├─ concat [b, 5 + 7·d]
//   categorical [b,7] ─ Embedding_i(101, d) ×7 ─┘     (flattened)
//                                               │
//                       Linear(unit_1) → relu → Dropout(dropout_1)
//                       Linear(unit_2) → relu → Dropout(dropout_2)
//                       Linear(unit_3) → relu → Dropout(dropout_3)
//                       Linear(1) → logits → sigmoid
//
// Loss: binary cross-entropy (computed on logits)
// Metric: binary accuracy at p > 0.5
//
// The config records the ordered input names; a record whose
// names differ cannot be fed to the model.
//
// Reference: Burn Book §3 (Building Blocks)

use anyhow::{bail, Result};
use burn::{
    nn::{
        loss::BinaryCrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Initializer,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{relu, sigmoid},
};

use crate::domain::hyperparams::HyperParameters;
use crate::domain::schema::{FeatureSchema, VOCAB_SIZE};

#[derive(Config, Debug)]
pub struct PlacementModelConfig {
    pub hyperparameters:    HyperParameters,
    pub numeric_inputs:     Vec<String>,
    pub categorical_inputs: Vec<String>,
    #[config(default = 101)]
    pub vocab_size:         usize,
}

impl PlacementModelConfig {
    /// Config whose inputs are the placement schema's transformed names.
    pub fn for_schema(hyperparameters: HyperParameters, schema: &FeatureSchema) -> Self {
        Self::new(hyperparameters, schema.numeric.clone(), schema.categorical.clone())
            .with_vocab_size(VOCAB_SIZE)
    }

    /// Input names in model order (numerics then categoricals)
    pub fn input_names(&self) -> Vec<String> {
        self.numeric_inputs
            .iter()
            .chain(self.categorical_inputs.iter())
            .cloned()
            .collect()
    }

    /// Fail unless `schema` names exactly the inputs, in order.
    pub fn check_inputs(&self, schema: &FeatureSchema) -> Result<()> {
        if self.numeric_inputs != schema.numeric || self.categorical_inputs != schema.categorical {
            bail!(
                "model inputs {:?} do not match transformed features {:?}",
                self.input_names(),
                schema.input_names()
            );
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> PlacementModel<B> {
        let hp = &self.hyperparameters;

        let embeddings: Vec<Embedding<B>> = self
            .categorical_inputs
            .iter()
            .map(|_| {
                EmbeddingConfig::new(self.vocab_size, hp.embedding_dim)
                    .with_initializer(Initializer::Uniform { min: -0.05, max: 0.05 })
                    .init(device)
            })
            .collect();

        let concat_width = self.numeric_inputs.len() + self.categorical_inputs.len() * hp.embedding_dim;

        PlacementModel {
            embeddings,
            dense_1:   dense(concat_width, hp.unit_1, device),
            dropout_1: DropoutConfig::new(hp.dropout_1).init(),
            dense_2:   dense(hp.unit_1, hp.unit_2, device),
            dropout_2: DropoutConfig::new(hp.dropout_2).init(),
            dense_3:   dense(hp.unit_2, hp.unit_3, device),
            dropout_3: DropoutConfig::new(hp.dropout_3).init(),
            output:    dense(hp.unit_3, 1, device),
            embedding_dim: hp.embedding_dim,
        }
    }
}

fn dense<B: Backend>(d_in: usize, d_out: usize, device: &B::Device) -> Linear<B> {
    LinearConfig::new(d_in, d_out)
        .with_initializer(Initializer::XavierUniform { gain: 1.0 })
        .init(device)
}

#[derive(Module, Debug)]
pub struct PlacementModel<B: Backend> {
    pub embeddings:    Vec<Embedding<B>>,
    pub dense_1:       Linear<B>,
    pub dropout_1:     Dropout,
    pub dense_2:       Linear<B>,
    pub dropout_2:     Dropout,
    pub dense_3:       Linear<B>,
    pub dropout_3:     Dropout,
    pub output:        Linear<B>,
    pub embedding_dim: usize,
}

impl<B: Backend> PlacementModel<B> {
    /// numeric: [batch, 5], categorical: [batch, 7] → logits [batch, 1]
    pub fn forward_logits(
        &self,
        numeric:     Tensor<B, 2>,
        categorical: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let [batch_size, _] = categorical.dims();

        // One embedding table per categorical column, each flattened.
        let embedded: Vec<Tensor<B, 2>> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, table)| {
                let column = categorical.clone().slice([0..batch_size, i..i + 1]);
                table.forward(column).reshape([batch_size, self.embedding_dim])
            })
            .collect();

        let categoricals = Tensor::cat(embedded, 1);
        let x = Tensor::cat(vec![numeric, categoricals], 1);

        let x = self.dropout_1.forward(relu(self.dense_1.forward(x)));
        let x = self.dropout_2.forward(relu(self.dense_2.forward(x)));
        let x = self.dropout_3.forward(relu(self.dense_3.forward(x)));
        self.output.forward(x)
    }

    /// Placement probability per record, shape [batch, 1]
    pub fn forward(&self, numeric: Tensor<B, 2>, categorical: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        sigmoid(self.forward_logits(numeric, categorical))
    }

    /// Mean binary cross-entropy and the logits it was computed from.
    pub fn forward_loss(
        &self,
        numeric:     Tensor<B, 2>,
        categorical: Tensor<B, 2, Int>,
        labels:      Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward_logits(numeric, categorical);
        let [batch_size, _] = logits.dims();
        let bce = BinaryCrossEntropyLossConfig::new()
            .with_logits(true)
            .init(&logits.device());
        let loss = bce.forward(logits.clone().reshape([batch_size]), labels);
        (loss, logits)
    }
}

/// Number of records whose prediction (p > 0.5) equals the label.
pub fn correct_predictions<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> usize {
    let [batch_size, _] = logits.dims();
    let predicted = logits.reshape([batch_size]).greater_elem(0.0).int();
    predicted
        .equal(labels)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}
