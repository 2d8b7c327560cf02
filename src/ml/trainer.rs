// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and Adam.
//
//   - Training uses TrainBackend (Autodiff<InferBackend>) for gradients
//   - model.valid() returns the model on InferBackend, dropout off
//   - Validation batcher therefore uses the inner backend too
//   - Early stopping watches val_loss; the weights of the last
//     epoch run are the ones returned
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{
    batcher::{PlacementBatch, PlacementBatcher},
    dataset::PlacementDataset,
};
use crate::domain::{hyperparams::HyperParameters, schema::FeatureSchema};
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::{correct_predictions, PlacementModel, PlacementModelConfig};
use crate::ml::{InferBackend, TrainBackend};

/// Loop mechanics shared by training and every tuning trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSettings {
    pub epochs:      usize,
    pub batch_size:  usize,
    /// Epochs without a val_loss improvement before stopping
    pub patience:    usize,
    pub seed:        u64,
    pub num_workers: usize,
    /// Batches per training epoch; the loader is cycled when shorter
    pub train_steps: Option<usize>,
    /// Batches per validation pass
    pub eval_steps:  Option<usize>,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            epochs:      20,
            batch_size:  32,
            patience:    5,
            seed:        42,
            num_workers: 1,
            train_steps: None,
            eval_steps:  None,
        }
    }
}

// ─── Early stopping ───────────────────────────────────────────────────────────

/// Stops after `patience` consecutive epochs whose val_loss is not
/// strictly below the best seen so far.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best:     f64,
    waited:   usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self { patience, best: f64::INFINITY, waited: 0 }
    }

    /// Record one epoch; returns true when training should stop.
    pub fn should_stop(&mut self, metrics: &EpochMetrics) -> bool {
        if metrics.is_improvement(self.best) {
            self.best   = metrics.val_loss;
            self.waited = 0;
            return false;
        }
        self.waited += 1;
        self.waited >= self.patience
    }

    pub fn best_val_loss(&self) -> f64 {
        self.best
    }
}

// ─── Outcome ──────────────────────────────────────────────────────────────────

pub struct TrainOutcome<B: Backend> {
    pub config:        PlacementModelConfig,
    /// Weights after the last epoch run, on the inference backend
    pub model:         PlacementModel<B>,
    pub history:       Vec<EpochMetrics>,
    pub stopped_early: bool,
}

impl<B: Backend> TrainOutcome<B> {
    /// Best validation accuracy over all epochs (the tuning objective)
    pub fn best_val_accuracy(&self) -> f64 {
        self.history.iter().map(|m| m.val_acc).fold(0.0, f64::max)
    }

    pub fn final_metrics(&self) -> Option<&EpochMetrics> {
        self.history.last()
    }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

/// Train a fresh model with `hyperparameters` on the default device.
pub fn run_training(
    settings:        &TrainSettings,
    hyperparameters: &HyperParameters,
    train_dataset:   PlacementDataset,
    eval_dataset:    PlacementDataset,
    metrics:         Option<&MetricsLogger>,
) -> Result<TrainOutcome<InferBackend>> {
    let device = <InferBackend as Backend>::Device::default();
    tracing::debug!("Using device: {:?}", device);
    train_loop::<TrainBackend>(settings, hyperparameters, train_dataset, eval_dataset, metrics, &device)
}

pub fn train_loop<B: AutodiffBackend>(
    settings:        &TrainSettings,
    hyperparameters: &HyperParameters,
    train_dataset:   PlacementDataset,
    eval_dataset:    PlacementDataset,
    metrics:         Option<&MetricsLogger>,
    device:          &B::Device,
) -> Result<TrainOutcome<B::InnerBackend>> {
    hyperparameters.validate()?;
    if settings.batch_size == 0 {
        bail!("batch_size must be positive");
    }
    if train_dataset.is_empty() {
        bail!("training split is empty");
    }
    if eval_dataset.is_empty() {
        bail!("evaluation split is empty");
    }

    B::seed(settings.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let config = PlacementModelConfig::for_schema(hyperparameters.clone(), &FeatureSchema::placement());
    let mut model: PlacementModel<B> = config.init(device);
    tracing::debug!(
        "Model ready: {} parameters, embedding_dim={}, units={}/{}/{}",
        model.num_params(),
        hyperparameters.embedding_dim,
        hyperparameters.unit_1,
        hyperparameters.unit_2,
        hyperparameters.unit_3,
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let mut optim = AdamConfig::new().with_epsilon(1e-7).init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_items = train_dataset.len();
    let eval_items  = eval_dataset.len();

    let train_loader = DataLoaderBuilder::new(PlacementBatcher::<B>::new(device.clone()))
        .batch_size(settings.batch_size)
        .shuffle(settings.seed)
        .num_workers(settings.num_workers)
        .build(train_dataset);

    let eval_loader = DataLoaderBuilder::new(PlacementBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(settings.batch_size)
        .num_workers(settings.num_workers)
        .build(eval_dataset);

    let mut history  = Vec::with_capacity(settings.epochs);
    let mut stopper  = EarlyStopping::new(settings.patience);
    let mut stopped_early = false;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=settings.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_correct  = 0usize;
        let mut train_seen     = 0usize;

        for batch in epoch_batches(&train_loader, train_items, settings.batch_size, settings.train_steps) {
            let n = batch.labels.dims()[0];
            let (loss, logits) = model.forward_loss(batch.numeric, batch.categorical, batch.labels.clone());

            train_loss_sum += loss.clone().into_scalar().elem::<f64>() * n as f64;
            train_correct  += correct_predictions(logits, batch.labels);
            train_seen     += n;

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(hyperparameters.learning_rate, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let (val_loss, val_acc) = evaluate(&model_valid, &eval_loader, eval_items, settings);

        let row = EpochMetrics::new(
            epoch,
            ratio(train_loss_sum, train_seen, f64::NAN),
            ratio(train_correct as f64, train_seen, 0.0),
            val_loss,
            val_acc,
        );

        tracing::info!(
            "Epoch {:>3}/{} | loss={:.4} | binary_accuracy={:.4} | val_loss={:.4} | val_binary_accuracy={:.4}",
            epoch, settings.epochs, row.train_loss, row.train_acc, row.val_loss, row.val_acc,
        );

        if let Some(logger) = metrics {
            logger.log(&row)?;
        }

        let stop = stopper.should_stop(&row);
        history.push(row);
        if stop {
            tracing::info!(
                "Early stopping after epoch {epoch}: val_loss has not improved on {:.4} for {} epochs",
                stopper.best_val_loss(),
                settings.patience,
            );
            stopped_early = true;
            break;
        }
    }

    Ok(TrainOutcome { config, model: model.valid(), history, stopped_early })
}

/// Mean loss and accuracy over the eval split (or its first `eval_steps` batches).
fn evaluate<B: Backend>(
    model:    &PlacementModel<B>,
    loader:   &Arc<dyn DataLoader<PlacementBatch<B>>>,
    items:    usize,
    settings: &TrainSettings,
) -> (f64, f64) {
    let mut loss_sum = 0.0f64;
    let mut correct  = 0usize;
    let mut seen     = 0usize;

    for batch in epoch_batches(loader, items, settings.batch_size, settings.eval_steps) {
        let n = batch.labels.dims()[0];
        let (loss, logits) = model.forward_loss(batch.numeric, batch.categorical, batch.labels.clone());
        loss_sum += loss.into_scalar().elem::<f64>() * n as f64;
        correct  += correct_predictions(logits, batch.labels);
        seen     += n;
    }

    (ratio(loss_sum, seen, f64::NAN), ratio(correct as f64, seen, 0.0))
}

/// Batches for one pass: the whole loader, or exactly `steps` batches,
/// restarting the loader as often as needed.
fn epoch_batches<'a, O: 'a>(
    loader:     &'a Arc<dyn DataLoader<O>>,
    items:      usize,
    batch_size: usize,
    steps:      Option<usize>,
) -> impl Iterator<Item = O> + 'a {
    let per_pass = items.div_ceil(batch_size.max(1)).max(1);
    let passes   = steps.map_or(1, |s| s.div_ceil(per_pass));
    (0..passes)
        .flat_map(move |_| loader.iter())
        .take(steps.unwrap_or(usize::MAX))
}

fn ratio(sum: f64, count: usize, empty: f64) -> f64 {
    if count > 0 { sum / count as f64 } else { empty }
}
