// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn modules, loss, optimiser and backend choices live here.
//
//   model.rs      — embedding DNN: one embedding table per
//                   categorical input, three Dense/ReLU/Dropout
//                   blocks, sigmoid output
//
//   trainer.rs    — epoch loop with Adam, validation metrics,
//                   early stopping on validation loss
//
//   tuner.rs      — random search over the discrete grid,
//                   scored by best validation accuracy
//
//   inferencer.rs — loaded model + fitted transform, answers
//                   one probability per record
//
// Backends:
//   InferBackend = NdArray (CPU), or Wgpu with `--features wgpu`
//   TrainBackend = Autodiff<InferBackend>
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Embedding DNN placement classifier
pub mod model;

/// Training loop with validation and early stopping
pub mod trainer;

/// Random search over the hyperparameter grid
pub mod tuner;

/// Inference engine — loads a model version and scores records
pub mod inferencer;

#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

pub type TrainBackend = burn::backend::Autodiff<InferBackend>;
