// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence used by several other layers:
//
//   versions.rs        — Timestamped version directories
//                        Creates fresh `<root>/<YYYYMMDDHHMMSS>`
//                        directories and finds the latest one.
//
//   checkpoint.rs      — Model versions
//                        Burn's CompactRecorder for weights, JSON
//                        for the model config, plus a copy of the
//                        transform statistics.
//
//   transform_store.rs — Fitted transform statistics
//                        Written by the transform stage, read by
//                        training and prediction.
//
//   metrics.rs         — Training metrics logging
//                        Per-epoch loss / accuracy rows in a CSV.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Timestamped artifact versions
pub mod versions;

/// Model version saving and loading
pub mod checkpoint;

/// Transform statistics persistence
pub mod transform_store;

/// Training metrics CSV logger
pub mod metrics;
