// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw shards to tensor batches:
//
//   raw shards (.jsonl / .jsonl.gz)
//       │
//       ▼
//   ShardReader        → RawRecord corpus
//       │
//       ▼
//   split_train_eval   → seeded train / eval split (single corpus)
//       │
//       ▼
//   TransformStats     → fit on train, apply to both splits
//       │
//       ▼
//   ShardWriter        → transformed shards (.jsonl.gz)
//       │
//       ▼
//   PlacementDataset   → Burn Dataset over decoded records
//       │
//       ▼
//   PlacementBatcher   → numeric / categorical / label tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Sharded JSON-lines reader and gzip writer
pub mod shards;

/// Transform fit / apply and the fallback preprocessing
pub mod transform;

/// Implements Burn's Dataset trait for transformed records
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded train / eval split
pub mod splitter;
