// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that define the placement problem:
// the fixed schema, the record shapes before and after the
// transform, the hyperparameter set and the traits the other
// layers implement.
//
// No Burn types and no file I/O in this layer.

/// Raw field lists, naming convention, vocabulary constants
pub mod schema;

/// Raw and transformed record types
pub mod record;

/// Hyperparameter set, validation and tuning grid
pub mod hyperparams;

/// Abstractions implemented by the data and ml layers
pub mod traits;
