// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Each use case orchestrates the other layers for one goal:
//
//   transform_use_case — raw shards → fitted statistics +
//                        transformed shards
//   train_use_case     — transformed shards → new model version
//   tune_use_case      — transformed shards → best hyperparameters
//   predict_use_case   — loaded model + statistics → answers
//                        one form submission at a time
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs, path::Path};

// Fit and apply the feature transform
pub mod transform_use_case;

// The training workflow
pub mod train_use_case;

// Hyperparameter search
pub mod tune_use_case;

// The prediction service
pub mod predict_use_case;

/// Write a config or report next to the artifacts it describes.
pub(crate) fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::debug!("Saved '{}'", path.display());
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::json;
    use std::{fs, path::{Path, PathBuf}};

    /// `n` raw records in one plain JSON-lines file. Placement
    /// follows work experience and the mba percentage.
    pub(crate) fn write_raw_corpus(dir: &Path, n: usize) -> PathBuf {
        let lines: Vec<String> = (0..n)
            .map(|i| {
                let placed = i % 2 == 0;
                json!({
                    "sl_no": i + 1,
                    "gender": if i % 3 == 0 { "F" } else { "M" },
                    "ssc_p": 50 + (i * 4) % 45, "ssc_b": "Central",
                    "hsc_p": 55 + (i * 3) % 40, "hsc_b": "Others", "hsc_s": "Science",
                    "degree_p": 60 + (i * 2) % 35, "degree_t": "Sci&Tech",
                    "workex": if placed { "Yes" } else { "No" },
                    "etest_p": 60 + i % 30, "specialisation": "Mkt&Fin",
                    "mba_p": if placed { 70 + i % 20 } else { 52 + i % 10 },
                    "status": if placed { "Placed" } else { "Not Placed" },
                    "salary": if placed { json!(250000) } else { json!(null) },
                })
                .to_string()
            })
            .collect();
        let path = dir.join("placement.jsonl");
        fs::write(&path, lines.join("\n")).unwrap();
        path
    }
}
