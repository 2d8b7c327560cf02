// ============================================================
// Layer 6 — Transform Store
// ============================================================
// Persists fitted TransformStats so training and prediction use
// exactly the statistics the transform stage produced.
//
// Layout of one transform output directory:
//
//   <output>/
//     transform_graph/<version>/transform_stats.json
//     transformed_examples/<version>/train/part-00000-of-00001.jsonl.gz
//     transformed_examples/<version>/eval/part-00000-of-00001.jsonl.gz
//
// The statistics file is written last and marks a version as
// complete. The same file is copied into each model version.

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::transform::TransformStats;
use crate::infra::versions;

pub const STATS_FILE:    &str = "transform_stats.json";
pub const GRAPH_DIR:     &str = "transform_graph";
pub const EXAMPLES_DIR:  &str = "transformed_examples";

pub fn stats_path(dir: &Path) -> PathBuf {
    dir.join(STATS_FILE)
}

/// Write `<dir>/transform_stats.json`, refusing to replace an existing file.
pub fn write_stats(dir: &Path, stats: &TransformStats) -> Result<PathBuf> {
    let path = stats_path(dir);
    if path.exists() {
        bail!("Refusing to overwrite '{}'", path.display());
    }
    fs::write(&path, serde_json::to_string_pretty(stats)?)
        .with_context(|| format!("Cannot write transform statistics to '{}'", path.display()))?;
    tracing::debug!("Saved transform statistics to '{}'", path.display());
    Ok(path)
}

pub fn read_stats(dir: &Path) -> Result<TransformStats> {
    read_stats_file(&stats_path(dir))
}

fn read_stats_file(path: &Path) -> Result<TransformStats> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read transform statistics '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Malformed transform statistics '{}'", path.display()))
}

/// One transform output directory.
pub struct TransformStore {
    root: PathBuf,
}

impl TransformStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn graph_dir(&self) -> PathBuf {
        self.root.join(GRAPH_DIR)
    }

    pub fn examples_dir(&self, version: &str, split: &str) -> PathBuf {
        self.root.join(EXAMPLES_DIR).join(version).join(split)
    }

    /// Reserve a fresh version under both the graph and examples roots.
    pub fn create_version(&self) -> Result<String> {
        let (version, graph) = versions::create_version_dir(&self.graph_dir())?;
        if let Err(e) = versions::create_named_version(&self.root.join(EXAMPLES_DIR), &version) {
            versions::discard(&graph);
            return Err(e);
        }
        Ok(version)
    }

    /// Drop both halves of a version whose run failed.
    pub fn discard_version(&self, version: &str) {
        versions::discard(&self.graph_dir().join(version));
        versions::discard(&self.root.join(EXAMPLES_DIR).join(version));
    }

    pub fn save_stats(&self, stats: &TransformStats) -> Result<PathBuf> {
        let dir = self.graph_dir().join(&stats.version);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        write_stats(&dir, stats)
    }

    pub fn latest_version(&self) -> Result<String> {
        match versions::latest_version(&self.graph_dir(), STATS_FILE)? {
            Some(v) => Ok(v),
            None => bail!(
                "No transform versions found in '{}'. Have you run 'transform' first?",
                self.graph_dir().display()
            ),
        }
    }

    pub fn load_stats(&self, version: &str) -> Result<TransformStats> {
        read_stats(&self.graph_dir().join(version))
    }

    /// Statistics from any of the locations a user may point at:
    /// the stats file itself, a directory holding it, a
    /// `transform_graph` directory, or a whole transform output.
    pub fn resolve(location: &Path) -> Result<TransformStats> {
        if location.is_file() {
            return read_stats_file(location);
        }
        if stats_path(location).is_file() {
            return read_stats(location);
        }

        let graph = if location.join(GRAPH_DIR).is_dir() {
            location.join(GRAPH_DIR)
        } else {
            location.to_path_buf()
        };
        match versions::latest_version(&graph, STATS_FILE)? {
            Some(v) => read_stats(&graph.join(v)),
            None => bail!("No transform statistics found under '{}'", location.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::RawRecord;

    fn stats(version: &str) -> TransformStats {
        let record = RawRecord::from_strings([
            ("ssc_p", "70"), ("hsc_p", "70"), ("degree_p", "70"), ("etest_p", "70"), ("mba_p", "70"),
            ("gender", "M"), ("ssc_b", "Central"), ("hsc_b", "Central"), ("hsc_s", "Science"),
            ("degree_t", "Sci&Tech"), ("workex", "No"), ("specialisation", "Mkt&Fin"),
            ("status", "Placed"),
        ]);
        TransformStats::fit(&[record], version).unwrap()
    }

    #[test]
    fn test_save_and_resolve_every_location() {
        let out   = tempfile::tempdir().unwrap();
        let store = TransformStore::new(out.path());
        let version = store.create_version().unwrap();
        assert!(store.examples_dir(&version, "train").parent().unwrap().is_dir());

        let fitted = stats(&version);
        let file   = store.save_stats(&fitted).unwrap();

        assert_eq!(store.latest_version().unwrap(), version);
        assert_eq!(store.load_stats(&version).unwrap(), fitted);
        assert_eq!(TransformStore::resolve(out.path()).unwrap(), fitted);
        assert_eq!(TransformStore::resolve(&store.graph_dir()).unwrap(), fitted);
        assert_eq!(TransformStore::resolve(file.parent().unwrap()).unwrap(), fitted);
        assert_eq!(TransformStore::resolve(&file).unwrap(), fitted);
    }

    #[test]
    fn test_stats_are_never_overwritten() {
        let out   = tempfile::tempdir().unwrap();
        let store = TransformStore::new(out.path());
        store.save_stats(&stats("v1")).unwrap();
        assert!(store.save_stats(&stats("v1")).is_err());
    }

    #[test]
    fn test_unfinished_version_is_skipped() {
        let out   = tempfile::tempdir().unwrap();
        let store = TransformStore::new(out.path());
        let good  = store.create_version().unwrap();
        let fitted = stats(&good);
        store.save_stats(&fitted).unwrap();

        let unfinished = format!("{good}-999");
        fs::create_dir_all(store.graph_dir().join(&unfinished)).unwrap();

        assert_eq!(store.latest_version().unwrap(), good);
        assert_eq!(TransformStore::resolve(out.path()).unwrap(), fitted);

        store.discard_version(&unfinished);
        assert!(!store.graph_dir().join(&unfinished).exists());
    }

    #[test]
    fn test_resolve_empty_directory_fails() {
        let out = tempfile::tempdir().unwrap();
        assert!(TransformStore::resolve(out.path()).is_err());
    }
}
