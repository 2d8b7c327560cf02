// ============================================================
// Layer 6 — Versioned Artifact Directories
// ============================================================
// Every pipeline run writes into a fresh directory named by the
// UTC time it started:
//
//   <root>/20240501093012/
//   <root>/20240501093012-001/   ← second run in the same second
//
// "Latest" is the lexicographically greatest directory name that
// holds its completion marker file, so a run that failed halfway
// never shadows the last good version. An existing version
// directory is never reused.

use anyhow::{Context, Result};
use chrono::Utc;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

pub fn timestamp() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Create a new, empty version directory under `root`.
pub fn create_version_dir(root: &Path) -> Result<(String, PathBuf)> {
    fs::create_dir_all(root)
        .with_context(|| format!("Cannot create '{}'", root.display()))?;

    let base = timestamp();
    let mut attempt = 0usize;
    loop {
        let name = if attempt == 0 { base.clone() } else { format!("{base}-{attempt:03}") };
        let dir  = root.join(&name);
        match fs::create_dir(&dir) {
            Ok(()) => {
                tracing::debug!("Created version directory '{}'", dir.display());
                return Ok((name, dir));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot create '{}'", dir.display()));
            }
        }
    }
}

/// Create `<root>/<name>`, refusing to reuse an existing directory.
pub fn create_named_version(root: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(root)
        .with_context(|| format!("Cannot create '{}'", root.display()))?;
    let dir = root.join(name);
    fs::create_dir(&dir).with_context(|| {
        format!("Refusing to write into existing version '{}'", dir.display())
    })?;
    Ok(dir)
}

/// All version directory names under `root`, sorted ascending.
pub fn list_versions(root: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("Cannot read versions in '{}'", root.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Greatest version whose directory contains `marker`.
pub fn latest_version(root: &Path, marker: &str) -> Result<Option<String>> {
    let mut names = list_versions(root)?;
    while let Some(name) = names.pop() {
        if root.join(&name).join(marker).is_file() {
            return Ok(Some(name));
        }
        tracing::warn!("Skipping incomplete version '{}' in '{}'", name, root.display());
    }
    Ok(None)
}

/// Remove a version that failed before completion.
pub fn discard(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        tracing::warn!("Could not remove incomplete version '{}': {}", dir.display(), e);
    }
}
