// ============================================================
// Layer 4 — Shard Reader / Writer
// ============================================================
// Records live in sharded JSON-lines files, gzip-compressed
// when the file name ends in ".gz":
//
//   train/
//     part-00000-of-00002.jsonl.gz
//     part-00001-of-00002.jsonl.gz
//
// A location handed to the reader is either a shard file or a
// directory; directories expand to every regular file inside,
// sorted by name so reads are deterministic.
//
// Any unreadable file or malformed line aborts the read with
// the file name and line number in the error.
//
// Reference: flate2 docs (GzDecoder / GzEncoder)
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde_json::Value;
use std::{
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use crate::domain::record::{RawRecord, TransformedRecord};
use crate::domain::schema::FeatureSchema;
use crate::domain::traits::RecordSource;

/// Reads every record from a list of shard locations.
pub struct ShardReader {
    locations: Vec<PathBuf>,
    schema:    FeatureSchema,
}

impl ShardReader {
    pub fn new<P: AsRef<Path>>(locations: &[P]) -> Self {
        Self {
            locations: locations.iter().map(|p| p.as_ref().to_path_buf()).collect(),
            schema:    FeatureSchema::placement(),
        }
    }

    /// All shard files behind the configured locations
    pub fn shard_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for location in &self.locations {
            if location.is_dir() {
                let mut inside: Vec<PathBuf> = fs::read_dir(location)
                    .with_context(|| format!("Cannot read directory '{}'", location.display()))?
                    .collect::<std::io::Result<Vec<_>>>()?
                    .into_iter()
                    .map(|e| e.path())
                    .filter(|p| p.is_file())
                    .collect();
                inside.sort();
                files.extend(inside);
            } else if location.is_file() {
                files.push(location.clone());
            } else {
                bail!("Shard location '{}' does not exist", location.display());
            }
        }
        if files.is_empty() {
            bail!("No shard files found in {:?}", self.locations);
        }
        Ok(files)
    }

    /// Parse every non-blank line of every shard as JSON.
    pub fn read_values(&self) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        for path in self.shard_files()? {
            let before = values.len();
            let reader = open_shard(&path)?;
            for (line_no, line) in reader.lines().enumerate() {
                let line = line
                    .with_context(|| format!("Cannot read '{}'", path.display()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let value: Value = serde_json::from_str(&line).with_context(|| {
                    format!("Malformed record at {}:{}", path.display(), line_no + 1)
                })?;
                values.push(value);
            }
            tracing::debug!("Read {} records from '{}'", values.len() - before, path.display());
        }
        Ok(values)
    }
}

impl RecordSource<RawRecord> for ShardReader {
    fn load_all(&self) -> Result<Vec<RawRecord>> {
        self.read_values()?
            .into_iter()
            .enumerate()
            .map(|(i, value)| match value {
                Value::Object(object) => Ok(RawRecord::from_json_object(object)),
                other => bail!("Raw record #{} is not a JSON object: {}", i + 1, other),
            })
            .collect()
    }
}

impl RecordSource<TransformedRecord> for ShardReader {
    fn load_all(&self) -> Result<Vec<TransformedRecord>> {
        self.read_values()?
            .iter()
            .enumerate()
            .map(|(i, value)| {
                TransformedRecord::from_json(value, &self.schema)
                    .with_context(|| format!("Cannot decode transformed record #{}", i + 1))
            })
            .collect()
    }
}

fn open_shard(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open shard '{}'", path.display()))?;
    let inner: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::new(inner)))
}

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

// ─── ShardWriter ──────────────────────────────────────────────────────────────
/// Writes JSON records round-robin into `num_shards` gzip files.
pub struct ShardWriter {
    dir:        PathBuf,
    num_shards: usize,
}

impl ShardWriter {
    pub fn new(dir: impl Into<PathBuf>, num_shards: usize) -> Self {
        Self { dir: dir.into(), num_shards: num_shards.max(1) }
    }

    pub fn shard_name(index: usize, total: usize) -> String {
        format!("part-{index:05}-of-{total:05}.jsonl.gz")
    }

    /// Write all records and return the created shard paths.
    pub fn write_all(&self, records: &[Value]) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let paths: Vec<PathBuf> = (0..self.num_shards)
            .map(|i| self.dir.join(Self::shard_name(i, self.num_shards)))
            .collect();

        let mut encoders = paths
            .iter()
            .map(|p| {
                let file = File::create(p)
                    .with_context(|| format!("Cannot create shard '{}'", p.display()))?;
                Ok(GzEncoder::new(BufWriter::new(file), Compression::default()))
            })
            .collect::<Result<Vec<_>>>()?;

        for (i, record) in records.iter().enumerate() {
            let encoder = &mut encoders[i % self.num_shards];
            serde_json::to_writer(&mut *encoder, record)?;
            encoder.write_all(b"\n")?;
        }

        for (encoder, path) in encoders.into_iter().zip(&paths) {
            encoder
                .finish()
                .and_then(|mut w| w.flush())
                .with_context(|| format!("Cannot finish shard '{}'", path.display()))?;
        }

        tracing::debug!(
            "Wrote {} records into {} shards under '{}'",
            records.len(),
            self.num_shards,
            self.dir.display()
        );
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_written_shards_are_read_back_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let records: Vec<Value> = (0..7).map(|i| json!({"ssc_p": i, "gender": "M"})).collect();

        let paths = ShardWriter::new(dir.path(), 3).write_all(&records).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("part-00000-of-00003.jsonl.gz"));

        let raw: Vec<RawRecord> = ShardReader::new(&[dir.path()]).load_all().unwrap();
        assert_eq!(raw.len(), 7);
    }

    #[test]
    fn test_plain_jsonl_with_blank_lines() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.jsonl");
        fs::write(&path, "{\"sl_no\":1,\"ssc_p\":67}\n\n{\"ssc_p\":\"79.33\"}\n").unwrap();

        let raw: Vec<RawRecord> = ShardReader::new(&[&path]).load_all().unwrap();
        assert_eq!(raw.len(), 2);
        assert!(!raw[0].contains("sl_no"));
    }

    #[test]
    fn test_malformed_line_is_fatal() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{\"ssc_p\":67}\n{not json\n").unwrap();

        let err = RecordSource::<RawRecord>::load_all(&ShardReader::new(&[&path])).unwrap_err();
        assert!(format!("{err:#}").contains("bad.jsonl:2"));
    }

    #[test]
    fn test_missing_location_is_fatal() {
        let reader = ShardReader::new(&["/definitely/not/here"]);
        assert!(reader.shard_files().is_err());
    }
}
