//! Gzipped JSON persistence for full grid snapshots.
//!
//! A snapshot of a 256-cube is over a hundred megabytes of JSON; the contrast
//! field compresses well, so snapshots always go through gzip. Readers accept
//! a plain-JSON file too, for hand-built fixtures.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use cosmogen_data::GridSnapshot;

use crate::error::{IoError, Result};

/// Writes any serializable value as gzipped JSON.
pub fn write_json_gz<T: Serialize, W: Write>(sink: W, value: &T) -> Result<()> {
    let mut encoder = GzEncoder::new(sink, Compression::default());
    let json = serde_json::to_string(value)?;
    encoder.write_all(json.as_bytes())?;
    encoder.finish()?;
    Ok(())
}

/// Reads a gzipped JSON value, falling back to plain JSON when the stream is
/// not gzip.
pub fn read_json_gz<T: DeserializeOwned, R: Read>(mut source: R) -> Result<T> {
    let mut raw = Vec::new();
    source.read_to_end(&mut raw)?;
    let mut decoder = GzDecoder::new(raw.as_slice());
    let mut decoded = Vec::new();
    if decoder.read_to_end(&mut decoded).is_ok() {
        Ok(serde_json::from_slice(&decoded)?)
    } else {
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// Exports a grid snapshot to the given path, creating parent directories.
pub fn export_grid(path: impl AsRef<Path>, snapshot: &GridSnapshot) -> Result<()> {
    validate(snapshot)?;
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_json_gz(File::create(path)?, snapshot)
        .map_err(|e| e.with_context(format!("exporting grid to {}", path.display())))
}

/// Imports a grid snapshot, verifying its dimensions.
pub fn import_grid(path: impl AsRef<Path>) -> Result<GridSnapshot> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IoError::not_found(path.display().to_string()));
    }
    let snapshot: GridSnapshot = read_json_gz(File::open(path)?)?;
    validate(&snapshot)?;
    Ok(snapshot)
}

fn validate(snapshot: &GridSnapshot) -> Result<()> {
    // Hand-built metadata can claim an edge whose cube overflows usize;
    // treat that the same as any other dimension mismatch.
    let expected = snapshot
        .n
        .checked_mul(snapshot.n)
        .and_then(|nn| nn.checked_mul(snapshot.n));
    if expected != Some(snapshot.data.len()) {
        return Err(IoError::validation(format!(
            "grid snapshot claims edge {} but holds {} cells",
            snapshot.n,
            snapshot.data.len()
        )));
    }
    Ok(())
}
