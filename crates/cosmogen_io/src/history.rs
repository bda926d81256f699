//! Run-artifact persistence: step history, run metadata, fatal-state dumps.
//!
//! The history is written as JSONL, one scalar record per step, with a
//! `meta.json` sidecar identifying the run. Writers work over any
//! [`Write`] sink; the path-based helpers wrap them for the binary.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use cosmogen_core::StateDump;
use cosmogen_data::{HistoryLog, HistoryRecord, RunMeta};

use crate::error::{IoError, Result};

pub const HISTORY_FILE: &str = "history.jsonl";
pub const META_FILE: &str = "meta.json";
pub const DUMP_FILE: &str = "dump.json";

/// Streams one step record per line into the sink.
pub fn write_history<W: Write>(mut sink: W, history: &HistoryLog) -> Result<u64> {
    let mut written = 0u64;
    for record in history.iter() {
        let json = serde_json::to_string(record)?;
        writeln!(sink, "{json}")?;
        written += 1;
    }
    sink.flush()?;
    Ok(written)
}

/// Reads a JSONL history back. Blank lines are skipped; anything else that
/// fails to parse is an error, since a run writes only well-formed lines.
pub fn read_history<R: BufRead>(reader: R) -> Result<HistoryLog> {
    let mut log = HistoryLog::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: HistoryRecord = serde_json::from_str(&line)?;
        log.push(record);
    }
    Ok(log)
}

/// Writes the run metadata sidecar.
pub fn write_meta(dir: impl AsRef<Path>, meta: &RunMeta) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let path = dir.join(META_FILE);
    let json = serde_json::to_string_pretty(meta)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// Persists the scalar state dump of a fatal error next to the history, so
/// the failing state survives the process.
pub fn write_state_dump(dir: impl AsRef<Path>, dump: &StateDump) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let path = dir.join(DUMP_FILE);
    let json = serde_json::to_string_pretty(dump)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// One-shot export of a completed run: metadata sidecar plus full history.
pub fn export_run(
    dir: impl AsRef<Path>,
    meta: &RunMeta,
    history: &HistoryLog,
) -> anyhow::Result<PathBuf> {
    let dir = dir.as_ref();
    write_meta(dir, meta).context("writing run metadata")?;
    let path = dir.join(HISTORY_FILE);
    let file = File::create(&path)
        .map_err(IoError::from)
        .context("creating history file")?;
    write_history(BufWriter::new(file), history).context("writing history")?;
    Ok(path)
}
