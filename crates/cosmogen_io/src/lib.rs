//! # Cosmogen IO
//!
//! I/O and persistence layer for the cosmogen simulation.
//!
//! This crate provides:
//! - Structured error handling with custom error types
//! - JSONL step-history logging with a run-metadata sidecar
//! - Fatal-state dump persistence
//! - Gzipped JSON archival of full grid snapshots

/// Error types and result aliases for I/O operations
pub mod error;
/// Step-history logging, run metadata and state-dump persistence
pub mod history;
/// Gzipped JSON snapshot archival for the perturbation grid
pub mod snapshot;

pub use error::{IoError, Result};
pub use history::{export_run, read_history, write_history};
pub use snapshot::{export_grid, import_grid};
