//! Shared data structures for the cosmogen simulation.
//!
//! Everything here is plain serializable state: no physics, no IO. The physics
//! crates produce these types, the io crate persists them, and the orchestrator
//! threads them through the history log.

pub mod epoch;
pub mod meta;
pub mod records;
pub mod snapshot;

pub use epoch::{Epoch, Nuclide};
pub use meta::{RunMeta, RunReport};
pub use records::{AbundanceSnapshot, GridSummary, HistoryLog, HistoryRecord};
pub use snapshot::GridSnapshot;
