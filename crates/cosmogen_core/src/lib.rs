//! # Cosmogen Core
//!
//! The numerical engine for cosmogen, an early-universe simulation pipeline.
//!
//! This crate contains the deterministic integration logic, including:
//! - Friedmann expansion integration with analytic component densities
//! - Thermal history with effective-degrees-of-freedom freeze-out steps
//! - A stiff light-element reaction network behind a swappable integrator
//! - A periodic perturbation grid with FFT Poisson collapse dynamics
//! - Metrics collection and structured logging
//!
//! ## Architecture
//!
//! The engine follows a fixed per-step order: expansion first, then the
//! thermal state derived from it, then the reaction network, then the grid.
//! Components report recoverable stability violations before mutating any
//! state, so the orchestrator can halve the timestep and retry; non-physical
//! states are fatal and carry a scalar diagnostic dump.
//!
//! ## Example
//!
//! ```
//! use cosmogen_core::config::SimConfig;
//! use cosmogen_core::friedmann::{self, ExpansionState, ParameterSet};
//!
//! let params = ParameterSet::from_config(&SimConfig::default()).unwrap();
//! let state = ExpansionState::initial(&params);
//! let dt = 0.01 / state.hubble;
//! let next = friedmann::advance(&params, &state, dt).unwrap();
//! assert!(next.scale_factor > state.scale_factor);
//! ```

/// Configuration management for simulation parameters
pub mod config;
/// Error taxonomy: recoverable stability violations and fatal states
pub mod error;
/// Friedmann expansion integrator and derived parameter set
pub mod friedmann;
/// Density-contrast grid with linear growth and collapse transport
pub mod grid;
/// Performance metrics collection and logging
pub mod metrics;
/// Light-element reaction network with sub-stepped stiff integration
pub mod nucleo;
/// Periodic FFT Poisson solver in lattice units
pub mod poisson;
/// Temperature, degrees of freedom and epoch classification
pub mod thermo;

pub use error::{Result, SimError, StateDump};
pub use friedmann::{ExpansionState, ParameterSet};
pub use metrics::{init_logging, StepMetrics};
pub use thermo::ThermalState;
