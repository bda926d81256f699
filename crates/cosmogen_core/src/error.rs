//! Error types for the cosmogen physics core.
//!
//! The runtime taxonomy is deliberately small: a stability violation is the
//! only recoverable kind (the orchestrator halves dt and retries), everything
//! else is a defect in the integration and aborts the run. Configuration
//! problems are rejected at load time by the config module and never reach
//! these types; cancellation is a normal return value, not an error.

use cosmogen_data::GridSummary;
use serde::Serialize;
use thiserror::Error;

/// Main error type for core integration operations.
#[derive(Error, Debug)]
pub enum SimError {
    /// Timestep too large for the current state of one component.
    /// Raised before any state is mutated, so the step can be retried.
    #[error("stability violation in {component}: dt {dt:.3e} s exceeds bound {bound:.3e} s")]
    Stability {
        component: &'static str,
        dt: f64,
        bound: f64,
    },

    /// Stability could not be restored within the retry budget.
    #[error("stability exhausted in {component} after {retries} dt halvings (last dt {dt:.3e} s)")]
    StabilityExhausted {
        component: &'static str,
        retries: u32,
        dt: f64,
    },

    /// Integration produced a non-physical state: negative energy density,
    /// Friedmann constraint violation, abundance sum out of bounds, or a
    /// NaN/Inf anywhere in scalar or grid state.
    #[error("non-physical state: {reason} [{state}]")]
    NonPhysical {
        reason: String,
        state: Box<StateDump>,
    },
}

/// Result type alias for core integration operations.
pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    /// Creates a new recoverable stability violation.
    #[must_use]
    pub fn stability(component: &'static str, dt: f64, bound: f64) -> Self {
        Self::Stability {
            component,
            dt,
            bound,
        }
    }

    /// Creates the fatal escalation of repeated stability failures.
    #[must_use]
    pub fn stability_exhausted(component: &'static str, retries: u32, dt: f64) -> Self {
        Self::StabilityExhausted {
            component,
            retries,
            dt,
        }
    }

    /// Creates a new fatal non-physical-state error.
    #[must_use]
    pub fn non_physical<S: Into<String>>(reason: S, state: StateDump) -> Self {
        Self::NonPhysical {
            reason: reason.into(),
            state: Box::new(state),
        }
    }

    /// True for errors the orchestrator may retry with a smaller timestep.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Stability { .. })
    }
}

/// Scalar snapshot of the offending step, attached to fatal errors for
/// diagnosis. Holds summaries only, never the grid itself.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateDump {
    pub step: u64,
    pub time_s: f64,
    pub scale_factor: f64,
    pub hubble: f64,
    pub temperature_k: f64,
    pub abundance_sum: Option<f64>,
    pub grid: Option<GridSummary>,
}

impl std::fmt::Display for StateDump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "step={} t={:.6e}s a={:.6e} H={:.6e}/s T={:.6e}K",
            self.step, self.time_s, self.scale_factor, self.hubble, self.temperature_k
        )?;
        if let Some(sum) = self.abundance_sum {
            write!(f, " abundance_sum={sum:.9}")?;
        }
        if let Some(grid) = &self.grid {
            write!(
                f,
                " grid_rms={:.4e} grid_max={:.4e} virialized={}",
                grid.rms, grid.max, grid.virialized_cells
            )?;
        }
        Ok(())
    }
}
