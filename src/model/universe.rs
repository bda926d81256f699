//! Universe state manager: owns every component and drives them in lockstep.
//!
//! The update order inside one step is fixed. Expansion moves first because it
//! alone advances the clock and every other component reads the new scale
//! factor; the thermal state is re-derived from that expansion; the reaction
//! network burns against the new temperature; the perturbation grid responds
//! last. Each component raises recoverable stability errors before it has
//! mutated anything, and the commit below only runs once all four have
//! accepted the dt, so a rejected step leaves the universe exactly as it was.

use crate::model::config::SimConfig;
use crate::model::error::{Result, SimError, StateDump};
use crate::model::friedmann::{self, ExpansionState, ParameterSet};
use crate::model::grid::PerturbationGrid;
use crate::model::metrics::StepMetrics;
use crate::model::nucleo::{ReactionNetwork, BARYON_SUM_TOLERANCE};
use crate::model::state::{
    AbundanceSnapshot, Epoch, GridSnapshot, GridSummary, HistoryLog, HistoryRecord, RunMeta,
    RunReport,
};
use crate::model::thermo::{ThermalModel, ThermalState};

/// Largest tolerated drift of the Friedmann constraint sum from 1.
pub const CONSTRAINT_TOLERANCE: f64 = 1e-6;

/// Relative slack when deciding whether the target time has been reached,
/// so float noise near the target cannot demand one more sliver step.
const TARGET_EPSILON: f64 = 1e-12;

pub struct Universe {
    params: ParameterSet,
    config: SimConfig,
    expansion: ExpansionState,
    thermal_model: ThermalModel,
    thermal: ThermalState,
    network: ReactionNetwork,
    grid: PerturbationGrid,
    grid_summary: GridSummary,
    history: HistoryLog,
    metrics: StepMetrics,
    meta: RunMeta,
}

impl Universe {
    pub fn new(config: SimConfig) -> anyhow::Result<Self> {
        let params = ParameterSet::from_config(&config)?;
        let expansion = ExpansionState::initial(&params);
        let mut thermal_model = ThermalModel::new(&params);
        let thermal = thermal_model.update(&expansion)?;
        let network = ReactionNetwork::new(config.network.clone(), params.baryon_to_photon);
        let grid = PerturbationGrid::seeded(config.grid.clone());
        let meta = RunMeta::new(
            config.fingerprint(),
            env!("CARGO_PKG_VERSION").to_string(),
            config.grid.seed,
        );
        let metrics = StepMetrics::new(config.integration.log_every);

        tracing::info!(
            run_id = %meta.run_id,
            time_s = expansion.time_s,
            scale_factor = expansion.scale_factor,
            temperature_k = thermal.temperature_k,
            epoch = ?thermal.epoch,
            "universe initialized"
        );

        Ok(Self {
            params,
            config,
            expansion,
            thermal_model,
            thermal,
            network,
            grid,
            grid_summary: GridSummary::quiet(),
            history: HistoryLog::new(),
            metrics,
            meta,
        })
    }

    /// Advances every component by one shared `dt`.
    ///
    /// Recoverable stability errors leave the universe untouched; fatal
    /// errors abort the run with a [`StateDump`] attached.
    pub fn advance(&mut self, dt: f64) -> Result<()> {
        // 1. Expansion. Pure function of the previous state.
        let next_expansion = friedmann::advance(&self.params, &self.expansion, dt)?;

        // 2. Thermal re-derivation on a scratch model, so rejecting this dt
        //    later cannot corrupt the freeze-out memory.
        let mut staged_thermal = self.thermal_model.clone();
        let thermal = staged_thermal.update(&next_expansion)?;

        // 3. Reaction network burns against the staged temperature without
        //    committing yet.
        let network_step = self.network.step(&thermal, &next_expansion, dt)?;

        // 4. Grid. Last fallible component; its stability check runs before
        //    any cell moves, so an Err here has mutated nothing at all.
        let grid_summary = self.grid.advance(&self.params, &next_expansion, dt)?;

        // 5. Commit.
        let previous_epoch = self.thermal.epoch;
        self.expansion = next_expansion;
        self.thermal_model = staged_thermal;
        self.thermal = thermal;
        self.network.apply(network_step);
        self.grid_summary = grid_summary;

        let step = self.metrics.record_step(
            self.expansion.time_s,
            self.expansion.scale_factor,
            self.thermal.temperature_k,
        );
        if self.thermal.epoch != previous_epoch {
            tracing::info!(
                time_s = self.expansion.time_s,
                scale_factor = self.expansion.scale_factor,
                from = ?previous_epoch,
                to = ?self.thermal.epoch,
                "epoch transition"
            );
        }
        self.check_step(step)?;
        self.history.push(self.record(step));
        Ok(())
    }

    /// Runs until cosmic time reaches `target_s`, choosing dt adaptively.
    pub fn run_to_time(&mut self, target_s: f64) -> Result<RunReport> {
        self.run_to_time_with(target_s, || false)
    }

    /// Runs until `target_s` or until `cancelled` returns true between steps.
    ///
    /// Cancellation is a clean outcome, reported in the [`RunReport`], never
    /// an error. A target at or before the current time returns immediately
    /// with the history untouched. Recoverable stability violations halve dt
    /// and retry up to the configured budget before escalating to a fatal
    /// [`SimError::StabilityExhausted`].
    pub fn run_to_time_with<F>(&mut self, target_s: f64, mut cancelled: F) -> Result<RunReport>
    where
        F: FnMut() -> bool,
    {
        let steps_at_entry = self.metrics.steps();
        let retries_at_entry = self.metrics.retries();

        while self.expansion.time_s < target_s - target_s.abs() * TARGET_EPSILON {
            if cancelled() {
                tracing::info!(
                    time_s = self.expansion.time_s,
                    "cancellation requested, stopping cleanly"
                );
                return Ok(self.report(true, steps_at_entry, retries_at_entry));
            }

            let mut dt = self.choose_dt(target_s);
            let mut halvings = 0u32;
            loop {
                match self.advance(dt) {
                    Ok(()) => break,
                    Err(SimError::Stability {
                        component,
                        dt: rejected,
                        ..
                    }) => {
                        if halvings >= self.config.integration.max_retries {
                            return Err(SimError::stability_exhausted(
                                component, halvings, rejected,
                            ));
                        }
                        self.metrics.record_retry(component, rejected);
                        halvings += 1;
                        dt *= 0.5;
                    }
                    Err(fatal) => return Err(fatal),
                }
            }
        }

        let report = self.report(false, steps_at_entry, retries_at_entry);
        tracing::info!(
            steps = report.steps,
            retries = report.retries,
            final_time = report.final_time,
            final_scale_factor = report.final_scale_factor,
            "target time reached"
        );
        Ok(report)
    }

    /// Step size for the next attempt: a fraction of the Hubble time, capped
    /// by the configured ceiling, never overshooting the target.
    fn choose_dt(&self, target_s: f64) -> f64 {
        let integration = &self.config.integration;
        let hubble_dt = integration.hubble_fraction / self.expansion.hubble;
        hubble_dt
            .min(integration.dt_max)
            .min(target_s - self.expansion.time_s)
    }

    /// Post-commit invariant checks; any failure here is a defect in the
    /// integration and aborts the run.
    fn check_step(&self, step: u64) -> Result<()> {
        let residual = self.expansion.constraint_residual(&self.params);
        if residual > CONSTRAINT_TOLERANCE {
            return Err(SimError::non_physical(
                format!("Friedmann constraint residual {residual:.3e} exceeds {CONSTRAINT_TOLERANCE:.0e}"),
                self.dump(step),
            ));
        }
        if let Some(snapshot) = self.network.snapshot() {
            let sum = snapshot.sum();
            if (sum - 1.0).abs() > BARYON_SUM_TOLERANCE {
                return Err(SimError::non_physical(
                    format!("baryon mass fractions sum to {sum:.9}, expected 1"),
                    self.dump(step),
                ));
            }
        }
        let scalars = [
            self.expansion.time_s,
            self.expansion.scale_factor,
            self.expansion.hubble,
            self.thermal.temperature_k,
            self.grid_summary.rms,
            self.grid_summary.max,
        ];
        if scalars.iter().any(|v| !v.is_finite()) {
            return Err(SimError::non_physical(
                "scalar state became non-finite",
                self.dump(step),
            ));
        }
        Ok(())
    }

    fn record(&self, step: u64) -> HistoryRecord {
        HistoryRecord {
            step,
            time_s: self.expansion.time_s,
            scale_factor: self.expansion.scale_factor,
            hubble: self.expansion.hubble,
            temperature_k: self.thermal.temperature_k,
            g_star: self.thermal.g_star,
            epoch: self.thermal.epoch,
            rho_matter: self.expansion.rho_matter,
            rho_radiation: self.expansion.rho_radiation,
            rho_lambda: self.expansion.rho_lambda,
            curvature_term: self.expansion.curvature_term,
            omega_total: self.expansion.omega_total(&self.params),
            abundances: self.network.snapshot(),
            grid: self.grid_summary,
        }
    }

    fn report(&self, cancelled: bool, steps_at_entry: u64, retries_at_entry: u64) -> RunReport {
        RunReport {
            steps: self.metrics.steps() - steps_at_entry,
            retries: self.metrics.retries() - retries_at_entry,
            cancelled,
            final_time: self.expansion.time_s,
            final_scale_factor: self.expansion.scale_factor,
        }
    }

    /// Scalar snapshot of the whole universe for fatal-error diagnostics.
    pub fn dump(&self, step: u64) -> StateDump {
        let mut dump = self.expansion.dump(step);
        dump.temperature_k = self.thermal.temperature_k;
        dump.abundance_sum = self.network.snapshot().map(|x| x.sum());
        dump.grid = Some(self.grid_summary);
        dump
    }

    /// Full copy of the grid field. This is the only way grid data leaves
    /// the universe; the history log cannot hold it by construction.
    pub fn grid_snapshot(&self) -> GridSnapshot {
        self.grid.snapshot()
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    pub fn thermal(&self) -> &ThermalState {
        &self.thermal
    }

    pub fn epoch(&self) -> Epoch {
        self.thermal.epoch
    }

    pub fn abundances(&self) -> Option<AbundanceSnapshot> {
        self.network.snapshot()
    }

    pub fn grid_summary(&self) -> GridSummary {
        self.grid_summary
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn meta(&self) -> &RunMeta {
        &self.meta
    }

    pub fn metrics(&self) -> &StepMetrics {
        &self.metrics
    }
}
