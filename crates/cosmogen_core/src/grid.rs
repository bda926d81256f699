//! Perturbation grid engine: density contrast on a periodic cube.
//!
//! The field lives in a flat row-major buffer (`x` fastest) and evolves under
//! one of two regimes chosen fresh each step. While the global RMS contrast
//! stays below the linear threshold (or matter does not yet dominate), every
//! unfrozen cell grows multiplicatively about the unfrozen mean. Once the RMS
//! crosses the threshold in a matter-dominated era, the engine switches to
//! gravitational transport: a periodic Poisson solve for the potential, then
//! donor-cell flux exchange across faces, sub-stepped under a Courant-type
//! bound. Cells reaching the virialization threshold are clamped, frozen for
//! good, and their excess contrast is returned to the unfrozen cells.
//!
//! Total contrast is conserved exactly by construction: linear growth rescales
//! deviations about the unfrozen mean, face fluxes are antisymmetric, and
//! virialization redistributes what it clips. Per-step output is the scalar
//! [`GridSummary`] only; the full field leaves the engine solely through
//! [`PerturbationGrid::snapshot`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::GridConfig;
use crate::error::{Result, SimError};
use crate::friedmann::{DominantComponent, ExpansionState, ParameterSet};
use crate::poisson::{folded_mode, SpectralSolver};
use cosmogen_data::{GridSnapshot, GridSummary};

/// No face may move more than this fraction of the donor cell's mass in one
/// sub-step. Six faces per cell, so outflow can never exceed the cell.
const FACE_LIMIT: f64 = 1.0 / 6.0;

/// The contrast field and its virialization mask.
#[derive(Debug)]
pub struct PerturbationGrid {
    n: usize,
    delta: Vec<f64>,
    frozen: Vec<bool>,
    virialized: usize,
    solver: SpectralSolver,
    config: GridConfig,
}

impl PerturbationGrid {
    /// A uniform (zero-contrast) grid of the given edge length.
    pub fn uniform(n: usize, config: GridConfig) -> Self {
        let cells = n * n * n;
        Self {
            n,
            delta: vec![0.0; cells],
            frozen: vec![false; cells],
            virialized: 0,
            solver: SpectralSolver::new(n),
            config,
        }
    }

    /// Seeds the configured resolution with scale-free noise: white noise in
    /// real space, shaped to `P(k) ~ k^n_s` in the spectral domain, then
    /// normalized to the configured RMS with an exactly zero mean.
    pub fn seeded(config: GridConfig) -> Self {
        let n = config.resolution;
        let mut grid = Self::uniform(n, config);
        let mut rng = ChaCha8Rng::seed_from_u64(grid.config.seed);
        let white: Vec<f64> = (0..grid.delta.len())
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let half_slope = grid.config.spectral_index / 2.0;
        let mut spectrum = grid.solver.forward(&white);
        grid.solver.scale_modes(&mut spectrum, |mx, my, mz| {
            let kx = folded_mode(n, mx);
            let ky = folded_mode(n, my);
            let kz = folded_mode(n, mz);
            let k_sq = kx * kx + ky * ky + kz * kz;
            if k_sq == 0.0 {
                0.0
            } else {
                k_sq.sqrt().powf(half_slope)
            }
        });
        grid.delta = grid.solver.inverse(spectrum);

        grid.remove_mean();
        let rms = grid.rms();
        if rms > 0.0 {
            let scale = grid.config.initial_contrast_rms / rms;
            grid.delta.par_iter_mut().for_each(|d| *d *= scale);
        }
        grid
    }

    /// Builds a grid from an explicit contrast field.
    pub fn from_contrast(n: usize, delta: Vec<f64>, config: GridConfig) -> Self {
        debug_assert_eq!(delta.len(), n * n * n);
        let frozen = vec![false; delta.len()];
        Self {
            n,
            delta,
            frozen,
            virialized: 0,
            solver: SpectralSolver::new(n),
            config,
        }
    }

    pub fn resolution(&self) -> usize {
        self.n
    }

    pub fn cells(&self) -> usize {
        self.delta.len()
    }

    pub fn contrast(&self) -> &[f64] {
        &self.delta
    }

    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.n + y) * self.n + x
    }

    /// Adds contrast to one cell and removes the same mass uniformly, so the
    /// global mean stays exactly where it was.
    pub fn inject_overdensity(&mut self, (x, y, z): (usize, usize, usize), amplitude: f64) {
        let cells = self.cells() as f64;
        let at = self.index(x, y, z);
        self.delta[at] += amplitude;
        let share = amplitude / cells;
        self.delta.par_iter_mut().for_each(|d| *d -= share);
    }

    pub fn mean(&self) -> f64 {
        self.delta.iter().sum::<f64>() / self.cells() as f64
    }

    pub fn rms(&self) -> f64 {
        let sum_sq: f64 = self.delta.iter().map(|d| d * d).sum();
        (sum_sq / self.cells() as f64).sqrt()
    }

    fn remove_mean(&mut self) {
        let mean = self.mean();
        self.delta.par_iter_mut().for_each(|d| *d -= mean);
    }

    /// Full-field copy for persistence or inspection. Never taken implicitly;
    /// the step loop only ever sees [`GridSummary`] scalars.
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            n: self.n,
            data: self.delta.clone(),
        }
    }

    /// Scalar survey of the field. The bool is false when any cell has gone
    /// non-finite.
    fn survey(&self) -> (GridSummary, bool) {
        let mut sum_sq = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut finite = true;
        for &d in &self.delta {
            finite &= d.is_finite();
            sum_sq += d * d;
            max = max.max(d);
        }
        let summary = GridSummary {
            rms: (sum_sq / self.cells() as f64).sqrt(),
            max,
            virialized_cells: self.virialized,
        };
        (summary, finite)
    }

    /// Advances the field by one step under the regime the current state
    /// selects. Stability violations surface before any cell is touched.
    pub fn advance(
        &mut self,
        params: &ParameterSet,
        expansion: &ExpansionState,
        dt: f64,
    ) -> Result<GridSummary> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::non_physical(
                format!("grid step with invalid dt {dt}"),
                expansion.dump(0),
            ));
        }
        let (before, finite) = self.survey();
        if !finite {
            return Err(self.non_finite_error(expansion, before));
        }

        let nonlinear = before.rms >= self.config.linear_threshold
            && expansion.dominant() == DominantComponent::Matter;
        if nonlinear {
            self.collapse(params, expansion, dt, before.max)?;
        } else {
            self.grow_linear(expansion, dt);
            self.enforce_virial_cap(expansion.time_s);
        }

        let (after, finite) = self.survey();
        if !finite {
            return Err(self.non_finite_error(expansion, after));
        }
        Ok(after)
    }

    fn non_finite_error(&self, expansion: &ExpansionState, summary: GridSummary) -> SimError {
        let mut dump = expansion.dump(0);
        dump.grid = Some(summary);
        SimError::non_physical("grid contrast became non-finite", dump)
    }

    /// Multiplicative growth of deviations about the unfrozen mean. Frozen
    /// cells neither move nor shift the pivot, so the global mean is held.
    fn grow_linear(&mut self, expansion: &ExpansionState, dt: f64) {
        let rate = match expansion.dominant() {
            DominantComponent::Matter => 1.0,
            DominantComponent::Radiation => self.config.radiation_growth_factor,
            DominantComponent::DarkEnergy => 0.0,
        };
        let g = 1.0 + rate * expansion.hubble * dt;
        if g == 1.0 {
            return;
        }
        let unfrozen = self.cells() - self.virialized;
        if unfrozen == 0 {
            return;
        }
        let pivot = self
            .delta
            .iter()
            .zip(self.frozen.iter())
            .filter(|(_, fz)| !**fz)
            .map(|(d, _)| *d)
            .sum::<f64>()
            / unfrozen as f64;
        self.delta
            .par_iter_mut()
            .zip(self.frozen.par_iter())
            .for_each(|(d, fz)| {
                if !fz {
                    *d = pivot + g * (*d - pivot);
                }
            });
    }

    /// Gravitational transport, sub-stepped under the Courant-type bound.
    /// The bound is checked against the pre-step maximum before any mutation,
    /// so a violation leaves the field untouched for the retry.
    fn collapse(
        &mut self,
        params: &ParameterSet,
        expansion: &ExpansionState,
        dt: f64,
        max_before: f64,
    ) -> Result<()> {
        let omega_sq =
            4.0 * std::f64::consts::PI * params.gravitational_constant * expansion.rho_matter;
        let stress =
            6.0 * self.config.transport_mu * omega_sq * dt * (1.0 + max_before.max(0.0));
        let substeps = (stress / self.config.cfl_safety).ceil().max(1.0);
        if substeps > f64::from(self.config.max_substeps) {
            let bound = dt * f64::from(self.config.max_substeps) / substeps;
            return Err(SimError::stability("perturbation grid", dt, bound));
        }
        let substeps = substeps as u32;
        let h = dt / f64::from(substeps);
        let kappa = self.config.transport_mu * omega_sq * h;
        for _ in 0..substeps {
            // The potential tracks the moving field, so each sub-step
            // re-solves it.
            let psi = self.solver.solve_poisson(&self.delta);
            self.transport(&psi, kappa);
            self.enforce_virial_cap(expansion.time_s);
        }
        Ok(())
    }

    /// One sweep of donor-cell flux exchange. Each face is visited once with
    /// an antisymmetric update, so the field sum is conserved to roundoff.
    /// Faces touching frozen cells carry nothing.
    fn transport(&mut self, psi: &[f64], kappa: f64) {
        let n = self.n;
        let mut next = self.delta.clone();
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    let here = self.index(x, y, z);
                    let neighbors = [
                        self.index((x + 1) % n, y, z),
                        self.index(x, (y + 1) % n, z),
                        self.index(x, y, (z + 1) % n),
                    ];
                    for there in neighbors {
                        if self.frozen[here] || self.frozen[there] {
                            continue;
                        }
                        // Mass runs downhill; the donor is the higher
                        // potential side.
                        let drop = psi[here] - psi[there];
                        let donor = if drop > 0.0 { here } else { there };
                        let available = (1.0 + self.delta[donor]).max(0.0);
                        let magnitude =
                            (kappa * drop.abs() * available).min(FACE_LIMIT * available);
                        let flux = magnitude.copysign(drop);
                        next[here] -= flux;
                        next[there] += flux;
                    }
                }
            }
        }
        self.delta = next;
    }

    /// Clamps cells at the virialization threshold, freezes them for good and
    /// hands the clipped excess back to the unfrozen cells uniformly.
    fn enforce_virial_cap(&mut self, time_s: f64) {
        let cap = self.config.virial_threshold;
        let mut excess = 0.0;
        let mut newly = 0usize;
        for (d, fz) in self.delta.iter_mut().zip(self.frozen.iter_mut()) {
            if !*fz && *d >= cap {
                excess += *d - cap;
                *d = cap;
                *fz = true;
                newly += 1;
            }
        }
        if newly == 0 {
            return;
        }
        self.virialized += newly;
        let unfrozen = self.cells() - self.virialized;
        if unfrozen > 0 {
            let share = excess / unfrozen as f64;
            self.delta
                .par_iter_mut()
                .zip(self.frozen.par_iter())
                .for_each(|(d, fz)| {
                    if !fz {
                        *d += share;
                    }
                });
        }
        tracing::debug!(
            time_s,
            newly_virialized = newly,
            total_virialized = self.virialized,
            "cells virialized"
        );
    }
}
