//! Friedmann expansion integrator.
//!
//! Advances the scale factor through `da/dt = a * H(a)` with classical RK4,
//! where `H` comes from the Friedmann constraint
//! `H^2 = (8 pi G / 3) * rho_total + omega_k * H0^2 / a^2`. Component
//! densities are closed-form in `a` (matter ~ a^-3, radiation ~ a^-4, lambda
//! constant), so they are recomputed analytically each step instead of being
//! integrated, which keeps the constraint from drifting over long runs.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::{Result, SimError, StateDump};

/// Hard cap on dt * H accepted by a single step. The orchestrator aims far
/// below this; exceeding it is reported as a recoverable stability violation.
const DT_HUBBLE_CAP: f64 = 0.5;

/// Immutable physical and cosmological constants for one run.
///
/// Built once from a validated [`SimConfig`]; every density fraction is pinned
/// at the present epoch (a = 1) and the curvature fraction is the closure
/// remainder `1 - omega_m - omega_r - omega_lambda`, which is what makes the
/// runtime constraint sum hold exactly.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSet {
    pub gravitational_constant: f64,
    pub light_speed: f64,
    pub radiation_constant: f64,
    /// H0 in 1/s.
    pub hubble0: f64,
    pub omega_matter: f64,
    pub omega_radiation: f64,
    pub omega_lambda: f64,
    pub omega_curvature: f64,
    pub omega_baryon: f64,
    pub baryon_to_photon: f64,
    /// Critical density today, kg/m^3.
    pub rho_crit0: f64,
    pub initial_scale_factor: f64,
    /// Initial cosmic time in seconds; derived from the radiation-era
    /// relation when the config leaves it unset.
    pub initial_time: f64,
    pub initial_temperature: f64,
}

impl ParameterSet {
    /// Builds the parameter set from a configuration, validating it first.
    pub fn from_config(config: &SimConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let g = config.physics.gravitational_constant;
        let h0 = config.cosmology.hubble_constant;
        let omega_matter = config.cosmology.omega_matter;
        let omega_radiation = config.cosmology.omega_radiation;
        let omega_lambda = config.cosmology.omega_lambda;
        let omega_curvature = 1.0 - omega_matter - omega_radiation - omega_lambda;
        let rho_crit0 = 3.0 * h0 * h0 / (8.0 * std::f64::consts::PI * g);
        let a0 = config.initial.scale_factor;
        let initial_time = match config.initial.time_s {
            Some(t0) => t0,
            None => a0 * a0 / (2.0 * h0 * omega_radiation.sqrt()),
        };
        Ok(Self {
            gravitational_constant: g,
            light_speed: config.physics.light_speed,
            radiation_constant: config.physics.radiation_constant,
            hubble0: h0,
            omega_matter,
            omega_radiation,
            omega_lambda,
            omega_curvature,
            omega_baryon: config.cosmology.omega_baryon,
            baryon_to_photon: config.cosmology.baryon_to_photon,
            rho_crit0,
            initial_scale_factor: a0,
            initial_time,
            initial_temperature: config.initial.temperature_k,
        })
    }

    pub fn rho_matter(&self, a: f64) -> f64 {
        self.omega_matter * self.rho_crit0 / (a * a * a)
    }

    pub fn rho_radiation(&self, a: f64) -> f64 {
        self.omega_radiation * self.rho_crit0 / (a * a * a * a)
    }

    pub fn rho_lambda(&self) -> f64 {
        self.omega_lambda * self.rho_crit0
    }

    /// Mean baryon density at scale factor `a`, kg/m^3.
    pub fn rho_baryon(&self, a: f64) -> f64 {
        self.omega_baryon * self.rho_crit0 / (a * a * a)
    }

    /// Curvature contribution to H^2, in 1/s^2.
    pub fn curvature_term(&self, a: f64) -> f64 {
        self.omega_curvature * self.hubble0 * self.hubble0 / (a * a)
    }

    /// Right-hand side of the Friedmann constraint, in 1/s^2.
    pub fn hubble_squared(&self, a: f64) -> f64 {
        let rho_total = self.rho_matter(a) + self.rho_radiation(a) + self.rho_lambda();
        8.0 * std::f64::consts::PI * self.gravitational_constant / 3.0 * rho_total
            + self.curvature_term(a)
    }

    /// Hubble parameter at scale factor `a`; clamps tiny negative squares to
    /// zero, the hard negativity check lives in [`advance`].
    pub fn hubble(&self, a: f64) -> f64 {
        self.hubble_squared(a).max(0.0).sqrt()
    }

    /// Critical density for a given Hubble parameter, kg/m^3.
    pub fn critical_density(&self, hubble: f64) -> f64 {
        3.0 * hubble * hubble / (8.0 * std::f64::consts::PI * self.gravitational_constant)
    }

    /// Scale factor at matter-radiation equality.
    pub fn equality_scale_factor(&self) -> f64 {
        self.omega_radiation / self.omega_matter
    }

    /// Cosmic time at matter-radiation equality.
    ///
    /// Closed form of the radiation+matter integral
    /// `t(a_eq) = (2/3) (2 - sqrt(2)) a_eq^2 / (H0 sqrt(omega_r))`;
    /// lambda and curvature are negligible that early.
    pub fn equality_time(&self) -> f64 {
        let a_eq = self.equality_scale_factor();
        (2.0 / 3.0) * (2.0 - std::f64::consts::SQRT_2) * a_eq * a_eq
            / (self.hubble0 * self.omega_radiation.sqrt())
    }

    /// Radiation-era time at scale factor `a`, `t = a^2 / (2 H0 sqrt(omega_r))`.
    pub fn radiation_era_time(&self, a: f64) -> f64 {
        a * a / (2.0 * self.hubble0 * self.omega_radiation.sqrt())
    }
}

/// Which density component currently dominates the energy budget.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DominantComponent {
    Radiation,
    Matter,
    DarkEnergy,
}

impl DominantComponent {
    /// Expected asymptotic exponent of `a(t) ~ t^x` in this era, used for
    /// validation only; dark-energy expansion is exponential, not power-law.
    pub fn expected_scaling_exponent(&self) -> Option<f64> {
        match self {
            DominantComponent::Radiation => Some(0.5),
            DominantComponent::Matter => Some(2.0 / 3.0),
            DominantComponent::DarkEnergy => None,
        }
    }
}

/// Instantaneous expansion state. Replaced wholesale every step.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ExpansionState {
    pub time_s: f64,
    pub scale_factor: f64,
    /// Hubble parameter in 1/s, recomputed from the constraint every step.
    pub hubble: f64,
    pub rho_matter: f64,
    pub rho_radiation: f64,
    pub rho_lambda: f64,
    /// Curvature contribution to H^2, in 1/s^2.
    pub curvature_term: f64,
}

impl ExpansionState {
    /// State at the configured initial epoch.
    pub fn initial(params: &ParameterSet) -> Self {
        Self::at(params, params.initial_time, params.initial_scale_factor)
    }

    fn at(params: &ParameterSet, time_s: f64, a: f64) -> Self {
        Self {
            time_s,
            scale_factor: a,
            hubble: params.hubble(a),
            rho_matter: params.rho_matter(a),
            rho_radiation: params.rho_radiation(a),
            rho_lambda: params.rho_lambda(),
            curvature_term: params.curvature_term(a),
        }
    }

    /// Friedmann constraint sum; equals 1 up to rounding for any state
    /// produced by [`advance`].
    pub fn omega_total(&self, params: &ParameterSet) -> f64 {
        let h2 = self.hubble * self.hubble;
        let rho_total = self.rho_matter + self.rho_radiation + self.rho_lambda;
        (8.0 * std::f64::consts::PI * params.gravitational_constant / 3.0 * rho_total
            + self.curvature_term)
            / h2
    }

    /// Distance of the constraint sum from 1.
    pub fn constraint_residual(&self, params: &ParameterSet) -> f64 {
        (self.omega_total(params) - 1.0).abs()
    }

    /// Dominant component, read fresh from the densities, never cached.
    pub fn dominant(&self) -> DominantComponent {
        if self.rho_radiation >= self.rho_matter && self.rho_radiation >= self.rho_lambda {
            DominantComponent::Radiation
        } else if self.rho_matter >= self.rho_lambda {
            DominantComponent::Matter
        } else {
            DominantComponent::DarkEnergy
        }
    }

    /// Scalar snapshot for fatal-error diagnostics.
    pub fn dump(&self, step: u64) -> StateDump {
        StateDump {
            step,
            time_s: self.time_s,
            scale_factor: self.scale_factor,
            hubble: self.hubble,
            temperature_k: 0.0,
            abundance_sum: None,
            grid: None,
        }
    }
}

/// Largest dt a single expansion step will accept for this state.
pub fn stability_bound(state: &ExpansionState) -> f64 {
    if state.hubble > 0.0 {
        DT_HUBBLE_CAP / state.hubble
    } else {
        f64::INFINITY
    }
}

/// Advances the expansion by `dt`, producing a fresh state.
///
/// Recoverable failure: `dt` above the stability bound (state untouched).
/// Fatal failure: the step would drive `a` non-positive, H^2 non-positive,
/// or any scalar non-finite.
pub fn advance(params: &ParameterSet, state: &ExpansionState, dt: f64) -> Result<ExpansionState> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(SimError::non_physical(
            format!("expansion step with invalid dt {dt}"),
            state.dump(0),
        ));
    }
    let bound = stability_bound(state);
    if dt > bound {
        return Err(SimError::stability("expansion", dt, bound));
    }

    let f = |a: f64| a * params.hubble(a);
    let a = state.scale_factor;
    let k1 = f(a);
    let k2 = f(a + 0.5 * dt * k1);
    let k3 = f(a + 0.5 * dt * k2);
    let k4 = f(a + dt * k3);
    let a_next = a + dt / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4);

    if !a_next.is_finite() || a_next <= 0.0 {
        return Err(SimError::non_physical(
            format!("scale factor became non-physical ({a_next})"),
            state.dump(0),
        ));
    }
    if a_next <= a {
        return Err(SimError::non_physical(
            format!("scale factor failed to increase ({a} -> {a_next})"),
            state.dump(0),
        ));
    }
    if params.hubble_squared(a_next) <= 0.0 {
        return Err(SimError::non_physical(
            "H^2 non-positive after step (expansion halted)",
            state.dump(0),
        ));
    }

    Ok(ExpansionState::at(params, state.time_s + dt, a_next))
}
