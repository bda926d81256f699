//! Thermal model: temperature, effective degrees of freedom, epoch naming.
//!
//! The photon temperature follows `T = T_init * a_init / a`, adjusted downward
//! by an entropy-accounting factor `(g_below / g_above)^(1/3)` each time the
//! bath crosses a particle freeze-out boundary. Boundaries are crossed at most
//! once per run and only in decreasing-temperature order; the model keeps a
//! small memory of the coldest temperature seen to detect callers running time
//! backward.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError, StateDump};
use crate::friedmann::{DominantComponent, ExpansionState, ParameterSet};
use cosmogen_data::Epoch;

/// Kelvin per electron-volt.
pub const KELVIN_PER_EV: f64 = 1.160_451_8e4;
/// Boltzmann constant, J/K.
pub const BOLTZMANN: f64 = 1.380_649e-23;
/// Reduced Planck constant, J s.
const HBAR: f64 = 1.054_571_817e-34;
/// Riemann zeta(3), photon number-density prefactor.
const ZETA3: f64 = 1.202_056_903_159_594;

/// g* with the full Standard Model relativistic.
const G_STAR_MAX: f64 = 106.75;
/// Fractional band within which a reverse temperature excursion is tolerated
/// as crossing jitter rather than flagged as time reversal.
const HYSTERESIS_BAND: f64 = 0.01;

/// One step-down of the effective degrees of freedom.
#[derive(Debug, Clone, Copy)]
struct GStarStep {
    threshold_k: f64,
    g_below: f64,
    label: &'static str,
}

/// Freeze-out boundaries in decreasing-temperature order.
const G_STAR_TABLE: [GStarStep; 4] = [
    GStarStep {
        threshold_k: 1.2e15,
        g_below: 86.25,
        label: "electroweak crossover",
    },
    GStarStep {
        threshold_k: 1.7e12,
        g_below: 17.25,
        label: "quark-hadron transition",
    },
    GStarStep {
        threshold_k: 1.2e11,
        g_below: 10.75,
        label: "muon-pion annihilation",
    },
    GStarStep {
        threshold_k: 5.9e9,
        g_below: 3.36,
        label: "electron-positron annihilation",
    },
];

/// Particle species whose relativistic population is tracked.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    Electron,
    Muon,
    Pion,
    Proton,
    Tau,
    WBoson,
    ZBoson,
    HiggsBoson,
    TopQuark,
}

impl Species {
    pub const ALL: [Species; 9] = [
        Species::Electron,
        Species::Muon,
        Species::Pion,
        Species::Proton,
        Species::Tau,
        Species::WBoson,
        Species::ZBoson,
        Species::HiggsBoson,
        Species::TopQuark,
    ];

    /// Rest mass in eV.
    pub fn mass_ev(&self) -> f64 {
        match self {
            Species::Electron => 0.511e6,
            Species::Muon => 105.7e6,
            Species::Pion => 139.6e6,
            Species::Proton => 938.3e6,
            Species::Tau => 1.777e9,
            Species::WBoson => 80.4e9,
            Species::ZBoson => 91.2e9,
            Species::HiggsBoson => 125e9,
            Species::TopQuark => 173e9,
        }
    }

    /// A species counts as relativistic while the thermal energy exceeds a
    /// third of its rest mass.
    pub fn is_relativistic(&self, temperature_ev: f64) -> bool {
        temperature_ev > self.mass_ev() / 3.0
    }
}

/// Instantaneous thermal state, derived fresh from the expansion each step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ThermalState {
    pub temperature_k: f64,
    /// Effective relativistic degrees of freedom at this temperature.
    pub g_star: f64,
    /// Cumulative downward entropy correction applied to the baseline T ~ 1/a.
    pub correction: f64,
    pub active_species: Vec<Species>,
    pub epoch: Epoch,
}

impl ThermalState {
    pub fn temperature_ev(&self) -> f64 {
        self.temperature_k / KELVIN_PER_EV
    }

    pub fn temperature_mev(&self) -> f64 {
        self.temperature_ev() / 1e6
    }

    /// Blackbody radiation energy density, J/m^3.
    pub fn radiation_energy_density(&self, params: &ParameterSet) -> f64 {
        params.radiation_constant * self.temperature_k.powi(4)
    }

    /// Mass-equivalent radiation density, kg/m^3.
    pub fn radiation_mass_density(&self, params: &ParameterSet) -> f64 {
        self.radiation_energy_density(params) / (params.light_speed * params.light_speed)
    }

    /// Photon number density, 1/m^3.
    pub fn photon_number_density(&self, params: &ParameterSet) -> f64 {
        let kt_over_hbar_c = BOLTZMANN * self.temperature_k / (HBAR * params.light_speed);
        2.0 * ZETA3 / (std::f64::consts::PI * std::f64::consts::PI) * kt_over_hbar_c.powi(3)
    }
}

/// Stateful thermal model: baseline relation plus freeze-out memory.
#[derive(Debug, Clone)]
pub struct ThermalModel {
    /// `T_init * a_init`, the invariant of the baseline relation.
    anchor: f64,
    /// Index of the next uncrossed boundary in [`G_STAR_TABLE`].
    next_step: usize,
    /// Product of the entropy corrections applied so far, <= 1.
    correction: f64,
    /// Coldest baseline temperature seen, for reverse-crossing detection.
    coldest_raw: f64,
}

impl ThermalModel {
    /// Builds the model. Boundaries already below the initial temperature are
    /// marked as passed without applying their corrections: the configured
    /// initial temperature is taken to describe the bath as it actually is.
    pub fn new(params: &ParameterSet) -> Self {
        let t0 = params.initial_temperature;
        let next_step = G_STAR_TABLE
            .iter()
            .position(|step| t0 >= step.threshold_k)
            .unwrap_or(G_STAR_TABLE.len());
        Self {
            anchor: params.initial_temperature * params.initial_scale_factor,
            next_step,
            correction: 1.0,
            coldest_raw: f64::INFINITY,
        }
    }

    /// Current effective degrees of freedom.
    pub fn g_star(&self) -> f64 {
        if self.next_step == 0 {
            G_STAR_MAX
        } else {
            G_STAR_TABLE[self.next_step - 1].g_below
        }
    }

    /// Derives the thermal state for the given expansion state, advancing the
    /// freeze-out memory across any boundaries crossed since the last call.
    pub fn update(&mut self, expansion: &ExpansionState) -> Result<ThermalState> {
        let a = expansion.scale_factor;
        let raw = self.anchor / a;
        if raw > self.coldest_raw * (1.0 + HYSTERESIS_BAND) {
            return Err(SimError::non_physical(
                format!(
                    "temperature rose from {:.3e} K to {:.3e} K; thermal history only runs forward",
                    self.coldest_raw, raw
                ),
                StateDump {
                    time_s: expansion.time_s,
                    scale_factor: a,
                    hubble: expansion.hubble,
                    temperature_k: raw,
                    ..StateDump::default()
                },
            ));
        }
        self.coldest_raw = self.coldest_raw.min(raw);

        let mut temperature = raw * self.correction;
        while self.next_step < G_STAR_TABLE.len()
            && temperature < G_STAR_TABLE[self.next_step].threshold_k
        {
            let step = G_STAR_TABLE[self.next_step];
            let g_above = self.g_star();
            self.correction *= (step.g_below / g_above).cbrt();
            temperature = raw * self.correction;
            tracing::debug!(
                boundary = step.label,
                g_above,
                g_below = step.g_below,
                temperature_k = temperature,
                "freeze-out boundary crossed"
            );
            self.next_step += 1;
        }

        let temperature_ev = temperature / KELVIN_PER_EV;
        let active_species = Species::ALL
            .iter()
            .copied()
            .filter(|s| s.is_relativistic(temperature_ev))
            .collect();

        Ok(ThermalState {
            temperature_k: temperature,
            g_star: self.g_star(),
            correction: self.correction,
            active_species,
            epoch: classify_epoch(temperature_ev, expansion.dominant()),
        })
    }
}

/// Names the epoch from the thermal energy scale, falling back to the density
/// balance once the temperature thresholds run out. Pure function of the
/// current state; the result is never cached anywhere.
pub fn classify_epoch(temperature_ev: f64, dominant: DominantComponent) -> Epoch {
    if temperature_ev > 1e27 {
        Epoch::Planck
    } else if temperature_ev > 1e23 {
        Epoch::GrandUnification
    } else if temperature_ev > 80e9 {
        Epoch::Electroweak
    } else if temperature_ev > 150e6 {
        Epoch::QuarkHadron
    } else if temperature_ev > 1e6 {
        Epoch::Lepton
    } else if temperature_ev > 0.1e6 {
        Epoch::Nucleosynthesis
    } else {
        match dominant {
            DominantComponent::Radiation => Epoch::Radiation,
            DominantComponent::Matter => {
                if (0.1..0.6).contains(&temperature_ev) {
                    Epoch::Recombination
                } else {
                    Epoch::Matter
                }
            }
            DominantComponent::DarkEnergy => Epoch::DarkEnergy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::friedmann::ExpansionState;

    fn setup() -> (ParameterSet, ThermalModel) {
        let params = ParameterSet::from_config(&SimConfig::default()).unwrap();
        let model = ThermalModel::new(&params);
        (params, model)
    }

    fn state_at(params: &ParameterSet, a: f64) -> ExpansionState {
        ExpansionState {
            time_s: params.radiation_era_time(a),
            scale_factor: a,
            hubble: params.hubble(a),
            rho_matter: params.rho_matter(a),
            rho_radiation: params.rho_radiation(a),
            rho_lambda: params.rho_lambda(),
            curvature_term: params.curvature_term(a),
        }
    }

    #[test]
    fn test_baseline_tracks_inverse_scale_factor() {
        let (params, mut model) = setup();
        let a = params.initial_scale_factor * 10.0;
        let state = model.update(&state_at(&params, a)).unwrap();
        // No boundary crossed yet at this temperature.
        assert!((state.temperature_k - params.initial_temperature / 10.0).abs() < 1e18);
        assert!((state.correction - 1.0).abs() < 1e-15);
        assert_eq!(state.g_star, G_STAR_MAX);
    }

    #[test]
    fn test_g_star_steps_down_and_temperature_decreases() {
        let (params, mut model) = setup();
        let mut last_t = f64::INFINITY;
        let mut last_g = f64::INFINITY;
        let mut a = params.initial_scale_factor;
        while a < 1e-3 {
            let state = model.update(&state_at(&params, a)).unwrap();
            assert!(state.temperature_k < last_t, "temperature must decrease");
            assert!(state.g_star <= last_g, "g* must never rise");
            assert!(state.correction <= 1.0 + 1e-15, "correction only downward");
            last_t = state.temperature_k;
            last_g = state.g_star;
            a *= 3.0;
        }
        assert!((last_g - 3.36).abs() < 1e-12, "all boundaries crossed");
    }

    #[test]
    fn test_boundaries_cross_once() {
        let (params, mut model) = setup();
        model.update(&state_at(&params, 1e-6)).unwrap();
        let correction_after = model.correction;
        // Later updates cross nothing new and keep the correction fixed.
        model.update(&state_at(&params, 2e-6)).unwrap();
        assert_eq!(model.correction, correction_after);
    }

    #[test]
    fn test_time_reversal_is_fatal() {
        let (params, mut model) = setup();
        model.update(&state_at(&params, 1e-10)).unwrap();
        let err = model.update(&state_at(&params, 1e-12)).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_jitter_within_band_tolerated() {
        let (params, mut model) = setup();
        model.update(&state_at(&params, 1e-10)).unwrap();
        // 0.5% backward excursion stays inside the hysteresis band.
        assert!(model.update(&state_at(&params, 1e-10 * 0.995)).is_ok());
    }

    #[test]
    fn test_active_species_thin_out_with_cooling() {
        let (params, mut model) = setup();
        let hot = model.update(&state_at(&params, 1e-17)).unwrap();
        assert_eq!(hot.active_species.len(), Species::ALL.len());
        let mut model2 = ThermalModel::new(&params);
        let cool = model2.update(&state_at(&params, 1e-5)).unwrap();
        assert!(cool.active_species.is_empty());
    }

    #[test]
    fn test_epoch_bands() {
        use DominantComponent::*;
        assert_eq!(classify_epoch(1e28, Radiation), Epoch::Planck);
        assert_eq!(classify_epoch(1e12, Radiation), Epoch::Electroweak);
        assert_eq!(classify_epoch(2e8, Radiation), Epoch::QuarkHadron);
        assert_eq!(classify_epoch(0.5e6, Radiation), Epoch::Nucleosynthesis);
        assert_eq!(classify_epoch(10.0, Radiation), Epoch::Radiation);
        assert_eq!(classify_epoch(0.25, Matter), Epoch::Recombination);
        assert_eq!(classify_epoch(1e-3, Matter), Epoch::Matter);
        assert_eq!(classify_epoch(1e-3, DarkEnergy), Epoch::DarkEnergy);
    }

    #[test]
    fn test_photon_number_density_today() {
        let (params, _) = setup();
        let state = ThermalState {
            temperature_k: 2.725,
            g_star: 3.36,
            correction: 1.0,
            active_species: Vec::new(),
            epoch: Epoch::DarkEnergy,
        };
        let n = state.photon_number_density(&params);
        assert!((n / 4.1e8 - 1.0).abs() < 0.02, "n_gamma = {n}");
    }

    #[test]
    fn test_blackbody_density_tracks_expansion_radiation() {
        let (params, mut model) = setup();
        // Both samples sit below the last freeze-out boundary, so the
        // entropy correction is identical and T scales exactly as 1/a.
        let first = state_at(&params, 1e-9);
        let thermal_first = model.update(&first).unwrap();
        let second = state_at(&params, 1e-8);
        let thermal_second = model.update(&second).unwrap();

        // The photon blackbody is a fixed fraction of the total radiation
        // density while g* holds still; both fall as a^-4.
        let ratio_first = thermal_first.radiation_mass_density(&params) / first.rho_radiation;
        let ratio_second = thermal_second.radiation_mass_density(&params) / second.rho_radiation;
        assert!(
            (ratio_first / ratio_second - 1.0).abs() < 1e-9,
            "photon fraction drifted: {ratio_first} vs {ratio_second}"
        );
        assert!(
            ratio_first > 0.0 && ratio_first < 1.0,
            "photons cannot exceed the total radiation density, got {ratio_first}"
        );

        // Mass and energy densities are one factor of c^2 apart.
        let c2 = params.light_speed * params.light_speed;
        let energy = thermal_second.radiation_energy_density(&params);
        let mass = thermal_second.radiation_mass_density(&params);
        assert!((mass * c2 / energy - 1.0).abs() < 1e-15);
    }
}
