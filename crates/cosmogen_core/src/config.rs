//! Configuration management for simulation parameters.
//!
//! Strongly-typed configuration structures that map to the `config.toml`
//! file. Every tunable of the integration (physical constants, cosmological
//! density fractions, initial epoch values, grid policy, timestep policy,
//! reaction-network policy) flows through this module and is validated once,
//! at load time. Out-of-range values never reach the integrators.
//!
//! ## Configuration Hierarchy
//!
//! 1. Default values (hardcoded in `Default` impls)
//! 2. `config.toml` file (overrides defaults)
//!
//! ## Example `config.toml`
//!
//! ```toml
//! [cosmology]
//! hubble_constant = 2.184e-18
//! omega_matter = 0.315
//! omega_radiation = 9.2e-5
//! omega_lambda = 0.685
//!
//! [grid]
//! resolution = 64
//! seed = 42
//!
//! [integration]
//! hubble_fraction = 0.01
//! ```

use serde::{Deserialize, Serialize};

/// Fundamental physical constants, SI units throughout.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Newton's gravitational constant, m^3 kg^-1 s^-2.
    pub gravitational_constant: f64,
    /// Speed of light, m/s.
    pub light_speed: f64,
    /// Radiation energy-density constant, J m^-3 K^-4.
    pub radiation_constant: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravitational_constant: 6.674_30e-11,
            light_speed: 2.997_924_58e8,
            radiation_constant: 7.5657e-16,
        }
    }
}

/// Cosmological parameters at the present epoch (a = 1).
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CosmologyConfig {
    /// Hubble constant H0 in 1/s.
    pub hubble_constant: f64,
    pub omega_matter: f64,
    pub omega_radiation: f64,
    pub omega_lambda: f64,
    /// Baryon fraction of the total; must not exceed `omega_matter`.
    pub omega_baryon: f64,
    /// Baryon-to-photon number ratio, controls the deuterium bottleneck.
    pub baryon_to_photon: f64,
}

impl Default for CosmologyConfig {
    fn default() -> Self {
        Self {
            hubble_constant: 2.184e-18,
            omega_matter: 0.315,
            omega_radiation: 9.2e-5,
            omega_lambda: 0.685,
            omega_baryon: 0.049,
            baryon_to_photon: 6.1e-10,
        }
    }
}

/// Starting point of the integration.
///
/// The defaults sit at a Planck-era scale factor with the photon temperature
/// anchored so that `temperature_k * scale_factor` equals today's 2.725 K.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct InitialConfig {
    pub scale_factor: f64,
    pub temperature_k: f64,
    /// Initial cosmic time in seconds. When absent it is derived from the
    /// radiation-era relation t = a^2 / (2 H0 sqrt(omega_radiation)) so that
    /// a(t) follows the expected t^(1/2) scaling from the first step.
    pub time_s: Option<f64>,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1e-32,
            temperature_k: 2.725e32,
            time_s: None,
        }
    }
}

/// Perturbation-grid policy: resolution, seeding and the collapse rule.
///
/// The transport and virialization constants are modeling policy, not
/// physical law; they are exposed here so runs can tune them.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GridConfig {
    /// Cells per edge of the periodic cube.
    pub resolution: usize,
    pub seed: u64,
    /// Target RMS contrast of the seeded initial field.
    pub initial_contrast_rms: f64,
    /// Power-spectrum slope n_s used to shape the seed field, P(k) ~ k^n_s.
    pub spectral_index: f64,
    /// Global RMS above which the engine switches to the nonlinear update.
    pub linear_threshold: f64,
    /// Contrast at which a cell virializes and freezes.
    pub virial_threshold: f64,
    /// Dimensionless strength of potential-gradient transport.
    pub transport_mu: f64,
    /// Fraction of the Courant bound a sub-step may use.
    pub cfl_safety: f64,
    /// Largest number of internal sub-steps before the engine reports a
    /// stability violation instead.
    pub max_substeps: u32,
    /// Linear growth rate multiplier while radiation dominates.
    pub radiation_growth_factor: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            resolution: 64,
            seed: 42,
            initial_contrast_rms: 1e-5,
            spectral_index: 1.0,
            linear_threshold: 0.1,
            virial_threshold: 200.0,
            transport_mu: 10.0,
            cfl_safety: 0.5,
            max_substeps: 8,
            radiation_growth_factor: 0.1,
        }
    }
}

/// Timestep policy for the orchestrator.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Fraction of the instantaneous Hubble time used as the step size.
    pub hubble_fraction: f64,
    /// Hard ceiling on dt in seconds.
    pub dt_max: f64,
    /// Consecutive dt halvings allowed before a stability violation
    /// escalates to a fatal error.
    pub max_retries: u32,
    /// Emit a progress log line every this many steps.
    pub log_every: u64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            hubble_fraction: 0.01,
            dt_max: 1e16,
            max_retries: 8,
            log_every: 500,
        }
    }
}

/// Reaction-network policy: thresholds in MeV, rate constants in 1/s.
///
/// Rate constants fold the baryon density into mass-fraction units; they are
/// calibrated for qualitative agreement (helium-4 near 0.25), not for
/// precision nucleosynthesis.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    /// Weak-interaction freeze-out temperature.
    pub weak_freeze_mev: f64,
    /// Temperature at which the network activates (deuterium threshold).
    pub activation_mev: f64,
    /// Below this temperature the network is unconditionally frozen.
    pub floor_mev: f64,
    /// Free neutron lifetime in seconds.
    pub neutron_lifetime_s: f64,
    /// Neutron-proton mass split in MeV.
    pub mass_split_mev: f64,
    /// Deuterium binding energy in MeV.
    pub deuterium_binding_mev: f64,
    pub rate_np_deuterium: f64,
    pub rate_dd_helium3: f64,
    pub rate_he3d_helium4: f64,
    pub rate_he3he4_lithium7: f64,
    /// Exponent of the Gamow-like low-temperature falloff.
    pub gamow_falloff: f64,
    /// Largest relative change a sub-step may apply to any fraction.
    pub substep_safety: f64,
    pub max_substeps: u32,
    /// Frozen once the peak rate drops below this multiple of H.
    pub freeze_ratio: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            weak_freeze_mev: 0.7,
            activation_mev: 0.1,
            floor_mev: 0.01,
            neutron_lifetime_s: 879.4,
            mass_split_mev: 1.293,
            deuterium_binding_mev: 2.224,
            rate_np_deuterium: 1.0,
            rate_dd_helium3: 50.0,
            rate_he3d_helium4: 100.0,
            rate_he3he4_lithium7: 1e-7,
            gamow_falloff: 10.0,
            substep_safety: 0.2,
            max_substeps: 200_000,
            freeze_ratio: 1e-2,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SimConfig {
    pub physics: PhysicsConfig,
    pub cosmology: CosmologyConfig,
    pub initial: InitialConfig,
    pub grid: GridConfig,
    pub integration: IntegrationConfig,
    pub network: NetworkConfig,
}

impl SimConfig {
    /// Validates all configuration parameters.
    ///
    /// Returns `Ok(())` if all parameters are valid, or `Err` with a
    /// description of the first validation failure.
    pub fn validate(&self) -> anyhow::Result<()> {
        // Physical constants
        anyhow::ensure!(
            self.physics.gravitational_constant > 0.0,
            "Gravitational constant must be positive"
        );
        anyhow::ensure!(self.physics.light_speed > 0.0, "Light speed must be positive");
        anyhow::ensure!(
            self.physics.radiation_constant > 0.0,
            "Radiation constant must be positive"
        );

        // Cosmology
        anyhow::ensure!(
            self.cosmology.hubble_constant > 0.0 && self.cosmology.hubble_constant.is_finite(),
            "Hubble constant must be positive and finite"
        );
        anyhow::ensure!(
            self.cosmology.omega_matter > 0.0,
            "Omega_matter must be positive"
        );
        anyhow::ensure!(
            self.cosmology.omega_radiation > 0.0,
            "Omega_radiation must be positive"
        );
        anyhow::ensure!(
            self.cosmology.omega_lambda >= 0.0,
            "Omega_lambda must be non-negative"
        );
        let omega_sum = self.cosmology.omega_matter
            + self.cosmology.omega_radiation
            + self.cosmology.omega_lambda;
        anyhow::ensure!(
            (omega_sum - 1.0).abs() <= 0.1,
            "Density fractions must sum to 1 within 0.1 (got {omega_sum}); \
             the remainder is interpreted as curvature"
        );
        anyhow::ensure!(
            self.cosmology.omega_baryon > 0.0
                && self.cosmology.omega_baryon <= self.cosmology.omega_matter,
            "Omega_baryon must be positive and no larger than Omega_matter"
        );
        anyhow::ensure!(
            self.cosmology.baryon_to_photon > 0.0 && self.cosmology.baryon_to_photon < 1e-6,
            "Baryon-to-photon ratio out of range"
        );

        // Initial conditions
        anyhow::ensure!(
            self.initial.scale_factor > 0.0 && self.initial.scale_factor < 1.0,
            "Initial scale factor must be in (0, 1)"
        );
        anyhow::ensure!(
            self.initial.temperature_k > 0.0,
            "Initial temperature must be positive"
        );
        if let Some(t0) = self.initial.time_s {
            anyhow::ensure!(t0 > 0.0, "Initial time must be positive when given");
        }

        // Grid
        anyhow::ensure!(
            matches!(self.grid.resolution, 32 | 64 | 128 | 256),
            "Grid resolution must be one of 32, 64, 128, 256"
        );
        anyhow::ensure!(
            self.grid.initial_contrast_rms > 0.0 && self.grid.initial_contrast_rms < 0.01,
            "Initial contrast RMS must be in (0, 0.01)"
        );
        anyhow::ensure!(
            (-3.0..=4.0).contains(&self.grid.spectral_index),
            "Spectral index must be in [-3, 4]"
        );
        anyhow::ensure!(
            self.grid.linear_threshold > 0.0 && self.grid.linear_threshold <= 1.0,
            "Linear threshold must be in (0, 1]"
        );
        anyhow::ensure!(
            self.grid.virial_threshold >= 10.0,
            "Virial threshold must be at least 10"
        );
        anyhow::ensure!(
            self.grid.transport_mu > 0.0,
            "Transport coefficient must be positive"
        );
        anyhow::ensure!(
            self.grid.cfl_safety > 0.0 && self.grid.cfl_safety < 1.0,
            "CFL safety factor must be in (0, 1)"
        );
        anyhow::ensure!(self.grid.max_substeps >= 1, "Grid max_substeps must be >= 1");
        anyhow::ensure!(
            self.grid.radiation_growth_factor >= 0.0 && self.grid.radiation_growth_factor <= 1.0,
            "Radiation growth factor must be in [0, 1]"
        );

        // Integration policy
        anyhow::ensure!(
            self.integration.hubble_fraction > 0.0 && self.integration.hubble_fraction <= 0.2,
            "Hubble fraction must be in (0, 0.2]"
        );
        anyhow::ensure!(self.integration.dt_max > 0.0, "dt_max must be positive");
        anyhow::ensure!(
            self.integration.max_retries >= 1 && self.integration.max_retries <= 32,
            "max_retries must be in [1, 32]"
        );
        anyhow::ensure!(self.integration.log_every >= 1, "log_every must be >= 1");

        // Reaction network
        anyhow::ensure!(
            self.network.weak_freeze_mev > self.network.activation_mev
                && self.network.activation_mev > self.network.floor_mev
                && self.network.floor_mev > 0.0,
            "Network thresholds must satisfy weak > activation > floor > 0"
        );
        anyhow::ensure!(
            self.network.neutron_lifetime_s > 0.0,
            "Neutron lifetime must be positive"
        );
        anyhow::ensure!(
            self.network.mass_split_mev > 0.0 && self.network.deuterium_binding_mev > 0.0,
            "Mass split and binding energies must be positive"
        );
        for (name, rate) in [
            ("rate_np_deuterium", self.network.rate_np_deuterium),
            ("rate_dd_helium3", self.network.rate_dd_helium3),
            ("rate_he3d_helium4", self.network.rate_he3d_helium4),
            ("rate_he3he4_lithium7", self.network.rate_he3he4_lithium7),
        ] {
            anyhow::ensure!(rate >= 0.0, "{name} must be non-negative");
        }
        anyhow::ensure!(
            self.network.gamow_falloff >= 0.0,
            "Gamow falloff must be non-negative"
        );
        anyhow::ensure!(
            self.network.substep_safety > 0.0 && self.network.substep_safety < 1.0,
            "Network substep safety must be in (0, 1)"
        );
        anyhow::ensure!(
            self.network.max_substeps >= 100,
            "Network max_substeps must be >= 100"
        );
        anyhow::ensure!(
            self.network.freeze_ratio > 0.0 && self.network.freeze_ratio < 1.0,
            "Freeze ratio must be in (0, 1)"
        );

        Ok(())
    }

    /// Loads and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Stable digest of the full parameter set, stamped into run metadata so
    /// results can be traced back to the exact configuration.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{self:?}").as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_resolution() {
        let config = SimConfig {
            grid: GridConfig {
                resolution: 48,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_omega_sum_out_of_bounds() {
        let config = SimConfig {
            cosmology: CosmologyConfig {
                omega_lambda: 0.2,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_hubble_constant() {
        let config = SimConfig {
            cosmology: CosmologyConfig {
                hubble_constant: -1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_network_threshold_ordering() {
        let config = SimConfig {
            network: NetworkConfig {
                activation_mev: 0.9,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_overrides_defaults() {
        let config = SimConfig::from_toml(
            r#"
            [grid]
            resolution = 128
            seed = 7

            [integration]
            hubble_fraction = 0.02
            "#,
        )
        .unwrap();
        assert_eq!(config.grid.resolution, 128);
        assert_eq!(config.grid.seed, 7);
        assert!((config.integration.hubble_fraction - 0.02).abs() < 1e-12);
        // Untouched sections keep their defaults.
        assert!((config.cosmology.omega_matter - 0.315).abs() < 1e-12);
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        // Same shape as the module-level example: every section present but
        // only partially specified.
        let config = SimConfig::from_toml(
            r#"
            [cosmology]
            hubble_constant = 2.184e-18
            omega_matter = 0.315
            omega_radiation = 9.2e-5
            omega_lambda = 0.685

            [grid]
            resolution = 128
            seed = 7

            [integration]
            hubble_fraction = 0.02
            "#,
        )
        .unwrap();
        assert_eq!(config.grid.resolution, 128);
        // Unstated fields inside a present section fall back to defaults.
        assert!((config.cosmology.omega_baryon - 0.049).abs() < 1e-12);
        assert!((config.cosmology.baryon_to_photon - 6.1e-10).abs() < 1e-22);
        assert!((config.grid.initial_contrast_rms - 1e-5).abs() < 1e-17);
        assert!((config.grid.virial_threshold - 200.0).abs() < 1e-9);
        assert_eq!(config.integration.max_retries, 8);
        assert_eq!(config.integration.log_every, 500);
    }

    #[test]
    fn test_fingerprint_consistency() {
        let config1 = SimConfig::default();
        let config2 = SimConfig::default();
        assert_eq!(config1.fingerprint(), config2.fingerprint());
        let changed = SimConfig {
            grid: GridConfig {
                seed: 1234,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_ne!(config1.fingerprint(), changed.fingerprint());
    }
}
