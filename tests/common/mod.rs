use cosmogen_lib::model::config::SimConfig;
use cosmogen_lib::model::universe::Universe;

/// Fluent test builder around [`Universe`], defaulting to the smallest legal
/// grid and quiet progress logging so integration tests stay fast.
#[allow(dead_code)]
pub struct UniverseBuilder {
    config: SimConfig,
}

#[allow(dead_code)]
impl UniverseBuilder {
    pub fn new() -> Self {
        let mut config = SimConfig::default();
        config.grid.resolution = 32;
        config.integration.log_every = 1_000_000;
        Self { config }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.grid.seed = seed;
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut SimConfig),
    {
        modifier(&mut self.config);
        self
    }

    /// Starts the run at the given scale factor with the baseline temperature
    /// that keeps `T * a` anchored at today's 2.725 K.
    pub fn starting_at(mut self, scale_factor: f64) -> Self {
        self.config.initial.scale_factor = scale_factor;
        self.config.initial.temperature_k = 2.725 / scale_factor;
        self.config.initial.time_s = None;
        self
    }

    /// Shrinks the seeded contrast and stops radiation-era growth, for runs
    /// that must stay in the linear regime from start to finish.
    pub fn quiet_grid(mut self) -> Self {
        self.config.grid.initial_contrast_rms = 1e-6;
        self.config.grid.radiation_growth_factor = 0.0;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn build(self) -> Universe {
        Universe::new(self.config).expect("failed to build universe in test")
    }
}
