use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reproducibility stamp written alongside a batch run's history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunMeta {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// SHA-256 fingerprint of the effective configuration.
    pub config_fingerprint: String,
    pub package_version: String,
    pub seed: u64,
}

impl RunMeta {
    pub fn new(config_fingerprint: String, package_version: String, seed: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            config_fingerprint,
            package_version,
            seed,
        }
    }
}

/// Outcome of a `run_to_time` call.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    /// Completed steps during this call.
    pub steps: u64,
    /// Stability retries (timestep halvings) performed.
    pub retries: u64,
    /// True when the caller's cancellation check stopped the run early.
    pub cancelled: bool,
    pub final_time: f64,
    pub final_scale_factor: f64,
}
