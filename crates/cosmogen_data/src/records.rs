use serde::{Deserialize, Serialize};

use crate::epoch::Epoch;

/// Per-step scalar summary of the perturbation grid.
///
/// This is the only grid-derived data that ever reaches the history log; the
/// full field leaves the grid engine only through the explicit snapshot path.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GridSummary {
    /// Root-mean-square density contrast.
    pub rms: f64,
    /// Largest contrast value on the grid.
    pub max: f64,
    /// Number of cells pinned at the virial cap.
    pub virialized_cells: usize,
}

impl GridSummary {
    pub fn quiet() -> Self {
        Self {
            rms: 0.0,
            max: 0.0,
            virialized_cells: 0,
        }
    }
}

/// Light-element mass fractions at one instant.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AbundanceSnapshot {
    pub neutron: f64,
    pub proton: f64,
    pub deuterium: f64,
    pub helium3: f64,
    pub helium4: f64,
    pub lithium7: f64,
}

impl AbundanceSnapshot {
    pub fn sum(&self) -> f64 {
        self.neutron + self.proton + self.deuterium + self.helium3 + self.helium4 + self.lithium7
    }
}

/// One row of the scalar history: everything a dashboard line chart needs and
/// nothing a grid renderer could abuse.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub step: u64,
    /// Cosmic time in seconds.
    pub time_s: f64,
    pub scale_factor: f64,
    /// Hubble parameter in 1/s.
    pub hubble: f64,
    pub temperature_k: f64,
    /// Effective relativistic degrees of freedom at this temperature.
    pub g_star: f64,
    pub epoch: Epoch,
    /// Component densities in kg/m^3.
    pub rho_matter: f64,
    pub rho_radiation: f64,
    pub rho_lambda: f64,
    /// Curvature contribution to H^2, in 1/s^2.
    pub curvature_term: f64,
    /// Friedmann constraint sum; should sit at 1 to within tolerance.
    pub omega_total: f64,
    /// Present once the reaction network has activated.
    pub abundances: Option<AbundanceSnapshot>,
    pub grid: GridSummary,
}

/// Append-only time series of [`HistoryRecord`]s.
///
/// By construction there is no field anywhere in this type that can hold a
/// grid, so total history memory stays O(steps) regardless of resolution.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct HistoryLog {
    records: Vec<HistoryRecord>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: HistoryRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HistoryRecord> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(step: u64, t: f64) -> HistoryRecord {
        HistoryRecord {
            step,
            time_s: t,
            scale_factor: 1e-6,
            hubble: 1e-12,
            temperature_k: 1e4,
            g_star: 3.36,
            epoch: Epoch::Radiation,
            rho_matter: 1e-18,
            rho_radiation: 1e-16,
            rho_lambda: 5.8e-27,
            curvature_term: 0.0,
            omega_total: 1.0,
            abundances: None,
            grid: GridSummary::quiet(),
        }
    }

    #[test]
    fn test_history_is_append_only() {
        let mut log = HistoryLog::new();
        assert!(log.is_empty());
        log.push(record(0, 1.0));
        log.push(record(1, 2.0));
        assert_eq!(log.len(), 2);
        assert_eq!(log.last().unwrap().step, 1);
        let times: Vec<f64> = log.iter().map(|r| r.time_s).collect();
        assert_eq!(times, vec![1.0, 2.0]);
    }

    #[test]
    fn test_record_roundtrips_as_json_line() {
        let r = record(7, 3.5);
        let line = serde_json::to_string(&r).unwrap();
        assert!(!line.contains('\n'));
        let back: HistoryRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_abundance_snapshot_sum() {
        let snap = AbundanceSnapshot {
            neutron: 0.0,
            proton: 0.75,
            deuterium: 1e-5,
            helium3: 1e-5,
            helium4: 0.25 - 2e-5,
            lithium7: 0.0,
        };
        assert!((snap.sum() - 1.0).abs() < 1e-12);
    }
}
