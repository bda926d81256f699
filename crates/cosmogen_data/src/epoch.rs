use serde::{Deserialize, Serialize};

/// Named cosmic era, recomputed every step from temperature and density balance.
///
/// The variants are ordered from hottest to coldest; the classifier in the core
/// crate walks them in this order and never caches the result.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Epoch {
    /// Above the Planck energy scale; classical evolution is extrapolation here.
    Planck,
    /// Grand-unification scale.
    GrandUnification,
    /// Electroweak symmetry breaking.
    Electroweak,
    /// Quark-hadron (QCD) transition.
    QuarkHadron,
    /// Lepton era down to electron-positron annihilation.
    Lepton,
    /// Light-element fusion window.
    Nucleosynthesis,
    /// Radiation-dominated era after fusion ends.
    Radiation,
    /// Around hydrogen recombination; matter already dominates.
    Recombination,
    /// Matter-dominated era.
    Matter,
    /// Dark-energy-dominated era.
    DarkEnergy,
}

impl Epoch {
    /// Short human-readable label used in timelines and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Epoch::Planck => "planck",
            Epoch::GrandUnification => "grand-unification",
            Epoch::Electroweak => "electroweak",
            Epoch::QuarkHadron => "quark-hadron",
            Epoch::Lepton => "lepton",
            Epoch::Nucleosynthesis => "nucleosynthesis",
            Epoch::Radiation => "radiation",
            Epoch::Recombination => "recombination",
            Epoch::Matter => "matter",
            Epoch::DarkEnergy => "dark-energy",
        }
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Light nuclide tracked by the reaction network.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nuclide {
    Neutron,
    Proton,
    Deuterium,
    Helium3,
    Helium4,
    Lithium7,
}

impl Nuclide {
    /// All tracked nuclides in storage order.
    pub const ALL: [Nuclide; 6] = [
        Nuclide::Neutron,
        Nuclide::Proton,
        Nuclide::Deuterium,
        Nuclide::Helium3,
        Nuclide::Helium4,
        Nuclide::Lithium7,
    ];

    /// Nucleon count, the weight used for baryon-number conservation.
    pub fn mass_number(&self) -> u32 {
        match self {
            Nuclide::Neutron | Nuclide::Proton => 1,
            Nuclide::Deuterium => 2,
            Nuclide::Helium3 => 3,
            Nuclide::Helium4 => 4,
            Nuclide::Lithium7 => 7,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Nuclide::Neutron => "n",
            Nuclide::Proton => "p",
            Nuclide::Deuterium => "D",
            Nuclide::Helium3 => "He3",
            Nuclide::Helium4 => "He4",
            Nuclide::Lithium7 => "Li7",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nuclide_mass_numbers() {
        let total: u32 = Nuclide::ALL.iter().map(|n| n.mass_number()).sum();
        assert_eq!(total, 1 + 1 + 2 + 3 + 4 + 7);
    }

    #[test]
    fn test_epoch_labels_are_distinct() {
        let labels = [
            Epoch::Planck,
            Epoch::GrandUnification,
            Epoch::Electroweak,
            Epoch::QuarkHadron,
            Epoch::Lepton,
            Epoch::Nucleosynthesis,
            Epoch::Radiation,
            Epoch::Recombination,
            Epoch::Matter,
            Epoch::DarkEnergy,
        ]
        .iter()
        .map(|e| e.label())
        .collect::<std::collections::HashSet<_>>();
        assert_eq!(labels.len(), 10);
    }
}
