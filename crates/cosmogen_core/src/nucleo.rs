//! Nuclear reaction network for light-element synthesis.
//!
//! Six nuclides (n, p, D, He-3, He-4, Li-7) evolve as baryonic mass fractions
//! under pairwise reactions plus free-neutron decay. The network sleeps until
//! the bath cools to the deuterium activation temperature, seeds the
//! neutron-proton split from weak-equilibrium plus decay, burns with a
//! sub-stepped midpoint integrator, and freezes once every rate is negligible
//! against the expansion. Mass fractions always sum to one; a violation beyond
//! tolerance aborts the run.
//!
//! The integrator sits behind [`AbundanceIntegrator`] so a stiffer scheme can
//! be swapped in without touching the network bookkeeping.

use std::ops::{Index, IndexMut};

use crate::config::NetworkConfig;
use crate::error::{Result, SimError};
use crate::friedmann::ExpansionState;
use crate::thermo::ThermalState;
use cosmogen_data::{AbundanceSnapshot, Nuclide};

/// Permitted drift of the baryonic mass-fraction sum away from one.
pub const BARYON_SUM_TOLERANCE: f64 = 1e-6;
/// Smallest abundance used when scaling relative rates of change.
const ABUNDANCE_FLOOR: f64 = 1e-12;
/// Sub-step size times the fastest destruction rate stays below this.
/// Explicit midpoint is stable up to 2; the margin leaves accuracy headroom.
const STIFF_MARGIN: f64 = 0.8;

const fn slot(nuclide: Nuclide) -> usize {
    match nuclide {
        Nuclide::Neutron => 0,
        Nuclide::Proton => 1,
        Nuclide::Deuterium => 2,
        Nuclide::Helium3 => 3,
        Nuclide::Helium4 => 4,
        Nuclide::Lithium7 => 5,
    }
}

/// Baryonic mass fractions, indexed by [`Nuclide`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbundanceVector([f64; Nuclide::ALL.len()]);

impl AbundanceVector {
    pub fn zero() -> Self {
        Self([0.0; Nuclide::ALL.len()])
    }

    /// Pre-activation composition: undifferentiated hydrogen.
    pub fn protons_only() -> Self {
        let mut v = Self::zero();
        v[Nuclide::Proton] = 1.0;
        v
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn all_finite(&self) -> bool {
        self.0.iter().all(|x| x.is_finite())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Nuclide, f64)> + '_ {
        Nuclide::ALL.iter().map(move |&n| (n, self[n]))
    }

    pub fn to_snapshot(&self) -> AbundanceSnapshot {
        AbundanceSnapshot {
            neutron: self[Nuclide::Neutron],
            proton: self[Nuclide::Proton],
            deuterium: self[Nuclide::Deuterium],
            helium3: self[Nuclide::Helium3],
            helium4: self[Nuclide::Helium4],
            lithium7: self[Nuclide::Lithium7],
        }
    }
}

impl Index<Nuclide> for AbundanceVector {
    type Output = f64;

    fn index(&self, nuclide: Nuclide) -> &f64 {
        &self.0[slot(nuclide)]
    }
}

impl IndexMut<Nuclide> for AbundanceVector {
    fn index_mut(&mut self, nuclide: Nuclide) -> &mut f64 {
        &mut self.0[slot(nuclide)]
    }
}

/// Reaction-rate coefficients at a fixed temperature, 1/s per unit fraction.
#[derive(Debug, Clone, Copy)]
pub struct ReactionRates {
    /// n + p -> D, photodissociation-gated.
    pub np_deuterium: f64,
    /// D + D -> He-3 + n.
    pub dd_helium3: f64,
    /// He-3 + D -> He-4 + p.
    pub he3d_helium4: f64,
    /// He-3 + He-4 -> Li-7.
    pub he3he4_lithium7: f64,
    /// Free neutron decay, 1/tau.
    pub neutron_decay: f64,
}

impl ReactionRates {
    /// Evaluates the coefficients at a bath temperature in MeV.
    ///
    /// Deuterium formation carries the photodissociation bottleneck factor:
    /// with ~1/eta photons per baryon, deuterium survives only once the
    /// photon tail above its binding energy thins out. Charged-particle
    /// reactions additionally carry a Gamow-like falloff referenced to the
    /// activation temperature, so they shut down as the bath cools.
    pub fn at_temperature(config: &NetworkConfig, baryon_to_photon: f64, t_mev: f64) -> Self {
        let gate = 1.0
            / (1.0
                + (1.0 / baryon_to_photon) * (-config.deuterium_binding_mev / t_mev).exp());
        let gamow = (config.gamow_falloff * (1.0 - (config.activation_mev / t_mev).cbrt()))
            .exp()
            .min(1.0);
        Self {
            np_deuterium: config.rate_np_deuterium * gate,
            dd_helium3: config.rate_dd_helium3 * gamow,
            he3d_helium4: config.rate_he3d_helium4 * gamow,
            he3he4_lithium7: config.rate_he3he4_lithium7 * gamow,
            neutron_decay: 1.0 / config.neutron_lifetime_s,
        }
    }
}

/// Mass-fraction time derivatives. Stoichiometric weights are the mass
/// numbers, so each reaction moves fractions around without changing the sum.
fn derivatives(rates: &ReactionRates, x: &AbundanceVector) -> [f64; Nuclide::ALL.len()] {
    let xn = x[Nuclide::Neutron];
    let xp = x[Nuclide::Proton];
    let xd = x[Nuclide::Deuterium];
    let xhe3 = x[Nuclide::Helium3];
    let xhe4 = x[Nuclide::Helium4];

    let r_np = rates.np_deuterium * xn * xp;
    let r_dd = rates.dd_helium3 * xd * xd;
    let r_he3d = rates.he3d_helium4 * xhe3 * xd;
    let r_li = rates.he3he4_lithium7 * xhe3 * xhe4;
    let r_decay = rates.neutron_decay * xn;

    let mut d = [0.0; Nuclide::ALL.len()];
    d[slot(Nuclide::Neutron)] = -r_np + r_dd - r_decay;
    d[slot(Nuclide::Proton)] = -r_np + r_he3d + r_decay;
    d[slot(Nuclide::Deuterium)] = 2.0 * r_np - 4.0 * r_dd - 2.0 * r_he3d;
    d[slot(Nuclide::Helium3)] = 3.0 * r_dd - 3.0 * r_he3d - 3.0 * r_li;
    d[slot(Nuclide::Helium4)] = 4.0 * r_he3d - 4.0 * r_li;
    d[slot(Nuclide::Lithium7)] = 7.0 * r_li;
    d
}

/// Largest relative depletion rate, used to size sub-steps. Only shrinking
/// fractions count: production out of a near-zero fraction is harmless and
/// must not throttle the step.
fn relative_depletion(d: &[f64; Nuclide::ALL.len()], x: &AbundanceVector) -> f64 {
    let mut worst = 0.0_f64;
    for (i, di) in d.iter().enumerate() {
        if *di < 0.0 {
            worst = worst.max(-di / x.0[i].max(ABUNDANCE_FLOOR));
        }
    }
    worst
}

/// Fastest linearized destruction rate across the nuclides. This is the
/// stiffness scale of the system: near a production-destruction equilibrium
/// the net derivatives are small while the restoring rate stays fast, and an
/// explicit step must resolve the restoring rate to stay stable.
fn destruction_scale(rates: &ReactionRates, x: &AbundanceVector) -> f64 {
    let xn = x[Nuclide::Neutron];
    let xp = x[Nuclide::Proton];
    let xd = x[Nuclide::Deuterium];
    let xhe3 = x[Nuclide::Helium3];
    let xhe4 = x[Nuclide::Helium4];
    let l_n = rates.np_deuterium * xp + rates.neutron_decay;
    let l_p = rates.np_deuterium * xn;
    let l_d = 8.0 * rates.dd_helium3 * xd + 2.0 * rates.he3d_helium4 * xhe3;
    let l_he3 = 3.0 * rates.he3d_helium4 * xd + 3.0 * rates.he3he4_lithium7 * xhe4;
    let l_he4 = 4.0 * rates.he3he4_lithium7 * xhe3;
    [l_n, l_p, l_d, l_he3, l_he4]
        .into_iter()
        .fold(0.0, f64::max)
}

fn peak_rate(d: &[f64; Nuclide::ALL.len()]) -> f64 {
    d.iter().fold(0.0_f64, |acc, di| acc.max(di.abs()))
}

/// Integrates the abundance ODEs over one outer timestep at fixed rates.
///
/// Swappable seam: the network owns one of these behind a box and never
/// inspects the concrete scheme.
pub trait AbundanceIntegrator: std::fmt::Debug + Send + Sync {
    fn integrate(
        &self,
        rates: &ReactionRates,
        start: AbundanceVector,
        dt: f64,
    ) -> Result<AbundanceVector>;
}

/// Explicit midpoint with adaptive sub-stepping.
///
/// Each sub-step is bounded twice: by the linearized destruction rate (the
/// stiffness scale, which keeps the explicit scheme stable near equilibria)
/// and by the relative depletion rate (no fraction shrinks by more than
/// `safety` of itself in one sub-step, which keeps fractions positive since
/// every consumption term scales with the consumed species). The sub-step
/// budget turns a runaway-stiff configuration into a recoverable stability
/// error instead of an unbounded loop.
#[derive(Debug, Clone)]
pub struct SubSteppedMidpoint {
    safety: f64,
    max_substeps: u32,
}

impl SubSteppedMidpoint {
    pub fn new(safety: f64, max_substeps: u32) -> Self {
        Self {
            safety,
            max_substeps,
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.substep_safety, config.max_substeps)
    }
}

impl AbundanceIntegrator for SubSteppedMidpoint {
    fn integrate(
        &self,
        rates: &ReactionRates,
        start: AbundanceVector,
        dt: f64,
    ) -> Result<AbundanceVector> {
        let mut x = start;
        let mut elapsed = 0.0;
        let mut taken = 0u32;
        while elapsed < dt {
            if taken == self.max_substeps {
                return Err(SimError::stability("reaction network", dt, elapsed));
            }
            let d0 = derivatives(rates, &x);
            let stiffness = destruction_scale(rates, &x);
            let depletion = relative_depletion(&d0, &x);
            let mut h = dt - elapsed;
            if stiffness > 0.0 {
                h = h.min(STIFF_MARGIN / stiffness);
            }
            if depletion > 0.0 {
                h = h.min(self.safety / depletion);
            }

            let mut mid = x;
            for (i, di) in d0.iter().enumerate() {
                mid.0[i] = (mid.0[i] + 0.5 * h * di).max(0.0);
            }
            let dm = derivatives(rates, &mid);
            for (i, di) in dm.iter().enumerate() {
                // The clamp only guards the midpoint evaluation; the relative
                // cap keeps honest trajectories positive on its own.
                x.0[i] = (x.0[i] + h * di).max(0.0);
            }

            elapsed += h;
            taken += 1;
        }
        Ok(x)
    }
}

/// Lifecycle of the network across a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NetworkPhase {
    /// Too hot for deuterium; waiting, remembering when weak interactions
    /// froze out.
    Pending { weak_crossed_at: Option<f64> },
    /// Burning.
    Active,
    /// Rates negligible against the expansion; abundances locked for good.
    Frozen,
}

/// Neutron and proton fractions at activation: weak-equilibrium split at the
/// freeze-out temperature, depleted by free decay over the wait.
fn seed_fractions(config: &NetworkConfig, decay_interval_s: f64) -> (f64, f64) {
    let equilibrium = (-config.mass_split_mev / config.weak_freeze_mev).exp();
    let ratio = equilibrium * (-decay_interval_s / config.neutron_lifetime_s).exp();
    let neutron = ratio / (1.0 + ratio);
    (neutron, 1.0 - neutron)
}

/// Outcome of one network step, computed without touching the network.
/// Applying it commits the phase transition and the burned abundances.
#[derive(Debug, Clone, Copy)]
pub struct NetworkStep {
    phase: NetworkPhase,
    abundances: AbundanceVector,
    time_s: f64,
}

/// The reaction network state machine.
#[derive(Debug)]
pub struct ReactionNetwork {
    config: NetworkConfig,
    baryon_to_photon: f64,
    phase: NetworkPhase,
    abundances: AbundanceVector,
    integrator: Box<dyn AbundanceIntegrator>,
}

impl ReactionNetwork {
    pub fn new(config: NetworkConfig, baryon_to_photon: f64) -> Self {
        let integrator = Box::new(SubSteppedMidpoint::from_config(&config));
        Self {
            config,
            baryon_to_photon,
            phase: NetworkPhase::Pending {
                weak_crossed_at: None,
            },
            abundances: AbundanceVector::protons_only(),
            integrator,
        }
    }

    /// Replaces the integration scheme. The network bookkeeping is unchanged.
    pub fn with_integrator(mut self, integrator: Box<dyn AbundanceIntegrator>) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn phase(&self) -> NetworkPhase {
        self.phase
    }

    pub fn abundances(&self) -> &AbundanceVector {
        &self.abundances
    }

    /// Mass fractions for the history, present only once the network has
    /// seeded real nuclides.
    pub fn snapshot(&self) -> Option<AbundanceSnapshot> {
        match self.phase {
            NetworkPhase::Pending { .. } => None,
            _ => Some(self.abundances.to_snapshot()),
        }
    }

    /// Advances the network over one outer step.
    ///
    /// Stability errors surface before any abundance is committed, so the
    /// caller may retry with a smaller dt.
    pub fn advance(
        &mut self,
        thermal: &ThermalState,
        expansion: &ExpansionState,
        dt: f64,
    ) -> Result<()> {
        let staged = self.step(thermal, expansion, dt)?;
        self.apply(staged);
        Ok(())
    }

    /// Computes one step without mutating the network.
    ///
    /// The returned [`NetworkStep`] holds the phase and abundances the network
    /// would have after the step; commit it with [`ReactionNetwork::apply`].
    /// Splitting the two lets the caller stage a full simulation step and
    /// discard it wholesale when a later component rejects the dt.
    pub fn step(
        &self,
        thermal: &ThermalState,
        expansion: &ExpansionState,
        dt: f64,
    ) -> Result<NetworkStep> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::non_physical(
                format!("reaction network step with invalid dt {dt}"),
                expansion.dump(0),
            ));
        }
        let t_mev = thermal.temperature_mev();
        let unchanged = NetworkStep {
            phase: self.phase,
            abundances: self.abundances,
            time_s: expansion.time_s,
        };
        match self.phase {
            NetworkPhase::Pending { weak_crossed_at } => {
                let mut weak = weak_crossed_at;
                if weak.is_none() && t_mev < self.config.weak_freeze_mev {
                    weak = Some(expansion.time_s);
                }
                if t_mev < self.config.activation_mev {
                    let interval = weak.map_or(0.0, |t| (expansion.time_s - t).max(0.0));
                    let (neutron, proton) = seed_fractions(&self.config, interval);
                    let mut seeded = AbundanceVector::zero();
                    seeded[Nuclide::Neutron] = neutron;
                    seeded[Nuclide::Proton] = proton;
                    Ok(NetworkStep {
                        phase: NetworkPhase::Active,
                        abundances: seeded,
                        time_s: expansion.time_s,
                    })
                } else {
                    Ok(NetworkStep {
                        phase: NetworkPhase::Pending { weak_crossed_at: weak },
                        ..unchanged
                    })
                }
            }
            NetworkPhase::Active => {
                if t_mev < self.config.floor_mev {
                    return Ok(NetworkStep {
                        phase: NetworkPhase::Frozen,
                        ..unchanged
                    });
                }
                let rates =
                    ReactionRates::at_temperature(&self.config, self.baryon_to_photon, t_mev);
                let next = self.integrator.integrate(&rates, self.abundances, dt)?;

                let sum = next.sum();
                if !next.all_finite() || (sum - 1.0).abs() > BARYON_SUM_TOLERANCE {
                    let mut dump = expansion.dump(0);
                    dump.temperature_k = thermal.temperature_k;
                    dump.abundance_sum = Some(sum);
                    return Err(SimError::non_physical(
                        format!("baryon mass fractions sum to {sum:.9}, expected 1"),
                        dump,
                    ));
                }

                let residual = peak_rate(&derivatives(&rates, &next));
                let phase = if residual < self.config.freeze_ratio * expansion.hubble {
                    NetworkPhase::Frozen
                } else {
                    NetworkPhase::Active
                };
                Ok(NetworkStep {
                    phase,
                    abundances: next,
                    time_s: expansion.time_s,
                })
            }
            NetworkPhase::Frozen => Ok(unchanged),
        }
    }

    /// Commits a staged step and logs phase transitions.
    pub fn apply(&mut self, staged: NetworkStep) {
        match (self.phase, staged.phase) {
            (
                NetworkPhase::Pending {
                    weak_crossed_at: None,
                },
                NetworkPhase::Pending {
                    weak_crossed_at: Some(crossed),
                },
            ) => {
                tracing::info!(time_s = crossed, "weak interactions frozen out");
            }
            (NetworkPhase::Pending { .. }, NetworkPhase::Active) => {
                tracing::info!(
                    time_s = staged.time_s,
                    neutron_fraction = staged.abundances[Nuclide::Neutron],
                    "reaction network activated"
                );
            }
            (NetworkPhase::Active, NetworkPhase::Frozen) => {
                tracing::info!(
                    time_s = staged.time_s,
                    helium4 = staged.abundances[Nuclide::Helium4],
                    deuterium = staged.abundances[Nuclide::Deuterium],
                    "reaction network frozen"
                );
            }
            _ => {}
        }
        self.phase = staged.phase;
        self.abundances = staged.abundances;
    }
}
