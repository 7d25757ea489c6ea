//! Analysis configuration: signal topology, beam/target settings, background
//! multiplicity bounds and the rotation-engine parameters.
//!
//! These types are read-only to the core once an analysis run starts.

use qe_core::{Error, Result, Species, Target};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Required particle-species composition defining a "signal" event.
///
/// The scattered electron is implicit (exactly one) and excluded from the
/// multiplicity count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    counts: BTreeMap<Species, u32>,
}

impl Topology {
    /// Build a topology from per-species required counts.
    ///
    /// Zero counts are dropped; an electron entry is rejected because the
    /// lepton is implicit.
    pub fn new(counts: impl IntoIterator<Item = (Species, u32)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (species, n) in counts {
            if species == Species::Electron {
                return Err(Error::Validation(
                    "topology must not list the electron: the lepton is implicit".into(),
                ));
            }
            if n > 0 {
                map.insert(species, n);
            }
        }
        if map.is_empty() {
            return Err(Error::Validation("topology requires at least one hadron".into()));
        }
        Ok(Self { counts: map })
    }

    /// The one-proton quasi-elastic topology.
    pub fn one_proton() -> Self {
        Self { counts: BTreeMap::from([(Species::Proton, 1)]) }
    }

    /// Required count for a species (0 when absent).
    pub fn required(&self, species: Species) -> u32 {
        self.counts.get(&species).copied().unwrap_or(0)
    }

    /// Signal multiplicity: total required hadron count.
    pub fn multiplicity(&self) -> u32 {
        self.counts.values().sum()
    }

    /// Iterate over (species, required count) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Species, u32)> + '_ {
        self.counts.iter().map(|(&s, &n)| (s, n))
    }
}

/// Kinematic cuts defining the signal selection, reused verbatim by the
/// rotation engine when it asks "would this reduced event still pass?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalCuts {
    /// Accepted calorimetric-energy window (GeV)
    pub ecal_range: (f64, f64),
    /// Maximum missing transverse momentum (GeV)
    pub pperp_max: f64,
}

impl SignalCuts {
    /// Default window for a given beam energy: ECal within 5% of the beam
    /// and missing transverse momentum below 200 MeV.
    pub fn for_beam(beam_energy: f64) -> Self {
        Self { ecal_range: (0.95 * beam_energy, 1.05 * beam_energy), pperp_max: 0.2 }
    }

    /// Whether a reconstructed (ECal, |delta pT|) pair passes.
    pub fn passes(&self, ecal: f64, pperp: f64) -> bool {
        ecal >= self.ecal_range.0 && ecal <= self.ecal_range.1 && pperp <= self.pperp_max
    }
}

/// Full analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Configured electron beam energy (GeV)
    pub beam_energy: f64,
    /// Configured nuclear target
    pub target: Target,
    /// Signal topology definition
    pub topology: Topology,
    /// Largest hadron multiplicity retained as background
    pub max_background_multiplicity: u32,
    /// Number of azimuthal rotations per combinatorial assignment
    #[serde(default = "default_n_rotations")]
    pub n_rotations: u32,
    /// Seed for the rotation-angle stream
    #[serde(default)]
    pub rotation_seed: u64,
    /// Events with a total weight above this ceiling are reconstruction
    /// artifacts and are rejected
    #[serde(default = "default_weight_ceiling")]
    pub weight_ceiling: f64,
    /// Per-species multiplicity floor applied to background candidates
    #[serde(default)]
    pub multiplicity_floor: BTreeMap<Species, u32>,
    /// Signal-selection cuts shared with the rotation engine
    pub signal_cuts: SignalCuts,
    /// Fold per-particle acceptance weights into the event weight
    #[serde(default = "default_true")]
    pub apply_acceptance_weights: bool,
    /// Apply the beam-energy-dependent Q² cut
    #[serde(default = "default_true")]
    pub apply_q2_cut: bool,
    /// Apply the invariant-mass cut
    #[serde(default = "default_true")]
    pub apply_w_cut: bool,
    /// Apply the minimum electron momentum cut
    #[serde(default = "default_true")]
    pub apply_momentum_cut: bool,
}

fn default_n_rotations() -> u32 {
    100
}

fn default_weight_ceiling() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}

impl AnalysisConfig {
    /// Configuration with defaults for the given beam/target and the
    /// one-proton signal topology.
    pub fn new(beam_energy: f64, target: Target) -> Self {
        Self {
            beam_energy,
            target,
            topology: Topology::one_proton(),
            max_background_multiplicity: 3,
            n_rotations: default_n_rotations(),
            rotation_seed: 0,
            weight_ceiling: default_weight_ceiling(),
            multiplicity_floor: BTreeMap::new(),
            signal_cuts: SignalCuts::for_beam(beam_energy),
            apply_acceptance_weights: true,
            apply_q2_cut: true,
            apply_w_cut: true,
            apply_momentum_cut: true,
        }
    }

    /// Signal multiplicity derived from the topology.
    pub fn signal_multiplicity(&self) -> u32 {
        self.topology.multiplicity()
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.beam_energy.is_finite() || self.beam_energy <= 0.0 {
            return Err(Error::Validation(format!(
                "beam energy must be positive, got {}",
                self.beam_energy
            )));
        }
        if self.max_background_multiplicity <= self.signal_multiplicity() {
            return Err(Error::Validation(format!(
                "max background multiplicity {} must exceed the signal multiplicity {}",
                self.max_background_multiplicity,
                self.signal_multiplicity()
            )));
        }
        if self.n_rotations == 0 {
            return Err(Error::Validation("rotation count must be at least 1".into()));
        }
        if !(self.weight_ceiling > 0.0) {
            return Err(Error::Validation("weight ceiling must be positive".into()));
        }
        let (lo, hi) = self.signal_cuts.ecal_range;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(Error::Validation(format!(
                "invalid ECal window: expected low < high, got ({lo}, {hi})"
            )));
        }
        if !(self.signal_cuts.pperp_max > 0.0) {
            return Err(Error::Validation("missing-pT cut must be positive".into()));
        }
        Ok(())
    }
}
