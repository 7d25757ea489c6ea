//! Event value objects: the per-species particle inventory and the detected
//! event record the classifier and subtraction driver operate on.

use nalgebra::Vector3;
use qe_core::{FourVector, Species, Target};
use qe_kinematics::momentum_transfer;
use std::collections::BTreeMap;

/// Mapping from species to an ordered sequence of four-vectors.
///
/// Keys are unique; the per-species sequences keep detector order so
/// combinatorial enumeration is reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleInventory {
    map: BTreeMap<Species, Vec<FourVector>>,
}

impl ParticleInventory {
    /// Empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a particle of the given species.
    pub fn push(&mut self, species: Species, p4: FourVector) {
        self.map.entry(species).or_default().push(p4);
    }

    /// Number of detected particles of a species.
    pub fn count(&self, species: Species) -> usize {
        self.map.get(&species).map_or(0, Vec::len)
    }

    /// Four-vectors of a species, in detector order.
    pub fn get(&self, species: Species) -> &[FourVector] {
        self.map.get(&species).map_or(&[], Vec::as_slice)
    }

    /// Total hadron count (the scattered lepton is excluded).
    pub fn hadron_multiplicity(&self) -> u32 {
        self.map
            .iter()
            .filter(|(s, _)| s.is_hadronic())
            .map(|(_, v)| v.len() as u32)
            .sum()
    }

    /// Iterate over all hadrons as (species, four-vector) pairs.
    pub fn hadrons(&self) -> impl Iterator<Item = (Species, &FourVector)> {
        self.map
            .iter()
            .filter(|(s, _)| s.is_hadronic())
            .flat_map(|(&s, v)| v.iter().map(move |p| (s, p)))
    }

    /// Species present with at least one particle.
    pub fn species(&self) -> impl Iterator<Item = Species> + '_ {
        self.map.iter().filter(|(_, v)| !v.is_empty()).map(|(&s, _)| s)
    }

    /// New inventory keeping, per species, only the particles at the listed
    /// indices (in the order given).
    pub fn project(&self, keep: &[(Species, usize)]) -> Self {
        let mut out = Self::new();
        for &(species, idx) in keep {
            if let Some(p4) = self.map.get(&species).and_then(|v| v.get(idx)) {
                out.push(species, *p4);
            }
        }
        out
    }
}

/// One detected event.
///
/// Events are value objects: a pseudo-event derived during subtraction is a
/// shallow copy of its parent with the inventory and weight replaced. The
/// parent is never mutated.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event identifier from reconstruction
    pub id: u64,
    /// Target species the event was recorded on
    pub target: Target,
    /// Beam four-vector
    pub beam: FourVector,
    /// Outgoing-lepton four-vector
    pub out_lepton: FourVector,
    /// Detector-corrected final-state inventory
    pub detected: ParticleInventory,
    /// Uncorrected final-state inventory, parallel to `detected`
    pub detected_uncorr: ParticleInventory,
    /// Product of all prior correction weights
    pub total_weight: f64,
    /// Set once the classifier routes the event to a background bucket
    pub is_background: bool,
    q3: Option<Vector3<f64>>,
}

impl Event {
    /// Build a new event from reconstruction output.
    pub fn new(
        id: u64,
        target: Target,
        beam: FourVector,
        out_lepton: FourVector,
        detected: ParticleInventory,
        detected_uncorr: ParticleInventory,
        total_weight: f64,
    ) -> Self {
        Self {
            id,
            target,
            beam,
            out_lepton,
            detected,
            detected_uncorr,
            total_weight,
            is_background: false,
            q3: None,
        }
    }

    /// Momentum-transfer vector for this event, computed once and cached.
    pub fn momentum_transfer(&mut self) -> Vector3<f64> {
        if let Some(q3) = self.q3 {
            return q3;
        }
        let q3 = momentum_transfer(&self.out_lepton, self.beam.energy());
        self.q3 = Some(q3);
        q3
    }

    /// Drop the cached momentum-transfer vector. Must be called before this
    /// event record is reused for unrelated kinematics, to avoid axis
    /// leakage between events.
    pub fn reset_momentum_transfer(&mut self) {
        self.q3 = None;
    }

    /// Derive a pseudo-event: same lepton and bookkeeping, new inventories
    /// and weight. The cached momentum transfer is dropped.
    pub fn derive(
        &self,
        detected: ParticleInventory,
        detected_uncorr: ParticleInventory,
        weight: f64,
    ) -> Self {
        Self {
            id: self.id,
            target: self.target,
            beam: self.beam,
            out_lepton: self.out_lepton,
            detected,
            detected_uncorr,
            total_weight: weight,
            is_background: true,
            q3: None,
        }
    }
}
