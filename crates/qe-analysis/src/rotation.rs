//! Rotation-based migration probability estimates.
//!
//! For a background event, the engine asks: if some of its hadrons had
//! escaped detection, would the remainder have been selected as signal? The
//! estimate exploits the azimuthal symmetry of the scattering about the
//! momentum-transfer direction: every hadron is rotated rigidly about the
//! q-vector by many sampled angles, and each sample passes when the removed
//! candidates land outside the fiducial volume, the retained ones stay
//! inside, and the reduced event still satisfies the signal cuts.
//!
//! Angles are drawn uniformly in `[0, 2pi)` from a single seeded stream, so
//! a fixed seed and a fixed event order reproduce weights bit for bit.
//!
//! Each supported topology transition has its own explicit routine: the
//! calorimetric correction differs by species (protons carry the nuclear
//! binding-energy term, pions and photons do not), so merging them would be
//! a correctness risk.

use crate::config::{AnalysisConfig, SignalCuts};
use crate::event::Event;
use crate::fiducial::FiducialCut;
use nalgebra::{Unit, Vector3};
use qe_core::{Error, FourVector, Result, Species, Target};
use qe_kinematics::{calorimetric_energy, missing_transverse_momentum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::f64::consts::TAU;
use std::sync::Arc;

/// Species the transition-case table covers. Background candidates carrying
/// anything else are rejected at classification time.
pub const SUPPORTED_SPECIES: [Species; 4] =
    [Species::Proton, Species::PiPlus, Species::PiMinus, Species::Photon];

/// Topology-transition case of a background event, keyed on its proton and
/// pion-like (charged pion or photon) content relative to the one-proton
/// signal topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCase {
    /// 2 protons, nothing else
    TwoProton,
    /// 1 proton + 1 pion-like
    OneProtonOnePion,
    /// 3 protons, nothing else
    ThreeProton,
    /// 2 protons + 1 pion-like
    TwoProtonOnePion,
    /// 3 protons + 1 pion-like
    ThreeProtonOnePion,
}

impl TransitionCase {
    /// Case for an event's proton / pion-like counts, if one exists.
    pub fn for_event(event: &Event) -> Option<Self> {
        let protons = event.detected.count(Species::Proton);
        let pions = pion_like_count(event);
        match (protons, pions) {
            (2, 0) => Some(TransitionCase::TwoProton),
            (1, 1) => Some(TransitionCase::OneProtonOnePion),
            (3, 0) => Some(TransitionCase::ThreeProton),
            (2, 1) => Some(TransitionCase::TwoProtonOnePion),
            (3, 1) => Some(TransitionCase::ThreeProtonOnePion),
            _ => None,
        }
    }

    /// Case name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            TransitionCase::TwoProton => "2p0pi",
            TransitionCase::OneProtonOnePion => "1p1pi",
            TransitionCase::ThreeProton => "3p0pi",
            TransitionCase::TwoProtonOnePion => "2p1pi",
            TransitionCase::ThreeProtonOnePion => "3p1pi",
        }
    }
}

fn pion_like_count(event: &Event) -> usize {
    event.detected.count(Species::PiPlus)
        + event.detected.count(Species::PiMinus)
        + event.detected.count(Species::Photon)
}

/// One combinatorial removal outcome: which particles survive, which are
/// treated as lost, and the estimated probability that the reduced event
/// would pass the signal selection.
#[derive(Debug, Clone)]
pub struct Removal {
    /// Transition case that produced this outcome
    pub case: &'static str,
    /// Surviving particles, as (species, index into the parent inventory)
    pub retained: Vec<(Species, usize)>,
    /// Lost particles, as (species, index into the parent inventory)
    pub removed: Vec<(Species, usize)>,
    /// Fraction of rotation samples that passed, in `[0, 1]`
    pub probability: f64,
}

/// Detector-corrected and uncorrected momenta of one candidate hadron.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    species: Species,
    index: usize,
    corrected: FourVector,
    uncorrected: FourVector,
}

/// Owns the rotation axis and the angle stream for one analysis run.
pub struct RotationEngine {
    target: Target,
    n_rotations: u32,
    cuts: SignalCuts,
    fiducial: Arc<dyn FiducialCut>,
    axis: Option<Unit<Vector3<f64>>>,
    rng: StdRng,
}

impl RotationEngine {
    /// Build an engine from the analysis configuration.
    pub fn new(config: &AnalysisConfig, fiducial: Arc<dyn FiducialCut>) -> Self {
        Self {
            target: config.target,
            n_rotations: config.n_rotations,
            cuts: config.signal_cuts.clone(),
            fiducial,
            axis: None,
            rng: StdRng::seed_from_u64(config.rotation_seed),
        }
    }

    /// Set the rotation axis to an event's momentum-transfer vector. Must be
    /// called per event, after [`RotationEngine::reset_axis`], before any
    /// transition routine.
    pub fn set_axis(&mut self, q3: Vector3<f64>) -> Result<()> {
        if q3.norm() == 0.0 || !q3.norm().is_finite() {
            return Err(Error::Validation("momentum-transfer axis must be non-zero".into()));
        }
        self.axis = Some(Unit::new_normalize(q3));
        Ok(())
    }

    /// Clear the axis between unrelated events so a stale q-vector can never
    /// leak into the next event's rotations.
    pub fn reset_axis(&mut self) {
        self.axis = None;
    }

    /// 2p -> 1p: either proton may be the lost one.
    pub fn two_proton(&mut self, event: &Event, bucket: u32) -> Result<Vec<Removal>> {
        let case = TransitionCase::TwoProton;
        let protons = self.candidates(event, Species::Proton, 2, bucket, case)?;
        self.expect_no_pions(event, bucket, case)?;

        let mut out = Vec::new();
        for j in choose_one(2) {
            let keep = 1 - j;
            let p = self.survival_probability(
                &event.out_lepton,
                &[protons[keep]],
                &[protons[j]],
            )?;
            push_removal(&mut out, case, &[protons[keep]], &[protons[j]], p);
        }
        Ok(out)
    }

    /// 1p1pi -> 1p: the pion-like particle is the lost one.
    pub fn one_proton_one_pion(&mut self, event: &Event, bucket: u32) -> Result<Vec<Removal>> {
        let case = TransitionCase::OneProtonOnePion;
        let protons = self.candidates(event, Species::Proton, 1, bucket, case)?;
        let pions = self.pion_candidates(event, 1, bucket, case)?;

        let p = self.survival_probability(&event.out_lepton, &[protons[0]], &[pions[0]])?;
        let mut out = Vec::new();
        push_removal(&mut out, case, &[protons[0]], &[pions[0]], p);
        Ok(out)
    }

    /// 3p -> {2p, 1p}: one or two of the three protons may be lost. The
    /// 2-of-3 retention set has exactly 3 distinct combinations.
    pub fn three_proton(&mut self, event: &Event, bucket: u32) -> Result<Vec<Removal>> {
        let case = TransitionCase::ThreeProton;
        let protons = self.candidates(event, Species::Proton, 3, bucket, case)?;
        self.expect_no_pions(event, bucket, case)?;

        let mut out = Vec::new();
        for j in choose_one(3) {
            let keep: Vec<Candidate> =
                (0..3).filter(|&k| k != j).map(|k| protons[k]).collect();
            let p = self.survival_probability(&event.out_lepton, &keep, &[protons[j]])?;
            push_removal(&mut out, case, &keep, &[protons[j]], p);
        }
        for (a, b) in choose_two(3) {
            let keep = (0..3).find(|&k| k != a && k != b).expect("third index");
            let p = self.survival_probability(
                &event.out_lepton,
                &[protons[keep]],
                &[protons[a], protons[b]],
            )?;
            push_removal(&mut out, case, &[protons[keep]], &[protons[a], protons[b]], p);
        }
        Ok(out)
    }

    /// 2p1pi -> {2p, 1p1pi, 1p}.
    pub fn two_proton_one_pion(&mut self, event: &Event, bucket: u32) -> Result<Vec<Removal>> {
        let case = TransitionCase::TwoProtonOnePion;
        let protons = self.candidates(event, Species::Proton, 2, bucket, case)?;
        let pions = self.pion_candidates(event, 1, bucket, case)?;
        let pi = pions[0];

        let mut out = Vec::new();

        // Lose the pion, keep both protons.
        let p = self.survival_probability(&event.out_lepton, &protons, &[pi])?;
        push_removal(&mut out, case, &protons, &[pi], p);

        // Lose one proton, keep the other and the pion.
        for j in choose_one(2) {
            let keep = [protons[1 - j], pi];
            let p = self.survival_probability(&event.out_lepton, &keep, &[protons[j]])?;
            push_removal(&mut out, case, &keep, &[protons[j]], p);
        }

        // Lose one proton and the pion together.
        for j in choose_one(2) {
            let p = self.survival_probability(
                &event.out_lepton,
                &[protons[1 - j]],
                &[protons[j], pi],
            )?;
            push_removal(&mut out, case, &[protons[1 - j]], &[protons[j], pi], p);
        }
        Ok(out)
    }

    /// 3p1pi -> {3p, 2p1pi, 2p, 1p1pi, 1p}.
    pub fn three_proton_one_pion(&mut self, event: &Event, bucket: u32) -> Result<Vec<Removal>> {
        let case = TransitionCase::ThreeProtonOnePion;
        let protons = self.candidates(event, Species::Proton, 3, bucket, case)?;
        let pions = self.pion_candidates(event, 1, bucket, case)?;
        let pi = pions[0];

        let mut out = Vec::new();

        // Lose the pion only.
        let p = self.survival_probability(&event.out_lepton, &protons, &[pi])?;
        push_removal(&mut out, case, &protons, &[pi], p);

        for j in choose_one(3) {
            let keep_p: Vec<Candidate> =
                (0..3).filter(|&k| k != j).map(|k| protons[k]).collect();

            // Lose one proton.
            let mut keep = keep_p.clone();
            keep.push(pi);
            let p = self.survival_probability(&event.out_lepton, &keep, &[protons[j]])?;
            push_removal(&mut out, case, &keep, &[protons[j]], p);

            // Lose one proton and the pion.
            let p = self.survival_probability(&event.out_lepton, &keep_p, &[protons[j], pi])?;
            push_removal(&mut out, case, &keep_p, &[protons[j], pi], p);
        }

        for (a, b) in choose_two(3) {
            let keep = (0..3).find(|&k| k != a && k != b).expect("third index");

            // Lose two protons.
            let p = self.survival_probability(
                &event.out_lepton,
                &[protons[keep], pi],
                &[protons[a], protons[b]],
            )?;
            push_removal(
                &mut out,
                case,
                &[protons[keep], pi],
                &[protons[a], protons[b]],
                p,
            );

            // Lose two protons and the pion.
            let p = self.survival_probability(
                &event.out_lepton,
                &[protons[keep]],
                &[protons[a], protons[b], pi],
            )?;
            push_removal(
                &mut out,
                case,
                &[protons[keep]],
                &[protons[a], protons[b], pi],
                p,
            );
        }
        Ok(out)
    }

    /// Fraction of rotation samples for which the removed candidates escape
    /// detection while the retained ones stay detected and the reduced event
    /// passes the signal cuts.
    fn survival_probability(
        &mut self,
        out_lepton: &FourVector,
        retained: &[Candidate],
        removed: &[Candidate],
    ) -> Result<f64> {
        let axis = self
            .axis
            .ok_or_else(|| Error::Validation("rotation axis not set for this event".into()))?;

        let n = self.n_rotations;
        let angles: Vec<f64> = (0..n).map(|_| self.rng.gen_range(0.0..TAU)).collect();

        let this = &*self;
        let passes = angles
            .par_iter()
            .filter(|&&phi| this.sample_passes(&axis, phi, out_lepton, retained, removed))
            .count();

        Ok(passes as f64 / n as f64)
    }

    /// Evaluate one rotated sample. Fiducial decisions use the uncorrected
    /// momenta; the signal cuts use the corrected ones, exactly as the
    /// signal selection does.
    fn sample_passes(
        &self,
        axis: &Unit<Vector3<f64>>,
        phi: f64,
        out_lepton: &FourVector,
        retained: &[Candidate],
        removed: &[Candidate],
    ) -> bool {
        for c in removed {
            let rotated = c.uncorrected.rotated_about(axis, phi);
            if self.fiducial.is_fiducial(c.species, &rotated.momentum()) {
                return false;
            }
        }

        let mut rotated_retained: Vec<(Species, FourVector)> = Vec::with_capacity(retained.len());
        for c in retained {
            let rotated_uncorr = c.uncorrected.rotated_about(axis, phi);
            if !self.fiducial.is_fiducial(c.species, &rotated_uncorr.momentum()) {
                return false;
            }
            rotated_retained.push((c.species, c.corrected.rotated_about(axis, phi)));
        }

        let ecal = calorimetric_energy(
            out_lepton.energy(),
            rotated_retained.iter().map(|(s, p)| (*s, p)),
            self.target,
        );
        let pperp =
            missing_transverse_momentum(out_lepton, rotated_retained.iter().map(|(_, p)| p))
                .norm();

        self.cuts.passes(ecal, pperp)
    }

    /// Corrected/uncorrected candidate pairs for a species, checking the
    /// count expected by the transition case.
    fn candidates(
        &self,
        event: &Event,
        species: Species,
        expected: usize,
        bucket: u32,
        case: TransitionCase,
    ) -> Result<Vec<Candidate>> {
        let corr = event.detected.get(species);
        let uncorr = event.detected_uncorr.get(species);
        if corr.len() != expected || uncorr.len() != expected {
            return Err(Error::CombinatorialInvariant {
                event_id: event.id,
                bucket,
                case: case.name(),
                details: format!(
                    "expected {expected} {species:?} candidates, found {} corrected / {} uncorrected",
                    corr.len(),
                    uncorr.len()
                ),
            });
        }
        Ok(corr
            .iter()
            .zip(uncorr.iter())
            .enumerate()
            .map(|(index, (c, u))| Candidate {
                species,
                index,
                corrected: *c,
                uncorrected: *u,
            })
            .collect())
    }

    /// The single pion-like candidate (charged pion or photon) of an event.
    fn pion_candidates(
        &self,
        event: &Event,
        expected: usize,
        bucket: u32,
        case: TransitionCase,
    ) -> Result<Vec<Candidate>> {
        let mut out = Vec::new();
        for species in [Species::PiPlus, Species::PiMinus, Species::Photon] {
            let corr = event.detected.get(species);
            let uncorr = event.detected_uncorr.get(species);
            if corr.len() != uncorr.len() {
                return Err(Error::CombinatorialInvariant {
                    event_id: event.id,
                    bucket,
                    case: case.name(),
                    details: format!(
                        "corrected/uncorrected {species:?} counts differ: {} vs {}",
                        corr.len(),
                        uncorr.len()
                    ),
                });
            }
            for (index, (c, u)) in corr.iter().zip(uncorr.iter()).enumerate() {
                out.push(Candidate { species, index, corrected: *c, uncorrected: *u });
            }
        }
        if out.len() != expected {
            return Err(Error::CombinatorialInvariant {
                event_id: event.id,
                bucket,
                case: case.name(),
                details: format!("expected {expected} pion-like candidates, found {}", out.len()),
            });
        }
        Ok(out)
    }

    fn expect_no_pions(&self, event: &Event, bucket: u32, case: TransitionCase) -> Result<()> {
        let n = pion_like_count(event);
        if n != 0 {
            return Err(Error::CombinatorialInvariant {
                event_id: event.id,
                bucket,
                case: case.name(),
                details: format!("expected no pion-like candidates, found {n}"),
            });
        }
        Ok(())
    }
}

fn push_removal(
    out: &mut Vec<Removal>,
    case: TransitionCase,
    retained: &[Candidate],
    removed: &[Candidate],
    probability: f64,
) {
    // Zero-probability combinations carry no statistical content.
    if probability <= 0.0 {
        return;
    }
    out.push(Removal {
        case: case.name(),
        retained: retained.iter().map(|c| (c.species, c.index)).collect(),
        removed: removed.iter().map(|c| (c.species, c.index)).collect(),
        probability,
    });
}

/// All 1-of-n selections, in index order.
pub(crate) fn choose_one(n: usize) -> Vec<usize> {
    (0..n).collect()
}

/// All distinct 2-of-n selections with `a < b`, in lexicographic order.
pub(crate) fn choose_two(n: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for a in 0..n {
        for b in (a + 1)..n {
            out.push((a, b));
        }
    }
    out
}
