//! Topology classification of detected events.
//!
//! Each event is compared against the configured signal topology and either
//! kept as signal, routed to a higher-multiplicity background bucket, or
//! rejected. Rejection is a normal, frequent outcome and is never an error;
//! only a beam/target mismatch aborts the run.

use crate::config::AnalysisConfig;
use crate::cuts::EventSelection;
use crate::event::Event;
use crate::fiducial::FiducialCut;
use crate::rotation::{TransitionCase, SUPPORTED_SPECIES};
use crate::store::MultiplicityStore;
use qe_core::{Error, Result, Species};
use std::sync::Arc;

/// Outcome of classifying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Matches the signal topology exactly
    Signal,
    /// Background candidate at the given hadron multiplicity
    Background {
        /// Hadron multiplicity, and therefore the destination bucket key
        multiplicity: u32,
    },
    /// Discarded; counted in diagnostics, never propagated as an error
    Rejected(RejectReason),
}

/// Why an event was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Non-finite, non-positive or implausibly large weight
    NonPhysicalWeight,
    /// Failed the generic kinematic selection
    FailedSelection,
    /// A final-state particle fell outside the fiducial volume
    OutsideFiducial,
    /// Inventory cannot contain the signal topology, or carries species or
    /// species counts the subtraction has no transition case for
    IncompatibleTopology,
    /// Below the configured per-species multiplicity floor
    BelowMultiplicityFloor,
    /// Multiplicity outside `(signal, max_background]`
    MultiplicityOutOfRange,
}

/// Run-level diagnostics, owned by the caller and aggregated across the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Events presented to the classifier
    pub events_seen: u64,
    /// Events matching the signal topology
    pub signal: u64,
    /// Events routed to a background bucket
    pub background: u64,
    /// Rejected: non-physical weight
    pub rejected_weight: u64,
    /// Rejected: generic selection
    pub rejected_selection: u64,
    /// Rejected: fiducial volume
    pub rejected_fiducial: u64,
    /// Rejected: incompatible topology
    pub rejected_topology: u64,
    /// Rejected: multiplicity floor
    pub rejected_floor: u64,
    /// Rejected: multiplicity bounds
    pub rejected_range: u64,
}

impl RunCounters {
    /// Fold another counter set into this one.
    pub fn merge(&mut self, other: &RunCounters) {
        self.events_seen += other.events_seen;
        self.signal += other.signal;
        self.background += other.background;
        self.rejected_weight += other.rejected_weight;
        self.rejected_selection += other.rejected_selection;
        self.rejected_fiducial += other.rejected_fiducial;
        self.rejected_topology += other.rejected_topology;
        self.rejected_floor += other.rejected_floor;
        self.rejected_range += other.rejected_range;
    }

    /// Log the run summary.
    pub fn log_summary(&self) {
        tracing::info!(
            events_seen = self.events_seen,
            signal = self.signal,
            background = self.background,
            rejected_weight = self.rejected_weight,
            rejected_selection = self.rejected_selection,
            rejected_fiducial = self.rejected_fiducial,
            rejected_topology = self.rejected_topology,
            rejected_floor = self.rejected_floor,
            rejected_range = self.rejected_range,
            "classification summary"
        );
    }
}

/// Buckets events by their final-state content relative to the signal
/// topology.
pub struct Classifier {
    config: AnalysisConfig,
    selection: Box<dyn EventSelection>,
    fiducial: Arc<dyn FiducialCut>,
}

impl Classifier {
    /// Build a classifier for a validated configuration.
    pub fn new(
        config: AnalysisConfig,
        selection: Box<dyn EventSelection>,
        fiducial: Arc<dyn FiducialCut>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, selection, fiducial })
    }

    /// The configuration this classifier runs with.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Classify one event.
    ///
    /// Returns `Err` only for a beam/target mismatch, which invalidates the
    /// whole run.
    pub fn classify(&self, event: &Event, counters: &mut RunCounters) -> Result<Classification> {
        counters.events_seen += 1;

        // Fatal: every later formula assumes the configured beam and target.
        if (event.beam.energy() - self.config.beam_energy).abs() > 1e-9 {
            return Err(Error::ConfigMismatch(format!(
                "event {}: beam energy {} GeV, configured {} GeV",
                event.id,
                event.beam.energy(),
                self.config.beam_energy
            )));
        }
        if event.target != self.config.target {
            return Err(Error::ConfigMismatch(format!(
                "event {}: target {:?}, configured {:?}",
                event.id, event.target, self.config.target
            )));
        }

        let w = event.total_weight;
        if !w.is_finite() || w <= 0.0 || w > self.config.weight_ceiling {
            counters.rejected_weight += 1;
            return Ok(Classification::Rejected(RejectReason::NonPhysicalWeight));
        }

        if !self.selection.accept(event, &self.config) {
            counters.rejected_selection += 1;
            return Ok(Classification::Rejected(RejectReason::FailedSelection));
        }

        for (species, p4) in event.detected_uncorr.hadrons() {
            if !self.fiducial.is_fiducial(species, &p4.momentum()) {
                counters.rejected_fiducial += 1;
                return Ok(Classification::Rejected(RejectReason::OutsideFiducial));
            }
        }

        if self.matches_topology(event) {
            counters.signal += 1;
            return Ok(Classification::Signal);
        }

        // Background candidate: it must be able to degrade into the signal
        // topology, and the subtraction must have a transition case for
        // every species it carries.
        let Some(multiplicity) = self.signal_equivalent_multiplicity(event) else {
            counters.rejected_topology += 1;
            return Ok(Classification::Rejected(RejectReason::IncompatibleTopology));
        };

        for (species, &floor) in &self.config.multiplicity_floor {
            if (event.detected.count(*species) as u32) < floor {
                counters.rejected_floor += 1;
                return Ok(Classification::Rejected(RejectReason::BelowMultiplicityFloor));
            }
        }

        let signal_mult = self.config.signal_multiplicity();
        if multiplicity <= signal_mult || multiplicity > self.config.max_background_multiplicity {
            counters.rejected_range += 1;
            return Ok(Classification::Rejected(RejectReason::MultiplicityOutOfRange));
        }

        // A candidate whose species counts match no transition case has no
        // degradation path and is dropped here, never handed to the driver.
        if TransitionCase::for_event(event).is_none() {
            counters.rejected_topology += 1;
            return Ok(Classification::Rejected(RejectReason::IncompatibleTopology));
        }

        counters.background += 1;
        Ok(Classification::Background { multiplicity })
    }

    /// Classify an event and, when kept, route it into the store.
    ///
    /// Acceptance weights are folded into the event weight here, once, so
    /// that downstream subtraction sees the fully corrected weight.
    pub fn classify_into(
        &self,
        mut event: Event,
        store: &mut MultiplicityStore,
        counters: &mut RunCounters,
    ) -> Result<Classification> {
        let outcome = self.classify(&event, counters)?;

        if self.config.apply_acceptance_weights {
            let mut acc = 1.0;
            for (species, p4) in event.detected.hadrons() {
                acc *= self.fiducial.acceptance_weight(species, &p4.momentum());
            }
            event.total_weight *= acc;
        }

        match outcome {
            Classification::Signal => {
                store.append(self.config.signal_multiplicity(), event)?;
            }
            Classification::Background { multiplicity } => {
                event.is_background = true;
                store.append(multiplicity, event)?;
            }
            Classification::Rejected(_) => {}
        }
        Ok(outcome)
    }

    fn matches_topology(&self, event: &Event) -> bool {
        // Exact match on every species, lepton excluded: extra hadrons of
        // any species make the event background, not signal.
        for (species, required) in self.config.topology.iter() {
            if event.detected.count(species) as u32 != required {
                return false;
            }
        }
        event
            .detected
            .species()
            .filter(|s| s.is_hadronic())
            .all(|s| self.config.topology.required(s) == event.detected.count(s) as u32)
    }

    /// Hadron multiplicity of a background candidate, or `None` when the
    /// inventory cannot contain the topology or carries unsupported species.
    fn signal_equivalent_multiplicity(&self, event: &Event) -> Option<u32> {
        for (species, required) in self.config.topology.iter() {
            if (event.detected.count(species) as u32) < required {
                return None;
            }
        }
        let supported = |s: &Species| SUPPORTED_SPECIES.contains(s);
        if !event.detected.species().filter(|s| s.is_hadronic()).all(|s| supported(&s)) {
            return None;
        }
        Some(event.detected.hadron_multiplicity())
    }
}
