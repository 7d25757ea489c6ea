//! Background-subtraction driver.
//!
//! Walks the multiplicity buckets from the maximum configured value down to
//! one above the signal multiplicity. Every event in the current bucket is
//! dispatched to its topology-transition case; each surviving combination
//! becomes a pseudo-event appended to the bucket matching its reduced hadron
//! count, with weight `-probability * parent_weight`.
//!
//! The sign is uniform by construction: pseudo-events appended to an
//! intermediate bucket are re-processed when the walk reaches that bucket,
//! and the sign flips through the signed parent weight. This computes the
//! top-down inversion of
//!
//! ```text
//! observed(k) = true(k) + sum over m > k of P(m -> k) * true(m)
//! ```
//!
//! so the expected signal count is invariant under the subtraction. Direct
//! multi-particle-loss transitions (3p -> 1p, 2p1pi -> 1p, ...) are distinct
//! probabilities, not products of single-step ones, and are estimated by
//! their own rotation routines.
//!
//! Bucket order is a correctness requirement, not an optimization: lower
//! buckets must have absorbed every correction before they are processed.

use crate::config::AnalysisConfig;
use crate::event::Event;
use crate::fiducial::FiducialCut;
use crate::rotation::{Removal, RotationEngine, TransitionCase};
use crate::store::MultiplicityStore;
use qe_core::{Error, Result, Species};
use std::sync::Arc;

/// The background-subtracted signal sample: events of the signal bucket with
/// their final signed weights, in processing order.
pub type SignalSample = Vec<(Event, f64)>;

/// Drives the bucket walk for one analysis run.
pub struct SubtractionDriver {
    config: AnalysisConfig,
    engine: RotationEngine,
}

impl SubtractionDriver {
    /// Build a driver. The transition-case table covers the one-proton
    /// signal topology; anything else is a configuration error.
    pub fn new(config: AnalysisConfig, fiducial: Arc<dyn FiducialCut>) -> Result<Self> {
        config.validate()?;
        if config.topology.required(Species::Proton) != 1 || config.signal_multiplicity() != 1 {
            return Err(Error::ConfigMismatch(
                "background subtraction supports the one-proton signal topology only".into(),
            ));
        }
        let engine = RotationEngine::new(&config, fiducial);
        Ok(Self { config, engine })
    }

    /// Run the subtraction over a classified store and return the signal
    /// sample.
    ///
    /// A store can be subtracted exactly once: a second invocation would
    /// double-count every contribution and is rejected.
    pub fn run(&mut self, store: &mut MultiplicityStore) -> Result<SignalSample> {
        if store.is_subtracted() {
            return Err(Error::Validation(
                "store has already been background-subtracted; re-running would double-count".into(),
            ));
        }
        store.mark_subtracted();

        let signal_mult = self.config.signal_multiplicity();
        let max_mult = self.config.max_background_multiplicity;

        for m in ((signal_mult + 1)..=max_mult).rev() {
            let n_events = store.bucket_len(m);
            if n_events == 0 {
                tracing::debug!(bucket = m, "empty bucket, transition skipped");
                continue;
            }
            tracing::debug!(bucket = m, n_events, "subtracting bucket");

            // Appends from this bucket only target lower keys, so indexing
            // by position is stable here.
            let mut i = 0;
            while let Some(mut event) = store.event_at(m, i) {
                self.engine.reset_axis();
                let q3 = event.momentum_transfer();
                self.engine.set_axis(q3)?;

                let case = TransitionCase::for_event(&event).ok_or_else(|| {
                    Error::CombinatorialInvariant {
                        event_id: event.id,
                        bucket: m,
                        case: "dispatch",
                        details: "no transition case matches this inventory".into(),
                    }
                })?;

                let removals = match case {
                    TransitionCase::TwoProton => self.engine.two_proton(&event, m)?,
                    TransitionCase::OneProtonOnePion => {
                        self.engine.one_proton_one_pion(&event, m)?
                    }
                    TransitionCase::ThreeProton => self.engine.three_proton(&event, m)?,
                    TransitionCase::TwoProtonOnePion => {
                        self.engine.two_proton_one_pion(&event, m)?
                    }
                    TransitionCase::ThreeProtonOnePion => {
                        self.engine.three_proton_one_pion(&event, m)?
                    }
                };

                for removal in &removals {
                    self.append_pseudo_event(store, &event, m, removal)?;
                }
                i += 1;
            }
        }

        let sample: SignalSample = store
            .take_bucket(signal_mult)
            .into_iter()
            .map(|ev| {
                let w = ev.total_weight;
                (ev, w)
            })
            .collect();

        tracing::info!(
            signal_events = sample.len(),
            net_weight = sample.iter().map(|(_, w)| w).sum::<f64>(),
            "background subtraction finished"
        );
        Ok(sample)
    }

    fn append_pseudo_event(
        &self,
        store: &mut MultiplicityStore,
        parent: &Event,
        bucket: u32,
        removal: &Removal,
    ) -> Result<()> {
        let destination = bucket - removal.removed.len() as u32;
        if destination < self.config.signal_multiplicity() || destination >= bucket {
            return Err(Error::CombinatorialInvariant {
                event_id: parent.id,
                bucket,
                case: removal.case,
                details: format!("destination bucket {destination} out of range"),
            });
        }
        if removal.retained.len() as u32 != destination {
            return Err(Error::CombinatorialInvariant {
                event_id: parent.id,
                bucket,
                case: removal.case,
                details: format!(
                    "{} retained particles routed to bucket {destination}",
                    removal.retained.len()
                ),
            });
        }

        let detected = parent.detected.project(&removal.retained);
        let detected_uncorr = parent.detected_uncorr.project(&removal.retained);
        let weight = -removal.probability * parent.total_weight;
        let pseudo = parent.derive(detected, detected_uncorr, weight);
        store.append(destination, pseudo)
    }
}
