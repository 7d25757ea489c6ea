//! Generic kinematic selection applied before topology classification.
//!
//! The thresholds are beam-energy dependent and follow the published run
//! settings for the 1.161, 2.261 and 4.461 GeV beams.

use crate::config::AnalysisConfig;
use crate::event::Event;
use qe_kinematics::{reco_q2, reco_w};

/// Minimum scattered-electron momentum (GeV) for a beam setting. Unknown
/// beam settings get no cut.
pub fn min_electron_momentum(beam_energy: f64) -> f64 {
    if (beam_energy - 1.161).abs() < 1e-6 {
        0.4
    } else if (beam_energy - 2.261).abs() < 1e-6 {
        0.55
    } else if (beam_energy - 4.461).abs() < 1e-6 {
        1.1
    } else {
        0.0
    }
}

/// Q² threshold (GeV²) for a beam-energy band, if one applies.
pub fn q2_threshold(beam_energy: f64) -> Option<f64> {
    if (1.0..2.0).contains(&beam_energy) {
        Some(0.1)
    } else if (2.0..3.0).contains(&beam_energy) {
        Some(0.4)
    } else if (4.0..5.0).contains(&beam_energy) {
        Some(0.8)
    } else {
        None
    }
}

/// Upper invariant-mass cut (GeV), applied only below 2 GeV beam energy.
pub fn w_threshold(beam_energy: f64) -> Option<f64> {
    if beam_energy < 2.0 {
        Some(2.0)
    } else {
        None
    }
}

/// Generic event-selection capability, chosen at configuration time.
///
/// Detector-specific analyses provide their own implementation; the standard
/// one applies the kinematic cuts above.
pub trait EventSelection: Send + Sync {
    /// Whether the event passes the generic selection.
    fn accept(&self, event: &Event, config: &AnalysisConfig) -> bool;
}

/// Standard selection: electron momentum, Q² and W cuts.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardSelection;

impl EventSelection for StandardSelection {
    fn accept(&self, event: &Event, config: &AnalysisConfig) -> bool {
        let beam = config.beam_energy;

        if config.apply_momentum_cut && event.out_lepton.rho() < min_electron_momentum(beam) {
            return false;
        }
        if config.apply_q2_cut {
            if let Some(q2_min) = q2_threshold(beam) {
                if reco_q2(&event.out_lepton, beam) < q2_min {
                    return false;
                }
            }
        }
        if config.apply_w_cut {
            if let Some(w_max) = w_threshold(beam) {
                if reco_w(&event.out_lepton, beam) > w_max {
                    return false;
                }
            }
        }
        true
    }
}
