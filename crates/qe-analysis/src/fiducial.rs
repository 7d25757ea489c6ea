//! Fiducial-volume and acceptance seam.
//!
//! Detector geometry is an external collaborator: the core only asks whether
//! a particle direction lands in an instrumented region and what acceptance
//! weight it carries. Tests substitute simple geometric stubs.

use nalgebra::Vector3;
use qe_core::Species;

/// Fiducial-volume and acceptance lookups for one detector configuration.
pub trait FiducialCut: Send + Sync {
    /// Whether a particle with this momentum would land in an instrumented
    /// region of the detector.
    fn is_fiducial(&self, species: Species, momentum: &Vector3<f64>) -> bool;

    /// Acceptance weight for a detected particle. Defaults to 1.
    fn acceptance_weight(&self, _species: Species, _momentum: &Vector3<f64>) -> f64 {
        1.0
    }
}

/// Trivial fiducial cut accepting every direction. Useful when acceptance is
/// handled entirely upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl FiducialCut for AcceptAll {
    fn is_fiducial(&self, _species: Species, _momentum: &Vector3<f64>) -> bool {
        true
    }
}
