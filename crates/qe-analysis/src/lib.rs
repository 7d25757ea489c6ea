//! # qe-analysis
//!
//! Multiplicity-bucketed classification and rotation-based background
//! subtraction for electron-scattering events.
//!
//! This crate provides:
//! - The [`Event`] model and per-species [`ParticleInventory`].
//! - The [`Classifier`], which buckets events by hadron multiplicity
//!   relative to the configured signal [`Topology`].
//! - The [`RotationEngine`], which estimates per-combination migration
//!   probabilities by azimuthal rotation about the momentum-transfer axis.
//! - The [`SubtractionDriver`], which walks the buckets top-down and emits
//!   signed pseudo-events until the signal bucket is background-subtracted.
//!
//! ## Architecture
//!
//! Detector geometry enters only through the [`FiducialCut`] trait and the
//! generic selection through [`EventSelection`]; the core never performs
//! I/O and fills no histograms — it hands an ordered `(event, weight)`
//! sample to the output stage.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classifier;
pub mod config;
pub mod cuts;
pub mod event;
pub mod fiducial;
pub mod rotation;
pub mod store;
pub mod subtraction;

pub use classifier::{Classification, Classifier, RejectReason, RunCounters};
pub use config::{AnalysisConfig, SignalCuts, Topology};
pub use cuts::{EventSelection, StandardSelection};
pub use event::{Event, ParticleInventory};
pub use fiducial::{AcceptAll, FiducialCut};
pub use rotation::{Removal, RotationEngine, TransitionCase, SUPPORTED_SPECIES};
pub use store::MultiplicityStore;
pub use subtraction::{SignalSample, SubtractionDriver};
