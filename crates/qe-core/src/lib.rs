//! # qe-core
//!
//! Core types for the qesub electron-scattering analysis workspace.
//!
//! This crate provides:
//! - The shared [`Error`]/[`Result`] types.
//! - Particle [`Species`] and nuclear [`Target`] identifiers.
//! - The immutable [`FourVector`] value type.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{FourVector, Species, Target};
