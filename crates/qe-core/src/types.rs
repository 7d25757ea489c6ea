//! Common data types for qesub
//!
//! Final-state species, nuclear targets and the immutable [`FourVector`]
//! value type shared by every crate in the workspace.

use nalgebra::{Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

/// Final-state particle species relevant to the analysis.
///
/// The variants carry PDG-style codes through [`Species::pdg`] but the rest
/// of the workspace dispatches on the enum, never on raw codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Species {
    /// Scattered electron (the outgoing lepton)
    Electron,
    /// Proton
    Proton,
    /// Neutron
    Neutron,
    /// Positively charged pion
    PiPlus,
    /// Negatively charged pion
    PiMinus,
    /// Neutral pion
    Pi0,
    /// Photon
    Photon,
}

impl Species {
    /// PDG code for this species.
    pub fn pdg(&self) -> i32 {
        match self {
            Species::Electron => 11,
            Species::Proton => 2212,
            Species::Neutron => 2112,
            Species::PiPlus => 211,
            Species::PiMinus => -211,
            Species::Pi0 => 111,
            Species::Photon => 22,
        }
    }

    /// Species for a PDG code, if supported.
    pub fn from_pdg(pdg: i32) -> Option<Self> {
        match pdg {
            11 => Some(Species::Electron),
            2212 => Some(Species::Proton),
            2112 => Some(Species::Neutron),
            211 => Some(Species::PiPlus),
            -211 => Some(Species::PiMinus),
            111 => Some(Species::Pi0),
            22 => Some(Species::Photon),
            _ => None,
        }
    }

    /// Rest mass in GeV.
    pub fn mass(&self) -> f64 {
        match self {
            Species::Electron => 0.000_510_999,
            Species::Proton => 0.938_272,
            Species::Neutron => 0.939_565,
            Species::PiPlus | Species::PiMinus => 0.139_570,
            Species::Pi0 => 0.134_977,
            Species::Photon => 0.0,
        }
    }

    /// Electric charge in units of e.
    pub fn charge(&self) -> i8 {
        match self {
            Species::Electron => -1,
            Species::Proton | Species::PiPlus => 1,
            Species::PiMinus => -1,
            Species::Neutron | Species::Pi0 | Species::Photon => 0,
        }
    }

    /// Whether this species is counted in the hadronic multiplicity.
    ///
    /// The scattered lepton is excluded; photons are counted because the
    /// detector cannot distinguish them from neutral-pion decay products at
    /// this stage.
    pub fn is_hadronic(&self) -> bool {
        !matches!(self, Species::Electron)
    }
}

/// Nuclear target species, identified by PDG ion codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Target {
    /// Free proton target (hydrogen)
    Hydrogen,
    /// Helium-4
    Helium4,
    /// Carbon-12
    Carbon12,
    /// Iron-56
    Iron56,
}

impl Target {
    /// PDG ion code (10LZZZAAAI scheme).
    pub fn pdg(&self) -> u32 {
        match self {
            Target::Hydrogen => 1_000_010_010,
            Target::Helium4 => 1_000_020_040,
            Target::Carbon12 => 1_000_060_120,
            Target::Iron56 => 1_000_260_560,
        }
    }

    /// Target for a PDG ion code, if supported.
    pub fn from_pdg(pdg: u32) -> Option<Self> {
        match pdg {
            1_000_010_010 => Some(Target::Hydrogen),
            1_000_020_040 => Some(Target::Helium4),
            1_000_060_120 => Some(Target::Carbon12),
            1_000_260_560 => Some(Target::Iron56),
            _ => None,
        }
    }

    /// Average nucleon binding energy in GeV, used by the calorimetric
    /// energy correction for protons.
    pub fn binding_energy(&self) -> f64 {
        match self {
            Target::Hydrogen => 0.0,
            Target::Helium4 => 0.0203,
            Target::Carbon12 => 0.0925,
            Target::Iron56 => 0.0105,
        }
    }
}

/// Energy + 3-momentum four-vector, in GeV.
///
/// Immutable once produced from detector reconstruction: boosting or rotating
/// returns a new instance, so combinatorial branches sharing a parent vector
/// can never corrupt each other's history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FourVector {
    e: f64,
    p: Vector3<f64>,
}

impl FourVector {
    /// Build from energy and 3-momentum components.
    pub fn new(e: f64, px: f64, py: f64, pz: f64) -> Self {
        Self { e, p: Vector3::new(px, py, pz) }
    }

    /// Build from a 3-momentum and a rest mass (energy from the mass-shell
    /// relation).
    pub fn from_momentum_and_mass(p: Vector3<f64>, mass: f64) -> Self {
        Self { e: (p.norm_squared() + mass * mass).sqrt(), p }
    }

    /// Beam four-vector: energy `e` along +z, massless.
    pub fn beam(e: f64) -> Self {
        Self::new(e, 0.0, 0.0, e)
    }

    /// Energy component.
    pub fn energy(&self) -> f64 {
        self.e
    }

    /// 3-momentum.
    pub fn momentum(&self) -> Vector3<f64> {
        self.p
    }

    /// Magnitude of the 3-momentum.
    pub fn rho(&self) -> f64 {
        self.p.norm()
    }

    /// Polar angle w.r.t. the beam (+z) axis, in radians.
    pub fn theta(&self) -> f64 {
        if self.p.norm() == 0.0 {
            return 0.0;
        }
        (self.p.z / self.p.norm()).acos()
    }

    /// Azimuthal angle in radians, in `(-pi, pi]`.
    pub fn phi(&self) -> f64 {
        self.p.y.atan2(self.p.x)
    }

    /// Invariant mass squared, `E^2 - |p|^2`.
    pub fn mag2(&self) -> f64 {
        self.e * self.e - self.p.norm_squared()
    }

    /// New four-vector with the 3-momentum rotated by `angle` radians about
    /// `axis`. The energy is unchanged.
    pub fn rotated_about(&self, axis: &Unit<Vector3<f64>>, angle: f64) -> Self {
        let rot = Rotation3::from_axis_angle(axis, angle);
        Self { e: self.e, p: rot * self.p }
    }
}

impl std::ops::Add for FourVector {
    type Output = FourVector;

    fn add(self, rhs: FourVector) -> FourVector {
        FourVector { e: self.e + rhs.e, p: self.p + rhs.p }
    }
}

impl std::ops::Sub for FourVector {
    type Output = FourVector;

    fn sub(self, rhs: FourVector) -> FourVector {
        FourVector { e: self.e - rhs.e, p: self.p - rhs.p }
    }
}

impl std::iter::Sum for FourVector {
    fn sum<I: Iterator<Item = FourVector>>(iter: I) -> FourVector {
        iter.fold(FourVector::new(0.0, 0.0, 0.0, 0.0), |acc, v| acc + v)
    }
}
