//! # qe-kinematics
//!
//! Pure, stateless kinematic formulas over [`qe_core`] types: calorimetric
//! energy, momentum transfer, Q², W, Bjorken x and the transverse-imbalance
//! family. All quantities are in GeV and the beam is taken along +z.
//!
//! Every function here is deterministic and allocation-free so the rotation
//! engine can call them inside its hot loop.

#![warn(missing_docs)]
#![warn(clippy::all)]

use nalgebra::Vector3;
use qe_core::{FourVector, Species, Target};

/// Reconstructed calorimetric energy: outgoing-lepton energy plus the energy
/// of each visible hadron. Protons enter through their kinetic energy plus
/// the nuclear binding energy of the struck nucleon (their rest mass is part
/// of the target, not of the energy transfer); pions and photons enter with
/// their full energy.
pub fn calorimetric_energy<'a, I>(out_lepton_energy: f64, hadrons: I, target: Target) -> f64
where
    I: IntoIterator<Item = (Species, &'a FourVector)>,
{
    let mut ecal = out_lepton_energy;
    for (species, p4) in hadrons {
        ecal += p4.energy();
        if species == Species::Proton {
            ecal += target.binding_energy() - Species::Proton.mass();
        }
    }
    ecal
}

/// Momentum-transfer 3-vector `q = p_beam - p_lepton` (the azimuthal rotation
/// axis of the background subtraction).
pub fn momentum_transfer(out_lepton: &FourVector, beam_energy: f64) -> Vector3<f64> {
    (FourVector::beam(beam_energy) - *out_lepton).momentum()
}

/// Energy transfer `nu = E_beam - E_lepton`.
pub fn energy_transfer(out_lepton: &FourVector, beam_energy: f64) -> f64 {
    beam_energy - out_lepton.energy()
}

/// Four-momentum transfer squared, `Q^2 = -(k - k')^2`.
pub fn reco_q2(out_lepton: &FourVector, beam_energy: f64) -> f64 {
    -(*out_lepton - FourVector::beam(beam_energy)).mag2()
}

/// Hadronic invariant mass `W` assuming scattering off a proton at rest.
/// Returns 0 when `W^2` is negative.
pub fn reco_w(out_lepton: &FourVector, beam_energy: f64) -> f64 {
    let nu = energy_transfer(out_lepton, beam_energy);
    let q3 = momentum_transfer(out_lepton, beam_energy);
    let w2 = (Species::Proton.mass() + nu).powi(2) - q3.norm_squared();
    if w2 < 0.0 {
        return 0.0;
    }
    w2.sqrt()
}

/// Bjorken scaling variable `x = Q^2 / (2 M nu)`.
pub fn reco_x_bjorken(out_lepton: &FourVector, beam_energy: f64) -> f64 {
    let nu = energy_transfer(out_lepton, beam_energy);
    let q2 = reco_q2(out_lepton, beam_energy);
    q2 / (2.0 * Species::Proton.mass() * nu)
}

/// Quasi-elastic beam-energy estimator from the scattered-lepton kinematics
/// alone.
pub fn qel_reco_beam_energy(out_lepton: &FourVector, target: Target) -> f64 {
    let e = out_lepton.energy();
    let p = out_lepton.rho();
    let cos_theta = out_lepton.theta().cos();
    let be = target.binding_energy();
    let mp = Species::Proton.mass();
    let mn = Species::Neutron.mass();
    let me = Species::Electron.mass();

    let num = mp * mp - me * me + 2.0 * e * (mn - be) - (mn - be).powi(2);
    num / ((mn - be) - e + p * cos_theta) / 2.0
}

/// Projection of `p` onto the plane transverse to the beam axis.
pub fn transverse(p: Vector3<f64>) -> Vector3<f64> {
    Vector3::new(p.x, p.y, 0.0)
}

/// Missing transverse momentum `delta p_T`: vector sum of the lepton and
/// total-hadron transverse momenta.
pub fn missing_transverse_momentum<'a, I>(out_lepton: &FourVector, hadrons: I) -> Vector3<f64>
where
    I: IntoIterator<Item = &'a FourVector>,
{
    let total: FourVector = hadrons.into_iter().copied().sum();
    transverse(out_lepton.momentum()) + transverse(total.momentum())
}

/// Transverse boosting angle `delta alpha_T` in degrees.
pub fn delta_alpha_t<'a, I>(out_lepton: &FourVector, hadrons: I) -> f64
where
    I: IntoIterator<Item = &'a FourVector>,
{
    let lt = transverse(out_lepton.momentum()).normalize();
    let dpt = missing_transverse_momentum(out_lepton, hadrons).normalize();
    (-lt.dot(&dpt)).acos().to_degrees()
}

/// Transverse opening angle `delta phi_T` in degrees.
pub fn delta_phi_t<'a, I>(out_lepton: &FourVector, hadrons: I) -> f64
where
    I: IntoIterator<Item = &'a FourVector>,
{
    let total: FourVector = hadrons.into_iter().copied().sum();
    let lt = transverse(out_lepton.momentum()).normalize();
    let ht = transverse(total.momentum()).normalize();
    (-lt.dot(&ht)).acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn proton(px: f64, py: f64, pz: f64) -> FourVector {
        FourVector::from_momentum_and_mass(Vector3::new(px, py, pz), Species::Proton.mass())
    }

    #[test]
    fn test_ecal_proton_binding_correction() {
        let p = proton(0.0, 0.0, 0.5);
        let ecal = calorimetric_energy(1.0, [(Species::Proton, &p)], Target::Carbon12);
        let expected =
            1.0 + p.energy() + Target::Carbon12.binding_energy() - Species::Proton.mass();
        assert_relative_eq!(ecal, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_ecal_pion_enters_with_full_energy() {
        let pi =
            FourVector::from_momentum_and_mass(Vector3::new(0.1, 0.0, 0.3), Species::PiPlus.mass());
        let ecal = calorimetric_energy(1.0, [(Species::PiPlus, &pi)], Target::Carbon12);
        assert_relative_eq!(ecal, 1.0 + pi.energy(), epsilon = 1e-12);
    }

    #[test]
    fn test_momentum_transfer_is_beam_minus_lepton() {
        let lepton = FourVector::new(0.8, 0.1, -0.2, 0.7);
        let q3 = momentum_transfer(&lepton, 2.261);
        assert_relative_eq!(q3.x, -0.1);
        assert_relative_eq!(q3.y, 0.2);
        assert_relative_eq!(q3.z, 2.261 - 0.7);
    }

    #[test]
    fn test_q2_positive_for_spacelike_transfer() {
        let lepton = FourVector::new(1.0, 0.3, 0.0, 0.9);
        assert!(reco_q2(&lepton, 2.261) > 0.0);
    }

    #[test]
    fn test_w_zero_when_w2_negative() {
        // Forward elastic-like kinematics with almost no transfer
        let lepton = FourVector::new(4.46, 0.0, 0.0, 4.46);
        let w = reco_w(&lepton, 4.461);
        assert!(w >= 0.0);
    }

    #[test]
    fn test_missing_pt_cancels_for_balanced_event() {
        let lepton = FourVector::new(1.0, 0.3, 0.1, 0.8);
        let h = proton(-0.3, -0.1, 0.5);
        let dpt = missing_transverse_momentum(&lepton, [&h]);
        assert_relative_eq!(dpt.norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_delta_phi_t_back_to_back_is_zero() {
        let lepton = FourVector::new(1.0, 0.4, 0.0, 0.8);
        let h = proton(-0.4, 0.0, 0.6);
        assert_relative_eq!(delta_phi_t(&lepton, [&h]), 0.0, epsilon = 1e-6);
    }
}
