//! End-to-end subtraction scenarios over hand-built bucket maps.
//!
//! The fiducial stubs here are geometric: a magnitude threshold makes a
//! particle's detection rotation-invariant, a half-plane makes it depend on
//! the sampled azimuth.

use approx::assert_relative_eq;
use nalgebra::Vector3;
use qe_analysis::{
    AnalysisConfig, Classification, Classifier, Event, FiducialCut, MultiplicityStore,
    ParticleInventory, RejectReason, RunCounters, SignalCuts, StandardSelection,
    SubtractionDriver, Topology,
};
use qe_core::{FourVector, Species, Target};
use std::sync::Arc;

/// Detects everything below a momentum-magnitude threshold. Rotation
/// preserves magnitudes, so detection is the same for every sampled angle.
struct MagnitudeFiducial {
    max: f64,
}

impl FiducialCut for MagnitudeFiducial {
    fn is_fiducial(&self, _species: Species, momentum: &Vector3<f64>) -> bool {
        momentum.norm() < self.max
    }
}

/// Detects only the x > 0 half-space, so detection depends on the azimuth.
struct HalfPlaneFiducial;

impl FiducialCut for HalfPlaneFiducial {
    fn is_fiducial(&self, _species: Species, momentum: &Vector3<f64>) -> bool {
        momentum.x > 0.0
    }
}

fn wide_open_config(max_mult: u32) -> AnalysisConfig {
    let mut cfg = AnalysisConfig::new(2.261, Target::Carbon12);
    cfg.max_background_multiplicity = max_mult;
    cfg.n_rotations = 100;
    cfg.rotation_seed = 42;
    // Keep the kinematic cuts out of the way: these scenarios probe the
    // combinatorics and sign bookkeeping, not the cut surfaces.
    cfg.signal_cuts = SignalCuts { ecal_range: (0.0, 100.0), pperp_max: 100.0 };
    cfg
}

fn proton(px: f64, py: f64, pz: f64) -> FourVector {
    FourVector::from_momentum_and_mass(Vector3::new(px, py, pz), Species::Proton.mass())
}

fn pion(px: f64, py: f64, pz: f64) -> FourVector {
    FourVector::from_momentum_and_mass(Vector3::new(px, py, pz), Species::PiPlus.mass())
}

fn event_with_inventory(id: u64, inv: ParticleInventory, weight: f64) -> Event {
    Event::new(
        id,
        Target::Carbon12,
        FourVector::beam(2.261),
        FourVector::new(1.0, 0.0, 0.0, 0.9),
        inv.clone(),
        inv,
        weight,
    )
}

fn event_with_protons(id: u64, momenta: &[FourVector], weight: f64) -> Event {
    let mut inv = ParticleInventory::new();
    for &p in momenta {
        inv.push(Species::Proton, p);
    }
    Event::new(
        id,
        Target::Carbon12,
        FourVector::beam(2.261),
        // Lepton along the beam, so the q-vector points down +z and
        // azimuthal rotations act in the x-y plane.
        FourVector::new(1.0, 0.0, 0.0, 0.9),
        inv.clone(),
        inv,
        weight,
    )
}

#[test]
fn two_proton_event_with_certain_escape_subtracts_full_parent_weight() {
    // Proton A is well inside the detectable magnitude range, proton B far
    // outside: every rotation loses B and keeps A, so the one possible
    // pseudo-event carries -(100/100) x parent weight.
    let cfg = wide_open_config(2);
    let fiducial = Arc::new(MagnitudeFiducial { max: 2.0 });

    let mut store = MultiplicityStore::new();
    let parent = event_with_protons(
        1,
        &[proton(0.3, 0.2, 0.4), proton(2.0, 1.5, 1.0)],
        1.5,
    );
    store.append(2, parent).unwrap();

    let mut driver = SubtractionDriver::new(cfg, fiducial).unwrap();
    let sample = driver.run(&mut store).unwrap();

    assert_eq!(sample.len(), 1);
    let (pseudo, weight) = &sample[0];
    assert_relative_eq!(*weight, -1.5);
    assert_eq!(pseudo.detected.count(Species::Proton), 1);
    // The surviving proton is the detectable one.
    assert_relative_eq!(pseudo.detected.get(Species::Proton)[0].momentum().x, 0.3);
    assert!(pseudo.is_background);
}

#[test]
fn complementary_escape_candidates_partition_the_rotation_samples() {
    // Two back-to-back protons in the rotation plane and a half-plane
    // detector: every sampled angle detects exactly one of them, so the two
    // candidate probabilities sum to exactly 1.
    let cfg = wide_open_config(2);
    let mut store = MultiplicityStore::new();
    store
        .append(
            2,
            event_with_protons(1, &[proton(0.5, 0.0, 0.3), proton(-0.5, 0.0, 0.3)], 1.0),
        )
        .unwrap();

    let mut driver = SubtractionDriver::new(cfg, Arc::new(HalfPlaneFiducial)).unwrap();
    let sample = driver.run(&mut store).unwrap();

    assert_eq!(sample.len(), 2);
    let total: f64 = sample.iter().map(|(_, w)| w).sum();
    assert_relative_eq!(total, -1.0, epsilon = 1e-12);
    for (ev, w) in &sample {
        assert!(*w < 0.0);
        assert!(*w >= -1.0);
        assert_eq!(ev.detected.hadron_multiplicity(), 1);
    }
}

#[test]
fn three_proton_event_generates_exact_binomial_combinations() {
    // Protons 120 degrees apart in the rotation plane: every 2-of-3 and
    // 1-of-3 retention set has a non-empty angular window, so the single
    // source event yields exactly 3 two-proton and 3 one-proton
    // pseudo-events, and the two-proton ones cascade into 6 more.
    let cfg = wide_open_config(3);
    let mut store = MultiplicityStore::new();
    let r = 0.4;
    let momenta: Vec<FourVector> = (0..3)
        .map(|k| {
            let az = k as f64 * std::f64::consts::TAU / 3.0;
            proton(r * az.cos(), r * az.sin(), 0.3)
        })
        .collect();
    store.append(3, event_with_protons(1, &momenta, 1.0)).unwrap();

    let mut driver = SubtractionDriver::new(cfg, Arc::new(HalfPlaneFiducial)).unwrap();
    let sample = driver.run(&mut store).unwrap();

    // Two-proton pseudo-events stay visible in their bucket after the run.
    assert_eq!(store.bucket_len(2), 3);
    for ev in store.bucket(2) {
        assert_eq!(ev.detected.hadron_multiplicity(), 2);
        assert!(ev.total_weight < 0.0);
    }

    let negatives: Vec<f64> =
        sample.iter().map(|(_, w)| *w).filter(|w| *w < 0.0).collect();
    let positives: Vec<f64> =
        sample.iter().map(|(_, w)| *w).filter(|w| *w > 0.0).collect();

    // 3 direct 3p -> 1p subtractions, 6 cascaded re-additions through the
    // two-proton bucket.
    assert_eq!(negatives.len(), 3);
    assert_eq!(positives.len(), 6);
    for (ev, _) in &sample {
        assert_eq!(ev.detected.hadron_multiplicity(), 1);
    }
    for w in negatives.iter().chain(positives.iter()) {
        assert!(w.abs() <= 1.0 + 1e-12);
    }
}

#[test]
fn two_proton_one_pion_event_cascades_through_mixed_buckets() {
    // Two protons at 0 and 120 degrees, a pion at 240, all in the rotation
    // plane: every retention set has a non-empty angular window in the
    // half-plane detector. Bucket 3 feeds one 2p and two 1p1pi pseudo-events
    // into bucket 2, and those cascade into 4 positive one-proton entries on
    // top of the 2 direct negative ones.
    let cfg = wide_open_config(3);
    let mut store = MultiplicityStore::new();
    let r = 0.4;
    let third = std::f64::consts::TAU / 3.0;
    let mut inv = ParticleInventory::new();
    inv.push(Species::Proton, proton(r, 0.0, 0.3));
    inv.push(Species::Proton, proton(r * third.cos(), r * third.sin(), 0.3));
    inv.push(
        Species::PiPlus,
        pion(r * (2.0 * third).cos(), r * (2.0 * third).sin(), 0.3),
    );
    store.append(3, event_with_inventory(1, inv, 1.0)).unwrap();

    let mut driver = SubtractionDriver::new(cfg, Arc::new(HalfPlaneFiducial)).unwrap();
    let sample = driver.run(&mut store).unwrap();

    // The direct reductions sit in bucket 2: one 2p0pi and two 1p1pi, all
    // with negative weight.
    assert_eq!(store.bucket_len(2), 3);
    let two_proton = store
        .bucket(2)
        .iter()
        .filter(|e| e.detected.count(Species::Proton) == 2)
        .count();
    let one_proton_one_pion = store
        .bucket(2)
        .iter()
        .filter(|e| {
            e.detected.count(Species::Proton) == 1 && e.detected.count(Species::PiPlus) == 1
        })
        .count();
    assert_eq!(two_proton, 1);
    assert_eq!(one_proton_one_pion, 2);
    for ev in store.bucket(2) {
        assert!(ev.total_weight < 0.0);
    }

    let negatives = sample.iter().filter(|(_, w)| *w < 0.0).count();
    let positives = sample.iter().filter(|(_, w)| *w > 0.0).count();
    assert_eq!(negatives, 2);
    assert_eq!(positives, 4);
    for (ev, w) in &sample {
        assert_eq!(ev.detected.count(Species::Proton), 1);
        assert_eq!(ev.detected.count(Species::PiPlus), 0);
        assert!(w.abs() <= 1.0 + 1e-12);
    }
}

#[test]
fn inventories_without_a_transition_path_are_dropped_at_classification() {
    // 1p2pi sits inside the multiplicity bounds, but no routine can degrade
    // it: it must fall out of the run at classification, not abort the
    // driver.
    let mut cfg = wide_open_config(3);
    cfg.apply_momentum_cut = false;
    cfg.apply_q2_cut = false;
    cfg.apply_w_cut = false;

    let mut inv = ParticleInventory::new();
    inv.push(Species::Proton, proton(0.3, 0.0, 0.4));
    inv.push(Species::PiPlus, pion(0.1, 0.2, 0.3));
    inv.push(Species::PiPlus, pion(-0.1, 0.2, 0.3));

    let fiducial = Arc::new(MagnitudeFiducial { max: 5.0 });
    let classifier =
        Classifier::new(cfg.clone(), Box::new(StandardSelection), fiducial.clone()).unwrap();
    let mut store = MultiplicityStore::new();
    let mut counters = RunCounters::default();
    let outcome = classifier
        .classify_into(event_with_inventory(1, inv, 1.0), &mut store, &mut counters)
        .unwrap();

    assert_eq!(outcome, Classification::Rejected(RejectReason::IncompatibleTopology));
    assert_eq!(store.bucket_len(3), 0);

    let mut driver = SubtractionDriver::new(cfg, fiducial).unwrap();
    assert!(driver.run(&mut store).is_ok());
}

#[test]
fn subtraction_is_deterministic_for_a_fixed_seed() {
    let run = || {
        let cfg = wide_open_config(3);
        let mut store = MultiplicityStore::new();
        let momenta =
            [proton(0.4, 0.0, 0.3), proton(-0.2, 0.35, 0.3), proton(-0.2, -0.35, 0.3)];
        store.append(3, event_with_protons(1, &momenta, 0.8)).unwrap();
        store
            .append(2, event_with_protons(2, &[proton(0.5, 0.1, 0.3), proton(-0.5, 0.2, 0.3)], 1.2))
            .unwrap();

        let mut driver = SubtractionDriver::new(cfg, Arc::new(HalfPlaneFiducial)).unwrap();
        driver
            .run(&mut store)
            .unwrap()
            .into_iter()
            .map(|(_, w)| w)
            .collect::<Vec<f64>>()
    };

    let first = run();
    let second = run();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn second_subtraction_pass_is_rejected() {
    let cfg = wide_open_config(2);
    let mut store = MultiplicityStore::new();
    store
        .append(2, event_with_protons(1, &[proton(0.3, 0.2, 0.4), proton(2.0, 1.5, 1.0)], 1.0))
        .unwrap();

    let mut driver = SubtractionDriver::new(cfg, Arc::new(MagnitudeFiducial { max: 2.0 })).unwrap();
    driver.run(&mut store).unwrap();
    assert!(driver.run(&mut store).is_err());
}

#[test]
fn empty_intermediate_buckets_are_skipped() {
    // Signal events only: the walk finds no background and hands the signal
    // bucket through unchanged.
    let cfg = wide_open_config(3);
    let mut store = MultiplicityStore::new();
    store.append(1, event_with_protons(1, &[proton(0.4, 0.1, 0.5)], 0.7)).unwrap();

    let mut driver = SubtractionDriver::new(cfg, Arc::new(HalfPlaneFiducial)).unwrap();
    let sample = driver.run(&mut store).unwrap();
    assert_eq!(sample.len(), 1);
    assert_relative_eq!(sample[0].1, 0.7);
}

#[test]
fn driver_requires_the_one_proton_topology() {
    let mut cfg = wide_open_config(3);
    cfg.topology = Topology::new([(Species::Proton, 2)]).unwrap();
    assert!(SubtractionDriver::new(cfg, Arc::new(HalfPlaneFiducial)).is_err());
}
