use od::cosmic::{Orbit, EARTH_J2000};
use od::dynamics::OrbitalDynamics;
use od::linalg::Vector6;
use od::mc::{disperse, GaussianGenerator};
use od::od::blse::{
    BatchEnsemble, BatchError, BatchLeastSquares, BatchSolver, BatchStatus, EnsembleSummary,
};
use od::od::msr::{MeasurementNoise, PositionFix, Track, TrackingArc};
use od::od::{GroundStation, TrackingSimulator};
use od::propagators::Propagator;
use od::time::Unit;
use rstest::*;

#[fixture]
fn truth() -> Orbit {
    crate::leo()
}

fn stations(truth: &Orbit) -> Vec<GroundStation> {
    [(0.0, 0.0), (35.0, 40.0), (-20.0, 100.0), (50.0, -60.0)]
        .iter()
        .enumerate()
        .map(|(i, (lat, long))| {
            GroundStation::from_point(&format!("gs{i}"), *lat, *long, 0.0, EARTH_J2000, truth.epoch)
        })
        .collect()
}

/// Twenty minutes of range and Doppler from every station
fn range_doppler_arc(truth: &Orbit) -> TrackingArc {
    let states = Propagator::default(OrbitalDynamics::two_body())
        .with(*truth)
        .sample(60.0 * Unit::Second, 21)
        .unwrap();
    TrackingSimulator::new(MeasurementNoise::default(), 31)
        .range_doppler_arc(stations(truth), &states)
        .unwrap()
}

#[rstest]
#[case::normal_equations(BatchSolver::NormalEquations)]
#[case::levenberg_marquardt(BatchSolver::LevenbergMarquardt)]
fn ensemble_converges_near_candidates(truth: Orbit, #[case] solver: BatchSolver) {
    crate::init_logger();
    let prop = Propagator::default(OrbitalDynamics::two_body());
    let arc = range_doppler_arc(&truth);

    let generator = GaussianGenerator::from_position_velocity_1σ(truth, 15.0, 0.015).unwrap();
    let mut candidates: Vec<Orbit> = disperse(&generator, 6, 1234)
        .into_iter()
        .filter(|c| (c.radius() - truth.radius()).norm() < 50.0)
        .collect();
    let near = candidates.len();
    assert!(near > 0);
    // Radial infall through the center of the Earth within the arc
    candidates.push(Orbit::cartesian(
        7000.0, 0.0, 0.0, 0.0, 0.0, 0.0, truth.epoch, EARTH_J2000,
    ));

    let estimator = BatchLeastSquares::builder()
        .solver(solver)
        .max_iterations(15)
        .build();
    let samples = BatchEnsemble::new(&prop, estimator)
        .with_acceptance_threshold(100.0)
        .run(&arc, &candidates, Some(&truth));

    assert_eq!(samples.len(), candidates.len());
    for (i, sample) in samples.iter().enumerate() {
        assert_eq!(sample.index, i);
        assert_eq!(sample.initial_guess, candidates[i]);
    }
    for sample in &samples[..near] {
        assert!(sample.is_converged(), "{sample}");
        assert!(sample.error_km.unwrap() < 1.0, "{sample}");
        assert!(sample.rms.unwrap() < 10.0);
    }
    let far = samples.last().unwrap();
    assert!(!far.is_converged(), "{far}");

    let summary = EnsembleSummary::from_samples(&samples);
    assert_eq!(summary.candidates, near + 1);
    assert_eq!(summary.converged, near);
    assert_eq!(summary.diverged, 1);
}

#[rstest]
fn far_candidates_are_never_accepted(truth: Orbit) {
    crate::init_logger();
    let prop = Propagator::default(OrbitalDynamics::two_body());
    let arc = range_doppler_arc(&truth);
    let threshold_km = 100.0;

    let candidates = vec![
        truth + Vector6::new(2000.0, -1500.0, 1000.0, 0.0, 0.0, 0.0),
        truth + Vector6::new(5000.0, 0.0, 0.0, 0.0, 0.5, 0.0),
        // Same position, retrograde
        truth.with_cartesian_vec(&Vector6::new(
            truth.x_km,
            truth.y_km,
            truth.z_km,
            -truth.vx_km_s,
            -truth.vy_km_s,
            -truth.vz_km_s,
        )),
    ];

    let samples = BatchEnsemble::new(&prop, BatchLeastSquares::default())
        .with_acceptance_threshold(threshold_km)
        .run(&arc, &candidates, Some(&truth));

    for sample in &samples {
        let error_km = sample.error_km.unwrap();
        if error_km >= threshold_km {
            assert!(!sample.is_converged(), "{sample}");
        }
        if sample.is_converged() {
            assert!(error_km < threshold_km, "{sample}");
        } else {
            assert!(matches!(sample.status, BatchStatus::Diverged(_)));
        }
    }
}

#[rstest]
fn acceptance_threshold_is_applied(truth: Orbit) {
    let prop = Propagator::default(OrbitalDynamics::two_body());
    let states = prop.with(truth).sample(60.0 * Unit::Second, 11).unwrap();
    let arc = TrackingArc::from_positions(
        Track::new(states.iter().map(PositionFix::from).collect()).unwrap(),
    );
    let guess = truth + Vector6::new(5.0, 5.0, -5.0, 0.0, 0.0, 0.0);
    // The truth is offset so that even the perfect fit is outside the threshold
    let offset_truth = truth + Vector6::new(2.0, 0.0, 0.0, 0.0, 0.0, 0.0);

    let samples = BatchEnsemble::new(&prop, BatchLeastSquares::default())
        .with_acceptance_threshold(1.0)
        .run(&arc, &[guess], Some(&offset_truth));
    assert!(matches!(
        samples[0].status,
        BatchStatus::Diverged(BatchError::OutsideAcceptance { threshold_km, .. }) if threshold_km == 1.0
    ));
    // Without truth, the same run converges
    let samples = BatchEnsemble::new(&prop, BatchLeastSquares::default())
        .with_acceptance_threshold(1.0)
        .run(&arc, &[guess], None);
    assert!(samples[0].is_converged());
    assert!(samples[0].error_km.is_none());
}
