use super::{tdoa_stations, tdoa_truth, tdoa_truth_states};
use od::dynamics::OrbitalDynamics;
use od::io::{IodMethod, PipelineConfig};
use od::od::msr::MeasurementNoise;
use od::od::process::{PositionPipeline, TdoaPipeline};
use od::od::TrackingSimulator;
use od::propagators::Propagator;
use od::time::Unit;
use od::OdError;
use rstest::*;

#[rstest]
#[case::lambert(IodMethod::Lambert)]
#[case::lambert_chain(IodMethod::LambertChain)]
#[case::herrick_gibbs(IodMethod::HerrickGibbs)]
fn position_pipeline(#[case] method: IodMethod) {
    crate::init_logger();
    let leo = crate::leo();
    let truth = Propagator::default(OrbitalDynamics::two_body())
        .with(leo)
        .sample(10.0 * Unit::Second, 121)
        .unwrap();
    let noise = MeasurementNoise {
        position_km: 0.05,
        ..Default::default()
    };
    let raw = TrackingSimulator::new(noise, 8)
        .position_track(&truth)
        .unwrap();

    let mut cfg = PipelineConfig::default();
    cfg.iod.method = method;
    cfg.iod.herrick_gibbs_window = 5;
    cfg.filter.position_sigma_km = 0.05;
    let solution = PositionPipeline::new(cfg).run(raw).unwrap();

    assert_eq!(solution.smoothed.len(), solution.raw.len());
    // The filter starts at the epoch of the initial orbit
    let skipped = truth
        .iter()
        .filter(|s| s.epoch < solution.initial_orbit.epoch)
        .count();
    assert_eq!(solution.residuals.len(), truth.len() - skipped);

    let last = truth.last().unwrap();
    let (pos_err, _) = solution.estimate.state().unwrap().rss(last).unwrap();
    assert!(pos_err < 1.0, "{method:?}: final position error of {pos_err} km");
    assert_relative_eq!(solution.elements().sma_km, leo.sma_km(), epsilon = 2.0);

    assert_eq!(solution.trajectory.len(), cfg.sample_count);
    assert_eq!(solution.trajectory[0].epoch, last.epoch);
    let norms = solution.norms();
    assert_relative_eq!(
        (norms[1].0 - norms[0].0).to_seconds(),
        cfg.sample_step_s,
        epsilon = 1e-6
    );
    for (_, rmag_km, vmag_km_s) in norms {
        assert!((rmag_km - leo.rmag_km()).abs() < 50.0);
        assert!((vmag_km_s - leo.vmag_km_s()).abs() < 0.1);
    }
}

#[test]
fn position_pipeline_rejects_short_tracks() {
    let truth = Propagator::default(OrbitalDynamics::two_body())
        .with(crate::leo())
        .sample(10.0 * Unit::Second, 7)
        .unwrap();
    let raw = TrackingSimulator::new(MeasurementNoise::default(), 0)
        .position_track(&truth)
        .unwrap();
    assert!(matches!(
        PositionPipeline::default().run(raw),
        Err(OdError::Smoothing { .. })
    ));
}

#[test]
fn tdoa_pipeline() {
    crate::init_logger();
    let truth_states = tdoa_truth_states();
    let noise = MeasurementNoise {
        timing_s: 1e-9,
        ..Default::default()
    };
    let arc = TrackingSimulator::new(noise, 17)
        .tdoa_arc(tdoa_stations(), &truth_states)
        .unwrap();

    let mut cfg = PipelineConfig::default();
    cfg.tdoa.herrick_gibbs_window = 3;
    cfg.batch.candidates = 4;
    cfg.batch.position_sigma_km = 10.0;
    cfg.batch.velocity_sigma_km_s = 0.01;
    cfg.batch.seed = 99;
    cfg.batch.noise.timing_s = 1e-9;
    cfg.batch.max_iterations = 15;

    let truth = tdoa_truth();
    let solution = TdoaPipeline::new(cfg).run(&arc, Some(&truth)).unwrap();

    assert_eq!(solution.multilaterations.len(), truth_states.len());
    assert_eq!(solution.track.len(), truth_states.len());
    assert_eq!(solution.herrick_gibbs.len(), truth_states.len() - 6);
    assert_eq!(solution.herrick_gibbs[0].epoch, truth_states[3].epoch);

    let errors = solution.herrick_gibbs_errors.as_ref().unwrap();
    assert_eq!(errors.len(), solution.herrick_gibbs.len());
    for error in errors {
        assert!(error.fixed_rows::<3>(0).norm() < 1.0);
        assert!(error.fixed_rows::<3>(3).norm() < 0.05);
    }

    assert_eq!(solution.candidates.len(), 4);
    assert_eq!(solution.samples.len(), 4);
    assert_eq!(solution.summary.candidates, 4);
    assert!(solution.summary.converged >= 1, "{}", solution.summary);
    let best = solution.best().unwrap();
    assert!(best.error_km.unwrap() < cfg.batch.acceptance_threshold_km);
    assert!(best.error_km.unwrap() < 1.0, "{best}");
}
