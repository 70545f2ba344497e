use od::cosmic::{KeplerianElements, Orbit};
use od::dynamics::OrbitalDynamics;
use od::io::FilterConfig;
use od::linalg::Vector6;
use od::od::kalman::{FilterError, KeplerianFilter, KfEstimate};
use od::od::msr::{MeasurementNoise, PositionFix};
use od::od::TrackingSimulator;
use od::propagators::Propagator;
use od::time::Unit;

#[test]
fn refines_a_perturbed_iod() {
    crate::init_logger();
    let leo = crate::leo();
    let orbit = Orbit::keplerian(7200.0, 0.02, 63.0, 40.0, 80.0, 20.0, leo.epoch, leo.frame).unwrap();
    let truth = Propagator::default(OrbitalDynamics::two_body())
        .with(orbit)
        .sample(15.0 * Unit::Second, 120)
        .unwrap();
    let noise = MeasurementNoise {
        position_km: 0.05,
        ..Default::default()
    };
    let track = TrackingSimulator::new(noise, 23)
        .position_track(&truth)
        .unwrap();

    let mut initial = KeplerianElements::from(&truth[0]);
    initial.sma_km += 8.0;
    initial.ta_deg += 0.5;
    initial.raan_deg -= 0.1;

    let cfg = FilterConfig {
        position_sigma_km: 0.05,
        ..Default::default()
    };
    let mut filter = cfg.filter(initial).unwrap();
    let residuals = filter.process_track(&track).unwrap();
    assert_eq!(residuals.len(), track.len());

    for residual in &residuals {
        assert!(residual.posterior_trace <= residual.prior_trace * (1.0 + 1e-9));
    }

    let last = truth.last().unwrap();
    let estimate = filter.estimate();
    assert_eq!(estimate.epoch(), last.epoch);
    let (pos_err, _) = estimate.state().unwrap().rss(last).unwrap();
    assert!(pos_err < 1.0, "final position error of {pos_err} km");
    assert_relative_eq!(estimate.elements.sma_km, last.sma_km(), epsilon = 1.0);

    // The postfit residuals are of the order of the noise at the end of the track
    let tail = &residuals[residuals.len() - 20..];
    let mean_postfit: f64 = tail.iter().map(|r| r.postfit_km.norm()).sum::<f64>() / 20.0;
    assert!(mean_postfit < 0.2, "{mean_postfit}");
}

#[test]
fn rejects_unordered_and_invalid_inputs() {
    let leo = crate::leo();
    let elements = KeplerianElements::from(&leo);
    let sigmas = Vector6::new(1.0, 1e-3, 1e-3, 1e-2, 1e-3, 1e-2);

    let mut filter =
        KeplerianFilter::with_position_sigma(KfEstimate::from_sigmas(elements, sigmas), 0.1, None)
            .unwrap();
    let later = PositionFix::from(&leo);
    let mut earlier = later;
    earlier.epoch = leo.epoch - 1.0 * Unit::Minute;
    assert!(matches!(
        filter.measurement_update(&earlier),
        Err(FilterError::NotTimeOrdered { .. })
    ));
    assert!(filter.measurement_update(&later).is_ok());

    let mut hyperbolic = elements;
    hyperbolic.ecc = 1.2;
    hyperbolic.sma_km = -10_000.0;
    assert!(matches!(
        KeplerianFilter::with_position_sigma(KfEstimate::from_sigmas(hyperbolic, sigmas), 0.1, None),
        Err(FilterError::InvalidElements { .. })
    ));

    let zero = KfEstimate::from_sigmas(elements, Vector6::zeros());
    assert!(matches!(
        KeplerianFilter::with_position_sigma(zero, 0.1, None),
        Err(FilterError::NonPositiveDefiniteCovariance { .. })
    ));
}
