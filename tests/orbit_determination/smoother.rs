use od::od::msr::{MeasurementNoise, PositionFix, Track};
use od::od::smoother::{Smoother, SmoothingError};
use od::od::TrackingSimulator;
use od::dynamics::OrbitalDynamics;
use od::propagators::Propagator;
use od::time::Unit;
use rstest::*;

fn rms_error(track: &Track<PositionFix>, truth: &[od::cosmic::Orbit]) -> f64 {
    let sum: f64 = track
        .iter()
        .zip(truth.iter())
        .map(|(fix, state)| (fix.position_km - state.radius()).norm_squared())
        .sum();
    (sum / track.len() as f64).sqrt()
}

#[rstest]
#[case(Smoother::new(11, 3))]
#[case(Smoother::new(21, 3))]
#[case(Smoother::builder().window(15).moving_average(3).build())]
fn smoothing_reduces_noise(#[case] smoother: Smoother) {
    crate::init_logger();
    let truth = Propagator::default(OrbitalDynamics::two_body())
        .with(crate::leo())
        .sample(10.0 * Unit::Second, 101)
        .unwrap();
    let noise = MeasurementNoise {
        position_km: 0.2,
        ..Default::default()
    };
    let raw = TrackingSimulator::new(noise, 19)
        .position_track(&truth)
        .unwrap();
    let smoothed = smoother.smooth(&raw).unwrap();

    assert_eq!(smoothed.epochs(), raw.epochs());
    let before = rms_error(&raw, &truth);
    let after = rms_error(&smoothed, &truth);
    assert!(after < 0.75 * before, "{after} km vs {before} km");
}

#[test]
fn window_validation() {
    let truth = Propagator::default(OrbitalDynamics::two_body())
        .with(crate::leo())
        .sample(10.0 * Unit::Second, 9)
        .unwrap();
    let track = Track::from_orbits(&truth).unwrap();

    assert!(matches!(
        Smoother::new(11, 3).smooth(&track),
        Err(SmoothingError::InvalidWindow { window: 11, len: 9 })
    ));
    assert!(matches!(
        Smoother::new(6, 3).smooth(&track),
        Err(SmoothingError::InvalidWindow { .. })
    ));
    assert!(matches!(
        Smoother::new(5, 4).smooth(&track),
        Err(SmoothingError::InvalidDegree { .. })
    ));

    // A cubic reproduces the noiseless track to the truncation error of the fit
    let smoothed = Smoother::new(5, 3).smooth(&track).unwrap();
    assert!(rms_error(&smoothed, &truth) < 1e-3);
}
