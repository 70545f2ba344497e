use od::cosmic::{Orbit, EARTH_J2000};
use od::dynamics::OrbitalDynamics;
use od::od::iod::herrick_gibbs_track;
use od::od::msr::{MeasurementNoise, PositionFix, Track};
use od::od::TrackingSimulator;
use od::propagators::Propagator;
use od::time::Unit;
use od::tools::herrick_gibbs::{herrick_gibbs, IodError};

fn truth() -> Vec<Orbit> {
    Propagator::default(OrbitalDynamics::two_body())
        .with(crate::leo())
        .sample(1.0 * Unit::Second, 241)
        .unwrap()
}

/// Mean velocity error of the Herrick-Gibbs states against the truth
fn mean_velocity_error(track: &Track<PositionFix>, truth: &[Orbit], window: usize) -> f64 {
    let states = herrick_gibbs_track(track, window, EARTH_J2000).unwrap();
    let total: f64 = states
        .iter()
        .map(|state| {
            let expected = truth.iter().find(|t| t.epoch == state.epoch).unwrap();
            (state.velocity() - expected.velocity()).norm()
        })
        .sum();
    total / states.len() as f64
}

#[test]
fn noisy_error_shrinks_with_window() {
    crate::init_logger();
    let truth = truth();
    let noise = MeasurementNoise {
        position_km: 0.01,
        ..Default::default()
    };
    let track = TrackingSimulator::new(noise, 11)
        .position_track(&truth)
        .unwrap();

    let narrow = mean_velocity_error(&track, &truth, 2);
    let wide = mean_velocity_error(&track, &truth, 20);
    let widest = mean_velocity_error(&track, &truth, 60);
    assert!(wide < narrow, "{wide} >= {narrow}");
    assert!(widest < wide, "{widest} >= {wide}");
}

#[test]
fn smooth_error_grows_with_window() {
    // Without noise, only the truncation error of the Taylor series remains
    let truth = truth();
    let track = Track::from_orbits(&truth).unwrap();

    let narrow = mean_velocity_error(&track, &truth, 5);
    let wide = mean_velocity_error(&track, &truth, 20);
    let widest = mean_velocity_error(&track, &truth, 60);
    assert!(narrow < wide, "{narrow} >= {wide}");
    assert!(wide < widest, "{wide} >= {widest}");
    assert!(widest < 1e-4, "{widest}");
}

#[test]
fn spacing_ratio() {
    let truth = truth();
    let at = |i: usize| (truth[i].epoch, truth[i].radius());

    let v = herrick_gibbs(at(0), at(10), at(30), EARTH_J2000.mu_km3_s2).unwrap();
    assert!((v - truth[10].velocity()).norm() < 1e-6);

    // dt32 / dt21 = 6
    assert!(matches!(
        herrick_gibbs(at(0), at(10), at(70), EARTH_J2000.mu_km3_s2),
        Err(IodError::InsufficientTimeSpacing { .. })
    ));
    // dt32 / dt21 = 0.1
    assert!(matches!(
        herrick_gibbs(at(0), at(100), at(110), EARTH_J2000.mu_km3_s2),
        Err(IodError::InsufficientTimeSpacing { .. })
    ));
}
