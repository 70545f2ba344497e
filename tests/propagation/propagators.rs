use od::dynamics::drag::Drag;
use od::dynamics::gravity::J2Gravity;
use od::dynamics::OrbitalDynamics;
use od::propagators::{PropOpts, PropagationError, Propagator};
use od::time::Unit;
use rstest::*;

#[fixture]
fn two_body() -> OrbitalDynamics {
    OrbitalDynamics::two_body()
}

#[rstest]
fn forward_backward_round_trip(two_body: OrbitalDynamics) {
    crate::init_logger();
    let leo = crate::leo();
    let prop = Propagator::default(two_body);

    let forward = prop.with(leo).for_duration(3.0 * Unit::Hour).unwrap();
    let back = prop.with(forward).until_epoch(leo.epoch).unwrap();

    assert_eq!(back.epoch, leo.epoch);
    assert!((back.radius() - leo.radius()).norm() < 1e-5, "{back} vs {leo}");
    assert!((back.velocity() - leo.velocity()).norm() < 1e-8);
}

#[rstest]
fn two_body_conservation(two_body: OrbitalDynamics) {
    let leo = crate::leo();
    let prop = Propagator::default(two_body);
    let states = prop.with(leo).sample(10.0 * Unit::Minute, 13).unwrap();

    for state in &states {
        assert_relative_eq!(state.energy_km2_s2(), leo.energy_km2_s2(), max_relative = 1e-10);
        assert_relative_eq!(state.hmag_km2_s(), leo.hmag_km2_s(), max_relative = 1e-10);
        assert_relative_eq!(state.sma_km(), leo.sma_km(), max_relative = 1e-9);
    }
}

#[rstest]
fn rkf45_agrees_with_rkf78(two_body: OrbitalDynamics) {
    let leo = crate::leo();
    let opts = PropOpts::with_tolerances(1e-10, 1e-12);
    let rkf78 = Propagator::rkf78(two_body.clone(), opts)
        .with(leo)
        .for_duration(1.0 * Unit::Hour)
        .unwrap();
    let rkf45 = Propagator::rkf45(two_body, opts)
        .with(leo)
        .for_duration(1.0 * Unit::Hour)
        .unwrap();
    assert!((rkf78.radius() - rkf45.radius()).norm() < 1e-3);
}

#[test]
fn j2_regresses_the_node() {
    let leo = crate::leo();
    let prop = Propagator::default(OrbitalDynamics::from_model(J2Gravity::new()));
    let later = prop.with(leo).for_duration(1.0 * Unit::Day).unwrap();
    // Prograde orbits regress by several degrees per day in LEO
    let drift_deg = later.raan_deg() - leo.raan_deg();
    assert!(drift_deg < -4.0 && drift_deg > -6.0, "{drift_deg}");
    assert_relative_eq!(later.inc_deg(), leo.inc_deg(), epsilon = 0.05);
}

#[test]
fn drag_lowers_the_orbit() {
    let leo = crate::leo();
    let mut dynamics = OrbitalDynamics::two_body();
    dynamics.add_model(Drag::exponential(2.2, 20.0, 100.0));
    let later = Propagator::default(dynamics)
        .with(leo)
        .for_duration(1.0 * Unit::Day)
        .unwrap();
    assert!(later.sma_km() < leo.sma_km());
}

#[rstest]
fn step_budget_and_floor(two_body: OrbitalDynamics) {
    let leo = crate::leo();

    let budget = PropOpts::builder()
        .max_steps(5)
        .max_step(10.0 * Unit::Second)
        .error_ctrl(od::propagators::RSSCartesianStep)
        .build();
    let result = Propagator::rkf78(two_body.clone(), budget)
        .with(leo)
        .for_duration(1.0 * Unit::Hour);
    assert!(matches!(
        result,
        Err(PropagationError::StepBudgetExceeded { max_steps: 5, .. })
    ));

    let floor = PropOpts::builder()
        .min_step(30.0 * Unit::Second)
        .init_step(60.0 * Unit::Second)
        .abs_tol(1e-16)
        .rel_tol(1e-16)
        .attempts(200)
        .error_ctrl(od::propagators::RSSCartesianStep)
        .build();
    let result = Propagator::rkf45(two_body, floor)
        .with(leo)
        .for_duration(1.0 * Unit::Hour);
    match result {
        Err(e) => assert!(e.is_divergence(), "{e}"),
        Ok(state) => panic!("step floor not enforced: {state}"),
    }
}
