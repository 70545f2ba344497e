use od::cosmic::EARTH_J2000;
use od::dynamics::OrbitalDynamics;
use od::linalg::Vector3;
use od::propagators::Propagator;
use od::time::Unit;
use od::tools::lambert::{standard, LambertError, LambertSolver, TransferKind};
use rstest::*;

#[rstest]
#[case(300.0, TransferKind::Auto)]
#[case(1200.0, TransferKind::ShortWay)]
#[case(2400.0, TransferKind::Auto)]
fn recovers_propagated_velocity(#[case] tof_s: f64, #[case] kind: TransferKind) {
    let leo = crate::leo();
    let arrival = Propagator::default(OrbitalDynamics::two_body())
        .with(leo)
        .for_duration(tof_s * Unit::Second)
        .unwrap();

    let sol = standard(
        leo.radius(),
        arrival.radius(),
        tof_s,
        EARTH_J2000.mu_km3_s2,
        kind,
    )
    .unwrap();
    assert!((sol.v_init - leo.velocity()).norm() < 1e-5, "{}", sol.v_init);
    assert!((sol.v_final - arrival.velocity()).norm() < 1e-5);
}

#[test]
fn long_way_transfer() {
    let leo = crate::leo();
    let tof_s = 3600.0;
    let arrival = Propagator::default(OrbitalDynamics::two_body())
        .with(leo)
        .for_duration(tof_s * Unit::Second)
        .unwrap();
    // Over 60% of an orbit: the transfer angle exceeds 180 degrees
    assert!(tof_s > 0.5 * leo.period().to_seconds());

    let sol = standard(
        leo.radius(),
        arrival.radius(),
        tof_s,
        EARTH_J2000.mu_km3_s2,
        TransferKind::LongWay,
    )
    .unwrap();
    assert!((sol.v_init - leo.velocity()).norm() < 1e-5);
}

#[test]
fn degenerate_geometry() {
    let r1 = Vector3::new(7000.0, 0.0, 0.0);
    assert!(matches!(
        standard(r1, 2.0 * r1, 600.0, EARTH_J2000.mu_km3_s2, TransferKind::Auto),
        Err(LambertError::DegenerateGeometry { .. })
    ));
    assert!(matches!(
        standard(r1, -r1, 600.0, EARTH_J2000.mu_km3_s2, TransferKind::Auto),
        Err(LambertError::DegenerateGeometry { .. })
    ));
    let r2 = Vector3::new(0.0, 7000.0, 0.0);
    assert!(matches!(
        standard(r1, r2, -10.0, EARTH_J2000.mu_km3_s2, TransferKind::Auto),
        Err(LambertError::DegenerateGeometry { .. })
    ));
    assert!(matches!(
        standard(Vector3::zeros(), r2, 600.0, EARTH_J2000.mu_km3_s2, TransferKind::Auto),
        Err(LambertError::TargetsTooClose)
    ));
}

#[test]
fn iteration_cap() {
    let solver = LambertSolver::builder().max_iterations(3).build();
    let r1 = Vector3::new(7000.0, 0.0, 0.0);
    let r2 = Vector3::new(0.0, 7100.0, 100.0);
    assert!(matches!(
        solver.solve(r1, r2, 1500.0, EARTH_J2000.mu_km3_s2, TransferKind::Auto),
        Err(LambertError::LambertNoConvergence { iterations: 3, .. })
    ));
}
