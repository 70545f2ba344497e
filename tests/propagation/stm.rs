use od::dynamics::gravity::J2Gravity;
use od::dynamics::OrbitalDynamics;
use od::linalg::{Matrix6, Vector6};
use od::propagators::Propagator;
use od::time::Unit;
use rstest::*;

/// Central finite differences of the flow over the provided duration
fn finite_difference_stm(dynamics: OrbitalDynamics, duration_s: f64) -> Matrix6<f64> {
    let leo = crate::leo();
    let prop = Propagator::default(dynamics);
    let mut stm = Matrix6::zeros();
    for j in 0..6 {
        let h = if j < 3 { 1e-3 } else { 1e-6 };
        let mut delta = Vector6::zeros();
        delta[j] = h;
        let plus = prop
            .with(leo + delta)
            .for_duration(duration_s * Unit::Second)
            .unwrap();
        let minus = prop
            .with(leo + (-delta))
            .for_duration(duration_s * Unit::Second)
            .unwrap();
        let column = (plus.to_cartesian_vec() - minus.to_cartesian_vec()) / (2.0 * h);
        stm.set_column(j, &column);
    }
    stm
}

#[rstest]
#[case::two_body(false)]
#[case::j2(true)]
fn stm_matches_finite_differences(#[case] with_j2: bool) {
    crate::init_logger();
    let dynamics = if with_j2 {
        OrbitalDynamics::from_model(J2Gravity::new())
    } else {
        OrbitalDynamics::two_body()
    };
    let duration_s = 1800.0;
    let leo = crate::leo();

    let end = Propagator::default(dynamics.clone())
        .with(leo.with_stm())
        .for_duration(duration_s * Unit::Second)
        .unwrap();
    let stm = end.stm.unwrap();
    let expected = finite_difference_stm(dynamics, duration_s);

    let err = (stm - expected).norm() / expected.norm();
    assert!(err < 1e-5, "relative STM error of {err:.3e}");
}

#[test]
fn stm_starts_at_identity_and_composes() {
    let leo = crate::leo().with_stm();
    let prop = Propagator::default(OrbitalDynamics::two_body());

    let mid = prop.with(leo).for_duration(600.0 * Unit::Second).unwrap();
    let phi_1 = mid.stm.unwrap();
    let end = prop
        .with(mid.with_stm())
        .for_duration(600.0 * Unit::Second)
        .unwrap();
    let phi_2 = end.stm.unwrap();

    let full = prop.with(leo).for_duration(1200.0 * Unit::Second).unwrap();
    let phi = full.stm.unwrap();
    assert!((phi - phi_2 * phi_1).norm() / phi.norm() < 1e-6);

    // Symplectic flow: the STM of a Hamiltonian system has a unit determinant
    assert_relative_eq!(phi.determinant(), 1.0, epsilon = 1e-6);
}
