use od::cosmic::{AstroError, KeplerianElements, Orbit, EARTH_J2000};
use od::time::{Epoch, Unit};
use rstest::*;

#[rstest]
#[case(7000.0, 0.01, 28.5, 45.0, 120.0, 60.0)]
#[case(26_560.0, 0.7, 63.4, 270.0, 10.0, 180.0)]
#[case(42_164.0, 0.1, 5.0, 10.0, 300.0, 330.0)]
fn keplerian_cartesian_round_trip(
    #[case] sma_km: f64,
    #[case] ecc: f64,
    #[case] inc_deg: f64,
    #[case] aop_deg: f64,
    #[case] raan_deg: f64,
    #[case] ta_deg: f64,
) {
    let epoch = Epoch::from_gregorian_utc_at_midnight(2020, 1, 1);
    let orbit =
        Orbit::keplerian(sma_km, ecc, inc_deg, aop_deg, raan_deg, ta_deg, epoch, EARTH_J2000)
            .unwrap();
    assert_relative_eq!(orbit.sma_km(), sma_km, max_relative = 1e-10);
    assert_relative_eq!(orbit.ecc(), ecc, epsilon = 1e-10);
    assert_relative_eq!(orbit.inc_deg(), inc_deg, epsilon = 1e-8);
    assert_relative_eq!(orbit.aop_deg(), aop_deg, epsilon = 1e-6);
    assert_relative_eq!(orbit.raan_deg(), raan_deg, epsilon = 1e-8);
    assert_relative_eq!(orbit.ta_deg(), ta_deg, epsilon = 1e-6);

    let back = KeplerianElements::from(&orbit).to_orbit().unwrap();
    assert!((back.radius() - orbit.radius()).norm() < 1e-6);
    assert!((back.velocity() - orbit.velocity()).norm() < 1e-9);
}

#[test]
fn epoch_invariant() {
    let leo = crate::leo();
    let later = Orbit {
        epoch: leo.epoch + 1.0 * Unit::Second,
        ..leo
    };
    assert!(matches!(
        leo - later,
        Err(AstroError::EpochMismatch { .. })
    ));
    let delta = (leo - leo).unwrap();
    assert_eq!(delta.norm(), 0.0);
}
