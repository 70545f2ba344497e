mod batch;
mod config;
mod filter;
mod pipeline;
mod smoother;
mod tdoa;

use od::cosmic::{Orbit, EARTH_J2000};
use od::dynamics::OrbitalDynamics;
use od::linalg::Vector3;
use od::od::GroundStation;
use od::propagators::Propagator;
use od::time::{Epoch, Unit};

pub fn tdoa_epoch() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(2022, 9, 1)
}

/// Five receivers spread over a few hundred kilometers
pub fn tdoa_stations() -> Vec<GroundStation> {
    [
        (42.5, 0.5),
        (40.0, -3.0),
        (44.0, -2.0),
        (41.0, 4.0),
        (45.0, 3.0),
    ]
    .iter()
    .enumerate()
    .map(|(i, (lat, long))| {
        GroundStation::from_point(
            &format!("rx{i}"),
            *lat,
            *long,
            0.2,
            EARTH_J2000,
            tdoa_epoch(),
        )
    })
    .collect()
}

/// Circular orbit heading east, right above the receivers at the start of the arc
pub fn tdoa_truth() -> Orbit {
    let (lat, long) = (43.0_f64.to_radians(), 1.0_f64.to_radians());
    let r_hat = Vector3::new(lat.cos() * long.cos(), lat.cos() * long.sin(), lat.sin());
    let east = Vector3::z().cross(&r_hat).normalize();
    let radius_km = 7078.0;
    let speed_km_s = (EARTH_J2000.mu_km3_s2 / radius_km).sqrt();
    Orbit::from_vectors(
        &(radius_km * r_hat),
        &(speed_km_s * east),
        tdoa_epoch(),
        EARTH_J2000,
    )
}

/// Truth states every ten seconds over five minutes
pub fn tdoa_truth_states() -> Vec<Orbit> {
    Propagator::default(OrbitalDynamics::two_body())
        .with(tdoa_truth())
        .sample(10.0 * Unit::Second, 31)
        .unwrap()
}
