/*
    Orbit Determinator, orbit estimation from ground tracking data
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/


use crate::linalg::Vector3;
use crate::time::Epoch;
use snafu::prelude::*;

/// Bounds of the ratio between the two time intervals for the Herrick-Gibbs method to be valid
pub const HG_SPACING_RATIO_BOUNDS: (f64, f64) = (0.2, 5.0);
/// Above this angular separation between consecutive positions, Gibbs' method is more appropriate
const HG_MAX_SEPARATION_DEG: f64 = 5.0;
/// Above this angle out of the plane of the last two positions, the positions are not coplanar
const HG_COPLANAR_TOL_DEG: f64 = 1.0;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum IodError {
    #[snafu(display("insufficient time spacing for Herrick-Gibbs: {reason} (dt21 = {dt21_s} s, dt32 = {dt32_s} s)"))]
    InsufficientTimeSpacing {
        reason: &'static str,
        dt21_s: f64,
        dt32_s: f64,
    },
    #[snafu(display("{method} requires at least {need} samples but the track has {len}"))]
    TrackTooShort {
        method: &'static str,
        need: usize,
        len: usize,
    },
    #[snafu(display("sample {index} is out of a track of {len} samples"))]
    SampleIndex { index: usize, len: usize },
    #[snafu(display("Lambert initial orbit determination failed: {source}"))]
    TrackLambert {
        source: crate::tools::lambert::LambertError,
    },
}

/// Herrick-Gibbs initial orbit determination: returns the velocity (km/s) at the middle epoch from three closely spaced positions (km).
///
/// Source: Vallado, algorithm 55. The epochs must be strictly increasing and the ratio between both time intervals must be within
/// [0.2; 5]. Non coplanar positions and large angular separations only trigger a warning as the estimate degrades gracefully.
pub fn herrick_gibbs(
    (t1, r1): (Epoch, Vector3<f64>),
    (t2, r2): (Epoch, Vector3<f64>),
    (t3, r3): (Epoch, Vector3<f64>),
    mu_km3_s2: f64,
) -> Result<Vector3<f64>, IodError> {
    let dt21 = (t2 - t1).to_seconds();
    let dt32 = (t3 - t2).to_seconds();
    let dt31 = (t3 - t1).to_seconds();

    ensure!(
        dt21 > 0.0 && dt32 > 0.0,
        InsufficientTimeSpacingSnafu {
            reason: "epochs must be strictly increasing",
            dt21_s: dt21,
            dt32_s: dt32,
        }
    );

    let ratio = dt32 / dt21;
    ensure!(
        (HG_SPACING_RATIO_BOUNDS.0..=HG_SPACING_RATIO_BOUNDS.1).contains(&ratio),
        InsufficientTimeSpacingSnafu {
            reason: "ratio of the time intervals is outside of [0.2; 5]",
            dt21_s: dt21,
            dt32_s: dt32,
        }
    );

    let (r1_norm, r2_norm, r3_norm) = (r1.norm(), r2.norm(), r3.norm());

    let z23 = r2.cross(&r3);
    if z23.norm() > f64::EPSILON {
        let alpha_cop_deg = 90.0 - (z23.dot(&r1) / (z23.norm() * r1_norm)).clamp(-1.0, 1.0).acos().to_degrees();
        if alpha_cop_deg.abs() > HG_COPLANAR_TOL_DEG {
            warn!("Herrick-Gibbs positions are not coplanar ({alpha_cop_deg:.3} deg out of plane)");
        }
    }

    let alpha_12_deg = (r1.dot(&r2) / (r1_norm * r2_norm)).clamp(-1.0, 1.0).acos().to_degrees();
    let alpha_23_deg = (r2.dot(&r3) / (r2_norm * r3_norm)).clamp(-1.0, 1.0).acos().to_degrees();
    if alpha_12_deg > HG_MAX_SEPARATION_DEG || alpha_23_deg > HG_MAX_SEPARATION_DEG {
        warn!(
            "Herrick-Gibbs angular separations of {alpha_12_deg:.3} and {alpha_23_deg:.3} deg exceed {HG_MAX_SEPARATION_DEG} deg, Gibbs' method would be more accurate"
        );
    }

    let term = |r_norm: f64| mu_km3_s2 / (12.0 * r_norm.powi(3));

    Ok(-dt32 * (1.0 / (dt21 * dt31) + term(r1_norm)) * r1
        + (dt32 - dt21) * (1.0 / (dt21 * dt32) + term(r2_norm)) * r2
        + dt21 * (1.0 / (dt32 * dt31) + term(r3_norm)) * r3)
}

#[cfg(test)]
mod ut_herrick_gibbs {
    use super::*;
    use crate::time::Unit;

    const MU: f64 = 398_600.4415;

    fn circular(t_s: f64) -> (Vector3<f64>, Vector3<f64>) {
        let radius: f64 = 7000.0;
        let n = (MU / radius.powi(3)).sqrt();
        let (s, c) = (n * t_s).sin_cos();
        (
            Vector3::new(radius * c, radius * s, 0.0),
            Vector3::new(-radius * n * s, radius * n * c, 0.0),
        )
    }

    #[test]
    fn circular_orbit_velocity() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2022, 6, 1);
        let samples: Vec<(Epoch, Vector3<f64>)> = [-30.0, 0.0, 45.0]
            .iter()
            .map(|t| (t0 + *t * Unit::Second, circular(*t).0))
            .collect();
        let v2 = herrick_gibbs(samples[0], samples[1], samples[2], MU).unwrap();
        assert!((v2 - circular(0.0).1).norm() < 1e-5, "{v2}");
    }

    #[test]
    fn spacing_validation() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2022, 6, 1);
        let at = |t: f64| (t0 + t * Unit::Second, circular(t).0);

        assert!(matches!(
            herrick_gibbs(at(0.0), at(0.0), at(10.0), MU),
            Err(IodError::InsufficientTimeSpacing { .. })
        ));
        assert!(matches!(
            herrick_gibbs(at(10.0), at(0.0), at(20.0), MU),
            Err(IodError::InsufficientTimeSpacing { .. })
        ));
        // Ratio of 6
        assert!(matches!(
            herrick_gibbs(at(0.0), at(10.0), at(70.0), MU),
            Err(IodError::InsufficientTimeSpacing { .. })
        ));
        // Ratio of 5 is still valid
        assert!(herrick_gibbs(at(0.0), at(10.0), at(60.0), MU).is_ok());
    }
}
