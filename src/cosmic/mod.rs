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

use crate::time::Epoch;
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use std::fmt;

mod elements;
pub use elements::*;
mod orbit;
pub use orbit::*;

/// Speed of light in kilometers per second
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// A trait allowing for something to have an epoch
pub trait TimeTagged {
    /// Retrieve the Epoch
    fn epoch(&self) -> Epoch;
    /// Set the Epoch
    fn set_epoch(&mut self, epoch: Epoch);
}

/// The central body of an orbit along with the constants needed by the dynamics and the station models.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Name of this frame, only used for display
    #[serde(skip, default = "default_frame_name")]
    pub name: &'static str,
    /// Gravitational parameter in km^3/s^2
    pub mu_km3_s2: f64,
    /// Equatorial radius in km
    pub equatorial_radius_km: f64,
    /// Flattening of the reference ellipsoid (no unit)
    pub flattening: f64,
    /// Unnormalized J2 zonal harmonic (no unit)
    pub j2: f64,
    /// Rotation rate of the body about its Z axis, in rad/s
    pub angular_velocity_rad_s: f64,
}

fn default_frame_name() -> &'static str {
    "custom"
}

/// Earth centered inertial frame with the WGS-84 constants and EGM-96 J2.
pub const EARTH_J2000: Frame = Frame {
    name: "Earth J2000",
    mu_km3_s2: 398_600.4415,
    equatorial_radius_km: 6378.1363,
    flattening: 0.003_352_810_664_747_5,
    j2: 1.082_626_925_638_815e-3,
    angular_velocity_rad_s: 7.292_115_146_706_979e-5,
};

impl Default for Frame {
    fn default() -> Self {
        EARTH_J2000
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AstroError {
    #[snafu(display("cannot combine states defined at {left} and {right}: epochs must be equal"))]
    EpochMismatch { left: Epoch, right: Epoch },
    #[snafu(display("parabolic orbits have ill-defined Keplerian orbital elements (ecc = {ecc})"))]
    ParabolicEccentricity { ecc: f64 },
    #[snafu(display("semi-latus rectum is nearly zero: {action}"))]
    ParabolicSemiParam { action: &'static str },
    #[snafu(display("true anomaly of {ta_deg} deg is physically impossible for a hyperbolic orbit"))]
    HyperbolicTrueAnomaly { ta_deg: f64 },
    #[snafu(display("{action} requires an elliptical orbit but ecc = {ecc}"))]
    NotElliptical { ecc: f64, action: &'static str },
    #[snafu(display("Kepler's equation did not converge within {iter} iterations"))]
    KeplerNoConvergence { iter: usize },
}
