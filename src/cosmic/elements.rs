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

use super::{AstroError, Frame, Orbit, TimeTagged};
use crate::linalg::Vector6;
use crate::time::Epoch;
use crate::utils::{between_0_360, between_0_tau};
use std::f64::consts::PI;
use std::fmt;

const KEPLER_MAX_ITER: usize = 50;
const KEPLER_TOLERANCE: f64 = 1e-14;

/// Classical Keplerian orbital elements at an epoch.
///
/// **Units:** semi-major axis in km, angles in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct KeplerianElements {
    pub sma_km: f64,
    pub ecc: f64,
    pub inc_deg: f64,
    /// Argument of periapsis
    pub aop_deg: f64,
    /// Right ascension of the ascending node
    pub raan_deg: f64,
    /// True anomaly
    pub ta_deg: f64,
    pub epoch: Epoch,
    pub frame: Frame,
}

impl KeplerianElements {
    /// Builds the elements from the vector `[sma_km, ecc, inc, aop, raan, ta]` where the angles are in **radians**.
    pub fn from_vector_rad(vec: &Vector6<f64>, epoch: Epoch, frame: Frame) -> Self {
        Self {
            sma_km: vec[0],
            ecc: vec[1],
            inc_deg: vec[2].to_degrees(),
            aop_deg: vec[3].to_degrees(),
            raan_deg: vec[4].to_degrees(),
            ta_deg: vec[5].to_degrees(),
            epoch,
            frame,
        }
    }

    /// Returns the vector `[sma_km, ecc, inc, aop, raan, ta]` where the angles are in **radians**.
    pub fn to_vector_rad(&self) -> Vector6<f64> {
        Vector6::new(
            self.sma_km,
            self.ecc,
            self.inc_deg.to_radians(),
            self.aop_deg.to_radians(),
            self.raan_deg.to_radians(),
            self.ta_deg.to_radians(),
        )
    }

    /// Returns the Cartesian state of these elements
    pub fn to_orbit(&self) -> Result<Orbit, AstroError> {
        Orbit::keplerian(
            self.sma_km,
            self.ecc,
            self.inc_deg,
            self.raan_deg,
            self.aop_deg,
            self.ta_deg,
            self.epoch,
            self.frame,
        )
    }

    /// Returns a copy of these elements where the eccentricity is non negative and the angles are within [0; 360) degrees.
    ///
    /// A negative eccentricity is reflected by rotating the periapsis by half a turn, which describes the same orbit.
    pub fn normalized(&self) -> Self {
        let mut me = *self;
        if me.ecc < 0.0 {
            me.ecc = -me.ecc;
            me.aop_deg += 180.0;
            me.ta_deg += 180.0;
        }
        me.inc_deg = between_0_360(me.inc_deg);
        if me.inc_deg > 180.0 {
            // Inclination beyond 180 degrees is the same plane seen from the other node
            me.inc_deg = 360.0 - me.inc_deg;
            me.raan_deg += 180.0;
            me.aop_deg += 180.0;
        }
        me.aop_deg = between_0_360(me.aop_deg);
        me.raan_deg = between_0_360(me.raan_deg);
        me.ta_deg = between_0_360(me.ta_deg);
        me
    }

    /// Returns the mean motion in rad/s
    pub fn mean_motion_rad_s(&self) -> f64 {
        (self.frame.mu_km3_s2 / self.sma_km.abs().powi(3)).sqrt()
    }

    /// Returns the mean anomaly in radians, only defined for elliptical orbits
    pub fn mean_anomaly_rad(&self) -> Result<f64, AstroError> {
        self.ensure_elliptical("computing the mean anomaly")?;
        Ok(true_to_mean_anomaly_rad(self.ta_deg.to_radians(), self.ecc))
    }

    /// Propagates these elements to the provided epoch assuming two-body motion, i.e. only the anomaly changes.
    pub fn at_epoch(&self, epoch: Epoch) -> Result<Self, AstroError> {
        self.ensure_elliptical("analytical propagation")?;
        let delta_t_s = (epoch - self.epoch).to_seconds();
        let ma = self.mean_anomaly_rad()? + self.mean_motion_rad_s() * delta_t_s;
        let ta = mean_to_true_anomaly_rad(ma, self.ecc)?;
        let mut me = *self;
        me.ta_deg = between_0_360(ta.to_degrees());
        me.epoch = epoch;
        Ok(me)
    }

    /// Returns an error unless these elements describe an ellipse (non negative eccentricity below one and positive semi-major axis).
    pub fn ensure_elliptical(&self, action: &'static str) -> Result<(), AstroError> {
        if !(0.0..1.0).contains(&self.ecc) || self.sma_km <= 0.0 {
            Err(AstroError::NotElliptical {
                ecc: self.ecc,
                action,
            })
        } else {
            Ok(())
        }
    }
}

impl From<&Orbit> for KeplerianElements {
    fn from(orbit: &Orbit) -> Self {
        Self {
            sma_km: orbit.sma_km(),
            ecc: orbit.ecc(),
            inc_deg: orbit.inc_deg(),
            aop_deg: orbit.aop_deg(),
            raan_deg: orbit.raan_deg(),
            ta_deg: orbit.ta_deg(),
            epoch: orbit.epoch,
            frame: orbit.frame,
        }
    }
}

impl TimeTagged for KeplerianElements {
    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.epoch = epoch
    }
}

impl fmt::Display for KeplerianElements {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let decimals = f.precision().unwrap_or(6);
        write!(
            f,
            "[{}] {}\tsma = {:.*} km\tecc = {:.*}\tinc = {:.*} deg\taop = {:.*} deg\traan = {:.*} deg\tta = {:.*} deg",
            self.frame,
            self.epoch,
            decimals,
            self.sma_km,
            decimals,
            self.ecc,
            decimals,
            self.inc_deg,
            decimals,
            self.aop_deg,
            decimals,
            self.raan_deg,
            decimals,
            self.ta_deg
        )
    }
}

/// Converts a true anomaly into a mean anomaly for an elliptical orbit (both in radians)
pub fn true_to_mean_anomaly_rad(ta_rad: f64, ecc: f64) -> f64 {
    let (sin_ta, cos_ta) = ta_rad.sin_cos();
    let sin_ea = ((1.0 - ecc.powi(2)).sqrt() * sin_ta) / (1.0 + ecc * cos_ta);
    let cos_ea = (ecc + cos_ta) / (1.0 + ecc * cos_ta);
    let ea = sin_ea.atan2(cos_ea);
    between_0_tau(ea - ecc * ea.sin())
}

/// Solves Kepler's equation with Newton Raphson and returns the true anomaly (both in radians)
pub fn mean_to_true_anomaly_rad(ma_rad: f64, ecc: f64) -> Result<f64, AstroError> {
    let ma = between_0_tau(ma_rad);
    let mut ea = if ecc > 0.8 { PI } else { ma };
    let mut converged = false;
    for _ in 0..KEPLER_MAX_ITER {
        let delta = (ea - ecc * ea.sin() - ma) / (1.0 - ecc * ea.cos());
        ea -= delta;
        if delta.abs() < KEPLER_TOLERANCE {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(AstroError::KeplerNoConvergence {
            iter: KEPLER_MAX_ITER,
        });
    }
    let (sin_ea, cos_ea) = ea.sin_cos();
    let sin_ta = (1.0 - ecc.powi(2)).sqrt() * sin_ea / (1.0 - ecc * cos_ea);
    let cos_ta = (cos_ea - ecc) / (1.0 - ecc * cos_ea);
    Ok(between_0_tau(sin_ta.atan2(cos_ta)))
}
