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

use super::{AccelModel, DynamicsError};
use crate::cosmic::Orbit;
use crate::linalg::{Matrix3, Vector3};
use std::fmt;
use std::sync::Arc;

/// Oblateness perturbation of the central body, i.e. the J2 zonal harmonic.
///
/// The J2 coefficient and equatorial radius are read from the frame of the orbit unless overwritten.
#[derive(Copy, Clone, Debug, Default)]
pub struct J2Gravity {
    /// Overwrites the J2 of the frame if set
    pub j2: Option<f64>,
}

impl J2Gravity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_j2(j2: f64) -> Arc<Self> {
        Arc::new(Self { j2: Some(j2) })
    }

    fn coefficient(&self, osc: &Orbit) -> Result<f64, DynamicsError> {
        let rmag = osc.rmag_km();
        if rmag < f64::EPSILON {
            return Err(DynamicsError::BelowSurface {
                model: self.to_string(),
                rmag_km: rmag,
            });
        }
        let j2 = self.j2.unwrap_or(osc.frame.j2);
        Ok(-1.5 * j2 * osc.frame.mu_km3_s2 * osc.frame.equatorial_radius_km.powi(2))
    }
}

impl fmt::Display for J2Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.j2 {
            Some(j2) => write!(f, "J2 gravity (J2 = {j2:e})"),
            None => write!(f, "J2 gravity"),
        }
    }
}

impl AccelModel for J2Gravity {
    fn eom(&self, osc: &Orbit) -> Result<Vector3<f64>, DynamicsError> {
        let k = self.coefficient(osc)?;
        let r = osc.rmag_km();
        let (x, y, z) = (osc.x_km, osc.y_km, osc.z_km);
        let z2_r2 = (z / r).powi(2);
        let r5 = r.powi(5);
        Ok(k / r5
            * Vector3::new(
                x * (1.0 - 5.0 * z2_r2),
                y * (1.0 - 5.0 * z2_r2),
                z * (3.0 - 5.0 * z2_r2),
            ))
    }

    fn dual_eom(
        &self,
        osc: &Orbit,
    ) -> Result<(Vector3<f64>, Matrix3<f64>, Matrix3<f64>), DynamicsError> {
        let accel = self.eom(osc)?;
        let k = self.coefficient(osc)?;
        let r = osc.rmag_km();
        let (x, y, z) = (osc.x_km, osc.y_km, osc.z_km);
        let r5 = r.powi(5);
        let r7 = r.powi(7);
        let r9 = r.powi(9);
        let z2 = z * z;

        // Gradient of a conservative field, hence symmetric
        let dxx = 1.0 / r5 - 5.0 * (x * x + z2) / r7 + 35.0 * x * x * z2 / r9;
        let dyy = 1.0 / r5 - 5.0 * (y * y + z2) / r7 + 35.0 * y * y * z2 / r9;
        let dzz = 3.0 / r5 - 30.0 * z2 / r7 + 35.0 * z2 * z2 / r9;
        let dxy = -5.0 * x * y / r7 + 35.0 * x * y * z2 / r9;
        let dxz = -15.0 * x * z / r7 + 35.0 * x * z * z2 / r9;
        let dyz = -15.0 * y * z / r7 + 35.0 * y * z * z2 / r9;

        let da_dr = k * Matrix3::new(dxx, dxy, dxz, dxy, dyy, dyz, dxz, dyz, dzz);

        Ok((accel, da_dr, Matrix3::zeros()))
    }
}
