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
use crate::utils::tilde_matrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Exponential atmospheric density model, with the Vallado reference values by default.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExponentialAtmosphere {
    /// Density at the reference altitude, in kg/m^3
    pub rho0_kg_m3: f64,
    /// Reference altitude above the equatorial radius, in km
    pub ref_alt_km: f64,
    /// Scale height, in km
    pub scale_height_km: f64,
}

impl Default for ExponentialAtmosphere {
    fn default() -> Self {
        Self {
            rho0_kg_m3: 3.614e-13,
            ref_alt_km: 700.0,
            scale_height_km: 88.667,
        }
    }
}

impl ExponentialAtmosphere {
    /// Returns the density in kg/m^3 at the provided altitude in km
    pub fn density(&self, alt_km: f64) -> f64 {
        self.rho0_kg_m3 * (-(alt_km - self.ref_alt_km) / self.scale_height_km).exp()
    }
}

/// Drag of a co-rotating exponential atmosphere on a cannonball spacecraft.
#[derive(Copy, Clone, Debug)]
pub struct Drag {
    pub atmosphere: ExponentialAtmosphere,
    /// Drag coefficient (no unit)
    pub cd: f64,
    /// Drag area in m^2
    pub area_m2: f64,
    /// Mass of the spacecraft in kg
    pub mass_kg: f64,
}

impl Drag {
    /// Exponential atmosphere drag model with the provided ballistic parameters
    pub fn exponential(cd: f64, area_m2: f64, mass_kg: f64) -> Arc<Self> {
        Arc::new(Self {
            atmosphere: ExponentialAtmosphere::default(),
            cd,
            area_m2,
            mass_kg,
        })
    }

    /// Returns Cd * A / m in m^2/kg
    pub fn ballistic_coeff(&self) -> f64 {
        self.cd * self.area_m2 / self.mass_kg
    }

    fn relative_velocity(osc: &Orbit) -> Vector3<f64> {
        let omega = Vector3::new(0.0, 0.0, osc.frame.angular_velocity_rad_s);
        osc.velocity() - omega.cross(&osc.radius())
    }

    fn density(&self, osc: &Orbit) -> Result<f64, DynamicsError> {
        let alt_km = osc.rmag_km() - osc.frame.equatorial_radius_km;
        if alt_km <= 0.0 {
            return Err(DynamicsError::BelowSurface {
                model: self.to_string(),
                rmag_km: osc.rmag_km(),
            });
        }
        Ok(self.atmosphere.density(alt_km))
    }
}

impl fmt::Display for Drag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exponential drag (Cd = {}, A = {} m^2, m = {} kg)",
            self.cd, self.area_m2, self.mass_kg
        )
    }
}

impl AccelModel for Drag {
    fn eom(&self, osc: &Orbit) -> Result<Vector3<f64>, DynamicsError> {
        let rho = self.density(osc)?;
        let v_rel = Self::relative_velocity(osc);
        // The density is per m^3 and the velocity in km/s: the 1e3 brings the acceleration back to km/s^2
        Ok(-0.5 * 1e3 * self.ballistic_coeff() * rho * v_rel.norm() * v_rel)
    }

    fn dual_eom(
        &self,
        osc: &Orbit,
    ) -> Result<(Vector3<f64>, Matrix3<f64>, Matrix3<f64>), DynamicsError> {
        let rho = self.density(osc)?;
        let v_rel = Self::relative_velocity(osc);
        let v_rel_mag = v_rel.norm();
        let factor = -0.5 * 1e3 * self.ballistic_coeff();
        let accel = factor * rho * v_rel_mag * v_rel;

        let da_dv = if v_rel_mag > f64::EPSILON {
            factor * rho * (v_rel_mag * Matrix3::identity() + v_rel * v_rel.transpose() / v_rel_mag)
        } else {
            Matrix3::zeros()
        };

        // The density only depends on the radius magnitude
        let drho_dr = -rho / self.atmosphere.scale_height_km * osc.radius().transpose() / osc.rmag_km();
        let omega = Vector3::new(0.0, 0.0, osc.frame.angular_velocity_rad_s);
        // d(v_rel)/d(r) = -[omega x]
        let da_dr = factor * v_rel_mag * v_rel * drho_dr - da_dv * tilde_matrix(&omega);

        Ok((accel, da_dr, da_dv))
    }
}

#[cfg(test)]
mod ut_drag {
    use super::*;
    use crate::cosmic::EARTH_J2000;
    use crate::linalg::Vector6;
    use crate::time::Epoch;

    #[test]
    fn jacobian_matches_finite_differences() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2022, 1, 1);
        let osc = Orbit::cartesian(6778.0, 100.0, 50.0, 0.1, 7.6, 0.5, epoch, EARTH_J2000);
        let model = Drag::exponential(2.2, 10.0, 500.0);
        let (accel, da_dr, da_dv) = model.dual_eom(&osc).unwrap();
        assert!(accel.norm() > 0.0);

        for j in 0..6 {
            let h = if j < 3 { 1e-2 } else { 1e-5 };
            let mut delta = Vector6::zeros();
            delta[j] = h;
            let plus = osc + delta;
            let minus = osc + (-delta);
            let column = (model.eom(&plus).unwrap() - model.eom(&minus).unwrap()) / (2.0 * h);
            for i in 0..3 {
                let analytical = if j < 3 { da_dr[(i, j)] } else { da_dv[(i, j - 3)] };
                let scale = analytical.abs().max(1e-15);
                assert!(
                    (column[i] - analytical).abs() / scale < 1e-4,
                    "({i}, {j}): {} != {analytical}",
                    column[i]
                );
            }
        }
    }

    #[test]
    fn below_surface() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2022, 1, 1);
        let osc = Orbit::cartesian(6000.0, 0.0, 0.0, 0.0, 7.6, 0.0, epoch, EARTH_J2000);
        let model = Drag::exponential(2.2, 10.0, 500.0);
        assert!(matches!(
            model.eom(&osc),
            Err(DynamicsError::BelowSurface { .. })
        ));
    }
}
