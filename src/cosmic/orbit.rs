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

use super::{AstroError, Frame, TimeTagged};
use crate::linalg::{Matrix6, SVector, Vector3, Vector6};
use crate::time::{Duration, Epoch, Unit};
use crate::utils::between_0_360;
use std::f64::consts::PI;
use std::f64::EPSILON;
use std::fmt;
use std::ops::{Add, Sub};

/// If an orbit has an eccentricity below the following value, it is considered circular.
pub const ECC_EPSILON: f64 = 1e-11;

/// Length of the vector integrated by the propagators: the Cartesian state followed by the 36 components of the STM (column major).
pub const PROP_VEC_LEN: usize = 42;

/// The vector integrated by the propagators.
pub type PropVector = SVector<f64, PROP_VEC_LEN>;

/// Orbit defines an orbital state, with its epoch, its frame, and optionally its state transition matrix.
///
/// Unless noted otherwise, algorithms are from GMAT 2016a StateConversionUtil.
/// Regardless of the constructor used, this struct stores all the state information in Cartesian coordinates
/// as these are always non singular.
#[derive(Copy, Clone, Debug)]
pub struct Orbit {
    /// in km
    pub x_km: f64,
    /// in km
    pub y_km: f64,
    /// in km
    pub z_km: f64,
    /// in km/s
    pub vx_km_s: f64,
    /// in km/s
    pub vy_km_s: f64,
    /// in km/s
    pub vz_km_s: f64,
    pub epoch: Epoch,
    pub frame: Frame,
    /// Optionally stores the state transition matrix from the start of the propagation until the current time
    pub stm: Option<Matrix6<f64>>,
}

impl Orbit {
    /// Creates a new Orbit in the provided frame at the provided Epoch.
    ///
    /// **Units:** km, km, km, km/s, km/s, km/s
    #[allow(clippy::too_many_arguments)]
    pub fn cartesian(
        x_km: f64,
        y_km: f64,
        z_km: f64,
        vx_km_s: f64,
        vy_km_s: f64,
        vz_km_s: f64,
        epoch: Epoch,
        frame: Frame,
    ) -> Self {
        Self {
            x_km,
            y_km,
            z_km,
            vx_km_s,
            vy_km_s,
            vz_km_s,
            epoch,
            frame,
            stm: None,
        }
    }

    /// Creates a new Orbit from the position and velocity vectors
    pub fn from_vectors(
        radius_km: &Vector3<f64>,
        velocity_km_s: &Vector3<f64>,
        epoch: Epoch,
        frame: Frame,
    ) -> Self {
        Self::cartesian(
            radius_km[0],
            radius_km[1],
            radius_km[2],
            velocity_km_s[0],
            velocity_km_s[1],
            velocity_km_s[2],
            epoch,
            frame,
        )
    }

    /// Creates a new Orbit from a Cartesian Vector6 in [km, km, km, km/s, km/s, km/s]
    pub fn cartesian_vec(state: &Vector6<f64>, epoch: Epoch, frame: Frame) -> Self {
        Self::cartesian(
            state[0], state[1], state[2], state[3], state[4], state[5], epoch, frame,
        )
    }

    /// Creates a new Orbit from its Keplerian orbital elements, angles in degrees.
    ///
    /// Algorithm from GMAT's StateConversionUtil::ComputeKeplToCart
    #[allow(clippy::too_many_arguments)]
    pub fn keplerian(
        sma_km: f64,
        ecc: f64,
        inc_deg: f64,
        raan_deg: f64,
        aop_deg: f64,
        ta_deg: f64,
        epoch: Epoch,
        frame: Frame,
    ) -> Result<Self, AstroError> {
        let gm = frame.mu_km3_s2;
        let ecc = if ecc < 0.0 {
            warn!("eccentricity cannot be negative: sign of eccentricity changed");
            -ecc
        } else {
            ecc
        };
        let sma = if ecc > 1.0 && sma_km > 0.0 {
            warn!("eccentricity > 1 (hyperbolic) BUT SMA > 0 (elliptical): sign of SMA changed");
            -sma_km
        } else if ecc < 1.0 && sma_km < 0.0 {
            warn!("eccentricity < 1 (elliptical) BUT SMA < 0 (hyperbolic): sign of SMA changed");
            -sma_km
        } else {
            sma_km
        };
        if (1.0 - ecc).abs() < EPSILON {
            return Err(AstroError::ParabolicEccentricity { ecc });
        }
        if ecc > 1.0 {
            let ta = between_0_360(ta_deg);
            if ta > (PI - (1.0 / ecc).acos()).to_degrees() {
                return Err(AstroError::HyperbolicTrueAnomaly { ta_deg });
            }
        }

        let inc = inc_deg.to_radians();
        let raan = raan_deg.to_radians();
        let aop = aop_deg.to_radians();
        let ta = ta_deg.to_radians();
        let p = sma * (1.0 - ecc.powi(2));
        if p.abs() < EPSILON {
            return Err(AstroError::ParabolicSemiParam {
                action: "cannot convert Keplerian elements to Cartesian",
            });
        }

        let radius = p / (1.0 + ecc * ta.cos());
        let (sin_aop_ta, cos_aop_ta) = (aop + ta).sin_cos();
        let (sin_inc, cos_inc) = inc.sin_cos();
        let (sin_raan, cos_raan) = raan.sin_cos();
        let (sin_aop, cos_aop) = aop.sin_cos();
        let x = radius * (cos_aop_ta * cos_raan - cos_inc * sin_aop_ta * sin_raan);
        let y = radius * (cos_aop_ta * sin_raan + cos_inc * sin_aop_ta * cos_raan);
        let z = radius * sin_aop_ta * sin_inc;
        let sqrt_gm_p = (gm / p).sqrt();
        let cos_ta_ecc = ta.cos() + ecc;
        let sin_ta = ta.sin();

        let vx = sqrt_gm_p * cos_ta_ecc * (-sin_aop * cos_raan - cos_inc * sin_raan * cos_aop)
            - sqrt_gm_p * sin_ta * (cos_aop * cos_raan - cos_inc * sin_raan * sin_aop);
        let vy = sqrt_gm_p * cos_ta_ecc * (-sin_aop * sin_raan + cos_inc * cos_raan * cos_aop)
            - sqrt_gm_p * sin_ta * (cos_aop * sin_raan + cos_inc * cos_raan * sin_aop);
        let vz = sqrt_gm_p * (cos_ta_ecc * sin_inc * cos_aop - sin_ta * sin_inc * sin_aop);

        Ok(Self::cartesian(x, y, z, vx, vy, vz, epoch, frame))
    }

    /// Returns the radius vector of this Orbit in [km, km, km]
    pub fn radius(&self) -> Vector3<f64> {
        Vector3::new(self.x_km, self.y_km, self.z_km)
    }

    /// Returns the velocity vector of this Orbit in [km/s, km/s, km/s]
    pub fn velocity(&self) -> Vector3<f64> {
        Vector3::new(self.vx_km_s, self.vy_km_s, self.vz_km_s)
    }

    /// Returns this state as a Cartesian Vector6 in [km, km, km, km/s, km/s, km/s]
    pub fn to_cartesian_vec(&self) -> Vector6<f64> {
        Vector6::new(
            self.x_km,
            self.y_km,
            self.z_km,
            self.vx_km_s,
            self.vy_km_s,
            self.vz_km_s,
        )
    }

    /// Returns a copy of this orbit where the position and velocity are replaced by the provided vector.
    /// The STM, epoch and frame are kept.
    pub fn with_cartesian_vec(&self, state: &Vector6<f64>) -> Self {
        let mut me = *self;
        me.x_km = state[0];
        me.y_km = state[1];
        me.z_km = state[2];
        me.vx_km_s = state[3];
        me.vy_km_s = state[4];
        me.vz_km_s = state[5];
        me
    }

    /// Returns the orbital momentum vector
    pub fn hvec(&self) -> Vector3<f64> {
        self.radius().cross(&self.velocity())
    }

    /// Returns the eccentricity vector (no unit)
    pub fn evec(&self) -> Vector3<f64> {
        let r = self.radius();
        let v = self.velocity();
        let gm = self.frame.mu_km3_s2;
        ((v.norm().powi(2) - gm / r.norm()) * r - (r.dot(&v)) * v) / gm
    }

    /// Returns the magnitude of the radius vector in km
    pub fn rmag_km(&self) -> f64 {
        self.radius().norm()
    }

    /// Returns the magnitude of the velocity vector in km/s
    pub fn vmag_km_s(&self) -> f64 {
        self.velocity().norm()
    }

    /// Returns the norm of the orbital momentum
    pub fn hmag_km2_s(&self) -> f64 {
        self.hvec().norm()
    }

    /// Returns the specific mechanical energy in km^2/s^2
    pub fn energy_km2_s2(&self) -> f64 {
        self.vmag_km_s().powi(2) / 2.0 - self.frame.mu_km3_s2 / self.rmag_km()
    }

    /// Returns the semi-major axis in km
    pub fn sma_km(&self) -> f64 {
        -self.frame.mu_km3_s2 / (2.0 * self.energy_km2_s2())
    }

    /// Returns the period of this orbit
    pub fn period(&self) -> Duration {
        2.0 * PI * (self.sma_km().powi(3) / self.frame.mu_km3_s2).sqrt() * Unit::Second
    }

    /// Returns the mean motion in rad/s
    pub fn mean_motion_rad_s(&self) -> f64 {
        (self.frame.mu_km3_s2 / self.sma_km().abs().powi(3)).sqrt()
    }

    /// Returns the eccentricity (no unit)
    pub fn ecc(&self) -> f64 {
        self.evec().norm()
    }

    /// Returns the semi parameter (or semilatus rectum) in km
    pub fn semi_parameter_km(&self) -> f64 {
        self.sma_km() * (1.0 - self.ecc().powi(2))
    }

    /// Returns the inclination in degrees
    pub fn inc_deg(&self) -> f64 {
        (self.hvec()[2] / self.hmag_km2_s()).acos().to_degrees()
    }

    /// Returns the argument of periapsis in degrees
    pub fn aop_deg(&self) -> f64 {
        let n = Vector3::new(0.0, 0.0, 1.0).cross(&self.hvec());
        let cos_aop = n.dot(&self.evec()) / (n.norm() * self.ecc());
        let aop = cos_aop.acos();
        if aop.is_nan() {
            if cos_aop > 1.0 {
                180.0
            } else {
                0.0
            }
        } else if self.evec()[2] < 0.0 {
            (2.0 * PI - aop).to_degrees()
        } else {
            aop.to_degrees()
        }
    }

    /// Returns the right ascension of the ascending node in degrees
    pub fn raan_deg(&self) -> f64 {
        let n = Vector3::new(0.0, 0.0, 1.0).cross(&self.hvec());
        let cos_raan = n[0] / n.norm();
        let raan = cos_raan.acos();
        if raan.is_nan() {
            if cos_raan > 1.0 {
                180.0
            } else {
                0.0
            }
        } else if n[1] < 0.0 {
            (2.0 * PI - raan).to_degrees()
        } else {
            raan.to_degrees()
        }
    }

    /// Returns the true anomaly in degrees between 0 and 360.0
    ///
    /// There is an ambiguity exactly at 0.0 and 180.0 when the arccosine is out of bounds, which is resolved with the sign of the cosine.
    pub fn ta_deg(&self) -> f64 {
        if self.ecc() < ECC_EPSILON {
            debug!(
                "true anomaly ill-defined for circular orbit (e = {})",
                self.ecc()
            );
        }
        let cos_nu = self.evec().dot(&self.radius()) / (self.ecc() * self.rmag_km());
        let ta = cos_nu.acos();
        if ta.is_nan() {
            if cos_nu > 1.0 {
                180.0
            } else {
                0.0
            }
        } else if self.radius().dot(&self.velocity()) < 0.0 {
            (2.0 * PI - ta).to_degrees()
        } else {
            ta.to_degrees()
        }
    }

    /// Returns the true longitude in degrees
    pub fn tlong_deg(&self) -> f64 {
        between_0_360(self.aop_deg() + self.raan_deg() + self.ta_deg())
    }

    /// Returns the argument of latitude in degrees
    ///
    /// If the orbit is near circular, the AoL is computed from the true longitude instead of the ill-defined true anomaly.
    pub fn aol_deg(&self) -> f64 {
        between_0_360(if self.ecc() < ECC_EPSILON {
            self.tlong_deg() - self.raan_deg()
        } else {
            self.aop_deg() + self.ta_deg()
        })
    }

    /// Returns the eccentric anomaly in degrees
    pub fn ea_deg(&self) -> f64 {
        let (sin_ta, cos_ta) = self.ta_deg().to_radians().sin_cos();
        let ecc_cos_ta = self.ecc() * cos_ta;
        let sin_ea = ((1.0 - self.ecc().powi(2)).sqrt() * sin_ta) / (1.0 + ecc_cos_ta);
        let cos_ea = (self.ecc() + cos_ta) / (1.0 + ecc_cos_ta);
        sin_ea.atan2(cos_ea).to_degrees()
    }

    /// Returns the mean anomaly in degrees, only defined for elliptical orbits
    pub fn ma_deg(&self) -> Result<f64, AstroError> {
        let ecc = self.ecc();
        if ecc >= 1.0 {
            return Err(AstroError::NotElliptical {
                ecc,
                action: "computing the mean anomaly",
            });
        }
        let ea = self.ea_deg().to_radians();
        Ok(between_0_360((ea - ecc * ea.sin()).to_degrees()))
    }

    /// Returns a copy of the state with a new identity STM, which will be propagated alongside the state.
    pub fn with_stm(mut self) -> Self {
        self.enable_stm();
        self
    }

    /// Returns a copy of the state without its STM
    pub fn without_stm(mut self) -> Self {
        self.disable_stm();
        self
    }

    /// Enables the STM computation and resets it to identity
    pub fn enable_stm(&mut self) {
        self.stm = Some(Matrix6::identity());
    }

    /// Disable the STM of this state
    pub fn disable_stm(&mut self) {
        self.stm = None;
    }

    /// Returns the root sum squared error between this state and another, in kilometers for the position and kilometers per second in velocity.
    ///
    /// Fails if the two states are not defined at the same epoch.
    pub fn rss(&self, other: &Self) -> Result<(f64, f64), AstroError> {
        let delta = (*self - *other)?;
        Ok((
            delta.fixed_rows::<3>(0).norm(),
            delta.fixed_rows::<3>(3).norm(),
        ))
    }

    /// Returns whether this orbit and another are equal within the specified radial and velocity absolute tolerances
    pub fn eq_within(&self, other: &Self, radial_tol_km: f64, velocity_tol_km_s: f64) -> bool {
        self.epoch == other.epoch
            && (self.x_km - other.x_km).abs() < radial_tol_km
            && (self.y_km - other.y_km).abs() < radial_tol_km
            && (self.z_km - other.z_km).abs() < radial_tol_km
            && (self.vx_km_s - other.vx_km_s).abs() < velocity_tol_km_s
            && (self.vy_km_s - other.vy_km_s).abs() < velocity_tol_km_s
            && (self.vz_km_s - other.vz_km_s).abs() < velocity_tol_km_s
    }

    /// Returns whether every component of this state (and of its STM, if any) is finite
    pub fn is_finite(&self) -> bool {
        self.to_cartesian_vec().iter().all(|v| v.is_finite())
            && self
                .stm
                .map_or(true, |stm| stm.iter().all(|v| v.is_finite()))
    }

    /// Returns the vector integrated by the propagators: the state followed by the STM (zeros if disabled).
    pub fn to_prop_vector(&self) -> PropVector {
        let mut vector = PropVector::zeros();
        vector
            .fixed_rows_mut::<6>(0)
            .copy_from(&self.to_cartesian_vec());
        if let Some(stm) = self.stm {
            for (i, stm_val) in stm.iter().enumerate() {
                vector[6 + i] = *stm_val;
            }
        }
        vector
    }

    /// Sets the epoch and state from the integrated vector. The STM is only read if it is enabled on this state.
    pub fn set_from_prop_vector(&mut self, epoch: Epoch, vector: &PropVector) {
        self.epoch = epoch;
        self.x_km = vector[0];
        self.y_km = vector[1];
        self.z_km = vector[2];
        self.vx_km_s = vector[3];
        self.vy_km_s = vector[4];
        self.vz_km_s = vector[5];
        if self.stm.is_some() {
            self.stm = Some(Matrix6::from_iterator(
                vector.fixed_rows::<36>(6).iter().copied(),
            ));
        }
    }
}

impl TimeTagged for Orbit {
    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.epoch = epoch
    }
}

impl PartialEq for Orbit {
    /// Two states are equal if their position are equal within one centimeter and their velocities within one centimeter per second.
    fn eq(&self, other: &Orbit) -> bool {
        self.eq_within(other, 1e-5, 1e-5)
    }
}

impl Add<Vector6<f64>> for Orbit {
    type Output = Orbit;

    /// Applies a Cartesian correction to this state. The STM, epoch and frame are kept.
    fn add(self, correction: Vector6<f64>) -> Orbit {
        self.with_cartesian_vec(&(self.to_cartesian_vec() + correction))
    }
}

impl Sub for Orbit {
    type Output = Result<Vector6<f64>, AstroError>;

    /// Returns the Cartesian difference between two states defined at the same epoch.
    fn sub(self, other: Orbit) -> Self::Output {
        if self.epoch != other.epoch {
            return Err(AstroError::EpochMismatch {
                left: self.epoch,
                right: other.epoch,
            });
        }
        Ok(self.to_cartesian_vec() - other.to_cartesian_vec())
    }
}

impl fmt::Display for Orbit {
    // Prints as Cartesian in floating point with units
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let decimals = f.precision().unwrap_or(6);
        write!(
            f,
            "[{}] {}\tposition = [{:.*}, {:.*}, {:.*}] km\tvelocity = [{:.*}, {:.*}, {:.*}] km/s",
            self.frame,
            self.epoch,
            decimals,
            self.x_km,
            decimals,
            self.y_km,
            decimals,
            self.z_km,
            decimals,
            self.vx_km_s,
            decimals,
            self.vy_km_s,
            decimals,
            self.vz_km_s
        )
    }
}

#[cfg(test)]
mod ut_orbit {
    use super::*;
    use crate::cosmic::EARTH_J2000;

    #[test]
    fn keplerian_round_trip() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2021, 3, 4);
        let orbit =
            Orbit::keplerian(7712.186, 0.15, 30.5, 35.7, 65.8, 48.3, epoch, EARTH_J2000).unwrap();
        assert!((orbit.sma_km() - 7712.186).abs() < 1e-8);
        assert!((orbit.ecc() - 0.15).abs() < 1e-12);
        assert!((orbit.inc_deg() - 30.5).abs() < 1e-10);
        assert!((orbit.raan_deg() - 35.7).abs() < 1e-10);
        assert!((orbit.aop_deg() - 65.8).abs() < 1e-9);
        assert!((orbit.ta_deg() - 48.3).abs() < 1e-9);
    }

    #[test]
    fn parabolic_is_rejected() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2021, 3, 4);
        assert!(Orbit::keplerian(7000.0, 1.0, 0.0, 0.0, 0.0, 0.0, epoch, EARTH_J2000).is_err());
    }

    #[test]
    fn difference_requires_same_epoch() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2021, 3, 4);
        let orbit = Orbit::cartesian(7000.0, 0.0, 0.0, 0.0, 7.5, 0.0, epoch, EARTH_J2000);
        let mut later = orbit;
        later.epoch = epoch + Unit::Second * 1;
        assert!(matches!(
            orbit - later,
            Err(AstroError::EpochMismatch { .. })
        ));
        assert_eq!((orbit - orbit).unwrap(), Vector6::zeros());
    }

    #[test]
    fn prop_vector_keeps_stm() {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2021, 3, 4);
        let orbit =
            Orbit::cartesian(7000.0, 0.0, 0.0, 0.0, 7.5, 0.0, epoch, EARTH_J2000).with_stm();
        let mut vector = orbit.to_prop_vector();
        vector[6 + 7] = 2.0;
        let mut copy = orbit;
        copy.set_from_prop_vector(epoch, &vector);
        assert_eq!(copy.stm.unwrap()[(1, 1)], 2.0);
        let mut no_stm = orbit.without_stm();
        no_stm.set_from_prop_vector(epoch, &vector);
        assert!(no_stm.stm.is_none());
    }
}
