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


use crate::cosmic::{Frame, Orbit};
use crate::linalg::{RowVector6, Vector3};
use crate::time::Epoch;
use crate::utils::r3;
use snafu::prelude::*;
use std::fmt;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StationError {
    #[snafu(display("station {name} has an empty ephemeris"))]
    EmptyEphemeris { name: String },
    #[snafu(display("ephemeris of station {name} is not strictly increasing in time at {epoch}"))]
    EphemerisNotIncreasing { name: String, epoch: Epoch },
    #[snafu(display("station {name} has no ephemeris at {epoch}: data spans {start} to {end}"))]
    OutsideEphemeris {
        name: String,
        epoch: Epoch,
        start: Epoch,
        end: Epoch,
    },
    #[snafu(display("{name} and the observed object are co-located at {epoch}"))]
    CoLocated { name: String, epoch: Epoch },
}

/// Location of an observer.
#[derive(Clone, Debug, PartialEq)]
pub enum StationLocation {
    /// Fixed position in the inertial frame, e.g. a synthetic receiver
    Inertial { position_km: Vector3<f64> },
    /// Time varying position, linearly interpolated between the provided states
    Ephemeris { states: Vec<Orbit> },
    /// Point on the surface of a rotating oblate body
    Geodetic {
        latitude_deg: f64,
        longitude_deg: f64,
        height_km: f64,
        frame: Frame,
        /// Epoch at which the body fixed and inertial frames are rotated by `reference_angle_deg`
        reference_epoch: Epoch,
        reference_angle_deg: f64,
    },
}

/// A ground station (or any other observer) with its location.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundStation {
    pub name: String,
    pub location: StationLocation,
}

impl GroundStation {
    /// Initializes an observer fixed in the inertial frame.
    pub fn inertial(name: &str, position_km: Vector3<f64>) -> Self {
        Self {
            name: name.to_string(),
            location: StationLocation::Inertial { position_km },
        }
    }

    /// Initializes an observer from its own state history, which must be strictly increasing in time.
    pub fn from_ephemeris(name: &str, states: Vec<Orbit>) -> Result<Self, StationError> {
        ensure!(
            !states.is_empty(),
            EmptyEphemerisSnafu {
                name: name.to_string()
            }
        );
        for pair in states.windows(2) {
            ensure!(
                pair[1].epoch > pair[0].epoch,
                EphemerisNotIncreasingSnafu {
                    name: name.to_string(),
                    epoch: pair[1].epoch
                }
            );
        }
        Ok(Self {
            name: name.to_string(),
            location: StationLocation::Ephemeris { states },
        })
    }

    /// Initializes a point on the surface of a celestial object, whose prime meridian is aligned with the
    /// inertial X axis at the reference epoch.
    /// This is meant for analysis, not for spacecraft navigation.
    pub fn from_point(
        name: &str,
        latitude_deg: f64,
        longitude_deg: f64,
        height_km: f64,
        frame: Frame,
        reference_epoch: Epoch,
    ) -> Self {
        Self {
            name: name.to_string(),
            location: StationLocation::Geodetic {
                latitude_deg,
                longitude_deg,
                height_km,
                frame,
                reference_epoch,
                reference_angle_deg: 0.0,
            },
        }
    }

    /// Return this ground station as an orbit (position and velocity) in the inertial frame at the provided epoch
    pub fn to_orbit(&self, epoch: Epoch, frame: Frame) -> Result<Orbit, StationError> {
        match &self.location {
            StationLocation::Inertial { position_km } => {
                Ok(Orbit::from_vectors(position_km, &Vector3::zeros(), epoch, frame))
            }
            StationLocation::Ephemeris { states } => self.interpolate(states, epoch),
            StationLocation::Geodetic {
                latitude_deg,
                longitude_deg,
                height_km,
                frame: body,
                reference_epoch,
                reference_angle_deg,
            } => {
                let e2 = 2.0 * body.flattening - body.flattening.powi(2);
                let (sin_lat, cos_lat) = latitude_deg.to_radians().sin_cos();
                let (sin_long, cos_long) = longitude_deg.to_radians().sin_cos();
                let c_body = body.equatorial_radius_km / (1.0 - e2 * sin_lat.powi(2)).sqrt();
                let s_body = c_body * (1.0 - e2);
                let r_body_fixed = Vector3::new(
                    (c_body + height_km) * cos_lat * cos_long,
                    (c_body + height_km) * cos_lat * sin_long,
                    (s_body + height_km) * sin_lat,
                );

                let theta = reference_angle_deg.to_radians()
                    + body.angular_velocity_rad_s * (epoch - *reference_epoch).to_seconds();
                // Body fixed to inertial is the transpose of the inertial to body fixed frame rotation
                let radius = r3(theta).transpose() * r_body_fixed;
                let omega = Vector3::new(0.0, 0.0, body.angular_velocity_rad_s);
                let velocity = omega.cross(&radius);
                Ok(Orbit::from_vectors(&radius, &velocity, epoch, frame))
            }
        }
    }

    fn interpolate(&self, states: &[Orbit], epoch: Epoch) -> Result<Orbit, StationError> {
        let outside = || OutsideEphemerisSnafu {
            name: self.name.clone(),
            epoch,
            start: states.first().map_or(epoch, |s| s.epoch),
            end: states.last().map_or(epoch, |s| s.epoch),
        };

        let idx = states.partition_point(|s| s.epoch < epoch);
        match states.get(idx) {
            Some(state) if state.epoch == epoch => Ok(*state),
            Some(after) if idx > 0 => {
                let before = &states[idx - 1];
                let alpha = (epoch - before.epoch).to_seconds() / (after.epoch - before.epoch).to_seconds();
                let vec = before.to_cartesian_vec() + alpha * (after.to_cartesian_vec() - before.to_cartesian_vec());
                let mut state = before.with_cartesian_vec(&vec);
                state.epoch = epoch;
                Ok(state)
            }
            _ => outside().fail(),
        }
    }

    /// Returns the position of this station at the provided epoch in the inertial frame
    pub fn position_km(&self, epoch: Epoch) -> Result<Vector3<f64>, StationError> {
        Ok(self.to_orbit(epoch, Frame::default())?.radius())
    }

    /// Computes the range (km) and range rate (km/s) of the provided object seen from this station.
    pub fn range_doppler(&self, rx: &Orbit) -> Result<(f64, f64), StationError> {
        let tx = self.to_orbit(rx.epoch, rx.frame)?;
        let rho = rx.radius() - tx.radius();
        let rho_norm = rho.norm();
        ensure!(
            rho_norm > f64::EPSILON,
            CoLocatedSnafu {
                name: self.name.clone(),
                epoch: rx.epoch
            }
        );
        let rho_dot = rho.dot(&(rx.velocity() - tx.velocity())) / rho_norm;
        Ok((rho_norm, rho_dot))
    }

    /// Computes the sensitivity of the range and of the range rate with respect to the Cartesian state of the observed object.
    pub fn range_doppler_partials(
        &self,
        rx: &Orbit,
    ) -> Result<(RowVector6<f64>, RowVector6<f64>), StationError> {
        let tx = self.to_orbit(rx.epoch, rx.frame)?;
        let delta_r = rx.radius() - tx.radius();
        let delta_v = rx.velocity() - tx.velocity();
        let rho = delta_r.norm();
        ensure!(
            rho > f64::EPSILON,
            CoLocatedSnafu {
                name: self.name.clone(),
                epoch: rx.epoch
            }
        );
        let rho_dot = delta_r.dot(&delta_v) / rho;

        let mut range_row = RowVector6::zeros();
        let mut range_rate_row = RowVector6::zeros();
        for i in 0..3 {
            range_row[i] = delta_r[i] / rho;
            range_rate_row[i] = delta_v[i] / rho - rho_dot * delta_r[i] / rho.powi(2);
            range_rate_row[i + 3] = delta_r[i] / rho;
        }
        Ok((range_row, range_rate_row))
    }

    /// Computes the elevation in degrees of the provided object above the local horizontal plane of this station.
    ///
    /// The local vertical is the geodetic normal for geodetic stations and the radial direction otherwise.
    pub fn elevation_deg(&self, rx: &Orbit) -> Result<f64, StationError> {
        let tx = self.to_orbit(rx.epoch, rx.frame)?;
        let rho = rx.radius() - tx.radius();
        ensure!(
            rho.norm() > f64::EPSILON,
            CoLocatedSnafu {
                name: self.name.clone(),
                epoch: rx.epoch
            }
        );
        let up = match &self.location {
            StationLocation::Geodetic {
                latitude_deg,
                longitude_deg,
                frame: body,
                reference_epoch,
                reference_angle_deg,
                ..
            } => {
                let (sin_lat, cos_lat) = latitude_deg.to_radians().sin_cos();
                let (sin_long, cos_long) = longitude_deg.to_radians().sin_cos();
                let theta = reference_angle_deg.to_radians()
                    + body.angular_velocity_rad_s * (rx.epoch - *reference_epoch).to_seconds();
                r3(theta).transpose() * Vector3::new(cos_lat * cos_long, cos_lat * sin_long, sin_lat)
            }
            _ => tx.radius() / tx.rmag_km(),
        };
        Ok((rho.dot(&up) / rho.norm()).asin().to_degrees())
    }
}

impl fmt::Display for GroundStation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.location {
            StationLocation::Inertial { position_km } => write!(
                f,
                "{} (inertial [{:.3}, {:.3}, {:.3}] km)",
                self.name, position_km[0], position_km[1], position_km[2]
            ),
            StationLocation::Ephemeris { states } => {
                write!(f, "{} (ephemeris of {} states)", self.name, states.len())
            }
            StationLocation::Geodetic {
                latitude_deg,
                longitude_deg,
                height_km,
                ..
            } => write!(
                f,
                "{} (lat.: {:.4} deg    long.: {:.4} deg    alt.: {:.3} m)",
                self.name,
                latitude_deg,
                longitude_deg,
                height_km * 1e3
            ),
        }
    }
}
