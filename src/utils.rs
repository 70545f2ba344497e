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

use crate::linalg::{Matrix3, Matrix6, Vector3};
use std::f64::consts::{PI, TAU};

/// Returns the tilde matrix from the provided Vector3.
pub fn tilde_matrix(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v[2], v[1], v[2], 0.0, -v[0], -v[1], v[0], 0.0)
}

/// Returns the provided angle bounded between 0.0 and 360.0
pub fn between_0_360(angle: f64) -> f64 {
    let mut bounded = angle % 360.0;
    if bounded < 0.0 {
        bounded += 360.0;
    }
    bounded
}

/// Returns the provided angle bounded between -180.0 and +180.0
pub fn between_pm_180(angle: f64) -> f64 {
    let mut bounded = between_0_360(angle);
    if bounded > 180.0 {
        bounded -= 360.0;
    }
    bounded
}

/// Returns the provided angle, in radians, bounded between 0 and 2π
pub fn between_0_tau(angle_rad: f64) -> f64 {
    let mut bounded = angle_rad % TAU;
    if bounded < 0.0 {
        bounded += TAU;
    }
    bounded
}

/// Returns the provided angle, in radians, bounded between -π and +π
pub fn between_pm_pi(angle_rad: f64) -> f64 {
    between_0_tau(angle_rad + PI) - PI
}

/// Rotation matrix around the Z axis by the provided angle in radians (frame rotation)
pub fn r3(angle_rad: f64) -> Matrix3<f64> {
    let (s, c) = angle_rad.sin_cos();
    Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
}

/// Returns the symmetric part of a square matrix, used to clean up numerical asymmetry in covariances
pub fn symmetrize(m: &Matrix6<f64>) -> Matrix6<f64> {
    0.5 * (m + m.transpose())
}

/// Returns whether the provided covariance is symmetric positive definite, tested with a Cholesky decomposition of its symmetric part.
pub fn is_positive_definite(m: &Matrix6<f64>) -> bool {
    m.iter().all(|v| v.is_finite()) && symmetrize(m).cholesky().is_some()
}
