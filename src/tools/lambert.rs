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
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::f64::consts::PI;
use typed_builder::TypedBuilder;

const LAMBERT_EPSILON: f64 = 1e-4; // General epsilon
/// Below this sine of the transfer angle, both positions are considered collinear with the origin
const LAMBERT_COLLINEAR_SIN: f64 = 1e-6;
/// Maximum number of iterations allowed in the Lambert problem solver.
pub const MAX_ITERATIONS: usize = 1000;
/// Default tolerance on the time of flight, in seconds
pub const LAMBERT_EPSILON_TIME: f64 = 1e-4;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LambertError {
    #[snafu(display("Lambert solver failed after {iterations} iterations (time of flight error of {tof_error_s:.3e} s)"))]
    LambertNoConvergence {
        iterations: usize,
        tof_error_s: f64,
    },
    #[snafu(display("Lambert geometry is degenerate: {reason}"))]
    DegenerateGeometry { reason: &'static str },
    #[snafu(display("Lambert targets are too close to the central body's center"))]
    TargetsTooClose,
}

/// Define the transfer kind for a Lambert
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    /// Prograde transfer: short way if the angular momentum of the transfer is along +Z
    #[default]
    Auto,
    ShortWay,
    LongWay,
}

impl TransferKind {
    /// Calculate the direction multiplier based on the transfer kind.
    fn direction_of_motion(self, r_init: &Vector3<f64>, r_final: &Vector3<f64>) -> f64 {
        match self {
            TransferKind::Auto => {
                if r_init.cross(r_final)[2] >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            TransferKind::ShortWay => 1.0,
            TransferKind::LongWay => -1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LambertSolution {
    pub v_init: Vector3<f64>,
    pub v_final: Vector3<f64>,
    /// Universal variable ψ at the solution, i.e. the square of the difference in eccentric anomaly for elliptical transfers
    pub psi: f64,
    /// Number of bisection iterations used
    pub iterations: usize,
}

/// Configuration of the universal variable Lambert solver.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct LambertSolver {
    #[builder(default = MAX_ITERATIONS)]
    #[serde(default = "LambertSolver::default_max_iterations")]
    pub max_iterations: usize,
    #[builder(default = LAMBERT_EPSILON_TIME)]
    #[serde(default = "LambertSolver::default_tof_tolerance")]
    pub tof_tolerance_s: f64,
}

impl Default for LambertSolver {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            tof_tolerance_s: LAMBERT_EPSILON_TIME,
        }
    }
}

impl LambertSolver {
    fn default_max_iterations() -> usize {
        MAX_ITERATIONS
    }

    fn default_tof_tolerance() -> f64 {
        LAMBERT_EPSILON_TIME
    }

    /// Solve the Lambert boundary problem with the universal variable formulation (Vallado, algorithm 58).
    ///
    /// Given the initial and final radii, a time of flight, and a gravitational parameters, it returns the needed initial and final velocities.
    /// The universal variable ψ is found by bisection on [-4π², 4π²], hence only zero revolution transfers are supported.
    pub fn solve(
        &self,
        r_init: Vector3<f64>,
        r_final: Vector3<f64>,
        tof_s: f64,
        mu_km3_s2: f64,
        kind: TransferKind,
    ) -> Result<LambertSolution, LambertError> {
        let r_init_norm = r_init.norm();
        let r_final_norm = r_final.norm();
        ensure!(
            r_init_norm > f64::EPSILON && r_final_norm > f64::EPSILON,
            TargetsTooCloseSnafu
        );
        ensure!(
            tof_s > 0.0,
            DegenerateGeometrySnafu {
                reason: "time of flight must be positive"
            }
        );
        let r_norm_product = r_init_norm * r_final_norm;
        ensure!(
            r_init.cross(&r_final).norm() / r_norm_product >= LAMBERT_COLLINEAR_SIN,
            DegenerateGeometrySnafu {
                reason: "positions are collinear with the origin (transfer angle of 0 or 180 degrees)"
            }
        );
        let cos_dnu = r_init.dot(&r_final) / r_norm_product;

        let dm = kind.direction_of_motion(&r_init, &r_final);

        let a = dm * (r_norm_product * (1.0 + cos_dnu)).sqrt();

        let mut psi_upper = 4.0 * PI.powi(2);
        let mut psi_lower = -4.0 * PI.powi(2);
        let mut psi = 0.0;

        let mut c2: f64 = 1.0 / 2.0;
        let mut c3: f64 = 1.0 / 6.0;
        let mut iter: usize = 0;
        let mut cur_tof: f64 = 0.0;
        let mut y = 0.0;

        while (cur_tof - tof_s).abs() > self.tof_tolerance_s {
            ensure!(
                iter < self.max_iterations,
                LambertNoConvergenceSnafu {
                    iterations: iter,
                    tof_error_s: (cur_tof - tof_s).abs(),
                }
            );
            iter += 1;

            y = r_init_norm + r_final_norm + a * (psi * c3 - 1.0) / c2.sqrt();
            if a > 0.0 && y < 0.0 {
                // Readjust ψ until y is positive
                for _ in 0..500 {
                    psi += 0.1;
                    (c2, c3) = stumpff(psi);
                    y = r_init_norm + r_final_norm + a * (psi * c3 - 1.0) / c2.sqrt();
                    if y >= 0.0 {
                        break;
                    }
                }
                ensure!(
                    y >= 0.0,
                    LambertNoConvergenceSnafu {
                        iterations: iter,
                        tof_error_s: f64::INFINITY,
                    }
                );
            }

            let chi = (y / c2).sqrt();
            cur_tof = (chi.powi(3) * c3 + a * y.sqrt()) / mu_km3_s2.sqrt();

            if cur_tof < tof_s {
                psi_lower = psi;
            } else {
                psi_upper = psi;
            }

            psi = (psi_upper + psi_lower) / 2.0;
            (c2, c3) = stumpff(psi);
        }

        let f = 1.0 - y / r_init_norm;
        let g_dot = 1.0 - y / r_final_norm;
        let g = a * (y / mu_km3_s2).sqrt();

        Ok(LambertSolution {
            v_init: (r_final - f * r_init) / g,
            v_final: (1.0 / g) * (g_dot * r_final - r_init),
            psi,
            iterations: iter,
        })
    }
}

/// Returns the Stumpff functions c2(ψ) and c3(ψ)
fn stumpff(psi: f64) -> (f64, f64) {
    if psi > LAMBERT_EPSILON {
        let sqrt_psi = psi.sqrt();
        let (s_spsi, c_spsi) = sqrt_psi.sin_cos();
        ((1.0 - c_spsi) / psi, (sqrt_psi - s_spsi) / psi.powi(3).sqrt())
    } else if psi < -LAMBERT_EPSILON {
        let sqrt_psi = (-psi).sqrt();
        (
            (1.0 - sqrt_psi.cosh()) / psi,
            (sqrt_psi.sinh() - sqrt_psi) / (-psi).powi(3).sqrt(),
        )
    } else {
        (0.5, 1.0 / 6.0)
    }
}

/// Solve the Lambert boundary problem with the default solver configuration.
pub fn standard(
    r_init: Vector3<f64>,
    r_final: Vector3<f64>,
    tof_s: f64,
    mu_km3_s2: f64,
    kind: TransferKind,
) -> Result<LambertSolution, LambertError> {
    LambertSolver::default().solve(r_init, r_final, tof_s, mu_km3_s2, kind)
}
