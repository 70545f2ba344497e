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

use crate::linalg::Vector6;
use std::fmt;

/// The Error Control trait manages how a propagator computes the error in the current step.
///
/// Only the Cartesian state is controlled: the STM components follow the state's step size.
/// The returned error is scaled by `abs_tol + rel_tol * magnitude`, so a step is accepted when it is at most one.
pub trait ErrorCtrl: Copy + Send + Sync + fmt::Debug {
    /// Computes the scaled error of the candidate step.
    ///
    /// - `error_est`: the difference between the embedded solutions of the integrator
    /// - `candidate`: the state after the step
    /// - `cur_state`: the state before the step
    fn estimate(
        &self,
        error_est: &Vector6<f64>,
        candidate: &Vector6<f64>,
        cur_state: &Vector6<f64>,
        abs_tol: f64,
        rel_tol: f64,
    ) -> f64;
}

/// RSS of the position and velocity errors, each scaled by the change of position (resp. velocity) over the step.
///
/// The largest of both is returned. This is the default, as in GMAT.
#[derive(Clone, Copy, Debug, Default)]
pub struct RSSCartesianStep;

impl ErrorCtrl for RSSCartesianStep {
    fn estimate(
        &self,
        error_est: &Vector6<f64>,
        candidate: &Vector6<f64>,
        cur_state: &Vector6<f64>,
        abs_tol: f64,
        rel_tol: f64,
    ) -> f64 {
        let delta = candidate - cur_state;
        let err_pos = error_est.fixed_rows::<3>(0).norm()
            / (abs_tol + rel_tol * delta.fixed_rows::<3>(0).norm());
        let err_vel = error_est.fixed_rows::<3>(3).norm()
            / (abs_tol + rel_tol * delta.fixed_rows::<3>(3).norm());
        err_pos.max(err_vel)
    }
}

/// RSS of the position and velocity errors, each scaled by the magnitude of the candidate position (resp. velocity).
#[derive(Clone, Copy, Debug, Default)]
pub struct RSSCartesianState;

impl ErrorCtrl for RSSCartesianState {
    fn estimate(
        &self,
        error_est: &Vector6<f64>,
        candidate: &Vector6<f64>,
        _cur_state: &Vector6<f64>,
        abs_tol: f64,
        rel_tol: f64,
    ) -> f64 {
        let err_pos = error_est.fixed_rows::<3>(0).norm()
            / (abs_tol + rel_tol * candidate.fixed_rows::<3>(0).norm());
        let err_vel = error_est.fixed_rows::<3>(3).norm()
            / (abs_tol + rel_tol * candidate.fixed_rows::<3>(3).norm());
        err_pos.max(err_vel)
    }
}

/// Largest component-wise error, each scaled by the largest magnitude of that component before and after the step.
#[derive(Clone, Copy, Debug, Default)]
pub struct LargestError;

impl ErrorCtrl for LargestError {
    fn estimate(
        &self,
        error_est: &Vector6<f64>,
        candidate: &Vector6<f64>,
        cur_state: &Vector6<f64>,
        abs_tol: f64,
        rel_tol: f64,
    ) -> f64 {
        let mut max_err = 0.0;
        for i in 0..6 {
            let scale = abs_tol + rel_tol * candidate[i].abs().max(cur_state[i].abs());
            let err = error_est[i].abs() / scale;
            if err > max_err {
                max_err = err;
            }
        }
        max_err
    }
}

#[cfg(test)]
mod ut_error_ctrl {
    use super::*;

    #[test]
    fn scaled_errors() {
        let cur = Vector6::new(7000.0, 0.0, 0.0, 0.0, 7.5, 0.0);
        let cand = Vector6::new(6999.0, 450.0, 0.0, -0.5, 7.48, 0.0);
        let err = Vector6::new(1e-9, 0.0, 0.0, 0.0, 0.0, 0.0);

        let step = RSSCartesianStep.estimate(&err, &cand, &cur, 0.0, 1e-12);
        let delta_pos = (cand - cur).fixed_rows::<3>(0).norm();
        let expected = 1e-9 / (1e-12 * delta_pos);
        assert!((step - expected).abs() / expected < 1e-12);

        let state = RSSCartesianState.estimate(&err, &cand, &cur, 1e-9, 0.0);
        assert!((state - 1.0).abs() < 1e-12);

        let largest = LargestError.estimate(&err, &cand, &cur, 0.0, 1e-12);
        assert!((largest - 1e-9 / (1e-12 * 7000.0)).abs() < 1e-6);

        // A zero error is always accepted
        assert_eq!(
            RSSCartesianStep.estimate(&Vector6::zeros(), &cand, &cur, 1e-12, 1e-12),
            0.0
        );
    }
}
