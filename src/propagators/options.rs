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

use std::fmt;

use crate::time::{Duration, Unit};

use super::{ErrorCtrl, RSSCartesianStep};
use typed_builder::TypedBuilder;

/// PropOpts stores the integrator options, including the minimum and maximum step sizes, the
/// integration tolerances and the step budget.
///
/// Note that different step sizes and tolerances are only used for adaptive
/// methods. To use a fixed step integrator, initialize the options using `with_fixed_step`.
#[derive(Clone, Copy, Debug, TypedBuilder)]
#[builder(doc)]
pub struct PropOpts<E: ErrorCtrl> {
    #[builder(default = 60.0 * Unit::Second)]
    pub init_step: Duration,
    /// Step floor: the integration diverges if the error is above tolerance at this step size
    #[builder(default = 0.001 * Unit::Second)]
    pub min_step: Duration,
    #[builder(default = 2700.0 * Unit::Second)]
    pub max_step: Duration,
    /// Absolute tolerance (km and km/s)
    #[builder(default = 1e-12)]
    pub abs_tol: f64,
    /// Relative tolerance (no unit)
    #[builder(default = 1e-12)]
    pub rel_tol: f64,
    /// Number of step size reductions before a step is accepted regardless of its error
    #[builder(default = 50)]
    pub attempts: u8,
    /// Maximum number of steps in a single propagation call
    #[builder(default = 100_000)]
    pub max_steps: usize,
    #[builder(default = false)]
    pub fixed_step: bool,
    pub error_ctrl: E,
}

impl<E: ErrorCtrl> PropOpts<E> {
    /// `with_adaptive_step` initializes an `PropOpts` such that the integrator is used with an
    ///  adaptive step size. The number of attempts is fixed to 50 (as in GMAT).
    pub fn with_adaptive_step(
        min_step: Duration,
        max_step: Duration,
        abs_tol: f64,
        rel_tol: f64,
        error_ctrl: E,
    ) -> Self {
        PropOpts {
            init_step: max_step,
            min_step,
            max_step,
            abs_tol,
            rel_tol,
            attempts: 50,
            max_steps: 100_000,
            fixed_step: false,
            error_ctrl,
        }
    }

    /// Set the maximum step size and sets the initial step to that value if currently greater
    pub fn set_max_step(&mut self, max_step: Duration) {
        if self.init_step > max_step {
            self.init_step = max_step;
        }
        self.max_step = max_step;
    }
}

impl<E: ErrorCtrl> fmt::Display for PropOpts<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fixed_step {
            write!(f, "fixed step: {:e}", self.min_step,)
        } else {
            write!(
                f,
                "min_step: {:e}, max_step: {:e}, abs tol: {:e}, rel tol: {:e}, attempts: {}, max steps: {}",
                self.min_step, self.max_step, self.abs_tol, self.rel_tol, self.attempts, self.max_steps
            )
        }
    }
}

impl PropOpts<RSSCartesianStep> {
    /// `with_fixed_step` initializes an `PropOpts` such that the integrator is used with a fixed
    ///  step size.
    pub fn with_fixed_step(step: Duration) -> Self {
        PropOpts {
            init_step: step,
            min_step: step,
            max_step: step,
            abs_tol: 0.0,
            rel_tol: 0.0,
            fixed_step: true,
            attempts: 0,
            max_steps: 100_000,
            error_ctrl: RSSCartesianStep,
        }
    }

    pub fn with_fixed_step_s(step: f64) -> Self {
        Self::with_fixed_step(step * Unit::Second)
    }

    /// Returns the default options with specific tolerances.
    pub fn with_tolerances(abs_tol: f64, rel_tol: f64) -> Self {
        Self {
            abs_tol,
            rel_tol,
            ..Self::default()
        }
    }
}

impl Default for PropOpts<RSSCartesianStep> {
    /// `default` returns the same default step options as GMAT.
    fn default() -> PropOpts<RSSCartesianStep> {
        PropOpts {
            init_step: 60.0 * Unit::Second,
            min_step: 0.001 * Unit::Second,
            max_step: 2700.0 * Unit::Second,
            abs_tol: 1e-12,
            rel_tol: 1e-12,
            attempts: 50,
            max_steps: 100_000,
            fixed_step: false,
            error_ctrl: RSSCartesianStep,
        }
    }
}

#[cfg(test)]
mod ut_options {
    use super::*;

    #[test]
    fn test_options() {
        let opts = PropOpts::with_fixed_step(1e-1 * Unit::Second);
        assert_eq!(opts.min_step, 1e-1 * Unit::Second);
        assert_eq!(opts.max_step, 1e-1 * Unit::Second);
        assert!(opts.fixed_step);

        let opts = PropOpts::with_adaptive_step(
            1e-2 * Unit::Second,
            10.0 * Unit::Second,
            1e-10,
            1e-12,
            RSSCartesianStep,
        );
        assert_eq!(opts.min_step, 1e-2 * Unit::Second);
        assert_eq!(opts.max_step, 10.0 * Unit::Second);
        assert!(!opts.fixed_step);

        let opts: PropOpts<RSSCartesianStep> = Default::default();
        assert_eq!(opts.init_step, 60.0 * Unit::Second);
        assert_eq!(opts.min_step, 0.001 * Unit::Second);
        assert_eq!(opts.max_step, 2700.0 * Unit::Second);
        assert_eq!(opts.max_steps, 100_000);

        let mut opts = PropOpts::with_tolerances(1e-9, 1e-11);
        assert_eq!(opts.abs_tol, 1e-9);
        opts.set_max_step(30.0 * Unit::Second);
        assert_eq!(opts.init_step, 30.0 * Unit::Second);
    }

    #[test]
    fn test_builder() {
        let opts = PropOpts::builder()
            .max_steps(10)
            .error_ctrl(RSSCartesianStep)
            .build();
        assert_eq!(opts.max_steps, 10);
        assert_eq!(opts.rel_tol, 1e-12);
        assert_eq!(opts.init_step, 60.0 * Unit::Second);
    }
}
