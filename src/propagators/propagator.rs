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


use super::error_ctrl::{ErrorCtrl, RSSCartesianStep};
use super::{IntegrationDetails, PropInstance, PropOpts, RK, RK4Fixed, RKF45, RKF78};
use crate::cosmic::{Orbit, PropVector};
use crate::dynamics::Dynamics;
use crate::time::Duration;

/// A Propagator allows propagating a set of dynamics forward or backward in time.
/// It includes the options and the set of coefficients used for the monomorphic instance.
///
/// The propagator itself is immutable: every propagation goes through a `PropInstance` (see `with`),
/// which owns the working storage of the integrator. Several instances may hence share one propagator
/// across threads.
#[derive(Clone, Debug)]
pub struct Propagator<D: Dynamics, E: ErrorCtrl> {
    pub dynamics: D, // Stores the dynamics used. *Must* use this to get the latest values
    pub opts: PropOpts<E>, // Stores the integration options (tolerance, min/max step, init step, etc.)
    pub(crate) order: u8,  // Order of the integrator
    pub(crate) stages: usize, // Number of stages, i.e. how many times the derivatives will be called
    pub(crate) a_coeffs: &'static [f64],
    pub(crate) b_coeffs: &'static [f64],
}

impl<D: Dynamics, E: ErrorCtrl> Propagator<D, E> {
    /// Each propagator must be initialized with `new` which stores propagator information.
    pub fn new<T: RK>(dynamics: D, opts: PropOpts<E>) -> Self {
        Self {
            dynamics,
            opts,
            stages: T::STAGES,
            order: T::ORDER,
            a_coeffs: T::A_COEFFS,
            b_coeffs: T::B_COEFFS,
        }
    }

    /// An RKF78 propagator (the default) with custom propagator options.
    pub fn rkf78(dynamics: D, opts: PropOpts<E>) -> Self {
        Self::new::<RKF78>(dynamics, opts)
    }

    /// An RKF45 propagator with custom propagator options: cheaper per step but needs far more steps at tight tolerances.
    pub fn rkf45(dynamics: D, opts: PropOpts<E>) -> Self {
        Self::new::<RKF45>(dynamics, opts)
    }

    pub fn with(&self, state: Orbit) -> PropInstance<'_, D, E> {
        // Pre-allocate the k used in the propagator
        let k = vec![PropVector::zeros(); self.stages];
        PropInstance {
            state,
            prop: self,
            details: IntegrationDetails {
                step: self.opts.init_step,
                error: 0.0,
                attempts: 1,
            },
            step_size: self.opts.init_step,
            fixed_step: self.opts.fixed_step,
            steps: 0,
            k,
        }
    }
}

impl<D: Dynamics> Propagator<D, RSSCartesianStep> {
    /// Default propagator is an RKF78 with the default PropOpts.
    pub fn default(dynamics: D) -> Self {
        Self::new::<RKF78>(dynamics, PropOpts::default())
    }

    /// A classical RK4 with a fixed step size.
    pub fn rk4_fixed(dynamics: D, step: Duration) -> Self {
        Self::new::<RK4Fixed>(dynamics, PropOpts::with_fixed_step(step))
    }
}
