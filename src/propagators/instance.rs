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


use super::{DynamicsSnafu, IntegrationDetails, PropagationError, Propagator};
use super::{
    error_ctrl::ErrorCtrl, IntegrationDivergedSnafu, NonFiniteStateSnafu, StepBudgetExceededSnafu,
};
use crate::cosmic::{Orbit, PropVector};
use crate::dynamics::Dynamics;
use crate::time::{Duration, Epoch, Unit};
use snafu::{ensure, ResultExt};
use std::cmp::Ordering;
use std::sync::mpsc::{channel, Sender};

/// Lower and upper bounds of the step size change between two consecutive attempts
const MIN_STEP_FACTOR: f64 = 0.5;
const MAX_STEP_FACTOR: f64 = 2.0;

/// A propagator instance: the state being propagated, the propagator setup and the working storage of the integrator.
#[derive(Debug)]
pub struct PropInstance<'a, D: Dynamics, E: ErrorCtrl> {
    /// The state of this propagator instance
    pub state: Orbit,
    /// The propagator setup (kind, stages, etc.)
    pub prop: &'a Propagator<D, E>,
    /// Stores the details of the previous integration step
    pub details: IntegrationDetails,
    pub(crate) step_size: Duration, // Stores the adapted step for the _next_ call
    pub(crate) fixed_step: bool,
    pub(crate) steps: usize, // Number of steps taken in the current propagation call
    // Allows us to do pre-allocation of the ki vectors
    pub(crate) k: Vec<PropVector>,
}

impl<'a, D: Dynamics, E: ErrorCtrl> PropInstance<'a, D, E> {
    /// Allows setting the step size of the propagator
    pub fn set_step(&mut self, step_size: Duration, fixed: bool) {
        self.step_size = step_size;
        self.fixed_step = fixed;
    }

    fn for_duration_channel_option(
        &mut self,
        duration: Duration,
        maybe_tx_chan: Option<Sender<Orbit>>,
    ) -> Result<Orbit, PropagationError> {
        if duration == Duration::ZERO {
            return Ok(self.state);
        }
        let stop_time = self.state.epoch + duration;
        if duration > 2 * Unit::Minute || duration < -2 * Unit::Minute {
            // Prevent the print spam for orbit determination cases
            info!("Propagating for {} until {}", duration, stop_time);
        }
        // Call `finally` on the current state to set anything up
        self.state = self
            .prop
            .dynamics
            .finally(self.state)
            .context(DynamicsSnafu)?;

        self.steps = 0;
        let backprop = duration < Unit::Nanosecond;
        // The step may still be negative if a previous call failed midway
        self.step_size = self.step_size.abs();
        if backprop {
            self.step_size = -self.step_size; // Invert the step size
        }
        loop {
            let dt = self.state.epoch;
            if stop_time == dt {
                // No propagation necessary
                self.step_size = self.step_size.abs();
                return Ok(self.state);
            }
            ensure!(
                self.steps < self.prop.opts.max_steps,
                StepBudgetExceededSnafu {
                    max_steps: self.prop.opts.max_steps,
                    epoch: dt,
                    target: stop_time,
                }
            );
            if (!backprop && dt + self.step_size > stop_time)
                || (backprop && dt + self.step_size <= stop_time)
            {
                // Take one final step of exactly the needed duration until the stop time
                let prev_step_size = self.step_size;
                let prev_step_kind = self.fixed_step;
                self.set_step(stop_time - dt, true);

                self.single_step()?;
                self.steps += 1;

                // Publish to channel if provided
                if let Some(ref chan) = maybe_tx_chan {
                    if let Err(e) = chan.send(self.state) {
                        warn!("could not publish to channel: {}", e)
                    }
                }

                // Restore the step size for subsequent calls
                self.set_step(prev_step_size, prev_step_kind);
                if backprop {
                    self.step_size = -self.step_size; // Restore to a positive step size
                }
                return Ok(self.state);
            } else {
                self.single_step()?;
                self.steps += 1;
                // Publish to channel if provided
                if let Some(ref chan) = maybe_tx_chan {
                    if let Err(e) = chan.send(self.state) {
                        warn!("could not publish to channel: {}", e)
                    }
                }
            }
        }
    }

    /// This method propagates the provided Dynamics for the provided duration.
    pub fn for_duration(&mut self, duration: Duration) -> Result<Orbit, PropagationError> {
        self.for_duration_channel_option(duration, None)
    }

    /// This method propagates the provided Dynamics for the provided duration and publishes each state on the channel.
    pub fn for_duration_with_channel(
        &mut self,
        duration: Duration,
        tx_chan: Sender<Orbit>,
    ) -> Result<Orbit, PropagationError> {
        self.for_duration_channel_option(duration, Some(tx_chan))
    }

    /// Propagates the provided Dynamics until the provided epoch. Returns the end state.
    pub fn until_epoch(&mut self, end_time: Epoch) -> Result<Orbit, PropagationError> {
        let duration: Duration = end_time - self.state.epoch;
        self.for_duration(duration)
    }

    /// Propagates the provided Dynamics for the provided duration and returns the end state
    /// and every accepted integration step, starting with the initial state.
    pub fn for_duration_with_traj(
        &mut self,
        duration: Duration,
    ) -> Result<(Orbit, Vec<Orbit>), PropagationError> {
        let start_state = self.state;
        let (tx, rx) = channel();
        let end_state = self.for_duration_with_channel(duration, tx)?;
        let mut traj = vec![start_state];
        traj.extend(rx.try_iter());
        Ok((end_state, traj))
    }

    /// Propagates the provided Dynamics until the provided epoch and returns the end state and every accepted integration step.
    pub fn until_epoch_with_traj(
        &mut self,
        end_time: Epoch,
    ) -> Result<(Orbit, Vec<Orbit>), PropagationError> {
        let duration: Duration = end_time - self.state.epoch;
        self.for_duration_with_traj(duration)
    }

    /// Returns `count` states spaced by `step`, the first one being the current state.
    pub fn sample(&mut self, step: Duration, count: usize) -> Result<Vec<Orbit>, PropagationError> {
        let mut states = Vec::with_capacity(count);
        for i in 0..count {
            if i > 0 {
                self.for_duration(step)?;
            }
            states.push(self.state);
        }
        Ok(states)
    }

    /// Returns the states at each of the provided epochs, in the same order as the epochs.
    ///
    /// Epochs prior to the current state are reached by propagating backward from the current state,
    /// so an enabled STM is always relative to the current state's epoch.
    /// The instance ends on the state at the latest epoch (or the current state if all epochs are prior).
    pub fn until_epochs(&mut self, epochs: &[Epoch]) -> Result<Vec<Orbit>, PropagationError> {
        let start_state = self.state;
        let mut states = vec![start_state; epochs.len()];

        let mut order: Vec<usize> = (0..epochs.len()).collect();
        order.sort_by(|a, b| {
            epochs[*a]
                .partial_cmp(&epochs[*b])
                .unwrap_or(Ordering::Equal)
        });

        for &idx in order.iter().rev() {
            if epochs[idx] < start_state.epoch {
                states[idx] = self.until_epoch(epochs[idx])?;
            }
        }

        self.state = start_state;
        for &idx in &order {
            if epochs[idx] >= start_state.epoch {
                states[idx] = self.until_epoch(epochs[idx])?;
            }
        }

        Ok(states)
    }

    /// Take a single propagator step
    pub fn single_step(&mut self) -> Result<(), PropagationError> {
        let (t, state_vec) = self.derive()?;
        let next_epoch = self.state.epoch + t;
        self.state.set_from_prop_vector(next_epoch, &state_vec);
        ensure!(
            self.state.is_finite(),
            NonFiniteStateSnafu { epoch: next_epoch }
        );
        self.state = self
            .prop
            .dynamics
            .finally(self.state)
            .context(DynamicsSnafu)?;

        Ok(())
    }

    /// This method integrates whichever function is provided as `d_xdt`. Everything passed to this function is in **seconds**.
    ///
    /// This function returns the step sized used (as a Duration) and the new state as y_{n+1} = y_n + \frac{dy_n}{dt}.
    /// To get the integration details, check `self.details`.
    fn derive(&mut self) -> Result<(Duration, PropVector), PropagationError> {
        let state = &self.state.to_prop_vector();
        let ctx = &self.state;
        let opts = &self.prop.opts;
        let min_step_s = opts.min_step.to_seconds();
        let max_step_s = opts.max_step.to_seconds();
        // Reset the number of attempts used (we don't reset the error because it's set before it's read)
        self.details.attempts = 1;
        // The direction of propagation is kept throughout the step size adaptation
        let direction = if self.step_size < Duration::ZERO {
            -1.0
        } else {
            1.0
        };
        let mut step_size_s = self.step_size.to_seconds().abs();
        loop {
            // Round the step to the time precision first, so the state and its epoch stay consistent
            let step = direction * step_size_s * Unit::Second;
            let h = step.to_seconds();

            let ki = self
                .prop
                .dynamics
                .eom(0.0, state, ctx)
                .context(DynamicsSnafu)?;
            self.k[0] = ki;
            let mut a_idx: usize = 0;
            for i in 0..(self.prop.stages - 1) {
                // Let's compute the c_i by summing the relevant items from the list of coefficients.
                // \sum_{j=1}^{i-1} a_ij  ∀ i ∈ [2, s]
                let mut ci: f64 = 0.0;
                // The wi stores the a_{s1} * k_1 + a_{s2} * k_2 + ... + a_{s, s-1} * k_{s-1} +
                let mut wi = PropVector::zeros();
                for kj in &self.k[0..i + 1] {
                    let a_ij = self.prop.a_coeffs[a_idx];
                    ci += a_ij;
                    wi += a_ij * kj;
                    a_idx += 1;
                }

                let ki = self
                    .prop
                    .dynamics
                    .eom(ci * h, &(state + h * wi), ctx)
                    .context(DynamicsSnafu)?;
                self.k[i + 1] = ki;
            }
            // Compute the next state and the error
            let mut next_state = *state;
            // State error estimation from https://en.wikipedia.org/wiki/Runge%E2%80%93Kutta_methods#Adaptive_Runge%E2%80%93Kutta_methods
            let mut error_est = PropVector::zeros();
            for (i, ki) in self.k.iter().enumerate() {
                let b_i = self.prop.b_coeffs[i];
                if !self.fixed_step {
                    let b_i_star = self.prop.b_coeffs[i + self.prop.stages];
                    error_est += h * (b_i - b_i_star) * ki;
                }
                next_state += h * b_i * ki;
            }

            if self.fixed_step {
                // Using a fixed step, no adaptive step necessary
                self.details.step = step;
                self.details.error = 0.0;
                return Ok((step, next_state));
            }

            let finite = next_state.iter().all(|v| v.is_finite());
            let at_floor = step_size_s <= min_step_s;

            self.details.error = if finite {
                opts.error_ctrl.estimate(
                    &error_est.fixed_rows::<6>(0).into_owned(),
                    &next_state.fixed_rows::<6>(0).into_owned(),
                    &state.fixed_rows::<6>(0).into_owned(),
                    opts.abs_tol,
                    opts.rel_tol,
                )
            } else {
                f64::INFINITY
            };

            if self.details.error <= 1.0 || at_floor || self.details.attempts >= opts.attempts {
                if !finite {
                    return NonFiniteStateSnafu {
                        epoch: self.state.epoch + step,
                    }
                    .fail();
                }

                ensure!(
                    self.details.error <= 1.0 || !at_floor,
                    IntegrationDivergedSnafu {
                        epoch: self.state.epoch,
                        step,
                        min_step: opts.min_step,
                        error: self.details.error,
                    }
                );

                if self.details.error > 1.0 {
                    warn!(
                        "Could not further decrease step size: maximum number of attempts reached ({})",
                        self.details.attempts
                    );
                }

                self.details.step = step;
                if self.details.error <= 1.0 {
                    // Error is within the tolerance, let's attempt to increase the step for the next iteration.
                    let factor = if self.details.error > 0.0 {
                        (0.9 * (1.0 / self.details.error).powf(1.0 / f64::from(self.prop.order)))
                            .clamp(MIN_STEP_FACTOR, MAX_STEP_FACTOR)
                    } else {
                        MAX_STEP_FACTOR
                    };
                    step_size_s = (step_size_s * factor).clamp(min_step_s, max_step_s);
                }
                // In all cases, let's update the step size to whatever was the adapted step size
                self.step_size = direction * step_size_s * Unit::Second;
                debug!("{} {}", self.state.epoch + step, self.details);
                return Ok((step, next_state));
            } else {
                // Error is too high and we aren't using the smallest step, and we haven't hit the max number of attempts.
                // So let's adapt the step size.
                self.details.attempts += 1;
                let factor = if finite {
                    (0.9 * (1.0 / self.details.error)
                        .powf(1.0 / f64::from(self.prop.order - 1)))
                    .clamp(MIN_STEP_FACTOR, MAX_STEP_FACTOR)
                } else {
                    MIN_STEP_FACTOR
                };
                step_size_s = (step_size_s * factor).max(min_step_s);
                // Note that we don't set self.step_size, that will be updated right before we return
            }
        }
    }
}
