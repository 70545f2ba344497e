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

use snafu::prelude::*;
use std::fmt;

/// Provides different methods for controlling the error computation of the integrator.
pub mod error_ctrl;
pub use self::error_ctrl::*;

// Re-Export
mod instance;
pub use instance::*;
mod propagator;
pub use propagator::*;
mod rk_methods;
pub use rk_methods::*;
mod options;
pub use options::*;

use crate::dynamics::DynamicsError;
use crate::time::{Duration, Epoch};

/// Stores the details of the previous integration step of a given propagator. Access as `instance.details`.
#[derive(Copy, Clone, Debug)]
pub struct IntegrationDetails {
    /// step size used
    pub step: Duration,
    /// scaled error in the previous integration step (accepted when at most one)
    pub error: f64,
    /// number of attempts needed by an adaptive step size to be within the tolerance
    pub attempts: u8,
}

impl fmt::Display for IntegrationDetails {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "IntegrationDetails {{step: {}, error: {:.3e}, attempts: {}}}",
            self.step, self.error, self.attempts
        )
    }
}

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PropagationError {
    #[snafu(display("encountered a dynamics error {source}"))]
    Dynamics { source: DynamicsError },
    #[snafu(display(
        "integration diverged at {epoch}: scaled error of {error:.3e} with a step of {step} at the {min_step} floor"
    ))]
    IntegrationDiverged {
        epoch: Epoch,
        step: Duration,
        min_step: Duration,
        error: f64,
    },
    #[snafu(display("integration produced a non finite state at {epoch}"))]
    NonFiniteState { epoch: Epoch },
    #[snafu(display("step budget of {max_steps} steps exhausted at {epoch} before reaching {target}"))]
    StepBudgetExceeded {
        max_steps: usize,
        epoch: Epoch,
        target: Epoch,
    },
}

impl PropagationError {
    /// Returns whether this error is a divergence of the integrator itself (step floor or non finite state)
    pub fn is_divergence(&self) -> bool {
        matches!(
            self,
            Self::IntegrationDiverged { .. } | Self::NonFiniteState { .. }
        )
    }
}
