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

use crate::cosmic::{AstroError, Orbit, PropVector};
use crate::linalg::{Matrix3, Matrix6, Vector3, Vector6};
use snafu::Snafu;
use std::fmt;

/// Cartesian-based orbital dynamics.
pub mod orbital;
pub use self::orbital::*;

/// Zonal gravity models.
pub mod gravity;
pub use self::gravity::*;

/// Atmospheric drag models.
pub mod drag;
pub use self::drag::*;

/// A trait for models with equations of motion that can be integrated.
pub trait Dynamics: Clone + Sync + Send {
    /// Defines the equations of motion.
    ///
    /// - `delta_t_s`: Time in seconds past the context epoch.
    /// - `state_vec`: The integrated vector (state and STM), which changes at each integration stage.
    /// - `state_ctx`: The state context, used to rebuild the state from the state vector.
    fn eom(
        &self,
        delta_t_s: f64,
        state_vec: &PropVector,
        state_ctx: &Orbit,
    ) -> Result<PropVector, DynamicsError>;

    /// Returns the state derivative and its Jacobian with respect to the Cartesian state, used for the STM propagation.
    fn dual_eom(
        &self,
        _delta_t_s: f64,
        _osculating_state: &Orbit,
    ) -> Result<(Vector6<f64>, Matrix6<f64>), DynamicsError> {
        Err(DynamicsError::StateTransitionMatrixUnset)
    }

    /// Performs final changes after each successful integration step.
    ///
    /// Also called before the first integration step to update the initial state if needed.
    fn finally(&self, next_state: Orbit) -> Result<Orbit, DynamicsError> {
        Ok(next_state)
    }
}

/// A trait for immutable dynamics that return an acceleration (e.g. zonal harmonics, drag).
pub trait AccelModel: Send + Sync + fmt::Display {
    /// Defines the equations of motion for this acceleration model.
    fn eom(&self, osc: &Orbit) -> Result<Vector3<f64>, DynamicsError>;

    /// Returns the acceleration and its partial derivatives with respect to position (first three columns)
    /// and velocity (last three columns).
    fn dual_eom(&self, osc: &Orbit) -> Result<(Vector3<f64>, Matrix3<f64>, Matrix3<f64>), DynamicsError>;
}

/// Dynamical model errors.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DynamicsError {
    /// State Transition Matrix (STM) was expected but not set.
    #[snafu(display("expected STM to be set"))]
    StateTransitionMatrixUnset,
    /// Astrodynamics error.
    #[snafu(display("dynamical model encountered an astro error: {source}"))]
    DynamicsAstro { source: AstroError },
    #[snafu(display("{model} is undefined at a radius of {rmag_km} km"))]
    BelowSurface { model: String, rmag_km: f64 },
}
