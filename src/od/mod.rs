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


/// Observers and their measurement models
pub mod ground_station;
pub use ground_station::GroundStation;

/// Observations, tracks and tracking arcs
pub mod msr;

/// Smoothing of raw position tracks
pub mod smoother;

/// Initial orbit determination over a track
pub mod iod;

/// Sequential refinement of Keplerian elements from position fixes
pub mod kalman;

/// Time difference of arrival multilateration
pub mod tdoa;

/// Batch least squares estimator and its ensemble runner
pub mod blse;

/// Generation of synthetic tracking data
pub mod simulator;
pub use simulator::TrackingSimulator;

/// Pipelines chaining the estimators
pub mod process;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::blse::*;
    pub use super::ground_station::*;
    pub use super::iod::*;
    pub use super::kalman::*;
    pub use super::msr::*;
    pub use super::process::*;
    pub use super::simulator::*;
    pub use super::smoother::*;
    pub use super::tdoa::*;
    pub use crate::io::{Configurable, ConfigRepr, PipelineConfig};
    pub use crate::time::{Duration, Epoch, TimeUnits, Unit};
}
