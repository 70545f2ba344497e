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


/*! # orbit-determinator

Orbit estimation from ground tracking data: smoothing of raw position tracks, initial orbit determination
(Lambert, Herrick-Gibbs), a Keplerian Kalman filter, TDoA multilateration and an ensemble batch least squares
estimator built on an adaptive Runge Kutta Fehlberg propagator with state transition matrix.
*/

// The dispersion constructors are named after σ
#![allow(mixed_script_confusables)]

/// Provides all the propagators / integrators available in `orbit_determinator`.
pub mod propagators;

/// Provides the dynamics used for orbital mechanics (two body, J2, drag), which can be combined.
pub mod dynamics;

/// Provides the frame, orbit and Keplerian element definitions.
pub mod cosmic;

/// Utility functions shared by different modules, and which may be useful to engineers.
pub mod utils;

mod errors;
/// Functions which may fail will return an error, aggregated in `OdError` for the pipelines.
pub use self::errors::OdError;

/// Configuration loading.
pub mod io;

/// All the orbit determination tools and functions.
pub mod od;

/// Simple tools (e.g. Lambert solver, Herrick-Gibbs)
pub mod tools;

/// Monte Carlo module, used to disperse the candidates of the batch estimator
pub mod mc;

/// Polynomial and fitting module
pub mod polyfit;

#[macro_use]
extern crate log;
extern crate hifitime;
extern crate nalgebra as na;

/// Re-export of hifitime
pub mod time {
    pub use hifitime::*;
}

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

/// Re-export some useful things
pub use self::cosmic::{KeplerianElements, Orbit, TimeTagged};
