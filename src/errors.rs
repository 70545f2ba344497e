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


use crate::cosmic::AstroError;
use crate::io::ConfigError;
use crate::mc::DispersionError;
use crate::od::blse::BatchError;
use crate::od::ground_station::StationError;
use crate::od::kalman::FilterError;
use crate::od::msr::TrackError;
use crate::od::simulator::SimulatorError;
use crate::od::smoother::SmoothingError;
use crate::od::tdoa::TdoaError;
use crate::propagators::PropagationError;
use crate::tools::herrick_gibbs::IodError;
use crate::tools::lambert::LambertError;
use snafu::prelude::*;

/// Aggregate of the errors of each step of the orbit determination pipelines.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum OdError {
    #[snafu(display("smoothing failed: {source}"))]
    Smoothing { source: SmoothingError },
    #[snafu(display("propagation failed: {source}"))]
    Propagation { source: PropagationError },
    #[snafu(display("Lambert initial orbit determination failed: {source}"))]
    Lambert { source: LambertError },
    #[snafu(display("initial orbit determination failed: {source}"))]
    Iod { source: IodError },
    #[snafu(display("filter failed: {source}"))]
    Filter { source: FilterError },
    #[snafu(display("multilateration failed: {source}"))]
    Tdoa { source: TdoaError },
    #[snafu(display("batch estimation failed: {source}"))]
    Batch { source: BatchError },
    #[snafu(display("{source}"))]
    Astro { source: AstroError },
    #[snafu(display("invalid tracking data: {source}"))]
    Track { source: TrackError },
    #[snafu(display("station error: {source}"))]
    Station { source: StationError },
    #[snafu(display("configuration error: {source}"))]
    Config { source: ConfigError },
    #[snafu(display("candidate dispersion failed: {source}"))]
    Dispersion { source: DispersionError },
    #[snafu(display("tracking simulation failed: {source}"))]
    Simulation { source: SimulatorError },
}

impl From<SmoothingError> for OdError {
    fn from(source: SmoothingError) -> Self {
        Self::Smoothing { source }
    }
}

impl From<PropagationError> for OdError {
    fn from(source: PropagationError) -> Self {
        Self::Propagation { source }
    }
}

impl From<LambertError> for OdError {
    fn from(source: LambertError) -> Self {
        Self::Lambert { source }
    }
}

impl From<IodError> for OdError {
    fn from(source: IodError) -> Self {
        Self::Iod { source }
    }
}

impl From<FilterError> for OdError {
    fn from(source: FilterError) -> Self {
        Self::Filter { source }
    }
}

impl From<TdoaError> for OdError {
    fn from(source: TdoaError) -> Self {
        Self::Tdoa { source }
    }
}

impl From<AstroError> for OdError {
    fn from(source: AstroError) -> Self {
        Self::Astro { source }
    }
}

impl From<TrackError> for OdError {
    fn from(source: TrackError) -> Self {
        Self::Track { source }
    }
}

impl From<StationError> for OdError {
    fn from(source: StationError) -> Self {
        Self::Station { source }
    }
}

impl From<BatchError> for OdError {
    fn from(source: BatchError) -> Self {
        Self::Batch { source }
    }
}

impl From<ConfigError> for OdError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<DispersionError> for OdError {
    fn from(source: DispersionError) -> Self {
        Self::Dispersion { source }
    }
}

impl From<SimulatorError> for OdError {
    fn from(source: SimulatorError) -> Self {
        Self::Simulation { source }
    }
}
