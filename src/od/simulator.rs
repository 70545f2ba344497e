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


use super::ground_station::{GroundStation, StationError};
use super::msr::{
    MeasurementNoise, PositionFix, RangeDoppler, TdoaObservation, Track, TrackError, TrackingArc,
};
use super::tdoa::{tdoa_from_position, TdoaError};
use crate::cosmic::{Orbit, SPEED_OF_LIGHT_KM_S};
use crate::linalg::Vector3;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64Mcg;
use snafu::prelude::*;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SimulatorError {
    #[snafu(display("{kind} noise must be finite and non negative, got {sigma}"))]
    InvalidNoise { kind: &'static str, sigma: f64 },
    #[snafu(display("simulation failed: {source}"))]
    SimStation { source: StationError },
    #[snafu(display("simulation failed: {source}"))]
    SimTdoa { source: TdoaError },
    #[snafu(display("simulated data is invalid: {source}"))]
    SimTrack { source: TrackError },
}

/// Generates noisy synthetic tracking data from a truth trajectory.
///
/// The noise is drawn from a seeded generator, so two simulators built with the same seed produce the same data.
#[derive(Clone, Debug)]
pub struct TrackingSimulator {
    pub noise: MeasurementNoise,
    /// Range and Doppler are only generated when the object is at least this high above the station's horizon
    pub elevation_mask_deg: Option<f64>,
    pub signal_speed_km_s: f64,
    /// The Pcg64Mcg is chosen because it is fast, space efficient, and has a good statistical distribution.
    rng: Pcg64Mcg,
}

impl TrackingSimulator {
    pub fn new(noise: MeasurementNoise, seed: u64) -> Self {
        Self {
            noise,
            elevation_mask_deg: None,
            signal_speed_km_s: SPEED_OF_LIGHT_KM_S,
            rng: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    pub fn with_elevation_mask(mut self, elevation_mask_deg: f64) -> Self {
        self.elevation_mask_deg = Some(elevation_mask_deg);
        self
    }

    fn normal(kind: &'static str, sigma: f64) -> Result<Normal<f64>, SimulatorError> {
        ensure!(
            sigma.is_finite() && sigma >= 0.0,
            InvalidNoiseSnafu { kind, sigma }
        );
        Normal::new(0.0, sigma).ok().context(InvalidNoiseSnafu { kind, sigma })
    }

    /// Returns the positions of the trajectory with a Gaussian noise on each axis.
    pub fn position_track(&mut self, truth: &[Orbit]) -> Result<Track<PositionFix>, SimulatorError> {
        let dist = Self::normal("position", self.noise.position_km)?;
        let fixes = truth
            .iter()
            .map(|state| {
                let noise = Vector3::from_fn(|_, _| dist.sample(&mut self.rng));
                PositionFix {
                    epoch: state.epoch,
                    position_km: state.radius() + noise,
                }
            })
            .collect();
        Track::new(fixes).context(SimTrackSnafu)
    }

    /// Returns one range and Doppler track per station which sees the object at least once.
    pub fn range_doppler(
        &mut self,
        stations: &[GroundStation],
        truth: &[Orbit],
    ) -> Result<Vec<Track<RangeDoppler>>, SimulatorError> {
        let range_dist = Self::normal("range", self.noise.range_km)?;
        let range_rate_dist = Self::normal("range rate", self.noise.range_rate_km_s)?;

        let mut tracks = Vec::with_capacity(stations.len());
        for (station_idx, station) in stations.iter().enumerate() {
            let mut msrs = Vec::new();
            for state in truth {
                if let Some(mask_deg) = self.elevation_mask_deg {
                    if station.elevation_deg(state).context(SimStationSnafu)? < mask_deg {
                        continue;
                    }
                }
                let (range_km, range_rate_km_s) =
                    station.range_doppler(state).context(SimStationSnafu)?;
                msrs.push(RangeDoppler {
                    epoch: state.epoch,
                    station: station_idx,
                    range_km: range_km + range_dist.sample(&mut self.rng),
                    range_rate_km_s: range_rate_km_s + range_rate_dist.sample(&mut self.rng),
                });
            }
            if msrs.is_empty() {
                warn!("{station} never sees the object above the elevation mask");
                continue;
            }
            debug!("{station} generated {} measurements", msrs.len());
            tracks.push(Track::new(msrs).context(SimTrackSnafu)?);
        }
        Ok(tracks)
    }

    /// Returns the time of flight to the first station and the TDoA of each other station, with a Gaussian timing noise.
    pub fn tdoa(
        &mut self,
        stations: &[GroundStation],
        truth: &[Orbit],
    ) -> Result<Track<TdoaObservation>, SimulatorError> {
        let dist = Self::normal("timing", self.noise.timing_s)?;
        let mut msrs = Vec::with_capacity(truth.len());
        for state in truth {
            let stations_km = stations
                .iter()
                .map(|station| station.position_km(state.epoch))
                .collect::<Result<Vec<_>, _>>()
                .context(SimStationSnafu)?;
            let (tof_s, tdoa_s) =
                tdoa_from_position(&state.radius(), &stations_km, self.signal_speed_km_s)
                    .context(SimTdoaSnafu)?;
            msrs.push(TdoaObservation {
                epoch: state.epoch,
                tof_s: tof_s + dist.sample(&mut self.rng),
                tdoa_s: tdoa_s
                    .into_iter()
                    .map(|dt| dt + dist.sample(&mut self.rng))
                    .collect(),
            });
        }
        Track::new(msrs).context(SimTrackSnafu)
    }

    /// Simulates the range and Doppler tracks and merges them into a tracking arc.
    pub fn range_doppler_arc(
        &mut self,
        stations: Vec<GroundStation>,
        truth: &[Orbit],
    ) -> Result<TrackingArc, SimulatorError> {
        let tracks = self.range_doppler(&stations, truth)?;
        TrackingArc::from_range_doppler(stations, tracks).context(SimTrackSnafu)
    }

    /// Simulates the TDoA track and builds the tracking arc, the first station is the reference.
    pub fn tdoa_arc(
        &mut self,
        stations: Vec<GroundStation>,
        truth: &[Orbit],
    ) -> Result<TrackingArc, SimulatorError> {
        let track = self.tdoa(&stations, truth)?;
        TrackingArc::from_tdoa(stations, track).context(SimTrackSnafu)
    }
}
