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


use super::ground_station::GroundStation;
use crate::cosmic::{Orbit, TimeTagged};
use crate::linalg::{RowVector6, Vector3};
use crate::time::Epoch;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TrackError {
    #[snafu(display("a track requires at least one observation"))]
    EmptyTrack,
    #[snafu(display("observation #{index} at {epoch} does not strictly follow the previous one at {prev}"))]
    NotStrictlyIncreasing {
        index: usize,
        prev: Epoch,
        epoch: Epoch,
    },
    #[snafu(display("track #{index} refers to station #{station} but only {num_stations} stations are defined"))]
    StationIndex {
        index: usize,
        station: usize,
        num_stations: usize,
    },
    #[snafu(display("TDoA observation #{index} has {got} values but {expected} are expected"))]
    TdoaShape {
        index: usize,
        expected: usize,
        got: usize,
    },
    #[snafu(display("a tracking arc of {kind} requires at least {min} stations, got {got}"))]
    TooFewStations {
        kind: &'static str,
        min: usize,
        got: usize,
    },
}

/// A position of the object (km) in the inertial frame at a given epoch, e.g. from a radar track.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PositionFix {
    pub epoch: Epoch,
    pub position_km: Vector3<f64>,
}

impl PositionFix {
    pub fn new(epoch: Epoch, x_km: f64, y_km: f64, z_km: f64) -> Self {
        Self {
            epoch,
            position_km: Vector3::new(x_km, y_km, z_km),
        }
    }
}

impl From<&Orbit> for PositionFix {
    fn from(orbit: &Orbit) -> Self {
        Self {
            epoch: orbit.epoch,
            position_km: orbit.radius(),
        }
    }
}

/// A simultaneous range and Doppler measurement in units of km and km/s from the station at the provided index of the arc.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RangeDoppler {
    pub epoch: Epoch,
    pub station: usize,
    pub range_km: f64,
    pub range_rate_km_s: f64,
}

/// Time of flight of the signal to the reference station (first station of the arc), and the arrival time differences
/// of each other station with respect to the reference station, all in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct TdoaObservation {
    pub epoch: Epoch,
    pub tof_s: f64,
    pub tdoa_s: Vec<f64>,
}

impl TimeTagged for PositionFix {
    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.epoch = epoch
    }
}

impl TimeTagged for RangeDoppler {
    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.epoch = epoch
    }
}

impl TimeTagged for TdoaObservation {
    fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        self.epoch = epoch
    }
}

/// A time ordered sequence of observations, with strictly increasing epochs.
#[derive(Clone, Debug, PartialEq)]
pub struct Track<T: TimeTagged> {
    observations: Vec<T>,
}

impl<T: TimeTagged> Track<T> {
    /// Builds a new track, ensuring that it is not empty and that its epochs are strictly increasing.
    pub fn new(observations: Vec<T>) -> Result<Self, TrackError> {
        ensure!(!observations.is_empty(), EmptyTrackSnafu);
        for (index, pair) in observations.windows(2).enumerate() {
            ensure!(
                pair[1].epoch() > pair[0].epoch(),
                NotStrictlyIncreasingSnafu {
                    index: index + 1,
                    prev: pair[0].epoch(),
                    epoch: pair[1].epoch(),
                }
            );
        }
        Ok(Self { observations })
    }

    /// Builds a track from observations known to be non empty and strictly increasing in time
    pub(crate) fn from_validated(observations: Vec<T>) -> Self {
        Self { observations }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Always false: tracks cannot be empty.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[T] {
        &self.observations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.observations.iter()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.observations.get(index)
    }

    pub fn epochs(&self) -> Vec<Epoch> {
        self.observations.iter().map(|o| o.epoch()).collect()
    }

    pub fn start_epoch(&self) -> Epoch {
        self.observations[0].epoch()
    }

    pub fn end_epoch(&self) -> Epoch {
        self.observations[self.observations.len() - 1].epoch()
    }

    /// Elapsed time in seconds of each observation since the start of the track
    pub fn elapsed_s(&self) -> Vec<f64> {
        let start = self.start_epoch();
        self.observations
            .iter()
            .map(|o| (o.epoch() - start).to_seconds())
            .collect()
    }

    pub fn into_inner(self) -> Vec<T> {
        self.observations
    }
}

impl Track<PositionFix> {
    /// Builds a position track from a trajectory
    pub fn from_orbits(orbits: &[Orbit]) -> Result<Self, TrackError> {
        Self::new(orbits.iter().map(PositionFix::from).collect())
    }

    pub fn positions(&self) -> Vec<Vector3<f64>> {
        self.observations.iter().map(|o| o.position_km).collect()
    }
}

impl<T: TimeTagged> fmt::Display for Track<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Track of {} observations from {} to {}",
            self.len(),
            self.start_epoch(),
            self.end_epoch()
        )
    }
}

/// An observation of a tracking arc.
#[derive(Clone, Debug, PartialEq)]
pub enum ArcObservation {
    Position(PositionFix),
    RangeDoppler(RangeDoppler),
    Tdoa(TdoaObservation),
}

impl TimeTagged for ArcObservation {
    fn epoch(&self) -> Epoch {
        match self {
            Self::Position(o) => o.epoch,
            Self::RangeDoppler(o) => o.epoch,
            Self::Tdoa(o) => o.epoch,
        }
    }

    fn set_epoch(&mut self, epoch: Epoch) {
        match self {
            Self::Position(o) => o.epoch = epoch,
            Self::RangeDoppler(o) => o.epoch = epoch,
            Self::Tdoa(o) => o.epoch = epoch,
        }
    }
}

/// A tracking arc: the station table and the epoch sorted observations of all of these stations.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackingArc {
    pub stations: Vec<GroundStation>,
    observations: Vec<ArcObservation>,
}

impl TrackingArc {
    /// Builds an arc from position fixes, which do not depend on any station.
    pub fn from_positions(track: Track<PositionFix>) -> Self {
        Self {
            stations: Vec::new(),
            observations: track
                .into_inner()
                .into_iter()
                .map(ArcObservation::Position)
                .collect(),
        }
    }

    /// Merges the range and Doppler tracks (typically one per station) into a single arc sorted by epoch.
    pub fn from_range_doppler(
        stations: Vec<GroundStation>,
        tracks: Vec<Track<RangeDoppler>>,
    ) -> Result<Self, TrackError> {
        ensure!(
            !stations.is_empty(),
            TooFewStationsSnafu {
                kind: "range and Doppler",
                min: 1_usize,
                got: 0_usize,
            }
        );
        let mut observations = Vec::new();
        for (index, track) in tracks.into_iter().enumerate() {
            for msr in track.into_inner() {
                ensure!(
                    msr.station < stations.len(),
                    StationIndexSnafu {
                        index,
                        station: msr.station,
                        num_stations: stations.len(),
                    }
                );
                observations.push(ArcObservation::RangeDoppler(msr));
            }
        }
        // Stable sort: simultaneous measurements keep the order of their tracks
        observations.sort_by(|a, b| {
            a.epoch()
                .partial_cmp(&b.epoch())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(Self {
            stations,
            observations,
        })
    }

    /// Builds a TDoA arc: the first station is the reference, and each observation must hold one TDoA per other station.
    pub fn from_tdoa(
        stations: Vec<GroundStation>,
        track: Track<TdoaObservation>,
    ) -> Result<Self, TrackError> {
        ensure!(
            stations.len() >= 2,
            TooFewStationsSnafu {
                kind: "TDoA",
                min: 2_usize,
                got: stations.len(),
            }
        );
        for (index, msr) in track.iter().enumerate() {
            ensure!(
                msr.tdoa_s.len() == stations.len() - 1,
                TdoaShapeSnafu {
                    index,
                    expected: stations.len() - 1,
                    got: msr.tdoa_s.len(),
                }
            );
        }
        Ok(Self {
            stations,
            observations: track
                .into_inner()
                .into_iter()
                .map(ArcObservation::Tdoa)
                .collect(),
        })
    }

    pub fn observations(&self) -> &[ArcObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Returns the unique epochs of this arc, in increasing order
    pub fn epochs(&self) -> Vec<Epoch> {
        let mut epochs: Vec<Epoch> = self.observations.iter().map(|o| o.epoch()).collect();
        epochs.dedup();
        epochs
    }

    /// Returns the TDoA observations of this arc
    pub fn tdoa_observations(&self) -> Vec<&TdoaObservation> {
        self.observations
            .iter()
            .filter_map(|o| match o {
                ArcObservation::Tdoa(msr) => Some(msr),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for TrackingArc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.observations.first(), self.observations.last()) {
            (Some(first), Some(last)) => write!(
                f,
                "Tracking arc of {} observations from {} stations ({} to {})",
                self.len(),
                self.stations.len(),
                first.epoch(),
                last.epoch()
            ),
            _ => write!(f, "Empty tracking arc"),
        }
    }
}

/// One scalar row of a measurement model: the observed and computed values, the sensitivity
/// of the computed value to the Cartesian state (H tilde) and the one sigma noise of the observation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MsrRow {
    pub observed: f64,
    pub computed: f64,
    pub sensitivity: RowVector6<f64>,
    pub sigma: f64,
}

impl MsrRow {
    /// Observed minus computed
    pub fn residual(&self) -> f64 {
        self.observed - self.computed
    }
}

/// One sigma noise of each observation kind, used to weigh the measurement rows.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementNoise {
    #[serde(default = "MeasurementNoise::default_position")]
    pub position_km: f64,
    #[serde(default = "MeasurementNoise::default_range")]
    pub range_km: f64,
    #[serde(default = "MeasurementNoise::default_range_rate")]
    pub range_rate_km_s: f64,
    #[serde(default = "MeasurementNoise::default_timing")]
    pub timing_s: f64,
}

impl MeasurementNoise {
    fn default_position() -> f64 {
        0.1
    }
    fn default_range() -> f64 {
        1e-3
    }
    fn default_range_rate() -> f64 {
        1e-6
    }
    fn default_timing() -> f64 {
        1e-8
    }
}

impl Default for MeasurementNoise {
    fn default() -> Self {
        Self {
            position_km: Self::default_position(),
            range_km: Self::default_range(),
            range_rate_km_s: Self::default_range_rate(),
            timing_s: Self::default_timing(),
        }
    }
}
