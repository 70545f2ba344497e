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


use super::ground_station::StationError;
use super::msr::{MsrRow, PositionFix, TdoaObservation, Track, TrackError, TrackingArc};
use crate::cosmic::{Orbit, TimeTagged, SPEED_OF_LIGHT_KM_S};
use crate::io::{ConfigError, Configurable, InvalidConfigSnafu, TdoaConfig};
use crate::linalg::{Const, DVector, Dyn, Matrix3, OMatrix, RowVector3, RowVector6, Vector3};
use crate::time::Epoch;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use typed_builder::TypedBuilder;

/// Minimum number of distinct stations to solve for a position from TDoA
pub const MIN_TDOA_STATIONS: usize = 4;
/// Stations closer than this are considered to be the same station
const DISTINCT_STATIONS_KM: f64 = 1e-6;
const MAX_DAMPING: f64 = 1e12;

type TdoaJacobian = OMatrix<f64, Dyn, Const<3>>;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TdoaError {
    #[snafu(display("TDoA requires at least {min} distinct stations, got {got}"))]
    UnderdeterminedGeometry { min: usize, got: usize },
    #[snafu(display("TDoA at {epoch} has {got} time differences but {expected} are expected"))]
    ShapeMismatch {
        epoch: Epoch,
        expected: usize,
        got: usize,
    },
    #[snafu(display(
        "multilateration at {epoch} did not converge within {iterations} iterations (RMS of {rms_km:.3e} km)"
    ))]
    MultilaterationNoConvergence {
        epoch: Epoch,
        iterations: usize,
        rms_km: f64,
    },
    #[snafu(display("station position unavailable: {source}"))]
    TdoaStation { source: StationError },
}

/// Position solved from a single TDoA observation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TdoaFix {
    pub epoch: Epoch,
    pub position_km: Vector3<f64>,
    /// RMS of the range equivalent residuals of the solution
    pub rms_km: f64,
    pub iterations: usize,
}

impl From<&TdoaFix> for PositionFix {
    fn from(fix: &TdoaFix) -> Self {
        Self {
            epoch: fix.epoch,
            position_km: fix.position_km,
        }
    }
}

/// Outcome of the multilateration of one epoch of an arc.
#[derive(Debug, PartialEq)]
pub enum Multilateration {
    Resolved(TdoaFix),
    Unresolved { epoch: Epoch, error: TdoaError },
}

impl Multilateration {
    pub fn epoch(&self) -> Epoch {
        match self {
            Self::Resolved(fix) => fix.epoch,
            Self::Unresolved { epoch, .. } => *epoch,
        }
    }

    pub fn fix(&self) -> Option<&TdoaFix> {
        match self {
            Self::Resolved(fix) => Some(fix),
            Self::Unresolved { .. } => None,
        }
    }
}

/// Builds the track of the resolved positions, skipping the unresolved epochs.
pub fn resolved_track(results: &[Multilateration]) -> Result<Track<PositionFix>, TrackError> {
    Track::new(
        results
            .iter()
            .filter_map(|r| r.fix().map(PositionFix::from))
            .collect(),
    )
}

/// Range equivalents of the TDoA observables from the provided position: the range to the reference (first) station,
/// followed by the range difference of each other station with the reference station. Also returns their gradients.
fn range_equivalents(
    position_km: &Vector3<f64>,
    stations_km: &[Vector3<f64>],
) -> (Vec<f64>, Vec<RowVector3<f64>>) {
    let mut values = Vec::with_capacity(stations_km.len());
    let mut gradients = Vec::with_capacity(stations_km.len());
    let (ref_station, others) = match stations_km.split_first() {
        Some(split) => split,
        None => return (values, gradients),
    };
    let ref_rho = position_km - ref_station;
    let ref_range = ref_rho.norm();
    let ref_unit = (ref_rho / ref_range).transpose();
    values.push(ref_range);
    gradients.push(ref_unit);
    for station in others {
        let rho = position_km - station;
        let range = rho.norm();
        values.push(range - ref_range);
        gradients.push((rho / range).transpose() - ref_unit);
    }
    (values, gradients)
}

/// Computes the time of flight to the reference (first) station, and the TDoA of each other station, all in seconds.
pub fn tdoa_from_position(
    position_km: &Vector3<f64>,
    stations_km: &[Vector3<f64>],
    signal_speed_km_s: f64,
) -> Result<(f64, Vec<f64>), TdoaError> {
    ensure!(
        !stations_km.is_empty(),
        UnderdeterminedGeometrySnafu { min: 1_usize, got: 0_usize }
    );
    let (values, _) = range_equivalents(position_km, stations_km);
    Ok((
        values[0] / signal_speed_km_s,
        values[1..].iter().map(|v| v / signal_speed_km_s).collect(),
    ))
}

/// Returns the measurement rows of a TDoA observation of the provided state, expressed as range equivalents (km).
/// The sensitivity is that of each row to the Cartesian state.
pub fn tdoa_rows(
    state: &Orbit,
    stations_km: &[Vector3<f64>],
    msr: &TdoaObservation,
    signal_speed_km_s: f64,
    timing_sigma_s: f64,
) -> Result<Vec<MsrRow>, TdoaError> {
    ensure_shape(msr, stations_km.len())?;
    let (values, gradients) = range_equivalents(&state.radius(), stations_km);
    let observed = std::iter::once(msr.tof_s).chain(msr.tdoa_s.iter().copied());
    Ok(values
        .iter()
        .zip(gradients.iter())
        .zip(observed)
        .map(|((computed, gradient), obs_s)| {
            let mut sensitivity = RowVector6::zeros();
            sensitivity.fixed_columns_mut::<3>(0).copy_from(gradient);
            MsrRow {
                observed: obs_s * signal_speed_km_s,
                computed: *computed,
                sensitivity,
                sigma: timing_sigma_s * signal_speed_km_s,
            }
        })
        .collect())
}

fn ensure_shape(msr: &TdoaObservation, num_stations: usize) -> Result<(), TdoaError> {
    ensure!(
        msr.tdoa_s.len() + 1 == num_stations,
        ShapeMismatchSnafu {
            epoch: msr.epoch,
            expected: num_stations.saturating_sub(1),
            got: msr.tdoa_s.len()
        }
    );
    Ok(())
}

/// Number of stations which are not co-located with a previous station of the list
fn distinct_stations(stations_km: &[Vector3<f64>]) -> usize {
    stations_km
        .iter()
        .enumerate()
        .filter(|(i, s)| {
            stations_km[..*i]
                .iter()
                .all(|prev| (*s - prev).norm() > DISTINCT_STATIONS_KM)
        })
        .count()
}

/// Solves for the position of a transmitter from the time differences of arrival at several stations,
/// with a Levenberg-Marquardt least squares on the range equivalent residuals.
#[derive(Copy, Clone, Debug, PartialEq, TypedBuilder, Serialize, Deserialize)]
#[builder(doc)]
pub struct Multilaterator {
    #[builder(default = 50)]
    pub max_iterations: usize,
    /// Convergence is declared when the correction norm falls below this value
    #[builder(default = 1e-6)]
    pub step_tolerance_km: f64,
    /// The converged solution is rejected if its residual RMS is above this value
    #[builder(default = 0.1)]
    pub residual_tolerance_km: f64,
    #[builder(default = SPEED_OF_LIGHT_KM_S)]
    pub signal_speed_km_s: f64,
    #[builder(default = 1e-3)]
    pub initial_damping: f64,
}

impl Default for Multilaterator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Multilaterator {
    /// Solves for the position at the epoch of this observation, given the station positions at that epoch (reference station first).
    ///
    /// Without a seed, the search starts above the mean station position, lifted along its local vertical by the reference range.
    pub fn solve(
        &self,
        msr: &TdoaObservation,
        stations_km: &[Vector3<f64>],
        seed: Option<Vector3<f64>>,
    ) -> Result<TdoaFix, TdoaError> {
        let distinct = distinct_stations(stations_km);
        ensure!(
            distinct >= MIN_TDOA_STATIONS,
            UnderdeterminedGeometrySnafu {
                min: MIN_TDOA_STATIONS,
                got: distinct
            }
        );
        ensure_shape(msr, stations_km.len())?;

        let observed: Vec<f64> = std::iter::once(msr.tof_s)
            .chain(msr.tdoa_s.iter().copied())
            .map(|t| t * self.signal_speed_km_s)
            .collect();

        let residuals = |x: &Vector3<f64>| -> (DVector<f64>, TdoaJacobian) {
            let (values, gradients) = range_equivalents(x, stations_km);
            let res = DVector::from_iterator(
                values.len(),
                observed.iter().zip(values.iter()).map(|(o, c)| o - c),
            );
            let jac = TdoaJacobian::from_rows(&gradients);
            (res, jac)
        };

        let mut x = seed.unwrap_or_else(|| {
            let mean = stations_km.iter().sum::<Vector3<f64>>() / stations_km.len() as f64;
            let up = mean.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::z);
            mean + up * observed[0]
        });
        let (mut res, mut jac) = residuals(&x);
        let mut cost = res.norm_squared();
        let mut damping = self.initial_damping;
        let rms = |cost: f64| (cost / observed.len() as f64).sqrt();

        for iteration in 1..=self.max_iterations {
            let jtj: Matrix3<f64> = jac.transpose() * &jac;
            let jtr: Vector3<f64> = jac.transpose() * &res;

            let mut damped = jtj;
            for i in 0..3 {
                damped[(i, i)] += damping * jtj[(i, i)].max(f64::EPSILON);
            }
            let step = match damped.cholesky() {
                Some(chol) => chol.solve(&jtr),
                None => {
                    damping *= 10.0;
                    continue;
                }
            };

            let candidate = x + step;
            let (cand_res, cand_jac) = residuals(&candidate);
            let cand_cost = cand_res.norm_squared();
            if cand_cost.is_finite() && cand_cost <= cost {
                x = candidate;
                res = cand_res;
                jac = cand_jac;
                cost = cand_cost;
                damping = (damping / 10.0).max(f64::EPSILON);
            } else {
                damping *= 10.0;
            }

            if step.norm() < self.step_tolerance_km || damping > MAX_DAMPING {
                ensure!(
                    rms(cost) <= self.residual_tolerance_km,
                    MultilaterationNoConvergenceSnafu {
                        epoch: msr.epoch,
                        iterations: iteration,
                        rms_km: rms(cost)
                    }
                );
                return Ok(TdoaFix {
                    epoch: msr.epoch,
                    position_km: x,
                    rms_km: rms(cost),
                    iterations: iteration,
                });
            }
        }

        MultilaterationNoConvergenceSnafu {
            epoch: msr.epoch,
            iterations: self.max_iterations,
            rms_km: rms(cost),
        }
        .fail()
    }

    /// Multilaterates every TDoA observation of the arc, seeding each epoch with the previous solution.
    ///
    /// Epochs which cannot be solved are reported as unresolved, the arc itself only fails if it has too few stations.
    pub fn multilaterate_arc(&self, arc: &TrackingArc) -> Result<Vec<Multilateration>, TdoaError> {
        ensure!(
            arc.stations.len() >= MIN_TDOA_STATIONS,
            UnderdeterminedGeometrySnafu {
                min: MIN_TDOA_STATIONS,
                got: arc.stations.len()
            }
        );

        let mut seed = None;
        let mut results = Vec::with_capacity(arc.len());
        for msr in arc.tdoa_observations() {
            let outcome = arc
                .stations
                .iter()
                .map(|station| station.position_km(msr.epoch()))
                .collect::<Result<Vec<_>, _>>()
                .context(TdoaStationSnafu)
                .and_then(|stations_km| self.solve(msr, &stations_km, seed));

            match outcome {
                Ok(fix) => {
                    seed = Some(fix.position_km);
                    results.push(Multilateration::Resolved(fix));
                }
                Err(error) => {
                    warn!("unresolved TDoA epoch: {error}");
                    results.push(Multilateration::Unresolved {
                        epoch: msr.epoch,
                        error,
                    });
                }
            }
        }

        let resolved = results.iter().filter(|r| r.fix().is_some()).count();
        info!(
            "Multilaterated {resolved} of {} TDoA epochs",
            results.len()
        );
        Ok(results)
    }
}

impl Configurable for Multilaterator {
    type IntermediateRepr = TdoaConfig;

    fn from_config(cfg: &TdoaConfig) -> Result<Self, ConfigError> {
        ensure!(
            cfg.signal_speed_km_s > 0.0 && cfg.max_iterations > 0,
            InvalidConfigSnafu {
                msg: "multilateration requires a positive signal speed and at least one iteration"
            }
        );
        Ok(Self {
            max_iterations: cfg.max_iterations,
            step_tolerance_km: cfg.step_tolerance_km,
            residual_tolerance_km: cfg.residual_tolerance_km,
            signal_speed_km_s: cfg.signal_speed_km_s,
            initial_damping: cfg.initial_damping,
        })
    }
}

#[cfg(test)]
mod ut_tdoa {
    use super::*;
    use crate::cosmic::EARTH_J2000;
    use crate::od::ground_station::GroundStation;

    fn epoch() -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(2022, 9, 1)
    }

    fn stations() -> Vec<GroundStation> {
        [
            (42.5, 0.5),
            (40.0, -3.0),
            (44.0, -2.0),
            (41.0, 4.0),
            (45.0, 3.0),
        ]
        .iter()
        .enumerate()
        .map(|(i, (lat, long))| {
            GroundStation::from_point(&format!("gs{i}"), *lat, *long, 0.2, EARTH_J2000, epoch())
        })
        .collect()
    }

    fn positions(stations: &[GroundStation]) -> Vec<Vector3<f64>> {
        stations
            .iter()
            .map(|s| s.position_km(epoch()).unwrap())
            .collect()
    }

    fn satellite() -> Vector3<f64> {
        let (lat, long) = (43.0_f64.to_radians(), 1.0_f64.to_radians());
        7078.0 * Vector3::new(lat.cos() * long.cos(), lat.cos() * long.sin(), lat.sin())
    }

    fn observation(stations_km: &[Vector3<f64>]) -> TdoaObservation {
        let (tof_s, tdoa_s) =
            tdoa_from_position(&satellite(), stations_km, SPEED_OF_LIGHT_KM_S).unwrap();
        TdoaObservation {
            epoch: epoch(),
            tof_s,
            tdoa_s,
        }
    }

    #[test]
    fn noiseless_recovery() {
        let stations_km = positions(&stations());
        let msr = observation(&stations_km);
        let fix = Multilaterator::default()
            .solve(&msr, &stations_km, None)
            .unwrap();
        let err = (fix.position_km - satellite()).norm();
        assert!(err < 1e-3, "position error of {err} km");
        assert!(fix.rms_km < 1e-6);

        // Only four stations are needed
        let msr = observation(&stations_km[..4]);
        let fix = Multilaterator::default()
            .solve(&msr, &stations_km[..4], None)
            .unwrap();
        assert!((fix.position_km - satellite()).norm() < 1e-3);
    }

    #[test]
    fn geometry_validation() {
        let stations_km = positions(&stations());
        let msr = observation(&stations_km[..3]);
        assert_eq!(
            Multilaterator::default().solve(&msr, &stations_km[..3], None),
            Err(TdoaError::UnderdeterminedGeometry { min: 4, got: 3 })
        );

        // Duplicated station does not count
        let mut dup = stations_km[..3].to_vec();
        dup.push(stations_km[0]);
        let msr = observation(&dup);
        assert!(matches!(
            Multilaterator::default().solve(&msr, &dup, None),
            Err(TdoaError::UnderdeterminedGeometry { got: 3, .. })
        ));

        let mut msr = observation(&stations_km);
        msr.tdoa_s.pop();
        assert!(matches!(
            Multilaterator::default().solve(&msr, &stations_km, None),
            Err(TdoaError::ShapeMismatch {
                expected: 4,
                got: 3,
                ..
            })
        ));
    }

    #[test]
    fn iteration_cap() {
        let stations_km = positions(&stations());
        let msr = observation(&stations_km);
        let solver = Multilaterator::builder().max_iterations(1).build();
        assert!(matches!(
            solver.solve(&msr, &stations_km, None),
            Err(TdoaError::MultilaterationNoConvergence { iterations: 1, .. })
        ));
    }

    #[test]
    fn arc_reports_unresolved_epochs() {
        let stations = stations();
        let stations_km = positions(&stations);
        let good = observation(&stations_km);
        // Time differences beyond the station baselines cannot be fit
        let bad = TdoaObservation {
            epoch: epoch() + crate::time::Unit::Second,
            tof_s: good.tof_s,
            tdoa_s: vec![0.05; 4],
        };
        let arc = TrackingArc::from_tdoa(stations, Track::new(vec![good, bad]).unwrap()).unwrap();
        let results = Multilaterator::default().multilaterate_arc(&arc).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].fix().is_some());
        assert!(matches!(results[1], Multilateration::Unresolved { .. }));
        assert_eq!(resolved_track(&results).unwrap().len(), 1);
    }
}
