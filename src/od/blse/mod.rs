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
use super::msr::{ArcObservation, MeasurementNoise, MsrRow, TrackingArc};
use super::tdoa::{tdoa_rows, TdoaError};
use crate::cosmic::{AstroError, Orbit, TimeTagged, SPEED_OF_LIGHT_KM_S};
use crate::dynamics::Dynamics;
use crate::io::{BatchConfig, ConfigError, Configurable, InvalidConfigSnafu};
use crate::linalg::{Matrix6, RowVector6, Vector6};
use crate::propagators::{ErrorCtrl, PropagationError, Propagator};
use crate::time::Epoch;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use typed_builder::TypedBuilder;

mod ensemble;
pub use ensemble::{
    BatchEnsemble, BatchSample, EnsembleSummary, DEFAULT_ACCEPTANCE_THRESHOLD_KM,
};

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BatchError {
    #[snafu(display("propagation failed in iteration {iteration}: {source}"))]
    BatchPropagation {
        iteration: usize,
        source: PropagationError,
    },
    #[snafu(display("measurement at {epoch} could not be computed: {source}"))]
    BatchStation { epoch: Epoch, source: StationError },
    #[snafu(display("TDoA measurement could not be computed: {source}"))]
    BatchTdoa { source: TdoaError },
    #[snafu(display("too few measurement rows ({count}) to estimate a state"))]
    TooFewMeasurements { count: usize },
    #[snafu(display("information matrix is singular in iteration {iteration}"))]
    SingularInformation { iteration: usize },
    #[snafu(display("state correction is not finite in iteration {iteration}"))]
    NonFiniteCorrection { iteration: usize },
    #[snafu(display(
        "maximum iterations ({max_iter}) reached without convergence (last correction norm {correction:.3e})"
    ))]
    MaxIterationsReached { max_iter: usize, correction: f64 },
    #[snafu(display(
        "residual RMS grew from {initial_rms:.3e} to {rms:.3e} in iteration {iteration}"
    ))]
    ResidualGrowth {
        iteration: usize,
        rms: f64,
        initial_rms: f64,
    },
    #[snafu(display(
        "estimate is {error_km:.3} km away from the truth, above the {threshold_km} km acceptance threshold"
    ))]
    OutsideAcceptance { error_km: f64, threshold_km: f64 },
    #[snafu(display("truth could not be propagated to the epoch of the estimate: {source}"))]
    TruthPropagation { source: PropagationError },
    #[snafu(display("estimate could not be compared to the truth: {source}"))]
    TruthComparison { source: AstroError },
    #[snafu(display("all {candidates} candidates diverged"))]
    AllDiverged { candidates: usize },
}

/// Solver choice for the batch least squares estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BatchSolver {
    /// Normal equations: (H^T W H) dx = H^T W dy
    #[default]
    NormalEquations,
    /// Levenberg-Marquardt: (H^T W H + lambda * diag(H^T W H)) dx = H^T W dy
    LevenbergMarquardt,
}

/// Outcome of a batch estimation
#[derive(Debug, PartialEq)]
pub enum BatchStatus {
    Converged,
    /// The batch diverged (BatchDivergence): the reason is kept, the estimate is that of the last iteration.
    Diverged(BatchError),
}

impl BatchStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }
}

/// Result of the batch estimation of a single initial guess.
#[derive(Debug, PartialEq)]
pub struct BatchSolution {
    /// Estimated state at the epoch of the initial guess
    pub estimate: Orbit,
    pub iterations: usize,
    /// Normalized RMS of the residuals at the last iteration (one means the residuals are at the noise level)
    pub rms: Option<f64>,
    /// Covariance of the estimate, the inverse of the information matrix
    pub covar: Option<Matrix6<f64>>,
    pub status: BatchStatus,
}

/// Accumulated normal equations of an iteration
#[derive(Copy, Clone, Debug)]
struct NormalEquations {
    info: Matrix6<f64>,
    rhs: Vector6<f64>,
    rms: f64,
}

/// Batch least squares estimator of the state at the epoch of the initial guess.
///
/// The reference trajectory is propagated with its STM to every epoch of the arc, so that the
/// sensitivity of each measurement row to the initial state is H = H_tilde * Phi(t_i, t_0).
#[derive(Copy, Clone, Debug, PartialEq, TypedBuilder, Serialize, Deserialize)]
#[builder(doc)]
pub struct BatchLeastSquares {
    #[builder(default = 10)]
    pub max_iterations: usize,
    /// Convergence tolerance on the norm of the state correction (km and km/s)
    #[builder(default = 1e-3)]
    pub tolerance: f64,
    /// The batch diverges if the RMS grows beyond this factor times the RMS of the first iteration
    #[builder(default = 10.0)]
    pub divergence_factor: f64,
    #[builder(default)]
    pub solver: BatchSolver,
    /// Initial damping factor for Levenberg-Marquardt
    #[builder(default = 1e-3)]
    pub lm_lambda_init: f64,
    /// Factor by which lambda is increased (resp. decreased) after a bad (resp. good) iteration
    #[builder(default = 10.0)]
    pub lm_lambda_factor: f64,
    #[builder(default)]
    pub noise: MeasurementNoise,
    #[builder(default = SPEED_OF_LIGHT_KM_S)]
    pub signal_speed_km_s: f64,
}

impl Default for BatchLeastSquares {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BatchLeastSquares {
    /// Computes the measurement rows of an observation of the arc from the provided state.
    pub fn measurement_rows(
        &self,
        arc: &TrackingArc,
        obs: &ArcObservation,
        state: &Orbit,
    ) -> Result<Vec<MsrRow>, BatchError> {
        match obs {
            ArcObservation::Position(fix) => {
                let computed = state.radius();
                Ok((0..3)
                    .map(|i| {
                        let mut sensitivity = RowVector6::zeros();
                        sensitivity[i] = 1.0;
                        MsrRow {
                            observed: fix.position_km[i],
                            computed: computed[i],
                            sensitivity,
                            sigma: self.noise.position_km,
                        }
                    })
                    .collect())
            }
            ArcObservation::RangeDoppler(msr) => {
                // Station indexes are checked when the arc is built
                let station = &arc.stations[msr.station];
                let (range_km, range_rate_km_s) = station
                    .range_doppler(state)
                    .context(BatchStationSnafu { epoch: msr.epoch })?;
                let (range_row, range_rate_row) = station
                    .range_doppler_partials(state)
                    .context(BatchStationSnafu { epoch: msr.epoch })?;
                Ok(vec![
                    MsrRow {
                        observed: msr.range_km,
                        computed: range_km,
                        sensitivity: range_row,
                        sigma: self.noise.range_km,
                    },
                    MsrRow {
                        observed: msr.range_rate_km_s,
                        computed: range_rate_km_s,
                        sensitivity: range_rate_row,
                        sigma: self.noise.range_rate_km_s,
                    },
                ])
            }
            ArcObservation::Tdoa(msr) => {
                let stations_km = arc
                    .stations
                    .iter()
                    .map(|s| s.position_km(msr.epoch))
                    .collect::<Result<Vec<_>, _>>()
                    .context(BatchStationSnafu { epoch: msr.epoch })?;
                tdoa_rows(
                    state,
                    &stations_km,
                    msr,
                    self.signal_speed_km_s,
                    self.noise.timing_s,
                )
                .context(BatchTdoaSnafu)
            }
        }
    }

    /// Propagates the estimate with its STM to every epoch of the arc and accumulates the normal equations.
    fn accumulate<D: Dynamics, E: ErrorCtrl>(
        &self,
        prop: &Propagator<D, E>,
        arc: &TrackingArc,
        epochs: &[Epoch],
        estimate: &Orbit,
        iteration: usize,
    ) -> Result<NormalEquations, BatchError> {
        let states = prop
            .with(estimate.with_stm())
            .until_epochs(epochs)
            .context(BatchPropagationSnafu { iteration })?;

        let mut info = Matrix6::zeros();
        let mut rhs = Vector6::zeros();
        let mut sum_sq_weighted_residuals = 0.0;
        let mut count: usize = 0;

        let mut idx = 0;
        for obs in arc.observations() {
            // Both the observations and the unique epochs are sorted
            while epochs[idx] != obs.epoch() {
                idx += 1;
            }
            let state = &states[idx];
            let stm = state.stm.unwrap_or_else(Matrix6::identity);

            for row in self.measurement_rows(arc, obs, state)? {
                let weight = row.sigma.powi(-2);
                let residual = row.residual();
                let h = row.sensitivity * stm;
                info += h.transpose() * h * weight;
                rhs += h.transpose() * residual * weight;
                sum_sq_weighted_residuals += weight * residual * residual;
                count += 1;
            }
        }

        ensure!(count >= 6, TooFewMeasurementsSnafu { count });

        Ok(NormalEquations {
            info,
            rhs,
            rms: (sum_sq_weighted_residuals / count as f64).sqrt(),
        })
    }

    /// Estimates the state at the epoch of the initial guess. This never fails: a divergence is recorded in the status
    /// of the solution, whose estimate is the last one computed.
    pub fn estimate<D: Dynamics, E: ErrorCtrl>(
        &self,
        prop: &Propagator<D, E>,
        arc: &TrackingArc,
        initial_guess: &Orbit,
    ) -> BatchSolution {
        let mut solution = BatchSolution {
            estimate: initial_guess.without_stm(),
            iterations: 0,
            rms: None,
            covar: None,
            status: BatchStatus::Converged,
        };
        if let Err(e) = self.iterate(prop, arc, &mut solution) {
            warn!("batch diverged after {} iterations: {e}", solution.iterations);
            solution.status = BatchStatus::Diverged(e);
        }
        solution
    }

    fn iterate<D: Dynamics, E: ErrorCtrl>(
        &self,
        prop: &Propagator<D, E>,
        arc: &TrackingArc,
        solution: &mut BatchSolution,
    ) -> Result<(), BatchError> {
        let epochs = arc.epochs();
        ensure!(!epochs.is_empty(), TooFewMeasurementsSnafu { count: 0_usize });

        let mut lambda = self.lm_lambda_init;
        let mut initial_rms = None;
        let mut previous: Option<(Orbit, NormalEquations)> = None;
        let mut correction = f64::INFINITY;

        for iteration in 1..=self.max_iterations {
            solution.iterations = iteration;
            let mut normal = self.accumulate(prop, arc, &epochs, &solution.estimate, iteration)?;

            if self.solver == BatchSolver::LevenbergMarquardt {
                match previous {
                    Some((prev_estimate, prev_normal)) if normal.rms > prev_normal.rms => {
                        // The last step made things worse: retry from the previous estimate with more damping
                        lambda *= self.lm_lambda_factor;
                        debug!("LM: RMS increased to {:.3e}, lambda increased to {lambda:.3e}", normal.rms);
                        solution.estimate = prev_estimate;
                        normal = prev_normal;
                    }
                    Some(_) => lambda /= self.lm_lambda_factor,
                    None => {}
                }
            }

            solution.rms = Some(normal.rms);
            let initial = *initial_rms.get_or_insert(normal.rms);
            ensure!(
                normal.rms <= self.divergence_factor * initial,
                ResidualGrowthSnafu {
                    iteration,
                    rms: normal.rms,
                    initial_rms: initial
                }
            );

            let dx = match self.solver {
                BatchSolver::NormalEquations => normal
                    .info
                    .cholesky()
                    .context(SingularInformationSnafu { iteration })?
                    .solve(&normal.rhs),
                BatchSolver::LevenbergMarquardt => {
                    let mut damped = normal.info;
                    for i in 0..6 {
                        damped[(i, i)] += lambda * normal.info[(i, i)].max(f64::EPSILON);
                    }
                    damped
                        .cholesky()
                        .context(SingularInformationSnafu { iteration })?
                        .solve(&normal.rhs)
                }
            };
            ensure!(
                dx.iter().all(|v| v.is_finite()),
                NonFiniteCorrectionSnafu { iteration }
            );

            previous = Some((solution.estimate, normal));
            solution.estimate = solution.estimate + dx;
            solution.covar = normal.info.try_inverse();
            correction = dx.norm();

            info!(
                "[{iteration}/{}] RMS: {:.3e}; corrections: {:.3} m\t{:.3} m/s",
                self.max_iterations,
                normal.rms,
                dx.fixed_rows::<3>(0).norm() * 1e3,
                dx.fixed_rows::<3>(3).norm() * 1e3
            );

            if correction < self.tolerance {
                info!("Converged in {iteration} iterations");
                return Ok(());
            }
        }

        MaxIterationsReachedSnafu {
            max_iter: self.max_iterations,
            correction,
        }
        .fail()
    }
}

impl Configurable for BatchLeastSquares {
    type IntermediateRepr = BatchConfig;

    fn from_config(cfg: &BatchConfig) -> Result<Self, ConfigError> {
        ensure!(
            cfg.max_iterations > 0 && cfg.tolerance > 0.0 && cfg.divergence_factor >= 1.0,
            InvalidConfigSnafu {
                msg: "batch requires at least one iteration, a positive tolerance and a divergence factor of at least one"
            }
        );
        Ok(Self {
            max_iterations: cfg.max_iterations,
            tolerance: cfg.tolerance,
            divergence_factor: cfg.divergence_factor,
            solver: cfg.solver,
            lm_lambda_init: cfg.lm_lambda_init,
            lm_lambda_factor: cfg.lm_lambda_factor,
            noise: cfg.noise,
            signal_speed_km_s: cfg.signal_speed_km_s,
        })
    }
}

#[cfg(test)]
mod ut_blse {
    use super::*;
    use crate::cosmic::EARTH_J2000;
    use crate::dynamics::OrbitalDynamics;
    use crate::od::msr::{PositionFix, Track};
    use crate::time::Unit;

    fn truth() -> Orbit {
        let epoch = Epoch::from_gregorian_utc_at_midnight(2022, 5, 1);
        Orbit::keplerian(7000.0, 0.001, 51.6, 20.0, 10.0, 0.0, epoch, EARTH_J2000).unwrap()
    }

    fn position_arc(prop: &Propagator<OrbitalDynamics, crate::propagators::RSSCartesianStep>) -> TrackingArc {
        let states = prop
            .with(truth())
            .sample(30.0 * Unit::Second, 21)
            .unwrap();
        TrackingArc::from_positions(Track::new(states.iter().map(PositionFix::from).collect()).unwrap())
    }

    #[test]
    fn converges_from_offset_guess() {
        let prop = Propagator::default(OrbitalDynamics::two_body());
        let arc = position_arc(&prop);
        let guess = truth() + Vector6::new(10.0, -5.0, 3.0, 0.005, -0.002, 0.001);

        for solver in [BatchSolver::NormalEquations, BatchSolver::LevenbergMarquardt] {
            let bls = BatchLeastSquares::builder()
                .solver(solver)
                .max_iterations(20)
                .build();
            let solution = bls.estimate(&prop, &arc, &guess);
            assert_eq!(solution.status, BatchStatus::Converged, "{solver:?}");
            let (pos_err, vel_err) = solution.estimate.rss(&truth()).unwrap();
            assert!(pos_err < 1e-3, "{solver:?}: {pos_err} km");
            assert!(vel_err < 1e-6, "{solver:?}: {vel_err} km/s");
            assert!(solution.covar.is_some());
        }
    }

    #[test]
    fn iteration_cap_is_recorded() {
        let prop = Propagator::default(OrbitalDynamics::two_body());
        let arc = position_arc(&prop);
        let guess = truth() + Vector6::new(10.0, -5.0, 3.0, 0.005, -0.002, 0.001);
        let bls = BatchLeastSquares::builder().max_iterations(1).build();
        let solution = bls.estimate(&prop, &arc, &guess);
        assert_eq!(solution.iterations, 1);
        assert!(matches!(
            solution.status,
            BatchStatus::Diverged(BatchError::MaxIterationsReached { max_iter: 1, .. })
        ));
        // The last estimate is kept
        assert!(solution.estimate.rss(&truth()).unwrap().0 < 10.0);
    }

    #[test]
    fn too_few_rows() {
        let prop = Propagator::default(OrbitalDynamics::two_body());
        let arc = TrackingArc::from_positions(
            Track::new(vec![PositionFix::from(&truth())]).unwrap(),
        );
        let solution = BatchLeastSquares::default().estimate(&prop, &arc, &truth());
        assert_eq!(
            solution.status,
            BatchStatus::Diverged(BatchError::TooFewMeasurements { count: 3 })
        );
    }
}
