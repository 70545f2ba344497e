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


use super::{
    BatchError, BatchLeastSquares, BatchStatus, TruthComparisonSnafu, TruthPropagationSnafu,
};
use crate::cosmic::Orbit;
use crate::dynamics::Dynamics;
use crate::od::msr::TrackingArc;
use crate::propagators::{ErrorCtrl, Propagator};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use snafu::ResultExt;
use std::fmt;

/// Default distance to the truth below which a candidate is considered converged, in km
pub const DEFAULT_ACCEPTANCE_THRESHOLD_KM: f64 = 100.0;

/// Batch result of one candidate of the ensemble.
#[derive(Debug, PartialEq)]
pub struct BatchSample {
    pub index: usize,
    pub initial_guess: Orbit,
    /// Final estimate, kept even if the batch diverged
    pub estimate: Orbit,
    pub iterations: usize,
    pub rms: Option<f64>,
    /// Position error of the estimate with respect to the truth, in km (only available for evaluation)
    pub error_km: Option<f64>,
    pub status: BatchStatus,
}

impl BatchSample {
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }
}

impl fmt::Display for BatchSample {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} after {} iterations: ", self.index, self.iterations)?;
        match &self.status {
            BatchStatus::Converged => write!(f, "converged")?,
            BatchStatus::Diverged(e) => write!(f, "diverged ({e})")?,
        }
        if let Some(err) = self.error_km {
            write!(f, ", error of {err:.3} km")?;
        }
        Ok(())
    }
}

/// Runs the batch estimator on each candidate initial state in parallel.
pub struct BatchEnsemble<'a, D: Dynamics, E: ErrorCtrl> {
    prop: &'a Propagator<D, E>,
    pub estimator: BatchLeastSquares,
    pub acceptance_threshold_km: f64,
    /// Show a progress bar while running
    pub progress: bool,
}

impl<'a, D: Dynamics, E: ErrorCtrl> BatchEnsemble<'a, D, E> {
    pub fn new(prop: &'a Propagator<D, E>, estimator: BatchLeastSquares) -> Self {
        Self {
            prop,
            estimator,
            acceptance_threshold_km: DEFAULT_ACCEPTANCE_THRESHOLD_KM,
            progress: false,
        }
    }

    pub fn with_acceptance_threshold(mut self, threshold_km: f64) -> Self {
        self.acceptance_threshold_km = threshold_km;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    // Just the template for the progress bar
    fn progress_bar(&self, num_runs: usize) -> ProgressBar {
        let pb = ProgressBar::new(num_runs as u64);
        match ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:100.cyan/blue} {pos:>7}/{len:7} {msg}",
        ) {
            Ok(style) => pb.set_style(style.progress_chars("##-")),
            Err(e) => warn!("default progress bar style used: {e}"),
        }
        pb.set_message("batch ensemble");
        pb
    }

    /// Runs the batch on every candidate, and returns the samples sorted by candidate index.
    ///
    /// When a truth is provided (evaluation only), a candidate is only converged if its estimate is within the acceptance threshold.
    pub fn run(
        &self,
        arc: &TrackingArc,
        candidates: &[Orbit],
        truth: Option<&Orbit>,
    ) -> Vec<BatchSample> {
        info!(
            "Running the batch on {} candidates over {arc}",
            candidates.len()
        );
        let run_one =
            |(index, guess): (usize, &Orbit)| self.run_candidate(index, guess, arc, truth);

        let mut samples: Vec<BatchSample> = if self.progress {
            candidates
                .par_iter()
                .enumerate()
                .progress_with(self.progress_bar(candidates.len()))
                .map(run_one)
                .collect()
        } else {
            candidates.par_iter().enumerate().map(run_one).collect()
        };
        samples.sort_by_key(|sample| sample.index);

        info!("{}", EnsembleSummary::from_samples(&samples));
        samples
    }

    fn run_candidate(
        &self,
        index: usize,
        guess: &Orbit,
        arc: &TrackingArc,
        truth: Option<&Orbit>,
    ) -> BatchSample {
        let solution = self.estimator.estimate(self.prop, arc, guess);
        let (error_km, status) = match truth.map(|t| self.error_to_truth(&solution.estimate, t)) {
            None => (None, solution.status),
            Some(Err(e)) => {
                warn!("candidate #{index} could not be evaluated: {e}");
                (None, BatchStatus::Diverged(e))
            }
            Some(Ok(error_km)) => {
                let status = match solution.status {
                    BatchStatus::Converged if error_km >= self.acceptance_threshold_km => {
                        BatchStatus::Diverged(BatchError::OutsideAcceptance {
                            error_km,
                            threshold_km: self.acceptance_threshold_km,
                        })
                    }
                    status => status,
                };
                (Some(error_km), status)
            }
        };
        let sample = BatchSample {
            index,
            initial_guess: *guess,
            estimate: solution.estimate,
            iterations: solution.iterations,
            rms: solution.rms,
            error_km,
            status,
        };
        debug!("{sample}");
        sample
    }

    /// Position error of the estimate in km, with the truth first propagated to the epoch of the estimate.
    fn error_to_truth(&self, estimate: &Orbit, truth: &Orbit) -> Result<f64, BatchError> {
        let truth = if truth.epoch == estimate.epoch {
            truth.without_stm()
        } else {
            self.prop
                .with(truth.without_stm())
                .until_epoch(estimate.epoch)
                .context(TruthPropagationSnafu)?
        };
        let (pos_km, _) = estimate.rss(&truth).context(TruthComparisonSnafu)?;
        Ok(pos_km)
    }
}

/// Counts of an ensemble run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EnsembleSummary {
    pub candidates: usize,
    pub converged: usize,
    pub diverged: usize,
    /// Mean position error of the converged samples, if known
    pub mean_error_km: Option<f64>,
}

impl EnsembleSummary {
    pub fn from_samples(samples: &[BatchSample]) -> Self {
        let converged: Vec<&BatchSample> = samples.iter().filter(|s| s.is_converged()).collect();
        let errors: Vec<f64> = converged.iter().filter_map(|s| s.error_km).collect();
        Self {
            candidates: samples.len(),
            converged: converged.len(),
            diverged: samples.len() - converged.len(),
            mean_error_km: if errors.is_empty() {
                None
            } else {
                Some(errors.iter().sum::<f64>() / errors.len() as f64)
            },
        }
    }

    /// Returns the converged sample with the smallest error to the truth if known, or else the smallest RMS.
    pub fn best(samples: &[BatchSample]) -> Result<&BatchSample, BatchError> {
        samples
            .iter()
            .filter(|s| s.is_converged())
            .min_by(|a, b| {
                let key = |s: &BatchSample| s.error_km.or(s.rms).unwrap_or(f64::INFINITY);
                key(a).total_cmp(&key(b))
            })
            .ok_or(BatchError::AllDiverged {
                candidates: samples.len(),
            })
    }
}

impl fmt::Display for EnsembleSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} candidates: {} converged, {} diverged",
            self.candidates, self.converged, self.diverged
        )?;
        if let Some(err) = self.mean_error_km {
            write!(f, " (mean error of {err:.3} km)")?;
        }
        Ok(())
    }
}
