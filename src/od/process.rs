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


use super::blse::{BatchEnsemble, BatchError, BatchLeastSquares, BatchSample, EnsembleSummary};
use super::iod::{herrick_gibbs_track, initial_orbit};
use super::kalman::{KfEstimate, KfResidual};
use super::msr::{PositionFix, Track, TrackingArc};
use super::tdoa::{resolved_track, Multilateration, Multilaterator};
use crate::cosmic::{KeplerianElements, Orbit};
use crate::dynamics::OrbitalDynamics;
use crate::errors::OdError;
use crate::io::{Configurable, PipelineConfig};
use crate::linalg::Vector6;
use crate::mc::{disperse, GaussianGenerator};
use crate::propagators::{Propagator, RSSCartesianStep};
use crate::time::{Epoch, Unit};

/// Output of the position pipeline, read only.
#[derive(Clone, Debug)]
pub struct PositionSolution {
    pub raw: Track<PositionFix>,
    pub smoothed: Track<PositionFix>,
    /// Initial orbit determination from the smoothed track
    pub initial_orbit: Orbit,
    /// Refined estimate after processing every smoothed fix from the epoch of the initial orbit onward
    pub estimate: KfEstimate,
    pub residuals: Vec<KfResidual>,
    /// States propagated from the refined estimate
    pub trajectory: Vec<Orbit>,
}

impl PositionSolution {
    pub fn elements(&self) -> &KeplerianElements {
        &self.estimate.elements
    }

    /// Returns the epoch, position norm (km) and velocity norm (km/s) of each state of the sampled trajectory.
    pub fn norms(&self) -> Vec<(Epoch, f64, f64)> {
        self.trajectory
            .iter()
            .map(|state| (state.epoch, state.rmag_km(), state.vmag_km_s()))
            .collect()
    }
}

/// Smooths a raw position track, determines an initial orbit, refines it with the Keplerian filter,
/// and samples the resulting trajectory.
#[derive(Clone, Debug, Default)]
pub struct PositionPipeline {
    pub cfg: PipelineConfig,
}

impl PositionPipeline {
    pub fn new(cfg: PipelineConfig) -> Self {
        Self { cfg }
    }

    pub fn run(&self, raw: Track<PositionFix>) -> Result<PositionSolution, OdError> {
        let frame = self.cfg.frame;
        let smoothed = self.cfg.smoother.smooth(&raw)?;
        info!("Smoothed {raw}");

        let initial_orbit = initial_orbit(&smoothed, &self.cfg.iod, frame)?;
        info!("Initial orbit determination: {}", KeplerianElements::from(&initial_orbit));

        let mut filter = self
            .cfg
            .filter
            .filter(KeplerianElements::from(&initial_orbit))?;

        let fixes: Vec<PositionFix> = smoothed
            .iter()
            .filter(|fix| fix.epoch >= initial_orbit.epoch)
            .copied()
            .collect();
        let residuals = filter.process_track(&Track::new(fixes)?)?;
        let estimate = *filter.estimate();
        info!("Refined estimate: {estimate}");

        let prop: Propagator<OrbitalDynamics, RSSCartesianStep> =
            Propagator::from_config(&self.cfg.propagator)?;
        let trajectory = prop
            .with(estimate.state()?)
            .sample(self.cfg.sample_step_s * Unit::Second, self.cfg.sample_count)?;

        Ok(PositionSolution {
            raw,
            smoothed,
            initial_orbit,
            estimate,
            residuals,
            trajectory,
        })
    }
}

/// Output of the TDoA pipeline, read only.
#[derive(Debug)]
pub struct TdoaSolution {
    pub multilaterations: Vec<Multilateration>,
    /// Track of the resolved multilaterations
    pub track: Track<PositionFix>,
    pub herrick_gibbs: Vec<Orbit>,
    /// Per component error (estimate minus truth) of each Herrick-Gibbs state, when a truth is provided
    pub herrick_gibbs_errors: Option<Vec<Vector6<f64>>>,
    pub candidates: Vec<Orbit>,
    pub samples: Vec<BatchSample>,
    pub summary: EnsembleSummary,
}

impl TdoaSolution {
    /// Returns the converged sample with the lowest post-fit RMS.
    pub fn best(&self) -> Result<&BatchSample, BatchError> {
        EnsembleSummary::best(&self.samples)
    }
}

/// Multilaterates a TDoA arc, runs Herrick-Gibbs over the positions, and refines dispersed candidates
/// around the first Herrick-Gibbs state with the batch ensemble.
#[derive(Clone, Debug, Default)]
pub struct TdoaPipeline {
    pub cfg: PipelineConfig,
}

impl TdoaPipeline {
    pub fn new(cfg: PipelineConfig) -> Self {
        Self { cfg }
    }

    /// The optional truth (at any epoch) is only used to evaluate the Herrick-Gibbs states and the batch samples.
    pub fn run(&self, arc: &TrackingArc, truth: Option<&Orbit>) -> Result<TdoaSolution, OdError> {
        let frame = self.cfg.frame;
        let prop: Propagator<OrbitalDynamics, RSSCartesianStep> =
            Propagator::from_config(&self.cfg.propagator)?;

        let multilaterations = Multilaterator::from_config(&self.cfg.tdoa)?.multilaterate_arc(arc)?;
        let track = resolved_track(&multilaterations)?;
        if track.len() < multilaterations.len() {
            warn!(
                "{} of {} epochs could not be multilaterated",
                multilaterations.len() - track.len(),
                multilaterations.len()
            );
        }

        let herrick_gibbs = herrick_gibbs_track(&track, self.cfg.tdoa.herrick_gibbs_window, frame)?;
        let template = herrick_gibbs[0];

        let truths = match truth {
            Some(truth) => {
                let epochs: Vec<Epoch> = herrick_gibbs.iter().map(|state| state.epoch).collect();
                Some(prop.with(truth.without_stm()).until_epochs(&epochs)?)
            }
            None => None,
        };
        let herrick_gibbs_errors = truths.as_ref().map(|truths| {
            herrick_gibbs
                .iter()
                .zip(truths.iter())
                .map(|(estimate, truth)| estimate.to_cartesian_vec() - truth.to_cartesian_vec())
                .collect()
        });

        let batch_cfg = &self.cfg.batch;
        let generator = GaussianGenerator::from_position_velocity_1σ(
            template,
            batch_cfg.position_sigma_km,
            batch_cfg.velocity_sigma_km_s,
        )?;
        let candidates = disperse(&generator, batch_cfg.candidates, batch_cfg.seed);

        let ensemble = BatchEnsemble::new(&prop, BatchLeastSquares::from_config(batch_cfg)?)
            .with_acceptance_threshold(batch_cfg.acceptance_threshold_km)
            .with_progress(batch_cfg.progress);
        let samples = ensemble.run(arc, &candidates, truths.as_ref().map(|truths| &truths[0]));
        let summary = EnsembleSummary::from_samples(&samples);

        Ok(TdoaSolution {
            multilaterations,
            track,
            herrick_gibbs,
            herrick_gibbs_errors,
            candidates,
            samples,
            summary,
        })
    }
}
