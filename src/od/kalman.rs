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


use super::msr::{PositionFix, Track};
use crate::cosmic::{AstroError, KeplerianElements, Orbit};
use crate::linalg::{Matrix3, Matrix6, SMatrix, SVector, Vector3, Vector6};
use crate::time::Epoch;
use crate::utils::{between_pm_pi, is_positive_definite, symmetrize};
use snafu::prelude::*;
use std::fmt;

/// Relative perturbation of each element for the finite differences
const FD_RELATIVE_STEP: f64 = 1e-7;
/// Smallest perturbation of `[sma_km, ecc, inc, aop, raan, ta]`
const FD_MIN_STEPS: [f64; 6] = [1e-4, 1e-7, 1e-7, 1e-7, 1e-7, 1e-7];
/// Components of the element vector which are angles
const ANGLES: [usize; 4] = [2, 3, 4, 5];

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FilterError {
    #[snafu(display("{stage} covariance is not positive definite at {epoch}"))]
    NonPositiveDefiniteCovariance { stage: &'static str, epoch: Epoch },
    #[snafu(display("innovation covariance cannot be inverted at {epoch}"))]
    SingularInnovation { epoch: Epoch },
    #[snafu(display("observation at {epoch} precedes the current estimate at {current}"))]
    NotTimeOrdered { epoch: Epoch, current: Epoch },
    #[snafu(display("estimate is not a valid ellipse at {epoch}: {source}"))]
    InvalidElements { epoch: Epoch, source: AstroError },
}

/// Estimate of the Keplerian filter.
///
/// The covariance is that of the vector `[sma_km, ecc, inc, aop, raan, ta]` where the angles are in **radians**.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct KfEstimate {
    pub elements: KeplerianElements,
    pub covar: Matrix6<f64>,
    /// Whether this estimate only results from a time update
    pub predicted: bool,
}

impl KfEstimate {
    pub fn from_covar(elements: KeplerianElements, covar: Matrix6<f64>) -> Self {
        Self {
            elements,
            covar,
            predicted: true,
        }
    }

    /// Builds an estimate with a diagonal covariance from the provided 1-sigma values (km, no unit, then radians).
    pub fn from_sigmas(elements: KeplerianElements, sigmas: Vector6<f64>) -> Self {
        Self::from_covar(
            elements,
            Matrix6::from_diagonal(&sigmas.component_mul(&sigmas)),
        )
    }

    pub fn epoch(&self) -> Epoch {
        self.elements.epoch
    }

    /// Returns the Cartesian state of this estimate
    pub fn state(&self) -> Result<Orbit, AstroError> {
        self.elements.to_orbit()
    }

    pub fn trace(&self) -> f64 {
        self.covar.trace()
    }

    /// Returns the 1-sigma of each element, in km, no unit, and degrees for the angles
    pub fn sigmas(&self) -> Vector6<f64> {
        let mut sigmas = self.covar.diagonal().map(|v| v.abs().sqrt());
        for i in ANGLES {
            sigmas[i] = sigmas[i].to_degrees();
        }
        sigmas
    }
}

impl fmt::Display for KfEstimate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let sigmas = self.sigmas();
        write!(
            f,
            "{}\n\tσ: sma = {:.3} km  ecc = {:.3e}  inc = {:.3} deg  aop = {:.3} deg  raan = {:.3} deg  ta = {:.3} deg",
            self.elements, sigmas[0], sigmas[1], sigmas[2], sigmas[3], sigmas[4], sigmas[5]
        )
    }
}

/// Residuals of a single position fix, before and after the measurement update.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct KfResidual {
    pub epoch: Epoch,
    pub prefit_km: Vector3<f64>,
    pub postfit_km: Vector3<f64>,
    /// Trace of the covariance prior to the update
    pub prior_trace: f64,
    /// Trace of the covariance after the update
    pub posterior_trace: f64,
}

/// Extended Kalman filter over the Keplerian elements, processing position fixes.
///
/// The time update propagates the elements analytically (two-body) and the transition matrix
/// is computed by central finite differences, as is the measurement sensitivity.
/// The covariance is updated with the Joseph form.
#[derive(Clone, Debug)]
pub struct KeplerianFilter {
    estimate: KfEstimate,
    /// Noise of the position fixes (R), in km^2
    pub measurement_noise: Matrix3<f64>,
    /// Process noise (Q), added at every time update
    pub process_noise: Option<Matrix6<f64>>,
}

impl KeplerianFilter {
    pub fn new(
        initial: KfEstimate,
        measurement_noise: Matrix3<f64>,
        process_noise: Option<Matrix6<f64>>,
    ) -> Result<Self, FilterError> {
        let epoch = initial.epoch();
        ensure!(
            is_positive_definite(&initial.covar),
            NonPositiveDefiniteCovarianceSnafu {
                stage: "initial",
                epoch
            }
        );
        initial
            .elements
            .ensure_elliptical("initializing the filter")
            .context(InvalidElementsSnafu { epoch })?;
        Ok(Self {
            estimate: initial,
            measurement_noise,
            process_noise,
        })
    }

    /// Initializes the filter with the same position noise on each axis
    pub fn with_position_sigma(
        initial: KfEstimate,
        sigma_km: f64,
        process_noise: Option<Matrix6<f64>>,
    ) -> Result<Self, FilterError> {
        Self::new(
            initial,
            Matrix3::from_diagonal_element(sigma_km.powi(2)),
            process_noise,
        )
    }

    pub fn estimate(&self) -> &KfEstimate {
        &self.estimate
    }

    /// Predicts the estimate to the provided epoch, which cannot precede the current estimate.
    pub fn time_update(&mut self, epoch: Epoch) -> Result<&KfEstimate, FilterError> {
        let current = self.estimate.epoch();
        ensure!(epoch >= current, NotTimeOrderedSnafu { epoch, current });
        if epoch == current {
            return Ok(&self.estimate);
        }

        let frame = self.estimate.elements.frame;
        let predict = |x: &Vector6<f64>| -> Result<Vector6<f64>, AstroError> {
            Ok(KeplerianElements::from_vector_rad(x, current, frame)
                .at_epoch(epoch)?
                .to_vector_rad())
        };

        let x = self.estimate.elements.to_vector_rad();
        let x_bar = predict(&x).context(InvalidElementsSnafu { epoch })?;
        let phi = jacobian(&x, predict, &ANGLES).context(InvalidElementsSnafu { epoch })?;

        let mut p_bar = phi * self.estimate.covar * phi.transpose();
        if let Some(q) = self.process_noise {
            p_bar += q;
        }
        let p_bar = symmetrize(&p_bar);
        ensure!(
            is_positive_definite(&p_bar),
            NonPositiveDefiniteCovarianceSnafu {
                stage: "predicted",
                epoch
            }
        );

        self.estimate = KfEstimate {
            elements: KeplerianElements::from_vector_rad(&x_bar, epoch, frame),
            covar: p_bar,
            predicted: true,
        };
        Ok(&self.estimate)
    }

    /// Processes a position fix: time update to its epoch, then measurement update.
    pub fn measurement_update(&mut self, fix: &PositionFix) -> Result<KfResidual, FilterError> {
        let epoch = fix.epoch;
        self.time_update(epoch)?;

        let frame = self.estimate.elements.frame;
        let position = |x: &Vector6<f64>| -> Result<Vector3<f64>, AstroError> {
            Ok(KeplerianElements::from_vector_rad(x, epoch, frame)
                .to_orbit()?
                .radius())
        };

        let x_bar = self.estimate.elements.to_vector_rad();
        let p_bar = self.estimate.covar;
        let prefit_km =
            fix.position_km - position(&x_bar).context(InvalidElementsSnafu { epoch })?;
        let h = jacobian(&x_bar, position, &[]).context(InvalidElementsSnafu { epoch })?;

        let innovation = h * p_bar * h.transpose() + self.measurement_noise;
        let innovation_inv = innovation
            .try_inverse()
            .context(SingularInnovationSnafu { epoch })?;
        let gain = p_bar * h.transpose() * innovation_inv;

        let x_hat = x_bar + gain * prefit_km;
        let i_kh = Matrix6::identity() - gain * h;
        let covar = symmetrize(
            &(i_kh * p_bar * i_kh.transpose()
                + gain * self.measurement_noise * gain.transpose()),
        );
        ensure!(
            is_positive_definite(&covar),
            NonPositiveDefiniteCovarianceSnafu {
                stage: "updated",
                epoch
            }
        );

        let elements = KeplerianElements::from_vector_rad(&x_hat, epoch, frame).normalized();
        elements
            .ensure_elliptical("updating the estimate")
            .context(InvalidElementsSnafu { epoch })?;
        let postfit_km = fix.position_km
            - position(&elements.to_vector_rad()).context(InvalidElementsSnafu { epoch })?;

        debug!(
            "{epoch}: prefit = {:.3} km, postfit = {:.3} km",
            prefit_km.norm(),
            postfit_km.norm()
        );

        let residual = KfResidual {
            epoch,
            prefit_km,
            postfit_km,
            prior_trace: p_bar.trace(),
            posterior_trace: covar.trace(),
        };

        self.estimate = KfEstimate {
            elements,
            covar,
            predicted: false,
        };

        Ok(residual)
    }

    /// Processes every fix of the track in order and returns their residuals.
    pub fn process_track(
        &mut self,
        track: &Track<PositionFix>,
    ) -> Result<Vec<KfResidual>, FilterError> {
        let mut residuals = Vec::with_capacity(track.len());
        for fix in track.iter() {
            residuals.push(self.measurement_update(fix)?);
        }
        if let Some(last) = residuals.last() {
            info!(
                "Processed {} position fixes, last postfit residual of {:.3} km",
                residuals.len(),
                last.postfit_km.norm()
            );
        }
        Ok(residuals)
    }
}

/// Central finite differences of the provided function around `x`.
///
/// The eccentricity is differentiated forward when a backward step would make it negative.
/// Differences of the outputs listed in `angles` are wrapped to [-π; π].
fn jacobian<const M: usize, F>(
    x: &Vector6<f64>,
    func: F,
    angles: &[usize],
) -> Result<SMatrix<f64, M, 6>, AstroError>
where
    F: Fn(&Vector6<f64>) -> Result<SVector<f64, M>, AstroError>,
{
    let mut jac = SMatrix::<f64, M, 6>::zeros();
    for j in 0..6 {
        let h = (x[j].abs() * FD_RELATIVE_STEP).max(FD_MIN_STEPS[j]);
        let mut plus = *x;
        plus[j] += h;
        let (minus, span) = if j == 1 && x[j] - h < 0.0 {
            (*x, h)
        } else {
            let mut minus = *x;
            minus[j] -= h;
            (minus, 2.0 * h)
        };
        let mut delta = func(&plus)? - func(&minus)?;
        for &i in angles {
            delta[i] = between_pm_pi(delta[i]);
        }
        jac.set_column(j, &(delta / span));
    }
    Ok(jac)
}
