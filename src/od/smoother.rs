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
use crate::linalg::Vector3;
use crate::polyfit::Polynomial;
use crate::time::Epoch;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use typed_builder::TypedBuilder;

/// Largest polynomial degree of the smoother
pub const MAX_SMOOTHING_DEGREE: usize = 3;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SmoothingError {
    #[snafu(display("window of {window} samples is invalid for a track of {len}: it must be odd, at least 5, and at most the track length"))]
    InvalidWindow { window: usize, len: usize },
    #[snafu(display("polynomial degree {degree} is invalid for a window of {window}: it must be at most 3 and smaller than the window"))]
    InvalidDegree { degree: usize, window: usize },
    #[snafu(display("moving average window of {window} samples must be odd and at least 3"))]
    InvalidMovingAverage { window: usize },
    #[snafu(display("local polynomial fit is singular around {epoch}"))]
    SingularFit { epoch: Epoch },
}

/// Smoothing of a position track with a local polynomial least squares fit (Savitzky-Golay), optionally preceded by a
/// centered moving average.
///
/// The fit uses the actual epochs of the observations, so unevenly sampled tracks are supported.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct Smoother {
    /// Number of samples in each window (odd, at least 5)
    #[builder(default = 11)]
    #[serde(default = "Smoother::default_window")]
    pub window: usize,
    /// Degree of the local polynomial (at most 3)
    #[builder(default = 3)]
    #[serde(default = "Smoother::default_degree")]
    pub degree: usize,
    /// Window of the moving average applied before the polynomial fit, if any
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub moving_average: Option<usize>,
}

impl Default for Smoother {
    fn default() -> Self {
        Self {
            window: Self::default_window(),
            degree: Self::default_degree(),
            moving_average: None,
        }
    }
}

impl Smoother {
    fn default_window() -> usize {
        11
    }

    fn default_degree() -> usize {
        MAX_SMOOTHING_DEGREE
    }

    /// Initializes a smoother with the provided window and degree, without moving average.
    pub fn new(window: usize, degree: usize) -> Self {
        Self {
            window,
            degree,
            moving_average: None,
        }
    }

    /// Checks the parameters of this smoother against a track of the provided length.
    pub fn validate(&self, len: usize) -> Result<(), SmoothingError> {
        ensure!(
            self.window % 2 == 1 && self.window >= 5 && self.window <= len,
            InvalidWindowSnafu {
                window: self.window,
                len
            }
        );
        ensure!(
            self.degree <= MAX_SMOOTHING_DEGREE && self.degree < self.window,
            InvalidDegreeSnafu {
                degree: self.degree,
                window: self.window
            }
        );
        if let Some(window) = self.moving_average {
            ensure!(
                window % 2 == 1 && window >= 3,
                InvalidMovingAverageSnafu { window }
            );
        }
        Ok(())
    }

    /// Smooths the provided track, returning a track with the same epochs.
    pub fn smooth(&self, track: &Track<PositionFix>) -> Result<Track<PositionFix>, SmoothingError> {
        self.validate(track.len())?;

        let elapsed_s = track.elapsed_s();
        let mut positions = track.positions();
        if let Some(window) = self.moving_average {
            positions = moving_average(&positions, window);
        }

        let len = track.len();
        let half = self.window / 2;
        let mut smoothed = Vec::with_capacity(len);

        for (i, fix) in track.iter().enumerate() {
            // Truncated windows at the edges: the first or last `window` samples
            let start = i.saturating_sub(half).min(len - self.window);
            let end = start + self.window;

            // Centering and scaling the abscissa keeps the normal equations well conditioned
            let t_center = elapsed_s[i];
            let t_scale = (elapsed_s[end - 1] - elapsed_s[start]).max(f64::EPSILON);
            let xs: Vec<f64> = elapsed_s[start..end]
                .iter()
                .map(|t| (t - t_center) / t_scale)
                .collect();

            let mut position_km = Vector3::zeros();
            for axis in 0..3 {
                let ys: Vec<f64> = positions[start..end].iter().map(|p| p[axis]).collect();
                let poly = Polynomial::<{ MAX_SMOOTHING_DEGREE + 1 }>::fit(&xs, &ys, self.degree)
                    .context(SingularFitSnafu { epoch: fix.epoch })?;
                // The abscissa is zero at the sample being smoothed
                position_km[axis] = poly.eval(0.0);
            }

            smoothed.push(PositionFix {
                epoch: fix.epoch,
                position_km,
            });
        }

        debug!(
            "smoothed {} observations (window {}, degree {})",
            len, self.window, self.degree
        );

        // Same epochs as the input track
        Ok(Track::from_validated(smoothed))
    }
}

/// Centered moving average, with windows truncated symmetrically at the edges.
pub fn moving_average(positions: &[Vector3<f64>], window: usize) -> Vec<Vector3<f64>> {
    let half = window / 2;
    let len = positions.len();
    (0..len)
        .map(|i| {
            let reach = half.min(i).min(len - 1 - i);
            let slice = &positions[i - reach..=i + reach];
            slice.iter().sum::<Vector3<f64>>() / slice.len() as f64
        })
        .collect()
}
