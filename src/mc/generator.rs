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


use crate::cosmic::{AstroError, KeplerianElements, Orbit};
use crate::linalg::Vector6;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DispersionError {
    #[snafu(display("invalid standard deviation {sigma} for {param}"))]
    InvalidSigma { param: StateParameter, sigma: f64 },
}

/// A parameter of an orbit which can be dispersed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateParameter {
    X,
    Y,
    Z,
    VX,
    VY,
    VZ,
    SMA,
    Inclination,
    TrueAnomaly,
}

impl StateParameter {
    /// Returns the index of this parameter in the Cartesian state, if it is a Cartesian parameter
    fn cartesian_index(&self) -> Option<usize> {
        match self {
            Self::X => Some(0),
            Self::Y => Some(1),
            Self::Z => Some(2),
            Self::VX => Some(3),
            Self::VY => Some(4),
            Self::VZ => Some(5),
            _ => None,
        }
    }

    /// Returns the value of this parameter for the provided orbit (km, km/s or degrees)
    pub fn value(&self, orbit: &Orbit) -> f64 {
        match self.cartesian_index() {
            Some(idx) => orbit.to_cartesian_vec()[idx],
            None => match self {
                Self::SMA => orbit.sma_km(),
                Self::Inclination => orbit.inc_deg(),
                _ => orbit.ta_deg(),
            },
        }
    }

    /// Returns a copy of the orbit where this parameter is offset by the provided delta
    pub fn offset(&self, orbit: &Orbit, delta: f64) -> Result<Orbit, AstroError> {
        if let Some(idx) = self.cartesian_index() {
            let mut offset = Vector6::zeros();
            offset[idx] = delta;
            return Ok(*orbit + offset);
        }
        let mut elements = KeplerianElements::from(orbit);
        match self {
            Self::SMA => elements.sma_km += delta,
            Self::Inclination => elements.inc_deg += delta,
            _ => elements.ta_deg += delta,
        }
        elements.to_orbit()
    }
}

impl fmt::Display for StateParameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::X => "X (km)",
            Self::Y => "Y (km)",
            Self::Z => "Z (km)",
            Self::VX => "VX (km/s)",
            Self::VY => "VY (km/s)",
            Self::VZ => "VZ (km/s)",
            Self::SMA => "SMA (km)",
            Self::Inclination => "inclination (deg)",
            Self::TrueAnomaly => "true anomaly (deg)",
        };
        write!(f, "{repr}")
    }
}

/// A state generator for Monte Carlo analyses: each sample is the template with every dispersion applied.
#[derive(Clone, Debug)]
pub struct Generator<D: Distribution<f64> + Copy> {
    /// The template state
    pub template: Orbit,
    /// The list of dispersions to be added to the template state
    pub dispersions: Vec<(StateParameter, D)>,
}

impl<D: Distribution<f64> + Copy> Generator<D> {
    /// Add a parameter dispersion to this Monte Carlo state generator.
    pub fn add_dispersion(&mut self, param: StateParameter, dispersion: D) {
        self.dispersions.push((param, dispersion));
    }

    /// Create a new Monte Carlo state generator given a template state, the parameters to disperse, and their respective dispersion probability density functions.
    pub fn from_dispersions(template: Orbit, dispersions: &[(StateParameter, D)]) -> Self {
        let mut me: Self = template.into();
        for (param, dispersion) in dispersions {
            me.add_dispersion(*param, *dispersion);
        }
        me
    }
}

impl<D: Distribution<f64> + Copy> From<Orbit> for Generator<D> {
    fn from(template: Orbit) -> Self {
        Self {
            template,
            dispersions: Vec::new(),
        }
    }
}

impl Generator<Normal<f64>> {
    /// Add a state dispersion from the provided 1-sigma value, zero mean
    pub fn add_1σ(&mut self, param: StateParameter, std_dev: f64) -> Result<(), DispersionError> {
        let normal = Normal::new(0.0, std_dev)
            .ok()
            .filter(|_| std_dev.is_finite())
            .context(InvalidSigmaSnafu {
                param,
                sigma: std_dev,
            })?;
        self.dispersions.push((param, normal));
        Ok(())
    }

    /// Create a new Monte Carlo state generator given a template state, the parameters to disperse, and their respective 1-σ standard deviations, zero mean.
    pub fn from_1σs(
        template: Orbit,
        std_devs: &[(StateParameter, f64)],
    ) -> Result<Self, DispersionError> {
        let mut me: Self = template.into();
        for (param, std_dev) in std_devs {
            me.add_1σ(*param, *std_dev)?;
        }
        Ok(me)
    }

    /// Disperses each position component with the same 1-σ (km), and each velocity component with the same 1-σ (km/s).
    pub fn from_position_velocity_1σ(
        template: Orbit,
        position_km: f64,
        velocity_km_s: f64,
    ) -> Result<Self, DispersionError> {
        use StateParameter::*;
        Self::from_1σs(
            template,
            &[
                (X, position_km),
                (Y, position_km),
                (Z, position_km),
                (VX, velocity_km_s),
                (VY, velocity_km_s),
                (VZ, velocity_km_s),
            ],
        )
    }
}

impl<D: Distribution<f64> + Copy> Distribution<Orbit> for Generator<D> {
    fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Orbit {
        let mut me = self.template;
        for (param, dispersion) in &self.dispersions {
            let delta = dispersion.sample(rng);
            match param.offset(&me, delta) {
                Ok(dispersed) => me = dispersed,
                Err(e) => warn!("{param} not dispersed by {delta}: {e}"),
            }
        }
        me
    }
}

/// Generates a state generator with a Normal distribution
pub type GaussianGenerator = Generator<Normal<f64>>;

#[cfg(test)]
mod ut_generator {
    use super::*;
    use crate::cosmic::EARTH_J2000;
    use crate::mc::disperse;
    use crate::time::Epoch;

    fn template() -> Orbit {
        let dt = Epoch::from_gregorian_utc_at_midnight(2021, 1, 31);
        Orbit::keplerian(8_191.93, 1e-6, 12.85, 306.614, 314.19, 99.887_7, dt, EARTH_J2000).unwrap()
    }

    #[test]
    fn generate_orbit() {
        let generator = GaussianGenerator::from_1σs(template(), &[(StateParameter::SMA, 1.0)]).unwrap();
        let states = disperse(&generator, 1000, 0);
        assert_eq!(states.len(), 1000);

        // About a third of the samples should be more than one sigma away
        let cnt_too_far = states
            .iter()
            .filter(|state| (8_191.93 - state.sma_km()).abs() > 1.0)
            .count();
        assert!(
            (250..400).contains(&cnt_too_far),
            "{cnt_too_far} samples beyond one sigma"
        );

        // Same seed, same samples
        assert_eq!(states, disperse(&generator, 1000, 0));
        assert_ne!(states[0], disperse(&generator, 1, 1)[0]);
    }

    #[test]
    fn position_velocity_dispersion() {
        let generator =
            GaussianGenerator::from_position_velocity_1σ(template(), 50.0, 0.05).unwrap();
        assert_eq!(generator.dispersions.len(), 6);
        let states = disperse(&generator, 500, 42);
        let mean_offset = states
            .iter()
            .map(|s| (s.radius() - template().radius()).norm())
            .sum::<f64>()
            / 500.0;
        // Mean of a chi distribution with three degrees of freedom
        assert!((mean_offset - 50.0 * 1.596).abs() < 10.0, "{mean_offset}");

        assert_eq!(
            GaussianGenerator::from_position_velocity_1σ(template(), -1.0, 0.05).unwrap_err(),
            DispersionError::InvalidSigma {
                param: StateParameter::X,
                sigma: -1.0
            }
        );
    }
}
