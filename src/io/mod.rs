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


use crate::cosmic::{Frame, KeplerianElements, SPEED_OF_LIGHT_KM_S};
use crate::dynamics::drag::Drag;
use crate::dynamics::gravity::J2Gravity;
use crate::dynamics::OrbitalDynamics;
use crate::linalg::{Matrix3, Matrix6, Vector6};
use crate::od::blse::BatchSolver;
use crate::od::kalman::{FilterError, KeplerianFilter, KfEstimate};
use crate::od::msr::MeasurementNoise;
use crate::od::smoother::Smoother;
use crate::propagators::{PropOpts, Propagator, RSSCartesianStep, RK4Fixed};
use crate::time::Unit;
use crate::tools::lambert::{LambertSolver, TransferKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to read configuration file: {source}"))]
    ReadError { source: std::io::Error },
    #[snafu(display("failed to parse YAML configuration: {source}"))]
    ParseError { source: serde_yaml::Error },
    #[snafu(display("invalid configuration: {msg}"))]
    InvalidConfig { msg: String },
}

impl PartialEq for ConfigError {
    /// No two configuration errors match
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

pub trait ConfigRepr: Debug + Sized + Serialize + DeserializeOwned {
    /// Builds the configuration representation from the path to a yaml
    fn load<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).context(ReadSnafu)?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).context(ParseSnafu)
    }

    /// Builds a sequence of "Selves" from the provided path to a yaml
    fn load_many<P>(path: P) -> Result<Vec<Self>, ConfigError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).context(ReadSnafu)?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).context(ParseSnafu)
    }

    /// Builds a map of names to "selves" from the provided path to a yaml
    fn load_named<P>(path: P) -> Result<BTreeMap<String, Self>, ConfigError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).context(ReadSnafu)?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).context(ParseSnafu)
    }

    /// Builds "Self" from the provided string of a yaml
    fn loads(data: &str) -> Result<Self, ConfigError> {
        debug!("Loading YAML:\n{data}");
        serde_yaml::from_str(data).context(ParseSnafu)
    }

    /// Builds a sequence of "Selves" from the provided string of a yaml
    fn loads_many(data: &str) -> Result<Vec<Self>, ConfigError> {
        debug!("Loading YAML:\n{data}");
        serde_yaml::from_str(data).context(ParseSnafu)
    }
}

/// Trait to specify that a structure can be built from a serializable configuration.
pub trait Configurable
where
    Self: Sized,
{
    /// The intermediate representation needed to create `Self`.
    type IntermediateRepr: ConfigRepr;

    fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_config(&Self::IntermediateRepr::load(path)?)
    }

    /// Creates a new instance of `self` from the configuration.
    fn from_config(cfg: &Self::IntermediateRepr) -> Result<Self, ConfigError>;
}

/// The smoother is configured directly from its serialized form
pub type SmootherConfig = Smoother;

impl ConfigRepr for Smoother {}

impl ConfigRepr for LambertSolver {}

/// Integrator of the propagator
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegratorKind {
    #[default]
    RKF78,
    RKF45,
    /// Fixed step Runge Kutta 4, uses `fixed_step_s` (or the initial step)
    RK4,
}

/// Ballistic parameters of the exponential drag model
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DragConfig {
    pub cd: f64,
    pub area_m2: f64,
    pub mass_kg: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagatorConfig {
    pub integrator: IntegratorKind,
    pub init_step_s: f64,
    pub min_step_s: f64,
    pub max_step_s: f64,
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub attempts: u8,
    pub max_steps: usize,
    pub fixed_step_s: Option<f64>,
    /// Include the J2 zonal harmonic of the frame
    pub j2: bool,
    pub drag: Option<DragConfig>,
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        let opts = PropOpts::default();
        Self {
            integrator: IntegratorKind::default(),
            init_step_s: opts.init_step.to_seconds(),
            min_step_s: opts.min_step.to_seconds(),
            max_step_s: opts.max_step.to_seconds(),
            abs_tol: opts.abs_tol,
            rel_tol: opts.rel_tol,
            attempts: opts.attempts,
            max_steps: opts.max_steps,
            fixed_step_s: None,
            j2: false,
            drag: None,
        }
    }
}

impl ConfigRepr for PropagatorConfig {}

impl PropagatorConfig {
    /// Returns the propagator options of this configuration
    pub fn opts(&self) -> Result<PropOpts<RSSCartesianStep>, ConfigError> {
        if self.integrator == IntegratorKind::RK4 {
            let step_s = self.fixed_step_s.unwrap_or(self.init_step_s);
            ensure!(
                step_s > 0.0,
                InvalidConfigSnafu {
                    msg: format!("fixed step must be positive, got {step_s} s")
                }
            );
            let mut opts = PropOpts::with_fixed_step_s(step_s);
            opts.max_steps = self.max_steps;
            return Ok(opts);
        }
        ensure!(
            0.0 < self.min_step_s
                && self.min_step_s <= self.init_step_s
                && self.init_step_s <= self.max_step_s,
            InvalidConfigSnafu {
                msg: format!(
                    "steps must verify 0 < min ({}) <= init ({}) <= max ({})",
                    self.min_step_s, self.init_step_s, self.max_step_s
                )
            }
        );
        ensure!(
            self.abs_tol >= 0.0 && self.rel_tol >= 0.0 && self.abs_tol + self.rel_tol > 0.0,
            InvalidConfigSnafu {
                msg: "tolerances must be non negative and not both zero"
            }
        );
        Ok(PropOpts::builder()
            .init_step(self.init_step_s * Unit::Second)
            .min_step(self.min_step_s * Unit::Second)
            .max_step(self.max_step_s * Unit::Second)
            .abs_tol(self.abs_tol)
            .rel_tol(self.rel_tol)
            .attempts(self.attempts)
            .max_steps(self.max_steps)
            .error_ctrl(RSSCartesianStep)
            .build())
    }

    /// Returns the dynamics of this configuration
    pub fn dynamics(&self) -> OrbitalDynamics {
        let mut dynamics = OrbitalDynamics::two_body();
        if self.j2 {
            dynamics.add_model(J2Gravity::new());
        }
        if let Some(drag) = self.drag {
            dynamics.add_model(Drag::exponential(drag.cd, drag.area_m2, drag.mass_kg));
        }
        dynamics
    }
}

impl Configurable for Propagator<OrbitalDynamics, RSSCartesianStep> {
    type IntermediateRepr = PropagatorConfig;

    fn from_config(cfg: &PropagatorConfig) -> Result<Self, ConfigError> {
        let opts = cfg.opts()?;
        let dynamics = cfg.dynamics();
        Ok(match cfg.integrator {
            IntegratorKind::RKF78 => Propagator::rkf78(dynamics, opts),
            IntegratorKind::RKF45 => Propagator::rkf45(dynamics, opts),
            IntegratorKind::RK4 => Propagator::new::<RK4Fixed>(dynamics, opts),
        })
    }
}

/// Initial uncertainty and noise of the Keplerian filter. Angles are in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Noise of each axis of the position fixes
    pub position_sigma_km: f64,
    pub sma_sigma_km: f64,
    pub ecc_sigma: f64,
    /// Initial sigma of the inclination and of the RAAN
    pub plane_sigma_deg: f64,
    /// Initial sigma of the argument of periapsis and of the true anomaly
    pub anomaly_sigma_deg: f64,
    /// Process noise sigmas of `[sma, ecc, inc, aop, raan, ta]`, added at every time update
    pub process_noise: Option<[f64; 6]>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            position_sigma_km: 0.1,
            sma_sigma_km: 10.0,
            ecc_sigma: 0.01,
            plane_sigma_deg: 0.5,
            anomaly_sigma_deg: 5.0,
            process_noise: None,
        }
    }
}

impl ConfigRepr for FilterConfig {}

impl FilterConfig {
    /// Returns the initial 1-sigma of `[sma_km, ecc, inc, aop, raan, ta]` with the angles in radians
    pub fn initial_sigmas(&self) -> Vector6<f64> {
        Vector6::new(
            self.sma_sigma_km,
            self.ecc_sigma,
            self.plane_sigma_deg.to_radians(),
            self.anomaly_sigma_deg.to_radians(),
            self.plane_sigma_deg.to_radians(),
            self.anomaly_sigma_deg.to_radians(),
        )
    }

    pub fn measurement_noise(&self) -> Matrix3<f64> {
        Matrix3::from_diagonal_element(self.position_sigma_km.powi(2))
    }

    /// Returns the process noise covariance, with the angles converted to radians
    pub fn process_noise(&self) -> Option<Matrix6<f64>> {
        self.process_noise.map(|sigmas| {
            let mut sigmas = Vector6::from_row_slice(&sigmas);
            for i in 2..6 {
                sigmas[i] = sigmas[i].to_radians();
            }
            Matrix6::from_diagonal(&sigmas.component_mul(&sigmas))
        })
    }

    /// Initializes the filter from these settings around the provided elements
    pub fn filter(&self, initial: KeplerianElements) -> Result<KeplerianFilter, FilterError> {
        KeplerianFilter::new(
            KfEstimate::from_sigmas(initial, self.initial_sigmas()),
            self.measurement_noise(),
            self.process_noise(),
        )
    }
}

/// Initial orbit determination method over a smoothed track
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IodMethod {
    /// Lambert between two samples
    #[default]
    Lambert,
    /// Lambert between each pair of consecutive samples, the first solution is kept
    LambertChain,
    /// Herrick-Gibbs centered on the first valid sample
    HerrickGibbs,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IodConfig {
    pub method: IodMethod,
    /// Index of the first sample used by Lambert
    pub first: usize,
    /// Index of the second sample used by Lambert, defaults to the last sample
    pub second: Option<usize>,
    pub transfer: TransferKind,
    pub lambert: LambertSolver,
    /// Spacing (in samples) of the Herrick-Gibbs triplets
    pub herrick_gibbs_window: usize,
}

impl Default for IodConfig {
    fn default() -> Self {
        Self {
            method: IodMethod::default(),
            first: 0,
            second: None,
            transfer: TransferKind::default(),
            lambert: LambertSolver::default(),
            herrick_gibbs_window: 1,
        }
    }
}

impl ConfigRepr for IodConfig {}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TdoaConfig {
    pub max_iterations: usize,
    pub step_tolerance_km: f64,
    pub residual_tolerance_km: f64,
    pub signal_speed_km_s: f64,
    pub initial_damping: f64,
    /// Spacing (in samples) of the Herrick-Gibbs triplets over the multilaterated positions
    pub herrick_gibbs_window: usize,
}

impl Default for TdoaConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            step_tolerance_km: 1e-6,
            residual_tolerance_km: 0.1,
            signal_speed_km_s: SPEED_OF_LIGHT_KM_S,
            initial_damping: 1e-3,
            herrick_gibbs_window: 1,
        }
    }
}

impl ConfigRepr for TdoaConfig {}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub divergence_factor: f64,
    pub solver: BatchSolver,
    pub lm_lambda_init: f64,
    pub lm_lambda_factor: f64,
    pub noise: MeasurementNoise,
    pub signal_speed_km_s: f64,
    /// A candidate is only converged if its estimate is within this distance of the truth (when known)
    pub acceptance_threshold_km: f64,
    /// Number of candidate initial states
    pub candidates: usize,
    /// Dispersion of the position of each candidate around the initial orbit determination, per axis
    pub position_sigma_km: f64,
    /// Dispersion of the velocity of each candidate, per axis
    pub velocity_sigma_km_s: f64,
    pub seed: u64,
    pub progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tolerance: 1e-3,
            divergence_factor: 10.0,
            solver: BatchSolver::default(),
            lm_lambda_init: 1e-3,
            lm_lambda_factor: 10.0,
            noise: MeasurementNoise::default(),
            signal_speed_km_s: SPEED_OF_LIGHT_KM_S,
            acceptance_threshold_km: crate::od::blse::DEFAULT_ACCEPTANCE_THRESHOLD_KM,
            candidates: 10,
            position_sigma_km: 10.0,
            velocity_sigma_km_s: 0.01,
            seed: 0,
            progress: false,
        }
    }
}

impl ConfigRepr for BatchConfig {}

/// Configuration of both pipelines.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub frame: Frame,
    pub smoother: SmootherConfig,
    pub iod: IodConfig,
    pub filter: FilterConfig,
    pub propagator: PropagatorConfig,
    pub tdoa: TdoaConfig,
    pub batch: BatchConfig,
    /// Spacing of the sampled trajectory after the filter
    pub sample_step_s: f64,
    pub sample_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame: Frame::default(),
            smoother: SmootherConfig::default(),
            iod: IodConfig::default(),
            filter: FilterConfig::default(),
            propagator: PropagatorConfig::default(),
            tdoa: TdoaConfig::default(),
            batch: BatchConfig::default(),
            sample_step_s: 100.0,
            sample_count: 20,
        }
    }
}

impl ConfigRepr for PipelineConfig {}
