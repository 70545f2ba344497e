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

use super::{AccelModel, Dynamics, DynamicsError};
use crate::cosmic::{Orbit, PropVector};
use crate::linalg::{Matrix3, Matrix6, Vector6};
use crate::time::Unit;
use std::fmt;
use std::sync::Arc;

/// `OrbitalDynamics` provides the equations of motion of the central body's point mass, plus any acceleration model.
///
/// The Jacobian of each model is analytical, so the STM may be propagated with any combination of models.
#[derive(Clone)]
pub struct OrbitalDynamics {
    pub accel_models: Vec<Arc<dyn AccelModel + Sync>>,
}

impl OrbitalDynamics {
    /// Initializes an OrbitalDynamics which only models the gravity of the central body as a point mass.
    pub fn two_body() -> Self {
        Self::new(vec![])
    }

    /// Initialize orbital dynamics with a list of acceleration models
    pub fn new(accel_models: Vec<Arc<dyn AccelModel + Sync>>) -> Self {
        Self { accel_models }
    }

    /// Initialize new orbital mechanics with the provided model.
    /// **Note:** Orbital dynamics _always_ include two body dynamics, these cannot be turned off.
    pub fn from_model(accel_model: Arc<dyn AccelModel + Sync>) -> Self {
        Self::new(vec![accel_model])
    }

    /// Add a model to the currently defined orbital dynamics
    pub fn add_model(&mut self, accel_model: Arc<dyn AccelModel + Sync>) {
        self.accel_models.push(accel_model);
    }

    fn osculating(delta_t_s: f64, state: &PropVector, ctx: &Orbit) -> Orbit {
        let mut osc = ctx.without_stm();
        osc.set_from_prop_vector(ctx.epoch + delta_t_s * Unit::Second, state);
        osc
    }
}

impl fmt::Display for OrbitalDynamics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let models: Vec<String> = self.accel_models.iter().map(|x| format!("{x}")).collect();
        if models.is_empty() {
            write!(f, "Two body dynamics")
        } else {
            write!(f, "Two body dynamics with {}", models.join("; "))
        }
    }
}

impl Dynamics for OrbitalDynamics {
    fn eom(
        &self,
        delta_t_s: f64,
        state: &PropVector,
        ctx: &Orbit,
    ) -> Result<PropVector, DynamicsError> {
        let osc = Self::osculating(delta_t_s, state, ctx);
        let mut d_x = PropVector::zeros();

        if ctx.stm.is_some() {
            let (pos_vel_dt, grad) = self.dual_eom(delta_t_s, &osc)?;
            // The STM is read from the integrated vector, not the context, since it changes at each stage.
            let stm = Matrix6::from_iterator(state.fixed_rows::<36>(6).iter().copied());
            let stm_dt = grad * stm;
            d_x.fixed_rows_mut::<6>(0).copy_from(&pos_vel_dt);
            for (i, val) in stm_dt.iter().enumerate() {
                d_x[6 + i] = *val;
            }
        } else {
            let body_acceleration = (-osc.frame.mu_km3_s2 / osc.rmag_km().powi(3)) * osc.radius();
            d_x.fixed_rows_mut::<3>(0).copy_from(&osc.velocity());
            d_x.fixed_rows_mut::<3>(3).copy_from(&body_acceleration);

            for model in &self.accel_models {
                let model_acc = model.eom(&osc)?;
                for i in 0..3 {
                    d_x[i + 3] += model_acc[i];
                }
            }
        }

        Ok(d_x)
    }

    fn dual_eom(
        &self,
        _delta_t_s: f64,
        osc: &Orbit,
    ) -> Result<(Vector6<f64>, Matrix6<f64>), DynamicsError> {
        let radius = osc.radius();
        let rmag = osc.rmag_km();
        let gm = osc.frame.mu_km3_s2;

        let mut fx = Vector6::zeros();
        fx.fixed_rows_mut::<3>(0).copy_from(&osc.velocity());
        fx.fixed_rows_mut::<3>(3)
            .copy_from(&(-gm / rmag.powi(3) * radius));

        // d(accel)/d(radius) of the point mass
        let da_dr = gm / rmag.powi(5) * (3.0 * radius * radius.transpose())
            - gm / rmag.powi(3) * Matrix3::identity();

        let mut grad = Matrix6::zeros();
        grad.fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&Matrix3::identity());
        grad.fixed_view_mut::<3, 3>(3, 0).copy_from(&da_dr);

        // Apply the acceleration models
        for model in &self.accel_models {
            let (model_acc, model_da_dr, model_da_dv) = model.dual_eom(osc)?;
            for i in 0..3 {
                fx[i + 3] += model_acc[i];
            }
            let mut block = grad.fixed_view_mut::<3, 3>(3, 0);
            block += model_da_dr;
            let mut block = grad.fixed_view_mut::<3, 3>(3, 3);
            block += model_da_dv;
        }

        Ok((fx, grad))
    }
}
