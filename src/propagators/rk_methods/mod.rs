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

mod rk;
pub use self::rk::*;
mod fehlberg;
pub use self::fehlberg::*;

/// The `RK` trait defines a Runge Kutta integrator.
#[allow(clippy::upper_case_acronyms)]
pub trait RK
where
    Self: Sized,
{
    /// Returns the order of this integrator (as u8 because there probably isn't an order greater than 255).
    /// The order is used for the adaptive step size only to compute the error between estimates.
    const ORDER: u8;

    /// Returns the stages of this integrator (as usize because it's used as indexing)
    const STAGES: usize;

    /// Returns a pointer to a list of f64 corresponding to the A coefficients of the Butcher table for that RK.
    /// This module only supports *explicit* integrators, and as such, `Self.a_coeffs().len()` must be of
    /// size (stages-1)*(stages)/2, listed row by row.
    /// *Warning:* this RK trait supposes that the implementation is consistent, i.e. c_i = \sum_j a_{ij}.
    const A_COEFFS: &'static [f64];
    /// Returns a pointer to a list of f64 corresponding to the b_i and b^*_i coefficients of the
    /// Butcher table for that RK. The b_i propagate the state, the difference with the b^*_i is the error estimate.
    /// `Self.b_coeffs().len()` must be of size stages*2.
    const B_COEFFS: &'static [f64];
}

#[cfg(test)]
mod ut_butcher {
    use super::*;

    fn check_table<T: RK>() {
        assert_eq!(T::A_COEFFS.len(), (T::STAGES - 1) * T::STAGES / 2);
        assert_eq!(T::B_COEFFS.len(), 2 * T::STAGES);
        // Both weight sets sum to one
        let b: f64 = T::B_COEFFS[..T::STAGES].iter().sum();
        let b_star: f64 = T::B_COEFFS[T::STAGES..].iter().sum();
        assert!((b - 1.0).abs() < 1e-14, "sum(b) = {b}");
        assert!((b_star - 1.0).abs() < 1e-14, "sum(b*) = {b_star}");
        // c_i must stay within [0; 1]
        let mut idx = 0;
        for i in 1..T::STAGES {
            let c_i: f64 = T::A_COEFFS[idx..idx + i].iter().sum();
            assert!((-1e-14..=1.0 + 1e-14).contains(&c_i), "c_{i} = {c_i}");
            idx += i;
        }
    }

    #[test]
    fn butcher_tables() {
        check_table::<RKF78>();
        check_table::<RKF45>();
        check_table::<RK4Fixed>();
    }
}
