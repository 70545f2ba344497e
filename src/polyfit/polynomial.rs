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


use crate::linalg::{DMatrix, DVector};
use std::fmt;
use std::ops;

/// Polynomial is a statically allocated polynomial.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Polynomial<const SIZE: usize> {
    /// Coefficients are orders by their power, e.g. index 0 is to the power 0, 1 is linear, 2 is quadratic, etc.
    pub coefficients: [f64; SIZE],
}

impl<const SIZE: usize> Polynomial<SIZE> {
    /// Initializes a Polynomial with only zeros
    pub fn zeros() -> Self {
        Self {
            coefficients: [0.0; SIZE],
        }
    }

    /// Get the order of the polynomial
    pub const fn order(&self) -> usize {
        SIZE - 1
    }

    /// Evaluate the polynomial at the provided position
    pub fn eval(&self, x: f64) -> f64 {
        self.eval_n_deriv(x).0
    }

    /// Evaluate the derivative at the provided position
    pub fn deriv(&self, x: f64) -> f64 {
        self.eval_n_deriv(x).1
    }

    /// Evaluate the polynomial and its derivative at the provided position (Horner's scheme)
    pub fn eval_n_deriv(&self, x: f64) -> (f64, f64) {
        let mut acc_eval = 0.0;
        let mut acc_deriv = 0.0;
        for val in self.coefficients.iter().rev() {
            acc_deriv = acc_deriv * x + acc_eval;
            acc_eval = acc_eval * x + *val;
        }
        (acc_eval, acc_deriv)
    }

    /// Returns true if any of the coefficients are NaN
    pub fn is_nan(&self) -> bool {
        self.coefficients.iter().any(|c| c.is_nan())
    }

    /// Least squares fit of a polynomial of the provided degree through the (x, y) samples.
    ///
    /// The normal equations are solved with a Cholesky decomposition. Coefficients above the requested degree are zero.
    /// Returns None if the degree does not fit in this polynomial, if there are fewer samples than coefficients,
    /// or if the normal matrix is singular (e.g. repeated abscissae).
    pub fn fit(xs: &[f64], ys: &[f64], degree: usize) -> Option<Self> {
        let n_coeffs = degree + 1;
        if n_coeffs > SIZE || xs.len() != ys.len() || xs.len() < n_coeffs {
            return None;
        }

        let vandermonde = DMatrix::from_fn(xs.len(), n_coeffs, |i, j| xs[i].powi(j as i32));
        let rhs = DVector::from_column_slice(ys);

        let normal = vandermonde.transpose() * &vandermonde;
        let coeffs = normal.cholesky()?.solve(&(vandermonde.transpose() * rhs));

        let mut poly = Self::zeros();
        for (i, c) in coeffs.iter().enumerate() {
            poly.coefficients[i] = *c;
        }
        if poly.is_nan() {
            None
        } else {
            Some(poly)
        }
    }
}

/// Clone current polynomial and then multiply it with an f64
impl<const SIZE: usize> ops::Mul<f64> for Polynomial<SIZE> {
    type Output = Polynomial<SIZE>;

    fn mul(mut self, rhs: f64) -> Self::Output {
        for val in &mut self.coefficients {
            *val *= rhs;
        }
        self
    }
}

impl<const SIZE: usize> fmt::Display for Polynomial<SIZE> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "P(t) = ")?;
        let mut data = Vec::with_capacity(SIZE);

        for (i, c) in self.coefficients.iter().enumerate().rev() {
            if c.abs() <= f64::EPSILON {
                continue;
            }

            let mut d = if c.abs() > 100.0 || c.abs() < 0.01 {
                // Use scientific notation
                format!("{:+e}", c)
            } else {
                format!("{:+}", c)
            };
            match i {
                0 => {} // Show nothing for zero
                1 => d = format!("{}t", d),
                _ => d = format!("{}t^{}", d, i),
            }
            data.push(d);
        }
        write!(f, "{}", data.join(" "))
    }
}
