//! Interpolating B-splines of arbitrary degree.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use sg_core::errors::{ErrorInfo, SgError};
use tracing::debug;

/// Highest supported interpolation degree.
pub const MAX_DEGREE: usize = 5;

fn spline_error(code: &str, message: impl Into<String>) -> SgError {
    SgError::Value(ErrorInfo::new(code, message.into()))
}

/// Spline in B-spline form: knot vector, coefficients and degree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSpline {
    knots: Vec<f64>,
    coeffs: Vec<f64>,
    degree: usize,
}

impl BSpline {
    /// Builds a spline from raw parts.
    pub fn from_parts(knots: Vec<f64>, coeffs: Vec<f64>, degree: usize) -> Result<Self, SgError> {
        if knots.len() != coeffs.len() + degree + 1 {
            return Err(SgError::Value(
                ErrorInfo::new("knot-count", "knot vector length must be coefficients + degree + 1")
                    .with_context("knots", knots.len())
                    .with_context("coefficients", coeffs.len())
                    .with_context("degree", degree),
            ));
        }
        if knots.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(spline_error("knot-order", "knots must be non-decreasing"));
        }
        Ok(Self {
            knots,
            coeffs,
            degree,
        })
    }

    /// Interpolates `y(x)` exactly at every sample.
    ///
    /// Knots follow the not-a-knot style placement used by FITPACK: the ends
    /// carry `degree + 1` copies of the first and last abscissa, interior knots
    /// sit on the data for odd degrees and between the data for even ones.
    pub fn interpolate(x: &[f64], y: &[f64], degree: usize) -> Result<Self, SgError> {
        if degree == 0 || degree > MAX_DEGREE {
            return Err(SgError::Value(
                ErrorInfo::new("spline-degree", "interpolation degree must be between 1 and 5")
                    .with_context("degree", degree),
            ));
        }
        let n = x.len();
        if n != y.len() {
            return Err(SgError::Value(
                ErrorInfo::new("sample-shape", "abscissae and ordinates differ in length")
                    .with_context("x", n)
                    .with_context("y", y.len()),
            ));
        }
        if n <= degree {
            return Err(SgError::Value(
                ErrorInfo::new("too-few-samples", "interpolation needs more samples than the degree")
                    .with_context("samples", n)
                    .with_context("degree", degree),
            ));
        }
        if x.windows(2).any(|pair| !(pair[1] > pair[0])) {
            return Err(spline_error(
                "non-monotonic-abscissae",
                "abscissae must be strictly increasing",
            ));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(spline_error("non-finite-samples", "samples must be finite"));
        }

        let mut knots = Vec::with_capacity(n + degree + 1);
        knots.extend(std::iter::repeat(x[0]).take(degree + 1));
        let interior = n - degree - 1;
        if degree % 2 == 1 {
            let start = (degree + 1) / 2;
            knots.extend_from_slice(&x[start..start + interior]);
        } else {
            let start = degree / 2;
            knots.extend((start..start + interior).map(|j| 0.5 * (x[j] + x[j + 1])));
        }
        knots.extend(std::iter::repeat(x[n - 1]).take(degree + 1));

        let mut spline = Self {
            knots,
            coeffs: vec![0.0; n],
            degree,
        };
        let mut collocation = DMatrix::<f64>::zeros(n, n);
        for (row, &xi) in x.iter().enumerate() {
            let span = spline.span(xi);
            for (offset, value) in spline.basis(xi, span).into_iter().enumerate() {
                collocation[(row, span - degree + offset)] = value;
            }
        }
        let rhs = DVector::from_column_slice(y);
        let solution = collocation.lu().solve(&rhs).ok_or_else(|| {
            SgError::Solver(ErrorInfo::new(
                "singular-collocation",
                "spline collocation system is singular",
            ))
        })?;
        spline.coeffs = solution.iter().copied().collect();
        debug!(samples = n, degree, "built interpolating spline");
        Ok(spline)
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Full knot vector.
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// B-spline coefficients.
    pub fn coefficients(&self) -> &[f64] {
        &self.coeffs
    }

    /// Interval on which the spline is defined without extrapolation.
    pub fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.coeffs.len()])
    }

    /// Knot span containing `x`, clamped to the first or last span outside the domain.
    pub(crate) fn span(&self, x: f64) -> usize {
        let k = self.degree;
        let n = self.coeffs.len();
        if x < self.knots[k] {
            return k;
        }
        if x >= self.knots[n] {
            return n - 1;
        }
        let count = self.knots[k..=n].partition_point(|&t| t <= x);
        (k + count - 1).clamp(k, n - 1)
    }

    fn basis(&self, x: f64, span: usize) -> Vec<f64> {
        let k = self.degree;
        let t = &self.knots;
        let mut values = vec![0.0; k + 1];
        let mut left = vec![0.0; k + 1];
        let mut right = vec![0.0; k + 1];
        values[0] = 1.0;
        for j in 1..=k {
            left[j] = x - t[span + 1 - j];
            right[j] = t[span + j] - x;
            let mut saved = 0.0;
            for r in 0..j {
                let denom = right[r + 1] + left[j - r];
                let temp = if denom == 0.0 { 0.0 } else { values[r] / denom };
                values[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            values[j] = saved;
        }
        values
    }

    /// Evaluates the polynomial piece of knot span `span` at `x`.
    pub(crate) fn eval_in_span(&self, x: f64, span: usize) -> f64 {
        let k = self.degree;
        let t = &self.knots;
        let mut d: Vec<f64> = (0..=k).map(|j| self.coeffs[j + span - k]).collect();
        for r in 1..=k {
            for j in (r..=k).rev() {
                let lo = t[j + span - k];
                let hi = t[j + 1 + span - r];
                let alpha = if hi == lo { 0.0 } else { (x - lo) / (hi - lo) };
                d[j] = (1.0 - alpha) * d[j - 1] + alpha * d[j];
            }
        }
        d[k]
    }

    /// Evaluates the spline; outside the domain the edge pieces are extended.
    pub fn eval(&self, x: f64) -> f64 {
        self.eval_in_span(x, self.span(x))
    }

    /// Evaluates the spline at every abscissa.
    pub fn eval_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }

    /// First derivative as a spline of one lower degree.
    pub fn derivative(&self) -> Result<BSpline, SgError> {
        if self.degree == 0 {
            return Err(spline_error(
                "derivative-degree",
                "a piecewise-constant spline has no derivative spline",
            ));
        }
        let k = self.degree;
        let t = &self.knots;
        let coeffs = self
            .coeffs
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let width = t[i + k + 1] - t[i + 1];
                if width == 0.0 {
                    0.0
                } else {
                    k as f64 * (pair[1] - pair[0]) / width
                }
            })
            .collect();
        Ok(Self {
            knots: t[1..t.len() - 1].to_vec(),
            coeffs,
            degree: k - 1,
        })
    }
}
