//! Breakpoint (piecewise-polynomial) form of a spline.

use serde::{Deserialize, Serialize};
use sg_core::errors::{ErrorInfo, SgError};
use tracing::debug;

use crate::bspline::BSpline;

/// Local power-basis polynomials between strictly increasing breakpoints.
///
/// On interval `j` the value is `sum_p c[j][p] (x - x_j)^(order - p)`, so the
/// last coefficient is the constant term and the one before it the slope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiecewisePolynomial {
    breakpoints: Vec<f64>,
    coeffs: Vec<Vec<f64>>,
    order: usize,
}

impl PiecewisePolynomial {
    /// Converts a spline to breakpoint form, dropping zero-length intervals.
    ///
    /// The repeated boundary knots of a spline produce zero-width pieces at
    /// both ends; those are removed so every remaining interval has positive
    /// width.
    pub fn from_spline(spline: &BSpline) -> Result<Self, SgError> {
        let k = spline.degree();
        let n = spline.coefficients().len();
        let knots = spline.knots();

        let mut derivatives = Vec::with_capacity(k + 1);
        derivatives.push(spline.clone());
        for _ in 0..k {
            let next = derivatives[derivatives.len() - 1].derivative()?;
            derivatives.push(next);
        }

        let mut breakpoints = Vec::new();
        let mut coeffs = Vec::new();
        let mut dropped = 0usize;
        for j in 0..knots.len() - 1 {
            let (lo, hi) = (knots[j], knots[j + 1]);
            if !(hi - lo > 0.0) {
                dropped += 1;
                continue;
            }
            let span = j.clamp(k, n - 1);
            let mut factorial = 1.0;
            let mut local = vec![0.0; k + 1];
            for (d, deriv) in derivatives.iter().enumerate() {
                if d > 0 {
                    factorial *= d as f64;
                }
                local[k - d] = deriv.eval_in_span(lo, span - d) / factorial;
            }
            if breakpoints.is_empty() {
                breakpoints.push(lo);
            }
            breakpoints.push(hi);
            coeffs.push(local);
        }
        if coeffs.is_empty() {
            return Err(SgError::Value(
                ErrorInfo::new(
                    "degenerate-breakpoints",
                    "spline has no interval of positive width",
                )
                .with_context("knots", knots.len()),
            ));
        }
        debug!(
            intervals = coeffs.len(),
            dropped,
            order = k,
            "converted spline to breakpoint form"
        );
        Ok(Self {
            breakpoints,
            coeffs,
            order: k,
        })
    }

    /// Polynomial order of every piece.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Strictly increasing breakpoints; one more than [`PiecewisePolynomial::intervals`].
    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    /// Number of polynomial pieces.
    pub fn intervals(&self) -> usize {
        self.coeffs.len()
    }

    /// Coefficients of interval `j`, highest power first.
    pub fn coefficients(&self, j: usize) -> &[f64] {
        &self.coeffs[j]
    }

    /// Constant term of interval `j`.
    pub fn constant(&self, j: usize) -> f64 {
        self.coeffs[j][self.order]
    }

    /// Linear term of interval `j`; zero for piecewise constants.
    pub fn slope(&self, j: usize) -> f64 {
        if self.order == 0 {
            0.0
        } else {
            self.coeffs[j][self.order - 1]
        }
    }

    /// Coefficient of `(x - x_j)^power` on interval `j`.
    pub fn power_coefficient(&self, j: usize, power: usize) -> f64 {
        if power > self.order {
            0.0
        } else {
            self.coeffs[j][self.order - power]
        }
    }

    /// Interval containing `x`, clamped to the edge pieces.
    pub fn interval(&self, x: f64) -> usize {
        let count = self.breakpoints.partition_point(|&b| b <= x);
        count.saturating_sub(1).min(self.coeffs.len() - 1)
    }

    /// Evaluates the piece containing `x`.
    pub fn eval(&self, x: f64) -> f64 {
        let j = self.interval(x);
        let dx = x - self.breakpoints[j];
        self.coeffs[j].iter().fold(0.0, |acc, c| acc * dx + c)
    }
}
