//! Interpolants that saturate to zero outside the affected arm.

use serde::{Deserialize, Serialize};

use crate::bspline::BSpline;
use crate::ppoly::PiecewisePolynomial;

/// A real function of one variable.
pub trait Interpolant {
    /// Value at `x`.
    fn value(&self, x: f64) -> f64;
}

impl Interpolant for BSpline {
    fn value(&self, x: f64) -> f64 {
        self.eval(x)
    }
}

impl Interpolant for PiecewisePolynomial {
    fn value(&self, x: f64) -> f64 {
        self.eval(x)
    }
}

/// Wraps an interpolant so that it is exactly zero unless `0 < x < extent`.
///
/// Queries outside the angular window are not errors; the kick there is
/// defined to vanish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeChecked<F> {
    inner: F,
    extent: f64,
}

impl<F: Interpolant> RangeChecked<F> {
    /// Wraps `inner` for the window `(0, extent)`.
    pub fn new(inner: F, extent: f64) -> Self {
        Self { inner, extent }
    }

    /// Upper end of the window.
    pub fn extent(&self) -> f64 {
        self.extent
    }

    /// Unchecked interpolant.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Whether `x` lies strictly inside the window.
    pub fn contains(&self, x: f64) -> bool {
        x > 0.0 && x < self.extent
    }

    /// Checked value at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        if self.contains(x) {
            self.inner.value(x)
        } else {
            0.0
        }
    }

    /// Checked values at every entry of `xs`.
    pub fn eval_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}

impl<F: Interpolant> Interpolant for RangeChecked<F> {
    fn value(&self, x: f64) -> f64 {
        self.eval(x)
    }
}
