//! Density and mean parallel frequency of the perturbed stream.
//!
//! The fast path treats the parallel frequency kick as piecewise polynomial in
//! the angle at impact. Between two breakpoints the linear part maps a
//! Gaussian in frequency onto a Gaussian, so every interval contributes a
//! difference of error functions; curvature of the kick adds the
//! Gaussian-times-polynomial terms of [`gauss_poly_integrals`].

use std::f64::consts::{FRAC_2_SQRT_PI, PI, SQRT_2};

use sg_core::errors::{ErrorInfo, SgError};
use sg_kick::{integrate_adaptive, AdaptiveOptions};
use sg_spline::PiecewisePolynomial;
use statrs::function::erf::erf;
use tracing::trace;

const FRAC_1_SQRT_PI: f64 = 0.5 * FRAC_2_SQRT_PI;

/// Subdivision budget of the exact frequency integrals.
pub const EXACT_SUBINTERVALS: usize = 500;

fn erf_ext(x: f64) -> f64 {
    if x == f64::INFINITY {
        1.0
    } else if x == f64::NEG_INFINITY {
        -1.0
    } else {
        erf(x)
    }
}

fn gaussian_edge(u: f64, power: i32) -> f64 {
    if u.is_infinite() {
        0.0
    } else {
        (-u * u).exp() * u.powi(power)
    }
}

fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// `G_n = 2/sqrt(pi) * int_ll^ul u^(n+1) exp(-u^2) du` for `n < count`.
///
/// Filled in increasing order from the closed forms of `G_0` and `G_1` by
/// integration by parts, `G_n = (ll^n e^(-ll^2) - ul^n e^(-ul^2))/sqrt(pi) + n/2 G_(n-2)`.
/// Infinite limits are allowed.
pub fn gauss_poly_integrals(ll: f64, ul: f64, count: usize) -> Vec<f64> {
    let mut table = Vec::with_capacity(count);
    if count == 0 {
        return table;
    }
    table.push(FRAC_1_SQRT_PI * (gaussian_edge(ll, 0) - gaussian_edge(ul, 0)));
    if count > 1 {
        table.push(
            FRAC_1_SQRT_PI * (gaussian_edge(ll, 1) - gaussian_edge(ul, 1))
                + 0.5 * (erf_ext(ul) - erf_ext(ll)),
        );
    }
    for n in 2..count {
        let lower = table[n - 2];
        table.push(
            FRAC_1_SQRT_PI * (gaussian_edge(ll, n as i32) - gaussian_edge(ul, n as i32))
                + 0.5 * n as f64 * lower,
        );
    }
    table
}

/// Closed-form moments over a breakpoint kick model.
#[derive(Debug, Clone, Copy)]
pub struct MomentEngine<'a> {
    kick: &'a PiecewisePolynomial,
    time_since_impact: f64,
    mean_offset: f64,
    variance: f64,
}

struct Interval {
    /// `Omega_j - c0 - mean`, upper end of the frequency range.
    upper: f64,
    /// Lower end, possibly `-inf` when the interval is unbounded.
    lower: f64,
    /// `1 + c1 * T`.
    scale: f64,
}

impl<'a> MomentEngine<'a> {
    /// Engine for the parallel kick `kick`, time since impact and the
    /// Gaussian `(mean_offset, variance)` of the parallel frequency offsets.
    pub fn new(
        kick: &'a PiecewisePolynomial,
        time_since_impact: f64,
        mean_offset: f64,
        variance: f64,
    ) -> Self {
        Self {
            kick,
            time_since_impact,
            mean_offset,
            variance,
        }
    }

    fn breakpoint_frequency(&self, dangle: f64, x: f64) -> f64 {
        (dangle - x) / self.time_since_impact
    }

    /// Interval index and frequency distance below its start of the lowest
    /// frequency that reaches `dangle` within `disruption_time`.
    ///
    /// Intervals whose bound is negative cannot host the lowest frequency.
    /// When none qualifies the first interval is reported with an infinite
    /// distance.
    pub fn min_opar_raw(&self, dangle: f64, disruption_time: f64) -> (usize, f64) {
        let t = self.time_since_impact;
        let before = disruption_time - t;
        let breakpoints = self.kick.breakpoints();
        let mut best = (0usize, f64::INFINITY);
        for j in 0..self.kick.intervals() {
            let ob = self.breakpoint_frequency(dangle, breakpoints[j]);
            let c0 = self.kick.constant(j);
            let c1 = self.kick.slope(j);
            let lowx = ((ob - c0) * before + ob * t - dangle) / (before * (1.0 + c1 * t) + t);
            let lowx = if lowx >= 0.0 { lowx } else { f64::INFINITY };
            if lowx < best.1 {
                best = (j, lowx);
            }
        }
        best
    }

    /// Lowest parallel frequency that reaches `dangle` within `disruption_time`.
    pub fn min_opar(&self, dangle: f64, disruption_time: f64) -> f64 {
        let (j, lowx) = self.min_opar_raw(dangle, disruption_time);
        self.breakpoint_frequency(dangle, self.kick.breakpoints()[j]) - lowx
    }

    fn frequency_breakpoints(&self, dangle: f64, disruption_time: f64) -> (Vec<f64>, usize) {
        let mut ob: Vec<f64> = self
            .kick
            .breakpoints()
            .iter()
            .map(|&x| self.breakpoint_frequency(dangle, x))
            .collect();
        let (low, lowx) = self.min_opar_raw(dangle, disruption_time);
        ob[low + 1] = ob[low] - lowx;
        (ob, low)
    }

    fn interval(&self, ob: &[f64], j: usize) -> Interval {
        let c0 = self.kick.constant(j);
        let scale = 1.0 + self.kick.slope(j) * self.time_since_impact;
        let upper = ob[j] - c0 - self.mean_offset;
        let lower = if ob[j + 1] == f64::NEG_INFINITY {
            if scale >= 0.0 {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }
        } else {
            upper - scale * (ob[j] - ob[j + 1])
        };
        Interval {
            upper,
            lower,
            scale,
        }
    }

    fn erf_difference(&self, iv: &Interval) -> f64 {
        let norm = (2.0 * self.variance).sqrt();
        0.5 / iv.scale * (erf_ext(iv.upper / norm) - erf_ext(iv.lower / norm))
    }

    fn gauss_factor(&self, power: usize) -> f64 {
        -0.5 * (-SQRT_2).powi(power as i32 + 1) * self.variance.powf(0.5 * (power as f64 - 1.0))
    }

    fn gauss_table(&self, iv: &Interval, count: usize) -> Vec<f64> {
        let norm = (2.0 * self.variance).sqrt();
        gauss_poly_integrals(iv.lower / norm, iv.upper / norm, count)
    }

    fn density_curvature(&self, j: usize, iv: &Interval, table: &[f64]) -> f64 {
        let order = self.kick.order();
        let t = self.time_since_impact;
        (0..=order)
            .map(|p| {
                let series: f64 = (p.max(2)..=order)
                    .map(|q| {
                        self.kick.power_coefficient(j, q) * t.powi(q as i32)
                            / iv.scale.powi(q as i32 + 1)
                            * binomial(q, p)
                            * iv.upper.powi((q - p) as i32)
                    })
                    .sum();
                table[p] * self.gauss_factor(p) * series
            })
            .sum()
    }

    fn mean_curvature(&self, j: usize, ob: f64, iv: &Interval) -> f64 {
        let order = self.kick.order();
        let t = self.time_since_impact;
        let table = self.gauss_table(iv, order + 2);
        let shifted = ob * self.density_curvature(j, iv, &table[..=order]);
        let own: f64 = (0..=order + 1)
            .map(|p| {
                let series: f64 = (p.saturating_sub(1).max(2)..=order)
                    .map(|q| {
                        self.kick.power_coefficient(j, q) * t.powi(q as i32)
                            / iv.scale.powi(q as i32 + 2)
                            * binomial(q + 1, p)
                            * iv.upper.powi((q + 1 - p) as i32)
                    })
                    .sum();
                table[p] * self.gauss_factor(p) * series
            })
            .sum();
        shifted + own
    }

    /// Parallel-angle density at `dangle`.
    ///
    /// With `higher_order` the curvature of a kick of order above one is
    /// added; for linear kicks the correction vanishes identically.
    pub fn density(&self, dangle: f64, disruption_time: f64, higher_order: bool) -> f64 {
        let (ob, low) = self.frequency_breakpoints(dangle, disruption_time);
        let curved = higher_order && self.kick.order() > 1;
        let mut out = 0.0;
        for j in 0..=low {
            let iv = self.interval(&ob, j);
            out += self.erf_difference(&iv);
            if curved {
                let table = self.gauss_table(&iv, self.kick.order() + 1);
                out += self.density_curvature(j, &iv, &table);
            }
        }
        out + self.tail_density(ob[0])
    }

    /// Curvature correction alone; zero for linear kicks.
    pub fn density_correction(&self, dangle: f64, disruption_time: f64) -> f64 {
        if self.kick.order() <= 1 {
            return 0.0;
        }
        let (ob, low) = self.frequency_breakpoints(dangle, disruption_time);
        (0..=low)
            .map(|j| {
                let iv = self.interval(&ob, j);
                let table = self.gauss_table(&iv, self.kick.order() + 1);
                self.density_curvature(j, &iv, &table)
            })
            .sum()
    }

    fn tail_density(&self, ob0: f64) -> f64 {
        0.5 * (1.0 + erf_ext((self.mean_offset - ob0) / (2.0 * self.variance).sqrt()))
    }

    /// Numerator of the mean parallel frequency at `dangle`.
    pub fn mean_numerator(&self, dangle: f64, disruption_time: f64, higher_order: bool) -> f64 {
        let (ob, low) = self.frequency_breakpoints(dangle, disruption_time);
        let curved = higher_order && self.kick.order() > 1;
        let sigma = self.variance.sqrt();
        let mut out = 0.0;
        for j in 0..=low {
            let iv = self.interval(&ob, j);
            let shift = ob[j] + (self.mean_offset + self.kick.constant(j) - ob[j]) / iv.scale;
            let gaussian = (-0.5 * iv.lower * iv.lower / self.variance).exp()
                - (-0.5 * iv.upper * iv.upper / self.variance).exp();
            out += shift * self.erf_difference(&iv)
                + (self.variance / (2.0 * PI)).sqrt() / (iv.scale * iv.scale) * gaussian;
            if curved {
                out += self.mean_curvature(j, ob[j], &iv);
            }
        }
        let gap = self.mean_offset - ob[0];
        out + 0.5
            * ((2.0 / PI).sqrt() * sigma * (-0.5 * gap * gap / self.variance).exp()
                + self.mean_offset * (1.0 + erf_ext(gap / (2.0 * self.variance).sqrt())))
    }

    /// Mean parallel frequency offset, numerator over density.
    pub fn mean_offset_at(&self, dangle: f64, disruption_time: f64, higher_order: bool) -> f64 {
        let density = self.density(dangle, disruption_time, higher_order);
        let numerator = self.mean_numerator(dangle, disruption_time, higher_order);
        trace!(dangle, density, numerator, "approximate moments");
        numerator / density
    }
}

/// `int p(O) dO` (or `int O p(O) dO` with `weight_by_frequency`) over the real line.
///
/// The line is mapped onto `(-1, 1)` by `O = mean + sigma T/(1 - T^2)`.
pub fn frequency_integral<F: Fn(f64) -> f64>(
    variance: f64,
    mean: f64,
    weight_by_frequency: bool,
    density: F,
) -> Result<f64, SgError> {
    let sigma = variance.sqrt();
    let opts = AdaptiveOptions {
        limit: EXACT_SUBINTERVALS,
        ..AdaptiveOptions::default()
    };
    let estimate = integrate_adaptive(
        |t| {
            let denom = 1.0 - t * t;
            let opar = t / denom * sigma + mean;
            let jacobian = sigma * (1.0 + t * t) / (denom * denom);
            let p = density(opar);
            if p == 0.0 {
                return 0.0;
            }
            let weight = if weight_by_frequency { opar } else { 1.0 };
            weight * jacobian * p
        },
        -1.0,
        1.0,
        &opts,
    );
    if !estimate.value.is_finite() {
        return Err(SgError::Solver(
            ErrorInfo::new("moment-quadrature", "frequency integral did not produce a finite value")
                .with_context("abs_error", estimate.abs_error),
        ));
    }
    Ok(estimate.value)
}
