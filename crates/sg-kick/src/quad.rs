//! One-dimensional quadrature: adaptive Gauss-Kronrod, fixed Gauss-Legendre
//! and composite Simpson.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use sg_core::errors::{ErrorInfo, SgError};
use tracing::warn;

const XGK: [f64; 11] = [
    0.995_657_163_025_808_1,
    0.973_906_528_517_171_7,
    0.930_157_491_355_708_2,
    0.865_063_366_688_984_5,
    0.780_817_726_586_416_9,
    0.679_409_568_299_024_4,
    0.562_757_134_668_604_7,
    0.433_395_394_129_247_2,
    0.294_392_862_701_460_2,
    0.148_874_338_981_631_2,
    0.0,
];

const WGK: [f64; 11] = [
    0.011_694_638_867_371_874,
    0.032_558_162_307_964_73,
    0.054_755_896_574_351_996,
    0.075_039_674_810_919_95,
    0.093_125_454_583_697_6,
    0.109_387_158_802_297_64,
    0.123_491_976_262_065_85,
    0.134_709_217_311_473_33,
    0.142_775_938_577_060_08,
    0.147_739_104_901_338_5,
    0.149_445_554_002_916_9,
];

const WG: [f64; 5] = [
    0.066_671_344_308_688_14,
    0.149_451_349_150_580_6,
    0.219_086_362_515_982_04,
    0.269_266_719_309_996_35,
    0.295_524_224_714_752_87,
];

fn default_epsabs() -> f64 {
    1.49e-8
}

fn default_epsrel() -> f64 {
    1.49e-8
}

fn default_limit() -> usize {
    200
}

/// Tolerances of the adaptive rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveOptions {
    /// Absolute error target.
    #[serde(default = "default_epsabs")]
    pub epsabs: f64,
    /// Relative error target.
    #[serde(default = "default_epsrel")]
    pub epsrel: f64,
    /// Maximum number of subintervals.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            epsabs: default_epsabs(),
            epsrel: default_epsrel(),
            limit: default_limit(),
        }
    }
}

/// Estimate returned by [`integrate_adaptive`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadEstimate {
    /// Integral estimate.
    pub value: f64,
    /// Estimated absolute error.
    pub abs_error: f64,
    /// Whether the error target was met within the subdivision limit.
    pub converged: bool,
}

fn kronrod21<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64) -> (f64, f64) {
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);
    let fc = f(center);
    let mut kronrod = WGK[10] * fc;
    let mut gauss = 0.0;
    for j in 0..10 {
        let dx = half * XGK[j];
        let pair = f(center - dx) + f(center + dx);
        kronrod += WGK[j] * pair;
        if j % 2 == 1 {
            gauss += WG[j / 2] * pair;
        }
    }
    (kronrod * half, ((kronrod - gauss) * half).abs())
}

/// Globally adaptive 21-point Gauss-Kronrod quadrature over `[a, b]`.
///
/// The integrand is never evaluated at the end points, so integrable end
/// point singularities are allowed. Hitting the subdivision limit is logged
/// and the best estimate returned.
pub fn integrate_adaptive<F: Fn(f64) -> f64>(
    f: F,
    a: f64,
    b: f64,
    opts: &AdaptiveOptions,
) -> QuadEstimate {
    if a == b {
        return QuadEstimate {
            value: 0.0,
            abs_error: 0.0,
            converged: true,
        };
    }
    let (value, error) = kronrod21(&f, a, b);
    let mut pieces = vec![(a, b, value, error)];
    let mut total = value;
    let mut total_error = error;
    let limit = opts.limit.max(1);
    loop {
        let tolerance = opts.epsabs.max(opts.epsrel * total.abs());
        if total_error <= tolerance || !total_error.is_finite() {
            break;
        }
        if pieces.len() >= limit {
            warn!(
                a,
                b,
                subintervals = pieces.len(),
                abs_error = total_error,
                "adaptive quadrature reached its subdivision limit"
            );
            return QuadEstimate {
                value: total,
                abs_error: total_error,
                converged: false,
            };
        }
        let worst = pieces
            .iter()
            .enumerate()
            .max_by(|x, y| x.1 .3.partial_cmp(&y.1 .3).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        let (lo, hi, old_value, old_error) = pieces.swap_remove(worst);
        let mid = 0.5 * (lo + hi);
        let (left, left_error) = kronrod21(&f, lo, mid);
        let (right, right_error) = kronrod21(&f, mid, hi);
        total += left + right - old_value;
        total_error += left_error + right_error - old_error;
        pieces.push((lo, mid, left, left_error));
        pieces.push((mid, hi, right, right_error));
    }
    let total: f64 = pieces.iter().map(|piece| piece.2).sum();
    let total_error: f64 = pieces.iter().map(|piece| piece.3).sum();
    QuadEstimate {
        value: total,
        abs_error: total_error,
        converged: total_error.is_finite(),
    }
}

/// Fixed Gauss-Legendre rule with an even number of nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Builds the `n`-node rule; `n` must be even and positive.
    pub fn new(n: usize) -> Result<Self, SgError> {
        if n == 0 || n % 2 == 1 {
            return Err(SgError::Value(
                ErrorInfo::new(
                    "odd-gauss-legendre-order",
                    "Gauss-Legendre rules must use an even, positive number of nodes",
                )
                .with_context("nodes", n),
            ));
        }
        let mut nodes = vec![0.0; n];
        let mut weights = vec![0.0; n];
        for i in 0..n / 2 {
            let mut z = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            let mut derivative = 1.0;
            for _ in 0..100 {
                let mut p1 = 1.0;
                let mut p2 = 0.0;
                for j in 0..n {
                    let p3 = p2;
                    p2 = p1;
                    p1 = ((2 * j + 1) as f64 * z * p2 - j as f64 * p3) / (j + 1) as f64;
                }
                derivative = n as f64 * (z * p1 - p2) / (z * z - 1.0);
                let step = p1 / derivative;
                z -= step;
                if step.abs() < 1e-15 {
                    break;
                }
            }
            nodes[i] = -z;
            nodes[n - 1 - i] = z;
            let weight = 2.0 / ((1.0 - z * z) * derivative * derivative);
            weights[i] = weight;
            weights[n - 1 - i] = weight;
        }
        Ok(Self { nodes, weights })
    }

    /// Number of nodes.
    pub fn order(&self) -> usize {
        self.nodes.len()
    }

    /// Applies the rule on `[a, b]`.
    pub fn integrate<F: Fn(f64) -> f64>(&self, f: F, a: f64, b: f64) -> f64 {
        let center = 0.5 * (a + b);
        let half = 0.5 * (b - a);
        self.nodes
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| w * f(center + half * x))
            .sum::<f64>()
            * half
    }
}

/// Serializable choice of quadrature for the kick line integrals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuadratureSpec {
    /// Adaptive Gauss-Kronrod with the given tolerances.
    Adaptive(AdaptiveOptions),
    /// Fixed Gauss-Legendre rule.
    GaussLegendre {
        /// Number of nodes; must be even.
        nodes: usize,
    },
}

impl Default for QuadratureSpec {
    fn default() -> Self {
        QuadratureSpec::Adaptive(AdaptiveOptions::default())
    }
}

impl QuadratureSpec {
    /// Builds the rule, validating its parameters.
    pub fn build(&self) -> Result<Quadrature, SgError> {
        match self {
            QuadratureSpec::Adaptive(opts) => {
                if !(opts.epsabs >= 0.0 && opts.epsrel >= 0.0) || opts.epsabs + opts.epsrel == 0.0
                {
                    return Err(SgError::Config(
                        ErrorInfo::new("invalid-tolerance", "quadrature tolerances must be non-negative and not both zero")
                            .with_context("epsabs", opts.epsabs)
                            .with_context("epsrel", opts.epsrel),
                    ));
                }
                Ok(Quadrature::Adaptive(*opts))
            }
            QuadratureSpec::GaussLegendre { nodes } => {
                Ok(Quadrature::GaussLegendre(GaussLegendre::new(*nodes)?))
            }
        }
    }
}

/// Ready-to-use quadrature rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Quadrature {
    /// Adaptive Gauss-Kronrod.
    Adaptive(AdaptiveOptions),
    /// Fixed Gauss-Legendre.
    GaussLegendre(GaussLegendre),
}

impl Default for Quadrature {
    fn default() -> Self {
        Quadrature::Adaptive(AdaptiveOptions::default())
    }
}

impl Quadrature {
    /// Integrates `f` over `[a, b]`.
    pub fn integrate<F: Fn(f64) -> f64>(&self, f: F, a: f64, b: f64) -> f64 {
        match self {
            Quadrature::Adaptive(opts) => integrate_adaptive(f, a, b, opts).value,
            Quadrature::GaussLegendre(rule) => rule.integrate(f, a, b),
        }
    }
}

/// Composite Simpson rule on an evenly spaced grid with an odd number of samples.
pub fn simpson(values: &[f64], dx: f64) -> Result<f64, SgError> {
    if values.len() < 3 || values.len() % 2 == 0 {
        return Err(SgError::Value(
            ErrorInfo::new("simpson-samples", "Simpson's rule needs an odd number of at least three samples")
                .with_context("samples", values.len()),
        ));
    }
    let last = values.len() - 1;
    let interior: f64 = values[1..last]
        .iter()
        .enumerate()
        .map(|(i, v)| if i % 2 == 0 { 4.0 * v } else { 2.0 * v })
        .sum();
    Ok((values[0] + values[last] + interior) * dx / 3.0)
}
