//! Kicks from a Plummer-softened stream of perturbers.
//!
//! The perturber is a line of Plummer spheres whose surface density
//! `G Sigma(s)` is given as a function of the time `s` at which each element
//! passes the point of closest approach; only `s` inside a finite window
//! contributes.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sg_core::coords::{linspace, CartesianState};
use sg_core::errors::{ErrorInfo, SgError};
use sg_core::orbit::{Orbit, OrbitIntegrator};
use sg_core::potential::Potential;
use tracing::debug;

use crate::geometry::{check_scale, relative_speed, shape_error, StraightEncounter};
use crate::impulse::CurvedEncounter;
use crate::quad::Quadrature;

const AUX_BACKWARD_SAMPLES: usize = 101;
const AUX_FORWARD_SAMPLES: usize = 201;

/// Surface density of the perturbing stream as a function of passage time.
pub type SurfaceDensity = dyn Fn(f64) -> f64 + Send + Sync;

/// Time window `[tmin, tmax]` over which the surface density is integrated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamWindow {
    tmin: f64,
    tmax: f64,
}

impl StreamWindow {
    /// Checks that the window is finite and non-empty.
    pub fn new(tmin: f64, tmax: f64) -> Result<Self, SgError> {
        if !(tmin.is_finite() && tmax.is_finite() && tmax > tmin) {
            return Err(SgError::Config(
                ErrorInfo::new("invalid-time-window", "stream window needs finite tmin < tmax")
                    .with_context("tmin", tmin)
                    .with_context("tmax", tmax),
            ));
        }
        Ok(Self { tmin, tmax })
    }

    /// Start of the window.
    pub fn tmin(&self) -> f64 {
        self.tmin
    }

    /// End of the window.
    pub fn tmax(&self) -> f64 {
        self.tmax
    }
}

fn finite_or_error(out: Vector3<f64>) -> Result<Vector3<f64>, SgError> {
    if out.iter().all(|v| v.is_finite()) {
        Ok(out)
    } else {
        Err(SgError::Solver(ErrorInfo::new(
            "kick-quadrature",
            "softened-stream kick integral is not finite",
        )))
    }
}

/// Kick from a softened stream on a straight stream.
#[allow(clippy::too_many_arguments)]
pub fn softened_stream_kick(
    v: &[Vector3<f64>],
    y: &[f64],
    b: f64,
    w: &Vector3<f64>,
    surface_density: &SurfaceDensity,
    rs: f64,
    window: &StreamWindow,
    quadrature: &Quadrature,
) -> Result<Vec<Vector3<f64>>, SgError> {
    if y.len() != v.len() {
        return Err(shape_error("y", v.len(), y.len()));
    }
    check_scale("b", b)?;
    check_scale("rs", rs)?;
    v.iter()
        .zip(y)
        .map(|(vi, &yi)| {
            let enc = StraightEncounter::new(vi, w)?;
            let (e0, e2) = enc.cross_dir;
            let tw = enc.tilde_w;
            let wperp2 = enc.wperp * enc.wperp;
            let base = (b * b + rs * rs) * enc.wmag2;
            let along = |s: f64| yi - enc.vmag * s;
            let denom = |s: f64| base + wperp2 * along(s) * along(s);
            let x = quadrature.integrate(
                |s| surface_density(s) * (b * enc.wmag2 * e2 - along(s) * enc.wpar * tw.x) / denom(s),
                window.tmin,
                window.tmax,
            );
            let yc = quadrature.integrate(
                |s| surface_density(s) * along(s) / denom(s),
                window.tmin,
                window.tmax,
            );
            let z = quadrature.integrate(
                |s| -surface_density(s) * (b * enc.wmag2 * e0 + along(s) * enc.wpar * tw.z) / denom(s),
                window.tmin,
                window.tmax,
            );
            let out = Vector3::new(x / enc.wmag, -wperp2 * yc / enc.wmag, z / enc.wmag);
            finite_or_error(enc.rotinv * out * 2.0)
        })
        .collect()
}

/// Orbit through the closest-approach point covering `[start, end]`.
fn closest_approach_orbit(
    enc: &CurvedEncounter<'_>,
    start: f64,
    end: f64,
    potential: &dyn Potential,
    integrator: &dyn OrbitIntegrator,
) -> Result<Orbit, SgError> {
    let initial = CartesianState::new(enc.closest_position, enc.closest_velocity);
    let start = start.min(0.0);
    let end = end.max(0.0);
    let forward = if end > 0.0 {
        Some(integrator.integrate(&initial, potential, &linspace(0.0, end, AUX_FORWARD_SAMPLES))?)
    } else {
        None
    };
    let backward = if start < 0.0 {
        Some(integrator.integrate(
            &initial,
            potential,
            &linspace(0.0, start, AUX_BACKWARD_SAMPLES),
        )?)
    } else {
        None
    };
    match (backward, forward) {
        (Some(back), Some(fwd)) => back.join(fwd),
        (Some(only), None) | (None, Some(only)) => Ok(only),
        (None, None) => Ok(Orbit::stationary(0.0, initial)),
    }
}

/// Kick from a softened stream on a curved stream.
///
/// `times` gives, per star, the time at which the star reaches its position
/// relative to closest approach at `t = 0`. The stream's path is followed
/// along an orbit integrated through the closest-approach point.
#[allow(clippy::too_many_arguments)]
pub fn softened_stream_kick_curved(
    enc: &CurvedEncounter<'_>,
    times: &[f64],
    surface_density: &SurfaceDensity,
    rs: f64,
    window: &StreamWindow,
    potential: &dyn Potential,
    integrator: &dyn OrbitIntegrator,
    quadrature: &Quadrature,
) -> Result<Vec<Vector3<f64>>, SgError> {
    let b0 = enc.validate()?;
    check_scale("rs", rs)?;
    if times.len() != enc.velocities.len() {
        return Err(shape_error("times", enc.velocities.len(), times.len()));
    }
    if times.is_empty() {
        return Ok(Vec::new());
    }
    let earliest = times.iter().copied().fold(f64::INFINITY, f64::min);
    let latest = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let orbit = closest_approach_orbit(
        enc,
        earliest - window.tmax,
        latest - window.tmin,
        potential,
        integrator,
    )?;
    debug!(
        stars = times.len(),
        start = orbit.span().0,
        end = orbit.span().1,
        "integrated softened-stream reference orbit"
    );
    let rs2 = rs * rs;
    let shift = b0 - enc.closest_position;
    times
        .iter()
        .map(|&tx| {
            let mut out = Vector3::zeros();
            for component in 0..3 {
                out[component] = quadrature.integrate(
                    |s| {
                        let Ok(state) = orbit.state_at(tx - s) else {
                            return f64::NAN;
                        };
                        let offset = shift + state.pos;
                        let wrel = enc.perturber_velocity - state.vel;
                        let Ok(wmag) = relative_speed(&wrel) else {
                            return f64::NAN;
                        };
                        let bdotw = offset.dot(&wrel) / wmag;
                        let denom = wmag * (offset.norm_squared() + rs2 - bdotw * bdotw);
                        -2.0 * surface_density(s) * (offset[component] - bdotw * wrel[component] / wmag)
                            / denom
                    },
                    window.tmin,
                    window.tmax,
                );
            }
            finite_or_error(out)
        })
        .collect()
}
