//! Perturber descriptions and dispatch to the matching kick calculator.

use std::fmt;
use std::sync::Arc;

use nalgebra::Vector3;
use sg_core::errors::{ErrorInfo, SgError};
use sg_core::orbit::OrbitIntegrator;
use sg_core::potential::{Potential, SphericalPotential};
use tracing::debug;

use crate::full::full_plummer_kick;
use crate::general::{general_kick, general_kick_curved};
use crate::impulse::{
    hernquist_kick, hernquist_kick_curved, plummer_kick, plummer_kick_curved, CurvedEncounter,
};
use crate::profile::Profile;
use crate::quad::Quadrature;
use crate::stream::{softened_stream_kick, softened_stream_kick_curved, StreamWindow, SurfaceDensity};

fn perturber_error(code: &str, message: &str) -> SgError {
    SgError::Config(ErrorInfo::new(code, message))
}

/// What flies past the stream.
#[derive(Clone)]
pub enum Perturber {
    /// Point mass softened by a Plummer or Hernquist profile.
    PointMass {
        /// Gravitational constant times mass.
        gm: f64,
        /// Scale radius.
        rs: f64,
        /// Density profile.
        profile: Profile,
    },
    /// Arbitrary spherical potential, integrated numerically.
    Spherical(Arc<dyn SphericalPotential>),
    /// Stream of Plummer spheres with a time-dependent surface density.
    SoftenedStream {
        /// `G Sigma(t)`.
        surface_density: Arc<SurfaceDensity>,
        /// Plummer softening of each element.
        rs: f64,
        /// Passage times over which the surface density is integrated.
        window: StreamWindow,
    },
    /// Plummer sphere followed by full orbit integration.
    FullIntegration {
        /// Gravitational constant times mass.
        gm: f64,
        /// Plummer scale.
        rs: f64,
        /// Half-width of the integration window in units of `rs / |w - v0|`.
        tmax_factor: f64,
        /// Samples per half of the window.
        samples: usize,
    },
}

impl fmt::Debug for Perturber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Perturber::PointMass { gm, rs, profile } => f
                .debug_struct("PointMass")
                .field("gm", gm)
                .field("rs", rs)
                .field("profile", profile)
                .finish(),
            Perturber::Spherical(_) => f.write_str("Spherical(..)"),
            Perturber::SoftenedStream { rs, window, .. } => f
                .debug_struct("SoftenedStream")
                .field("rs", rs)
                .field("window", window)
                .finish_non_exhaustive(),
            Perturber::FullIntegration {
                gm,
                rs,
                tmax_factor,
                samples,
            } => f
                .debug_struct("FullIntegration")
                .field("gm", gm)
                .field("rs", rs)
                .field("tmax_factor", tmax_factor)
                .field("samples", samples)
                .finish(),
        }
    }
}

/// Collaborators needed by the kicks that integrate orbits or line integrals.
#[derive(Clone, Copy)]
pub struct KickEnvironment<'a> {
    /// Galactic potential.
    pub potential: &'a dyn Potential,
    /// Orbit integrator for the galactic potential.
    pub integrator: &'a dyn OrbitIntegrator,
    /// Rule for the numerical line integrals.
    pub quadrature: &'a Quadrature,
}

impl Perturber {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Perturber::PointMass {
                profile: Profile::Plummer,
                ..
            } => "plummer",
            Perturber::PointMass {
                profile: Profile::Hernquist,
                ..
            } => "hernquist",
            Perturber::Spherical(_) => "spherical",
            Perturber::SoftenedStream { .. } => "softened-stream",
            Perturber::FullIntegration { .. } => "full-integration",
        }
    }

    /// Kicks on a straight stream with along-stream coordinates `y`.
    pub fn straight_kicks(
        &self,
        v: &[Vector3<f64>],
        y: &[f64],
        b: f64,
        w: &Vector3<f64>,
        quadrature: &Quadrature,
    ) -> Result<Vec<Vector3<f64>>, SgError> {
        match self {
            Perturber::PointMass {
                gm,
                rs,
                profile: Profile::Plummer,
            } => plummer_kick(v, y, b, w, *gm, *rs),
            Perturber::PointMass {
                gm,
                rs,
                profile: Profile::Hernquist,
            } => hernquist_kick(v, y, b, w, *gm, *rs),
            Perturber::Spherical(potential) => general_kick(v, y, b, w, potential.as_ref(), quadrature),
            Perturber::SoftenedStream {
                surface_density,
                rs,
                window,
            } => softened_stream_kick(v, y, b, w, surface_density.as_ref(), *rs, window, quadrature),
            Perturber::FullIntegration { .. } => Err(perturber_error(
                "straight-unsupported",
                "full orbit integration needs 3-D positions; use the curved-stream kicks",
            )),
        }
    }

    /// Kicks on a curved stream.
    ///
    /// `times` gives the per-star times relative to closest approach and is
    /// required by the softened-stream perturber only.
    pub fn curved_kicks(
        &self,
        enc: &CurvedEncounter<'_>,
        times: Option<&[f64]>,
        env: &KickEnvironment<'_>,
    ) -> Result<Vec<Vector3<f64>>, SgError> {
        debug!(perturber = self.kind(), stars = enc.velocities.len(), "computing kicks");
        match self {
            Perturber::PointMass {
                gm,
                rs,
                profile: Profile::Plummer,
            } => plummer_kick_curved(enc, *gm, *rs),
            Perturber::PointMass {
                gm,
                rs,
                profile: Profile::Hernquist,
            } => hernquist_kick_curved(enc, *gm, *rs),
            Perturber::Spherical(potential) => {
                general_kick_curved(enc, potential.as_ref(), env.quadrature)
            }
            Perturber::SoftenedStream {
                surface_density,
                rs,
                window,
            } => {
                let times = times.ok_or_else(|| {
                    perturber_error(
                        "missing-encounter-times",
                        "softened-stream kicks need the time at which each star reaches its position",
                    )
                })?;
                softened_stream_kick_curved(
                    enc,
                    times,
                    surface_density.as_ref(),
                    *rs,
                    window,
                    env.potential,
                    env.integrator,
                    env.quadrature,
                )
            }
            Perturber::FullIntegration {
                gm,
                rs,
                tmax_factor,
                samples,
            } => full_plummer_kick(
                enc,
                env.potential,
                env.integrator,
                *gm,
                *rs,
                *tmax_factor,
                *samples,
            ),
        }
    }
}
