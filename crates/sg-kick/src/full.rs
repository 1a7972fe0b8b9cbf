//! Kicks computed without the impulse approximation.
//!
//! Both routines integrate real orbits and are meant for validation of the
//! impulse kicks, not for use in the hot path.

use std::sync::Arc;

use nalgebra::Vector3;
use sg_core::coords::{linspace, CartesianState};
use sg_core::errors::{ErrorInfo, SgError};
use sg_core::orbit::{Orbit, OrbitIntegrator};
use sg_core::potential::{Potential, PotentialSum, SphericalPotential};
use tracing::debug;

use crate::geometry::{check_scale, relative_speed};
use crate::impulse::CurvedEncounter;
use crate::profile::PlummerSphere;
use crate::quad::simpson;

fn grid_error(samples: usize) -> SgError {
    SgError::Value(
        ErrorInfo::new("integration-grid", "orbit kicks need at least two samples per half")
            .with_context("samples", samples),
    )
}

/// A spherical perturber moving along a precomputed orbit.
///
/// Outside the orbit's time span it exerts no force.
#[derive(Clone)]
pub struct MovingPerturber {
    orbit: Orbit,
    profile: Arc<dyn SphericalPotential>,
}

impl MovingPerturber {
    /// Perturber with the given profile following `orbit`.
    pub fn new(orbit: Orbit, profile: Arc<dyn SphericalPotential>) -> Self {
        Self { orbit, profile }
    }

    /// Path of the perturber's centre.
    pub fn orbit(&self) -> &Orbit {
        &self.orbit
    }
}

impl Potential for MovingPerturber {
    fn acceleration(&self, pos: &Vector3<f64>, t: f64) -> Vector3<f64> {
        let (start, end) = self.orbit.span();
        if t < start || t > end {
            return Vector3::zeros();
        }
        match self.orbit.state_at(t) {
            Ok(centre) => self.profile.acceleration_at(&(pos - centre.pos)),
            Err(_) => Vector3::zeros(),
        }
    }
}

/// Orbit from `initial` at `t = 0` covering `[-tmax, tmax]` with `2 samples - 1` points.
fn two_sided_orbit(
    initial: &CartesianState,
    potential: &dyn Potential,
    integrator: &dyn OrbitIntegrator,
    tmax: f64,
    samples: usize,
) -> Result<Orbit, SgError> {
    let backward = integrator.integrate(initial, potential, &linspace(0.0, -tmax, samples))?;
    let forward = integrator.integrate(initial, potential, &linspace(0.0, tmax, samples))?;
    backward.join(forward)
}

/// Kick from a spherical perturber, with the force integrated along each
/// star's true orbit in the galaxy over `[-tmax, tmax]`.
///
/// The perturber still moves on a straight line through the point of
/// closest approach.
pub fn orbit_integration_kick(
    enc: &CurvedEncounter<'_>,
    perturber: &dyn SphericalPotential,
    tmax: f64,
    galaxy: &dyn Potential,
    integrator: &dyn OrbitIntegrator,
    samples: usize,
) -> Result<Vec<Vector3<f64>>, SgError> {
    let b0 = enc.validate()?;
    check_scale("tmax", tmax)?;
    if samples < 2 {
        return Err(grid_error(samples));
    }
    let dt = tmax / (samples - 1) as f64;
    enc.positions
        .iter()
        .zip(enc.velocities)
        .map(|(x, v)| {
            let orbit = two_sided_orbit(&CartesianState::new(*x, *v), galaxy, integrator, tmax, samples)?;
            let mut components = [
                Vec::with_capacity(orbit.times().len()),
                Vec::with_capacity(orbit.times().len()),
                Vec::with_capacity(orbit.times().len()),
            ];
            for (t, state) in orbit.times().iter().zip(orbit.states()) {
                let offset = b0 + state.pos - enc.closest_position - enc.perturber_velocity * *t;
                let acc = perturber.acceleration_at(&offset);
                for (series, value) in components.iter_mut().zip(acc.iter()) {
                    series.push(*value);
                }
            }
            Ok(Vector3::new(
                simpson(&components[0], dt)?,
                simpson(&components[1], dt)?,
                simpson(&components[2], dt)?,
            ))
        })
        .collect()
}

/// Kick from a Plummer sphere obtained by integrating every star in the
/// galaxy plus the moving perturber and comparing with the galaxy alone.
///
/// The encounter is followed over `t` in `[-T, T]` with
/// `T = tmax_factor * rs / |w - v0|`.
#[allow(clippy::too_many_arguments)]
pub fn full_plummer_kick(
    enc: &CurvedEncounter<'_>,
    galaxy: &dyn Potential,
    integrator: &dyn OrbitIntegrator,
    gm: f64,
    rs: f64,
    tmax_factor: f64,
    samples: usize,
) -> Result<Vec<Vector3<f64>>, SgError> {
    let b0 = enc.validate()?;
    check_scale("rs", rs)?;
    check_scale("tmax_factor", tmax_factor)?;
    if samples < 2 {
        return Err(grid_error(samples));
    }
    let tmax = tmax_factor * rs / relative_speed(&(enc.perturber_velocity - enc.closest_velocity))?;
    let centre = CartesianState::new(enc.closest_position - b0, enc.perturber_velocity);
    let path = two_sided_orbit(&centre, galaxy, integrator, tmax, samples)?;
    let perturber = MovingPerturber::new(path, Arc::new(PlummerSphere { gm, rs }));
    let combined = PotentialSum::new(vec![galaxy, &perturber as &dyn Potential]);
    debug!(stars = enc.velocities.len(), tmax, "full Plummer integration");

    let to_start = linspace(0.0, -tmax, samples);
    let through = linspace(-tmax, tmax, 2 * samples);
    let to_now = linspace(tmax, 0.0, samples);
    enc.positions
        .iter()
        .zip(enc.velocities)
        .map(|(x, v)| {
            let start = integrator
                .integrate(&CartesianState::new(*x, *v), galaxy, &to_start)?
                .state_at(-tmax)?;
            let after = integrator.integrate(&start, &combined, &through)?.state_at(tmax)?;
            let now = integrator.integrate(&after, galaxy, &to_now)?.state_at(0.0)?;
            Ok(now.vel - v)
        })
        .collect()
}
