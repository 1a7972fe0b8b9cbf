//! Impulse kicks from arbitrary spherical perturbers by line integration.
//!
//! The force is integrated along the unperturbed relative path
//! `X(t) = b + w t + y`, with `t = T / (1 - T^2)` mapping `T` in `(-1, 1)`
//! onto the whole time axis.

use nalgebra::Vector3;
use sg_core::errors::{ErrorInfo, SgError};
use sg_core::potential::SphericalPotential;

use crate::geometry::{check_scale, relative_speed, shape_error, StraightEncounter};
use crate::impulse::CurvedEncounter;
use crate::quad::Quadrature;

fn line_integral(
    offset: &Vector3<f64>,
    wrel: &Vector3<f64>,
    potential: &dyn SphericalPotential,
    quadrature: &Quadrature,
) -> Result<Vector3<f64>, SgError> {
    let mut out = Vector3::zeros();
    for component in 0..3 {
        let integrand = |big_t: f64| {
            let one_minus = 1.0 - big_t * big_t;
            let t = big_t / one_minus;
            let x = offset + wrel * t;
            let r = x.norm();
            if r == 0.0 {
                return 0.0;
            }
            (1.0 + big_t * big_t) / (one_minus * one_minus) * potential.radial_force(r) * x[component]
                / r
        };
        out[component] = quadrature.integrate(integrand, -1.0, 1.0);
    }
    if out.iter().all(|v| v.is_finite()) {
        Ok(out)
    } else {
        Err(SgError::Solver(
            ErrorInfo::new("kick-quadrature", "line integral of the perturber force is not finite")
                .with_context("offset", format!("{:?}", offset.as_slice())),
        ))
    }
}

/// Kick from a spherical potential on a straight stream.
pub fn general_kick(
    v: &[Vector3<f64>],
    y: &[f64],
    b: f64,
    w: &Vector3<f64>,
    potential: &dyn SphericalPotential,
    quadrature: &Quadrature,
) -> Result<Vec<Vector3<f64>>, SgError> {
    if y.len() != v.len() {
        return Err(shape_error("y", v.len(), y.len()));
    }
    check_scale("b", b)?;
    v.iter()
        .zip(y)
        .map(|(vi, &yi)| {
            let enc = StraightEncounter::new(vi, w)?;
            let offset = enc.impact_offset(b) + Vector3::new(0.0, yi, 0.0);
            let kick = line_integral(&offset, &enc.relative_velocity(), potential, quadrature)?;
            Ok(enc.rotinv * kick)
        })
        .collect()
}

/// Kick from a spherical potential on a curved stream.
pub fn general_kick_curved(
    enc: &CurvedEncounter<'_>,
    potential: &dyn SphericalPotential,
    quadrature: &Quadrature,
) -> Result<Vec<Vector3<f64>>, SgError> {
    let b0 = enc.validate()?;
    enc.offsets(&b0)
        .map(|(offset, wrel)| {
            relative_speed(&wrel)?;
            line_integral(&offset, &wrel, potential, quadrature)
        })
        .collect()
}
