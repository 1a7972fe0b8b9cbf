//! Closed-form impulse kicks from point-mass perturbers.
//!
//! Straight-stream variants take the position of each star as a scalar
//! coordinate `y` along its own velocity, measured from the point of closest
//! approach. Curved-stream variants take full 3-D positions together with the
//! position `x0` and velocity `v0` of the stream at closest approach.
//! A single star is passed as a one-element slice.

use nalgebra::Vector3;
use sg_core::errors::SgError;

use crate::geometry::{
    check_scale, impact_vector, relative_speed, shape_error, StraightEncounter,
};
use crate::hernquist::hernquist_kernel;

/// Kick from a Plummer sphere on a straight stream.
pub fn plummer_kick(
    v: &[Vector3<f64>],
    y: &[f64],
    b: f64,
    w: &Vector3<f64>,
    gm: f64,
    rs: f64,
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
            let tw = &enc.tilde_w;
            let wperp2 = enc.wperp * enc.wperp;
            let denom = enc.wmag * ((b * b + rs * rs) * enc.wmag2 + wperp2 * yi * yi);
            let out = Vector3::new(
                (b * enc.wmag2 * e2 - yi * enc.wpar * tw.x) / denom,
                -wperp2 * yi / denom,
                -(b * enc.wmag2 * e0 + yi * enc.wpar * tw.z) / denom,
            );
            Ok(enc.rotinv * out * (2.0 * gm))
        })
        .collect()
}

/// Kick from a Hernquist sphere on a straight stream.
pub fn hernquist_kick(
    v: &[Vector3<f64>],
    y: &[f64],
    b: f64,
    w: &Vector3<f64>,
    gm: f64,
    rs: f64,
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
            let tw = &enc.tilde_w;
            let wperp2 = enc.wperp * enc.wperp;
            let big_b = (b * b + wperp2 * yi * yi / enc.wmag2).sqrt();
            let kernel = hernquist_kernel(big_b, rs)? / enc.wmag;
            let out = Vector3::new(
                (b * e2 - yi * enc.wpar * tw.x / enc.wmag2) * kernel,
                -wperp2 * yi * kernel / enc.wmag2,
                -(b * e0 + yi * enc.wpar * tw.z / enc.wmag2) * kernel,
            );
            Ok(enc.rotinv * out * (2.0 * gm))
        })
        .collect()
}

/// Shared inputs of the curved-stream kicks.
#[derive(Debug, Clone, Copy)]
pub struct CurvedEncounter<'a> {
    /// Star velocities.
    pub velocities: &'a [Vector3<f64>],
    /// Star positions.
    pub positions: &'a [Vector3<f64>],
    /// Impact parameter.
    pub impact_parameter: f64,
    /// Perturber velocity.
    pub perturber_velocity: Vector3<f64>,
    /// Stream position at closest approach.
    pub closest_position: Vector3<f64>,
    /// Stream velocity at closest approach.
    pub closest_velocity: Vector3<f64>,
}

impl CurvedEncounter<'_> {
    pub(crate) fn validate(&self) -> Result<Vector3<f64>, SgError> {
        if self.positions.len() != self.velocities.len() {
            return Err(shape_error(
                "positions",
                self.velocities.len(),
                self.positions.len(),
            ));
        }
        check_scale("b", self.impact_parameter)?;
        impact_vector(
            self.impact_parameter,
            &self.perturber_velocity,
            &self.closest_velocity,
        )
    }

    /// Per-star offset from the perturber's path and relative velocity `w - v`.
    pub(crate) fn offsets(
        &self,
        b0: &Vector3<f64>,
    ) -> impl Iterator<Item = (Vector3<f64>, Vector3<f64>)> + '_ {
        let b0 = *b0;
        self.positions
            .iter()
            .zip(self.velocities)
            .map(move |(x, v)| {
                (
                    b0 + x - self.closest_position,
                    self.perturber_velocity - v,
                )
            })
    }
}

/// Kick from a Plummer sphere on a curved stream.
pub fn plummer_kick_curved(
    enc: &CurvedEncounter<'_>,
    gm: f64,
    rs: f64,
) -> Result<Vec<Vector3<f64>>, SgError> {
    let b0 = enc.validate()?;
    check_scale("rs", rs)?;
    enc.offsets(&b0)
        .map(|(offset, wrel)| {
            let wmag = relative_speed(&wrel)?;
            let bdotw = offset.dot(&wrel) / wmag;
            let denom = wmag * (offset.norm_squared() + rs * rs - bdotw * bdotw);
            Ok((offset - wrel * (bdotw / wmag)) * (-2.0 * gm / denom))
        })
        .collect()
}

/// Kick from a Hernquist sphere on a curved stream.
pub fn hernquist_kick_curved(
    enc: &CurvedEncounter<'_>,
    gm: f64,
    rs: f64,
) -> Result<Vec<Vector3<f64>>, SgError> {
    let b0 = enc.validate()?;
    check_scale("rs", rs)?;
    enc.offsets(&b0)
        .map(|(offset, wrel)| {
            let wmag = relative_speed(&wrel)?;
            let bdotw = offset.dot(&wrel) / wmag;
            let big_b = (offset.norm_squared() - bdotw * bdotw).max(0.0).sqrt();
            let kernel = hernquist_kernel(big_b, rs)?;
            Ok((offset - wrel * (bdotw / wmag)) * (-2.0 * gm * kernel / wmag))
        })
        .collect()
}
