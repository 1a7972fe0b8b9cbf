//! Encounter geometry shared by the closed-form and quadrature kicks.

use nalgebra::{Matrix3, Vector3};
use sg_core::errors::{ErrorInfo, SgError};

use crate::frame::rotation_to_y;

/// Below this perpendicular relative speed the impact direction is taken
/// from the degenerate branch.
pub const PERPENDICULAR_THRESHOLD: f64 = 1e-10;

pub(crate) fn shape_error(what: &str, expected: usize, got: usize) -> SgError {
    SgError::Value(
        ErrorInfo::new("kick-input-shape", format!("{what} must have one entry per star"))
            .with_context("expected", expected)
            .with_context("got", got),
    )
}

pub(crate) fn check_scale(name: &str, value: f64) -> Result<(), SgError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SgError::Config(
            ErrorInfo::new("invalid-kick-parameter", format!("{name} must be positive and finite"))
                .with_context(name, value),
        ))
    }
}

/// Straight-line encounter seen from a star moving along `+y`.
///
/// The perturber velocity `w` is rotated into the frame where the star's
/// velocity is `|v| y`; `wpar` and `wperp` are the relative speed along and
/// across the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StraightEncounter {
    /// Rotation back to the original frame.
    pub rotinv: Matrix3<f64>,
    /// Perturber velocity in the stream frame.
    pub tilde_w: Vector3<f64>,
    /// Speed of the star.
    pub vmag: f64,
    /// Relative speed along the stream.
    pub wpar: f64,
    /// Relative speed across the stream.
    pub wperp: f64,
    /// Squared relative speed.
    pub wmag2: f64,
    /// Relative speed.
    pub wmag: f64,
    /// Unit vector `(tilde_w.x, tilde_w.z) / wperp` of the cross-stream relative velocity.
    pub cross_dir: (f64, f64),
}

impl StraightEncounter {
    /// Builds the frame for star velocity `v` and perturber velocity `w`.
    ///
    /// When the relative velocity is (nearly) parallel to the stream the
    /// cross-stream direction is undefined; it is then fixed to the frame's
    /// `x` axis, the limit of a relative velocity tilted towards `x`.
    pub fn new(v: &Vector3<f64>, w: &Vector3<f64>) -> Result<Self, SgError> {
        let rot = rotation_to_y(v, false)?;
        let rotinv = rot.transpose();
        let tilde_w = rot * w;
        let vmag = v.norm();
        let wperp = tilde_w.x.hypot(tilde_w.z);
        let wpar = vmag - tilde_w.y;
        let wmag2 = wpar * wpar + wperp * wperp;
        let wmag = wmag2.sqrt();
        if !(wmag > 0.0) {
            return Err(SgError::Domain(
                ErrorInfo::new(
                    "zero-relative-velocity",
                    "perturber is comoving with the star; the impulse integral diverges",
                )
                .with_context("v", format!("{:?}", v.as_slice()))
                .with_context("w", format!("{:?}", w.as_slice())),
            ));
        }
        let cross_dir = if wperp.abs() < PERPENDICULAR_THRESHOLD {
            (1.0, 0.0)
        } else {
            (tilde_w.x / wperp, tilde_w.z / wperp)
        };
        Ok(Self {
            rotinv,
            tilde_w,
            vmag,
            wpar,
            wperp,
            wmag2,
            wmag,
            cross_dir,
        })
    }

    /// Offset of the perturber's closest approach from the star at `y = 0`, scaled to `b`.
    pub fn impact_offset(&self, b: f64) -> Vector3<f64> {
        Vector3::new(-self.cross_dir.1 * b, 0.0, self.cross_dir.0 * b)
    }

    /// Relative velocity in the stream frame.
    pub fn relative_velocity(&self) -> Vector3<f64> {
        Vector3::new(self.tilde_w.x, -self.wpar, self.tilde_w.z)
    }
}

/// Unit impact direction `w x v0`, scaled to the impact parameter.
pub fn impact_vector(
    b: f64,
    w: &Vector3<f64>,
    v0: &Vector3<f64>,
) -> Result<Vector3<f64>, SgError> {
    let cross = w.cross(v0);
    let norm = cross.norm();
    if !(norm > 0.0) {
        return Err(SgError::Domain(
            ErrorInfo::new(
                "undefined-impact-direction",
                "perturber and stream velocities are parallel; w x v0 vanishes",
            )
            .with_context("w", format!("{:?}", w.as_slice()))
            .with_context("v0", format!("{:?}", v0.as_slice())),
        ));
    }
    Ok(cross * (b / norm))
}

pub(crate) fn relative_speed(wrel: &Vector3<f64>) -> Result<f64, SgError> {
    let wmag = wrel.norm();
    if wmag > 0.0 && wmag.is_finite() {
        Ok(wmag)
    } else {
        Err(SgError::Domain(
            ErrorInfo::new(
                "zero-relative-velocity",
                "perturber is comoving with the star; the impulse integral diverges",
            )
            .with_context("w_minus_v", format!("{:?}", wrel.as_slice())),
        ))
    }
}
