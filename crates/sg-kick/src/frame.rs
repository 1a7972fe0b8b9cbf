//! Rotations that align a velocity with a reference axis.

use nalgebra::{Matrix3, Vector3};
use sg_core::errors::{ErrorInfo, SgError};

const ALIGNMENT_TOLERANCE: f64 = 1e-10;

/// Rotation taking the direction of `v` onto the direction of `axis`.
///
/// With `inverse` set the transpose is returned, which maps the axis back
/// onto `v`. Parallel input gives the identity; antiparallel input gives a
/// half turn about an axis perpendicular to `axis`.
pub fn rotation_to_axis(
    v: &Vector3<f64>,
    axis: &Vector3<f64>,
    inverse: bool,
) -> Result<Matrix3<f64>, SgError> {
    let vnorm = v.norm();
    let anorm = axis.norm();
    if !(vnorm > 0.0 && anorm > 0.0) || !(vnorm.is_finite() && anorm.is_finite()) {
        return Err(SgError::Domain(
            ErrorInfo::new("zero-direction", "cannot rotate a zero or non-finite vector")
                .with_context("v", format!("{:?}", v.as_slice()))
                .with_context("axis", format!("{:?}", axis.as_slice())),
        ));
    }
    let from = v / vnorm;
    let to = axis / anorm;
    let cos = from.dot(&to);
    let rotation = if (cos - 1.0).abs() < ALIGNMENT_TOLERANCE {
        Matrix3::identity()
    } else if (cos + 1.0).abs() < ALIGNMENT_TOLERANCE {
        half_turn_about_perpendicular(&to)
    } else {
        let cross = from.cross(&to);
        let skew = cross.cross_matrix();
        let sin2 = cross.norm_squared();
        Matrix3::identity() + skew + skew * skew * ((1.0 - cos) / sin2)
    };
    Ok(if inverse {
        rotation.transpose()
    } else {
        rotation
    })
}

/// Rotation taking `v` onto the `+y` axis, the along-stream direction of the kick frame.
pub fn rotation_to_y(v: &Vector3<f64>, inverse: bool) -> Result<Matrix3<f64>, SgError> {
    rotation_to_axis(v, &Vector3::y(), inverse)
}

fn half_turn_about_perpendicular(to: &Vector3<f64>) -> Matrix3<f64> {
    let candidate = [Vector3::x(), Vector3::y(), Vector3::z()]
        .into_iter()
        .min_by(|a, b| {
            a.dot(to)
                .abs()
                .partial_cmp(&b.dot(to).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or_else(Vector3::x);
    let n = (candidate - to * candidate.dot(to)).normalize();
    n * n.transpose() * 2.0 - Matrix3::identity()
}
