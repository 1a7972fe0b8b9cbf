//! Hernquist's projected-profile function and the kick kernel built on it.

use sg_core::errors::{ErrorInfo, SgError};

/// Relative distance from `B = rs` inside which the kernel uses its limit.
const KERNEL_LIMIT_BAND: f64 = 1e-6;

/// Hernquist (1990) `X(s)`, eqs. 33-34.
///
/// `s = 1` is a removable singularity with value one; negative `s` is a
/// domain error.
pub fn hernquist_x(s: f64) -> Result<f64, SgError> {
    if s.is_nan() || s < 0.0 {
        return Err(SgError::Domain(
            ErrorInfo::new("hernquist-negative", "Hernquist X is undefined for negative s")
                .with_context("s", s),
        ));
    }
    if s < 1.0 {
        let root = (1.0 - s * s).sqrt();
        Ok(((1.0 + root) / s).ln() / root)
    } else if s == 1.0 {
        Ok(1.0)
    } else {
        let root = (s * s - 1.0).sqrt();
        Ok((1.0 / s).acos() / root)
    }
}

/// `(1 - 2 rs X(s) / (rs + B)) / (B^2 - rs^2)` with `s = sqrt(2B / (rs + B))`.
///
/// At `B = rs` numerator and denominator both vanish; the kernel tends to
/// `1 / (3 rs^2)` there.
pub fn hernquist_kernel(big_b: f64, rs: f64) -> Result<f64, SgError> {
    if (big_b - rs).abs() <= KERNEL_LIMIT_BAND * rs {
        return Ok(1.0 / (3.0 * rs * rs));
    }
    let s = (2.0 * big_b / (rs + big_b)).sqrt();
    let xfac = 1.0 - 2.0 * rs / (rs + big_b) * hernquist_x(s)?;
    Ok(xfac / (big_b * big_b - rs * rs))
}
