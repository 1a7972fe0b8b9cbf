#![deny(missing_docs)]
#![doc = "Spline machinery for the stream-gap engine: interpolating B-splines, their breakpoint form and zero-outside-range wrappers."]

pub mod bspline;
pub mod ppoly;
pub mod range;

pub use bspline::{BSpline, MAX_DEGREE};
pub use ppoly::PiecewisePolynomial;
pub use range::{Interpolant, RangeChecked};
