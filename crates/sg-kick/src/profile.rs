//! Spherical density profiles used as perturbers.

use serde::{Deserialize, Serialize};
use sg_core::potential::SphericalPotential;

/// Plummer sphere, `Phi = -GM / sqrt(r^2 + rs^2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlummerSphere {
    /// Gravitational constant times mass.
    pub gm: f64,
    /// Softening scale.
    pub rs: f64,
}

impl SphericalPotential for PlummerSphere {
    fn radial_force(&self, r: f64) -> f64 {
        -self.gm * r / (r * r + self.rs * self.rs).powf(1.5)
    }
}

/// Hernquist sphere, `Phi = -GM / (r + rs)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HernquistSphere {
    /// Gravitational constant times mass.
    pub gm: f64,
    /// Scale radius.
    pub rs: f64,
}

impl SphericalPotential for HernquistSphere {
    fn radial_force(&self, r: f64) -> f64 {
        -self.gm / ((r + self.rs) * (r + self.rs))
    }
}

/// Profile family of a point-mass perturber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Plummer-softened point mass.
    Plummer,
    /// Hernquist sphere.
    Hernquist,
}
