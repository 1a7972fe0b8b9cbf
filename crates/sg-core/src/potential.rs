//! Gravitational field evaluators consumed by the kick and orbit code.

use nalgebra::Vector3;

/// Time-dependent gravitational field.
pub trait Potential: Send + Sync {
    /// Acceleration `-grad Phi` at `pos` and time `t`.
    fn acceleration(&self, pos: &Vector3<f64>, t: f64) -> Vector3<f64>;
}

/// Static, spherically symmetric field around the origin.
pub trait SphericalPotential: Send + Sync {
    /// Radial force `-dPhi/dr` at radius `r`; negative values attract.
    fn radial_force(&self, r: f64) -> f64;

    /// Acceleration at an offset from the centre.
    fn acceleration_at(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        let r = offset.norm();
        if r == 0.0 {
            return Vector3::zeros();
        }
        offset * (self.radial_force(r) / r)
    }
}

/// Field with no mass; orbits are straight lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeSpace;

impl Potential for FreeSpace {
    fn acceleration(&self, _pos: &Vector3<f64>, _t: f64) -> Vector3<f64> {
        Vector3::zeros()
    }
}

/// Superposition of several fields.
pub struct PotentialSum<'a> {
    parts: Vec<&'a dyn Potential>,
}

impl<'a> PotentialSum<'a> {
    /// Combines the given fields.
    pub fn new(parts: Vec<&'a dyn Potential>) -> Self {
        Self { parts }
    }
}

impl Potential for PotentialSum<'_> {
    fn acceleration(&self, pos: &Vector3<f64>, t: f64) -> Vector3<f64> {
        self.parts
            .iter()
            .fold(Vector3::zeros(), |acc, part| acc + part.acceleration(pos, t))
    }
}
