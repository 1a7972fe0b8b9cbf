//! Phase-space containers and cylindrical/Cartesian conversions.

use std::f64::consts::PI;

use nalgebra::{Vector3, Vector6};
use serde::{Deserialize, Serialize};

/// Galactocentric cylindrical phase-space point `(R, vR, vT, z, vz, phi)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CylindricalState {
    /// Cylindrical radius.
    pub r: f64,
    /// Radial velocity.
    pub vr: f64,
    /// Tangential velocity.
    pub vt: f64,
    /// Height above the plane.
    pub z: f64,
    /// Vertical velocity.
    pub vz: f64,
    /// Azimuth in radians.
    pub phi: f64,
}

impl CylindricalState {
    /// Builds a state from its six components in `(R, vR, vT, z, vz, phi)` order.
    pub fn new(r: f64, vr: f64, vt: f64, z: f64, vz: f64, phi: f64) -> Self {
        Self {
            r,
            vr,
            vt,
            z,
            vz,
            phi,
        }
    }

    /// Same position with all velocity components reversed.
    pub fn flipped(&self) -> Self {
        Self {
            vr: -self.vr,
            vt: -self.vt,
            vz: -self.vz,
            ..*self
        }
    }

    /// Components as a vector in `(R, vR, vT, z, vz, phi)` order.
    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(self.r, self.vr, self.vt, self.z, self.vz, self.phi)
    }

    /// Inverse of [`CylindricalState::to_vector`].
    pub fn from_vector(v: &Vector6<f64>) -> Self {
        Self::new(v[0], v[1], v[2], v[3], v[4], v[5])
    }

    /// Converts to Cartesian coordinates.
    pub fn to_cartesian(&self) -> CartesianState {
        let (sin, cos) = self.phi.sin_cos();
        CartesianState {
            pos: Vector3::new(self.r * cos, self.r * sin, self.z),
            vel: Vector3::new(
                self.vr * cos - self.vt * sin,
                self.vr * sin + self.vt * cos,
                self.vz,
            ),
        }
    }

    /// Difference `self - other` with the azimuthal component wrapped into `(-pi, pi]`.
    pub fn difference(&self, other: &CylindricalState) -> Vector6<f64> {
        let mut delta = self.to_vector() - other.to_vector();
        delta[5] = wrap_angle_difference(delta[5]);
        delta
    }
}

/// Cartesian phase-space point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianState {
    /// Position `(x, y, z)`.
    pub pos: Vector3<f64>,
    /// Velocity `(vx, vy, vz)`.
    pub vel: Vector3<f64>,
}

impl CartesianState {
    /// Builds a state from position and velocity.
    pub fn new(pos: Vector3<f64>, vel: Vector3<f64>) -> Self {
        Self { pos, vel }
    }

    /// Same position with the velocity reversed.
    pub fn flipped(&self) -> Self {
        Self {
            pos: self.pos,
            vel: -self.vel,
        }
    }

    /// Converts to cylindrical coordinates, with `phi` in `[0, 2pi)`.
    pub fn to_cylindrical(&self) -> CylindricalState {
        let r = self.pos.x.hypot(self.pos.y);
        let phi = self.pos.y.atan2(self.pos.x).rem_euclid(2.0 * PI);
        let (vr, vt) = velocity_to_cylindrical(&self.vel, phi);
        CylindricalState::new(r, vr, vt, self.pos.z, self.vel.z, phi)
    }
}

/// Projects a Cartesian velocity onto the cylindrical `(vR, vT)` basis at azimuth `phi`.
pub fn velocity_to_cylindrical(vel: &Vector3<f64>, phi: f64) -> (f64, f64) {
    let (sin, cos) = phi.sin_cos();
    (vel.x * cos + vel.y * sin, -vel.x * sin + vel.y * cos)
}

/// Wraps an angle difference into `(-pi, pi]`.
pub fn wrap_angle_difference(delta: f64) -> f64 {
    let wrapped = (delta + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

/// Reduces every component of an angle vector into `[0, 2pi)`.
pub fn wrap_angles(angles: &Vector3<f64>) -> Vector3<f64> {
    angles.map(|a| a.rem_euclid(2.0 * PI))
}

/// Evenly spaced samples between `start` and `stop` inclusive.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| {
                    if i == num - 1 {
                        stop
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}
