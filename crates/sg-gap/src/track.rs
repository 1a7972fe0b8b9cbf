//! Fine, evenly spaced interpolation of the impact track where the kicks are evaluated.

use nalgebra::{Vector3, Vector6};
use sg_core::coords::{linspace, wrap_angles, CartesianState, CylindricalState};
use sg_core::errors::{ErrorInfo, SgError};
use sg_core::stream::SmoothStream;
use sg_spline::BSpline;
use tracing::debug;

use crate::basis::FrequencyBasis;
use crate::coordtransform::ImpactTrack;

/// Degree of the track interpolation.
const TRACK_DEGREE: usize = 3;

/// Impact track resampled on `points` evenly spaced parallel angles.
#[derive(Debug, Clone)]
pub struct KickTrack {
    splines: Vec<BSpline>,
    thetas: Vec<f64>,
    cartesian: Vec<CartesianState>,
    cylindrical: Vec<CylindricalState>,
    frequency_angle: Vec<Vector6<f64>>,
    closest: CartesianState,
}

fn interpolate_at(splines: &[BSpline], theta: f64) -> CartesianState {
    CartesianState::new(
        Vector3::new(splines[0].eval(theta), splines[1].eval(theta), splines[2].eval(theta)),
        Vector3::new(splines[3].eval(theta), splines[4].eval(theta), splines[5].eval(theta)),
    )
}

impl KickTrack {
    /// Interpolates every Cartesian coordinate of `track` with a cubic spline
    /// in parallel angle and samples the splines on `points` angles.
    ///
    /// The unperturbed frequencies and angles at every sample follow from the
    /// smooth stream's mean parallel frequency at the impact epoch.
    pub fn build(
        stream: &dyn SmoothStream,
        basis: &FrequencyBasis,
        track: &ImpactTrack,
        points: usize,
        impact_angle: f64,
    ) -> Result<Self, SgError> {
        if points < 2 {
            return Err(SgError::Value(
                ErrorInfo::new("kick-points", "the kick track needs at least two points")
                    .with_context("points", points),
            ));
        }
        let chunk_thetas = track.thetas();
        let splines = (0..6)
            .map(|component| {
                let values: Vec<f64> = track
                    .cartesian()
                    .iter()
                    .map(|state| {
                        if component < 3 {
                            state.pos[component]
                        } else {
                            state.vel[component - 3]
                        }
                    })
                    .collect();
                BSpline::interpolate(chunk_thetas, &values, TRACK_DEGREE)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let first = chunk_thetas[0];
        let last = chunk_thetas[chunk_thetas.len() - 1];
        let thetas = linspace(first, last, points);
        let cartesian: Vec<CartesianState> =
            thetas.iter().map(|&theta| interpolate_at(&splines, theta)).collect();
        let cylindrical = cartesian.iter().map(CartesianState::to_cylindrical).collect();

        let t = track.window().time_since_impact;
        let sign = basis.sign();
        let direction = basis.direction();
        let frequency = stream.progenitor_frequency();
        let angle_at_impact = stream.progenitor_angle() - frequency * t;
        let before = stream.disruption_time() - t;
        let frequency_angle = thetas
            .iter()
            .map(|&theta| {
                let offset = stream.mean_parallel_frequency(theta, sign, before)?;
                let omega = frequency + direction * (offset * sign);
                let angle = wrap_angles(&(angle_at_impact + direction * (theta * sign)));
                Ok(Vector6::new(omega[0], omega[1], omega[2], angle[0], angle[1], angle[2]))
            })
            .collect::<Result<Vec<_>, SgError>>()?;

        let closest = interpolate_at(&splines, impact_angle.abs());
        debug!(points, first, last, "interpolated kick track");
        Ok(Self {
            splines,
            thetas,
            cartesian,
            cylindrical,
            frequency_angle,
            closest,
        })
    }

    /// Re-derives the point of closest approach for a new impact angle.
    pub fn refresh_closest(&mut self, impact_angle: f64) {
        self.closest = interpolate_at(&self.splines, impact_angle.abs());
    }

    /// Parallel angles of the samples.
    pub fn thetas(&self) -> &[f64] {
        &self.thetas
    }

    /// Samples in Cartesian coordinates.
    pub fn cartesian(&self) -> &[CartesianState] {
        &self.cartesian
    }

    /// Samples in cylindrical coordinates.
    pub fn cylindrical(&self) -> &[CylindricalState] {
        &self.cylindrical
    }

    /// Unperturbed frequencies and angles of the samples.
    pub fn frequency_angle(&self) -> &[Vector6<f64>] {
        &self.frequency_angle
    }

    /// Track point hit by the perturber.
    pub fn closest(&self) -> &CartesianState {
        &self.closest
    }

    /// Track point at any angle inside the window.
    pub fn state_at(&self, theta: f64) -> CartesianState {
        interpolate_at(&self.splines, theta)
    }
}
