//! Contracts of the smooth-stream collaborators.
//!
//! The gap engine never builds a stream model itself. It borrows an
//! implementation of [`SmoothStream`] and treats every method as a pure
//! evaluator that may be called concurrently from several worker threads.

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use crate::coords::CylindricalState;
use crate::errors::SgError;
use crate::orbit::{Orbit, OrbitIntegrator};
use crate::potential::Potential;
use crate::rng::SampleRng;

/// Actions, frequencies and angles of one phase-space point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionAngleCoords {
    /// Radial, azimuthal and vertical actions.
    pub actions: Vector3<f64>,
    /// Radial, azimuthal and vertical frequencies.
    pub frequencies: Vector3<f64>,
    /// Radial, azimuthal and vertical angles in `[0, 2pi)`.
    pub angles: Vector3<f64>,
}

impl ActionAngleCoords {
    /// Frequencies followed by angles.
    pub fn frequency_angle(&self) -> Vector6<f64> {
        Vector6::new(
            self.frequencies[0],
            self.frequencies[1],
            self.frequencies[2],
            self.angles[0],
            self.angles[1],
            self.angles[2],
        )
    }
}

/// Maps phase-space states to action-angle coordinates.
pub trait ActionAngleSolver: Send + Sync {
    /// Solves a single state.
    fn action_angle(&self, state: &CylindricalState) -> Result<ActionAngleCoords, SgError>;

    /// Solves a batch of states; the default loops over [`ActionAngleSolver::action_angle`].
    fn action_angle_batch(
        &self,
        states: &[CylindricalState],
    ) -> Result<Vec<ActionAngleCoords>, SgError> {
        states.iter().map(|state| self.action_angle(state)).collect()
    }
}

/// Inputs of the single-point track fit.
pub struct TrackFitRequest<'a> {
    /// Reference orbit the fit starts from.
    pub orbit: &'a Orbit,
    /// Time on `orbit` of the starting point.
    pub time: f64,
    /// Progenitor angles at the epoch of the track.
    pub progenitor_angle: Vector3<f64>,
    /// `+1` or `-1`; orientation of the arm relative to `direction`.
    pub sign: f64,
    /// Unit vector of the mean frequency offset.
    pub direction: Vector3<f64>,
    /// Mean parallel frequency offset as a function of parallel angle.
    pub mean_offset: &'a (dyn Fn(f64) -> Result<f64, SgError> + Sync),
    /// Parallel angle of the track point to solve for.
    pub target_angle: f64,
}

/// Output of the single-point track fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPointFit {
    /// Actions, frequencies and angles of the fitted point.
    pub coords: ActionAngleCoords,
    /// Jacobian `d(Omega, theta) / d(R, vR, vT, z, vz, phi)` at the point.
    pub jacobian: Matrix6<f64>,
    /// Inverse of [`TrackPointFit::jacobian`].
    pub inverse_jacobian: Matrix6<f64>,
    /// Fitted phase-space point.
    pub state: CylindricalState,
    /// Target frequencies followed by target angles.
    pub frequency_angle: Vector6<f64>,
    /// Determinant of `dOmega/dJ` at the point.
    pub det_frequency_action: f64,
}

/// One unperturbed draw from the stream's generative model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleFrequencySample {
    /// Frequencies of the released star.
    pub frequency: Vector3<f64>,
    /// Present-day angles of the released star.
    pub angle: Vector3<f64>,
    /// Time since release.
    pub dt: f64,
}

/// Smooth (unperturbed) tidal stream model.
pub trait SmoothStream: Send + Sync {
    /// Present-day progenitor phase-space point.
    fn progenitor(&self) -> CylindricalState;

    /// Progenitor frequencies.
    fn progenitor_frequency(&self) -> Vector3<f64>;

    /// Present-day progenitor angles.
    fn progenitor_angle(&self) -> Vector3<f64>;

    /// Covariance of the frequency offsets of released stars.
    fn frequency_covariance(&self) -> Matrix3<f64>;

    /// Mean parallel frequency offset in units of its dispersion.
    fn mean_offset_sigma(&self) -> f64;

    /// Whether the modelled arm leads the progenitor.
    fn leading(&self) -> bool;

    /// Time since disruption began.
    fn disruption_time(&self) -> f64;

    /// Number of refinement passes used when fitting a track.
    fn track_iterations(&self) -> usize;

    /// Mean parallel frequency offset at parallel angle `dangle` for stars
    /// released within `disruption_time`.
    fn mean_parallel_frequency(
        &self,
        dangle: f64,
        offset_sign: f64,
        disruption_time: f64,
    ) -> Result<f64, SgError>;

    /// Joint density of parallel frequency and angle offsets for stars
    /// released within `disruption_time`.
    fn parallel_density(&self, opar: f64, apar: f64, disruption_time: f64) -> f64;

    /// Draws `n` unperturbed (frequency, angle, time) triples.
    fn sample(
        &self,
        n: usize,
        rng: &mut SampleRng,
    ) -> Result<Vec<AngleFrequencySample>, SgError>;

    /// Fits one track point; see [`TrackFitRequest`].
    fn fit_track_point(&self, request: &TrackFitRequest<'_>) -> Result<TrackPointFit, SgError>;

    /// Galaxy potential the stream orbits in.
    fn potential(&self) -> &dyn Potential;

    /// Orbit integrator matching [`SmoothStream::potential`].
    fn integrator(&self) -> &dyn OrbitIntegrator;

    /// Action-angle solver matching [`SmoothStream::potential`].
    fn action_angle(&self) -> &dyn ActionAngleSolver;
}
