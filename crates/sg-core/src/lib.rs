#![deny(missing_docs)]
#![doc = "Core types and collaborator contracts for the stream-gap perturbation engine."]

/// Cylindrical and Cartesian phase-space points.
pub mod coords;
pub mod errors;
/// Canonical JSON and SHA-256 digests.
pub mod hash;
pub mod orbit;
pub mod potential;
pub mod rng;
pub mod stream;

pub use coords::{linspace, wrap_angle_difference, wrap_angles, CartesianState, CylindricalState};
pub use errors::{ErrorInfo, SgError};
pub use hash::{stable_hash_string, to_canonical_json_bytes};
pub use orbit::{integrate_backward, Leapfrog, Orbit, OrbitIntegrator};
pub use potential::{FreeSpace, Potential, PotentialSum, SphericalPotential};
pub use rng::{derive_substream_seed, SampleRng};
pub use stream::{
    ActionAngleCoords, ActionAngleSolver, AngleFrequencySample, SmoothStream, TrackFitRequest,
    TrackPointFit,
};
