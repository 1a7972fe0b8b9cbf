#![deny(missing_docs)]
#![doc = "Velocity kicks imparted on stream stars by a passing perturber, in the impulse approximation and by direct orbit integration."]

pub mod frame;
pub mod full;
pub mod general;
pub mod geometry;
pub mod hernquist;
pub mod impulse;
pub mod perturber;
/// Density profiles of point-mass perturbers.
pub mod profile;
pub mod quad;
pub mod stream;

pub use frame::{rotation_to_axis, rotation_to_y};
pub use full::{full_plummer_kick, orbit_integration_kick, MovingPerturber};
pub use general::{general_kick, general_kick_curved};
pub use geometry::{impact_vector, StraightEncounter, PERPENDICULAR_THRESHOLD};
pub use hernquist::{hernquist_kernel, hernquist_x};
pub use impulse::{
    hernquist_kick, hernquist_kick_curved, plummer_kick, plummer_kick_curved, CurvedEncounter,
};
pub use perturber::{KickEnvironment, Perturber};
pub use profile::{HernquistSphere, PlummerSphere, Profile};
pub use quad::{
    integrate_adaptive, simpson, AdaptiveOptions, GaussLegendre, QuadEstimate, Quadrature,
    QuadratureSpec,
};
pub use stream::{softened_stream_kick, softened_stream_kick_curved, StreamWindow, SurfaceDensity};
