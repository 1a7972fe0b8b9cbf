#![deny(missing_docs)]
#![doc = "Density, mean frequency and samples of a tidal stream perturbed by a single impact."]

pub mod basis;
/// Construction-time parameters and their validation.
pub mod config;
pub mod context;
pub mod coordtransform;
pub mod mapper;
pub mod moments;
/// Joint frequency-angle density and kicked samples.
pub mod sampling;
/// Fine interpolation of the impact track.
pub mod track;

pub use basis::{FrequencyBasis, ParallelPerpendicular};
pub use config::{GapConfig, KickTransform, PerturberConfig};
pub use context::{GapPerturbation, GapSummary, MomentOptions};
pub use coordtransform::{build_impact_track, check_arm, ImpactTrack, ImpactWindow};
pub use mapper::{frequency_angle_offsets, velocity_kicks, KickComponent, KickMap, KickSplines};
pub use moments::{frequency_integral, gauss_poly_integrals, MomentEngine};
pub use sampling::{apply_kicks, p_opar_apar, p_opar_apar_at};
pub use track::KickTrack;
