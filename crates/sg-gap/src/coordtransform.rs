//! Track of the stream at the time of impact and its local
//! phase-space to frequency-angle transformation.

use nalgebra::{Matrix6, Vector3};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use sg_core::coords::{linspace, CartesianState};
use sg_core::errors::{ErrorInfo, SgError};
use sg_core::orbit::{integrate_backward, Orbit};
use sg_core::stream::{SmoothStream, TrackFitRequest, TrackPointFit};
use tracing::{debug, info, warn};

use crate::basis::FrequencyBasis;
use crate::config::GapConfig;

/// Angular spacing of the default chunk count.
pub const CHUNK_SPACING: f64 = 0.15;

/// Fewest chunks the impact track is fitted at.
pub const MIN_CHUNKS: usize = 4;

/// Fails unless the impact side matches the modelled arm.
///
/// A positive impact angle hits the leading arm, a negative one the trailing arm.
pub fn check_arm(impact_angle: f64, leading: bool) -> Result<(), SgError> {
    let impact_leading = impact_angle > 0.0;
    if impact_leading != leading {
        let (impact, arm) = if impact_leading {
            ("leading", "trailing")
        } else {
            ("trailing", "leading")
        };
        return Err(SgError::Config(
            ErrorInfo::new(
                "arm-mismatch",
                format!("cannot model a {impact} impact on a {arm} arm"),
            )
            .with_context("impact_angle", impact_angle)
            .with_hint("flip the sign of impact_angle or model the other arm"),
        ));
    }
    Ok(())
}

/// Angular window and time of the impact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactWindow {
    /// Time elapsed since the impact.
    pub time_since_impact: f64,
    /// Parallel-angle extent of the track near the impact.
    pub delta_angle: f64,
    /// Number of fitted track chunks.
    pub chunks: usize,
}

impl ImpactWindow {
    /// Fills in the defaults of `config` against the stream's dispersion.
    pub fn resolve(
        config: &GapConfig,
        basis: &FrequencyBasis,
        disruption_time: f64,
        mean_offset_sigma: f64,
    ) -> Result<Self, SgError> {
        let t = config.time_since_impact;
        if !(t < disruption_time) {
            return Err(SgError::Config(
                ErrorInfo::new("impact-after-disruption", "the impact must happen after disruption began")
                    .with_context("time_since_impact", t)
                    .with_context("disruption_time", disruption_time),
            ));
        }
        let plausible =
            (mean_offset_sigma + 4.0) * basis.parallel_variance().sqrt() * (disruption_time - t);
        let delta_angle = match config.delta_angle_track_impact {
            Some(delta) => {
                if delta > plausible {
                    warn!(
                        delta,
                        plausible, "angular window of the impact track is large compared to the stream"
                    );
                }
                delta
            }
            None => plausible,
        };
        if !(config.impact_angle.abs() < delta_angle) {
            return Err(SgError::Config(
                ErrorInfo::new("impact-outside-track", "the impact must lie inside the track window")
                    .with_context("delta_angle_track_impact", delta_angle)
                    .with_context("impact_angle", config.impact_angle),
            ));
        }
        let chunks = config.track_chunks_impact.unwrap_or_else(|| {
            ((delta_angle / CHUNK_SPACING).floor() as usize + 1).max(MIN_CHUNKS)
        });
        Ok(Self {
            time_since_impact: t,
            delta_angle,
            chunks,
        })
    }
}

/// Stream track at the time of impact, fitted at evenly spaced parallel angles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactTrack {
    window: ImpactWindow,
    thetas: Vec<f64>,
    fits: Vec<TrackPointFit>,
    cartesian: Vec<CartesianState>,
    mean_det: f64,
    log_mean_det: f64,
    progenitor_orbit: Orbit,
    auxiliary_orbit: Orbit,
}

impl ImpactTrack {
    /// Window the track was fitted for.
    pub fn window(&self) -> &ImpactWindow {
        &self.window
    }

    /// Parallel angles of the chunks.
    pub fn thetas(&self) -> &[f64] {
        &self.thetas
    }

    /// Per-chunk fits.
    pub fn fits(&self) -> &[TrackPointFit] {
        &self.fits
    }

    /// Per-chunk Jacobians `d(Omega, theta)/d(R, vR, vT, z, vz, phi)`.
    pub fn jacobians(&self) -> Vec<Matrix6<f64>> {
        self.fits.iter().map(|fit| fit.jacobian).collect()
    }

    /// Track in Cartesian coordinates.
    pub fn cartesian(&self) -> &[CartesianState] {
        &self.cartesian
    }

    /// Mean of `det(dOmega/dJ)` over the chunks.
    pub fn mean_det(&self) -> f64 {
        self.mean_det
    }

    /// Natural log of [`ImpactTrack::mean_det`].
    pub fn log_mean_det(&self) -> f64 {
        self.log_mean_det
    }

    /// Progenitor integrated back to the start of disruption.
    pub fn progenitor_orbit(&self) -> &Orbit {
        &self.progenitor_orbit
    }

    /// Orbit at the mean stream frequency the chunks start from.
    pub fn auxiliary_orbit(&self) -> &Orbit {
        &self.auxiliary_orbit
    }

    /// Chunk whose angle is closest to `theta`.
    pub fn nearest_chunk(&self, theta: f64) -> usize {
        let mut best = 0;
        for (idx, t) in self.thetas.iter().enumerate() {
            if (t - theta).abs() < (self.thetas[best] - theta).abs() {
                best = idx;
            }
        }
        best
    }
}

fn chunk_pool(workers: usize, chunks: usize) -> Result<Option<ThreadPool>, SgError> {
    if workers <= 1 {
        return Ok(None);
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.min(chunks))
        .build()
        .map(Some)
        .map_err(|err| SgError::Parallel(ErrorInfo::new("thread-pool", err.to_string())))
}

fn solve_chunks<F>(pool: Option<&ThreadPool>, chunks: usize, solve: F) -> Result<Vec<TrackPointFit>, SgError>
where
    F: Fn(usize) -> Result<TrackPointFit, SgError> + Send + Sync,
{
    match pool {
        None => (0..chunks).map(&solve).collect(),
        Some(pool) => pool.install(|| (0..chunks).into_par_iter().map(&solve).collect()),
    }
}

/// Fits the impact-time track.
///
/// The progenitor is integrated back to the start of disruption, the track
/// point at zero angle offset seeds an auxiliary orbit, and every chunk is
/// fitted from that orbit at a time scaled by the frequency ratio between
/// progenitor and auxiliary orbit. The stream's refinement passes then re-fit
/// each chunk from its previous solution. Chunks of one pass run on `workers`
/// threads; passes run one after the other.
pub fn build_impact_track(
    stream: &dyn SmoothStream,
    basis: &FrequencyBasis,
    window: &ImpactWindow,
    orbit_samples: usize,
    workers: usize,
) -> Result<ImpactTrack, SgError> {
    let t = window.time_since_impact;
    let disruption = stream.disruption_time();
    let progenitor_orbit = integrate_backward(
        stream.integrator(),
        stream.potential(),
        &stream.progenitor().to_cartesian(),
        0.0,
        disruption,
        orbit_samples,
    )?;
    let progenitor_angle: Vector3<f64> =
        stream.progenitor_angle() - stream.progenitor_frequency() * t;
    let sign = basis.sign();
    let direction = basis.direction();
    let mean_offset = move |dangle: f64| stream.mean_parallel_frequency(dangle, sign, disruption - t);
    let request = |orbit: &Orbit, time: f64, target_angle: f64| -> Result<TrackPointFit, SgError> {
        stream.fit_track_point(&TrackFitRequest {
            orbit,
            time,
            progenitor_angle,
            sign,
            direction,
            mean_offset: &mean_offset,
            target_angle,
        })
    };

    let seed = request(&progenitor_orbit, -t, 0.0)?;
    let along = basis.progenitor_along();
    let dt = window.delta_angle / along;
    if !dt.is_finite() {
        return Err(SgError::Value(
            ErrorInfo::new("zero-progenitor-frequency", "progenitor frequency has no component along the stream")
                .with_context("progenitor_along", along),
        ));
    }
    let auxiliary = stream.action_angle().action_angle(&seed.state)?;
    let auxiliary_along = basis.parallel(&auxiliary.frequencies);
    let ratio = (along / auxiliary_along).abs();
    if !ratio.is_finite() {
        return Err(SgError::Solver(
            ErrorInfo::new("auxiliary-frequency", "auxiliary orbit has no frequency along the stream")
                .with_context("auxiliary_along", auxiliary_along),
        ));
    }

    let chunks = window.chunks;
    let track_times = linspace(0.0, 2.0 * dt, 2 * chunks - 1);
    let grid = linspace(0.0, 2.0 * dt * ratio, orbit_samples.max(2 * chunks - 1));
    let auxiliary_orbit =
        stream
            .integrator()
            .integrate(&seed.state.to_cartesian(), stream.potential(), &grid)?;
    debug!(chunks, dt, ratio, "integrated auxiliary orbit");

    let thetas = linspace(0.0, window.delta_angle, chunks);
    let pool = chunk_pool(workers, chunks)?;
    let mut fits = solve_chunks(pool.as_ref(), chunks, |ii| {
        request(&auxiliary_orbit, track_times[ii] * ratio, thetas[ii])
    })?;
    for pass in 0..stream.track_iterations() {
        let previous = fits;
        fits = solve_chunks(pool.as_ref(), chunks, |ii| {
            let start = Orbit::stationary(0.0, previous[ii].state.to_cartesian());
            request(&start, 0.0, thetas[ii])
        })?;
        debug!(pass, chunks, "refined impact track");
    }

    let mean_det = fits.iter().map(|fit| fit.det_frequency_action).sum::<f64>() / chunks as f64;
    let cartesian = fits.iter().map(|fit| fit.state.to_cartesian()).collect();
    info!(
        chunks,
        delta_angle = window.delta_angle,
        workers,
        mean_det,
        "fitted impact track"
    );
    Ok(ImpactTrack {
        window: *window,
        thetas,
        fits,
        cartesian,
        mean_det,
        log_mean_det: mean_det.ln(),
        progenitor_orbit,
        auxiliary_orbit,
    })
}
