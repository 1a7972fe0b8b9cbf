//! The perturbed-stream context tying the pieces together.

use std::sync::Arc;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use sg_core::errors::{ErrorInfo, SgError};
use sg_core::potential::SphericalPotential;
use sg_core::rng::SampleRng;
use sg_core::stream::{AngleFrequencySample, SmoothStream};
use sg_kick::{KickEnvironment, Perturber, Profile, Quadrature};
use tracing::info;

use crate::basis::FrequencyBasis;
use crate::config::{GapConfig, PerturberConfig};
use crate::coordtransform::{build_impact_track, check_arm, ImpactTrack, ImpactWindow};
use crate::mapper::{KickComponent, KickMap, KickSplines};
use crate::moments::{frequency_integral, MomentEngine};
use crate::sampling::{apply_kicks, p_opar_apar, p_opar_apar_at};
use crate::track::KickTrack;

/// Evaluation options of the density and mean-frequency moments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentOptions {
    /// Closed-form breakpoint sums instead of quadrature.
    #[serde(default = "default_approx")]
    pub approx: bool,
    /// Overrides [`GapConfig::higher_order`].
    #[serde(default)]
    pub higher_order: Option<bool>,
    /// Overrides the stream's disruption time.
    #[serde(default)]
    pub disruption_time: Option<f64>,
}

fn default_approx() -> bool {
    true
}

impl Default for MomentOptions {
    fn default() -> Self {
        Self {
            approx: default_approx(),
            higher_order: None,
            disruption_time: None,
        }
    }
}

impl MomentOptions {
    /// Quadrature evaluation.
    pub fn exact() -> Self {
        Self {
            approx: false,
            ..Self::default()
        }
    }
}

/// Sizes and diagnostics of a configured context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapSummary {
    /// SHA-256 of the configuration.
    pub config_hash: String,
    /// Perturber kind.
    pub perturber: String,
    /// Resolved angular window.
    pub window: ImpactWindow,
    /// Number of kick samples.
    pub kick_points: usize,
    /// Intervals of the breakpoint kick.
    pub breakpoint_intervals: usize,
    /// Mean of `det(dOmega/dJ)` over the impact track.
    pub mean_det: f64,
    /// Its natural log.
    pub log_mean_det: f64,
}

/// Smooth stream perturbed by one impact.
///
/// Holds a reference to the smooth model and answers density, mean-frequency
/// and sampling queries by deciding per star whether the unperturbed model
/// applies or the star has to be de-kicked first.
pub struct GapPerturbation<'a> {
    stream: &'a dyn SmoothStream,
    config: GapConfig,
    perturber: Perturber,
    quadrature: Quadrature,
    basis: FrequencyBasis,
    impact: ImpactTrack,
    kick_track: KickTrack,
    kicks: KickMap,
}

impl<'a> GapPerturbation<'a> {
    /// Builds the context for a Plummer or Hernquist perturber described in `config`.
    pub fn new(stream: &'a dyn SmoothStream, config: GapConfig) -> Result<Self, SgError> {
        let perturber = match config.perturber {
            PerturberConfig::Plummer { gm, rs } => Perturber::PointMass {
                gm,
                rs,
                profile: Profile::Plummer,
            },
            PerturberConfig::Hernquist { gm, rs } => Perturber::PointMass {
                gm,
                rs,
                profile: Profile::Hernquist,
            },
            PerturberConfig::Potential => {
                return Err(SgError::Config(
                    ErrorInfo::new("missing-perturber", "no perturber structure was given")
                        .with_hint("set perturber to plummer or hernquist with gm and rs, or use with_perturber"),
                ))
            }
        };
        Self::build(stream, config, perturber)
    }

    /// Builds the context for an explicit spherical perturber potential.
    pub fn with_perturber(
        stream: &'a dyn SmoothStream,
        mut config: GapConfig,
        potential: Arc<dyn SphericalPotential>,
    ) -> Result<Self, SgError> {
        config.perturber = PerturberConfig::Potential;
        Self::build(stream, config, Perturber::Spherical(potential))
    }

    fn build(stream: &'a dyn SmoothStream, config: GapConfig, perturber: Perturber) -> Result<Self, SgError> {
        config.validate()?;
        check_arm(config.impact_angle, stream.leading())?;
        let quadrature = config.kick_quadrature.build()?;
        let basis = FrequencyBasis::new(
            &stream.frequency_covariance(),
            &stream.progenitor_frequency(),
            stream.leading(),
            stream.mean_offset_sigma(),
        )?;
        let window = ImpactWindow::resolve(
            &config,
            &basis,
            stream.disruption_time(),
            stream.mean_offset_sigma(),
        )?;
        let impact = build_impact_track(
            stream,
            &basis,
            &window,
            config.orbit_samples,
            config.workers,
        )?;
        let points = config.kick_points.unwrap_or(30 * window.chunks);
        let kick_track = KickTrack::build(stream, &basis, &impact, points, config.impact_angle)?;
        let kicks = compute_kicks(stream, &config, &perturber, &quadrature, &basis, &impact, &kick_track)?;
        let context = Self {
            stream,
            config,
            perturber,
            quadrature,
            basis,
            impact,
            kick_track,
            kicks,
        };
        info!(
            config_hash = %context.config.stable_hash()?,
            perturber = context.perturber.kind(),
            chunks = window.chunks,
            points,
            "configured stream gap"
        );
        Ok(context)
    }

    /// Moves the impact along the same arm, keeping the fitted track.
    ///
    /// Only the point of closest approach, the kicks and their interpolants
    /// are recomputed.
    pub fn set_impact_angle(&mut self, impact_angle: f64) -> Result<(), SgError> {
        check_arm(impact_angle, self.stream.leading())?;
        let delta = self.impact.window().delta_angle;
        if !(impact_angle.abs() < delta) {
            return Err(SgError::Config(
                ErrorInfo::new("impact-outside-track", "the impact must lie inside the track window")
                    .with_context("delta_angle_track_impact", delta)
                    .with_context("impact_angle", impact_angle),
            ));
        }
        let mut kick_track = self.kick_track.clone();
        kick_track.refresh_closest(impact_angle);
        let mut config = self.config.clone();
        config.impact_angle = impact_angle;
        self.kicks = compute_kicks(
            self.stream,
            &config,
            &self.perturber,
            &self.quadrature,
            &self.basis,
            &self.impact,
            &kick_track,
        )?;
        self.kick_track = kick_track;
        self.config = config;
        Ok(())
    }

    fn moments(&self) -> MomentEngine<'_> {
        MomentEngine::new(
            self.kicks.splines().parallel_poly().inner(),
            self.config.time_since_impact,
            self.basis.mean_offset(),
            self.basis.parallel_variance(),
        )
    }

    fn disruption_time(&self, opts: &MomentOptions) -> f64 {
        opts.disruption_time.unwrap_or_else(|| self.stream.disruption_time())
    }

    fn exact_moment(&self, dangle: f64, weight_by_frequency: bool) -> Result<f64, SgError> {
        frequency_integral(
            self.basis.parallel_variance(),
            self.basis.mean_offset(),
            weight_by_frequency,
            |opar| {
                p_opar_apar_at(
                    self.stream,
                    self.kicks.splines(),
                    self.config.time_since_impact,
                    opar,
                    dangle,
                )
            },
        )
    }

    /// Density of the stream at parallel angle `dangle`.
    pub fn density_par(&self, dangle: f64, opts: &MomentOptions) -> Result<f64, SgError> {
        if opts.approx {
            let higher = opts.higher_order.unwrap_or(self.config.higher_order);
            Ok(self.moments().density(dangle, self.disruption_time(opts), higher))
        } else {
            self.exact_moment(dangle, false)
        }
    }

    /// Mean parallel frequency offset at `dangle`.
    pub fn mean_omega(&self, dangle: f64, opts: &MomentOptions) -> Result<f64, SgError> {
        if opts.approx {
            let higher = opts.higher_order.unwrap_or(self.config.higher_order);
            Ok(self
                .moments()
                .mean_offset_at(dangle, self.disruption_time(opts), higher))
        } else {
            Ok(self.exact_moment(dangle, true)? / self.exact_moment(dangle, false)?)
        }
    }

    /// Mean frequency vector at `dangle`: the progenitor frequency plus the
    /// mean offset along the stream direction.
    pub fn mean_omega_vector(&self, dangle: f64, opts: &MomentOptions) -> Result<Vector3<f64>, SgError> {
        let offset = self.mean_omega(dangle, opts)?;
        Ok(self.stream.progenitor_frequency() + self.basis.direction() * (offset * self.basis.sign()))
    }

    /// Lowest parallel frequency reaching `dangle` in the piecewise-linear kick model.
    pub fn min_opar(&self, dangle: f64, disruption_time: Option<f64>) -> f64 {
        let td = disruption_time.unwrap_or_else(|| self.stream.disruption_time());
        self.moments().min_opar(dangle, td)
    }

    /// Joint density of parallel frequency offsets and one parallel angle.
    pub fn p_opar_apar(&self, opar: &[f64], apar: f64) -> Vec<f64> {
        p_opar_apar(
            self.stream,
            self.kicks.splines(),
            self.config.time_since_impact,
            opar,
            apar,
        )
    }

    /// Draws `n` perturbed (frequency, angle, time) samples from the
    /// configured seed.
    pub fn sample_angle_frequency_time(&self, n: usize) -> Result<Vec<AngleFrequencySample>, SgError> {
        let mut rng = SampleRng::from_seed(self.config.seed);
        self.sample_with(n, &mut rng)
    }

    /// Draws `n` perturbed samples from `rng`.
    pub fn sample_with(&self, n: usize, rng: &mut SampleRng) -> Result<Vec<AngleFrequencySample>, SgError> {
        let mut samples = self.stream.sample(n, rng)?;
        apply_kicks(
            &mut samples,
            self.kicks.splines(),
            &self.basis,
            &self.stream.progenitor_frequency(),
            &self.stream.progenitor_angle(),
            self.config.time_since_impact,
        );
        Ok(samples)
    }

    /// Interpolated kick component at `dangle`; zero outside the window.
    pub fn kick(&self, component: KickComponent, dangle: f64) -> f64 {
        self.kicks.splines().eval(component, dangle)
    }

    /// [`GapPerturbation::kick`] over many angles.
    pub fn kicks(&self, component: KickComponent, dangles: &[f64]) -> Vec<f64> {
        self.kicks.splines().component(component).eval_many(dangles)
    }

    /// Derivative of the parallel frequency kick at `dangle`.
    pub fn parallel_kick_derivative(&self, dangle: f64) -> f64 {
        self.kicks.splines().parallel_derivative().eval(dangle)
    }

    /// All kick interpolants.
    pub fn kick_splines(&self) -> &KickSplines {
        self.kicks.splines()
    }

    /// Kicks and offsets along the fine track.
    pub fn kick_map(&self) -> &KickMap {
        &self.kicks
    }

    /// Impact-time track.
    pub fn impact_track(&self) -> &ImpactTrack {
        &self.impact
    }

    /// Fine track the kicks were evaluated on.
    pub fn kick_track(&self) -> &KickTrack {
        &self.kick_track
    }

    /// Frequency eigenbasis.
    pub fn basis(&self) -> &FrequencyBasis {
        &self.basis
    }

    /// Configuration the context was built from.
    pub fn config(&self) -> &GapConfig {
        &self.config
    }

    /// Perturber in use.
    pub fn perturber(&self) -> &Perturber {
        &self.perturber
    }

    /// Diagnostics of the configured impact.
    pub fn summary(&self) -> Result<GapSummary, SgError> {
        Ok(GapSummary {
            config_hash: self.config.stable_hash()?,
            perturber: self.perturber.kind().to_string(),
            window: *self.impact.window(),
            kick_points: self.kick_track.thetas().len(),
            breakpoint_intervals: self.kicks.splines().parallel_poly().inner().intervals(),
            mean_det: self.impact.mean_det(),
            log_mean_det: self.impact.log_mean_det(),
        })
    }
}

fn compute_kicks(
    stream: &dyn SmoothStream,
    config: &GapConfig,
    perturber: &Perturber,
    quadrature: &Quadrature,
    basis: &FrequencyBasis,
    impact: &ImpactTrack,
    kick_track: &KickTrack,
) -> Result<KickMap, SgError> {
    let env = KickEnvironment {
        potential: stream.potential(),
        integrator: stream.integrator(),
        quadrature,
    };
    KickMap::compute(
        kick_track,
        impact,
        basis,
        perturber,
        config.impact_parameter,
        &Vector3::from(config.perturber_velocity),
        &env,
        config.kick_transform,
        stream.action_angle(),
        config.spline_order,
    )
}
