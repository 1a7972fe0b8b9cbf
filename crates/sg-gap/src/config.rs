use serde::{Deserialize, Serialize};
use sg_core::errors::{ErrorInfo, SgError};
use sg_core::hash::stable_hash_string;
use sg_kick::QuadratureSpec;
use sg_spline::MAX_DEGREE;

fn config_error(code: &str, message: impl Into<String>) -> SgError {
    SgError::Config(ErrorInfo::new(code, message.into()))
}

fn serde_error(code: &str, err: impl ToString) -> SgError {
    SgError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// Structure of the perturber.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PerturberConfig {
    /// Plummer sphere.
    Plummer {
        /// Gravitational constant times mass.
        gm: f64,
        /// Plummer scale.
        rs: f64,
    },
    /// Hernquist sphere.
    Hernquist {
        /// Gravitational constant times mass.
        gm: f64,
        /// Scale radius.
        rs: f64,
    },
    /// Explicit spherical potential handed to
    /// [`crate::GapPerturbation::with_perturber`].
    Potential,
}

impl Default for PerturberConfig {
    fn default() -> Self {
        PerturberConfig::Plummer { gm: 1e-4, rs: 0.01 }
    }
}

/// How a velocity kick is turned into frequency and angle offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KickTransform {
    /// First-order map through the Jacobian of the nearest track chunk.
    #[default]
    Linearized,
    /// Direct action-angle solve of the perturbed and unperturbed states.
    Solver,
}

/// Construction-time parameters of a [`crate::GapPerturbation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapConfig {
    /// Distance of closest approach.
    #[serde(default = "default_impact_parameter")]
    pub impact_parameter: f64,
    /// Perturber velocity in the galactocentric Cartesian frame.
    #[serde(default = "default_perturber_velocity")]
    pub perturber_velocity: [f64; 3],
    /// Perturber structure.
    #[serde(default)]
    pub perturber: PerturberConfig,
    /// Time elapsed since the impact.
    #[serde(default = "default_time_since_impact")]
    pub time_since_impact: f64,
    /// Parallel angle of the impact; the sign selects the arm.
    #[serde(default = "default_impact_angle")]
    pub impact_angle: f64,
    /// Angular extent of the track near the impact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_angle_track_impact: Option<f64>,
    /// Number of chunks the track near the impact is fitted at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_chunks_impact: Option<usize>,
    /// Number of points the kicks are computed at before interpolation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kick_points: Option<usize>,
    /// Degree of the kick splines.
    #[serde(default = "default_spline_order")]
    pub spline_order: usize,
    /// Add the non-linear spline terms to the approximate moments.
    #[serde(default)]
    pub higher_order: bool,
    /// Mapping of velocity kicks to frequency-angle offsets.
    #[serde(default)]
    pub kick_transform: KickTransform,
    /// Rule for the numerical kick line integrals.
    #[serde(default)]
    pub kick_quadrature: QuadratureSpec,
    /// Samples of the backward progenitor orbit.
    #[serde(default = "default_orbit_samples")]
    pub orbit_samples: usize,
    /// Worker threads for the track-chunk fits.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Master seed for sampling.
    #[serde(default)]
    pub seed: u64,
}

fn default_impact_parameter() -> f64 {
    1.0
}

fn default_perturber_velocity() -> [f64; 3] {
    [0.0, 1.0, 0.0]
}

fn default_time_since_impact() -> f64 {
    1.0
}

fn default_impact_angle() -> f64 {
    1.0
}

fn default_spline_order() -> usize {
    3
}

fn default_orbit_samples() -> usize {
    1001
}

fn default_workers() -> usize {
    1
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            impact_parameter: default_impact_parameter(),
            perturber_velocity: default_perturber_velocity(),
            perturber: PerturberConfig::default(),
            time_since_impact: default_time_since_impact(),
            impact_angle: default_impact_angle(),
            delta_angle_track_impact: None,
            track_chunks_impact: None,
            kick_points: None,
            spline_order: default_spline_order(),
            higher_order: false,
            kick_transform: KickTransform::default(),
            kick_quadrature: QuadratureSpec::default(),
            orbit_samples: default_orbit_samples(),
            workers: default_workers(),
            seed: 0,
        }
    }
}

fn positive(name: &str, value: f64) -> Result<(), SgError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SgError::Config(
            ErrorInfo::new("invalid-parameter", format!("{name} must be positive and finite"))
                .with_context(name, value),
        ))
    }
}

impl GapConfig {
    /// Parses a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, SgError> {
        serde_yaml::from_str(text).map_err(|err| serde_error("yaml-deserialize", err))
    }

    /// Parses a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, SgError> {
        serde_json::from_str(text).map_err(|err| serde_error("json-deserialize", err))
    }

    /// Serializes to YAML.
    pub fn to_yaml_string(&self) -> Result<String, SgError> {
        serde_yaml::to_string(self).map_err(|err| serde_error("yaml-serialize", err))
    }

    /// SHA-256 of the canonical JSON form.
    pub fn stable_hash(&self) -> Result<String, SgError> {
        stable_hash_string(self)
    }

    /// Checks every parameter that can be checked without the stream model.
    pub fn validate(&self) -> Result<(), SgError> {
        positive("impact_parameter", self.impact_parameter)?;
        if !self.perturber_velocity.iter().all(|v| v.is_finite()) {
            return Err(config_error(
                "invalid-parameter",
                "perturber_velocity must be finite",
            ));
        }
        match self.perturber {
            PerturberConfig::Plummer { gm, rs } | PerturberConfig::Hernquist { gm, rs } => {
                positive("gm", gm)?;
                positive("rs", rs)?;
            }
            PerturberConfig::Potential => {}
        }
        positive("time_since_impact", self.time_since_impact)?;
        if !self.impact_angle.is_finite() || self.impact_angle == 0.0 {
            return Err(SgError::Config(
                ErrorInfo::new("invalid-impact-angle", "impact_angle must be finite and non-zero")
                    .with_context("impact_angle", self.impact_angle)
                    .with_hint("use a positive angle for the leading arm, negative for the trailing arm"),
            ));
        }
        if let Some(delta) = self.delta_angle_track_impact {
            positive("delta_angle_track_impact", delta)?;
            if delta <= self.impact_angle.abs() {
                return Err(SgError::Config(
                    ErrorInfo::new("impact-outside-track", "the impact must lie inside the track window")
                        .with_context("delta_angle_track_impact", delta)
                        .with_context("impact_angle", self.impact_angle),
                ));
            }
        }
        if !(1..=MAX_DEGREE).contains(&self.spline_order) {
            return Err(SgError::Config(
                ErrorInfo::new("invalid-spline-order", "spline_order must lie in 1..=5")
                    .with_context("spline_order", self.spline_order),
            ));
        }
        if let Some(chunks) = self.track_chunks_impact {
            if chunks < 4 {
                return Err(SgError::Config(
                    ErrorInfo::new("too-few-chunks", "the impact track needs at least four chunks")
                        .with_context("track_chunks_impact", chunks),
                ));
            }
        }
        if let Some(points) = self.kick_points {
            if points <= self.spline_order {
                return Err(SgError::Config(
                    ErrorInfo::new("too-few-kick-points", "kick_points must exceed spline_order")
                        .with_context("kick_points", points)
                        .with_context("spline_order", self.spline_order),
                ));
            }
        }
        if self.orbit_samples < 2 {
            return Err(SgError::Config(
                ErrorInfo::new("invalid-parameter", "orbit_samples must be at least two")
                    .with_context("orbit_samples", self.orbit_samples),
            ));
        }
        if self.workers == 0 {
            return Err(config_error("invalid-parameter", "workers must be at least one"));
        }
        self.kick_quadrature.build()?;
        Ok(())
    }
}
