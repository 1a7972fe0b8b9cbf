//! Velocity kicks along the fine track and their frequency-angle image.

use nalgebra::{Vector3, Vector6};
use serde::{Deserialize, Serialize};
use sg_core::coords::{velocity_to_cylindrical, wrap_angle_difference, CylindricalState};
use sg_core::errors::{ErrorInfo, SgError};
use sg_core::stream::ActionAngleSolver;
use sg_kick::{CurvedEncounter, KickEnvironment, Perturber};
use sg_spline::{BSpline, PiecewisePolynomial, RangeChecked};
use tracing::{debug, info};

use crate::basis::FrequencyBasis;
use crate::config::KickTransform;
use crate::coordtransform::ImpactTrack;
use crate::track::KickTrack;

/// One interpolated kick component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KickComponent {
    /// Radial frequency.
    FrequencyR,
    /// Azimuthal frequency.
    FrequencyPhi,
    /// Vertical frequency.
    FrequencyZ,
    /// Radial angle.
    AngleR,
    /// Azimuthal angle.
    AnglePhi,
    /// Vertical angle.
    AngleZ,
    /// Frequency along the mean-offset direction.
    Parallel,
    /// First perpendicular frequency.
    Perp0,
    /// Second perpendicular frequency.
    Perp1,
}

impl KickComponent {
    /// The six frequency and angle components, in storage order.
    pub const FREQUENCY_ANGLE: [KickComponent; 6] = [
        KickComponent::FrequencyR,
        KickComponent::FrequencyPhi,
        KickComponent::FrequencyZ,
        KickComponent::AngleR,
        KickComponent::AnglePhi,
        KickComponent::AngleZ,
    ];
}

/// Velocity kick at every sample of `track`.
pub fn velocity_kicks(
    track: &KickTrack,
    perturber: &Perturber,
    impact_parameter: f64,
    perturber_velocity: &Vector3<f64>,
    env: &KickEnvironment<'_>,
) -> Result<Vec<Vector3<f64>>, SgError> {
    let positions: Vec<Vector3<f64>> = track.cartesian().iter().map(|s| s.pos).collect();
    let velocities: Vec<Vector3<f64>> = track.cartesian().iter().map(|s| s.vel).collect();
    let closest = track.closest();
    let enc = CurvedEncounter {
        velocities: &velocities,
        positions: &positions,
        impact_parameter,
        perturber_velocity: *perturber_velocity,
        closest_position: closest.pos,
        closest_velocity: closest.vel,
    };
    perturber.curved_kicks(&enc, None, env)
}

fn kicked(state: &CylindricalState, velocity: &Vector3<f64>) -> CylindricalState {
    let (vr, vt) = velocity_to_cylindrical(velocity, state.phi);
    CylindricalState {
        vr,
        vt,
        vz: velocity.z,
        ..*state
    }
}

/// Frequency and angle offsets caused by `kicks` at every sample of `track`.
///
/// [`KickTransform::Linearized`] multiplies the phase-space offset with the
/// Jacobian of the nearest impact-track chunk; [`KickTransform::Solver`]
/// solves the perturbed and unperturbed states and wraps the angle offsets.
pub fn frequency_angle_offsets(
    track: &KickTrack,
    impact: &ImpactTrack,
    kicks: &[Vector3<f64>],
    transform: KickTransform,
    solver: &dyn ActionAngleSolver,
) -> Result<Vec<Vector6<f64>>, SgError> {
    if kicks.len() != track.thetas().len() {
        return Err(SgError::Value(
            ErrorInfo::new("kick-shape", "one kick per track sample is required")
                .with_context("kicks", kicks.len())
                .with_context("samples", track.thetas().len()),
        ));
    }
    let perturbed: Vec<CylindricalState> = track
        .cartesian()
        .iter()
        .zip(track.cylindrical())
        .zip(kicks)
        .map(|((cart, cyl), kick)| kicked(cyl, &(cart.vel + kick)))
        .collect();
    match transform {
        KickTransform::Linearized => Ok(track
            .thetas()
            .iter()
            .zip(track.cylindrical())
            .zip(&perturbed)
            .map(|((&theta, before), after)| {
                let chunk = impact.nearest_chunk(theta);
                impact.fits()[chunk].jacobian * after.difference(before)
            })
            .collect()),
        KickTransform::Solver => {
            let after = solver.action_angle_batch(&perturbed)?;
            let before = solver.action_angle_batch(track.cylindrical())?;
            Ok(after
                .iter()
                .zip(&before)
                .map(|(a, b)| {
                    let d = a.frequency_angle() - b.frequency_angle();
                    Vector6::new(
                        d[0],
                        d[1],
                        d[2],
                        wrap_angle_difference(d[3]),
                        wrap_angle_difference(d[4]),
                        wrap_angle_difference(d[5]),
                    )
                })
                .collect())
        }
    }
}

/// Range-checked interpolants of the kick in frequency-angle space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KickSplines {
    components: Vec<RangeChecked<BSpline>>,
    parallel: RangeChecked<BSpline>,
    perp0: RangeChecked<BSpline>,
    perp1: RangeChecked<BSpline>,
    parallel_derivative: RangeChecked<BSpline>,
    parallel_poly: RangeChecked<PiecewisePolynomial>,
}

impl KickSplines {
    /// Interpolates `offsets` against `thetas` with splines of degree `order`,
    /// each zero outside `(0, extent)`.
    pub fn fit(
        thetas: &[f64],
        offsets: &[Vector6<f64>],
        basis: &FrequencyBasis,
        order: usize,
        extent: f64,
    ) -> Result<Self, SgError> {
        let column = |values: Vec<f64>| -> Result<RangeChecked<BSpline>, SgError> {
            Ok(RangeChecked::new(
                BSpline::interpolate(thetas, &values, order)?,
                extent,
            ))
        };
        let components = (0..6)
            .map(|c| column(offsets.iter().map(|o| o[c]).collect()))
            .collect::<Result<Vec<_>, _>>()?;
        let split: Vec<_> = offsets
            .iter()
            .map(|o| basis.project(&Vector3::new(o[0], o[1], o[2])))
            .collect();
        let parallel_raw = BSpline::interpolate(
            thetas,
            &split.iter().map(|s| s.parallel).collect::<Vec<_>>(),
            order,
        )?;
        let parallel_derivative = RangeChecked::new(parallel_raw.derivative()?, extent);
        let parallel_poly = RangeChecked::new(PiecewisePolynomial::from_spline(&parallel_raw)?, extent);
        debug!(
            order,
            intervals = parallel_poly.inner().intervals(),
            "fitted kick splines"
        );
        Ok(Self {
            components,
            parallel: RangeChecked::new(parallel_raw, extent),
            perp0: column(split.iter().map(|s| s.perp0).collect())?,
            perp1: column(split.iter().map(|s| s.perp1).collect())?,
            parallel_derivative,
            parallel_poly,
        })
    }

    /// Range-checked interpolant of one component.
    pub fn component(&self, component: KickComponent) -> &RangeChecked<BSpline> {
        match component {
            KickComponent::FrequencyR => &self.components[0],
            KickComponent::FrequencyPhi => &self.components[1],
            KickComponent::FrequencyZ => &self.components[2],
            KickComponent::AngleR => &self.components[3],
            KickComponent::AnglePhi => &self.components[4],
            KickComponent::AngleZ => &self.components[5],
            KickComponent::Parallel => &self.parallel,
            KickComponent::Perp0 => &self.perp0,
            KickComponent::Perp1 => &self.perp1,
        }
    }

    /// Value of one component at `dangle`; zero outside the window.
    pub fn eval(&self, component: KickComponent, dangle: f64) -> f64 {
        self.component(component).eval(dangle)
    }

    /// Frequency and angle kicks at `dangle`.
    pub fn frequency_angle(&self, dangle: f64) -> Vector6<f64> {
        Vector6::from_iterator(self.components.iter().map(|c| c.eval(dangle)))
    }

    /// Derivative of the parallel frequency kick with respect to angle.
    pub fn parallel_derivative(&self) -> &RangeChecked<BSpline> {
        &self.parallel_derivative
    }

    /// Breakpoint form of the parallel frequency kick.
    pub fn parallel_poly(&self) -> &RangeChecked<PiecewisePolynomial> {
        &self.parallel_poly
    }
}

/// Kicks and interpolants for one impact configuration.
#[derive(Debug, Clone)]
pub struct KickMap {
    velocity_kicks: Vec<Vector3<f64>>,
    offsets: Vec<Vector6<f64>>,
    splines: KickSplines,
}

impl KickMap {
    /// Computes the velocity kicks along `track`, maps them to frequency-angle
    /// offsets and interpolates those.
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        track: &KickTrack,
        impact: &ImpactTrack,
        basis: &FrequencyBasis,
        perturber: &Perturber,
        impact_parameter: f64,
        perturber_velocity: &Vector3<f64>,
        env: &KickEnvironment<'_>,
        transform: KickTransform,
        solver: &dyn ActionAngleSolver,
        order: usize,
    ) -> Result<Self, SgError> {
        let velocity_kicks = velocity_kicks(track, perturber, impact_parameter, perturber_velocity, env)?;
        let offsets = frequency_angle_offsets(track, impact, &velocity_kicks, transform, solver)?;
        let splines = KickSplines::fit(
            track.thetas(),
            &offsets,
            basis,
            order,
            impact.window().delta_angle,
        )?;
        info!(
            perturber = perturber.kind(),
            points = offsets.len(),
            "mapped kicks to frequency-angle offsets"
        );
        Ok(Self {
            velocity_kicks,
            offsets,
            splines,
        })
    }

    /// Velocity kick per track sample.
    pub fn velocity_kicks(&self) -> &[Vector3<f64>] {
        &self.velocity_kicks
    }

    /// Frequency-angle offset per track sample.
    pub fn offsets(&self) -> &[Vector6<f64>] {
        &self.offsets
    }

    /// Interpolants of the offsets.
    pub fn splines(&self) -> &KickSplines {
        &self.splines
    }
}
