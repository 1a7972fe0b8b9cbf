#![allow(dead_code)]

use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use rand::Rng;
use rand_distr::StandardNormal;
use sg_core::coords::{wrap_angle_difference, wrap_angles, CartesianState, CylindricalState};
use sg_core::errors::{ErrorInfo, SgError};
use sg_core::orbit::{Leapfrog, OrbitIntegrator};
use sg_core::potential::Potential;
use sg_core::rng::SampleRng;
use sg_core::stream::{
    ActionAngleCoords, ActionAngleSolver, AngleFrequencySample, SmoothStream, TrackFitRequest,
    TrackPointFit,
};
use sg_gap::{GapConfig, PerturberConfig};
use statrs::function::erf::erfc;

pub const CENTRE: [f64; 3] = [6.0, 0.0, 0.0];
pub const OMEGA0: [f64; 3] = [0.8, 0.6, 0.5];
pub const KAPPA: [f64; 3] = [0.5, 0.4, 0.3];
pub const SIGMA_PAR: f64 = 0.02;
pub const SIGMA_PERP: f64 = 0.004;
pub const MEAN_OFFSET_SIGMA: f64 = 2.0;
pub const DISRUPTION_TIME: f64 = 5.0;

/// Separable torus: every axis oscillates around `CENTRE` with unit shape
/// and an action-dependent frequency label `OMEGA0 + KAPPA J`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToyTorus;

impl ToyTorus {
    pub fn frequencies(actions: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            OMEGA0[0] + KAPPA[0] * actions[0],
            OMEGA0[1] + KAPPA[1] * actions[1],
            OMEGA0[2] + KAPPA[2] * actions[2],
        )
    }

    pub fn actions(frequencies: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            (frequencies[0] - OMEGA0[0]) / KAPPA[0],
            (frequencies[1] - OMEGA0[1]) / KAPPA[1],
            (frequencies[2] - OMEGA0[2]) / KAPPA[2],
        )
    }

    pub fn state(actions: &Vector3<f64>, angles: &Vector3<f64>) -> CartesianState {
        let amp = actions.map(|j| (2.0 * j).sqrt());
        CartesianState::new(
            Vector3::new(
                CENTRE[0] + amp[0] * angles[0].sin(),
                CENTRE[1] + amp[1] * angles[1].sin(),
                CENTRE[2] + amp[2] * angles[2].sin(),
            ),
            Vector3::new(
                amp[0] * angles[0].cos(),
                amp[1] * angles[1].cos(),
                amp[2] * angles[2].cos(),
            ),
        )
    }

    pub fn solve_cartesian(state: &CartesianState) -> ActionAngleCoords {
        let mut actions = Vector3::zeros();
        let mut angles = Vector3::zeros();
        for i in 0..3 {
            let s = state.pos[i] - CENTRE[i];
            let u = state.vel[i];
            actions[i] = 0.5 * (s * s + u * u);
            angles[i] = s.atan2(u).rem_euclid(2.0 * PI);
        }
        ActionAngleCoords {
            actions,
            frequencies: Self::frequencies(&actions),
            angles,
        }
    }

    /// Central differences of `(Omega, theta)` in `(R, vR, vT, z, vz, phi)`.
    pub fn jacobian(state: &CylindricalState) -> Matrix6<f64> {
        let base = state.to_vector();
        let mut jac = Matrix6::zeros();
        for col in 0..6 {
            let h = 1e-6 * base[col].abs().max(1.0);
            let mut plus = base;
            let mut minus = base;
            plus[col] += h;
            minus[col] -= h;
            let hi = Self::solve_cartesian(&CylindricalState::from_vector(&plus).to_cartesian());
            let lo = Self::solve_cartesian(&CylindricalState::from_vector(&minus).to_cartesian());
            let d = hi.frequency_angle() - lo.frequency_angle();
            for row in 0..6 {
                let diff = if row < 3 { d[row] } else { wrap_angle_difference(d[row]) };
                jac[(row, col)] = diff / (2.0 * h);
            }
        }
        jac
    }
}

impl ActionAngleSolver for ToyTorus {
    fn action_angle(&self, state: &CylindricalState) -> Result<ActionAngleCoords, SgError> {
        Ok(Self::solve_cartesian(&state.to_cartesian()))
    }
}

/// Unit harmonic well around `CENTRE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarmonicWell;

impl Potential for HarmonicWell {
    fn acceleration(&self, pos: &Vector3<f64>, _t: f64) -> Vector3<f64> {
        -(pos - Vector3::from(CENTRE))
    }
}

pub struct ToyStream {
    pub leading: bool,
    pub progenitor_actions: Vector3<f64>,
    pub progenitor_angles: Vector3<f64>,
    pub arm_direction: Vector3<f64>,
    pub torus: ToyTorus,
    pub potential: HarmonicWell,
    pub integrator: Leapfrog,
    pub fit_calls: AtomicUsize,
}

impl ToyStream {
    pub fn new(leading: bool) -> Self {
        let progenitor_actions = Vector3::new(0.4, 1.0, 0.6);
        let omega = ToyTorus::frequencies(&progenitor_actions);
        let lead = (omega + Vector3::new(0.1, -0.2, 0.05)).normalize();
        Self {
            leading,
            progenitor_actions,
            progenitor_angles: Vector3::new(0.3, 1.2, 2.0),
            arm_direction: if leading { lead } else { -lead },
            torus: ToyTorus,
            potential: HarmonicWell,
            integrator: Leapfrog::with_max_step(2e-3),
            fit_calls: AtomicUsize::new(0),
        }
    }

    pub fn fit_calls(&self) -> usize {
        self.fit_calls.load(Ordering::SeqCst)
    }

    pub fn mean_offset(&self) -> f64 {
        MEAN_OFFSET_SIGMA * SIGMA_PAR
    }
}

fn gaussian(x: f64, mean: f64, sigma: f64) -> f64 {
    let z = (x - mean) / sigma;
    (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt())
}

impl SmoothStream for ToyStream {
    fn progenitor(&self) -> CylindricalState {
        ToyTorus::state(&self.progenitor_actions, &self.progenitor_angles).to_cylindrical()
    }

    fn progenitor_frequency(&self) -> Vector3<f64> {
        ToyTorus::frequencies(&self.progenitor_actions)
    }

    fn progenitor_angle(&self) -> Vector3<f64> {
        self.progenitor_angles
    }

    fn frequency_covariance(&self) -> Matrix3<f64> {
        let d = self.arm_direction;
        let outer = d * d.transpose();
        outer * SIGMA_PAR.powi(2) + (Matrix3::identity() - outer) * SIGMA_PERP.powi(2)
    }

    fn mean_offset_sigma(&self) -> f64 {
        MEAN_OFFSET_SIGMA
    }

    fn leading(&self) -> bool {
        self.leading
    }

    fn disruption_time(&self) -> f64 {
        DISRUPTION_TIME
    }

    fn track_iterations(&self) -> usize {
        1
    }

    fn mean_parallel_frequency(
        &self,
        dangle: f64,
        _offset_sign: f64,
        disruption_time: f64,
    ) -> Result<f64, SgError> {
        let mean = self.mean_offset();
        let alpha = (dangle.max(0.0) / disruption_time - mean) / SIGMA_PAR;
        let tail = 0.5 * erfc(alpha / 2f64.sqrt());
        if tail <= 0.0 {
            return Err(SgError::Solver(
                ErrorInfo::new("empty-tail", "no stars reach this angle").with_context("dangle", dangle),
            ));
        }
        let phi = (-0.5 * alpha * alpha).exp() / (2.0 * PI).sqrt();
        Ok(mean + SIGMA_PAR * phi / tail)
    }

    fn parallel_density(&self, opar: f64, apar: f64, disruption_time: f64) -> f64 {
        let ts = apar / opar;
        if !(0.0..disruption_time).contains(&ts) {
            return 0.0;
        }
        gaussian(opar, self.mean_offset(), SIGMA_PAR)
    }

    fn sample(
        &self,
        n: usize,
        rng: &mut SampleRng,
    ) -> Result<Vec<AngleFrequencySample>, SgError> {
        let d = self.arm_direction;
        let helper = if d.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
        let perp0 = d.cross(&helper).normalize();
        let perp1 = d.cross(&perp0);
        let omega = self.progenitor_frequency();
        Ok((0..n)
            .map(|_| {
                let opar = self.mean_offset() + SIGMA_PAR * rng.sample::<f64, _>(StandardNormal);
                let p0 = SIGMA_PERP * rng.sample::<f64, _>(StandardNormal);
                let p1 = SIGMA_PERP * rng.sample::<f64, _>(StandardNormal);
                let dt = rng.gen_range(0.0..DISRUPTION_TIME);
                let offset = d * opar + perp0 * p0 + perp1 * p1;
                AngleFrequencySample {
                    frequency: omega + offset,
                    angle: self.progenitor_angles + offset * dt,
                    dt,
                }
            })
            .collect())
    }

    fn fit_track_point(&self, request: &TrackFitRequest<'_>) -> Result<TrackPointFit, SgError> {
        self.fit_calls.fetch_add(1, Ordering::SeqCst);
        // The starting point must be on the supplied orbit.
        request.orbit.state_at(request.time)?;
        let offset = (request.mean_offset)(request.target_angle)?;
        let frequencies =
            self.progenitor_frequency() + request.direction * (offset * request.sign);
        let angles = wrap_angles(
            &(request.progenitor_angle + request.direction * (request.target_angle * request.sign)),
        );
        let actions = ToyTorus::actions(&frequencies);
        let state = ToyTorus::state(&actions, &angles).to_cylindrical();
        let jacobian = ToyTorus::jacobian(&state);
        let inverse_jacobian = jacobian.try_inverse().ok_or_else(|| {
            SgError::Solver(ErrorInfo::new("singular-jacobian", "toy jacobian is singular"))
        })?;
        let coords = ActionAngleCoords {
            actions,
            frequencies,
            angles,
        };
        Ok(TrackPointFit {
            coords,
            jacobian,
            inverse_jacobian,
            state,
            frequency_angle: Vector6::new(
                frequencies[0],
                frequencies[1],
                frequencies[2],
                angles[0],
                angles[1],
                angles[2],
            ),
            det_frequency_action: KAPPA[0] * KAPPA[1] * KAPPA[2],
        })
    }

    fn potential(&self) -> &dyn Potential {
        &self.potential
    }

    fn integrator(&self) -> &dyn OrbitIntegrator {
        &self.integrator
    }

    fn action_angle(&self) -> &dyn ActionAngleSolver {
        &self.torus
    }
}

/// Plummer impact on the leading arm, small enough to stay linear.
pub fn plummer_config() -> GapConfig {
    GapConfig {
        impact_parameter: 0.05,
        perturber_velocity: [0.0, 0.0, 1.5],
        perturber: PerturberConfig::Plummer { gm: 1e-4, rs: 0.02 },
        time_since_impact: 1.0,
        impact_angle: 0.2,
        kick_points: Some(80),
        orbit_samples: 201,
        ..GapConfig::default()
    }
}
