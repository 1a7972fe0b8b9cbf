//! Sampled orbits and a kick-drift-kick leapfrog integrator.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coords::CartesianState;
use crate::errors::{ErrorInfo, SgError};
use crate::potential::Potential;

fn orbit_error(code: &str, message: impl Into<String>) -> SgError {
    SgError::Solver(ErrorInfo::new(code, message.into()))
}

/// Trajectory sampled on a strictly increasing time grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orbit {
    times: Vec<f64>,
    states: Vec<CartesianState>,
}

impl Orbit {
    /// Builds an orbit from matching time and state samples.
    ///
    /// The grid may be given in decreasing order; it is stored increasing.
    pub fn new(mut times: Vec<f64>, mut states: Vec<CartesianState>) -> Result<Self, SgError> {
        if times.is_empty() || times.len() != states.len() {
            return Err(SgError::Value(
                ErrorInfo::new("orbit-shape", "orbit needs matching, non-empty samples")
                    .with_context("times", times.len())
                    .with_context("states", states.len()),
            ));
        }
        if times.len() > 1 && times[1] < times[0] {
            times.reverse();
            states.reverse();
        }
        if times.windows(2).any(|pair| !(pair[1] > pair[0])) {
            return Err(SgError::Value(ErrorInfo::new(
                "orbit-grid",
                "orbit times must be strictly monotonic",
            )));
        }
        Ok(Self { times, states })
    }

    /// A single-sample orbit; only [`Orbit::state_at`] at that time is defined.
    pub fn stationary(time: f64, state: CartesianState) -> Self {
        Self {
            times: vec![time],
            states: vec![state],
        }
    }

    /// Sample times in increasing order.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Samples matching [`Orbit::times`].
    pub fn states(&self) -> &[CartesianState] {
        &self.states
    }

    /// Earliest and latest sampled time.
    pub fn span(&self) -> (f64, f64) {
        (self.times[0], self.times[self.times.len() - 1])
    }

    /// Same path with every velocity reversed.
    pub fn flipped(&self) -> Self {
        Self {
            times: self.times.clone(),
            states: self.states.iter().map(CartesianState::flipped).collect(),
        }
    }

    /// Concatenates an orbit that ends where `later` starts.
    pub fn join(self, later: Orbit) -> Result<Self, SgError> {
        let (_, end) = self.span();
        let (start, _) = later.span();
        let mut times = self.times;
        let mut states = self.states;
        let skip = usize::from((start - end).abs() <= 1e-12 * end.abs().max(1.0));
        times.extend(later.times.into_iter().skip(skip));
        states.extend(later.states.into_iter().skip(skip));
        Orbit::new(times, states)
    }

    /// Phase-space point at time `t`, cubic Hermite in position.
    pub fn state_at(&self, t: f64) -> Result<CartesianState, SgError> {
        let (start, end) = self.span();
        let slack = 1e-10 * (end - start).abs().max(1.0);
        if t < start - slack || t > end + slack {
            return Err(SgError::Solver(
                ErrorInfo::new("orbit-time-range", "requested time outside the integrated orbit")
                    .with_context("t", t)
                    .with_context("start", start)
                    .with_context("end", end),
            ));
        }
        if self.times.len() == 1 {
            return Ok(self.states[0]);
        }
        let idx = match self.times.partition_point(|&ti| ti <= t) {
            0 => 0,
            n if n >= self.times.len() => self.times.len() - 2,
            n => n - 1,
        };
        let (t0, t1) = (self.times[idx], self.times[idx + 1]);
        let (s0, s1) = (&self.states[idx], &self.states[idx + 1]);
        let h = t1 - t0;
        let u = ((t - t0) / h).clamp(0.0, 1.0);
        let u2 = u * u;
        let u3 = u2 * u;
        let h00 = 2.0 * u3 - 3.0 * u2 + 1.0;
        let h10 = u3 - 2.0 * u2 + u;
        let h01 = -2.0 * u3 + 3.0 * u2;
        let h11 = u3 - u2;
        let pos = s0.pos * h00 + s0.vel * (h10 * h) + s1.pos * h01 + s1.vel * (h11 * h);
        let d00 = (6.0 * u2 - 6.0 * u) / h;
        let d10 = 3.0 * u2 - 4.0 * u + 1.0;
        let d01 = (-6.0 * u2 + 6.0 * u) / h;
        let d11 = 3.0 * u2 - 2.0 * u;
        let vel = s0.pos * d00 + s0.vel * d10 + s1.pos * d01 + s1.vel * d11;
        Ok(CartesianState::new(pos, vel))
    }
}

/// Propagates an initial condition through a potential.
pub trait OrbitIntegrator: Send + Sync {
    /// Integrates `initial` (given at `times[0]`) and samples it at every entry of `times`.
    ///
    /// `times` must be strictly monotonic but may decrease.
    fn integrate(
        &self,
        initial: &CartesianState,
        potential: &dyn Potential,
        times: &[f64],
    ) -> Result<Orbit, SgError>;
}

/// Second-order symplectic kick-drift-kick integrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Leapfrog {
    /// Largest internal step; output intervals are subdivided to respect it.
    pub max_step: f64,
}

impl Default for Leapfrog {
    fn default() -> Self {
        Self { max_step: 1e-3 }
    }
}

impl Leapfrog {
    /// Integrator with the given maximum internal step.
    pub fn with_max_step(max_step: f64) -> Self {
        Self { max_step }
    }

    fn advance(
        &self,
        state: &mut CartesianState,
        potential: &dyn Potential,
        t0: f64,
        t1: f64,
    ) -> Result<(), SgError> {
        let span = t1 - t0;
        let substeps = (span.abs() / self.max_step).ceil().max(1.0) as usize;
        let dt = span / substeps as f64;
        let mut t = t0;
        let mut acc = potential.acceleration(&state.pos, t);
        for _ in 0..substeps {
            let half_kick: Vector3<f64> = acc * (0.5 * dt);
            state.vel += half_kick;
            state.pos += state.vel * dt;
            t += dt;
            acc = potential.acceleration(&state.pos, t);
            state.vel += acc * (0.5 * dt);
        }
        if !(state.pos.iter().chain(state.vel.iter()).all(|v| v.is_finite())) {
            return Err(orbit_error(
                "orbit-diverged",
                format!("leapfrog produced a non-finite state near t={t1}"),
            ));
        }
        Ok(())
    }
}

impl OrbitIntegrator for Leapfrog {
    fn integrate(
        &self,
        initial: &CartesianState,
        potential: &dyn Potential,
        times: &[f64],
    ) -> Result<Orbit, SgError> {
        if !(self.max_step > 0.0 && self.max_step.is_finite()) {
            return Err(SgError::Config(
                ErrorInfo::new("invalid-step", "leapfrog step must be positive and finite")
                    .with_context("max_step", self.max_step),
            ));
        }
        if times.is_empty() {
            return Err(SgError::Value(ErrorInfo::new(
                "empty-time-grid",
                "orbit integration needs at least one output time",
            )));
        }
        let mut state = *initial;
        let mut states = Vec::with_capacity(times.len());
        states.push(state);
        for pair in times.windows(2) {
            self.advance(&mut state, potential, pair[0], pair[1])?;
            states.push(state);
        }
        debug!(
            samples = times.len(),
            start = times[0],
            end = times[times.len() - 1],
            "integrated orbit"
        );
        Orbit::new(times.to_vec(), states)
    }
}

/// Integrates `initial` backward over `duration` by flipping it, integrating
/// forward and flipping the result back.
///
/// The returned orbit is stored against physical time, running from
/// `start - duration` to `start`. The potential is sampled at the lookback
/// time, so this is only meaningful for static fields.
pub fn integrate_backward(
    integrator: &dyn OrbitIntegrator,
    potential: &dyn Potential,
    initial: &CartesianState,
    start: f64,
    duration: f64,
    samples: usize,
) -> Result<Orbit, SgError> {
    if samples < 2 || !(duration > 0.0) {
        return Err(SgError::Value(
            ErrorInfo::new("backward-grid", "backward integration needs a positive span")
                .with_context("samples", samples)
                .with_context("duration", duration),
        ));
    }
    let lookback = crate::coords::linspace(0.0, duration, samples);
    let forward = integrator.integrate(&initial.flipped(), potential, &lookback)?;
    let times = lookback.iter().map(|tau| start - tau).collect();
    Orbit::new(times, forward.flipped().states().to_vec())
}
