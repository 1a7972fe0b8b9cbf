use nalgebra::Vector3;
use sg_core::orbit::{integrate_backward, Leapfrog, Orbit, OrbitIntegrator};
use sg_core::potential::{FreeSpace, Potential, SphericalPotential};
use sg_core::{linspace, CartesianState};

struct Kepler {
    gm: f64,
}

impl SphericalPotential for Kepler {
    fn radial_force(&self, r: f64) -> f64 {
        -self.gm / (r * r)
    }
}

impl Potential for Kepler {
    fn acceleration(&self, pos: &Vector3<f64>, _t: f64) -> Vector3<f64> {
        self.acceleration_at(pos)
    }
}

fn energy(state: &CartesianState, gm: f64) -> f64 {
    0.5 * state.vel.norm_squared() - gm / state.pos.norm()
}

#[test]
fn free_particles_move_on_straight_lines() {
    let start = CartesianState::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 2.0, -1.0));
    let times = linspace(0.0, 3.0, 31);
    let orbit = Leapfrog::default().integrate(&start, &FreeSpace, &times).unwrap();
    let end = orbit.state_at(3.0).unwrap();
    assert!((end.pos - Vector3::new(1.0, 6.0, -3.0)).norm() < 1e-10);
    let mid = orbit.state_at(1.234).unwrap();
    assert!((mid.pos - Vector3::new(1.0, 2.468, -1.234)).norm() < 1e-10);
    assert!((mid.vel - start.vel).norm() < 1e-10);
}

#[test]
fn leapfrog_conserves_kepler_energy() {
    let gm = 1.0;
    let start = CartesianState::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.1, 0.1));
    let times = linspace(0.0, 20.0, 201);
    let orbit = Leapfrog::with_max_step(1e-3)
        .integrate(&start, &Kepler { gm }, &times)
        .unwrap();
    let e0 = energy(&start, gm);
    for state in orbit.states() {
        assert!((energy(state, gm) - e0).abs() < 1e-4 * e0.abs());
    }
}

#[test]
fn backward_integration_retraces_the_forward_orbit() {
    let gm = 1.0;
    let kepler = Kepler { gm };
    let integrator = Leapfrog::with_max_step(5e-4);
    let start = CartesianState::new(Vector3::new(1.2, 0.1, 0.0), Vector3::new(-0.1, 0.9, 0.2));
    let forward = integrator
        .integrate(&start, &kepler, &linspace(0.0, 2.0, 101))
        .unwrap();
    let present = forward.state_at(2.0).unwrap();
    let back = integrate_backward(&integrator, &kepler, &present, 2.0, 2.0, 101).unwrap();
    assert_eq!(back.span(), (0.0, 2.0));
    let recovered = back.state_at(0.0).unwrap();
    assert!((recovered.pos - start.pos).norm() < 1e-6);
    assert!((recovered.vel - start.vel).norm() < 1e-6);
}

#[test]
fn orbit_rejects_out_of_range_times_and_bad_grids() {
    let state = CartesianState::new(Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0));
    let orbit = Orbit::new(vec![0.0, 1.0], vec![state, state]).unwrap();
    assert_eq!(orbit.state_at(2.0).unwrap_err().code(), "orbit-time-range");
    let err = Orbit::new(vec![0.0, 0.0], vec![state, state]).unwrap_err();
    assert_eq!(err.code(), "orbit-grid");
    let reversed = Orbit::new(vec![1.0, 0.0], vec![state, state]).unwrap();
    assert_eq!(reversed.times(), &[0.0, 1.0]);
}
