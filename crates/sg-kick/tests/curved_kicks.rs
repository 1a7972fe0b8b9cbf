use std::sync::Arc;

use nalgebra::Vector3;
use sg_core::orbit::Leapfrog;
use sg_core::potential::FreeSpace;
use sg_kick::{
    full_plummer_kick, general_kick_curved, hernquist_kick, hernquist_kick_curved, impact_vector,
    orbit_integration_kick, plummer_kick, plummer_kick_curved, softened_stream_kick,
    softened_stream_kick_curved, CurvedEncounter, HernquistSphere, KickEnvironment, Perturber,
    PlummerSphere, Profile, Quadrature, StreamWindow,
};

const GM: f64 = 1e-3;
const RS: f64 = 0.1;

fn assert_close(a: &Vector3<f64>, b: &Vector3<f64>, rel: f64) {
    let scale = a.norm().max(b.norm());
    assert!(
        (a - b).norm() <= rel * scale,
        "{a:?} vs {b:?} differ by more than {rel} relative"
    );
}

struct StraightStream {
    velocities: Vec<Vector3<f64>>,
    positions: Vec<Vector3<f64>>,
    y: Vec<f64>,
}

fn straight_stream() -> StraightStream {
    let y = vec![-1.5, -0.2, 0.0, 0.4, 2.0];
    StraightStream {
        velocities: vec![Vector3::new(0.0, 1.0, 0.0); y.len()],
        positions: y.iter().map(|&yi| Vector3::new(0.0, yi, 0.0)).collect(),
        y,
    }
}

fn encounter<'a>(stream: &'a StraightStream, b: f64, w: Vector3<f64>) -> CurvedEncounter<'a> {
    CurvedEncounter {
        velocities: &stream.velocities,
        positions: &stream.positions,
        impact_parameter: b,
        perturber_velocity: w,
        closest_position: Vector3::zeros(),
        closest_velocity: Vector3::new(0.0, 1.0, 0.0),
    }
}

#[test]
fn curved_kicks_reduce_to_straight_kicks_on_a_straight_stream() {
    let stream = straight_stream();
    let w = Vector3::new(0.0, 0.0, 1.0);
    let enc = encounter(&stream, 0.3, w);

    let straight = plummer_kick(&stream.velocities, &stream.y, 0.3, &w, GM, RS).unwrap();
    let curved = plummer_kick_curved(&enc, GM, RS).unwrap();
    for (s, c) in straight.iter().zip(&curved) {
        assert_close(s, c, 1e-12);
    }

    let straight = hernquist_kick(&stream.velocities, &stream.y, 0.3, &w, GM, RS).unwrap();
    let curved = hernquist_kick_curved(&enc, GM, RS).unwrap();
    for (s, c) in straight.iter().zip(&curved) {
        assert_close(s, c, 1e-10);
    }
}

#[test]
fn general_curved_kick_matches_closed_forms() {
    let stream = straight_stream();
    let enc = CurvedEncounter {
        closest_velocity: Vector3::new(0.1, 1.0, 0.0),
        ..encounter(&stream, 0.2, Vector3::new(0.5, -0.3, 0.9))
    };
    let quad = Quadrature::default();
    let closed = plummer_kick_curved(&enc, GM, RS).unwrap();
    let numeric = general_kick_curved(&enc, &PlummerSphere { gm: GM, rs: RS }, &quad).unwrap();
    for (a, n) in closed.iter().zip(&numeric) {
        assert_close(a, n, 1e-6);
    }
    let closed = hernquist_kick_curved(&enc, GM, RS).unwrap();
    let numeric = general_kick_curved(&enc, &HernquistSphere { gm: GM, rs: RS }, &quad).unwrap();
    for (a, n) in closed.iter().zip(&numeric) {
        assert_close(a, n, 1e-6);
    }
}

#[test]
fn impact_direction_must_be_defined() {
    let err = impact_vector(1.0, &Vector3::y(), &Vector3::new(0.0, 2.0, 0.0)).unwrap_err();
    assert_eq!(err.code(), "undefined-impact-direction");
    let b0 = impact_vector(0.5, &Vector3::z(), &Vector3::y()).unwrap();
    assert!((b0 - Vector3::new(-0.5, 0.0, 0.0)).norm() < 1e-15);
}

#[test]
fn narrow_softened_stream_acts_like_a_point_mass() {
    let stream = straight_stream();
    let w = Vector3::new(0.3, 0.0, 1.0);
    let width = 1e-3;
    let window = StreamWindow::new(-0.5 * width, 0.5 * width).unwrap();
    let density = move |_t: f64| GM / width;
    let quad = Quadrature::default();

    let point = plummer_kick(&stream.velocities, &stream.y, 0.3, &w, GM, RS).unwrap();
    let spread =
        softened_stream_kick(&stream.velocities, &stream.y, 0.3, &w, &density, RS, &window, &quad)
            .unwrap();
    for (p, s) in point.iter().zip(&spread) {
        assert_close(p, s, 1e-4);
    }

    let enc = encounter(&stream, 0.3, w);
    let times = stream.y.clone();
    let integrator = Leapfrog::with_max_step(1e-2);
    let curved_point = plummer_kick_curved(&enc, GM, RS).unwrap();
    let curved_spread = softened_stream_kick_curved(
        &enc, &times, &density, RS, &window, &FreeSpace, &integrator, &quad,
    )
    .unwrap();
    for (p, s) in curved_point.iter().zip(&curved_spread) {
        assert_close(p, s, 1e-4);
    }
}

#[test]
fn stream_window_must_be_ordered() {
    assert_eq!(StreamWindow::new(1.0, 1.0).unwrap_err().code(), "invalid-time-window");
    assert_eq!(
        StreamWindow::new(0.0, f64::INFINITY).unwrap_err().code(),
        "invalid-time-window"
    );
}

fn flyby() -> (Vec<Vector3<f64>>, Vec<Vector3<f64>>) {
    (
        vec![Vector3::new(0.5, 0.0, 0.0), Vector3::new(0.5, 0.0, 0.0)],
        vec![Vector3::zeros(), Vector3::new(0.05, 0.0, 0.0)],
    )
}

#[test]
fn orbit_integrated_kicks_agree_with_the_impulse_approximation() {
    let (velocities, positions) = flyby();
    let w = Vector3::new(0.0, 0.0, 1.0);
    let enc = CurvedEncounter {
        velocities: &velocities,
        positions: &positions,
        impact_parameter: 0.1,
        perturber_velocity: w,
        closest_position: Vector3::zeros(),
        closest_velocity: velocities[0],
    };
    let gm = 1e-5;
    let rs = 0.1;
    let impulse = plummer_kick_curved(&enc, gm, rs).unwrap();
    let integrator = Leapfrog::with_max_step(1e-3);
    let tmax = 50.0 * rs / (w - velocities[0]).norm();

    let along_orbit = orbit_integration_kick(
        &enc,
        &PlummerSphere { gm, rs },
        tmax,
        &FreeSpace,
        &integrator,
        2001,
    )
    .unwrap();
    for (i, o) in impulse.iter().zip(&along_orbit) {
        assert_close(i, o, 1e-2);
    }

    let full = full_plummer_kick(&enc, &FreeSpace, &integrator, gm, rs, 50.0, 200).unwrap();
    for (i, f) in impulse.iter().zip(&full) {
        assert_close(i, f, 1e-2);
    }
}

#[test]
fn perturber_dispatch_selects_the_matching_calculator() {
    let stream = straight_stream();
    let w = Vector3::new(0.0, 0.0, 1.0);
    let enc = encounter(&stream, 0.3, w);
    let quad = Quadrature::default();
    let env = KickEnvironment {
        potential: &FreeSpace,
        integrator: &Leapfrog::default(),
        quadrature: &quad,
    };

    let hernquist = Perturber::PointMass {
        gm: GM,
        rs: RS,
        profile: Profile::Hernquist,
    };
    assert_eq!(hernquist.kind(), "hernquist");
    assert_eq!(
        hernquist.curved_kicks(&enc, None, &env).unwrap(),
        hernquist_kick_curved(&enc, GM, RS).unwrap()
    );
    assert_eq!(
        hernquist
            .straight_kicks(&stream.velocities, &stream.y, 0.3, &w, &quad)
            .unwrap(),
        hernquist_kick(&stream.velocities, &stream.y, 0.3, &w, GM, RS).unwrap()
    );

    let spherical = Perturber::Spherical(Arc::new(PlummerSphere { gm: GM, rs: RS }));
    let numeric = spherical.curved_kicks(&enc, None, &env).unwrap();
    for (n, c) in numeric.iter().zip(&plummer_kick_curved(&enc, GM, RS).unwrap()) {
        assert_close(n, c, 1e-6);
    }

    let softened = Perturber::SoftenedStream {
        surface_density: Arc::new(|_t: f64| 1e-3),
        rs: RS,
        window: StreamWindow::new(-1.0, 1.0).unwrap(),
    };
    let err = softened.curved_kicks(&enc, None, &env).unwrap_err();
    assert_eq!(err.code(), "missing-encounter-times");

    let full = Perturber::FullIntegration {
        gm: GM,
        rs: RS,
        tmax_factor: 10.0,
        samples: 100,
    };
    let err = full
        .straight_kicks(&stream.velocities, &stream.y, 0.3, &w, &quad)
        .unwrap_err();
    assert_eq!(err.code(), "straight-unsupported");
}
