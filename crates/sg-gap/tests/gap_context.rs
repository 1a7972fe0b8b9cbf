mod common;

use std::sync::Arc;

use common::{plummer_config, ToyStream, KAPPA};
use sg_core::coords::linspace;
use sg_core::stream::SmoothStream;
use sg_gap::{GapConfig, GapPerturbation, KickComponent, KickTransform, MomentOptions, PerturberConfig};
use sg_kick::PlummerSphere;

fn relative(a: f64, b: f64) -> f64 {
    (a - b).abs() / a.abs().max(b.abs())
}

fn linear_config() -> GapConfig {
    GapConfig {
        spline_order: 1,
        ..plummer_config()
    }
}

fn assert_moments_agree(ctx: &GapPerturbation<'_>, approx: &MomentOptions, density_tol: f64, mean_tol: f64) {
    let exact = MomentOptions::exact();
    for dangle in [0.1, 0.2, 0.3] {
        let fast = ctx.density_par(dangle, approx).unwrap();
        let slow = ctx.density_par(dangle, &exact).unwrap();
        assert!(fast > 0.0);
        assert!(
            relative(fast, slow) < density_tol,
            "density at {dangle}: {fast} vs {slow}"
        );
        let fast = ctx.mean_omega(dangle, approx).unwrap();
        let slow = ctx.mean_omega(dangle, &exact).unwrap();
        assert!(
            (fast - slow).abs() < mean_tol,
            "mean at {dangle}: {fast} vs {slow}"
        );
    }
}

#[test]
fn linear_plummer_moments_match_quadrature() {
    let stream = ToyStream::new(true);
    let ctx = GapPerturbation::new(&stream, linear_config()).unwrap();
    assert_moments_agree(&ctx, &MomentOptions::default(), 1e-5, 1e-7);
}

#[test]
fn linear_hernquist_moments_match_quadrature() {
    let stream = ToyStream::new(true);
    let config = GapConfig {
        perturber: PerturberConfig::Hernquist { gm: 1e-4, rs: 0.02 },
        ..linear_config()
    };
    let ctx = GapPerturbation::new(&stream, config).unwrap();
    assert_eq!(ctx.perturber().kind(), "hernquist");
    assert_moments_agree(&ctx, &MomentOptions::default(), 1e-5, 1e-7);
}

#[test]
fn cubic_moments_with_curvature_match_quadrature() {
    let stream = ToyStream::new(true);
    let config = GapConfig {
        higher_order: true,
        ..plummer_config()
    };
    let ctx = GapPerturbation::new(&stream, config).unwrap();
    assert_moments_agree(&ctx, &MomentOptions::default(), 1e-3, 1e-5);
    let plain = MomentOptions {
        higher_order: Some(false),
        ..MomentOptions::default()
    };
    let with = ctx.density_par(0.2, &MomentOptions::default()).unwrap();
    let without = ctx.density_par(0.2, &plain).unwrap();
    assert!(relative(with, without) < 1e-3);
}

#[test]
fn the_impact_dents_the_density() {
    let stream = ToyStream::new(true);
    let ctx = GapPerturbation::new(&stream, linear_config()).unwrap();
    let max_kick = linspace(0.0, 0.48, 97)
        .iter()
        .map(|&a| ctx.kick(KickComponent::Parallel, a).abs())
        .fold(0.0, f64::max);
    assert!(max_kick > 0.0);
    let smooth = linspace(0.05, 0.4, 15)
        .into_iter()
        .map(|a| {
            let lower = a / common::DISRUPTION_TIME;
            let z = (stream.mean_offset() - lower) / (2.0 * common::SIGMA_PAR.powi(2)).sqrt();
            (a, 0.5 * (1.0 + statrs::function::erf::erf(z)))
        });
    let largest = smooth
        .map(|(a, unperturbed)| {
            let perturbed = ctx.density_par(a, &MomentOptions::default()).unwrap();
            relative(perturbed, unperturbed)
        })
        .fold(0.0, f64::max);
    assert!(largest > 1e-6, "no visible perturbation: {largest}");
    assert!(largest < 0.5, "perturbation is not small: {largest}");
}

#[test]
fn kicks_vanish_outside_the_window() {
    let stream = ToyStream::new(true);
    let ctx = GapPerturbation::new(&stream, plummer_config()).unwrap();
    let delta = ctx.summary().unwrap().window.delta_angle;
    let outside = [-0.1, 0.0, delta, delta + 0.1];
    for component in KickComponent::FREQUENCY_ANGLE
        .into_iter()
        .chain([KickComponent::Parallel, KickComponent::Perp0, KickComponent::Perp1])
    {
        assert!(ctx.kicks(component, &outside).iter().all(|&k| k == 0.0));
    }
    assert_eq!(ctx.parallel_kick_derivative(delta + 0.1), 0.0);
    let inside = ctx.kick_splines().component(KickComponent::Parallel).inner().eval(0.2);
    assert_eq!(ctx.kick(KickComponent::Parallel, 0.2), inside);
}

#[test]
fn every_chunk_is_fitted_once_per_pass() {
    let stream = ToyStream::new(true);
    let ctx = GapPerturbation::new(&stream, plummer_config()).unwrap();
    let summary = ctx.summary().unwrap();
    assert_eq!(summary.window.chunks, 4);
    assert!((summary.window.delta_angle - 0.48).abs() < 1e-12);
    let passes = 1 + stream.track_iterations();
    assert_eq!(stream.fit_calls(), 1 + summary.window.chunks * passes);

    let det = KAPPA[0] * KAPPA[1] * KAPPA[2];
    assert!((summary.mean_det - det).abs() < 1e-12);
    assert!((summary.log_mean_det - det.ln()).abs() < 1e-12);
    assert_eq!(summary.kick_points, 80);
    assert_eq!(summary.perturber, "plummer");
    assert_eq!(summary.config_hash, ctx.config().stable_hash().unwrap());
}

#[test]
fn linear_breakpoints_follow_the_kick_samples() {
    let stream = ToyStream::new(true);
    let ctx = GapPerturbation::new(&stream, linear_config()).unwrap();
    assert_eq!(ctx.summary().unwrap().breakpoint_intervals, 79);
}

#[test]
fn threaded_track_fitting_matches_sequential() {
    let sequential_stream = ToyStream::new(true);
    let threaded_stream = ToyStream::new(true);
    let sequential = GapPerturbation::new(&sequential_stream, plummer_config()).unwrap();
    let threaded = GapPerturbation::new(
        &threaded_stream,
        GapConfig {
            workers: 3,
            ..plummer_config()
        },
    )
    .unwrap();
    for a in linspace(0.01, 0.47, 24) {
        let s = sequential.kick(KickComponent::Parallel, a);
        let t = threaded.kick(KickComponent::Parallel, a);
        assert!((s - t).abs() <= 1e-12 * s.abs().max(1e-12));
    }
    let opts = MomentOptions::default();
    let s = sequential.density_par(0.25, &opts).unwrap();
    let t = threaded.density_par(0.25, &opts).unwrap();
    assert!(relative(s, t) < 1e-12);
}

#[test]
fn solver_transform_agrees_with_linearized_kicks() {
    let stream = ToyStream::new(true);
    let linearized = GapPerturbation::new(&stream, plummer_config()).unwrap();
    let solved = GapPerturbation::new(
        &stream,
        GapConfig {
            kick_transform: KickTransform::Solver,
            ..plummer_config()
        },
    )
    .unwrap();
    let lin = linearized.kick_map().offsets();
    let sol = solved.kick_map().offsets();
    assert_eq!(lin.len(), sol.len());
    let scale = lin.iter().map(|o| o.amax()).fold(0.0, f64::max);
    assert!(scale > 0.0);
    for (a, b) in lin.iter().zip(sol) {
        assert!((a - b).amax() < 0.15 * scale, "{a:?} vs {b:?}");
    }
}

#[test]
fn impacts_on_the_wrong_arm_are_rejected() {
    let leading = ToyStream::new(true);
    let err = GapPerturbation::new(
        &leading,
        GapConfig {
            impact_angle: -0.2,
            ..plummer_config()
        },
    )
    .err()
    .unwrap();
    assert_eq!(err.code(), "arm-mismatch");

    let trailing = ToyStream::new(false);
    let err = GapPerturbation::new(&trailing, plummer_config()).err().unwrap();
    assert_eq!(err.code(), "arm-mismatch");

    let ctx = GapPerturbation::new(
        &trailing,
        GapConfig {
            impact_angle: -0.2,
            ..plummer_config()
        },
    )
    .unwrap();
    assert!(ctx.basis().progenitor_along() < 0.0);
    assert!(ctx.density_par(0.2, &MomentOptions::default()).unwrap() > 0.0);
}

#[test]
fn impacts_outside_the_track_are_rejected() {
    let stream = ToyStream::new(true);
    let err = GapPerturbation::new(
        &stream,
        GapConfig {
            impact_angle: 0.6,
            ..plummer_config()
        },
    )
    .err()
    .unwrap();
    assert_eq!(err.code(), "impact-outside-track");
}

#[test]
fn general_perturbers_need_an_explicit_potential() {
    let stream = ToyStream::new(true);
    let err = GapPerturbation::new(
        &stream,
        GapConfig {
            perturber: PerturberConfig::Potential,
            ..plummer_config()
        },
    )
    .err()
    .unwrap();
    assert_eq!(err.code(), "missing-perturber");
    assert!(err.info().hint.is_some());

    let closed = GapPerturbation::new(&stream, plummer_config()).unwrap();
    let general = GapPerturbation::with_perturber(
        &stream,
        plummer_config(),
        Arc::new(PlummerSphere { gm: 1e-4, rs: 0.02 }),
    )
    .unwrap();
    assert_eq!(general.perturber().kind(), "spherical");
    assert_eq!(general.config().perturber, PerturberConfig::Potential);
    for (a, b) in closed
        .kick_map()
        .velocity_kicks()
        .iter()
        .zip(general.kick_map().velocity_kicks())
    {
        assert!((a - b).norm() <= 1e-5 * a.norm().max(b.norm()).max(1e-12));
    }
}

#[test]
fn moving_the_impact_recomputes_only_the_kicks() {
    let stream = ToyStream::new(true);
    let mut ctx = GapPerturbation::new(&stream, plummer_config()).unwrap();
    let calls = stream.fit_calls();
    let original: Vec<f64> = ctx.kicks(KickComponent::Parallel, &linspace(0.01, 0.47, 30));

    ctx.set_impact_angle(0.3).unwrap();
    assert_eq!(stream.fit_calls(), calls);
    assert_eq!(ctx.config().impact_angle, 0.3);
    let expected = ctx.kick_track().state_at(0.3);
    assert_eq!(ctx.kick_track().closest(), &expected);
    let moved = ctx.kicks(KickComponent::Parallel, &linspace(0.01, 0.47, 30));
    assert_ne!(moved, original);

    let err = ctx.set_impact_angle(-0.3).unwrap_err();
    assert_eq!(err.code(), "arm-mismatch");
    let err = ctx.set_impact_angle(0.9).unwrap_err();
    assert_eq!(err.code(), "impact-outside-track");
    assert_eq!(ctx.config().impact_angle, 0.3);

    ctx.set_impact_angle(0.2).unwrap();
    assert_eq!(ctx.kicks(KickComponent::Parallel, &linspace(0.01, 0.47, 30)), original);
}

#[test]
fn joint_density_uses_the_smooth_model_after_the_impact() {
    let stream = ToyStream::new(true);
    let ctx = GapPerturbation::new(&stream, plummer_config()).unwrap();
    let td = stream.disruption_time();
    let released_after = ctx.p_opar_apar(&[0.3, 0.5], 0.2);
    assert_eq!(released_after[0], stream.parallel_density(0.3, 0.2, td));
    assert_eq!(released_after[1], stream.parallel_density(0.5, 0.2, td));
    assert_eq!(ctx.p_opar_apar(&[-0.01], 0.2), vec![0.0]);
    let before = ctx.p_opar_apar(&[0.05], 0.2)[0];
    assert!(before > 0.0);
}

#[test]
fn mean_frequency_vector_lies_along_the_stream() {
    let stream = ToyStream::new(true);
    let ctx = GapPerturbation::new(&stream, plummer_config()).unwrap();
    let opts = MomentOptions::default();
    let offset = ctx.mean_omega(0.2, &opts).unwrap();
    let vector = ctx.mean_omega_vector(0.2, &opts).unwrap() - stream.progenitor_frequency();
    assert!((vector.norm() - offset.abs()).abs() < 1e-12);
    assert!((ctx.basis().parallel(&vector) - offset).abs() < 1e-12);
}

#[test]
fn lowest_frequency_is_close_to_the_unperturbed_bound() {
    let stream = ToyStream::new(true);
    let ctx = GapPerturbation::new(&stream, linear_config()).unwrap();
    let bound = ctx.min_opar(0.2, None);
    assert!((bound - 0.2 / common::DISRUPTION_TIME).abs() < 0.01);
    let longer = ctx.min_opar(0.2, Some(10.0));
    assert!(longer < bound);
}
