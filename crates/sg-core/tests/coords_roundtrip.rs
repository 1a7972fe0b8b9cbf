use std::f64::consts::PI;

use proptest::prelude::*;
use sg_core::coords::{linspace, wrap_angle_difference, CylindricalState};

proptest! {
    #[test]
    fn cylindrical_cartesian_round_trip(
        r in 0.1f64..20.0,
        vr in -2.0f64..2.0,
        vt in -2.0f64..2.0,
        z in -5.0f64..5.0,
        vz in -2.0f64..2.0,
        phi in 0.0f64..(2.0 * PI),
    ) {
        let state = CylindricalState::new(r, vr, vt, z, vz, phi);
        let back = state.to_cartesian().to_cylindrical();
        let delta = back.difference(&state);
        prop_assert!(delta.iter().all(|d| d.abs() < 1e-9), "delta={delta:?}");
    }

    #[test]
    fn wrapped_differences_stay_in_range(delta in -50.0f64..50.0) {
        let wrapped = wrap_angle_difference(delta);
        prop_assert!(wrapped > -PI - 1e-12 && wrapped <= PI + 1e-12);
        let turns = (delta - wrapped) / (2.0 * PI);
        prop_assert!((turns - turns.round()).abs() < 1e-9);
    }
}

#[test]
fn flipping_reverses_velocities_only() {
    let state = CylindricalState::new(8.0, 0.1, 1.1, 0.2, -0.05, 1.0);
    let flipped = state.flipped();
    assert_eq!(flipped.r, state.r);
    assert_eq!(flipped.phi, state.phi);
    assert_eq!(flipped.vt, -state.vt);
    let cart = state.to_cartesian();
    let cart_flipped = flipped.to_cartesian();
    assert!((cart.vel + cart_flipped.vel).norm() < 1e-12);
}

#[test]
fn linspace_hits_both_ends() {
    let grid = linspace(-1.0, 2.0, 7);
    assert_eq!(grid.len(), 7);
    assert_eq!(grid[0], -1.0);
    assert_eq!(grid[6], 2.0);
    assert!((grid[1] - grid[0] - 0.5).abs() < 1e-15);
    assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
}
