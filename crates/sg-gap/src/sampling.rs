//! Joint parallel (frequency, angle) density and kicked samples.

use nalgebra::Vector3;
use sg_core::stream::{AngleFrequencySample, SmoothStream};

use crate::basis::FrequencyBasis;
use crate::mapper::{KickComponent, KickSplines};

/// Density of parallel frequency offsets `opar` at parallel angle `apar`.
///
/// Stars released after the impact (`0 <= apar/opar < T`) follow the smooth
/// model directly. All others are traced back to the impact, their frequency
/// de-kicked, and evaluated against the smooth model of stars released
/// before the impact.
pub fn p_opar_apar(
    stream: &dyn SmoothStream,
    kicks: &KickSplines,
    time_since_impact: f64,
    opar: &[f64],
    apar: f64,
) -> Vec<f64> {
    let disruption = stream.disruption_time();
    let (after, before): (Vec<usize>, Vec<usize>) = (0..opar.len()).partition(|&i| {
        let ts = apar / opar[i];
        (0.0..time_since_impact).contains(&ts)
    });
    let mut out = vec![0.0; opar.len()];
    for i in after {
        out[i] = stream.parallel_density(opar[i], apar, disruption);
    }
    for i in before {
        let apar_impact = apar - opar[i] * time_since_impact;
        let kick = kicks.eval(KickComponent::Parallel, apar_impact);
        out[i] = stream.parallel_density(opar[i] - kick, apar_impact, disruption - time_since_impact);
    }
    out
}

/// Single-point form of [`p_opar_apar`].
pub fn p_opar_apar_at(
    stream: &dyn SmoothStream,
    kicks: &KickSplines,
    time_since_impact: f64,
    opar: f64,
    apar: f64,
) -> f64 {
    p_opar_apar(stream, kicks, time_since_impact, &[opar], apar)[0]
}

/// Applies the interpolated kicks to unperturbed samples.
///
/// Every sample is rewound to the impact, its parallel angle there selects
/// the kick, and the angle kick is advanced by the frequency kick over the
/// time since impact. Samples released after the impact fall outside the
/// kick window and are returned unchanged.
pub fn apply_kicks(
    samples: &mut [AngleFrequencySample],
    kicks: &KickSplines,
    basis: &FrequencyBasis,
    progenitor_frequency: &Vector3<f64>,
    progenitor_angle: &Vector3<f64>,
    time_since_impact: f64,
) {
    for sample in samples.iter_mut() {
        let dangle_impact = sample.angle
            - progenitor_angle
            - (sample.frequency - progenitor_frequency) * time_since_impact;
        let par = basis.parallel(&dangle_impact);
        let kick = kicks.frequency_angle(par);
        let d_omega = Vector3::new(kick[0], kick[1], kick[2]);
        sample.frequency += d_omega;
        sample.angle += Vector3::new(kick[3], kick[4], kick[5]) + d_omega * time_since_impact;
    }
}
