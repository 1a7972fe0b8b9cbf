//! Eigenbasis of the frequency-offset covariance and the parallel/perpendicular split.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use serde::{Deserialize, Serialize};
use sg_core::errors::{ErrorInfo, SgError};

/// Parallel and perpendicular components of a frequency offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParallelPerpendicular {
    /// Offset along the mean-offset direction, sign-corrected for the arm.
    pub parallel: f64,
    /// Offset along the eigenvector of the smallest eigenvalue.
    pub perp0: f64,
    /// Offset along the eigenvector of the middle eigenvalue.
    pub perp1: f64,
}

/// Frequency-offset eigenbasis of a smooth stream.
///
/// Eigenpairs are stored in ascending eigenvalue order; the last one spans
/// the mean-offset direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBasis {
    eigenvalues: Vector3<f64>,
    eigenvectors: Matrix3<f64>,
    sign: f64,
    progenitor_along: f64,
    mean_offset: f64,
}

impl FrequencyBasis {
    /// Decomposes `covariance` and fixes the arm sign from the progenitor frequency.
    ///
    /// The sign is `-1` when the progenitor frequency projects against the
    /// arm, that is negatively for a leading arm or positively for a
    /// trailing one.
    pub fn new(
        covariance: &Matrix3<f64>,
        progenitor_frequency: &Vector3<f64>,
        leading: bool,
        mean_offset_sigma: f64,
    ) -> Result<Self, SgError> {
        if !covariance.iter().all(|c| c.is_finite()) {
            return Err(SgError::Value(ErrorInfo::new(
                "covariance-not-finite",
                "frequency covariance has non-finite entries",
            )));
        }
        let eig = SymmetricEigen::new(*covariance);
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
        let eigenvalues = Vector3::new(
            eig.eigenvalues[order[0]],
            eig.eigenvalues[order[1]],
            eig.eigenvalues[order[2]],
        );
        if !(eigenvalues[2] > 0.0) {
            return Err(SgError::Value(
                ErrorInfo::new("covariance-not-positive", "largest frequency eigenvalue must be positive")
                    .with_context("eigenvalue", eigenvalues[2]),
            ));
        }
        let eigenvectors = Matrix3::from_columns(&[
            eig.eigenvectors.column(order[0]).into_owned(),
            eig.eigenvectors.column(order[1]).into_owned(),
            eig.eigenvectors.column(order[2]).into_owned(),
        ]);
        let raw_along = progenitor_frequency.dot(&eigenvectors.column(2));
        let sign = if (leading && raw_along < 0.0) || (!leading && raw_along > 0.0) {
            -1.0
        } else {
            1.0
        };
        Ok(Self {
            eigenvalues,
            eigenvectors,
            sign,
            progenitor_along: raw_along * sign,
            mean_offset: mean_offset_sigma * eigenvalues[2].sqrt(),
        })
    }

    /// Unit vector of the mean frequency offset.
    pub fn direction(&self) -> Vector3<f64> {
        self.eigenvectors.column(2).into_owned()
    }

    /// Arm orientation relative to [`FrequencyBasis::direction`].
    pub fn sign(&self) -> f64 {
        self.sign
    }

    /// Eigenvalues in ascending order.
    pub fn eigenvalues(&self) -> &Vector3<f64> {
        &self.eigenvalues
    }

    /// Eigenvectors as columns, ascending eigenvalue.
    pub fn eigenvectors(&self) -> &Matrix3<f64> {
        &self.eigenvectors
    }

    /// Variance of the parallel frequency offset.
    pub fn parallel_variance(&self) -> f64 {
        self.eigenvalues[2]
    }

    /// Mean parallel frequency offset.
    pub fn mean_offset(&self) -> f64 {
        self.mean_offset
    }

    /// Progenitor frequency along the direction, times the sign.
    pub fn progenitor_along(&self) -> f64 {
        self.progenitor_along
    }

    /// Projection of any vector on the signed direction.
    pub fn parallel(&self, v: &Vector3<f64>) -> f64 {
        v.dot(&self.direction()) * self.sign
    }

    /// Splits a frequency offset into parallel and perpendicular parts.
    pub fn project(&self, offset: &Vector3<f64>) -> ParallelPerpendicular {
        let components = self.eigenvectors.transpose() * offset;
        ParallelPerpendicular {
            parallel: components[2] * self.sign,
            perp0: components[0],
            perp1: components[1],
        }
    }

    /// Inverse of [`FrequencyBasis::project`].
    pub fn reconstruct(&self, parts: &ParallelPerpendicular) -> Vector3<f64> {
        self.eigenvectors * Vector3::new(parts.perp0, parts.perp1, parts.parallel * self.sign)
    }
}
