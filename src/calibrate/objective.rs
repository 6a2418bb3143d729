use anyhow::{Result, ensure};
use ndarray::{Array1, ArrayView1};

use super::{solver::Objective, sparse::CsrMatrix};

/// Regularized least-squares calibration objective
///
/// ```text
/// f(x) = ‖A·x − b‖² + δ·‖x − 1‖²
/// ```
///
/// where `A` is the weighted target matrix (targets x records), `b` the scaled targets,
/// and `x` the per-record multipliers on the area-scaled national weights. This is the
/// bi-criterion problem of Boyd & Vandenberghe, *Convex Optimization* (2004), eq. 6.9,
/// with the penalty measured from one instead of zero.
///
/// Built fresh for each solve, so concurrent calibrations never share state.
#[derive(Debug, Clone, Copy)]
pub struct RegularizedObjective<'a> {
    a: &'a CsrMatrix,
    b: ArrayView1<'a, f64>,
    delta: f64,
}

impl<'a> RegularizedObjective<'a> {
    pub fn new(a: &'a CsrMatrix, b: ArrayView1<'a, f64>, delta: f64) -> Result<Self> {
        ensure!(a.nrows() == b.len(),
            "[calibrate::objective] matrix has {} rows but {} targets", a.nrows(), b.len());
        ensure!(delta >= 0.0 && delta.is_finite(),
            "[calibrate::objective] regularization delta must be non-negative, got {delta}");
        Ok(Self { a, b, delta })
    }

    #[inline] pub fn delta(&self) -> f64 { self.delta }

    /// Target residuals `A·x − b`.
    pub fn residuals(&self, x: &ArrayView1<f64>) -> Array1<f64> {
        self.a.dot(x) - &self.b
    }

    /// Fit term `‖A·x − b‖²`.
    pub fn fit_error(&self, x: &ArrayView1<f64>) -> f64 {
        self.residuals(x).mapv(|r| r * r).sum()
    }

    /// Distortion term `‖x − 1‖²`.
    pub fn distortion(&self, x: &ArrayView1<f64>) -> f64 {
        x.iter().map(|&xi| (xi - 1.0) * (xi - 1.0)).sum()
    }

    pub fn value(&self, x: &ArrayView1<f64>) -> f64 {
        self.fit_error(x) + self.delta * self.distortion(x)
    }
}

impl Objective for RegularizedObjective<'_> {
    fn dim(&self) -> usize { self.a.ncols() }

    /// Value and closed-form gradient `2·Aᵗ(A·x − b) + 2δ·(x − 1)`.
    fn value_and_gradient(&self, x: &ArrayView1<f64>) -> (f64, Array1<f64>) {
        let residuals = self.residuals(x);
        let mut gradient = self.a.tr_dot(&residuals.view());
        gradient.zip_mut_with(x, |g, &xi| *g = 2.0 * *g + 2.0 * self.delta * (xi - 1.0));

        let value = residuals.mapv(|r| r * r).sum() + self.delta * self.distortion(x);
        (value, gradient)
    }

    /// Exact Hessian diagonal `2·diag(AᵗA) + 2δ`.
    fn hessian_diagonal(&self) -> Option<Array1<f64>> {
        Some(self.a.column_sq_norms().mapv(|c| 2.0 * c + 2.0 * self.delta))
    }
}
