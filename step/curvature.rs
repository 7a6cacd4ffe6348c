//! Rank-two correction of the curvature approximation.
//!
//! Given the matrix `B` in force for the last step, the step itself and the
//! gradients on either side of it, the update is
//!
//! ```text
//! s     = alpha·p
//! y     = ∇f(x + s) − g
//! B_new = B + ((sᵀy + yᵀBy) / (sᵀy)²)·ssᵀ − (Bysᵀ + syᵀB) / sᵀy
//! ```
//!
//! This is the inverse-Hessian form of the BFGS correction (it enforces
//! `B_new·y = s`), while [`crate::direction`] solves with `B` as though it
//! approximated the Hessian itself. The two are kept exactly as written;
//! iterates therefore follow a different path than textbook BFGS.

use crate::gradient::{FINITE_DIFFERENCE_STEP, gradient_with_step};
use ndarray::{Array1, Array2};
use thiserror::Error;

/// Default relative threshold on `|sᵀy| / (‖s‖·‖y‖)` below which the pair is degenerate.
pub const DEFAULT_DEGENERACY_TOLERANCE: f64 = f64::EPSILON;

/// Failures of the curvature update.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurvatureError {
    #[error(
        "Step and gradient change are orthogonal (sᵀy = {sy:.6e}, threshold {threshold:.6e}); the rank-two update is undefined and the curvature approximation should be reset."
    )]
    DegenerateCurvaturePair { sy: f64, threshold: f64 },

    #[error("Step length must be positive and finite, but was {alpha}.")]
    InvalidStepLength { alpha: f64 },

    #[error("The {what} has {found} components, but the curvature matrix is {expected}x{expected}.")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Gradient component {index} at the new iterate is not finite ({value}).")]
    NonFiniteGradient { index: usize, value: f64 },
}

/// Numeric settings for the update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvatureOptions {
    /// Half-width of the central difference used to re-estimate the gradient.
    pub finite_difference_step: f64,
    /// Relative threshold for declaring `sᵀy` indistinguishable from zero.
    pub degeneracy_tolerance: f64,
}

impl Default for CurvatureOptions {
    fn default() -> Self {
        Self {
            finite_difference_step: FINITE_DIFFERENCE_STEP,
            degeneracy_tolerance: DEFAULT_DEGENERACY_TOLERANCE,
        }
    }
}

/// Everything computed while updating: the new matrix plus the iterate and
/// gradient it was built from, so a caller can advance without re-evaluating.
#[derive(Debug, Clone)]
pub struct CurvatureStep {
    pub curvature: Array2<f64>,
    pub point: Array1<f64>,
    pub gradient: Array1<f64>,
}

/// The starting approximation `B0 = I`.
pub fn identity_curvature(n: usize) -> Array2<f64> {
    Array2::eye(n)
}

/// Returns the updated curvature matrix after a step of length `alpha` along `p`.
///
/// Costs `2n` evaluations of `f` for the gradient at `x_old + alpha·p`.
pub fn update_curvature<F>(
    b_old: &Array2<f64>,
    x_old: &Array1<f64>,
    g_old: &Array1<f64>,
    p: &Array1<f64>,
    f: &F,
    alpha: f64,
) -> Result<Array2<f64>, CurvatureError>
where
    F: Fn(&Array1<f64>) -> f64 + ?Sized,
{
    update_curvature_with(b_old, x_old, g_old, p, f, alpha, &CurvatureOptions::default())
}

/// [`update_curvature`] with explicit numeric settings.
pub fn update_curvature_with<F>(
    b_old: &Array2<f64>,
    x_old: &Array1<f64>,
    g_old: &Array1<f64>,
    p: &Array1<f64>,
    f: &F,
    alpha: f64,
    options: &CurvatureOptions,
) -> Result<Array2<f64>, CurvatureError>
where
    F: Fn(&Array1<f64>) -> f64 + ?Sized,
{
    curvature_step(b_old, x_old, g_old, p, f, alpha, options).map(|step| step.curvature)
}

/// Takes the step `x_old + alpha·p`, re-estimates the gradient there and
/// applies the rank-two correction.
pub fn curvature_step<F>(
    b_old: &Array2<f64>,
    x_old: &Array1<f64>,
    g_old: &Array1<f64>,
    p: &Array1<f64>,
    f: &F,
    alpha: f64,
    options: &CurvatureOptions,
) -> Result<CurvatureStep, CurvatureError>
where
    F: Fn(&Array1<f64>) -> f64 + ?Sized,
{
    if alpha <= 0.0 || !alpha.is_finite() {
        return Err(CurvatureError::InvalidStepLength { alpha });
    }
    let n = square_dimension(b_old)?;
    check_length("iterate", x_old, n)?;
    check_length("gradient", g_old, n)?;
    check_length("search direction", p, n)?;

    let s = p * alpha;
    let x_new = x_old + &s;
    let g_new = gradient_with_step(f, &x_new, options.finite_difference_step);
    if let Some((index, &value)) = g_new.iter().enumerate().find(|(_, g)| !g.is_finite()) {
        log::warn!("Non-finite gradient component {} after the step", index);
        return Err(CurvatureError::NonFiniteGradient { index, value });
    }
    let y = &g_new - g_old;

    let curvature = rank_two_update(b_old, &s, &y, options.degeneracy_tolerance)?;
    Ok(CurvatureStep {
        curvature,
        point: x_new,
        gradient: g_new,
    })
}

/// Applies the rank-two correction for a known step `s` and gradient change `y`.
///
/// Fails with [`CurvatureError::DegenerateCurvaturePair`] when
/// `|sᵀy| <= tolerance·‖s‖·‖y‖` or `sᵀy` is not finite.
pub fn rank_two_update(
    b_old: &Array2<f64>,
    s: &Array1<f64>,
    y: &Array1<f64>,
    tolerance: f64,
) -> Result<Array2<f64>, CurvatureError> {
    let n = square_dimension(b_old)?;
    check_length("step", s, n)?;
    check_length("gradient change", y, n)?;

    let b_y = b_old.dot(y);
    let y_b = b_old.t().dot(y);
    let y_b_y = y.dot(&b_y);
    let sy = s.dot(y);

    let threshold = tolerance * s.dot(s).sqrt() * y.dot(y).sqrt();
    if sy.abs() <= threshold || !sy.is_finite() {
        log::warn!(
            "Degenerate curvature pair: sᵀy = {:.6e} (threshold {:.6e})",
            sy,
            threshold
        );
        return Err(CurvatureError::DegenerateCurvaturePair { sy, threshold });
    }

    let term1 = outer(s, s) * ((sy + y_b_y) / (sy * sy));
    let term2 = (outer(&b_y, s) + outer(s, &y_b)) / sy;

    log::debug!(
        "Rank-two curvature correction with sᵀy = {:.6e}, yᵀBy = {:.6e}",
        sy,
        y_b_y
    );
    Ok(b_old + &term1 - &term2)
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j])
}

fn square_dimension(b: &Array2<f64>) -> Result<usize, CurvatureError> {
    if b.nrows() != b.ncols() {
        return Err(CurvatureError::DimensionMismatch {
            what: "curvature matrix row",
            expected: b.nrows(),
            found: b.ncols(),
        });
    }
    Ok(b.nrows())
}

fn check_length(what: &'static str, v: &Array1<f64>, n: usize) -> Result<(), CurvatureError> {
    if v.len() != n {
        return Err(CurvatureError::DimensionMismatch {
            what,
            expected: n,
            found: v.len(),
        });
    }
    Ok(())
}
