//! Search directions from the curvature matrix.
//!
//! The direction `p` solves `B·p = −g`. `B` is treated as a symmetric
//! positive-definite system and handed to a Jacobi-preconditioned conjugate
//! gradient iteration; no inverse or factorization is ever formed. A matrix
//! that turns out not to be SPD, or a solve that runs out of iterations, is
//! reported to the caller rather than approximated: with a correctly
//! maintained `B` neither should happen, so both point at corrupted state
//! upstream.

use ndarray::{Array1, Array2};
use thiserror::Error;

/// Default relative residual `‖B·p + g‖ / ‖g‖` at which CG stops.
pub const DEFAULT_CG_TOLERANCE: f64 = 1e-12;

/// Largest tolerated `|B[i,j] − B[j,i]|`, relative to the largest entry of `B`.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// The way in which a curvature matrix failed to be SPD.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SpdViolation {
    #[error("entries ({row}, {col}) and ({col}, {row}) differ by {difference:.3e}")]
    Asymmetric {
        row: usize,
        col: usize,
        difference: f64,
    },

    #[error("diagonal entry {index} is {value}, but an SPD matrix has a strictly positive diagonal")]
    NonPositiveDiagonal { index: usize, value: f64 },

    #[error("search direction at CG iteration {iteration} has curvature dᵀBd = {curvature:.6e}")]
    NonPositiveCurvature { iteration: usize, curvature: f64 },
}

/// Failures of the direction solve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DirectionError {
    #[error("The curvature matrix is not symmetric positive-definite: {0}.")]
    NonSpdMatrix(SpdViolation),

    #[error(
        "Conjugate gradient did not reach tolerance within {iterations} iterations. Last relative residual was {relative_residual:.6e}."
    )]
    SolveDidNotConverge {
        iterations: usize,
        relative_residual: f64,
    },

    #[error(
        "Curvature matrix is {rows}x{cols}, but the gradient has {gradient_len} components."
    )]
    DimensionMismatch {
        rows: usize,
        cols: usize,
        gradient_len: usize,
    },

    #[error("Gradient component {index} is not finite ({value}).")]
    NonFiniteGradient { index: usize, value: f64 },
}

/// Stopping rule for the conjugate gradient iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionOptions {
    /// Relative residual below which the solve is accepted.
    pub tolerance: f64,
    /// Iteration budget; `None` means twice the dimension.
    pub max_iterations: Option<usize>,
}

impl Default for DirectionOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_CG_TOLERANCE,
            max_iterations: None,
        }
    }
}

/// A converged direction together with the solver's diagnostics.
#[derive(Debug, Clone)]
pub struct CgSolution {
    pub direction: Array1<f64>,
    pub iterations: usize,
    pub relative_residual: f64,
}

/// Solves `B·p = −grad` with the default tolerance and iteration budget.
pub fn compute_direction(
    b: &Array2<f64>,
    grad: &Array1<f64>,
) -> Result<Array1<f64>, DirectionError> {
    compute_direction_with(b, grad, &DirectionOptions::default())
}

/// Solves `B·p = −grad` with caller-chosen stopping rules.
pub fn compute_direction_with(
    b: &Array2<f64>,
    grad: &Array1<f64>,
    options: &DirectionOptions,
) -> Result<Array1<f64>, DirectionError> {
    solve_spd(b, grad, options).map(|solution| solution.direction)
}

/// Jacobi-preconditioned conjugate gradient for `B·p = −grad`.
///
/// Before iterating, `B` is checked for symmetry and for a strictly positive
/// diagonal. During the iteration every search direction `d` must have
/// `dᵀBd > 0`; the first one that does not ends the solve with
/// [`DirectionError::NonSpdMatrix`]. A zero gradient yields the zero direction
/// without iterating.
pub fn solve_spd(
    b: &Array2<f64>,
    grad: &Array1<f64>,
    options: &DirectionOptions,
) -> Result<CgSolution, DirectionError> {
    let n = grad.len();
    if b.nrows() != n || b.ncols() != n {
        return Err(DirectionError::DimensionMismatch {
            rows: b.nrows(),
            cols: b.ncols(),
            gradient_len: n,
        });
    }
    if let Some((index, &value)) = grad.iter().enumerate().find(|(_, g)| !g.is_finite()) {
        return Err(DirectionError::NonFiniteGradient { index, value });
    }

    check_symmetry(b)?;
    let inv_diag = inverse_diagonal(b)?;

    let rhs = grad.mapv(|g| -g);
    let rhs_norm_sq = rhs.dot(&rhs);
    if rhs_norm_sq == 0.0 {
        log::debug!("Zero gradient, returning the zero direction");
        return Ok(CgSolution {
            direction: Array1::zeros(n),
            iterations: 0,
            relative_residual: 0.0,
        });
    }

    let threshold = (options.tolerance * options.tolerance * rhs_norm_sq).max(f64::MIN_POSITIVE);
    let max_iterations = options.max_iterations.unwrap_or(2 * n);

    let mut p = Array1::<f64>::zeros(n);
    let mut r = rhs;
    let mut z = &inv_diag * &r;
    let mut d = z.clone();
    let mut rz = r.dot(&z);
    let mut residual_sq = rhs_norm_sq;

    for iteration in 0..max_iterations {
        let bd = b.dot(&d);
        let curvature = d.dot(&bd);
        if curvature <= 0.0 || !curvature.is_finite() {
            log::warn!(
                "CG breakdown at iteration {}: dᵀBd = {:.6e}, curvature matrix is not SPD",
                iteration,
                curvature
            );
            return Err(DirectionError::NonSpdMatrix(
                SpdViolation::NonPositiveCurvature {
                    iteration,
                    curvature,
                },
            ));
        }

        let step = rz / curvature;
        p.scaled_add(step, &d);
        r.scaled_add(-step, &bd);
        residual_sq = r.dot(&r);

        let relative_residual = (residual_sq / rhs_norm_sq).sqrt();
        log::trace!(
            "CG iteration {}: relative residual {:.3e}",
            iteration + 1,
            relative_residual
        );

        if residual_sq < threshold {
            log::debug!(
                "Conjugate gradient converged in {} iterations (relative residual {:.3e})",
                iteration + 1,
                relative_residual
            );
            return Ok(CgSolution {
                direction: p,
                iterations: iteration + 1,
                relative_residual,
            });
        }

        z = &inv_diag * &r;
        let rz_next = r.dot(&z);
        let beta = rz_next / rz;
        rz = rz_next;
        d.mapv_inplace(|v| v * beta);
        d += &z;
    }

    let relative_residual = (residual_sq / rhs_norm_sq).sqrt();
    log::warn!(
        "Conjugate gradient exhausted {} iterations with relative residual {:.6e}",
        max_iterations,
        relative_residual
    );
    Err(DirectionError::SolveDidNotConverge {
        iterations: max_iterations,
        relative_residual,
    })
}

fn check_symmetry(b: &Array2<f64>) -> Result<(), DirectionError> {
    let scale = b.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tolerance = SYMMETRY_TOLERANCE * scale;
    let n = b.nrows();

    for row in 0..n {
        for col in (row + 1)..n {
            let difference = (b[[row, col]] - b[[col, row]]).abs();
            if difference > tolerance {
                log::warn!(
                    "Curvature matrix is asymmetric at ({}, {}): difference {:.3e}",
                    row,
                    col,
                    difference
                );
                return Err(DirectionError::NonSpdMatrix(SpdViolation::Asymmetric {
                    row,
                    col,
                    difference,
                }));
            }
        }
    }
    Ok(())
}

/// Jacobi preconditioner `diag(B)⁻¹`.
fn inverse_diagonal(b: &Array2<f64>) -> Result<Array1<f64>, DirectionError> {
    let mut inv = Array1::zeros(b.nrows());
    for (index, &value) in b.diag().iter().enumerate() {
        if value <= 0.0 || !value.is_finite() {
            log::warn!(
                "Curvature matrix diagonal entry {} is {}, matrix is not SPD",
                index,
                value
            );
            return Err(DirectionError::NonSpdMatrix(
                SpdViolation::NonPositiveDiagonal { index, value },
            ));
        }
        inv[index] = value.recip();
    }
    Ok(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::gradient;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn spd_3x3() -> Array2<f64> {
        array![[4.0, 1.0, 0.0], [1.0, 3.0, 0.5], [0.0, 0.5, 2.0]]
    }

    #[test]
    fn identity_curvature_gives_steepest_descent() {
        // f(x) = 0.5·xᵀx, so ∇f(x) = x and p should be −x
        let f = |x: &Array1<f64>| 0.5 * x.dot(x);
        let x = array![1.5, -0.25, 4.0];
        let g = gradient(&f, &x);

        let p = compute_direction(&Array2::eye(3), &g).unwrap();

        for i in 0..3 {
            assert_abs_diff_eq!(p[i], -x[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn direction_satisfies_the_linear_system() {
        let b = spd_3x3();
        let g = array![1.0, -2.0, 0.5];

        let solution = solve_spd(&b, &g, &DirectionOptions::default()).unwrap();

        let residual = b.dot(&solution.direction) + &g;
        for r in residual.iter() {
            assert_abs_diff_eq!(*r, 0.0, epsilon = 1e-10);
        }
        assert!(solution.iterations <= 6);
        assert!(solution.relative_residual < DEFAULT_CG_TOLERANCE);
    }

    #[test]
    fn direction_is_a_descent_direction() {
        let b = spd_3x3();
        let g = array![0.3, 0.9, -1.7];

        let p = compute_direction(&b, &g).unwrap();

        assert!(p.dot(&g) < 0.0);
    }

    #[test]
    fn negative_eigenvalue_on_the_diagonal_is_rejected() {
        let b = array![[1.0, 0.0], [0.0, -1.0]];
        let g = array![1.0, 1.0];

        let err = compute_direction(&b, &g).unwrap_err();

        assert!(matches!(
            err,
            DirectionError::NonSpdMatrix(SpdViolation::NonPositiveDiagonal { index: 1, .. })
        ));
    }

    #[test]
    fn indefinite_matrix_with_positive_diagonal_breaks_down() {
        // Eigenvalues 3 and −1; the first search direction lies along the negative one
        let b = array![[1.0, 2.0], [2.0, 1.0]];
        let g = array![-1.0, 1.0];

        let err = compute_direction(&b, &g).unwrap_err();

        match err {
            DirectionError::NonSpdMatrix(SpdViolation::NonPositiveCurvature {
                iteration,
                curvature,
            }) => {
                assert_eq!(iteration, 0);
                assert_abs_diff_eq!(curvature, -2.0, epsilon = 1e-12);
            }
            other => panic!("expected a curvature breakdown, got {other:?}"),
        }
    }

    #[test]
    fn exhausted_budget_is_reported_not_approximated() {
        let b = array![[4.0, 1.0], [1.0, 3.0]];
        let g = array![1.0, 2.0];
        let options = DirectionOptions {
            max_iterations: Some(1),
            ..DirectionOptions::default()
        };

        let err = compute_direction_with(&b, &g, &options).unwrap_err();

        match err {
            DirectionError::SolveDidNotConverge {
                iterations,
                relative_residual,
            } => {
                assert_eq!(iterations, 1);
                assert!(relative_residual > 1e-3);
            }
            other => panic!("expected non-convergence, got {other:?}"),
        }
    }

    #[test]
    fn zero_gradient_gives_zero_direction() {
        let solution = solve_spd(&spd_3x3(), &Array1::zeros(3), &DirectionOptions::default())
            .unwrap();

        assert_eq!(solution.iterations, 0);
        assert!(solution.direction.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn asymmetric_matrix_is_not_spd() {
        let b = array![[2.0, 1.0], [0.5, 2.0]];

        let err = compute_direction(&b, &array![1.0, 1.0]).unwrap_err();

        assert!(matches!(
            err,
            DirectionError::NonSpdMatrix(SpdViolation::Asymmetric { row: 0, col: 1, .. })
        ));
    }

    #[test]
    fn shape_mismatches_are_rejected() {
        let err = compute_direction(&Array2::eye(2), &array![1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            DirectionError::DimensionMismatch {
                rows: 2,
                cols: 2,
                gradient_len: 3
            }
        );

        let err = compute_direction(&Array2::zeros((2, 3)), &array![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, DirectionError::DimensionMismatch { cols: 3, .. }));
    }

    #[test]
    fn non_finite_gradient_is_rejected() {
        let err = compute_direction(&Array2::eye(2), &array![1.0, f64::NAN]).unwrap_err();
        assert!(matches!(
            err,
            DirectionError::NonFiniteGradient { index: 1, .. }
        ));
    }

    #[test]
    fn inputs_are_not_modified() {
        let b = spd_3x3();
        let g = array![1.0, 2.0, 3.0];
        let (b_before, g_before) = (b.clone(), g.clone());

        compute_direction(&b, &g).unwrap();

        assert_eq!(b, b_before);
        assert_eq!(g, g_before);
    }

    #[test]
    fn error_messages_name_the_cause() {
        let err = DirectionError::NonSpdMatrix(SpdViolation::NonPositiveDiagonal {
            index: 1,
            value: -1.0,
        });
        assert!(err.to_string().contains("diagonal entry 1 is -1"));
    }
}
