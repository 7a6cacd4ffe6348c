//! Central finite-difference gradients.
//!
//! The half-width is fixed rather than scaled to `|x|` or to the objective.
//! That keeps the estimate reproducible across callers at the cost of accuracy
//! for objectives whose natural scale is far from unity.

use crate::point::Point;

/// Default half-width `h` of the central difference; the full stencil spans `2h`.
pub const FINITE_DIFFERENCE_STEP: f64 = 1e-8;

/// Estimates `∇f(point)` with central differences and the default step.
///
/// Component `i` is `(f(point + h·eᵢ) − f(point − h·eᵢ)) / 2h` with
/// `h = 1e-8`. The objective is evaluated exactly `2n` times and the result has
/// the same container type and dimension as `point`.
pub fn gradient<P, F>(f: &F, point: &P) -> P
where
    P: Point,
    F: Fn(&P) -> f64 + ?Sized,
{
    gradient_with_step(f, point, FINITE_DIFFERENCE_STEP)
}

/// Same as [`gradient`] with an explicit half-width `h`.
pub fn gradient_with_step<P, F>(f: &F, point: &P, h: f64) -> P
where
    P: Point,
    F: Fn(&P) -> f64 + ?Sized,
{
    let mut grad = point.clone();
    let mut perturbed = point.clone();

    for i in 0..point.dimension() {
        let center = point.component(i);

        perturbed.set_component(i, center + h);
        let f_plus = f(&perturbed);

        perturbed.set_component(i, center - h);
        let f_minus = f(&perturbed);

        perturbed.set_component(i, center);

        grad.set_component(i, (f_plus - f_minus) / (2.0 * h));
    }

    log::trace!(
        "Central-difference gradient over {} coordinates ({} objective evaluations)",
        point.dimension(),
        2 * point.dimension()
    );
    grad
}
