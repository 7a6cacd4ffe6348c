#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Per-iteration building blocks for a BFGS-family quasi-Newton optimizer.
//!
//! The crate deliberately stops at a single step. A caller owns the iterate
//! `x`, its gradient `g` and the curvature matrix `B`, and drives the loop:
//!
//! 1. [`direction::compute_direction`] solves `B·p = −g` with conjugate gradient.
//! 2. The caller picks a step length `alpha` (line search is not provided here).
//! 3. [`curvature::update_curvature`] moves to `x + alpha·p`, re-estimates the
//!    gradient with [`gradient::gradient`] and returns the rank-two corrected `B`.
//!
//! [`bfgs::QuasiNewton`] bundles the initial state (`x0`, `B0 = I`) with a
//! validated [`config::StepConfig`] so the three primitives share one set of
//! numeric settings.

pub mod bfgs;
pub mod config;
pub mod curvature;
pub mod direction;
pub mod gradient;
pub mod point;

pub use bfgs::{QuasiNewton, StepError};
pub use config::{ConfigError, StepConfig};
pub use curvature::{
    CurvatureError, CurvatureOptions, CurvatureStep, curvature_step, identity_curvature,
    rank_two_update, update_curvature, update_curvature_with,
};
pub use direction::{
    CgSolution, DirectionError, DirectionOptions, SpdViolation, compute_direction,
    compute_direction_with, solve_spd,
};
pub use gradient::{FINITE_DIFFERENCE_STEP, gradient, gradient_with_step};
pub use point::Point;
