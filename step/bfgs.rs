//! The initial state of a quasi-Newton run and the step primitives bound to
//! one validated configuration.

use crate::config::{ConfigError, StepConfig};
use crate::curvature::{self, CurvatureError, CurvatureStep};
use crate::direction::{self, CgSolution, DirectionError};
use crate::gradient::gradient_with_step;
use ndarray::{Array1, Array2};
use thiserror::Error;

/// Any failure of a quasi-Newton step.
///
/// None of these are retried internally. A caller typically aborts on
/// [`DirectionError::NonSpdMatrix`], and resets the curvature matrix to
/// [`QuasiNewton::initial_curvature`] on
/// [`CurvatureError::DegenerateCurvaturePair`].
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Search direction could not be computed: {0}")]
    Direction(#[from] DirectionError),
    #[error("Curvature update failed: {0}")]
    Curvature(#[from] CurvatureError),
    #[error("Invalid step configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Starting point `x0`, starting curvature `B0 = I`, and the numeric settings
/// used by every primitive called through this value.
///
/// The struct never stores iterates. Each method reads its arguments and
/// returns freshly allocated results, so one `QuasiNewton` can serve any
/// number of independent runs.
#[derive(Debug, Clone)]
pub struct QuasiNewton {
    x0: Array1<f64>,
    b0: Array2<f64>,
    config: StepConfig,
}

impl QuasiNewton {
    /// Creates the initial state for a problem whose dimension is `x0.len()`.
    pub fn new(x0: Array1<f64>) -> Self {
        let n = x0.len();
        log::info!("Initialized quasi-Newton state with {} parameters", n);
        Self {
            x0,
            b0: curvature::identity_curvature(n),
            config: StepConfig::default(),
        }
    }

    /// Replaces the default settings after validating them.
    pub fn with_config(mut self, config: StepConfig) -> Result<Self, StepError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn dimension(&self) -> usize {
        self.x0.len()
    }

    pub fn initial_point(&self) -> &Array1<f64> {
        &self.x0
    }

    /// The identity matrix the first direction is solved against, and the
    /// matrix to fall back to after a degenerate update.
    pub fn initial_curvature(&self) -> &Array2<f64> {
        &self.b0
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Central-difference gradient with the configured step.
    pub fn gradient<F>(&self, f: &F, x: &Array1<f64>) -> Array1<f64>
    where
        F: Fn(&Array1<f64>) -> f64 + ?Sized,
    {
        gradient_with_step(f, x, self.config.finite_difference_step)
    }

    /// Solves `B·p = −grad` for the search direction.
    pub fn compute_direction(
        &self,
        b: &Array2<f64>,
        grad: &Array1<f64>,
    ) -> Result<Array1<f64>, StepError> {
        Ok(direction::compute_direction_with(
            b,
            grad,
            &self.config.direction_options(),
        )?)
    }

    /// Same solve as [`Self::compute_direction`], keeping the CG diagnostics.
    pub fn solve_direction(
        &self,
        b: &Array2<f64>,
        grad: &Array1<f64>,
    ) -> Result<CgSolution, StepError> {
        Ok(direction::solve_spd(
            b,
            grad,
            &self.config.direction_options(),
        )?)
    }

    /// Returns the curvature matrix updated for the step `alpha·p` from `x_old`.
    pub fn update_curvature<F>(
        &self,
        b_old: &Array2<f64>,
        x_old: &Array1<f64>,
        g_old: &Array1<f64>,
        p: &Array1<f64>,
        f: &F,
        alpha: f64,
    ) -> Result<Array2<f64>, StepError>
    where
        F: Fn(&Array1<f64>) -> f64 + ?Sized,
    {
        Ok(self.step(b_old, x_old, g_old, p, f, alpha)?.curvature)
    }

    /// The full update, including the new iterate and its gradient.
    pub fn step<F>(
        &self,
        b_old: &Array2<f64>,
        x_old: &Array1<f64>,
        g_old: &Array1<f64>,
        p: &Array1<f64>,
        f: &F,
        alpha: f64,
    ) -> Result<CurvatureStep, StepError>
    where
        F: Fn(&Array1<f64>) -> f64 + ?Sized,
    {
        Ok(curvature::curvature_step(
            b_old,
            x_old,
            g_old,
            p,
            f,
            alpha,
            &self.config.curvature_options(),
        )?)
    }
}
