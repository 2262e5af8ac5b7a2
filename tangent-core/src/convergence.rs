//! Convergence tests for the equilibrium iteration.
//!
//! A [`ConvergenceTest`] is started once per step and asked after every
//! iteration whether the candidate iterate is accepted. It keeps the
//! measure of every iteration so that the step report can show how the
//! iteration went.

use crate::error::{Error, Result};
use crate::state::AnalysisState;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Quantity compared against the tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Criterion {
    /// Norm of the out-of-balance force.
    #[default]
    NormUnbalance,
    /// Norm of the last displacement correction.
    NormDispIncr,
    /// Half the work of the correction against the solved right-hand side.
    EnergyIncr,
    /// Out-of-balance norm relative to its value at the start of the step.
    RelativeNormUnbalance,
}

/// Vector norm used by the criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Norm {
    L1,
    #[default]
    L2,
    Max,
}

impl Norm {
    pub fn apply(self, v: &DVector<f64>) -> f64 {
        match self {
            Norm::L1 => v.iter().map(|x| x.abs()).sum(),
            Norm::L2 => v.norm(),
            Norm::Max => v.iter().fold(0.0, |m, x| m.max(x.abs())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceTest {
    criterion: Criterion,
    norm: Norm,
    tolerance: f64,
    max_iterations: usize,
    /// Unbalance norm at the start of the step.
    reference: f64,
    history: Vec<f64>,
}

impl ConvergenceTest {
    pub fn new(
        criterion: Criterion,
        norm: Norm,
        tolerance: f64,
        max_iterations: usize,
    ) -> Result<Self> {
        if !(tolerance > 0.0) || !tolerance.is_finite() {
            return Err(Error::Configuration(format!(
                "convergence tolerance must be positive, got {}",
                tolerance
            )));
        }
        if max_iterations == 0 {
            return Err(Error::Configuration(
                "maximum iterations must be at least 1".into(),
            ));
        }
        Ok(Self {
            criterion,
            norm,
            tolerance,
            max_iterations,
            reference: 0.0,
            history: Vec::new(),
        })
    }

    pub fn criterion(&self) -> Criterion {
        self.criterion
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Measures of the iterations of the current step.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Reset for a new step. `state` holds the residual at the predictor.
    pub fn start(&mut self, state: &AnalysisState) {
        self.history.clear();
        self.reference = self.norm.apply(state.residual());
    }

    /// Judge the iterate in `state`.
    ///
    /// `rhs` is the right-hand side that produced the last correction. Returns
    /// `Ok(true)` on convergence, `Ok(false)` to keep iterating.
    ///
    /// # Errors
    ///
    /// [`Error::NonConvergence`] once `iteration` reaches the maximum without
    /// convergence, or immediately if the measure is not finite.
    pub fn check(
        &mut self,
        iteration: usize,
        state: &AnalysisState,
        rhs: &DVector<f64>,
    ) -> Result<bool> {
        let measure = match self.criterion {
            Criterion::NormUnbalance => self.norm.apply(state.residual()),
            Criterion::NormDispIncr => self.norm.apply(state.correction()),
            Criterion::EnergyIncr => 0.5 * state.correction().dot(rhs).abs(),
            Criterion::RelativeNormUnbalance => {
                let norm = self.norm.apply(state.residual());
                if self.reference > 0.0 {
                    norm / self.reference
                } else {
                    norm
                }
            }
        };
        self.history.push(measure);

        if !measure.is_finite() {
            return Err(Error::NonConvergence {
                iterations: iteration,
                norm: measure,
            });
        }
        if measure <= self.tolerance {
            return Ok(true);
        }
        if iteration >= self.max_iterations {
            return Err(Error::NonConvergence {
                iterations: iteration,
                norm: measure,
            });
        }
        Ok(false)
    }
}
