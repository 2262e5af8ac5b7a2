//! Newton–Raphson equilibrium iteration.
//!
//! There is one loop for all control strategies: the integrator solves and
//! updates, the convergence test judges. The loop never commits; on success
//! the trial state is left pending for the analysis driver to commit.

use crate::convergence::ConvergenceTest;
use crate::domain::Domain;
use crate::error::Result;
use crate::integrator::StaticIntegrator;
use crate::state::AnalysisState;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// When the tangent is reassembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TangentUpdate {
    /// Full Newton: after every iteration.
    #[default]
    EveryIteration,
    /// Modified Newton: once, at the start of the step.
    StepStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NewtonRaphson {
    tangent: TangentUpdate,
}

impl NewtonRaphson {
    pub fn new(tangent: TangentUpdate) -> Self {
        Self { tangent }
    }

    pub fn tangent_update(&self) -> TangentUpdate {
        self.tangent
    }

    /// Iterate the step prepared by [`StaticIntegrator::new_step`] to
    /// convergence. Returns the number of iterations.
    ///
    /// Any solver, control-equation or constitutive error aborts the loop
    /// immediately; the trial state is then left for the caller to reset.
    pub fn solve_step(
        &self,
        integrator: &mut StaticIntegrator,
        test: &mut ConvergenceTest,
        domain: &mut Domain,
        state: &mut AnalysisState,
    ) -> Result<usize> {
        test.start(state);
        let mut iteration = 0;
        loop {
            iteration += 1;
            let rhs = state.residual().clone();
            integrator.update(iteration, domain, state)?;

            let converged = test.check(iteration, state, &rhs)?;
            debug!(
                iteration,
                measure = test.history().last().copied().unwrap_or_default(),
                load_factor = state.trial_load_factor(),
                "equilibrium iteration"
            );
            if converged {
                return Ok(iteration);
            }
            if self.tangent == TangentUpdate::EveryIteration {
                integrator.form_tangent(domain, state)?;
            }
        }
    }
}
