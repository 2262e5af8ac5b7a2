//! Static analysis driver.
//!
//! [`StaticAnalysis`] owns the model and runs steps. A step either
//! converges and is committed everywhere (objects, global state, recorders)
//! or fails and leaves the committed state exactly as it was.

use crate::algorithm::NewtonRaphson;
use crate::config::AnalysisConfig;
use crate::control;
use crate::convergence::ConvergenceTest;
use crate::domain::Domain;
use crate::error::Result;
use crate::integrator::{self, StaticIntegrator};
use crate::solver::select_solver;
use crate::state::AnalysisState;
use crate::types::Tag;
use tracing::{debug, info, warn};

/// Outcome of one converged step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// 1-based step number over the lifetime of the analysis.
    pub step: usize,
    pub iterations: usize,
    /// Committed load factor.
    pub load_factor: f64,
    /// Convergence measure of each iteration.
    pub history: Vec<f64>,
    /// Recorders that failed during this step and were disabled.
    pub disabled_recorders: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisReport {
    pub steps: Vec<StepReport>,
}

impl AnalysisReport {
    /// Iterations over all steps.
    pub fn iterations(&self) -> usize {
        self.steps.iter().map(|s| s.iterations).sum()
    }

    pub fn last(&self) -> Option<&StepReport> {
        self.steps.last()
    }
}

#[derive(Debug)]
pub struct StaticAnalysis {
    domain: Domain,
    state: AnalysisState,
    integrator: StaticIntegrator,
    algorithm: NewtonRaphson,
    test: ConvergenceTest,
    config: AnalysisConfig,
    step: usize,
    /// Whether the state has been sized against the current DOF map.
    numbered: bool,
}

impl StaticAnalysis {
    /// Set up an analysis of `domain`. The model is numbered on the first
    /// step.
    pub fn new(domain: Domain, config: AnalysisConfig) -> Result<Self> {
        let test = ConvergenceTest::new(
            config.test.criterion,
            config.test.norm,
            config.test.tolerance,
            config.test.max_iterations,
        )?;
        Ok(Self {
            domain,
            state: AnalysisState::new(0, select_solver(config.linear_solver)),
            integrator: StaticIntegrator::new(control::strategy(&config.control)?),
            algorithm: NewtonRaphson::new(config.tangent),
            test,
            config,
            step: 0,
            numbered: false,
        })
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Mutable model access between steps. Structural changes trigger a
    /// renumbering at the next step.
    pub fn domain_mut(&mut self) -> &mut Domain {
        &mut self.domain
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Steps committed so far.
    pub fn steps_done(&self) -> usize {
        self.step
    }

    pub fn into_domain(self) -> Domain {
        self.domain
    }

    /// Run `steps` steps. Stops at the first failed step; everything
    /// committed before it is kept.
    ///
    /// Objects disabled before the call are reactivated first; objects
    /// disabled between single [`step`](Self::step) calls stay out until
    /// the next `analyze`.
    pub fn analyze(&mut self, steps: usize) -> Result<AnalysisReport> {
        let reactivated = self.domain.reactivate();
        if reactivated > 0 {
            debug!(reactivated, "disabled objects returned to the analysis");
        }
        let mut report = AnalysisReport::default();
        for _ in 0..steps {
            report.steps.push(self.step()?);
        }
        Ok(report)
    }

    /// Run one step.
    pub fn step(&mut self) -> Result<StepReport> {
        self.prepare()?;

        let step = self.step + 1;
        let iterations = match self.solve_step() {
            Ok(iterations) => iterations,
            Err(e) => {
                self.abandon(step, &e);
                return Err(e);
            }
        };
        if let Err(e) = self.domain.commit_all() {
            self.abandon(step, &e);
            return Err(e);
        }
        self.state.commit();
        self.step = step;

        let load_factor = self.state.load_factor();
        let disabled_recorders = self.domain.record(step, load_factor);
        info!(step, iterations, load_factor, "step converged");

        Ok(StepReport {
            step,
            iterations,
            load_factor,
            history: self.test.history().to_vec(),
            disabled_recorders,
        })
    }

    /// Form `C = αM + βK` from the mass and the tangent at the committed
    /// state.
    pub fn rayleigh_damping(&mut self, alpha: f64, beta: f64) -> Result<()> {
        self.prepare()?;
        self.integrator.form_tangent(&self.domain, &mut self.state)?;
        self.state.rayleigh_damping(alpha, beta)
    }

    fn solve_step(&mut self) -> Result<usize> {
        self.integrator.new_step(&mut self.domain, &mut self.state)?;
        self.algorithm.solve_step(
            &mut self.integrator,
            &mut self.test,
            &mut self.domain,
            &mut self.state,
        )
    }

    /// Number the model if it changed or was never numbered by this
    /// analysis, otherwise refresh the active lists.
    fn prepare(&mut self) -> Result<()> {
        if !self.numbered || self.domain.is_modified() {
            self.renumber()
        } else {
            self.domain.update();
            Ok(())
        }
    }

    fn renumber(&mut self) -> Result<()> {
        self.domain.number_dofs(self.config.numberer)?;
        self.state.renumber(self.domain.committed_displacement()?);
        self.state.set_mass(integrator::assemble_mass(&self.domain)?);
        self.numbered = true;
        info!(equations = self.domain.n_equations(), "model numbered");
        Ok(())
    }

    /// Discard every trial state after a failed step.
    fn abandon(&mut self, step: usize, error: &crate::error::Error) {
        warn!(step, %error, "step failed, trial state discarded");
        if let Err(reset) = self.domain.reset_all() {
            warn!(step, error = %reset, "reset after failed step reported an error");
        }
        self.state.revert_to_last_commit();
    }
}
