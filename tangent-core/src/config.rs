//! Analysis configuration.
//!
//! Everything that selects or tunes the analysis pipeline: control
//! strategy, convergence test, tangent update policy, DOF numbering and
//! linear solver. Serializable so a run can be described in a file.

use crate::algorithm::TangentUpdate;
use crate::types::Tag;
use serde::{Deserialize, Serialize};

pub use crate::convergence::{Criterion, Norm};
pub use crate::numberer::NumbererKind;
pub use crate::solver::LinearSolverKind;

/// How the load factor is advanced and constrained within a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControlConfig {
    /// Add a fixed load-factor increment per step.
    LoadControl { increment: f64 },
    /// Impose a displacement increment on one node DOF per step.
    DisplacementControl { node: Tag, dof: usize, increment: f64 },
    /// Constrain the combined displacement/load increment to a fixed arc
    /// length. `alpha` scales the load-factor contribution.
    ArcLength { arc_length: f64, alpha: f64 },
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self::LoadControl { increment: 1.0 }
    }
}

/// Convergence test settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    pub criterion: Criterion,
    /// Threshold on the criterion measure.
    pub tolerance: f64,
    /// Iterations allowed per step before the step fails.
    pub max_iterations: usize,
    pub norm: Norm,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            criterion: Criterion::NormUnbalance,
            tolerance: 1e-8,
            max_iterations: 25,
            norm: Norm::L2,
        }
    }
}

/// Configuration of a static analysis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub control: ControlConfig,
    pub test: TestConfig,
    pub tangent: TangentUpdate,
    pub numberer: NumbererKind,
    pub linear_solver: LinearSolverKind,
}

impl AnalysisConfig {
    /// Load control with `steps` equal increments up to a load factor of 1.
    pub fn load_control(steps: usize) -> Self {
        Self {
            control: ControlConfig::LoadControl {
                increment: 1.0 / steps.max(1) as f64,
            },
            ..Default::default()
        }
    }

    /// Displacement control of `dof` at `node`.
    pub fn displacement_control(node: Tag, dof: usize, increment: f64) -> Self {
        Self {
            control: ControlConfig::DisplacementControl {
                node,
                dof,
                increment,
            },
            ..Default::default()
        }
    }

    /// Arc-length control, suitable for tracing past limit points.
    pub fn arc_length(arc_length: f64, alpha: f64) -> Self {
        Self {
            control: ControlConfig::ArcLength { arc_length, alpha },
            ..Default::default()
        }
    }

    /// Modified Newton: tangent formed once per step.
    pub fn modified_newton(mut self) -> Self {
        self.tangent = TangentUpdate::StepStart;
        self
    }
}
