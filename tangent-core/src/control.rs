//! Load-factor control strategies.
//!
//! Every iteration of a step solves the tangent system for the residual
//! (`du_bar`) and, for constrained strategies, also for the reference load
//! (`du_hat`). The strategy's control equation then fixes the load-factor
//! correction `dλ` and the displacement correction becomes
//! `du = du_bar + dλ·du_hat`.

use crate::config::ControlConfig;
use crate::domain::Domain;
use crate::error::{Error, Result};
use crate::state::AnalysisState;
use crate::types::Tag;
use nalgebra::DVector;
use std::fmt::Debug;

pub trait ControlStrategy: Debug + Send {
    fn name(&self) -> &str;

    /// Prepare a new step and return the load-factor predictor.
    fn new_step(&mut self, domain: &Domain, state: &AnalysisState) -> Result<f64>;

    /// Whether iterations need the reference-load solution `du_hat`.
    fn is_constrained(&self) -> bool {
        true
    }

    /// Load-factor correction for `iteration` (1-based).
    fn correction(
        &mut self,
        iteration: usize,
        state: &AnalysisState,
        du_bar: &DVector<f64>,
        du_hat: Option<&DVector<f64>>,
    ) -> Result<f64>;
}

/// Build the strategy described by `config`.
pub fn strategy(config: &ControlConfig) -> Result<Box<dyn ControlStrategy>> {
    Ok(match *config {
        ControlConfig::LoadControl { increment } => Box::new(LoadControl::new(increment)?),
        ControlConfig::DisplacementControl {
            node,
            dof,
            increment,
        } => Box::new(DisplacementControl::new(node, dof, increment)?),
        ControlConfig::ArcLength { arc_length, alpha } => {
            Box::new(ArcLength::new(arc_length, alpha)?)
        }
    })
}

fn reference_solution(du_hat: Option<&DVector<f64>>) -> Result<&DVector<f64>> {
    du_hat.ok_or_else(|| Error::ControlEquation("reference-load solution missing".into()))
}

/// Fixed load-factor increment per step.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadControl {
    increment: f64,
}

impl LoadControl {
    pub fn new(increment: f64) -> Result<Self> {
        if !increment.is_finite() {
            return Err(Error::Configuration(
                "load increment must be finite".into(),
            ));
        }
        Ok(Self { increment })
    }
}

impl ControlStrategy for LoadControl {
    fn name(&self) -> &str {
        "load control"
    }

    fn new_step(&mut self, _domain: &Domain, _state: &AnalysisState) -> Result<f64> {
        Ok(self.increment)
    }

    fn is_constrained(&self) -> bool {
        false
    }

    fn correction(
        &mut self,
        _iteration: usize,
        _state: &AnalysisState,
        _du_bar: &DVector<f64>,
        _du_hat: Option<&DVector<f64>>,
    ) -> Result<f64> {
        Ok(0.0)
    }
}

/// Prescribe the step increment of one free node DOF.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementControl {
    node: Tag,
    dof: usize,
    increment: f64,
    /// Equation of the controlled DOF, resolved at each step.
    equation: Option<usize>,
}

impl DisplacementControl {
    pub fn new(node: Tag, dof: usize, increment: f64) -> Result<Self> {
        if !increment.is_finite() || increment == 0.0 {
            return Err(Error::Configuration(
                "displacement increment must be finite and nonzero".into(),
            ));
        }
        Ok(Self {
            node,
            dof,
            increment,
            equation: None,
        })
    }
}

impl ControlStrategy for DisplacementControl {
    fn name(&self) -> &str {
        "displacement control"
    }

    fn new_step(&mut self, domain: &Domain, _state: &AnalysisState) -> Result<f64> {
        domain.check_dof(self.node, self.dof)?;
        let equation = domain.dof_map().equation(self.node, self.dof).ok_or_else(|| {
            Error::Configuration(format!(
                "controlled DOF {} of node {} is constrained",
                self.dof, self.node
            ))
        })?;
        self.equation = Some(equation);
        Ok(0.0)
    }

    fn correction(
        &mut self,
        _iteration: usize,
        state: &AnalysisState,
        du_bar: &DVector<f64>,
        du_hat: Option<&DVector<f64>>,
    ) -> Result<f64> {
        let du_hat = reference_solution(du_hat)?;
        let eq = self
            .equation
            .ok_or_else(|| Error::ControlEquation("step was not started".into()))?;
        if du_hat[eq] == 0.0 {
            return Err(Error::SingularSystem(format!(
                "reference load produces no displacement at node {} DOF {}",
                self.node, self.dof
            )));
        }
        Ok((self.increment - state.increment()[eq] - du_bar[eq]) / du_hat[eq])
    }
}

/// Spherical arc-length constraint
/// `|ΔU|² + α²Δλ² = Δs²` on the step increment.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcLength {
    arc_length: f64,
    alpha: f64,
    /// Increments of the last committed step.
    previous: Option<(DVector<f64>, f64)>,
}

impl ArcLength {
    pub fn new(arc_length: f64, alpha: f64) -> Result<Self> {
        if !(arc_length > 0.0) || !arc_length.is_finite() {
            return Err(Error::Configuration(
                "arc length must be positive".into(),
            ));
        }
        if !(alpha >= 0.0) || !alpha.is_finite() {
            return Err(Error::Configuration(
                "arc-length load scale must be non-negative".into(),
            ));
        }
        Ok(Self {
            arc_length,
            alpha,
            previous: None,
        })
    }
}

impl ControlStrategy for ArcLength {
    fn name(&self) -> &str {
        "arc length"
    }

    fn new_step(&mut self, _domain: &Domain, state: &AnalysisState) -> Result<f64> {
        self.previous = state
            .previous_step()
            .filter(|(du, _)| du.len() == state.size())
            .map(|(du, dlambda)| (du.clone(), dlambda));
        Ok(0.0)
    }

    fn correction(
        &mut self,
        iteration: usize,
        state: &AnalysisState,
        du_bar: &DVector<f64>,
        du_hat: Option<&DVector<f64>>,
    ) -> Result<f64> {
        let du_hat = reference_solution(du_hat)?;
        let alpha2 = self.alpha * self.alpha;
        let increment = state.increment();
        let dlambda = state.load_increment();
        let trial = increment + du_bar;

        let a = du_hat.dot(du_hat) + alpha2;
        let b = 2.0 * (du_hat.dot(&trial) + alpha2 * dlambda);
        let c = trial.dot(&trial) + alpha2 * dlambda * dlambda
            - self.arc_length * self.arc_length;

        if !(a > 0.0) {
            return Err(Error::ControlEquation(
                "reference load produces no displacement".into(),
            ));
        }
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return Err(Error::ControlEquation(format!(
                "arc-length equation has no real root (discriminant {:e})",
                discriminant
            )));
        }
        let sqrt = discriminant.sqrt();
        let roots = [(-b + sqrt) / (2.0 * a), (-b - sqrt) / (2.0 * a)];

        if iteration == 1 {
            // Keep going the way the last step went; forward on the first
            let forward = match &self.previous {
                Some((du, dl)) => du.dot(du_hat) + alpha2 * dl >= 0.0,
                None => true,
            };
            return Ok(if forward {
                roots[0].max(roots[1])
            } else {
                roots[0].min(roots[1])
            });
        }

        // Root whose new increment stays closest to the current one
        let alignment = |root: f64| {
            let next = &trial + du_hat * root;
            next.dot(increment) + alpha2 * (dlambda + root) * dlambda
        };
        Ok(if alignment(roots[0]) >= alignment(roots[1]) {
            roots[0]
        } else {
            roots[1]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::DenseLuSolver;
    use approx::assert_relative_eq;

    fn state(n: usize) -> AnalysisState {
        let mut s = AnalysisState::new(n, Box::new(DenseLuSolver::new()));
        s.begin_step();
        s
    }

    #[test]
    fn test_strategy_from_config() {
        assert_eq!(strategy(&ControlConfig::default()).unwrap().name(), "load control");
        assert!(strategy(&ControlConfig::ArcLength {
            arc_length: -1.0,
            alpha: 0.0
        })
        .is_err());
        assert!(strategy(&ControlConfig::DisplacementControl {
            node: Tag(1),
            dof: 0,
            increment: 0.0
        })
        .is_err());
    }

    #[test]
    fn test_displacement_control_hits_target() {
        let mut control = DisplacementControl::new(Tag(2), 0, 0.01).unwrap();
        control.equation = Some(1);
        let mut s = state(2);

        // Iteration 1: du_bar is zero at equilibrium
        let du_bar = DVector::zeros(2);
        let du_hat = DVector::from_vec(vec![0.001, 0.004]);
        let dl = control.correction(1, &s, &du_bar, Some(&du_hat)).unwrap();
        assert_relative_eq!(dl, 2.5, epsilon = 1e-12);
        s.apply_correction(&du_bar + &du_hat * dl, dl).unwrap();
        assert_relative_eq!(s.increment()[1], 0.01, epsilon = 1e-15);

        // Iteration 2: residual solution overshoots, correction pulls back
        let du_bar = DVector::from_vec(vec![0.0, 0.002]);
        let dl = control.correction(2, &s, &du_bar, Some(&du_hat)).unwrap();
        assert_relative_eq!(dl, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_displacement_control_zero_stiffness_path() {
        let mut control = DisplacementControl::new(Tag(2), 0, 0.01).unwrap();
        control.equation = Some(0);
        let s = state(1);
        let err = control
            .correction(1, &s, &DVector::zeros(1), Some(&DVector::zeros(1)))
            .unwrap_err();
        assert!(matches!(err, Error::SingularSystem(_)));
    }

    #[test]
    fn test_arc_length_first_iteration() {
        let mut control = ArcLength::new(0.01, 0.0).unwrap();
        let s = state(1);
        // Linear spring k = 1000 under unit reference load
        let du_hat = DVector::from_vec(vec![0.001]);
        let dl = control
            .correction(1, &s, &DVector::zeros(1), Some(&du_hat))
            .unwrap();
        assert_relative_eq!(dl, 10.0, epsilon = 1e-9);

        // Previous step unloaded along the reference direction
        control.previous = Some((DVector::from_vec(vec![-0.01]), -10.0));
        let dl = control
            .correction(1, &s, &DVector::zeros(1), Some(&du_hat))
            .unwrap();
        assert_relative_eq!(dl, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_arc_length_picks_aligned_root() {
        let mut control = ArcLength::new(0.01, 0.0).unwrap();
        let mut s = state(1);
        let du_hat = DVector::from_vec(vec![0.001]);
        s.apply_correction(DVector::from_vec(vec![0.01]), 10.0).unwrap();

        // On the arc already: roots are 0 and -20; 0 keeps the direction
        let dl = control
            .correction(2, &s, &DVector::zeros(1), Some(&du_hat))
            .unwrap();
        assert_relative_eq!(dl, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_arc_length_no_real_root() {
        let mut control = ArcLength::new(0.01, 0.0).unwrap();
        let s = state(1);
        // Residual solution alone already lies far outside the arc, and the
        // reference direction is orthogonal to it
        let du_bar = DVector::from_vec(vec![1.0, 0.0]);
        let mut s2 = AnalysisState::new(2, Box::new(DenseLuSolver::new()));
        s2.begin_step();
        let err = control
            .correction(2, &s2, &du_bar, Some(&DVector::from_vec(vec![0.0, 1e-3])))
            .unwrap_err();
        assert!(matches!(err, Error::ControlEquation(_)));
        assert!(control
            .correction(1, &s, &DVector::zeros(1), None)
            .is_err());
    }
}
