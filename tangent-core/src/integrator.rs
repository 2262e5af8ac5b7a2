//! Parallel assembly and the static integrator.
//!
//! Element contributions are computed in parallel with Rayon, one
//! contribution per active element, and then scattered serially into the
//! global triplet builder (or residual vector) in ascending element tag
//! order, so the assembled operator does not depend on thread scheduling.
//!
//! [`StaticIntegrator`] combines assembly with a [`ControlStrategy`]: it
//! sets up each step and turns one linear solve into a trial update.

use crate::control::ControlStrategy;
use crate::domain::Domain;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::numberer::Dof;
use crate::object::DomainObject;
use crate::sparse::{CsrMatrix, TripletMatrix};
use crate::state::AnalysisState;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

fn active_elements(domain: &Domain) -> Vec<&dyn Element> {
    domain
        .elements()
        .iter_active()
        .map(|e| e.as_ref())
        .collect()
}

/// Compute one dense matrix per active element in parallel and scatter them.
fn assemble_matrix<F>(domain: &Domain, element_matrix: F) -> Result<Option<CsrMatrix>>
where
    F: Fn(&dyn Element) -> Option<DMatrix<f64>> + Sync,
{
    let n = domain.n_equations();
    let map = domain.dof_map();

    let contributions: Vec<(Vec<Option<usize>>, Option<DMatrix<f64>>)> = active_elements(domain)
        .par_iter()
        .map(|e| -> Result<_> { Ok((map.equations(e.nodes())?, element_matrix(*e))) })
        .collect::<Result<_>>()?;

    if contributions.iter().all(|(_, m)| m.is_none()) {
        return Ok(None);
    }

    // ~ (2 nodes x 3 DOFs)² per element, plus the diagonal
    let nnz_estimate = contributions.len() * 36 + n;
    let mut triplet = TripletMatrix::with_capacity(n, n, nnz_estimate);
    // Keep every diagonal in the pattern so a DOF with no stiffness shows
    // up as a zero pivot
    for i in 0..n {
        triplet.add(i, i, 0.0);
    }
    for (equations, matrix) in &contributions {
        if let Some(matrix) = matrix {
            triplet.add_submatrix(equations, matrix);
        }
    }
    triplet.to_csr().map(Some)
}

/// Assemble the global tangent stiffness at the trial state.
pub fn assemble_tangent(domain: &Domain) -> Result<CsrMatrix> {
    assemble_matrix(domain, |e| Some(e.tangent()))?
        .ok_or_else(|| Error::Configuration("model has no elements".into()))
}

/// Assemble the global mass matrix, `None` if no element carries mass.
pub fn assemble_mass(domain: &Domain) -> Result<Option<CsrMatrix>> {
    assemble_matrix(domain, |e| e.mass())
}

/// Assemble the internal resisting force at the trial state.
pub fn assemble_resistance(domain: &Domain) -> Result<DVector<f64>> {
    let map = domain.dof_map();
    let contributions: Vec<(Vec<Option<usize>>, DVector<f64>)> = active_elements(domain)
        .par_iter()
        .map(|e| -> Result<_> { Ok((map.equations(e.nodes())?, e.resistance())) })
        .collect::<Result<_>>()?;

    let mut resistance = DVector::zeros(domain.n_equations());
    for (equations, r) in &contributions {
        for (eq, value) in equations.iter().zip(r.iter()) {
            if let Some(eq) = eq {
                resistance[*eq] += value;
            }
        }
    }
    Ok(resistance)
}

/// Assemble the reference load pattern from the active nodal loads.
///
/// Components acting on constrained DOFs are taken by the support.
pub fn reference_load(domain: &Domain) -> Result<DVector<f64>> {
    let map = domain.dof_map();
    let mut load = DVector::zeros(domain.n_equations());
    for nodal in domain.loads().iter_active() {
        let dofs = map.node(nodal.node())?;
        if nodal.values().len() != dofs.len() {
            return Err(Error::Configuration(format!(
                "load {} has {} components but node {} has {} DOFs",
                nodal.tag(),
                nodal.values().len(),
                nodal.node(),
                dofs.len()
            )));
        }
        for (dof, value) in dofs.iter().zip(nodal.values()) {
            if let Dof::Free(eq) = dof {
                load[*eq] += value;
            }
        }
    }
    Ok(load)
}

/// Static integrator: steps the load factor through a control strategy.
#[derive(Debug)]
pub struct StaticIntegrator {
    control: Box<dyn ControlStrategy>,
}

impl StaticIntegrator {
    pub fn new(control: Box<dyn ControlStrategy>) -> Self {
        Self { control }
    }

    pub fn control(&self) -> &dyn ControlStrategy {
        self.control.as_ref()
    }

    /// Set up a step: apply constraint values, form the reference load, add
    /// the load-factor predictor, push the predictor state to the domain and
    /// assemble the residual and tangent.
    pub fn new_step(&mut self, domain: &mut Domain, state: &mut AnalysisState) -> Result<()> {
        domain.apply_constraints()?;
        state.begin_step();
        state.set_reference_load(reference_load(domain)?)?;

        let predictor = self.control.new_step(domain, state)?;
        state.increment_load_factor(predictor);

        domain.update_trial(&state.displacement().trial)?;
        self.form_unbalance(domain, state)?;
        self.form_tangent(domain, state)
    }

    pub fn form_tangent(&self, domain: &Domain, state: &mut AnalysisState) -> Result<()> {
        state.set_tangent(assemble_tangent(domain)?);
        Ok(())
    }

    pub fn form_unbalance(&self, domain: &Domain, state: &mut AnalysisState) -> Result<()> {
        state.set_trial_resistance(assemble_resistance(domain)?)
    }

    /// One corrective iteration: solve, apply the control equation, update
    /// the trial state and reassemble the residual.
    pub fn update(
        &mut self,
        iteration: usize,
        domain: &mut Domain,
        state: &mut AnalysisState,
    ) -> Result<()> {
        let (du_bar, du_hat) = if self.control.is_constrained() {
            let mut solutions = state.solve_many(&[state.residual(), state.reference_load()])?;
            let du_hat = solutions.pop();
            let du_bar = solutions
                .pop()
                .ok_or_else(|| Error::Solver("missing residual solution".into()))?;
            (du_bar, du_hat)
        } else {
            (state.solve(state.residual())?, None)
        };

        let dlambda = self
            .control
            .correction(iteration, state, &du_bar, du_hat.as_ref())?;
        let du = match du_hat {
            Some(du_hat) => du_bar + du_hat * dlambda,
            None => du_bar,
        };

        state.apply_correction(du, dlambda)?;
        domain.update_trial(&state.displacement().trial)?;
        self.form_unbalance(domain, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Truss;
    use crate::load::{Constraint, NodalLoad};
    use crate::material::Elastic;
    use crate::node::Node;
    use crate::numberer::NumbererKind;
    use crate::types::Tag;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    /// Three collinear nodes, two bars, left end fixed.
    fn bar_chain() -> Domain {
        let mut domain = Domain::new();
        for (tag, x) in [(1, 0.0), (2, 1.0), (3, 2.0)] {
            domain
                .add_node(Node::new(tag, Vector3::new(x, 0.0, 0.0), 1).unwrap())
                .unwrap();
        }
        let steel = Elastic::new(1, 100.0).unwrap();
        domain
            .add_element(Truss::new(1, [Tag(1), Tag(2)], &steel, 1.0).unwrap())
            .unwrap();
        domain
            .add_element(Truss::new(2, [Tag(2), Tag(3)], &steel, 2.0).unwrap())
            .unwrap();
        domain.add_constraint(Constraint::fixed(1, Tag(1), 0)).unwrap();
        domain.add_load(NodalLoad::new(1, Tag(3), vec![10.0])).unwrap();
        domain.number_dofs(NumbererKind::Plain).unwrap();
        domain
    }

    #[test]
    fn test_tangent_assembly() {
        let domain = bar_chain();
        let k = DMatrix::from(&assemble_tangent(&domain).unwrap());
        assert_eq!(k.shape(), (2, 2));
        assert_relative_eq!(k[(0, 0)], 300.0, epsilon = 1e-12);
        assert_relative_eq!(k[(0, 1)], -200.0, epsilon = 1e-12);
        assert_relative_eq!(k[(1, 1)], 200.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reference_load_and_resistance() {
        let mut domain = bar_chain();
        let p = reference_load(&domain).unwrap();
        assert_eq!(p.as_slice(), &[0.0, 10.0]);

        domain.update_trial(&DVector::from_vec(vec![0.1, 0.15])).unwrap();
        let r = assemble_resistance(&domain).unwrap();
        // Bar 1 force 10, bar 2 force 10
        assert_relative_eq!(r[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(r[1], 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_disabled_element_not_assembled() {
        let mut domain = bar_chain();
        domain.disable(crate::types::ObjectKind::Element, Tag(2));
        domain.add_constraint(Constraint::fixed(2, Tag(3), 0)).unwrap();
        domain.number_dofs(NumbererKind::Plain).unwrap();
        let k = DMatrix::from(&assemble_tangent(&domain).unwrap());
        assert_eq!(k.shape(), (1, 1));
        assert_relative_eq!(k[(0, 0)], 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_load_on_wrong_dof_count() {
        let mut domain = bar_chain();
        domain.add_load(NodalLoad::new(2, Tag(2), vec![1.0, 0.0])).unwrap();
        domain.update();
        assert!(matches!(reference_load(&domain), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_no_mass_without_density() {
        let domain = bar_chain();
        assert!(assemble_mass(&domain).unwrap().is_none());
    }
}
