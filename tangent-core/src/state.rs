//! Global analysis state.
//!
//! [`AnalysisState`] owns the equation-space vectors of one analysis: the
//! committed and trial kinematics, the accumulated step increment, the load
//! factor, and the assembled operators together with the linear solver that
//! factors them. It is threaded by reference through the algorithm, the
//! integrator and the domain; nothing else holds global solution data.
//!
//! Trial quantities are never patched in place. After every correction the
//! trial vectors are recomputed as `current + increment` by
//! [`AnalysisState::renormalize`].

use crate::error::{Error, Result};
use crate::solver::LinearSolver;
use crate::sparse::CsrMatrix;
use nalgebra::DVector;

/// Committed and trial copies of one equation-space vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub current: DVector<f64>,
    pub trial: DVector<f64>,
}

impl Field {
    fn zeros(n: usize) -> Self {
        Self {
            current: DVector::zeros(n),
            trial: DVector::zeros(n),
        }
    }

    fn commit(&mut self) {
        self.current.copy_from(&self.trial);
    }

    fn revert(&mut self) {
        self.trial.copy_from(&self.current);
    }
}

#[derive(Debug)]
pub struct AnalysisState {
    displacement: Field,
    velocity: Field,
    acceleration: Field,
    resistance: Field,
    /// Accumulated displacement increment of the current step.
    increment: DVector<f64>,
    /// Last iterative correction.
    correction: DVector<f64>,
    residual: DVector<f64>,
    reference_load: DVector<f64>,
    load_factor: f64,
    trial_load_factor: f64,
    /// Accumulated load-factor increment of the current step.
    load_increment: f64,
    /// Increments of the last committed step.
    previous_step: Option<(DVector<f64>, f64)>,
    tangent: Option<CsrMatrix>,
    mass: Option<CsrMatrix>,
    damping: Option<CsrMatrix>,
    solver: Box<dyn LinearSolver>,
}

impl AnalysisState {
    /// Zero state for `n` equations.
    pub fn new(n: usize, solver: Box<dyn LinearSolver>) -> Self {
        Self {
            displacement: Field::zeros(n),
            velocity: Field::zeros(n),
            acceleration: Field::zeros(n),
            resistance: Field::zeros(n),
            increment: DVector::zeros(n),
            correction: DVector::zeros(n),
            residual: DVector::zeros(n),
            reference_load: DVector::zeros(n),
            load_factor: 0.0,
            trial_load_factor: 0.0,
            load_increment: 0.0,
            previous_step: None,
            tangent: None,
            mass: None,
            damping: None,
            solver,
        }
    }

    /// Rebuild the equation space after renumbering.
    ///
    /// `displacement` is the committed displacement in the new numbering.
    /// The load factor is kept; operators and step increments are dropped.
    pub fn renumber(&mut self, displacement: DVector<f64>) {
        let n = displacement.len();
        self.displacement = Field {
            current: displacement.clone(),
            trial: displacement,
        };
        self.velocity = Field::zeros(n);
        self.acceleration = Field::zeros(n);
        self.resistance = Field::zeros(n);
        self.increment = DVector::zeros(n);
        self.correction = DVector::zeros(n);
        self.residual = DVector::zeros(n);
        self.reference_load = DVector::zeros(n);
        self.previous_step = None;
        self.tangent = None;
        self.mass = None;
        self.damping = None;
    }

    /// Number of equations.
    pub fn size(&self) -> usize {
        self.displacement.current.len()
    }

    pub fn displacement(&self) -> &Field {
        &self.displacement
    }

    pub fn velocity(&self) -> &Field {
        &self.velocity
    }

    pub fn acceleration(&self) -> &Field {
        &self.acceleration
    }

    pub fn resistance(&self) -> &Field {
        &self.resistance
    }

    pub fn increment(&self) -> &DVector<f64> {
        &self.increment
    }

    pub fn correction(&self) -> &DVector<f64> {
        &self.correction
    }

    /// Out-of-balance force `λ P - F_int` at the trial state.
    pub fn residual(&self) -> &DVector<f64> {
        &self.residual
    }

    pub fn reference_load(&self) -> &DVector<f64> {
        &self.reference_load
    }

    /// Committed load factor.
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    pub fn trial_load_factor(&self) -> f64 {
        self.trial_load_factor
    }

    /// Load-factor increment accumulated in the current step.
    pub fn load_increment(&self) -> f64 {
        self.load_increment
    }

    /// Displacement and load-factor increments of the last committed step.
    pub fn previous_step(&self) -> Option<(&DVector<f64>, f64)> {
        self.previous_step.as_ref().map(|(du, dl)| (du, *dl))
    }

    pub fn tangent(&self) -> Option<&CsrMatrix> {
        self.tangent.as_ref()
    }

    pub fn mass(&self) -> Option<&CsrMatrix> {
        self.mass.as_ref()
    }

    pub fn damping(&self) -> Option<&CsrMatrix> {
        self.damping.as_ref()
    }

    pub fn solver(&self) -> &dyn LinearSolver {
        self.solver.as_ref()
    }

    pub fn set_reference_load(&mut self, load: DVector<f64>) -> Result<()> {
        self.check_len("reference load", load.len())?;
        self.reference_load = load;
        Ok(())
    }

    pub fn set_tangent(&mut self, tangent: CsrMatrix) {
        self.tangent = Some(tangent);
    }

    pub fn set_mass(&mut self, mass: Option<CsrMatrix>) {
        self.mass = mass;
    }

    /// Store the trial resistance and recompute the residual from it.
    pub fn set_trial_resistance(&mut self, resistance: DVector<f64>) -> Result<()> {
        self.check_len("resistance", resistance.len())?;
        self.residual = &self.reference_load * self.trial_load_factor - &resistance;
        self.resistance.trial = resistance;
        Ok(())
    }

    /// Form the Rayleigh damping operator `C = αM + βK` from the assembled
    /// mass and tangent.
    pub fn rayleigh_damping(&mut self, alpha: f64, beta: f64) -> Result<()> {
        let (Some(mass), Some(tangent)) = (&self.mass, &self.tangent) else {
            return Err(Error::Configuration(
                "Rayleigh damping needs assembled mass and tangent".into(),
            ));
        };
        self.damping = Some(mass * alpha + tangent * beta);
        Ok(())
    }

    /// Solve `K x = rhs` against the assembled tangent. No trial vector is
    /// touched.
    pub fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>> {
        let tangent = self.require_tangent()?;
        let x = self.solver.solve(tangent, rhs.as_slice())?;
        Ok(DVector::from_vec(x))
    }

    /// Solve for several right-hand sides against one factorization.
    pub fn solve_many(&self, rhs: &[&DVector<f64>]) -> Result<Vec<DVector<f64>>> {
        let tangent = self.require_tangent()?;
        let columns: Vec<Vec<f64>> = rhs.iter().map(|b| b.as_slice().to_vec()).collect();
        Ok(self
            .solver
            .solve_many(tangent, &columns)?
            .into_iter()
            .map(DVector::from_vec)
            .collect())
    }

    /// Start a step from the committed state.
    pub fn begin_step(&mut self) {
        self.increment.fill(0.0);
        self.correction.fill(0.0);
        self.load_increment = 0.0;
        self.renormalize();
    }

    /// Add a correction to the step increment and renormalize.
    pub fn apply_correction(&mut self, du: DVector<f64>, dlambda: f64) -> Result<()> {
        self.check_len("correction", du.len())?;
        self.increment += &du;
        self.correction = du;
        self.load_increment += dlambda;
        self.renormalize();
        Ok(())
    }

    /// Add to the load-factor increment without a displacement correction.
    pub fn increment_load_factor(&mut self, dlambda: f64) {
        self.load_increment += dlambda;
        self.renormalize();
    }

    /// Recompute trial quantities from committed values plus the step
    /// increment.
    pub fn renormalize(&mut self) {
        self.displacement.trial = &self.displacement.current + &self.increment;
        self.trial_load_factor = self.load_factor + self.load_increment;
    }

    /// Promote trial quantities to committed.
    pub fn commit(&mut self) {
        self.displacement.commit();
        self.velocity.commit();
        self.acceleration.commit();
        self.resistance.commit();
        self.load_factor = self.trial_load_factor;
        self.previous_step = Some((self.increment.clone(), self.load_increment));
        self.increment.fill(0.0);
        self.load_increment = 0.0;
    }

    /// Discard trial quantities.
    pub fn revert_to_last_commit(&mut self) {
        self.displacement.revert();
        self.velocity.revert();
        self.acceleration.revert();
        self.resistance.revert();
        self.trial_load_factor = self.load_factor;
        self.increment.fill(0.0);
        self.correction.fill(0.0);
        self.load_increment = 0.0;
    }

    fn require_tangent(&self) -> Result<&CsrMatrix> {
        self.tangent
            .as_ref()
            .ok_or_else(|| Error::Solver("tangent has not been assembled".into()))
    }

    fn check_len(&self, what: &str, len: usize) -> Result<()> {
        if len != self.size() {
            return Err(Error::Configuration(format!(
                "{} has {} entries, expected {}",
                what,
                len,
                self.size()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::DenseLuSolver;
    use crate::sparse::TripletMatrix;
    use approx::assert_relative_eq;

    fn state() -> AnalysisState {
        let mut s = AnalysisState::new(2, Box::new(DenseLuSolver::new()));
        let mut k = TripletMatrix::new(2, 2);
        k.add(0, 0, 2.0);
        k.add(1, 1, 4.0);
        s.set_tangent(k.to_csr().unwrap());
        s
    }

    #[test]
    fn test_increment_renormalizes_trial() {
        let mut s = state();
        s.begin_step();
        s.apply_correction(DVector::from_vec(vec![1.0, 2.0]), 0.5).unwrap();
        s.apply_correction(DVector::from_vec(vec![0.5, -1.0]), 0.25).unwrap();

        assert_eq!(s.displacement().trial.as_slice(), &[1.5, 1.0]);
        assert_eq!(s.displacement().current.as_slice(), &[0.0, 0.0]);
        assert_eq!(s.correction().as_slice(), &[0.5, -1.0]);
        assert_relative_eq!(s.trial_load_factor(), 0.75);
        assert_eq!(s.load_factor(), 0.0);
    }

    #[test]
    fn test_commit_and_revert() {
        let mut s = state();
        s.begin_step();
        s.apply_correction(DVector::from_vec(vec![1.0, 1.0]), 1.0).unwrap();
        s.commit();
        assert_eq!(s.displacement().current.as_slice(), &[1.0, 1.0]);
        assert_eq!(s.load_factor(), 1.0);
        let (du, dl) = s.previous_step().unwrap();
        assert_eq!(du.as_slice(), &[1.0, 1.0]);
        assert_eq!(dl, 1.0);

        s.begin_step();
        s.apply_correction(DVector::from_vec(vec![5.0, 5.0]), 2.0).unwrap();
        s.revert_to_last_commit();
        assert_eq!(s.displacement().trial.as_slice(), &[1.0, 1.0]);
        assert_eq!(s.trial_load_factor(), 1.0);
        assert_eq!(s.increment().as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_solve_does_not_touch_trial() {
        let mut s = state();
        s.begin_step();
        let x = s.solve(&DVector::from_vec(vec![2.0, 2.0])).unwrap();
        assert_relative_eq!(x[0], 1.0);
        assert_relative_eq!(x[1], 0.5);
        assert_eq!(s.displacement().trial.as_slice(), &[0.0, 0.0]);

        let p = DVector::from_vec(vec![4.0, 0.0]);
        let r = DVector::from_vec(vec![0.0, 4.0]);
        let many = s.solve_many(&[&r, &p]).unwrap();
        assert_relative_eq!(many[0][1], 1.0);
        assert_relative_eq!(many[1][0], 2.0);
    }

    #[test]
    fn test_singular_solve_reports_error() {
        let mut s = AnalysisState::new(1, Box::new(DenseLuSolver::new()));
        assert!(matches!(
            s.solve(&DVector::from_vec(vec![1.0])),
            Err(Error::Solver(_))
        ));
        let mut k = TripletMatrix::new(1, 1);
        k.add(0, 0, 0.0);
        s.set_tangent(k.to_csr().unwrap());
        assert!(matches!(
            s.solve(&DVector::from_vec(vec![1.0])),
            Err(Error::SingularSystem(_))
        ));
        assert_eq!(s.displacement().trial[0], 0.0);
    }

    #[test]
    fn test_residual_and_damping() {
        let mut s = state();
        s.set_reference_load(DVector::from_vec(vec![10.0, 0.0])).unwrap();
        s.increment_load_factor(0.5);
        s.set_trial_resistance(DVector::from_vec(vec![3.0, 1.0])).unwrap();
        assert_eq!(s.residual().as_slice(), &[2.0, -1.0]);

        assert!(s.rayleigh_damping(0.1, 0.01).is_err());
        let mut m = TripletMatrix::new(2, 2);
        m.add(0, 0, 1.0);
        m.add(1, 1, 1.0);
        s.set_mass(Some(m.to_csr().unwrap()));
        s.rayleigh_damping(0.1, 0.01).unwrap();
        let c = nalgebra::DMatrix::from(s.damping().unwrap());
        assert_relative_eq!(c[(0, 0)], 0.12, epsilon = 1e-14);
        assert_relative_eq!(c[(1, 1)], 0.14, epsilon = 1e-14);
    }
}
