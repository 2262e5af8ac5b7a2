//! Rate-independent uniaxial plasticity with linear isotropic and kinematic
//! hardening.
//!
//! The trial state is obtained by an elastic predictor followed by a closed
//! form return mapping, always starting from the committed plastic strain,
//! back stress and hardening variable:
//!
//! ```text
//! σ_tr = E (ε - εp_n)          ξ_tr = σ_tr - q_n
//! f_tr = |ξ_tr| - (σy + H_iso α_n)
//! Δγ   = f_tr / (E + H_iso + H_kin)      if f_tr > 0
//! ```

use crate::error::{Error, Result};
use crate::material::UniaxialMaterial;
use crate::object::{DomainObject, Identity, Lifecycle, Phase, StatefulObject};
use crate::types::Tag;

/// History variables of the hardening model.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct HardeningState {
    strain: f64,
    stress: f64,
    tangent: f64,
    plastic_strain: f64,
    /// Accumulated plastic strain (isotropic hardening variable).
    alpha: f64,
    /// Back stress (kinematic hardening).
    back_stress: f64,
}

/// Bilinear elasto-plastic material.
#[derive(Debug, Clone)]
pub struct Hardening {
    id: Identity,
    youngs_modulus: f64,
    yield_stress: f64,
    isotropic_modulus: f64,
    kinematic_modulus: f64,
    lifecycle: Lifecycle,
    trial: HardeningState,
    committed: HardeningState,
}

impl Hardening {
    /// Create a hardening material.
    ///
    /// # Arguments
    ///
    /// * `youngs_modulus` - Elastic modulus E
    /// * `yield_stress` - Initial yield stress σy
    /// * `isotropic_modulus` - Isotropic hardening modulus H_iso
    /// * `kinematic_modulus` - Kinematic hardening modulus H_kin
    ///
    /// # Errors
    ///
    /// Returns error if E or σy is not positive, or a hardening modulus is
    /// negative.
    pub fn new(
        tag: impl Into<Tag>,
        youngs_modulus: f64,
        yield_stress: f64,
        isotropic_modulus: f64,
        kinematic_modulus: f64,
    ) -> Result<Self> {
        if !(youngs_modulus > 0.0) {
            return Err(Error::Configuration(
                "Young's modulus must be positive".into(),
            ));
        }
        if !(yield_stress > 0.0) {
            return Err(Error::Configuration("yield stress must be positive".into()));
        }
        if isotropic_modulus < 0.0 || kinematic_modulus < 0.0 {
            return Err(Error::Configuration(
                "hardening moduli must be non-negative".into(),
            ));
        }
        let initial = HardeningState {
            tangent: youngs_modulus,
            ..Default::default()
        };
        Ok(Self {
            id: Identity::new(tag.into()),
            youngs_modulus,
            yield_stress,
            isotropic_modulus,
            kinematic_modulus,
            lifecycle: Lifecycle::new(),
            trial: initial,
            committed: initial,
        })
    }

    /// Elastic-perfectly-plastic material (no hardening).
    pub fn perfectly_plastic(tag: impl Into<Tag>, youngs_modulus: f64, yield_stress: f64) -> Result<Self> {
        Self::new(tag, youngs_modulus, yield_stress, 0.0, 0.0)
    }

    /// Committed plastic strain.
    pub fn plastic_strain(&self) -> f64 {
        self.committed.plastic_strain
    }

    fn return_map(&self, strain: f64) -> HardeningState {
        let e = self.youngs_modulus;
        let h_iso = self.isotropic_modulus;
        let h_kin = self.kinematic_modulus;
        let last = &self.committed;

        let trial_stress = e * (strain - last.plastic_strain);
        let xi = trial_stress - last.back_stress;
        let yield_fn = xi.abs() - (self.yield_stress + h_iso * last.alpha);

        if yield_fn <= 0.0 {
            return HardeningState {
                strain,
                stress: trial_stress,
                tangent: e,
                ..*last
            };
        }

        let sign = xi.signum();
        let dgamma = yield_fn / (e + h_iso + h_kin);
        HardeningState {
            strain,
            stress: trial_stress - dgamma * e * sign,
            tangent: e * (h_iso + h_kin) / (e + h_iso + h_kin),
            plastic_strain: last.plastic_strain + dgamma * sign,
            alpha: last.alpha + dgamma,
            back_stress: last.back_stress + dgamma * h_kin * sign,
        }
    }
}

impl DomainObject for Hardening {
    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

impl StatefulObject<f64> for Hardening {
    fn update_trial(&mut self, strain: &f64) -> Result<()> {
        if !strain.is_finite() {
            return Err(Error::constitutive(self.id.tag(), "non-finite trial strain"));
        }
        self.trial = self.return_map(*strain);
        self.lifecycle.begin_trial();
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.lifecycle.commit(self.id.tag())?;
        self.committed = self.trial;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.trial = self.committed;
        self.lifecycle.reset();
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let initial = HardeningState {
            tangent: self.youngs_modulus,
            ..Default::default()
        };
        self.trial = initial;
        self.committed = initial;
        self.lifecycle.clear();
        Ok(())
    }

    fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }
}

impl UniaxialMaterial for Hardening {
    fn strain(&self) -> f64 {
        self.trial.strain
    }

    fn stress(&self) -> f64 {
        self.trial.stress
    }

    fn tangent(&self) -> f64 {
        self.trial.tangent
    }

    fn initial_tangent(&self) -> f64 {
        self.youngs_modulus
    }

    fn committed_stress(&self) -> f64 {
        self.committed.stress
    }

    fn committed_strain(&self) -> f64 {
        self.committed.strain
    }

    fn copy(&self) -> Box<dyn UniaxialMaterial> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_invalid_parameters() {
        assert!(Hardening::new(1, 0.0, 250.0, 0.0, 0.0).is_err());
        assert!(Hardening::new(1, 2e5, 0.0, 0.0, 0.0).is_err());
        assert!(Hardening::new(1, 2e5, 250.0, -1.0, 0.0).is_err());
    }

    #[test]
    fn test_elastic_range() {
        let mut mat = Hardening::new(1, 2e5, 250.0, 1000.0, 0.0).unwrap();
        mat.update_trial(&1e-3).unwrap();
        assert_relative_eq!(mat.stress(), 200.0, epsilon = 1e-10);
        assert_relative_eq!(mat.tangent(), 2e5);
    }

    #[test]
    fn test_perfectly_plastic_caps_stress() {
        let mut mat = Hardening::perfectly_plastic(1, 2e5, 250.0).unwrap();
        mat.update_trial(&5e-3).unwrap();
        assert_relative_eq!(mat.stress(), 250.0, epsilon = 1e-10);
        assert_relative_eq!(mat.tangent(), 0.0);
        mat.commit().unwrap();
        assert_relative_eq!(mat.plastic_strain(), 5e-3 - 250.0 / 2e5, epsilon = 1e-14);

        // Elastic unloading from the committed plastic state
        mat.update_trial(&4e-3).unwrap();
        assert_relative_eq!(mat.stress(), 250.0 - 2e5 * 1e-3, epsilon = 1e-9);
    }

    #[test]
    fn test_isotropic_hardening_tangent() {
        let e = 2e5;
        let h = 2e4;
        let mut mat = Hardening::new(1, e, 250.0, h, 0.0).unwrap();
        mat.update_trial(&0.01).unwrap();
        let et = e * h / (e + h);
        assert_relative_eq!(mat.tangent(), et, epsilon = 1e-8);
        // σ = σy + Et (ε - εy)
        assert_relative_eq!(mat.stress(), 250.0 + et * (0.01 - 250.0 / e), epsilon = 1e-8);
    }

    #[test]
    fn test_trial_recomputed_from_committed() {
        // Two different trials from the same committed state must not
        // accumulate plastic flow.
        let mut mat = Hardening::new(1, 2e5, 250.0, 0.0, 1e4).unwrap();
        mat.update_trial(&0.01).unwrap();
        let first = mat.stress();
        mat.update_trial(&0.02).unwrap();
        mat.update_trial(&0.01).unwrap();
        assert_relative_eq!(mat.stress(), first, epsilon = 1e-12);
        assert_eq!(mat.plastic_strain(), 0.0);
    }

    #[test]
    fn test_kinematic_reverse_yield() {
        let e = 2e5;
        let hk = 1e4;
        let mut mat = Hardening::new(1, e, 250.0, 0.0, hk).unwrap();
        mat.update_trial(&0.01).unwrap();
        mat.commit().unwrap();
        let peak = mat.committed_stress();

        // Reverse loading: yields when stress drops by 2σy (Bauschinger)
        let reverse_elastic = peak - 2.0 * 250.0;
        mat.update_trial(&(0.01 - 2.0 * 250.0 / e + 1e-6)).unwrap();
        assert_relative_eq!(mat.tangent(), e);
        mat.update_trial(&(0.01 - 2.0 * 250.0 / e - 1e-3)).unwrap();
        assert!(mat.stress() < reverse_elastic);
        assert_relative_eq!(mat.tangent(), e * hk / (e + hk), epsilon = 1e-8);
    }

    #[test]
    fn test_non_finite_strain_fails() {
        let mut mat = Hardening::perfectly_plastic(3, 2e5, 250.0).unwrap();
        let err = mat.update_trial(&f64::NAN).unwrap_err();
        assert!(matches!(err, Error::ConstitutiveFailure { tag: Tag(3), .. }));
    }
}
