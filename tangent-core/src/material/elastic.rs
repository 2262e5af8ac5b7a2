//! Linear elastic uniaxial material.

use crate::error::{Error, Result};
use crate::material::UniaxialMaterial;
use crate::object::{DomainObject, Identity, Lifecycle, Phase, StatefulObject};
use crate::types::Tag;

/// σ = E ε.
#[derive(Debug, Clone)]
pub struct Elastic {
    id: Identity,
    youngs_modulus: f64,
    lifecycle: Lifecycle,
    trial_strain: f64,
    committed_strain: f64,
}

impl Elastic {
    /// Create a linear elastic material.
    ///
    /// # Errors
    ///
    /// Returns error if the modulus is not strictly positive.
    pub fn new(tag: impl Into<Tag>, youngs_modulus: f64) -> Result<Self> {
        if !(youngs_modulus > 0.0) {
            return Err(Error::Configuration(
                "Young's modulus must be positive".into(),
            ));
        }
        Ok(Self {
            id: Identity::new(tag.into()),
            youngs_modulus,
            lifecycle: Lifecycle::new(),
            trial_strain: 0.0,
            committed_strain: 0.0,
        })
    }

    pub fn youngs_modulus(&self) -> f64 {
        self.youngs_modulus
    }
}

impl DomainObject for Elastic {
    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

impl StatefulObject<f64> for Elastic {
    fn update_trial(&mut self, strain: &f64) -> Result<()> {
        self.trial_strain = *strain;
        self.lifecycle.begin_trial();
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.lifecycle.commit(self.id.tag())?;
        self.committed_strain = self.trial_strain;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.trial_strain = self.committed_strain;
        self.lifecycle.reset();
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.trial_strain = 0.0;
        self.committed_strain = 0.0;
        self.lifecycle.clear();
        Ok(())
    }

    fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }
}

impl UniaxialMaterial for Elastic {
    fn strain(&self) -> f64 {
        self.trial_strain
    }

    fn stress(&self) -> f64 {
        self.youngs_modulus * self.trial_strain
    }

    fn tangent(&self) -> f64 {
        self.youngs_modulus
    }

    fn initial_tangent(&self) -> f64 {
        self.youngs_modulus
    }

    fn committed_stress(&self) -> f64 {
        self.youngs_modulus * self.committed_strain
    }

    fn committed_strain(&self) -> f64 {
        self.committed_strain
    }

    fn copy(&self) -> Box<dyn UniaxialMaterial> {
        Box::new(self.clone())
    }
}
