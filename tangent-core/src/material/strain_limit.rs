//! Strain-limited wrapper material.
//!
//! Delegates to an inner material while the trial strain stays inside
//! `[min_strain, max_strain]`; outside that range the trial update is
//! rejected with a constitutive failure so the iteration is abandoned.

use crate::error::{Error, Result};
use crate::material::UniaxialMaterial;
use crate::object::{DomainObject, Identity, Lifecycle, Phase, StatefulObject};
use crate::types::Tag;

#[derive(Debug)]
pub struct StrainLimit {
    id: Identity,
    inner: Box<dyn UniaxialMaterial>,
    min_strain: f64,
    max_strain: f64,
    lifecycle: Lifecycle,
}

impl StrainLimit {
    /// Wrap `inner` (copied) with strain bounds.
    pub fn new(
        tag: impl Into<Tag>,
        inner: &dyn UniaxialMaterial,
        min_strain: f64,
        max_strain: f64,
    ) -> Result<Self> {
        if !(min_strain < max_strain) {
            return Err(Error::Configuration(format!(
                "strain limits must satisfy min < max, got [{}, {}]",
                min_strain, max_strain
            )));
        }
        Ok(Self {
            id: Identity::new(tag.into()),
            inner: inner.copy(),
            min_strain,
            max_strain,
            lifecycle: Lifecycle::new(),
        })
    }
}

impl DomainObject for StrainLimit {
    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

impl StatefulObject<f64> for StrainLimit {
    fn update_trial(&mut self, strain: &f64) -> Result<()> {
        if *strain < self.min_strain || *strain > self.max_strain {
            return Err(Error::constitutive(
                self.id.tag(),
                format!(
                    "trial strain {:e} outside [{:e}, {:e}]",
                    strain, self.min_strain, self.max_strain
                ),
            ));
        }
        self.inner.update_trial(strain)?;
        self.lifecycle.begin_trial();
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.lifecycle.commit(self.id.tag())?;
        self.inner.commit()
    }

    fn reset(&mut self) -> Result<()> {
        self.lifecycle.reset();
        self.inner.reset()
    }

    fn clear(&mut self) -> Result<()> {
        self.lifecycle.clear();
        self.inner.clear()
    }

    fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }
}

impl UniaxialMaterial for StrainLimit {
    fn strain(&self) -> f64 {
        self.inner.strain()
    }

    fn stress(&self) -> f64 {
        self.inner.stress()
    }

    fn tangent(&self) -> f64 {
        self.inner.tangent()
    }

    fn initial_tangent(&self) -> f64 {
        self.inner.initial_tangent()
    }

    fn committed_stress(&self) -> f64 {
        self.inner.committed_stress()
    }

    fn committed_strain(&self) -> f64 {
        self.inner.committed_strain()
    }

    fn copy(&self) -> Box<dyn UniaxialMaterial> {
        Box::new(Self {
            id: self.id,
            inner: self.inner.copy(),
            min_strain: self.min_strain,
            max_strain: self.max_strain,
            lifecycle: self.lifecycle,
        })
    }
}
