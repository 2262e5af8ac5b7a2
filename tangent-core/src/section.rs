//! Cross-section models.
//!
//! A section maps a section deformation to a stress resultant. The only
//! model shipped is the axial [`FiberSection`], a composite of uniaxial
//! fibers that are all driven by the same axial strain.

use crate::error::{Error, Result};
use crate::material::UniaxialMaterial;
use crate::object::{combine, DomainObject, Identity, Lifecycle, Phase, StatefulObject};
use crate::types::Tag;
use std::fmt::Debug;

/// Axial section response.
pub trait Section: DomainObject + StatefulObject<f64> + Debug + Send + Sync {
    /// Trial section deformation (axial strain).
    fn deformation(&self) -> f64;

    /// Trial stress resultant (axial force).
    fn resultant(&self) -> f64;

    /// Trial section stiffness (EA).
    fn stiffness(&self) -> f64;

    /// Resultant at the last commit.
    fn committed_resultant(&self) -> f64;

    /// Deformation at the last commit.
    fn committed_deformation(&self) -> f64;

    /// Independent copy, including committed history of every sub-object.
    fn copy(&self) -> Box<dyn Section>;
}

/// A material patch with a tributary area.
#[derive(Debug)]
pub struct Fiber {
    material: Box<dyn UniaxialMaterial>,
    area: f64,
}

impl Fiber {
    /// Create a fiber holding its own copy of `material`.
    pub fn new(material: &dyn UniaxialMaterial, area: f64) -> Result<Self> {
        if !(area > 0.0) {
            return Err(Error::Configuration("fiber area must be positive".into()));
        }
        Ok(Self {
            material: material.copy(),
            area,
        })
    }

    pub fn material(&self) -> &dyn UniaxialMaterial {
        self.material.as_ref()
    }

    pub fn area(&self) -> f64 {
        self.area
    }
}

/// Composite axial section; every fiber sees the section strain.
#[derive(Debug)]
pub struct FiberSection {
    id: Identity,
    fibers: Vec<Fiber>,
    lifecycle: Lifecycle,
}

impl FiberSection {
    /// # Errors
    ///
    /// Returns error if no fibers are given.
    pub fn new(tag: impl Into<Tag>, fibers: Vec<Fiber>) -> Result<Self> {
        let tag = tag.into();
        if fibers.is_empty() {
            return Err(Error::Configuration(format!(
                "fiber section {} needs at least one fiber",
                tag
            )));
        }
        Ok(Self {
            id: Identity::new(tag),
            fibers,
            lifecycle: Lifecycle::new(),
        })
    }

    pub fn fibers(&self) -> &[Fiber] {
        &self.fibers
    }

    /// Total fiber area.
    pub fn area(&self) -> f64 {
        self.fibers.iter().map(|f| f.area).sum()
    }
}

impl DomainObject for FiberSection {
    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

impl StatefulObject<f64> for FiberSection {
    fn update_trial(&mut self, strain: &f64) -> Result<()> {
        combine(
            self.fibers
                .iter_mut()
                .map(|f| f.material.update_trial(strain)),
        )?;
        self.lifecycle.begin_trial();
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.lifecycle.commit(self.id.tag())?;
        combine(self.fibers.iter_mut().map(|f| f.material.commit()))
    }

    fn reset(&mut self) -> Result<()> {
        self.lifecycle.reset();
        combine(self.fibers.iter_mut().map(|f| f.material.reset()))
    }

    fn clear(&mut self) -> Result<()> {
        self.lifecycle.clear();
        combine(self.fibers.iter_mut().map(|f| f.material.clear()))
    }

    fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }
}

impl Section for FiberSection {
    fn deformation(&self) -> f64 {
        // All fibers share the section strain
        self.fibers[0].material.strain()
    }

    fn resultant(&self) -> f64 {
        self.fibers
            .iter()
            .map(|f| f.material.stress() * f.area)
            .sum()
    }

    fn stiffness(&self) -> f64 {
        self.fibers
            .iter()
            .map(|f| f.material.tangent() * f.area)
            .sum()
    }

    fn committed_resultant(&self) -> f64 {
        self.fibers
            .iter()
            .map(|f| f.material.committed_stress() * f.area)
            .sum()
    }

    fn committed_deformation(&self) -> f64 {
        self.fibers[0].material.committed_strain()
    }

    fn copy(&self) -> Box<dyn Section> {
        Box::new(Self {
            id: self.id,
            fibers: self
                .fibers
                .iter()
                .map(|f| Fiber {
                    material: f.material.copy(),
                    area: f.area,
                })
                .collect(),
            lifecycle: self.lifecycle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Elastic, Hardening, StrainLimit};
    use approx::assert_relative_eq;

    fn steel_concrete() -> FiberSection {
        let steel = Hardening::perfectly_plastic(1, 2e5, 400.0).unwrap();
        let concrete = Elastic::new(2, 3e4).unwrap();
        FiberSection::new(
            10,
            vec![
                Fiber::new(&steel, 0.01).unwrap(),
                Fiber::new(&concrete, 0.09).unwrap(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_section_rejected() {
        assert!(FiberSection::new(1, vec![]).is_err());
        let elastic = Elastic::new(1, 1.0).unwrap();
        assert!(Fiber::new(&elastic, 0.0).is_err());
    }

    #[test]
    fn test_resultant_and_stiffness() {
        let mut section = steel_concrete();
        assert_relative_eq!(section.area(), 0.1);
        section.update_trial(&1e-3).unwrap();
        assert_relative_eq!(section.resultant(), 2e5 * 1e-3 * 0.01 + 3e4 * 1e-3 * 0.09, epsilon = 1e-10);
        assert_relative_eq!(section.stiffness(), 2e5 * 0.01 + 3e4 * 0.09, epsilon = 1e-8);
        assert_relative_eq!(section.deformation(), 1e-3);

        // Steel yields at 2e-3
        section.update_trial(&4e-3).unwrap();
        assert_relative_eq!(section.stiffness(), 3e4 * 0.09, epsilon = 1e-8);
    }

    #[test]
    fn test_commit_round_trip() {
        let mut section = steel_concrete();
        section.update_trial(&3e-3).unwrap();
        let trial = section.resultant();
        section.commit().unwrap();
        assert_eq!(section.committed_resultant(), trial);
        assert_eq!(section.committed_deformation(), 3e-3);
        assert_eq!(section.phase(), Phase::Committed);
    }

    #[test]
    fn test_no_partial_commit_on_fiber_failure() {
        let elastic = Elastic::new(1, 1000.0).unwrap();
        let brittle = StrainLimit::new(2, &elastic, -0.01, 0.01).unwrap();
        let mut section = FiberSection::new(
            5,
            vec![
                Fiber::new(&elastic, 1.0).unwrap(),
                Fiber::new(&brittle, 1.0).unwrap(),
            ],
        )
        .unwrap();

        section.update_trial(&0.005).unwrap();
        section.commit().unwrap();

        let err = section.update_trial(&0.02).unwrap_err();
        assert!(matches!(err, Error::ConstitutiveFailure { tag: Tag(2), .. }));

        // Siblings keep their committed state
        for fiber in section.fibers() {
            assert_eq!(fiber.material().committed_strain(), 0.005);
        }
        assert_relative_eq!(section.committed_resultant(), 10.0);

        section.reset().unwrap();
        for fiber in section.fibers() {
            assert_eq!(fiber.material().strain(), 0.005);
        }
    }

    #[test]
    fn test_copy_is_independent() {
        let proto = steel_concrete();
        let mut copy = proto.copy();
        copy.update_trial(&1e-3).unwrap();
        copy.commit().unwrap();
        assert_eq!(proto.committed_deformation(), 0.0);
        assert_eq!(copy.tag(), Tag(10));
    }
}
