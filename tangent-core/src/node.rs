//! Nodes: coordinates, degrees of freedom and nodal displacement state.

use crate::error::{Error, Result};
use crate::object::{DomainObject, Identity, Lifecycle, Phase, StatefulObject};
use crate::types::{Point3, ResponseKind, Tag};

/// A mesh node carrying `ndf` translational degrees of freedom.
///
/// The node keeps its own committed/trial displacement copy so that
/// recorders can poll it without access to the global state.
#[derive(Debug, Clone)]
pub struct Node {
    id: Identity,
    coords: Point3,
    ndf: usize,
    lifecycle: Lifecycle,
    committed: Vec<f64>,
    trial: Vec<f64>,
}

impl Node {
    /// Create a node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `ndf` is not in `1..=3`.
    pub fn new(tag: impl Into<Tag>, coords: Point3, ndf: usize) -> Result<Self> {
        let tag = tag.into();
        if !(1..=3).contains(&ndf) {
            return Err(Error::Configuration(format!(
                "node {} must have 1 to 3 degrees of freedom, got {}",
                tag, ndf
            )));
        }
        Ok(Self {
            id: Identity::new(tag),
            coords,
            ndf,
            lifecycle: Lifecycle::new(),
            committed: vec![0.0; ndf],
            trial: vec![0.0; ndf],
        })
    }

    pub fn coords(&self) -> &Point3 {
        &self.coords
    }

    /// Degrees of freedom per node.
    pub fn ndf(&self) -> usize {
        self.ndf
    }

    /// Last committed displacement.
    pub fn displacement(&self) -> &[f64] {
        &self.committed
    }

    /// Displacement of the pending trial.
    pub fn trial_displacement(&self) -> &[f64] {
        &self.trial
    }

    pub fn response(&self, kind: ResponseKind) -> Option<Vec<f64>> {
        match kind {
            ResponseKind::Displacement => Some(self.committed.clone()),
            _ => None,
        }
    }
}

impl DomainObject for Node {
    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

impl StatefulObject<[f64]> for Node {
    fn update_trial(&mut self, field: &[f64]) -> Result<()> {
        if field.len() != self.ndf {
            return Err(Error::Configuration(format!(
                "node {} expects {} displacement components, got {}",
                self.tag(),
                self.ndf,
                field.len()
            )));
        }
        self.trial.copy_from_slice(field);
        self.lifecycle.begin_trial();
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.lifecycle.commit(self.id.tag())?;
        self.committed.copy_from_slice(&self.trial);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.trial.copy_from_slice(&self.committed);
        self.lifecycle.reset();
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.committed.fill(0.0);
        self.trial.fill(0.0);
        self.lifecycle.clear();
        Ok(())
    }

    fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_invalid_ndf() {
        assert!(Node::new(1, Vector3::zeros(), 0).is_err());
        assert!(Node::new(1, Vector3::zeros(), 4).is_err());
        assert!(Node::new(1, Vector3::zeros(), 2).is_ok());
    }

    #[test]
    fn test_trial_commit_reset() {
        let mut node = Node::new(1, Vector3::new(1.0, 0.0, 0.0), 2).unwrap();
        node.update_trial(&[0.1, 0.2][..]).unwrap();
        assert_eq!(node.trial_displacement(), &[0.1, 0.2]);
        assert_eq!(node.displacement(), &[0.0, 0.0]);

        node.commit().unwrap();
        assert_eq!(node.displacement(), &[0.1, 0.2]);

        node.update_trial(&[0.5, 0.5][..]).unwrap();
        node.reset().unwrap();
        assert_eq!(node.trial_displacement(), &[0.1, 0.2]);
        assert_eq!(node.phase(), Phase::Reset);

        node.clear().unwrap();
        assert_eq!(node.displacement(), &[0.0, 0.0]);
        assert_eq!(node.phase(), Phase::Clean);
    }

    #[test]
    fn test_wrong_field_length() {
        let mut node = Node::new(1, Vector3::zeros(), 3).unwrap();
        assert!(node.update_trial(&[0.0][..]).is_err());
    }

    #[test]
    fn test_response() {
        let node = Node::new(5, Vector3::zeros(), 1).unwrap();
        assert_eq!(node.response(ResponseKind::Displacement), Some(vec![0.0]));
        assert_eq!(node.response(ResponseKind::Stress), None);
    }
}
