//! Zero-length spring element.
//!
//! Connects two nodes through a uniaxial material acting on a single
//! degree of freedom: the material strain is the relative displacement
//! `u₂[d] - u₁[d]`. The nodes may be coincident.

use crate::element::{resolve_pair, Element};
use crate::error::{Error, Result};
use crate::material::UniaxialMaterial;
use crate::node::Node;
use crate::object::{DomainObject, Identity, Lifecycle, Phase, StatefulObject};
use crate::registry::Registry;
use crate::types::{ResponseKind, Tag};
use nalgebra::{DMatrix, DVector};

#[derive(Debug)]
pub struct ZeroLength {
    id: Identity,
    nodes: [Tag; 2],
    direction: usize,
    material: Box<dyn UniaxialMaterial>,
    lifecycle: Lifecycle,
    ndf: usize,
}

impl ZeroLength {
    /// Create a spring acting along node DOF `direction` (0-based).
    pub fn new(
        tag: impl Into<Tag>,
        nodes: [Tag; 2],
        direction: usize,
        material: &dyn UniaxialMaterial,
    ) -> Self {
        Self {
            id: Identity::new(tag.into()),
            nodes,
            direction,
            material: material.copy(),
            lifecycle: Lifecycle::new(),
            ndf: 0,
        }
    }

    /// Committed spring force.
    pub fn force(&self) -> f64 {
        self.material.committed_stress()
    }

    /// Committed relative displacement.
    pub fn deformation(&self) -> f64 {
        self.material.committed_strain()
    }
}

impl DomainObject for ZeroLength {
    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

impl StatefulObject<[f64]> for ZeroLength {
    fn update_trial(&mut self, disp: &[f64]) -> Result<()> {
        if self.ndf == 0 || disp.len() != 2 * self.ndf {
            return Err(Error::Configuration(format!(
                "zero-length element {} expects {} displacement components, got {}",
                self.tag(),
                2 * self.ndf,
                disp.len()
            )));
        }
        let d = self.direction;
        self.material.update_trial(&(disp[self.ndf + d] - disp[d]))?;
        self.lifecycle.begin_trial();
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.lifecycle.commit(self.id.tag())?;
        self.material.commit()
    }

    fn reset(&mut self) -> Result<()> {
        self.lifecycle.reset();
        self.material.reset()
    }

    fn clear(&mut self) -> Result<()> {
        self.lifecycle.clear();
        self.material.clear()
    }

    fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }
}

impl Element for ZeroLength {
    fn nodes(&self) -> &[Tag] {
        &self.nodes
    }

    fn initialize(&mut self, nodes: &Registry<Node>) -> Result<()> {
        let (first, _) = resolve_pair(self.tag(), nodes, self.nodes)?;
        if self.direction >= first.ndf() {
            return Err(Error::Configuration(format!(
                "zero-length element {}: direction {} exceeds node DOF count {}",
                self.tag(),
                self.direction,
                first.ndf()
            )));
        }
        self.ndf = first.ndf();
        self.lifecycle.clear();
        Ok(())
    }

    fn dofs_per_node(&self) -> usize {
        self.ndf
    }

    fn tangent(&self) -> DMatrix<f64> {
        let (n, d) = (self.ndf, self.direction);
        let k = self.material.tangent();
        let mut kt = DMatrix::zeros(2 * n, 2 * n);
        kt[(d, d)] = k;
        kt[(n + d, n + d)] = k;
        kt[(d, n + d)] = -k;
        kt[(n + d, d)] = -k;
        kt
    }

    fn resistance(&self) -> DVector<f64> {
        let (n, d) = (self.ndf, self.direction);
        let force = self.material.stress();
        let mut r = DVector::zeros(2 * n);
        r[d] = -force;
        r[n + d] = force;
        r
    }

    fn response(&self, kind: ResponseKind) -> Option<Vec<f64>> {
        match kind {
            ResponseKind::Force | ResponseKind::Stress => Some(vec![self.force()]),
            ResponseKind::Strain => Some(vec![self.deformation()]),
            ResponseKind::Tangent => Some(vec![self.material.tangent()]),
            ResponseKind::Displacement => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Elastic;
    use crate::types::ObjectKind;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn coincident(ndf: usize) -> Registry<Node> {
        let mut reg = Registry::new(ObjectKind::Node);
        reg.insert(Node::new(1, Vector3::zeros(), ndf).unwrap()).unwrap();
        reg.insert(Node::new(2, Vector3::zeros(), ndf).unwrap()).unwrap();
        reg.update();
        reg
    }

    #[test]
    fn test_spring_force() {
        let mat = Elastic::new(1, 1000.0).unwrap();
        let mut spring = ZeroLength::new(1, [Tag(1), Tag(2)], 1, &mat);
        spring.initialize(&coincident(2)).unwrap();
        assert_eq!(spring.n_dofs(), 4);

        spring.update_trial(&[0.0, 0.01, 0.5, 0.06][..]).unwrap();
        let r = spring.resistance();
        assert_relative_eq!(r[1], -50.0, epsilon = 1e-10);
        assert_relative_eq!(r[3], 50.0, epsilon = 1e-10);
        assert_eq!(r[0], 0.0);
        assert_eq!(r[2], 0.0);

        let k = spring.tangent();
        assert_eq!(k[(1, 1)], 1000.0);
        assert_eq!(k[(1, 3)], -1000.0);
        assert_eq!(k[(0, 0)], 0.0);

        spring.commit().unwrap();
        assert_relative_eq!(spring.response(ResponseKind::Force).unwrap()[0], 50.0, epsilon = 1e-10);
    }

    #[test]
    fn test_direction_out_of_range() {
        let mat = Elastic::new(1, 1000.0).unwrap();
        let mut spring = ZeroLength::new(1, [Tag(1), Tag(2)], 2, &mat);
        assert!(spring.initialize(&coincident(2)).is_err());
    }
}
