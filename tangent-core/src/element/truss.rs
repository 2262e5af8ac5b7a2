//! Two-node truss (axial bar) element.
//!
//! - 2 nodes, 1 to 3 translational DOFs per node
//! - Small-displacement kinematics: ε = c · (u₂ - u₁) / L
//! - Axial response from either a uniaxial material times an area, or an
//!   axial section
//! - Optional lumped mass from mass per unit length
//!
//! # Stiffness
//!
//! ```text
//! K = (EA / L) [  c cᵀ  -c cᵀ ]
//!              [ -c cᵀ   c cᵀ ]
//! ```
//!
//! where `c` holds the direction cosines restricted to the node DOFs.

use crate::element::{resolve_pair, Element};
use crate::error::{Error, Result};
use crate::material::UniaxialMaterial;
use crate::node::Node;
use crate::object::{DomainObject, Identity, Lifecycle, Phase, StatefulObject};
use crate::registry::Registry;
use crate::section::Section;
use crate::types::{ResponseKind, Tag};
use nalgebra::{DMatrix, DVector};

/// Source of the axial force-strain relation.
#[derive(Debug)]
enum AxialResponse {
    Material {
        material: Box<dyn UniaxialMaterial>,
        area: f64,
    },
    Section(Box<dyn Section>),
}

impl AxialResponse {
    fn update_trial(&mut self, strain: f64) -> Result<()> {
        match self {
            AxialResponse::Material { material, .. } => material.update_trial(&strain),
            AxialResponse::Section(section) => section.update_trial(&strain),
        }
    }

    fn commit(&mut self) -> Result<()> {
        match self {
            AxialResponse::Material { material, .. } => material.commit(),
            AxialResponse::Section(section) => section.commit(),
        }
    }

    fn reset(&mut self) -> Result<()> {
        match self {
            AxialResponse::Material { material, .. } => material.reset(),
            AxialResponse::Section(section) => section.reset(),
        }
    }

    fn clear(&mut self) -> Result<()> {
        match self {
            AxialResponse::Material { material, .. } => material.clear(),
            AxialResponse::Section(section) => section.clear(),
        }
    }

    /// Trial axial force.
    fn force(&self) -> f64 {
        match self {
            AxialResponse::Material { material, area } => material.stress() * area,
            AxialResponse::Section(section) => section.resultant(),
        }
    }

    /// Trial axial stiffness EA.
    fn stiffness(&self) -> f64 {
        match self {
            AxialResponse::Material { material, area } => material.tangent() * area,
            AxialResponse::Section(section) => section.stiffness(),
        }
    }

    fn committed_force(&self) -> f64 {
        match self {
            AxialResponse::Material { material, area } => material.committed_stress() * area,
            AxialResponse::Section(section) => section.committed_resultant(),
        }
    }

    fn committed_strain(&self) -> f64 {
        match self {
            AxialResponse::Material { material, .. } => material.committed_strain(),
            AxialResponse::Section(section) => section.committed_deformation(),
        }
    }

    fn committed_stress(&self) -> Option<f64> {
        match self {
            AxialResponse::Material { material, .. } => Some(material.committed_stress()),
            AxialResponse::Section(_) => None,
        }
    }
}

/// Two-node axial member.
#[derive(Debug)]
pub struct Truss {
    id: Identity,
    nodes: [Tag; 2],
    response: AxialResponse,
    /// Mass per unit length.
    density: f64,
    lifecycle: Lifecycle,
    length: f64,
    /// Direction cosines restricted to the node DOFs.
    cosines: Vec<f64>,
}

impl Truss {
    /// Create a truss driven by its own copy of `material`.
    ///
    /// # Arguments
    ///
    /// * `nodes` - End node tags
    /// * `material` - Uniaxial material prototype (copied)
    /// * `area` - Cross-sectional area
    pub fn new(
        tag: impl Into<Tag>,
        nodes: [Tag; 2],
        material: &dyn UniaxialMaterial,
        area: f64,
    ) -> Result<Self> {
        if !(area > 0.0) {
            return Err(Error::Configuration("truss area must be positive".into()));
        }
        Ok(Self::build(
            tag.into(),
            nodes,
            AxialResponse::Material {
                material: material.copy(),
                area,
            },
        ))
    }

    /// Create a truss driven by its own copy of an axial section.
    pub fn with_section(tag: impl Into<Tag>, nodes: [Tag; 2], section: &dyn Section) -> Self {
        Self::build(tag.into(), nodes, AxialResponse::Section(section.copy()))
    }

    fn build(tag: Tag, nodes: [Tag; 2], response: AxialResponse) -> Self {
        Self {
            id: Identity::new(tag),
            nodes,
            response,
            density: 0.0,
            lifecycle: Lifecycle::new(),
            length: 0.0,
            cosines: Vec::new(),
        }
    }

    /// Set the mass per unit length used for the lumped mass matrix.
    pub fn with_density(mut self, density: f64) -> Result<Self> {
        if density < 0.0 {
            return Err(Error::Configuration("density must be non-negative".into()));
        }
        self.density = density;
        Ok(self)
    }

    /// Undeformed length (valid after `initialize`).
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Committed axial strain.
    pub fn axial_strain(&self) -> f64 {
        self.response.committed_strain()
    }

    /// Committed axial force.
    pub fn axial_force(&self) -> f64 {
        self.response.committed_force()
    }

    fn ndf(&self) -> usize {
        self.cosines.len()
    }
}

impl DomainObject for Truss {
    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

impl StatefulObject<[f64]> for Truss {
    fn update_trial(&mut self, disp: &[f64]) -> Result<()> {
        let ndf = self.ndf();
        if ndf == 0 {
            return Err(Error::Configuration(format!(
                "truss {} used before initialize",
                self.tag()
            )));
        }
        if disp.len() != 2 * ndf {
            return Err(Error::Configuration(format!(
                "truss {} expects {} displacement components, got {}",
                self.tag(),
                2 * ndf,
                disp.len()
            )));
        }

        let elongation: f64 = self
            .cosines
            .iter()
            .enumerate()
            .map(|(i, c)| c * (disp[ndf + i] - disp[i]))
            .sum();
        self.response.update_trial(elongation / self.length)?;
        self.lifecycle.begin_trial();
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.lifecycle.commit(self.id.tag())?;
        self.response.commit()
    }

    fn reset(&mut self) -> Result<()> {
        self.lifecycle.reset();
        self.response.reset()
    }

    fn clear(&mut self) -> Result<()> {
        self.lifecycle.clear();
        self.response.clear()
    }

    fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }
}

impl Element for Truss {
    fn nodes(&self) -> &[Tag] {
        &self.nodes
    }

    fn initialize(&mut self, nodes: &Registry<Node>) -> Result<()> {
        let (first, second) = resolve_pair(self.tag(), nodes, self.nodes)?;
        let delta = second.coords() - first.coords();
        let length = delta.norm();
        if !(length > 0.0) {
            return Err(Error::Configuration(format!(
                "truss {} has zero length",
                self.tag()
            )));
        }
        let ndf = first.ndf();
        self.length = length;
        self.cosines = (0..ndf).map(|i| delta[i] / length).collect();
        self.lifecycle.clear();
        Ok(())
    }

    fn dofs_per_node(&self) -> usize {
        self.ndf()
    }

    fn tangent(&self) -> DMatrix<f64> {
        let ndf = self.ndf();
        let k = self.response.stiffness() / self.length;
        let mut kt = DMatrix::zeros(2 * ndf, 2 * ndf);
        for i in 0..ndf {
            for j in 0..ndf {
                let kij = k * self.cosines[i] * self.cosines[j];
                kt[(i, j)] = kij;
                kt[(i, ndf + j)] = -kij;
                kt[(ndf + i, j)] = -kij;
                kt[(ndf + i, ndf + j)] = kij;
            }
        }
        kt
    }

    fn resistance(&self) -> DVector<f64> {
        let ndf = self.ndf();
        let force = self.response.force();
        let mut r = DVector::zeros(2 * ndf);
        for i in 0..ndf {
            r[i] = -self.cosines[i] * force;
            r[ndf + i] = self.cosines[i] * force;
        }
        r
    }

    fn mass(&self) -> Option<DMatrix<f64>> {
        if self.density == 0.0 {
            return None;
        }
        let m = 0.5 * self.density * self.length;
        Some(DMatrix::from_diagonal_element(2 * self.ndf(), 2 * self.ndf(), m))
    }

    fn response(&self, kind: ResponseKind) -> Option<Vec<f64>> {
        match kind {
            ResponseKind::Force => Some(vec![self.response.committed_force()]),
            ResponseKind::Strain => Some(vec![self.response.committed_strain()]),
            ResponseKind::Stress => self.response.committed_stress().map(|s| vec![s]),
            ResponseKind::Tangent => Some(vec![self.response.stiffness()]),
            ResponseKind::Displacement => None,
        }
    }
}
