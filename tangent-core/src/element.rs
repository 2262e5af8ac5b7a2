//! Element trait and implementations.
//!
//! The Element trait defines the interface between the analysis core and a
//! finite element: it is a stateful object driven by the displacements of
//! its nodes, and it contributes a tangent matrix and a resisting force
//! vector to the global system.
//!
//! Elements refer to their nodes by [`Tag`] only. Geometry is resolved
//! through the node registry in [`Element::initialize`], and the
//! displacement field is gathered by the [`Domain`](crate::domain::Domain)
//! and handed to [`StatefulObject::update_trial`] in node-major order
//! (`[node0_dof0, node0_dof1, ..., node1_dof0, ...]`).
//!
//! # Implementations
//!
//! - [`Truss`] - two-node axial member driven by a material or a section
//! - [`ZeroLength`] - spring between two nodes along one degree of freedom

use crate::error::Result;
use crate::node::Node;
use crate::object::{DomainObject, StatefulObject};
use crate::registry::Registry;
use crate::types::{ResponseKind, Tag};
use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;

pub mod truss;
pub mod zero_length;

pub use truss::Truss;
pub use zero_length::ZeroLength;

/// Finite element interface.
///
/// Elements must be thread-safe (Send + Sync) so that trial updates can be
/// fanned out in parallel.
pub trait Element: DomainObject + StatefulObject<[f64]> + Debug + Send + Sync {
    /// Tags of the connected nodes.
    fn nodes(&self) -> &[Tag];

    /// Resolve node geometry and validate connectivity. Returns the element
    /// to the `Clean` phase.
    fn initialize(&mut self, nodes: &Registry<Node>) -> Result<()>;

    /// Degrees of freedom per node (valid after `initialize`).
    fn dofs_per_node(&self) -> usize;

    /// Total degrees of freedom for this element.
    fn n_dofs(&self) -> usize {
        self.nodes().len() * self.dofs_per_node()
    }

    /// Tangent stiffness at the trial state, shape (n_dofs, n_dofs).
    fn tangent(&self) -> DMatrix<f64>;

    /// Resisting nodal forces at the trial state, length n_dofs.
    fn resistance(&self) -> DVector<f64>;

    /// Mass matrix, if the element carries mass.
    fn mass(&self) -> Option<DMatrix<f64>> {
        None
    }

    /// Committed output quantity, `None` if the element does not provide it.
    fn response(&self, kind: ResponseKind) -> Option<Vec<f64>>;
}

/// Resolve two end nodes and check they share a DOF layout.
pub(crate) fn resolve_pair<'a>(
    element: Tag,
    nodes: &'a Registry<Node>,
    tags: [Tag; 2],
) -> Result<(&'a Node, &'a Node)> {
    let first = nodes.at(tags[0])?;
    let second = nodes.at(tags[1])?;
    if first.ndf() != second.ndf() {
        return Err(crate::error::Error::Configuration(format!(
            "element {}: nodes {} and {} have different DOF counts ({} vs {})",
            element,
            tags[0],
            tags[1],
            first.ndf(),
            second.ndf()
        )));
    }
    Ok((first, second))
}
