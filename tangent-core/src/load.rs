//! Nodal loads and single-point constraints.
//!
//! Loads form the reference pattern that the load factor scales. A
//! constraint removes one node DOF from the equation system and prescribes
//! its displacement; changing the prescribed value between steps imposes a
//! settlement.

use crate::error::{Error, Result};
use crate::object::{DomainObject, Identity};
use crate::types::Tag;

/// Reference force applied at a node, scaled by the load factor.
#[derive(Debug, Clone, PartialEq)]
pub struct NodalLoad {
    id: Identity,
    node: Tag,
    values: Vec<f64>,
}

impl NodalLoad {
    /// `values` holds one component per node DOF.
    pub fn new(tag: impl Into<Tag>, node: Tag, values: Vec<f64>) -> Self {
        Self {
            id: Identity::new(tag.into()),
            node,
            values,
        }
    }

    pub fn node(&self) -> Tag {
        self.node
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

impl DomainObject for NodalLoad {
    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

/// Prescribed displacement of one node DOF.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    id: Identity,
    node: Tag,
    dof: usize,
    value: f64,
}

impl Constraint {
    /// Fix `dof` of `node` at zero.
    pub fn fixed(tag: impl Into<Tag>, node: Tag, dof: usize) -> Self {
        Self::prescribed(tag, node, dof, 0.0)
    }

    /// Prescribe `dof` of `node` to `value`.
    pub fn prescribed(tag: impl Into<Tag>, node: Tag, dof: usize, value: f64) -> Self {
        Self {
            id: Identity::new(tag.into()),
            node,
            dof,
            value,
        }
    }

    pub fn node(&self) -> Tag {
        self.node
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Change the prescribed value; takes effect at the next step.
    pub fn set_value(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(Error::Configuration(format!(
                "constraint {} value must be finite",
                self.tag()
            )));
        }
        self.value = value;
        Ok(())
    }
}

impl DomainObject for Constraint {
    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}
