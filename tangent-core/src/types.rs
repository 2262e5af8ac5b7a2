//! Core data types shared across the analysis core.
//!
//! This module defines:
//! - Object identity ([`Tag`]) and the kinds of objects a domain holds
//! - Geometric primitives
//! - Response quantities that recorders can poll

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in 3D space. Lower-dimensional models leave trailing
/// coordinates at zero.
pub type Point3 = Vector3<f64>;

/// Unique identity of a domain object within its registry.
///
/// Tags are immutable after construction and are the only key used to
/// resolve references between objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag(pub u32);

impl Tag {
    /// Raw value as `usize`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for Tag {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kinds of objects stored in a [`Domain`](crate::domain::Domain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Node,
    Element,
    Material,
    Section,
    Load,
    Constraint,
    Recorder,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Node => "node",
            ObjectKind::Element => "element",
            ObjectKind::Material => "material",
            ObjectKind::Section => "section",
            ObjectKind::Load => "load",
            ObjectKind::Constraint => "constraint",
            ObjectKind::Recorder => "recorder",
        };
        f.write_str(name)
    }
}

/// Output quantities that can be requested from nodes and elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseKind {
    /// Nodal displacement components.
    Displacement,
    /// Element resisting force (axial force for one-dimensional members).
    Force,
    /// Element deformation measure (axial strain or spring elongation).
    Strain,
    /// Material stress.
    Stress,
    /// Current tangent stiffness of the governing material/section.
    Tangent,
}
