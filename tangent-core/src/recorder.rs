//! Output recorders.
//!
//! A recorder polls committed responses from nodes or elements after each
//! converged step and keeps them in memory. Recorders hold tags only; if an
//! object they refer to has been erased, [`Recorder::record`] fails and the
//! [`Domain`] disables the recorder instead of failing the analysis.
//! Response kinds a target type can never provide are rejected at
//! construction.

use crate::domain::Domain;
use crate::error::{Error, Result};
use crate::object::{DomainObject, Identity};
use crate::types::{ObjectKind, ResponseKind, Tag};
use std::fmt::Debug;

/// One recorded row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Analysis step that produced the row (1-based).
    pub step: usize,
    /// Committed load factor.
    pub load_factor: f64,
    /// Responses of every target, concatenated in target order.
    pub values: Vec<f64>,
}

pub trait Recorder: DomainObject + Debug + Send + Sync {
    /// Append a sample for the committed state of `domain`.
    fn record(&mut self, step: usize, load_factor: f64, domain: &Domain) -> Result<()>;

    /// Samples recorded so far.
    fn history(&self) -> &[Sample];
}

#[derive(Debug, Clone)]
struct Targets {
    kind: ObjectKind,
    tags: Vec<Tag>,
    response: ResponseKind,
    history: Vec<Sample>,
}

impl Targets {
    fn unsupported(&self, tag: Tag) -> Error {
        Error::Configuration(format!(
            "{} {} does not provide {:?}",
            self.kind, tag, self.response
        ))
    }
}

/// Records a response of a set of nodes.
#[derive(Debug, Clone)]
pub struct NodeRecorder {
    id: Identity,
    targets: Targets,
}

impl NodeRecorder {
    /// # Errors
    ///
    /// Nodes only provide [`ResponseKind::Displacement`]; any other kind is
    /// a [`Error::Configuration`].
    pub fn new(tag: impl Into<Tag>, nodes: Vec<Tag>, response: ResponseKind) -> Result<Self> {
        let tag = tag.into();
        if response != ResponseKind::Displacement {
            return Err(Error::Configuration(format!(
                "node recorder {} cannot record {:?}",
                tag, response
            )));
        }
        Ok(Self {
            id: Identity::new(tag),
            targets: Targets {
                kind: ObjectKind::Node,
                tags: nodes,
                response,
                history: Vec::new(),
            },
        })
    }
}

impl DomainObject for NodeRecorder {
    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

impl Recorder for NodeRecorder {
    fn record(&mut self, step: usize, load_factor: f64, domain: &Domain) -> Result<()> {
        let mut values = Vec::new();
        for &tag in &self.targets.tags {
            let response = domain
                .node(tag)?
                .response(self.targets.response)
                .ok_or_else(|| self.targets.unsupported(tag))?;
            values.extend(response);
        }
        self.targets.history.push(Sample {
            step,
            load_factor,
            values,
        });
        Ok(())
    }

    fn history(&self) -> &[Sample] {
        &self.targets.history
    }
}

/// Records a response of a set of elements.
#[derive(Debug, Clone)]
pub struct ElementRecorder {
    id: Identity,
    targets: Targets,
}

impl ElementRecorder {
    /// # Errors
    ///
    /// [`ResponseKind::Displacement`] is a node response and is rejected.
    pub fn new(tag: impl Into<Tag>, elements: Vec<Tag>, response: ResponseKind) -> Result<Self> {
        let tag = tag.into();
        if response == ResponseKind::Displacement {
            return Err(Error::Configuration(format!(
                "element recorder {} cannot record displacements",
                tag
            )));
        }
        Ok(Self {
            id: Identity::new(tag),
            targets: Targets {
                kind: ObjectKind::Element,
                tags: elements,
                response,
                history: Vec::new(),
            },
        })
    }
}

impl DomainObject for ElementRecorder {
    fn identity(&self) -> &Identity {
        &self.id
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.id
    }
}

impl Recorder for ElementRecorder {
    fn record(&mut self, step: usize, load_factor: f64, domain: &Domain) -> Result<()> {
        let mut values = Vec::new();
        for &tag in &self.targets.tags {
            let response = domain
                .element(tag)?
                .response(self.targets.response)
                .ok_or_else(|| self.targets.unsupported(tag))?;
            values.extend(response);
        }
        self.targets.history.push(Sample {
            step,
            load_factor,
            values,
        });
        Ok(())
    }

    fn history(&self) -> &[Sample] {
        &self.targets.history
    }
}
