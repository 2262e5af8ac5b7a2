//! Object identity and the trial/commit state protocol.
//!
//! Every object stored in a [`Domain`](crate::domain::Domain) implements
//! [`DomainObject`]. Objects that carry internal variables (nodes, elements,
//! materials, sections) additionally implement [`StatefulObject`], which
//! holds a CURRENT (last committed) and a TRIAL copy of those variables.
//!
//! # Phases
//!
//! ```text
//! initialize/clear ──► Clean ──update_trial──► TrialPending ──commit──► Committed
//!                                   ▲               │                        │
//!                                   │             reset                      │
//!                                   └──────────── Reset ◄────────────────────┘
//! ```
//!
//! `update_trial` is legal from every phase and always recomputes TRIAL from
//! CURRENT. `commit` is only legal from `TrialPending`; violating that is
//! reported as [`Error::InvalidTransition`] in debug builds.

use crate::error::{Error, Result};
use crate::types::Tag;

/// Tag plus activation flag, embedded by every domain object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    tag: Tag,
    active: bool,
}

impl Identity {
    /// New, active identity.
    pub fn new(tag: Tag) -> Self {
        Self { tag, active: true }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }
}

/// Capability shared by everything a registry can hold.
///
/// Activation is independent of existence: a disabled object stays
/// addressable by tag but is skipped by assembly and fan-out passes.
pub trait DomainObject {
    fn identity(&self) -> &Identity;

    fn identity_mut(&mut self) -> &mut Identity;

    fn tag(&self) -> Tag {
        self.identity().tag
    }

    fn is_active(&self) -> bool {
        self.identity().active
    }

    fn enable(&mut self) {
        self.identity_mut().active = true;
    }

    fn disable(&mut self) {
        self.identity_mut().active = false;
    }
}

impl<T: DomainObject + ?Sized> DomainObject for Box<T> {
    fn identity(&self) -> &Identity {
        (**self).identity()
    }

    fn identity_mut(&mut self) -> &mut Identity {
        (**self).identity_mut()
    }
}

/// Position of a stateful object in the trial/commit protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, initialized or cleared; TRIAL equals CURRENT.
    Clean,
    /// TRIAL computed from a new field but not yet judged.
    TrialPending,
    /// TRIAL promoted to CURRENT.
    Committed,
    /// TRIAL discarded and restored from CURRENT.
    Reset,
}

/// Phase tracker with transition validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    phase: Phase,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: Phase::Clean,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Mark a freshly computed trial.
    pub fn begin_trial(&mut self) {
        self.phase = Phase::TrialPending;
    }

    /// Validate and record a commit.
    pub fn commit(&mut self, tag: Tag) -> Result<()> {
        if cfg!(debug_assertions) && self.phase != Phase::TrialPending {
            return Err(Error::InvalidTransition {
                tag,
                from: self.phase,
                to: Phase::Committed,
            });
        }
        self.phase = Phase::Committed;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Reset;
    }

    pub fn clear(&mut self) {
        self.phase = Phase::Clean;
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Trial/commit protocol over a kinematic field of type `F`.
///
/// `F` is the quantity that drives the object: a scalar strain for uniaxial
/// materials and sections, a displacement slice for nodes and elements.
pub trait StatefulObject<F: ?Sized> {
    /// Recompute TRIAL from CURRENT and `field`.
    ///
    /// A failure leaves TRIAL unspecified; callers must not read it and must
    /// eventually call [`reset`](Self::reset).
    fn update_trial(&mut self, field: &F) -> Result<()>;

    /// CURRENT := TRIAL.
    fn commit(&mut self) -> Result<()>;

    /// TRIAL := CURRENT. Idempotent.
    fn reset(&mut self) -> Result<()>;

    /// Return to the construction-time state.
    fn clear(&mut self) -> Result<()>;

    fn phase(&self) -> Phase;
}

/// Visit every result and keep the first failure.
///
/// Composite objects use this so that a failure in one sub-object does not
/// stop the others from being visited.
pub fn combine<I>(results: I) -> Result<()>
where
    I: IntoIterator<Item = Result<()>>,
{
    let mut outcome = Ok(());
    for result in results {
        if let Err(e) = result {
            if outcome.is_ok() {
                outcome = Err(e);
            }
        }
    }
    outcome
}
