//! Error types for analysis operations.
//!
//! Every failure the core can report maps to a negative status code through
//! [`Error::code`], so callers that only care about success/failure can use
//! [`status_code`].

use crate::types::{ObjectKind, Tag};
use thiserror::Error;

/// Result type alias using the crate Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during model setup and analysis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed construction parameters or an inconsistent model.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Tag lookup miss.
    #[error("{kind} with tag {tag} not found")]
    NotFound { kind: ObjectKind, tag: Tag },

    /// A live object with the same tag already exists.
    #[error("{kind} with tag {tag} already exists")]
    DuplicateTag { kind: ObjectKind, tag: Tag },

    /// The assembled operator could not be factorized.
    #[error("singular system: {0}")]
    SingularSystem(String),

    /// An object could not produce a valid trial state.
    #[error("constitutive failure in object {tag}: {reason}")]
    ConstitutiveFailure { tag: Tag, reason: String },

    /// Iteration limit reached without satisfying the convergence test.
    #[error("no convergence after {iterations} iterations (norm {norm:e})")]
    NonConvergence { iterations: usize, norm: f64 },

    /// Lifecycle transition that the trial/commit protocol forbids.
    #[error("invalid state transition for object {tag}: {from:?} -> {to:?}")]
    InvalidTransition {
        tag: Tag,
        from: crate::object::Phase,
        to: crate::object::Phase,
    },

    /// The load-factor control equation has no admissible root.
    #[error("control equation failed: {0}")]
    ControlEquation(String),

    /// Linear solver errors other than singularity.
    #[error("solver error: {0}")]
    Solver(String),
}

impl Error {
    /// Negative status code reported to callers that only check the sign.
    pub fn code(&self) -> i32 {
        match self {
            Error::Configuration(_) => -1,
            Error::NotFound { .. } => -2,
            Error::DuplicateTag { .. } => -3,
            Error::SingularSystem(_) => -4,
            Error::ConstitutiveFailure { .. } => -5,
            Error::NonConvergence { .. } => -6,
            Error::InvalidTransition { .. } => -7,
            Error::ControlEquation(_) => -8,
            Error::Solver(_) => -9,
        }
    }

    /// Shorthand for a constitutive failure.
    pub fn constitutive(tag: Tag, reason: impl Into<String>) -> Self {
        Error::ConstitutiveFailure {
            tag,
            reason: reason.into(),
        }
    }
}

/// Collapse a result into the integer status convention: 0 on success,
/// negative on failure.
pub fn status_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}
